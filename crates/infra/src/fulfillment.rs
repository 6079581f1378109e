//! Order Fulfillment service.
//!
//! `create_order` stages the stock reservation, the new order stream and the
//! order-number claim in one unit of work, so either all of them commit or none
//! does. A colliding order number is regenerated and the whole unit retried.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use stockforge_catalog::{CatalogLookup, ProductId};
use stockforge_core::{AggregateId, Money, TenantId, UserId};
use stockforge_orders::{
    AGGREGATE_TYPE, ChangeStatus, ORDER_NUMBER_SCOPE, Order, OrderCommand, OrderId, OrderNumber, OrderStatus,
    PlaceOrder, RequestedLine,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, UniqueClaim};
use crate::ledger::{InventoryLedger, StockLine};

/// How many fresh order numbers to try before giving up.
const MAX_ORDER_NUMBER_ATTEMPTS: u32 = 3;

/// One requested order line; `unit_price` overrides the catalog price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub lines: Vec<OrderLineRequest>,
    pub remark: Option<String>,
}

fn make_order(_: TenantId, id: AggregateId) -> Order {
    Order::empty(OrderId::new(id))
}

pub struct OrderFulfillment<S> {
    dispatcher: Arc<CommandDispatcher<S>>,
    catalog: Arc<dyn CatalogLookup>,
    ledger: InventoryLedger<S>,
}

impl<S> Clone for OrderFulfillment<S> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            catalog: self.catalog.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

impl<S> OrderFulfillment<S>
where
    S: EventStore,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S>>,
        catalog: Arc<dyn CatalogLookup>,
        ledger: InventoryLedger<S>,
    ) -> Self {
        Self {
            dispatcher,
            catalog,
            ledger,
        }
    }

    /// Validate, price, reserve and persist an order as one atomic unit.
    pub fn create_order(
        &self,
        tenant_id: TenantId,
        request: CreateOrderRequest,
        operator: UserId,
    ) -> Result<Order, DispatchError> {
        if request.lines.is_empty() {
            return Err(DispatchError::InvalidArgument("order must have at least one line".to_string()));
        }
        if let Some((idx, _)) = request.lines.iter().enumerate().find(|(_, l)| l.quantity <= 0) {
            return Err(DispatchError::InvalidArgument(format!(
                "line {} quantity must be positive",
                idx + 1
            )));
        }

        let mut priced = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let catalog_price = self
                .catalog
                .price_of(tenant_id, line.product_id)
                .ok_or_else(|| DispatchError::NotFound(format!("product {}", line.product_id)))?;
            let unit_price = line.unit_price.unwrap_or(catalog_price);
            priced.push(RequestedLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price,
            });
        }
        let stock_lines: Vec<StockLine> = priced
            .iter()
            .map(|l| StockLine {
                product_id: l.product_id,
                quantity: l.quantity,
            })
            .collect();

        let order_id = OrderId::new(AggregateId::new());
        let mut last_duplicate = String::new();

        for _ in 0..MAX_ORDER_NUMBER_ATTEMPTS {
            let now = Utc::now();
            let number = OrderNumber::generate(now);

            let result = self.dispatcher.transact(tenant_id, |uow| {
                let ticket = self.ledger.stage_reservation(
                    uow,
                    &stock_lines,
                    operator,
                    Some(number.to_string()),
                    now,
                )?;

                let command = OrderCommand::PlaceOrder(PlaceOrder {
                    tenant_id,
                    order_id,
                    order_number: number.clone(),
                    customer_name: request.customer_name.clone(),
                    customer_phone: request.customer_phone.clone(),
                    lines: priced.clone(),
                    operator,
                    remark: request.remark.clone(),
                    occurred_at: now,
                });
                let staged = uow.execute(order_id.0, AGGREGATE_TYPE, &command, make_order)?;
                uow.claim(UniqueClaim::new(ORDER_NUMBER_SCOPE, number.as_str()));

                Ok((ticket, staged.after))
            });

            match result {
                Ok(((ticket, order), _)) => {
                    self.ledger.notify_reservation(&ticket);
                    info!(
                        tenant_id = %tenant_id,
                        order_no = %number,
                        lines = order.lines().len(),
                        total = %order.total(),
                        "order created"
                    );
                    return Ok(order);
                }
                Err(DispatchError::Duplicate { scope, value }) if scope == ORDER_NUMBER_SCOPE => {
                    debug!(order_no = %value, "order number collision, regenerating");
                    last_duplicate = value;
                }
                Err(e) => return Err(e),
            }
        }

        Err(DispatchError::Conflict(format!(
            "could not allocate a unique order number (last tried {last_duplicate})"
        )))
    }

    pub fn get_order(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Order, DispatchError> {
        let order: Order = self.dispatcher.load(tenant_id, order_id.0, make_order)?;
        if !order.is_created() {
            return Err(DispatchError::NotFound(format!("order {order_id}")));
        }
        Ok(order)
    }

    /// All orders of the tenant, newest first.
    pub fn list_orders(&self, tenant_id: TenantId) -> Result<Vec<Order>, DispatchError> {
        let mut orders: Vec<Order> = self
            .dispatcher
            .load_all(tenant_id, AGGREGATE_TYPE, make_order)?
            .into_iter()
            .filter(|o| o.is_created())
            .collect();
        // Stream creation order breaks ties between orders placed in the same instant.
        orders.reverse();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    /// Move an order to `new_status`.
    ///
    /// A finalized order always yields `Conflict`, whatever the target; an
    /// unknown target value on a live order is `InvalidArgument`.
    pub fn update_status(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        new_status: &str,
        operator: UserId,
    ) -> Result<Order, DispatchError> {
        let parsed = new_status.parse::<OrderStatus>();

        let (order, _) = self.dispatcher.transact(tenant_id, |uow| {
            let current: Order = uow.load(order_id.0, make_order)?;
            if !current.is_created() {
                return Err(DispatchError::NotFound(format!("order {order_id}")));
            }
            if current.status().is_terminal() {
                return Err(DispatchError::Conflict(format!(
                    "order already finalized ({})",
                    current.status()
                )));
            }
            let status = parsed.clone()?;

            let command = OrderCommand::ChangeStatus(ChangeStatus {
                tenant_id,
                order_id,
                status,
                operator,
                occurred_at: Utc::now(),
            });
            Ok(uow.execute(order_id.0, AGGREGATE_TYPE, &command, make_order)?.after)
        })?;

        info!(
            tenant_id = %tenant_id,
            order_id = %order_id,
            status = %order.status(),
            "order status changed"
        );
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use stockforge_catalog::Product;
    use stockforge_inventory::MovementKind;

    use crate::alert::TracingAlertHook;
    use crate::catalog::InMemoryCatalog;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::event_store::{AppendBatch, EventStoreError, InMemoryEventStore, StoredEvent};

    struct Fixture {
        fulfillment: OrderFulfillment<InMemoryEventStore>,
        ledger: InventoryLedger<InMemoryEventStore>,
        catalog: Arc<InMemoryCatalog>,
        tenant: TenantId,
        operator: UserId,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = Arc::new(InMemoryCatalog::new());
            let dispatcher = Arc::new(CommandDispatcher::new(InMemoryEventStore::new()));
            let ledger = InventoryLedger::new(dispatcher.clone(), catalog.clone(), Arc::new(TracingAlertHook));
            Self {
                fulfillment: OrderFulfillment::new(dispatcher, catalog.clone(), ledger.clone()),
                ledger,
                catalog,
                tenant: TenantId::new(),
                operator: UserId::new(),
            }
        }

        fn stocked(&self, sku: &str, price: &str, qty: i64) -> ProductId {
            let id = self
                .catalog
                .register(Product::new(self.tenant, sku, price.parse().unwrap()).unwrap())
                .unwrap()
                .id;
            if qty > 0 {
                self.ledger
                    .adjust(self.tenant, id, qty, MovementKind::Inbound, self.operator, None, None)
                    .unwrap();
            }
            id
        }

        fn request(&self, lines: Vec<(ProductId, i64, Option<&str>)>) -> CreateOrderRequest {
            CreateOrderRequest {
                customer_name: "Jane".to_string(),
                customer_phone: None,
                lines: lines
                    .into_iter()
                    .map(|(product_id, quantity, price)| OrderLineRequest {
                        product_id,
                        quantity,
                        unit_price: price.map(|p| p.parse().unwrap()),
                    })
                    .collect(),
                remark: None,
            }
        }
    }

    /// Store whose first `collisions` claim-carrying batches hit an existing order number.
    struct ClaimCollidingStore {
        inner: InMemoryEventStore,
        collisions: AtomicU32,
        tried: Mutex<Vec<String>>,
    }

    impl ClaimCollidingStore {
        fn new(collisions: u32) -> Self {
            Self {
                inner: InMemoryEventStore::new(),
                collisions: AtomicU32::new(collisions),
                tried: Mutex::new(Vec::new()),
            }
        }
    }

    impl EventStore for ClaimCollidingStore {
        fn append_batch(&self, batch: AppendBatch) -> Result<Vec<StoredEvent>, EventStoreError> {
            if let Some(claim) = batch.claims.first() {
                self.tried.lock().unwrap().push(claim.value.clone());
                if self
                    .collisions
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    return Err(EventStoreError::UniqueViolation {
                        scope: claim.scope.clone(),
                        value: claim.value.clone(),
                    });
                }
            }
            self.inner.append_batch(batch)
        }

        fn load_stream(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_stream(tenant_id, aggregate_id)
        }

        fn load_by_type(&self, tenant_id: TenantId, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_by_type(tenant_id, aggregate_type)
        }
    }

    struct CollidingFixture {
        fulfillment: OrderFulfillment<Arc<ClaimCollidingStore>>,
        ledger: InventoryLedger<Arc<ClaimCollidingStore>>,
        store: Arc<ClaimCollidingStore>,
        product: ProductId,
        tenant: TenantId,
        operator: UserId,
    }

    impl CollidingFixture {
        fn new(collisions: u32) -> Self {
            let tenant = TenantId::new();
            let operator = UserId::new();
            let catalog = Arc::new(InMemoryCatalog::new());
            let product = catalog
                .register(Product::new(tenant, "A", Money::from_minor(100)).unwrap())
                .unwrap()
                .id;
            let store = Arc::new(ClaimCollidingStore::new(collisions));
            let dispatcher = Arc::new(CommandDispatcher::new(store.clone()));
            let ledger = InventoryLedger::new(dispatcher.clone(), catalog.clone(), Arc::new(TracingAlertHook));
            ledger
                .adjust(tenant, product, 5, MovementKind::Inbound, operator, None, None)
                .unwrap();
            Self {
                fulfillment: OrderFulfillment::new(dispatcher, catalog, ledger.clone()),
                ledger,
                store,
                product,
                tenant,
                operator,
            }
        }

        fn order_two(&self) -> Result<Order, DispatchError> {
            let request = CreateOrderRequest {
                customer_name: "Jane".to_string(),
                customer_phone: None,
                lines: vec![OrderLineRequest {
                    product_id: self.product,
                    quantity: 2,
                    unit_price: None,
                }],
                remark: None,
            };
            self.fulfillment.create_order(self.tenant, request, self.operator)
        }
    }

    #[test]
    fn order_number_collision_regenerates_and_commits_once() {
        let f = CollidingFixture::new(MAX_ORDER_NUMBER_ATTEMPTS - 1);

        let order = f.order_two().unwrap();

        let tried = f.store.tried.lock().unwrap().clone();
        assert_eq!(tried.len(), MAX_ORDER_NUMBER_ATTEMPTS as usize);
        assert_eq!(order.number().unwrap().as_str(), tried.last().unwrap());
        assert_eq!(f.ledger.get_or_create(f.tenant, f.product).unwrap().quantity(), 3);
        assert_eq!(f.fulfillment.list_orders(f.tenant).unwrap().len(), 1);
        assert_eq!(f.ledger.movements(f.tenant, Some(f.product)).unwrap().len(), 2);
    }

    #[test]
    fn exhausted_order_number_attempts_is_conflict_and_changes_nothing() {
        let f = CollidingFixture::new(MAX_ORDER_NUMBER_ATTEMPTS);

        let err = f.order_two().unwrap_err();

        assert!(matches!(&err, DispatchError::Conflict(msg) if msg.contains("unique order number")), "{err:?}");
        assert_eq!(f.store.tried.lock().unwrap().len(), MAX_ORDER_NUMBER_ATTEMPTS as usize);
        assert_eq!(f.ledger.get_or_create(f.tenant, f.product).unwrap().quantity(), 5);
        assert!(f.fulfillment.list_orders(f.tenant).unwrap().is_empty());
        assert_eq!(f.ledger.movements(f.tenant, Some(f.product)).unwrap().len(), 1);
    }

    #[test]
    fn create_order_prices_reserves_and_persists() {
        let f = Fixture::new();
        let a = f.stocked("A", "10.00", 5);
        let b = f.stocked("B", "7.50", 5);

        let order = f
            .fulfillment
            .create_order(f.tenant, f.request(vec![(a, 2, None), (b, 1, Some("5.00"))]), f.operator)
            .unwrap();

        assert_eq!(order.total().to_string(), "25.00");
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.number().unwrap().as_str().starts_with("ORD"));
        assert_eq!(f.ledger.get_or_create(f.tenant, a).unwrap().quantity(), 3);
        assert_eq!(f.ledger.get_or_create(f.tenant, b).unwrap().quantity(), 4);
        assert_eq!(f.fulfillment.get_order(f.tenant, order.id_typed()).unwrap(), order);
    }

    #[test]
    fn unknown_product_creates_nothing() {
        let f = Fixture::new();
        let a = f.stocked("A", "1.00", 5);
        let ghost = ProductId::new(AggregateId::new());

        for price in [None, Some("1.00")] {
            let err = f
                .fulfillment
                .create_order(f.tenant, f.request(vec![(a, 1, None), (ghost, 1, price)]), f.operator)
                .unwrap_err();
            assert!(matches!(err, DispatchError::NotFound(ref m) if m.contains(&ghost.to_string())));
        }
        assert!(f.fulfillment.list_orders(f.tenant).unwrap().is_empty());
        assert_eq!(f.ledger.get_or_create(f.tenant, a).unwrap().quantity(), 5);
    }

    #[test]
    fn invalid_requests_are_rejected_up_front() {
        let f = Fixture::new();
        let a = f.stocked("A", "1.00", 5);

        for lines in [vec![], vec![(a, 0, None)], vec![(a, 1, None), (a, -1, None)]] {
            let err = f.fulfillment.create_order(f.tenant, f.request(lines), f.operator).unwrap_err();
            assert!(matches!(err, DispatchError::InvalidArgument(_)));
        }
    }

    #[test]
    fn list_orders_is_newest_first_and_tenant_scoped() {
        let f = Fixture::new();
        let a = f.stocked("A", "1.00", 10);

        let first = f.fulfillment.create_order(f.tenant, f.request(vec![(a, 1, None)]), f.operator).unwrap();
        let second = f.fulfillment.create_order(f.tenant, f.request(vec![(a, 1, None)]), f.operator).unwrap();

        let listed: Vec<OrderId> = f
            .fulfillment
            .list_orders(f.tenant)
            .unwrap()
            .iter()
            .map(|o| o.id_typed())
            .collect();
        assert_eq!(listed, vec![second.id_typed(), first.id_typed()]);
        assert!(f.fulfillment.list_orders(TenantId::new()).unwrap().is_empty());
        assert!(matches!(
            f.fulfillment.get_order(TenantId::new(), first.id_typed()),
            Err(DispatchError::NotFound(_))
        ));
    }

    #[test]
    fn status_updates_follow_the_lifecycle() {
        let f = Fixture::new();
        let a = f.stocked("A", "1.00", 10);
        let order = f.fulfillment.create_order(f.tenant, f.request(vec![(a, 2, None)]), f.operator).unwrap();
        let id = order.id_typed();

        assert!(matches!(
            f.fulfillment.update_status(f.tenant, id, "shipped", f.operator),
            Err(DispatchError::InvalidArgument(_))
        ));
        assert!(matches!(
            f.fulfillment.update_status(f.tenant, id, "pending", f.operator),
            Err(DispatchError::InvalidArgument(_))
        ));

        let cancelled = f.fulfillment.update_status(f.tenant, id, "cancelled", f.operator).unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);

        for target in ["processing", "completed", "cancelled", "bogus"] {
            assert!(matches!(
                f.fulfillment.update_status(f.tenant, id, target, f.operator),
                Err(DispatchError::Conflict(_))
            ));
        }

        // Cancellation does not restock.
        assert_eq!(f.ledger.get_or_create(f.tenant, a).unwrap().quantity(), 8);
        assert!(matches!(
            f.fulfillment.update_status(f.tenant, OrderId::new(AggregateId::new()), "processing", f.operator),
            Err(DispatchError::NotFound(_))
        ));
    }
}
