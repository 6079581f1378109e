//! Inventory Ledger service.
//!
//! Single entry point for every quantity change. Each operation runs as one
//! optimistic unit of work through the `CommandDispatcher`; the alert hook is
//! consulted only after the unit commits, using the quantities of the attempt
//! that actually committed.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use stockforge_catalog::{CatalogLookup, ProductId};
use stockforge_core::{AggregateId, TenantId, UserId};
use stockforge_inventory::{
    AGGREGATE_TYPE, AdjustStock, AlertHook, InventoryCommand, InventoryEvent, InventoryRecord, MovementKind,
    OpenRecord, ReserveStock, SetWarningLine, StockMovement, TakeStock, ThresholdCrossed, crossed_warning_line,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, Staged, UnitOfWork};
use crate::event_store::EventStore;

/// One requested deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Per-product outcome of a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedProduct {
    pub product_id: ProductId,
    /// Sum of every line for this product.
    pub quantity: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub warning_line: i64,
}

/// Proof that stock for every line was deducted together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationTicket {
    pub tenant_id: TenantId,
    pub reference: Option<String>,
    /// Sorted by product id.
    pub products: Vec<ReservedProduct>,
    pub reserved_at: DateTime<Utc>,
}

fn make_record(_: TenantId, id: AggregateId) -> InventoryRecord {
    InventoryRecord::empty(ProductId::new(id))
}

pub struct InventoryLedger<S> {
    dispatcher: Arc<CommandDispatcher<S>>,
    catalog: Arc<dyn CatalogLookup>,
    alerts: Arc<dyn AlertHook>,
}

impl<S> Clone for InventoryLedger<S> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            catalog: self.catalog.clone(),
            alerts: self.alerts.clone(),
        }
    }
}

impl<S> InventoryLedger<S>
where
    S: EventStore,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S>>,
        catalog: Arc<dyn CatalogLookup>,
        alerts: Arc<dyn AlertHook>,
    ) -> Self {
        Self {
            dispatcher,
            catalog,
            alerts,
        }
    }

    fn ensure_product(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DispatchError> {
        if self.catalog.exists(tenant_id, product_id) {
            Ok(())
        } else {
            Err(DispatchError::NotFound(format!("product {product_id}")))
        }
    }

    /// Run one inventory command as its own unit of work.
    fn run(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        command: InventoryCommand,
    ) -> Result<Staged<InventoryRecord>, DispatchError> {
        self.ensure_product(tenant_id, product_id)?;
        let (staged, _) = self.dispatcher.transact(tenant_id, |uow| {
            uow.execute(product_id.0, AGGREGATE_TYPE, &command, make_record)
        })?;
        Ok(staged)
    }

    /// Return the record, creating it (quantity 0, warning line 0) if absent.
    pub fn get_or_create(&self, tenant_id: TenantId, product_id: ProductId) -> Result<InventoryRecord, DispatchError> {
        let staged = self.run(
            tenant_id,
            product_id,
            InventoryCommand::OpenRecord(OpenRecord {
                tenant_id,
                product_id,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(staged.after)
    }

    /// Apply a signed delta (`kind` must agree with its sign).
    #[allow(clippy::too_many_arguments)]
    pub fn adjust(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        delta: i64,
        kind: MovementKind,
        operator: UserId,
        batch: Option<String>,
        note: Option<String>,
    ) -> Result<InventoryRecord, DispatchError> {
        let staged = self.run(
            tenant_id,
            product_id,
            InventoryCommand::AdjustStock(AdjustStock {
                tenant_id,
                product_id,
                delta,
                kind,
                operator,
                batch,
                note,
                occurred_at: Utc::now(),
            }),
        )?;

        info!(
            tenant_id = %tenant_id,
            product_id = %product_id,
            kind = %kind,
            delta,
            quantity = staged.after.quantity(),
            "stock adjusted"
        );
        self.check_threshold(tenant_id, &staged.before, &staged.after);
        Ok(staged.after)
    }

    /// Stocktake: overwrite the quantity with a counted value.
    pub fn set_absolute(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
        operator: UserId,
        note: Option<String>,
    ) -> Result<InventoryRecord, DispatchError> {
        let staged = self.run(
            tenant_id,
            product_id,
            InventoryCommand::TakeStock(TakeStock {
                tenant_id,
                product_id,
                quantity,
                operator,
                note,
                occurred_at: Utc::now(),
            }),
        )?;

        info!(
            tenant_id = %tenant_id,
            product_id = %product_id,
            previous = staged.before.quantity(),
            counted = quantity,
            "stocktake recorded"
        );
        self.check_threshold(tenant_id, &staged.before, &staged.after);
        Ok(staged.after)
    }

    pub fn set_warning_line(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        threshold: i64,
        operator: UserId,
    ) -> Result<InventoryRecord, DispatchError> {
        let staged = self.run(
            tenant_id,
            product_id,
            InventoryCommand::SetWarningLine(SetWarningLine {
                tenant_id,
                product_id,
                threshold,
                operator,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(staged.after)
    }

    /// Deduct every line or nothing.
    pub fn reserve_many(
        &self,
        tenant_id: TenantId,
        lines: &[StockLine],
        operator: UserId,
        reference: Option<String>,
    ) -> Result<ReservationTicket, DispatchError> {
        let now = Utc::now();
        let (ticket, _) = self.dispatcher.transact(tenant_id, |uow| {
            self.stage_reservation(uow, lines, operator, reference.clone(), now)
        })?;
        self.notify_reservation(&ticket);
        Ok(ticket)
    }

    /// Stage a reservation inside a caller-owned unit of work.
    ///
    /// Lines for the same product are validated together; products are staged
    /// in sorted id order. The caller must call `notify_reservation` once the
    /// unit has committed.
    pub fn stage_reservation(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        lines: &[StockLine],
        operator: UserId,
        reference: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<ReservationTicket, DispatchError> {
        let tenant_id = uow.tenant_id();

        if lines.is_empty() {
            return Err(DispatchError::InvalidArgument("reservation has no lines".to_string()));
        }
        let mut by_product: BTreeMap<ProductId, Vec<i64>> = BTreeMap::new();
        for line in lines {
            if line.quantity <= 0 {
                return Err(DispatchError::InvalidArgument(format!(
                    "quantity for product {} must be positive",
                    line.product_id
                )));
            }
            by_product.entry(line.product_id).or_default().push(line.quantity);
        }
        for product_id in by_product.keys() {
            self.ensure_product(tenant_id, *product_id)?;
        }

        let mut products = Vec::with_capacity(by_product.len());
        for (product_id, quantities) in by_product {
            let command = InventoryCommand::ReserveStock(ReserveStock {
                tenant_id,
                product_id,
                quantities: quantities.clone(),
                operator,
                reference: reference.clone(),
                occurred_at,
            });
            let staged = uow.execute(product_id.0, AGGREGATE_TYPE, &command, make_record)?;
            products.push(ReservedProduct {
                product_id,
                quantity: quantities.iter().sum(),
                quantity_before: staged.before.quantity(),
                quantity_after: staged.after.quantity(),
                warning_line: staged.after.warning_line(),
            });
        }

        Ok(ReservationTicket {
            tenant_id,
            reference,
            products,
            reserved_at: occurred_at,
        })
    }

    /// Raise threshold signals for a committed reservation.
    pub fn notify_reservation(&self, ticket: &ReservationTicket) {
        for p in &ticket.products {
            if crossed_warning_line(p.quantity_before, p.quantity_after, p.warning_line) {
                self.on_threshold_crossed(ticket.tenant_id, p.product_id, p.quantity_after, p.warning_line);
            }
        }
    }

    fn check_threshold(&self, tenant_id: TenantId, before: &InventoryRecord, after: &InventoryRecord) {
        if crossed_warning_line(before.quantity(), after.quantity(), after.warning_line()) {
            self.on_threshold_crossed(tenant_id, after.product_id(), after.quantity(), after.warning_line());
        }
    }

    /// Fire-and-forget signal to the alert hook.
    pub fn on_threshold_crossed(&self, tenant_id: TenantId, product_id: ProductId, quantity: i64, warning_line: i64) {
        self.alerts.on_threshold_crossed(&ThresholdCrossed {
            tenant_id,
            product_id,
            quantity,
            warning_line,
            occurred_at: Utc::now(),
        });
    }

    /// Every inventory record of the tenant, in creation order.
    pub fn list(&self, tenant_id: TenantId) -> Result<Vec<InventoryRecord>, DispatchError> {
        let records = self.dispatcher.load_all(tenant_id, AGGREGATE_TYPE, make_record)?;
        Ok(records.into_iter().filter(|r| r.is_opened()).collect())
    }

    /// Movement history, newest first, optionally for one product.
    pub fn movements(
        &self,
        tenant_id: TenantId,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockMovement>, DispatchError> {
        let events = self.dispatcher.store().load_by_type(tenant_id, AGGREGATE_TYPE)?;

        let mut movements = Vec::new();
        for stored in events.iter().rev() {
            if product_id.is_some_and(|p| p.0 != stored.aggregate_id) {
                continue;
            }
            let event: InventoryEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
            if let Some(m) = StockMovement::from_event(stored.event_id, &event) {
                movements.push(m);
            }
        }
        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use stockforge_catalog::Product;
    use stockforge_core::Money;

    use crate::catalog::InMemoryCatalog;
    use crate::event_store::InMemoryEventStore;

    #[derive(Default)]
    struct RecordingHook(Mutex<Vec<ThresholdCrossed>>);

    impl AlertHook for RecordingHook {
        fn on_threshold_crossed(&self, signal: &ThresholdCrossed) {
            self.0.lock().unwrap().push(signal.clone());
        }
    }

    struct Fixture {
        ledger: InventoryLedger<InMemoryEventStore>,
        catalog: Arc<InMemoryCatalog>,
        hook: Arc<RecordingHook>,
        tenant: TenantId,
        operator: UserId,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = Arc::new(InMemoryCatalog::new());
            let hook = Arc::new(RecordingHook::default());
            let dispatcher = Arc::new(CommandDispatcher::new(InMemoryEventStore::new()));
            Self {
                ledger: InventoryLedger::new(dispatcher, catalog.clone(), hook.clone()),
                catalog,
                hook,
                tenant: TenantId::new(),
                operator: UserId::new(),
            }
        }

        fn product(&self, sku: &str) -> ProductId {
            self.catalog
                .register(Product::new(self.tenant, sku, Money::from_minor(100)).unwrap())
                .unwrap()
                .id
        }

        fn inbound(&self, product: ProductId, qty: i64) -> InventoryRecord {
            self.ledger
                .adjust(self.tenant, product, qty, MovementKind::Inbound, self.operator, None, None)
                .unwrap()
        }
    }

    #[test]
    fn unknown_product_is_not_found() {
        let f = Fixture::new();
        let ghost = ProductId::new(AggregateId::new());
        assert!(matches!(f.ledger.get_or_create(f.tenant, ghost), Err(DispatchError::NotFound(_))));
        assert!(matches!(
            f.ledger.adjust(f.tenant, ghost, 1, MovementKind::Inbound, f.operator, None, None),
            Err(DispatchError::NotFound(_))
        ));
    }

    #[test]
    fn get_or_create_starts_at_zero_and_is_stable() {
        let f = Fixture::new();
        let p = f.product("A");
        let first = f.ledger.get_or_create(f.tenant, p).unwrap();
        let second = f.ledger.get_or_create(f.tenant, p).unwrap();
        assert_eq!(first.quantity(), 0);
        assert_eq!(first.warning_line(), 0);
        assert_eq!(first, second);
        assert_eq!(f.ledger.list(f.tenant).unwrap().len(), 1);
        assert!(f.ledger.movements(f.tenant, Some(p)).unwrap().is_empty());
    }

    #[test]
    fn failed_outbound_leaves_no_movement() {
        let f = Fixture::new();
        let p = f.product("A");
        f.inbound(p, 2);

        let err = f
            .ledger
            .adjust(f.tenant, p, -3, MovementKind::Outbound, f.operator, None, None)
            .unwrap_err();
        assert!(matches!(err, DispatchError::InsufficientStock { requested: 3, available: 2, .. }));
        assert_eq!(f.ledger.get_or_create(f.tenant, p).unwrap().quantity(), 2);
        assert_eq!(f.ledger.movements(f.tenant, Some(p)).unwrap().len(), 1);
    }

    #[test]
    fn stocktake_writes_movement_with_old_and_new_values() {
        let f = Fixture::new();
        let p = f.product("A");
        f.inbound(p, 10);

        let record = f.ledger.set_absolute(f.tenant, p, 4, f.operator, None).unwrap();
        assert_eq!(record.quantity(), 4);

        let movements = f.ledger.movements(f.tenant, Some(p)).unwrap();
        assert_eq!(movements[0].kind, MovementKind::StocktakeAbsolute);
        assert_eq!((movements[0].quantity_before, movements[0].quantity_after), (10, 4));

        assert!(matches!(
            f.ledger.set_absolute(f.tenant, p, -1, f.operator, None),
            Err(DispatchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn stocktake_below_line_fires_alert() {
        let f = Fixture::new();
        let p = f.product("A");
        f.inbound(p, 10);
        f.ledger.set_warning_line(f.tenant, p, 5, f.operator).unwrap();

        f.ledger.set_absolute(f.tenant, p, 5, f.operator, None).unwrap();
        f.ledger.set_absolute(f.tenant, p, 2, f.operator, None).unwrap();

        let alerts = f.hook.0.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].quantity, 5);
    }

    #[test]
    fn reserve_many_is_all_or_nothing() {
        let f = Fixture::new();
        let a = f.product("A");
        let b = f.product("B");
        f.inbound(a, 10);
        f.inbound(b, 1);

        let err = f
            .ledger
            .reserve_many(
                f.tenant,
                &[StockLine { product_id: a, quantity: 4 }, StockLine { product_id: b, quantity: 2 }],
                f.operator,
                None,
            )
            .unwrap_err();
        match err {
            DispatchError::InsufficientStock { product, .. } => assert_eq!(product, b.to_string()),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(f.ledger.get_or_create(f.tenant, a).unwrap().quantity(), 10);
        assert_eq!(f.ledger.get_or_create(f.tenant, b).unwrap().quantity(), 1);

        let ticket = f
            .ledger
            .reserve_many(
                f.tenant,
                &[StockLine { product_id: a, quantity: 4 }, StockLine { product_id: b, quantity: 1 }],
                f.operator,
                Some("ORD-T".to_string()),
            )
            .unwrap();
        assert_eq!(ticket.products.len(), 2);
        assert_eq!(f.ledger.get_or_create(f.tenant, a).unwrap().quantity(), 6);
        assert_eq!(f.ledger.get_or_create(f.tenant, b).unwrap().quantity(), 0);

        let outbound: Vec<_> = f
            .ledger
            .movements(f.tenant, None)
            .unwrap()
            .into_iter()
            .filter(|m| m.kind == MovementKind::Outbound)
            .collect();
        assert_eq!(outbound.len(), 2);
        assert!(outbound.iter().all(|m| m.reference.as_deref() == Some("ORD-T")));
    }

    #[test]
    fn movements_are_newest_first_and_filterable() {
        let f = Fixture::new();
        let a = f.product("A");
        let b = f.product("B");
        f.inbound(a, 1);
        f.inbound(b, 2);
        f.inbound(a, 3);

        let all = f.ledger.movements(f.tenant, None).unwrap();
        assert_eq!(all.iter().map(|m| m.quantity).collect::<Vec<_>>(), vec![3, 2, 1]);

        let only_a = f.ledger.movements(f.tenant, Some(a)).unwrap();
        assert_eq!(only_a.len(), 2);
        assert!(only_a.iter().all(|m| m.product_id == a));

        assert!(f.ledger.movements(TenantId::new(), None).unwrap().is_empty());
    }
}
