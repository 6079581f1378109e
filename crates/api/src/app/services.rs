//! Service wiring for the HTTP layer.
//!
//! The ledger and fulfillment services are synchronous; handlers reach them
//! through `AppServices::run`, which moves the call onto the blocking pool.
//! The Postgres store drives its own queries from there.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::{info, warn};
use uuid::Uuid;

use stockforge_catalog::{Product, ProductId};
use stockforge_core::{TenantId, UserId};
use stockforge_events::{EventBus, InMemoryEventBus};
use stockforge_infra::{
    BusAlertHook, CommandDispatcher, CreateOrderRequest, DispatchError, InMemoryCatalog, InMemoryEventStore,
    InfraConfig, InventoryLedger, OrderFulfillment, PostgresCatalog, PostgresEventStore, ProductCatalog,
    event_store::{EventStore, EventStoreError},
};
use stockforge_inventory::{InventoryRecord, MovementKind, StockMovement, ThresholdCrossed};
use stockforge_orders::{Order, OrderId};

/// Crossings kept per tenant; older ones are dropped first.
pub const MAX_ALERTS_PER_TENANT: usize = 256;

/// Per-tenant list of recent threshold crossings, newest last.
#[derive(Debug)]
pub struct AlertInbox {
    inner: Mutex<HashMap<TenantId, VecDeque<ThresholdCrossed>>>,
    capacity: usize,
}

impl Default for AlertInbox {
    fn default() -> Self {
        Self::with_capacity(MAX_ALERTS_PER_TENANT)
    }
}

impl AlertInbox {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, signal: ThresholdCrossed) {
        if let Ok(mut map) = self.inner.lock() {
            let queue = map.entry(signal.tenant_id).or_default();
            if queue.len() == self.capacity {
                queue.pop_front();
            }
            queue.push_back(signal);
        }
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ThresholdCrossed> {
        self.inner
            .lock()
            .map(|map| {
                map.get(&tenant_id)
                    .map(|queue| queue.iter().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

type AlertBus = Arc<InMemoryEventBus<ThresholdCrossed>>;

/// The services bound to one event store backend.
pub struct Stack<S> {
    pub ledger: InventoryLedger<S>,
    pub fulfillment: OrderFulfillment<S>,
}

impl<S: EventStore> Stack<S> {
    fn new<C: ProductCatalog + 'static>(store: S, config: &InfraConfig, catalog: Arc<C>, bus: AlertBus) -> Self {
        let dispatcher =
            Arc::new(CommandDispatcher::new(store).with_max_commit_attempts(config.max_commit_attempts));
        let ledger = InventoryLedger::new(dispatcher.clone(), catalog.clone(), Arc::new(BusAlertHook::new(bus)));
        let fulfillment = OrderFulfillment::new(dispatcher, catalog, ledger.clone());
        Self { ledger, fulfillment }
    }
}

pub enum Backend {
    InMemory(Stack<InMemoryEventStore>),
    Postgres(Stack<PostgresEventStore>),
}

macro_rules! with_stack {
    ($backend:expr, $s:ident => $body:expr) => {
        match $backend {
            Backend::InMemory($s) => $body,
            Backend::Postgres($s) => $body,
        }
    };
}

pub struct AppServices {
    backend: Backend,
    catalog: Arc<dyn ProductCatalog>,
    alerts: Arc<AlertInbox>,
}

/// Build the services for `config`, connecting to Postgres when asked to.
pub async fn build_services(config: &InfraConfig) -> anyhow::Result<AppServices> {
    let alerts = Arc::new(AlertInbox::default());
    let bus: AlertBus = Arc::new(InMemoryEventBus::new());
    spawn_alert_subscriber(bus.clone(), alerts.clone());

    let (backend, catalog): (Backend, Arc<dyn ProductCatalog>) =
        match (config.use_persistent_stores, config.database_url.as_deref()) {
            (true, Some(url)) => {
                let store = PostgresEventStore::connect(url)
                    .await
                    .context("failed to connect the Postgres event store")?;
                let catalog = Arc::new(PostgresCatalog::new(store.pool()));
                info!("using Postgres event store and catalog");
                (
                    Backend::Postgres(Stack::new(store, config, catalog.clone(), bus)),
                    catalog as Arc<dyn ProductCatalog>,
                )
            }
            (true, None) => anyhow::bail!("USE_PERSISTENT_STORES is set but DATABASE_URL is missing"),
            (false, _) => {
                let catalog = Arc::new(InMemoryCatalog::new());
                info!("using in-memory event store and catalog");
                (
                    Backend::InMemory(Stack::new(InMemoryEventStore::new(), config, catalog.clone(), bus)),
                    catalog as Arc<dyn ProductCatalog>,
                )
            }
        };

    Ok(AppServices {
        backend,
        catalog,
        alerts,
    })
}

/// Drain the alert bus into the inbox on a dedicated thread.
fn spawn_alert_subscriber(bus: AlertBus, inbox: Arc<AlertInbox>) {
    let sub = bus.subscribe();
    std::thread::spawn(move || {
        while let Ok(signal) = sub.recv() {
            inbox.push(signal);
        }
    });
}

impl AppServices {
    /// Run `f` on the blocking pool.
    pub async fn run<T, F>(self: &Arc<Self>, f: F) -> Result<T, DispatchError>
    where
        T: Send + 'static,
        F: FnOnce(&AppServices) -> Result<T, DispatchError> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(&this)).await.map_err(|e| {
            warn!(error = %e, "blocking task failed");
            DispatchError::Store(EventStoreError::Backend(e.to_string()))
        })?
    }

    pub fn register_product(&self, product: Product) -> Result<Product, DispatchError> {
        self.catalog.register(product)
    }

    pub fn product(&self, tenant_id: TenantId, product_id: ProductId) -> Result<Product, DispatchError> {
        self.catalog
            .product(tenant_id, product_id)?
            .ok_or_else(|| DispatchError::NotFound(format!("product {product_id}")))
    }

    pub fn alerts(&self, tenant_id: TenantId) -> Vec<ThresholdCrossed> {
        self.alerts.list(tenant_id)
    }

    pub fn inventory(&self, tenant_id: TenantId, product_id: ProductId) -> Result<InventoryRecord, DispatchError> {
        with_stack!(&self.backend, s => s.ledger.get_or_create(tenant_id, product_id))
    }

    pub fn inventory_list(&self, tenant_id: TenantId) -> Result<Vec<InventoryRecord>, DispatchError> {
        with_stack!(&self.backend, s => s.ledger.list(tenant_id))
    }

    pub fn stocktake(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
        operator: UserId,
        note: Option<String>,
    ) -> Result<InventoryRecord, DispatchError> {
        with_stack!(&self.backend, s => s.ledger.set_absolute(tenant_id, product_id, quantity, operator, note))
    }

    pub fn set_warning_line(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        threshold: i64,
        operator: UserId,
    ) -> Result<InventoryRecord, DispatchError> {
        with_stack!(&self.backend, s => s.ledger.set_warning_line(tenant_id, product_id, threshold, operator))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn move_stock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        kind: MovementKind,
        quantity: i64,
        operator: UserId,
        batch: Option<String>,
        note: Option<String>,
    ) -> Result<InventoryRecord, DispatchError> {
        if quantity <= 0 {
            return Err(DispatchError::InvalidArgument("quantity must be positive".to_string()));
        }
        let delta = match kind {
            MovementKind::Inbound => quantity,
            MovementKind::Outbound => -quantity,
            MovementKind::StocktakeAbsolute => {
                return Err(DispatchError::InvalidArgument(
                    "use /inventory/{product}/stocktake for stocktakes".to_string(),
                ));
            }
        };
        with_stack!(&self.backend, s => s.ledger.adjust(tenant_id, product_id, delta, kind, operator, batch, note))
    }

    pub fn movements(
        &self,
        tenant_id: TenantId,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockMovement>, DispatchError> {
        with_stack!(&self.backend, s => s.ledger.movements(tenant_id, product_id))
    }

    pub fn movement(&self, tenant_id: TenantId, movement_id: Uuid) -> Result<StockMovement, DispatchError> {
        self.movements(tenant_id, None)?
            .into_iter()
            .find(|m| m.id == movement_id)
            .ok_or_else(|| DispatchError::NotFound(format!("stock movement {movement_id}")))
    }

    pub fn create_order(
        &self,
        tenant_id: TenantId,
        request: CreateOrderRequest,
        operator: UserId,
    ) -> Result<Order, DispatchError> {
        with_stack!(&self.backend, s => s.fulfillment.create_order(tenant_id, request, operator))
    }

    pub fn order(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Order, DispatchError> {
        with_stack!(&self.backend, s => s.fulfillment.get_order(tenant_id, order_id))
    }

    pub fn orders(&self, tenant_id: TenantId) -> Result<Vec<Order>, DispatchError> {
        with_stack!(&self.backend, s => s.fulfillment.list_orders(tenant_id))
    }

    pub fn update_order_status(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        status: String,
        operator: UserId,
    ) -> Result<Order, DispatchError> {
        with_stack!(&self.backend, s => s.fulfillment.update_status(tenant_id, order_id, &status, operator))
    }
}
