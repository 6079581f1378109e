//! Infrastructure layer: event storage, the unit-of-work dispatcher, the
//! ledger and fulfillment services, catalog storage, alert delivery and config.

pub mod alert;
pub mod catalog;
pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod fulfillment;
pub mod ledger;
pub mod read_model;


pub use alert::{BusAlertHook, TracingAlertHook};
pub use catalog::{InMemoryCatalog, PostgresCatalog, ProductCatalog};
pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use config::InfraConfig;
pub use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
pub use fulfillment::{CreateOrderRequest, OrderFulfillment, OrderLineRequest};
pub use ledger::{InventoryLedger, ReservationTicket, ReservedProduct, StockLine};
