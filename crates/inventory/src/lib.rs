//! Inventory ledger domain module (event-sourced).
//!
//! One `InventoryRecord` per (tenant, product) holds the on-hand quantity and
//! the warning line. Every quantity change is a `StockMoved` or `StockCounted`
//! event; those events are the movement audit trail. Pure domain logic only
//! (no IO, no HTTP, no storage).

pub mod alert;
pub mod movement;
pub mod record;

pub use alert::{AlertHook, ThresholdCrossed, crossed_warning_line};
pub use movement::{MovementKind, StockMovement};
pub use record::{
    AdjustStock, InventoryCommand, InventoryEvent, InventoryRecord, OpenRecord, RecordOpened,
    ReserveStock, SetWarningLine, StockCounted, StockMoved, TakeStock, WarningLineSet,
};

/// Stream type for inventory records in the event store.
pub const AGGREGATE_TYPE: &str = "inventory.record";
