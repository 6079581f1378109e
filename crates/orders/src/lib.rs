//! Orders domain module (event-sourced).
//!
//! This crate contains business rules for customer orders (line amounts, totals,
//! status lifecycle), implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage). Stock reservation is coordinated by the fulfillment service
//! in `stockforge-infra`.

pub mod number;
pub mod order;
pub mod status;

pub use number::OrderNumber;
pub use order::{
    ChangeStatus, Order, OrderCommand, OrderEvent, OrderId, OrderLine, OrderPlaced,
    OrderStatusChanged, PlaceOrder, RequestedLine, price_lines,
};
pub use status::OrderStatus;

/// Stream type for orders in the event store.
pub const AGGREGATE_TYPE: &str = "orders.order";

/// Unique-claim scope for order numbers.
pub const ORDER_NUMBER_SCOPE: &str = "orders.order_number";
