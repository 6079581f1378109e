//! Domain events and the in-process event bus.
//!
//! Events are facts: immutable, versioned, append-only. The bus is a transport
//! for fire-and-forget signals (e.g. low-stock alerts); the event store, not the
//! bus, is the source of truth.

pub mod bus;
pub mod event;
pub mod in_memory_bus;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use tenant::TenantScoped;
