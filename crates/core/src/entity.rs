//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Used for records owned by collaborators (e.g. catalog products) that are
/// referenced by id but not event-sourced by this system.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
