//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two instances with
/// the same attributes are the same value. [`crate::Money`] and order numbers are
/// value objects; inventory records and orders are aggregates with identity.
///
/// To "modify" a value object, create a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
