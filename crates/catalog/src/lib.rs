//! Catalog Lookup collaborator boundary.
//!
//! The product catalog is owned elsewhere. Stock and order logic only need to
//! know whether a product exists for a tenant and what it currently costs.

pub mod lookup;
pub mod product;

pub use lookup::CatalogLookup;
pub use product::{Product, ProductId};
