//! Product catalog storage behind the `CatalogLookup` seam.
//!
//! `InMemoryCatalog` serves tests and dev; `PostgresCatalog` keeps products
//! next to the event store so a restart does not orphan inventory streams.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryCatalog;
pub use postgres::PostgresCatalog;

use stockforge_catalog::{CatalogLookup, Product, ProductId};
use stockforge_core::TenantId;

use crate::command_dispatcher::DispatchError;

/// A catalog that can also register products.
///
/// SKUs are unique per tenant, compared case-insensitively; a clash is `Conflict`.
pub trait ProductCatalog: CatalogLookup {
    fn register(&self, product: Product) -> Result<Product, DispatchError>;

    fn product(&self, tenant_id: TenantId, product_id: ProductId) -> Result<Option<Product>, DispatchError>;
}
