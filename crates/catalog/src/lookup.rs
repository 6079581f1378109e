use std::sync::Arc;

use stockforge_core::{Money, TenantId};

use crate::ProductId;

/// Read-only view of the product catalog.
///
/// Implementations must be tenant-scoped: a product registered under one tenant
/// does not exist for any other.
pub trait CatalogLookup: Send + Sync {
    /// Whether the product exists for this tenant.
    fn exists(&self, tenant_id: TenantId, product_id: ProductId) -> bool;

    /// Current unit price snapshot, or `None` if the product does not exist.
    fn price_of(&self, tenant_id: TenantId, product_id: ProductId) -> Option<Money>;
}

impl<C> CatalogLookup for Arc<C>
where
    C: CatalogLookup + ?Sized,
{
    fn exists(&self, tenant_id: TenantId, product_id: ProductId) -> bool {
        (**self).exists(tenant_id, product_id)
    }

    fn price_of(&self, tenant_id: TenantId, product_id: ProductId) -> Option<Money> {
        (**self).price_of(tenant_id, product_id)
    }
}
