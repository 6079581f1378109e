use std::sync::{Arc, Mutex};

use stockforge_catalog::{CatalogLookup, Product, ProductId};
use stockforge_core::{DomainError, Money, TenantId};

use super::ProductCatalog;
use crate::command_dispatcher::DispatchError;
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Tenant-isolated product registry with per-tenant unique SKUs.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: Arc<InMemoryTenantStore<ProductId, Product>>,
    /// Serializes registrations so the SKU check and insert are one step.
    register_lock: Mutex<()>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a product. Fails with `Conflict` if the SKU is taken in this tenant.
    pub fn register(&self, product: Product) -> Result<Product, DomainError> {
        let _guard = self
            .register_lock
            .lock()
            .map_err(|_| DomainError::invariant("catalog lock poisoned"))?;

        let taken = self
            .products
            .find(product.tenant_id, &|p: &Product| p.sku.eq_ignore_ascii_case(&product.sku));
        if taken.is_some() {
            return Err(DomainError::conflict(format!("sku '{}' already exists", product.sku)));
        }

        self.products.upsert(product.tenant_id, product.id, product.clone());
        Ok(product)
    }

    pub fn get(&self, tenant_id: TenantId, product_id: ProductId) -> Option<Product> {
        self.products.get(tenant_id, &product_id)
    }
}

impl CatalogLookup for InMemoryCatalog {
    fn exists(&self, tenant_id: TenantId, product_id: ProductId) -> bool {
        self.get(tenant_id, product_id).is_some()
    }

    fn price_of(&self, tenant_id: TenantId, product_id: ProductId) -> Option<Money> {
        self.get(tenant_id, product_id).map(|p| p.unit_price)
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn register(&self, product: Product) -> Result<Product, DispatchError> {
        Ok(InMemoryCatalog::register(self, product)?)
    }

    fn product(&self, tenant_id: TenantId, product_id: ProductId) -> Result<Option<Product>, DispatchError> {
        Ok(self.get(tenant_id, product_id))
    }
}
