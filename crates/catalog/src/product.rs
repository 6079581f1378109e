use serde::{Deserialize, Serialize};

use stockforge_core::{AggregateId, DomainError, Entity, Money, TenantId};

/// Product identifier (tenant-scoped via the owning `Product::tenant_id`).
///
/// The inventory record for a product uses the same id as its stream id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for ProductId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Catalog entry as seen by stock and order logic.
///
/// Descriptive fields (name, unit, pricing metadata) stay with the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    /// Stock-keeping code, unique per tenant.
    pub sku: String,
    pub unit_price: Money,
}

impl Product {
    pub fn new(tenant_id: TenantId, sku: impl Into<String>, unit_price: Money) -> Result<Self, DomainError> {
        let sku = sku.into().trim().to_string();
        if sku.is_empty() {
            return Err(DomainError::invalid_argument("sku cannot be empty"));
        }
        Ok(Self {
            id: ProductId::new(AggregateId::new()),
            tenant_id,
            sku,
            unit_price,
        })
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
