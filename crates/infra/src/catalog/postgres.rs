//! Postgres-backed product catalog.
//!
//! Shares the event store's pool and database; the schema is in
//! `migrations/0002_catalog.sql`. Lookups used by the ledger (`exists`,
//! `price_of`) treat a storage failure as "not found" and log it.

use std::sync::Arc;

use sqlx::{PgPool, Row};
use tracing::{instrument, warn};

use stockforge_catalog::{CatalogLookup, Product, ProductId};
use stockforge_core::{AggregateId, Money, TenantId};

use super::ProductCatalog;
use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStoreError;
use crate::event_store::postgres::{map_sqlx_error, runtime};

const SKU_CONSTRAINT: &str = "products_tenant_sku_key";

#[derive(Debug, Clone)]
pub struct PostgresCatalog {
    pool: Arc<PgPool>,
}

impl PostgresCatalog {
    /// Expects the bundled migrations to have run (see `PostgresEventStore::connect`).
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self, product), fields(tenant_id = %product.tenant_id, sku = %product.sku), err)]
    pub async fn register_async(&self, product: Product) -> Result<Product, DispatchError> {
        let price = i64::try_from(product.unit_price.minor())
            .map_err(|_| DispatchError::InvalidArgument(format!("unit price {} is too large", product.unit_price)))?;

        sqlx::query(
            r#"
            INSERT INTO products (tenant_id, product_id, sku, sku_lower, unit_price_minor)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product.tenant_id.as_uuid())
        .bind(product.id.0.as_uuid())
        .bind(&product.sku)
        .bind(product.sku.to_lowercase())
        .bind(price)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_sku_violation(&e) {
                DispatchError::Conflict(format!("sku '{}' already exists", product.sku))
            } else {
                map_sqlx_error("insert_product", e).into()
            }
        })?;

        Ok(product)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    pub async fn get_async(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<Product>, DispatchError> {
        let row = sqlx::query(
            r#"
            SELECT product_id, sku, unit_price_minor
            FROM products
            WHERE tenant_id = $1 AND product_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.0.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let read = |e: sqlx::Error| EventStoreError::Backend(format!("failed to read product row: {e}"));
        let id: uuid::Uuid = row.try_get("product_id").map_err(read)?;
        let sku: String = row.try_get("sku").map_err(read)?;
        let price: i64 = row.try_get("unit_price_minor").map_err(read)?;
        let price = u64::try_from(price)
            .map_err(|_| EventStoreError::Backend(format!("negative unit price for product {id}")))?;

        Ok(Some(Product {
            id: ProductId::new(AggregateId::from_uuid(id)),
            tenant_id,
            sku,
            unit_price: Money::from_minor(price),
        }))
    }

    fn lookup(&self, tenant_id: TenantId, product_id: ProductId) -> Option<Product> {
        match ProductCatalog::product(self, tenant_id, product_id) {
            Ok(found) => found,
            Err(e) => {
                warn!(%tenant_id, %product_id, error = %e, "catalog lookup failed");
                None
            }
        }
    }
}

fn is_sku_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(SKU_CONSTRAINT);
    }
    false
}

impl ProductCatalog for PostgresCatalog {
    fn register(&self, product: Product) -> Result<Product, DispatchError> {
        runtime()?.block_on(self.register_async(product))
    }

    fn product(&self, tenant_id: TenantId, product_id: ProductId) -> Result<Option<Product>, DispatchError> {
        runtime()?.block_on(self.get_async(tenant_id, product_id))
    }
}

impl CatalogLookup for PostgresCatalog {
    fn exists(&self, tenant_id: TenantId, product_id: ProductId) -> bool {
        self.lookup(tenant_id, product_id).is_some()
    }

    fn price_of(&self, tenant_id: TenantId, product_id: ProductId) -> Option<Money> {
        self.lookup(tenant_id, product_id).map(|p| p.unit_price)
    }
}
