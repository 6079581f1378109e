//! Tenant-isolated key/value storage.

pub mod tenant_store;

pub use tenant_store::{InMemoryTenantStore, TenantStore};
