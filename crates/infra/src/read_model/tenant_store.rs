use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use stockforge_core::TenantId;

/// Tenant-partitioned key/value storage for reference data and read models.
///
/// Lookups never cross a tenant boundary: a key that exists under another
/// tenant is simply absent.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
    /// First value in the tenant's partition matching `pred`.
    fn find(&self, tenant_id: TenantId, pred: &dyn Fn(&V) -> bool) -> Option<V>;
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn find(&self, tenant_id: TenantId, pred: &dyn Fn(&V) -> bool) -> Option<V> {
        (**self).find(tenant_id, pred)
    }
}

#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    partitions: RwLock<HashMap<TenantId, HashMap<K, V>>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let partitions = self.partitions.read().ok()?;
        partitions.get(&tenant_id)?.get(key).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut partitions) = self.partitions.write() {
            partitions.entry(tenant_id).or_default().insert(key, value);
        }
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let Ok(partitions) = self.partitions.read() else {
            return vec![];
        };
        partitions
            .get(&tenant_id)
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default()
    }

    fn find(&self, tenant_id: TenantId, pred: &dyn Fn(&V) -> bool) -> Option<V> {
        let partitions = self.partitions.read().ok()?;
        partitions.get(&tenant_id)?.values().find(|v| pred(v)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_do_not_leak_between_tenants() {
        let store: InMemoryTenantStore<&'static str, i64> = InMemoryTenantStore::new();
        let a = TenantId::new();
        let b = TenantId::new();

        store.upsert(a, "x", 1);
        store.upsert(a, "x", 2);
        store.upsert(b, "y", 3);

        assert_eq!(store.get(a, &"x"), Some(2));
        assert_eq!(store.get(b, &"x"), None);
        assert_eq!(store.list(a), vec![2]);
        assert_eq!(store.find(b, &|v| *v == 3), Some(3));
        assert_eq!(store.find(a, &|v| *v == 3), None);
    }
}
