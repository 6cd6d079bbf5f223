// src/tenant.rs

//! Per-tenant store selection.
//!
//! The registry opens stores lazily through a [`StoreFactory`], keeps them
//! cached, and hands out exclusive access one caller at a time. Holding the
//! per-tenant mutex for the whole engine run is what keeps two runs for the
//! same tenant from interleaving; different tenants never share a lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::errors::{ChoreError, Result};
use crate::store::{StoreFactory, TaskStore};

type SharedStore = Arc<Mutex<Box<dyn TaskStore>>>;

#[derive(Debug)]
pub struct TenantRegistry {
    factory: Arc<dyn StoreFactory>,
    stores: Mutex<HashMap<String, SharedStore>>,
}

impl TenantRegistry {
    pub fn new(factory: Arc<dyn StoreFactory>) -> Self {
        Self {
            factory,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Tenants the underlying factory can open.
    pub fn known_tenants(&self) -> Result<Vec<String>> {
        self.factory.tenants()
    }

    /// Tenants with a store currently open in this registry.
    pub fn open_tenants(&self) -> Result<Vec<String>> {
        let stores = self.lock_map()?;
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Run `f` with exclusive access to the tenant's store, opening it first
    /// if needed.
    pub fn with_store<R>(
        &self,
        tenant: &str,
        f: impl FnOnce(&mut dyn TaskStore) -> Result<R>,
    ) -> Result<R> {
        let handle = self.handle(tenant)?;
        let mut guard = handle
            .lock()
            .map_err(|e| ChoreError::LockError(format!("tenant '{tenant}': {e}")))?;
        f(&mut **guard)
    }

    /// Drop the cached store for a tenant. Returns `true` if one was open.
    ///
    /// A store still held by a caller stays cached, so nobody can open a
    /// second handle next to it; closing it then fails with `TenantBusy`.
    pub fn close(&self, tenant: &str) -> Result<bool> {
        let mut stores = self.lock_map()?;
        let busy = match stores.get(tenant) {
            None => return Ok(false),
            Some(handle) => in_use(handle),
        };
        if busy {
            return Err(ChoreError::TenantBusy(tenant.to_string()));
        }
        stores.remove(tenant);
        info!(tenant, "closed tenant store");
        Ok(true)
    }

    /// Drop every cached store nobody is using. Returns how many were dropped.
    pub fn evict_all(&self) -> Result<usize> {
        let mut stores = self.lock_map()?;
        let before = stores.len();
        stores.retain(|_, handle| in_use(handle));
        let count = before - stores.len();
        debug!(count, kept = stores.len(), "evicted idle tenant stores");
        Ok(count)
    }

    fn handle(&self, tenant: &str) -> Result<SharedStore> {
        let mut stores = self.lock_map()?;
        if let Some(existing) = stores.get(tenant) {
            return Ok(Arc::clone(existing));
        }
        let store = self.factory.open(tenant)?;
        info!(tenant, "opened tenant store");
        let shared: SharedStore = Arc::new(Mutex::new(store));
        stores.insert(tenant.to_string(), Arc::clone(&shared));
        Ok(shared)
    }

    // Handles are only cloned under the map lock, so the count cannot grow
    // while the caller holds it.
    fn lock_map(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SharedStore>>> {
        self.stores
            .lock()
            .map_err(|e| ChoreError::LockError(e.to_string()))
    }
}

fn in_use(handle: &SharedStore) -> bool {
    Arc::strong_count(handle) > 1
}
