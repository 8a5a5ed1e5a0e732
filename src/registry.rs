//! Context registries and the provider catalog.
//!
//! [`DataCenter`] is an instantiable service object. Applications usually
//! hold one per process, but nothing here is global: independent instances
//! manage independent pools. All three tables sit behind one coarse mutex;
//! every operation is a short lookup or insert, and connection work always
//! happens outside the guard.
//!
//! Pooled contexts are keyed by integer. Keys grow from [`FIRST_POOL_KEY`]
//! and the next key is always the current maximum plus one, so removing a
//! context can make its key eligible for reuse. Named contexts are keyed by
//! string and adding under a taken name replaces the previous context.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::context::ExecutionContext;
use crate::error::{DalError, DalResult};
use crate::provider::ConnectionProvider;

/// Key assigned to the first context pooled into an empty pool.
pub const FIRST_POOL_KEY: i64 = 1;

#[derive(Default)]
struct DataCenterState {
    providers: HashMap<String, Arc<dyn ConnectionProvider>>,
    pool: BTreeMap<i64, Arc<ExecutionContext>>,
    named: HashMap<String, Arc<ExecutionContext>>,
}

/// Registry of connection providers plus the pooled and named context
/// tables.
#[derive(Default)]
pub struct DataCenter {
    inner: Mutex<DataCenterState>,
}

impl DataCenter {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Providers
    // ========================================================================

    /// Register `provider` under `id`. Registering an id again replaces the
    /// previous provider; existing contexts keep the connection they were
    /// created with.
    pub fn register_provider(
        &self,
        id: impl Into<String>,
        provider: impl ConnectionProvider + 'static,
    ) {
        let id = id.into();
        let mut inner = self.inner.lock();
        if inner.providers.insert(id.clone(), Arc::new(provider)).is_some() {
            info!(provider_id = %id, "Provider replaced");
        } else {
            info!(provider_id = %id, "Provider registered");
        }
    }

    /// Registered provider ids, sorted.
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock().providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Create and open a fresh context on the provider under `provider_id`.
    /// The context is not registered anywhere; pool or name it separately,
    /// or use [`Self::create_pooled`] / [`Self::create_named`].
    pub fn create_context(&self, provider_id: &str) -> DalResult<ExecutionContext> {
        let provider = self.provider(provider_id)?;
        ExecutionContext::connect(provider.as_ref())
    }

    fn provider(&self, provider_id: &str) -> DalResult<Arc<dyn ConnectionProvider>> {
        self.inner
            .lock()
            .providers
            .get(provider_id)
            .cloned()
            .ok_or_else(|| DalError::provider_not_found(provider_id))
    }

    // ========================================================================
    // Pooled contexts
    // ========================================================================

    /// Create a context on `provider_id` and pool it, returning its key
    /// alongside the shared handle.
    pub fn create_pooled(&self, provider_id: &str) -> DalResult<(i64, Arc<ExecutionContext>)> {
        let context = Arc::new(self.create_context(provider_id)?);
        let key = self.add_to_pool(context.clone());
        Ok((key, context))
    }

    /// Pool an existing context and return its key.
    pub fn add_to_pool(&self, context: Arc<ExecutionContext>) -> i64 {
        let mut inner = self.inner.lock();
        let key = inner
            .pool
            .last_key_value()
            .map(|(key, _)| key + 1)
            .unwrap_or(FIRST_POOL_KEY);
        inner.pool.insert(key, context);
        debug!(key, pooled = inner.pool.len(), "Context added to the pool");
        key
    }

    /// Look up the pooled context under `key`.
    pub fn pooled(&self, key: i64) -> DalResult<Arc<ExecutionContext>> {
        self.inner
            .lock()
            .pool
            .get(&key)
            .cloned()
            .ok_or_else(|| DalError::pool_key_not_found(key))
    }

    /// Remove and return the pooled context under `key`. Its connection is
    /// torn down once the last holder drops the returned handle.
    pub fn remove_from_pool(&self, key: i64) -> DalResult<Arc<ExecutionContext>> {
        let removed = self
            .inner
            .lock()
            .pool
            .remove(&key)
            .ok_or_else(|| DalError::pool_key_not_found(key))?;
        debug!(key, "Context removed from the pool");
        Ok(removed)
    }

    /// Whether the pool holds a context under `key`.
    pub fn pool_contains(&self, key: i64) -> bool {
        self.inner.lock().pool.contains_key(&key)
    }

    /// Keys currently in the pool, ascending.
    pub fn pool_keys(&self) -> Vec<i64> {
        self.inner.lock().pool.keys().copied().collect()
    }

    // ========================================================================
    // Named contexts
    // ========================================================================

    /// Create a context on `provider_id` and register it under `name`.
    pub fn create_named(
        &self,
        provider_id: &str,
        name: impl Into<String>,
    ) -> DalResult<Arc<ExecutionContext>> {
        let context = Arc::new(self.create_context(provider_id)?);
        self.add_named(name, context.clone());
        Ok(context)
    }

    /// Register `context` under `name`, replacing any previous holder of
    /// that name.
    pub fn add_named(&self, name: impl Into<String>, context: Arc<ExecutionContext>) {
        let name = name.into();
        let mut inner = self.inner.lock();
        if inner.named.insert(name.clone(), context).is_some() {
            debug!(name = %name, "Named context replaced");
        } else {
            debug!(name = %name, "Named context added");
        }
    }

    /// Look up the named context under `name`.
    pub fn named(&self, name: &str) -> DalResult<Arc<ExecutionContext>> {
        self.inner
            .lock()
            .named
            .get(name)
            .cloned()
            .ok_or_else(|| DalError::named_key_not_found(name))
    }

    /// Remove and return the named context under `name`.
    pub fn remove_named(&self, name: &str) -> DalResult<Arc<ExecutionContext>> {
        let removed = self
            .inner
            .lock()
            .named
            .remove(name)
            .ok_or_else(|| DalError::named_key_not_found(name))?;
        debug!(name = %name, "Named context removed");
        Ok(removed)
    }

    /// Whether a context is registered under `name`.
    pub fn named_contains(&self, name: &str) -> bool {
        self.inner.lock().named.contains_key(name)
    }

    /// Names currently registered, sorted.
    pub fn named_keys(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().named.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        BufferedCursor, Command, Connection, Cursor, DriverResult, IsolationLevel,
        TransactionHandle,
    };

    struct NullConnection {
        open: bool,
    }

    impl Connection for NullConnection {
        fn open(&mut self) -> DriverResult<()> {
            self.open = true;
            Ok(())
        }

        fn close(&mut self) -> DriverResult<()> {
            self.open = false;
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn begin_transaction(
            &mut self,
            isolation: IsolationLevel,
        ) -> DriverResult<TransactionHandle> {
            Ok(TransactionHandle::new(isolation))
        }

        fn commit(&mut self, _transaction: TransactionHandle) -> DriverResult<()> {
            Ok(())
        }

        fn rollback(&mut self, _transaction: TransactionHandle) -> DriverResult<()> {
            Ok(())
        }

        fn execute_non_query(&mut self, _command: &Command) -> DriverResult<u64> {
            Ok(0)
        }

        fn execute_reader<'c>(
            &'c mut self,
            _command: &Command,
        ) -> DriverResult<Box<dyn Cursor + 'c>> {
            Ok(Box::new(BufferedCursor::empty()))
        }

        fn call_procedure(&mut self, _command: &mut Command) -> DriverResult<u64> {
            Ok(0)
        }
    }

    struct NullProvider;

    impl ConnectionProvider for NullProvider {
        fn create_connection(&self) -> DriverResult<Box<dyn Connection>> {
            Ok(Box::new(NullConnection { open: false }))
        }
    }

    struct BrokenProvider;

    impl ConnectionProvider for BrokenProvider {
        fn create_connection(&self) -> DriverResult<Box<dyn Connection>> {
            Err("no connections available".into())
        }
    }

    fn center_with_provider() -> DataCenter {
        let center = DataCenter::new();
        center.register_provider("null", NullProvider);
        center
    }

    fn pooled_context(center: &DataCenter) -> Arc<ExecutionContext> {
        Arc::new(center.create_context("null").unwrap())
    }

    #[test]
    fn test_pool_keys_grow_from_one() {
        let center = center_with_provider();
        let a = center.add_to_pool(pooled_context(&center));
        let b = center.add_to_pool(pooled_context(&center));
        let c = center.add_to_pool(pooled_context(&center));
        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(center.pool_keys(), vec![1, 2, 3]);
    }

    #[test]
    fn test_removing_the_top_key_makes_it_reusable() {
        let center = center_with_provider();
        center.add_to_pool(pooled_context(&center));
        let top = center.add_to_pool(pooled_context(&center));
        center.remove_from_pool(top).unwrap();
        assert_eq!(center.add_to_pool(pooled_context(&center)), top);
    }

    #[test]
    fn test_removing_an_inner_key_leaves_a_gap() {
        let center = center_with_provider();
        for _ in 0..3 {
            center.add_to_pool(pooled_context(&center));
        }
        center.remove_from_pool(2).unwrap();
        assert_eq!(center.add_to_pool(pooled_context(&center)), 4);
        assert_eq!(center.pool_keys(), vec![1, 3, 4]);
    }

    #[test]
    fn test_pool_lookup_failures() {
        let center = center_with_provider();
        assert!(!center.pool_contains(9));
        assert!(matches!(
            center.pooled(9).unwrap_err(),
            DalError::PoolKeyNotFound { key: 9 }
        ));
        assert!(matches!(
            center.remove_from_pool(9).unwrap_err(),
            DalError::PoolKeyNotFound { key: 9 }
        ));
    }

    #[test]
    fn test_create_pooled_registers_and_returns_the_same_context() {
        let center = center_with_provider();
        let (key, context) = center.create_pooled("null").unwrap();
        assert_eq!(key, FIRST_POOL_KEY);
        assert!(center.pool_contains(key));
        assert!(Arc::ptr_eq(&context, &center.pooled(key).unwrap()));
        assert!(context.is_open());
    }

    #[test]
    fn test_named_add_is_an_overwrite() {
        let center = center_with_provider();
        let first = pooled_context(&center);
        let second = pooled_context(&center);
        center.add_named("billing", first.clone());
        center.add_named("billing", second.clone());
        let found = center.named("billing").unwrap();
        assert!(Arc::ptr_eq(&found, &second));
        assert!(!Arc::ptr_eq(&found, &first));
        assert_eq!(center.named_keys(), vec!["billing".to_string()]);
    }

    #[test]
    fn test_named_lookup_failures() {
        let center = center_with_provider();
        assert!(!center.named_contains("missing"));
        assert!(matches!(
            center.named("missing").unwrap_err(),
            DalError::NamedKeyNotFound { .. }
        ));
        assert!(matches!(
            center.remove_named("missing").unwrap_err(),
            DalError::NamedKeyNotFound { .. }
        ));
    }

    #[test]
    fn test_unknown_provider() {
        let center = DataCenter::new();
        assert!(matches!(
            center.create_context("sqlite").unwrap_err(),
            DalError::ProviderNotFound { .. }
        ));
    }

    #[test]
    fn test_provider_registration_overwrites() {
        let center = DataCenter::new();
        center.register_provider("db", BrokenProvider);
        assert!(matches!(
            center.create_context("db").unwrap_err(),
            DalError::Connection { .. }
        ));
        center.register_provider("db", NullProvider);
        assert!(center.create_context("db").is_ok());
        assert_eq!(center.provider_ids(), vec!["db".to_string()]);
    }

    #[test]
    fn test_remove_named_returns_the_context() {
        let center = center_with_provider();
        let context = pooled_context(&center);
        center.add_named("reports", context.clone());
        assert!(center.named_contains("reports"));
        let removed = center.remove_named("reports").unwrap();
        assert!(Arc::ptr_eq(&removed, &context));
        assert!(!center.named_contains("reports"));
        assert!(center.named("reports").is_err());
    }
}
