//! Read-only store handle for display layers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::store::{ClusterStore, IntoPath, StoreError, StoreValue};

/// Shared, read-only view of a [`ClusterStore`].
///
/// Only collectors and the identity probe write to the store; everything
/// handed out of the crate gets this instead.
#[derive(Debug, Clone)]
pub struct StoreReader {
    store: Arc<ClusterStore>,
}

impl StoreReader {
    pub(crate) fn new(store: Arc<ClusterStore>) -> Self {
        Self { store }
    }

    /// See [`ClusterStore::get`].
    pub fn get(&self, path: impl IntoPath) -> Result<StoreValue, StoreError> {
        self.store.get(path)
    }

    /// See [`ClusterStore::get_or`].
    pub fn get_or(
        &self,
        path: impl IntoPath,
        default: impl Into<StoreValue>,
    ) -> Result<StoreValue, StoreError> {
        self.store.get_or(path, default)
    }

    pub fn get_bool_or(&self, path: impl IntoPath, default: bool) -> Result<bool, StoreError> {
        self.store.get_bool_or(path, default)
    }

    pub fn get_timestamp(&self, path: impl IntoPath) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.store.get_timestamp(path)
    }

    pub fn keys(&self, path: impl IntoPath) -> Result<Vec<String>, StoreError> {
        self.store.keys(path)
    }

    pub fn root_keys(&self) -> Vec<String> {
        self.store.root_keys()
    }

    pub fn snapshot(&self) -> StoreValue {
        self.store.snapshot()
    }

    /// Run several reads as one consistent step.
    pub fn atomically<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        self.store.atomically(|_| f(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_sees_crate_writes() {
        let store = Arc::new(ClusterStore::new());
        let reader = StoreReader::new(Arc::clone(&store));
        assert!(matches!(reader.get("db1.primary"), Err(StoreError::NotFound(_))));

        store.set("db1.primary", true).unwrap();
        store.push("top.db1", "line", Some(2)).unwrap();

        assert!(reader.get_bool_or("db1.primary", false).unwrap());
        assert_eq!(reader.root_keys(), ["db1", "top"]);
        assert_eq!(reader.keys("top").unwrap(), ["db1"]);
        assert_eq!(reader.get_or("db2.primary", false).unwrap(), StoreValue::from(false));
        let (primary, history) = reader.atomically(|r| {
            (r.get_bool_or("db1.primary", false).unwrap(), r.get("top.db1").unwrap())
        });
        assert!(primary);
        assert_eq!(history.as_sequence().map(|s| s.len()), Some(1));
    }
}
