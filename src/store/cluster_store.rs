//! Thread-safe hierarchical store shared by every worker.
//!
//! One reentrant lock guards the whole tree. Every read and write holds it
//! for its full duration, so readers always observe a state that existed at
//! some instant. Remote I/O never happens under the lock.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::ReentrantMutex;

use crate::store::path::{DottedPath, IntoPath};
use crate::store::{StoreError, StoreValue};

type Tree = HashMap<String, StoreValue>;

/// Shared in-memory store with dotted-path addressing and capped sequences.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. Writes are
/// crate-private: outside readers go through
/// [`StoreReader`](crate::store::StoreReader).
#[derive(Default)]
pub struct ClusterStore {
    root: ReentrantMutex<RefCell<Tree>>,
}

impl std::fmt::Debug for ClusterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.root.lock();
        let keys = guard.borrow().len();
        f.debug_struct("ClusterStore")
            .field("top_level_keys", &keys)
            .finish_non_exhaustive()
    }
}

impl ClusterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with the store lock held.
    ///
    /// Calls made on the same store from inside `f` re-enter the lock, so a
    /// read-then-write sequence is observed by other threads as one step.
    pub fn atomically<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let _guard = self.root.lock();
        f(self)
    }

    /// Return a copy of the value at `path`.
    ///
    /// # Errors
    /// `StoreError::NotFound` if nothing is stored there (a path running
    /// through a non-mapping counts as absent); `StoreError::InvalidPath` if
    /// the path cannot be parsed.
    pub fn get(&self, path: impl IntoPath) -> Result<StoreValue, StoreError> {
        let path = path.into_path()?;
        let guard = self.root.lock();
        let tree = guard.borrow();
        lookup(&tree, &path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    /// Return a copy of the value at `path`, or `default` if absent.
    ///
    /// Never mutates the store.
    pub fn get_or(
        &self,
        path: impl IntoPath,
        default: impl Into<StoreValue>,
    ) -> Result<StoreValue, StoreError> {
        match self.get(path) {
            Err(StoreError::NotFound(_)) => Ok(default.into()),
            other => other,
        }
    }

    /// Boolean at `path`, or `default` if absent or not a boolean.
    pub fn get_bool_or(&self, path: impl IntoPath, default: bool) -> Result<bool, StoreError> {
        Ok(self.get_or(path, default)?.as_bool().unwrap_or(default))
    }

    /// Timestamp at `path`, or `None` if absent or not a timestamp.
    pub fn get_timestamp(&self, path: impl IntoPath) -> Result<Option<DateTime<Utc>>, StoreError> {
        match self.get(path) {
            Ok(value) => Ok(value.as_timestamp()),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Overwrite the value at `path`, creating intermediate mappings.
    ///
    /// Sibling keys are left untouched.
    ///
    /// # Errors
    /// `StoreError::PathConflict` if an intermediate segment holds a
    /// non-mapping.
    pub(crate) fn set(&self, path: impl IntoPath, value: impl Into<StoreValue>) -> Result<(), StoreError> {
        let path = path.into_path()?;
        let value = value.into();
        let guard = self.root.lock();
        let mut tree = guard.borrow_mut();
        let parent = parent_mut(&mut tree, &path)?;
        parent.insert(path.leaf().to_string(), value);
        Ok(())
    }

    /// Append `item` to the sequence at `path`, creating it if absent.
    ///
    /// With `cap`, the sequence is truncated to its most recent `cap` items
    /// before the lock is released.
    ///
    /// # Errors
    /// `StoreError::PathConflict` if the path crosses a non-mapping or the
    /// leaf holds something other than a sequence.
    pub(crate) fn push(
        &self,
        path: impl IntoPath,
        item: impl Into<StoreValue>,
        cap: Option<usize>,
    ) -> Result<(), StoreError> {
        let path = path.into_path()?;
        let item = item.into();
        let guard = self.root.lock();
        let mut tree = guard.borrow_mut();
        let parent = parent_mut(&mut tree, &path)?;
        let slot = parent
            .entry(path.leaf().to_string())
            .or_insert_with(|| StoreValue::Sequence(VecDeque::new()));

        let StoreValue::Sequence(items) = slot else {
            return Err(StoreError::PathConflict {
                path: path.to_string(),
                expected: "sequence",
            });
        };
        items.push_back(item);
        if let Some(cap) = cap {
            while items.len() > cap {
                items.pop_front();
            }
        }
        Ok(())
    }

    /// Sorted keys of the mapping at `path`.
    ///
    /// # Errors
    /// `StoreError::NotFound` if absent, `StoreError::PathConflict` if the
    /// value is not a mapping.
    pub fn keys(&self, path: impl IntoPath) -> Result<Vec<String>, StoreError> {
        let path = path.into_path()?;
        let guard = self.root.lock();
        let tree = guard.borrow();
        let value = lookup(&tree, &path).ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let map = value.as_mapping().ok_or_else(|| StoreError::PathConflict {
            path: path.to_string(),
            expected: "mapping",
        })?;
        Ok(sorted_keys(map))
    }

    /// Sorted top-level keys.
    pub fn root_keys(&self) -> Vec<String> {
        let guard = self.root.lock();
        let tree = guard.borrow();
        sorted_keys(&tree)
    }

    /// Deep copy of the whole tree as a single mapping.
    pub fn snapshot(&self) -> StoreValue {
        let guard = self.root.lock();
        let tree = guard.borrow();
        StoreValue::Mapping(tree.clone())
    }
}

fn sorted_keys(map: &Tree) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

fn lookup<'a>(tree: &'a Tree, path: &DottedPath) -> Option<&'a StoreValue> {
    let mut current = tree;
    for segment in path.parents() {
        current = current.get(segment)?.as_mapping()?;
    }
    current.get(path.leaf())
}

/// Walk to the mapping that owns the leaf, creating empty mappings on the way.
fn parent_mut<'a>(tree: &'a mut Tree, path: &DottedPath) -> Result<&'a mut Tree, StoreError> {
    let mut current = tree;
    for (depth, segment) in path.parents().iter().enumerate() {
        let next = current
            .entry(segment.clone())
            .or_insert_with(StoreValue::mapping);
        current = match next {
            StoreValue::Mapping(map) => map,
            _ => {
                return Err(StoreError::PathConflict {
                    path: path.prefix(depth + 1),
                    expected: "mapping",
                });
            }
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorKind;
    use crate::store::Datum;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_then_get() {
        let store = ClusterStore::new();
        store.set("db1.primary", true).unwrap();
        store.set("latest.db1.top", 42i64).unwrap();
        store.set("motd", "hello").unwrap();

        assert_eq!(store.get("db1.primary").unwrap(), StoreValue::from(true));
        assert_eq!(store.get("latest.db1.top").unwrap(), StoreValue::from(42i64));
        assert_eq!(store.get("motd").unwrap().as_text(), Some("hello"));
    }

    #[test]
    fn test_set_keeps_siblings() {
        let store = ClusterStore::new();
        store.set("latest.db1.top", 1i64).unwrap();
        store.set("latest.db1.stat", 2i64).unwrap();
        store.set("latest.db2.top", 3i64).unwrap();

        assert_eq!(store.keys("latest").unwrap(), ["db1", "db2"]);
        assert_eq!(store.keys("latest.db1").unwrap(), ["stat", "top"]);
        assert_eq!(store.get("latest.db1.top").unwrap(), StoreValue::from(1i64));
    }

    #[test]
    fn test_set_overwrites_leaf() {
        let store = ClusterStore::new();
        store.set("db1.primary", true).unwrap();
        store.set("db1.primary", false).unwrap();
        assert!(!store.get_bool_or("db1.primary", true).unwrap());
    }

    #[test]
    fn test_get_missing_without_default_fails() {
        let store = ClusterStore::new();
        let err = store.get("top.db1").unwrap_err();
        assert_eq!(err, StoreError::NotFound("top.db1".to_string()));
        assert_eq!(err.to_string(), "top.db1 not found");
    }

    #[test]
    fn test_get_or_does_not_mutate() {
        let store = ClusterStore::new();
        let value = store.get_or("db9.primary", false).unwrap();
        assert_eq!(value, StoreValue::from(false));
        assert!(store.root_keys().is_empty());
        assert!(store.get("db9.primary").is_err());
        assert!(store.get("db9").is_err());
    }

    #[test]
    fn test_get_through_scalar_is_absent() {
        let store = ClusterStore::new();
        store.set("db1", true).unwrap();
        assert!(matches!(store.get("db1.primary"), Err(StoreError::NotFound(_))));
        assert!(!store.get_bool_or("db1.primary", false).unwrap());
    }

    #[test]
    fn test_set_through_scalar_conflicts() {
        let store = ClusterStore::new();
        store.set("db1", true).unwrap();
        let err = store.set("db1.primary", true).unwrap_err();
        assert_eq!(
            err,
            StoreError::PathConflict {
                path: "db1".to_string(),
                expected: "mapping"
            }
        );
    }

    #[test]
    fn test_push_onto_scalar_conflicts() {
        let store = ClusterStore::new();
        store.set("top.db1", "oops").unwrap();
        let err = store.push("top.db1", "a", None).unwrap_err();
        assert!(matches!(err, StoreError::PathConflict { expected: "sequence", .. }));
    }

    #[test]
    fn test_push_creates_sequence_and_keeps_order() {
        let store = ClusterStore::new();
        for line in ["a", "b", "c"] {
            store.push("top.db1", line, None).unwrap();
        }
        let seq = store.get("top.db1").unwrap();
        let items: Vec<&str> = seq
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(StoreValue::as_text)
            .collect();
        assert_eq!(items, ["a", "b", "c"]);
    }

    #[test]
    fn test_push_truncates_to_cap() {
        let store = ClusterStore::new();
        for i in 0..10i64 {
            store.push("hist", i, Some(3)).unwrap();
        }
        let seq = store.get("hist").unwrap();
        let items = seq.as_sequence().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(
            items.iter().cloned().collect::<Vec<_>>(),
            vec![StoreValue::from(7i64), StoreValue::from(8i64), StoreValue::from(9i64)]
        );
    }

    #[test]
    fn test_get_timestamp() {
        let store = ClusterStore::new();
        assert_eq!(store.get_timestamp("latest.db1.top").unwrap(), None);
        let now = Utc::now();
        store.set("latest.db1.top", now).unwrap();
        assert_eq!(store.get_timestamp("latest.db1.top").unwrap(), Some(now));
    }

    #[test]
    fn test_invalid_path_propagates() {
        let store = ClusterStore::new();
        assert!(matches!(store.get("a..b"), Err(StoreError::InvalidPath(_))));
        assert!(matches!(store.get_or("", 1i64), Err(StoreError::InvalidPath(_))));
        assert!(matches!(store.set("x.", 1i64), Err(StoreError::InvalidPath(_))));
    }

    #[test]
    fn test_segment_paths_with_dotted_node_names() {
        let store = ClusterStore::new();
        let path = DottedPath::from_segments(["top", "10.0.0.1"]).unwrap();
        store.push(&path, "line", Some(500)).unwrap();
        assert_eq!(store.keys("top").unwrap(), ["10.0.0.1"]);
        assert!(store.get(&path).is_ok());
    }

    #[test]
    fn test_atomically_reenters_lock() {
        let store = ClusterStore::new();
        store.set("counter", 1i64).unwrap();
        let seen = store.atomically(|s| {
            let before = s.get("counter").unwrap();
            s.set("counter", 2i64).unwrap();
            s.atomically(|inner| inner.get("counter").unwrap());
            before
        });
        assert_eq!(seen, StoreValue::from(1i64));
        assert_eq!(store.get("counter").unwrap(), StoreValue::from(2i64));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = ClusterStore::new();
        store.set("a.b", 1i64).unwrap();
        let snap = store.snapshot();
        store.set("a.b", 2i64).unwrap();
        let inner = snap.as_mapping().unwrap()["a"].as_mapping().unwrap()["b"].clone();
        assert_eq!(inner, StoreValue::from(1i64));
    }

    #[test]
    fn test_concurrent_pushes_to_distinct_paths() {
        const THREADS: usize = 8;
        const ITEMS: usize = 1000;

        let store = Arc::new(ClusterStore::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let node = format!("db{t}");
                    for i in 0..ITEMS {
                        let datum = Datum::new(
                            format!("{t}-{i}"),
                            node.clone(),
                            "top",
                            CollectorKind::MongoTop,
                        );
                        store
                            .push(format!("top.{node}"), datum, Some(ITEMS))
                            .unwrap();
                        // Interleave reads on the same path.
                        if i % 100 == 0 {
                            store.get(format!("top.{node}")).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for t in 0..THREADS {
            let seq = store.get(format!("top.db{t}")).unwrap();
            let datums = seq.datums();
            assert_eq!(datums.len(), ITEMS);
            for (i, datum) in datums.iter().enumerate() {
                assert_eq!(datum.payload, format!("{t}-{i}"));
                assert_eq!(datum.node, format!("db{t}"));
            }
        }
    }
}
