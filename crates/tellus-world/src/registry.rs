use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

/// Concurrent id -> entity map.
///
/// Entries are handed out as cloned `Arc`s and no shard guard ever escapes a
/// method, so callers may freely call back into the registry (or run scripts
/// that do) while holding an entity.
#[derive(Debug)]
pub(crate) struct Registry<K: Eq + Hash, V> {
    map: DashMap<K, Arc<V>>,
}

impl<K: Eq + Hash + Clone, V> Registry<K, V> {
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    /// Insert, returning the entry previously registered under `key`.
    pub fn insert(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        self.map.insert(key, value)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove(key).map(|(_, value)| value)
    }

    /// Remove `key` only while it still maps to `value`.
    pub fn remove_same(&self, key: &K, value: &Arc<V>) -> bool {
        self.map
            .remove_if(key, |_, current| Arc::ptr_eq(current, value))
            .is_some()
    }

    pub fn keys(&self) -> Vec<K> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Empty the registry, returning everything it held.
    pub fn drain(&self) -> Vec<Arc<V>> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.remove(&key))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_returns_replaced_entry() {
        let registry: Registry<String, u32> = Registry::new();
        let first = Arc::new(1);
        assert!(registry.insert("a".to_string(), first.clone()).is_none());

        let replaced = registry.insert("a".to_string(), Arc::new(2));
        assert!(replaced.is_some_and(|old| Arc::ptr_eq(&old, &first)));
        assert_eq!(registry.get("a").as_deref(), Some(&2));
    }

    #[test]
    fn remove_same_ignores_newer_entries() {
        let registry: Registry<u64, &str> = Registry::new();
        let old = Arc::new("old");
        registry.insert(1, old.clone());
        registry.insert(1, Arc::new("new"));

        assert!(!registry.remove_same(&1, &old));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn drain_empties() {
        let registry: Registry<u64, u64> = Registry::new();
        for i in 0..4 {
            registry.insert(i, Arc::new(i));
        }
        assert_eq!(registry.drain().len(), 4);
        assert_eq!(registry.len(), 0);
    }
}
