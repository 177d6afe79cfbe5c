// ── Reactive keyed collection ──
//
// Concurrent per-record storage with push-based change notification via
// `watch` channels. Read-modify-write goes through `update`, which holds
// the record's shard lock for the whole closure.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

/// A concurrent, reactive collection keyed by string.
///
/// Every mutation bumps a version counter and rebuilds the sorted snapshot
/// that subscribers receive.
pub(crate) struct Collection<T: Clone + Send + Sync + 'static> {
    by_key: DashMap<String, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot sorted by key, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,

    /// Orders snapshot rebuilds so a stale rebuild never lands last.
    rebuild: Mutex<()>,
}

impl<T: Clone + Send + Sync + 'static> Collection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            version,
            snapshot,
            rebuild: Mutex::new(()),
        }
    }

    /// Insert only if the key is absent. Returns `false` if it existed.
    pub(crate) fn insert_new(&self, key: String, entity: T) -> bool {
        let inserted = match self.by_key.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(entity));
                true
            }
        };
        if inserted {
            self.changed();
        }
        inserted
    }

    /// Insert or replace an entity. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: String, entity: T) -> bool {
        let is_new = self.by_key.insert(key, Arc::new(entity)).is_none();
        self.changed();
        is_new
    }

    /// Mutate one record in place. The shard lock is held for the whole
    /// closure, so concurrent updates to the same key never lose writes.
    pub(crate) fn update<R>(&self, key: &str, f: impl FnOnce(&mut T) -> R) -> Option<(Arc<T>, R)> {
        let result = {
            let mut entry = self.by_key.get_mut(key)?;
            let out = f(Arc::make_mut(entry.value_mut()));
            (Arc::clone(entry.value()), out)
        };
        self.changed();
        Some(result)
    }

    /// Remove an entity by key. Returns the removed entity if it existed.
    pub(crate) fn remove(&self, key: &str) -> Option<Arc<T>> {
        let removed = self.by_key.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.changed();
        }
        removed
    }

    /// Remove only if `pred` accepts the current value, atomically.
    pub(crate) fn remove_if(&self, key: &str, pred: impl FnOnce(&T) -> bool) -> Option<Arc<T>> {
        let removed = self
            .by_key
            .remove_if(key, |_, v| pred(v))
            .map(|(_, v)| v);
        if removed.is_some() {
            self.changed();
        }
        removed
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    /// All keys, sorted.
    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.by_key.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn changed(&self) {
        self.rebuild_snapshot();
        self.version.send_modify(|v| *v += 1);
    }

    /// Collect all values into a sorted snapshot and broadcast it.
    /// Must not be called while holding a map guard.
    fn rebuild_snapshot(&self) {
        let _order = self.rebuild.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<(String, Arc<T>)> = self
            .by_key
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: String,
        hits: u32,
    }

    fn item(name: &str) -> Item {
        Item {
            name: name.into(),
            hits: 0,
        }
    }

    #[test]
    fn insert_new_rejects_duplicates() {
        let c: Collection<Item> = Collection::new();
        assert!(c.insert_new("a".into(), item("a")));
        assert!(!c.insert_new("a".into(), item("other")));
        assert_eq!(c.get("a").unwrap().name, "a");
    }

    #[test]
    fn snapshot_is_sorted_and_versioned() {
        let c: Collection<Item> = Collection::new();
        c.upsert("b".into(), item("b"));
        c.upsert("a".into(), item("a"));
        let names: Vec<_> = c.snapshot().iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(c.version(), 2);
    }

    #[test]
    fn update_mutates_in_place() {
        let c: Collection<Item> = Collection::new();
        c.upsert("a".into(), item("a"));
        let (updated, old) = c
            .update("a", |i| {
                let old = i.hits;
                i.hits += 1;
                old
            })
            .unwrap();
        assert_eq!(old, 0);
        assert_eq!(updated.hits, 1);
        assert_eq!(c.snapshot()[0].hits, 1);
        assert!(c.update("missing", |_| ()).is_none());
    }

    #[test]
    fn remove_if_respects_predicate() {
        let c: Collection<Item> = Collection::new();
        c.upsert("a".into(), item("a"));
        assert!(c.remove_if("a", |i| i.hits > 0).is_none());
        assert!(c.contains("a"));
        assert!(c.remove_if("a", |i| i.hits == 0).is_some());
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn concurrent_updates_do_not_lose_writes() {
        let c: Arc<Collection<Item>> = Arc::new(Collection::new());
        c.upsert("a".into(), item("a"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        c.update("a", |i| i.hits += 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.get("a").unwrap().hits, 800);
        assert_eq!(c.snapshot()[0].hits, 800);
    }

    #[test]
    fn subscribers_see_changes() {
        let c: Collection<Item> = Collection::new();
        let mut rx = c.subscribe();
        c.upsert("a".into(), item("a"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
