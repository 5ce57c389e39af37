//! In-memory store backed by DashMap.
//!
//! Chains live in one sharded map keyed by `(scope, name)`; the shard lock taken
//! through the entry API is the critical section for create-or-return. All data
//! is lost on process exit.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::StoreError;
use crate::item::{KnowledgeId, KnowledgeItem};
use crate::scope::ScopeKey;
use crate::store::{InsertOutcome, KnowledgeStore, StoreResult};

type ChainKey = (ScopeKey, String);

/// Concurrent in-memory knowledge store.
///
/// Lock order: a `chains` shard may be held while touching `ids`, never the
/// other way round.
#[derive(Debug)]
pub struct MemStore {
    chains: DashMap<ChainKey, Vec<KnowledgeItem>>,
    ids: DashMap<KnowledgeId, ChainKey>,
    sequence: AtomicU64,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            chains: DashMap::new(),
            ids: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeStore for MemStore {
    fn insert_unique(&self, mut item: KnowledgeItem) -> StoreResult<InsertOutcome> {
        let key = (item.scope.clone(), item.name.clone());
        let mut chain = self.chains.entry(key.clone()).or_default();

        if let Some(existing) = chain.iter().find(|i| i.content_hash == item.content_hash) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }

        match self.ids.entry(item.id) {
            Entry::Occupied(_) => {
                return Err(StoreError::Conflict {
                    key: item.id.to_string(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(key);
            }
        }
        item.sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        chain.push(item.clone());
        Ok(InsertOutcome::Inserted(item))
    }

    fn get(&self, id: &KnowledgeId) -> StoreResult<Option<KnowledgeItem>> {
        let Some(key) = self.ids.get(id).map(|k| k.value().clone()) else {
            return Ok(None);
        };
        Ok(self
            .chains
            .get(&key)
            .and_then(|chain| chain.iter().find(|i| i.id == *id).cloned()))
    }

    fn chain(&self, name: &str, scope: &ScopeKey) -> StoreResult<Vec<KnowledgeItem>> {
        let key = (scope.clone(), name.to_string());
        Ok(self
            .chains
            .get(&key)
            .map(|chain| chain.value().clone())
            .unwrap_or_default())
    }

    fn items_at(&self, scope: &ScopeKey) -> StoreResult<Vec<KnowledgeItem>> {
        let mut items: Vec<KnowledgeItem> = self
            .chains
            .iter()
            .filter(|entry| entry.key().0 == *scope)
            .flat_map(|entry| entry.value().clone())
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.sequence.cmp(&b.sequence)));
        Ok(items)
    }

    fn delete_chain(&self, name: &str, scope: &ScopeKey) -> StoreResult<usize> {
        let key = (scope.clone(), name.to_string());
        let Some((_, removed)) = self.chains.remove(&key) else {
            return Ok(0);
        };
        for item in &removed {
            self.ids.remove(&item.id);
        }
        Ok(removed.len())
    }

    fn delete(&self, id: &KnowledgeId) -> StoreResult<bool> {
        let Some((_, key)) = self.ids.remove(id) else {
            return Ok(false);
        };
        let removed = match self.chains.get_mut(&key) {
            Some(mut chain) => {
                let before = chain.len();
                chain.retain(|i| i.id != *id);
                chain.len() < before
            }
            None => false,
        };
        self.chains.remove_if(&key, |_, chain| chain.is_empty());
        Ok(removed)
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.ids.len())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::hash::compute_hash;

    fn item(name: &str, scope: ScopeKey, content: &str) -> KnowledgeItem {
        KnowledgeItem {
            id: KnowledgeId::new(),
            name: name.into(),
            content: content.into(),
            content_type: "text".into(),
            scope,
            content_hash: compute_hash(content, "text"),
            attributes: Default::default(),
            created_at: chrono::Utc::now(),
            created_by: "tester".into(),
            sequence: 0,
        }
    }

    #[test]
    fn insert_assigns_increasing_sequences() {
        let store = MemStore::new();
        let (a, _) = store
            .insert_unique(item("n", ScopeKey::System, "a"))
            .unwrap()
            .into_parts();
        let (b, _) = store
            .insert_unique(item("n", ScopeKey::System, "b"))
            .unwrap()
            .into_parts();
        assert!(a.sequence < b.sequence);
        assert_eq!(store.chain("n", &ScopeKey::System).unwrap().len(), 2);
    }

    #[test]
    fn duplicate_content_returns_existing() {
        let store = MemStore::new();
        let first = item("n", ScopeKey::System, "same");
        let first_id = first.id;
        store.insert_unique(first).unwrap();

        let outcome = store.insert_unique(item("n", ScopeKey::System, "same")).unwrap();
        match outcome {
            InsertOutcome::Existing(existing) => assert_eq!(existing.id, first_id),
            InsertOutcome::Inserted(_) => panic!("duplicate content was appended"),
        }
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn reused_id_is_a_conflict() {
        let store = MemStore::new();
        let first = item("n", ScopeKey::System, "a");
        let first_id = first.id;
        let mut reused = item("other", ScopeKey::tenant("t"), "b");
        reused.id = first_id;
        store.insert_unique(first).unwrap();

        let err = store.insert_unique(reused).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(&first_id).unwrap().unwrap().name, "n");
        assert!(store.chain("other", &ScopeKey::tenant("t")).unwrap().is_empty());
    }

    #[test]
    fn same_content_in_other_scope_is_separate() {
        let store = MemStore::new();
        store.insert_unique(item("n", ScopeKey::System, "x")).unwrap();
        let (_, created) = store
            .insert_unique(item("n", ScopeKey::tenant("t"), "x"))
            .unwrap()
            .into_parts();
        assert!(created);
    }

    #[test]
    fn delete_chain_leaves_other_scopes() {
        let store = MemStore::new();
        store.insert_unique(item("n", ScopeKey::System, "x")).unwrap();
        store.insert_unique(item("n", ScopeKey::tenant("t"), "x")).unwrap();
        store.insert_unique(item("n", ScopeKey::tenant("t"), "y")).unwrap();

        assert_eq!(store.delete_chain("n", &ScopeKey::tenant("t")).unwrap(), 2);
        assert_eq!(store.delete_chain("n", &ScopeKey::tenant("t")).unwrap(), 0);
        assert_eq!(store.chain("n", &ScopeKey::System).unwrap().len(), 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn delete_single_item() {
        let store = MemStore::new();
        let a = item("n", ScopeKey::System, "a");
        let a_id = a.id;
        store.insert_unique(a).unwrap();
        store.insert_unique(item("n", ScopeKey::System, "b")).unwrap();

        assert!(store.delete(&a_id).unwrap());
        assert!(!store.delete(&a_id).unwrap());
        assert!(store.get(&a_id).unwrap().is_none());
        assert_eq!(store.chain("n", &ScopeKey::System).unwrap().len(), 1);
    }

    #[test]
    fn items_at_lists_only_that_scope() {
        let store = MemStore::new();
        store.insert_unique(item("b", ScopeKey::System, "x")).unwrap();
        store.insert_unique(item("a", ScopeKey::System, "x")).unwrap();
        store.insert_unique(item("b", ScopeKey::System, "y")).unwrap();
        store.insert_unique(item("c", ScopeKey::tenant("t"), "x")).unwrap();

        let system: Vec<_> = store
            .items_at(&ScopeKey::System)
            .unwrap()
            .into_iter()
            .map(|i| (i.name, i.content))
            .collect();
        assert_eq!(
            system,
            vec![
                ("a".to_string(), "x".to_string()),
                ("b".to_string(), "x".to_string()),
                ("b".to_string(), "y".to_string()),
            ]
        );
        assert_eq!(store.items_at(&ScopeKey::tenant("t")).unwrap().len(), 1);
        assert!(store.items_at(&ScopeKey::tenant("u")).unwrap().is_empty());
    }

    #[test]
    fn concurrent_identical_inserts_converge() {
        let store = Arc::new(MemStore::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let (stored, _) = store
                        .insert_unique(item("race", ScopeKey::System, "same"))
                        .unwrap()
                        .into_parts();
                    stored.id
                })
            })
            .collect();
        let ids: Vec<KnowledgeId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.chain("race", &ScopeKey::System).unwrap().len(), 1);
    }
}
