//! Version chains: append-only history per `(name, scope)`.
//!
//! The [`VersionChainManager`] owns content identity (no two members of a chain
//! share a content hash) and the notion of "latest" (maximum `created_at`,
//! first-inserted on ties). It holds no mutable state of its own; everything
//! durable sits behind the [`KnowledgeStore`].

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Limits;
use crate::error::{KnowledgeError, KnowledgeResult, StoreError};
use crate::hash::compute_hash_with;
use crate::item::{KnowledgeId, KnowledgeItem, NewKnowledge};
use crate::scope::{ScopeKey, validate_qualifier};
use crate::store::{InsertOutcome, KnowledgeStore};

/// Manages every version chain in one store.
#[derive(Debug, Clone)]
pub struct VersionChainManager {
    store: Arc<dyn KnowledgeStore>,
    clock: Arc<dyn Clock>,
    limits: Limits,
}

impl VersionChainManager {
    pub fn new(store: Arc<dyn KnowledgeStore>, clock: Arc<dyn Clock>, limits: Limits) -> Self {
        Self {
            store,
            clock,
            limits,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &dyn KnowledgeStore {
        self.store.as_ref()
    }

    /// Size limits applied to every write.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Add a version to a chain, or return the member that already holds the
    /// same content.
    ///
    /// Returns `(item, was_created)`. Safe to call concurrently with identical
    /// arguments: all callers converge on one stored item.
    pub fn create_or_return(&self, req: NewKnowledge) -> KnowledgeResult<(KnowledgeItem, bool)> {
        self.validate(&req)?;

        let content_hash = compute_hash_with(&req.content, &req.content_type, &req.attributes);
        let candidate = KnowledgeItem {
            id: KnowledgeId::new(),
            name: req.name,
            content: req.content,
            content_type: req.content_type,
            scope: req.scope,
            content_hash,
            attributes: req.attributes,
            created_at: self.clock.now(),
            created_by: req.created_by,
            sequence: 0,
        };

        match self.store.insert_unique(candidate) {
            Ok(InsertOutcome::Inserted(item)) => {
                tracing::info!(
                    id = %item.id,
                    name = %item.name,
                    scope = %item.scope,
                    hash = %item.content_hash,
                    "created knowledge version"
                );
                Ok((item, true))
            }
            Ok(InsertOutcome::Existing(item)) => {
                tracing::debug!(
                    id = %item.id,
                    name = %item.name,
                    scope = %item.scope,
                    "content already in chain, returning existing version"
                );
                Ok((item, false))
            }
            Err(StoreError::Conflict { key }) => Err(KnowledgeError::Conflict {
                message: format!("store rejected insert on {key:?}"),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up an item by id.
    pub fn get(&self, id: &KnowledgeId) -> KnowledgeResult<KnowledgeItem> {
        self.store
            .get(id)?
            .ok_or_else(|| KnowledgeError::not_found(format!("item {id}")))
    }

    /// Latest member of a chain, or `None` when the chain is empty.
    pub fn find_latest(
        &self,
        name: &str,
        scope: &ScopeKey,
    ) -> KnowledgeResult<Option<KnowledgeItem>> {
        let chain = self.store.chain(name, scope)?;
        Ok(pick_latest(chain))
    }

    /// Latest member of a chain; an empty chain is `NotFound`.
    pub fn latest(&self, name: &str, scope: &ScopeKey) -> KnowledgeResult<KnowledgeItem> {
        self.find_latest(name, scope)?
            .ok_or_else(|| KnowledgeError::not_found(format!("{name:?} at {scope}")))
    }

    /// Every member of a chain, newest first.
    pub fn all_versions(
        &self,
        name: &str,
        scope: &ScopeKey,
    ) -> KnowledgeResult<Vec<KnowledgeItem>> {
        let mut chain = self.store.chain(name, scope)?;
        sort_newest_first(&mut chain);
        Ok(chain)
    }

    /// Latest member of every chain at exactly `scope`, keyed by name.
    ///
    /// One store read for the whole scope; "latest" is picked in memory.
    pub fn latest_at(&self, scope: &ScopeKey) -> KnowledgeResult<BTreeMap<String, KnowledgeItem>> {
        let mut heads: BTreeMap<String, KnowledgeItem> = BTreeMap::new();
        for item in self.store.items_at(scope)? {
            match heads.get(&item.name) {
                Some(best) if !item.supersedes(best) => {}
                _ => {
                    heads.insert(item.name.clone(), item);
                }
            }
        }
        Ok(heads)
    }

    /// Remove an entire chain. Other scopes are untouched.
    pub fn delete_chain(&self, name: &str, scope: &ScopeKey) -> KnowledgeResult<usize> {
        let count = self.store.delete_chain(name, scope)?;
        if count > 0 {
            tracing::info!(name, scope = %scope, count, "deleted version chain");
        }
        Ok(count)
    }

    /// Remove one version. Returns whether it existed.
    pub fn delete_by_id(&self, id: &KnowledgeId) -> KnowledgeResult<bool> {
        let existed = self.store.delete(id)?;
        if existed {
            tracing::info!(id = %id, "deleted knowledge version");
        }
        Ok(existed)
    }

    fn validate(&self, req: &NewKnowledge) -> KnowledgeResult<()> {
        validate_name(&req.name, self.limits.max_name_len)?;
        req.scope.validate()?;
        validate_qualifier("content type", &req.content_type)?;
        validate_qualifier("creator identity", &req.created_by)?;
        if req.content.len() > self.limits.max_content_bytes {
            return Err(KnowledgeError::validation(format!(
                "content is {} bytes, limit is {}",
                req.content.len(),
                self.limits.max_content_bytes
            )));
        }
        Ok(())
    }
}

/// Check a knowledge name: present, bounded, no control characters.
pub fn validate_name(name: &str, max_len: usize) -> KnowledgeResult<()> {
    validate_qualifier("name", name)?;
    if name.len() > max_len {
        return Err(KnowledgeError::validation(format!(
            "name is {} bytes, limit is {max_len}",
            name.len()
        )));
    }
    Ok(())
}

/// The chain member with the greatest `created_at`, first-inserted on ties.
pub fn pick_latest(chain: Vec<KnowledgeItem>) -> Option<KnowledgeItem> {
    chain
        .into_iter()
        .reduce(|best, next| if next.supersedes(&best) { next } else { best })
}

fn sort_newest_first(chain: &mut [KnowledgeItem]) {
    chain.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then(a.sequence.cmp(&b.sequence))
    });
}
