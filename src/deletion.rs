//! Non-destructive-to-neighbours deletion.
//!
//! Deletes target one fully qualified `(name, scope)` chain or one item id.
//! There is no wildcard form: chains for the same name at other scopes are
//! never touched.

use crate::chain::{VersionChainManager, validate_name};
use crate::error::KnowledgeResult;
use crate::item::KnowledgeId;
use crate::scope::ScopeKey;

#[derive(Debug, Clone, Copy)]
pub struct DeletionManager<'a> {
    chains: &'a VersionChainManager,
}

impl<'a> DeletionManager<'a> {
    pub fn new(chains: &'a VersionChainManager) -> Self {
        Self { chains }
    }

    /// Delete every version of `name` at exactly `scope`.
    ///
    /// A missing chain deletes zero items and is not an error. A scope with a
    /// missing qualifier is a validation error.
    pub fn delete_all_versions(&self, name: &str, scope: &ScopeKey) -> KnowledgeResult<usize> {
        validate_name(name, self.chains.limits().max_name_len)?;
        scope.validate()?;
        self.chains.delete_chain(name, scope)
    }

    /// Delete a single version by id.
    pub fn delete_one(&self, id: &KnowledgeId) -> KnowledgeResult<bool> {
        self.chains.delete_by_id(id)
    }
}
