//! Copy-on-write overrides into a narrower scope.
//!
//! An override copies a source item into a strictly more specific scope,
//! optionally replacing content, type, or attributes on the way. The copy starts
//! (or extends) an independent chain: nothing links it back to the source, and
//! later versions of the source do not propagate.

use crate::chain::VersionChainManager;
use crate::error::{KnowledgeError, KnowledgeResult};
use crate::item::{KnowledgeId, KnowledgeItem, NewKnowledge};
use crate::scope::{ScopeKey, allowed_override_targets};
use crate::value::Attributes;

/// Parameters of an override.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideRequest {
    pub source: KnowledgeId,
    pub target: ScopeKey,
    /// Replacement content; copied from the source when `None`.
    pub content: Option<String>,
    /// Replacement content type; copied from the source when `None`.
    pub content_type: Option<String>,
    /// Replacement attributes; copied from the source when `None`.
    pub attributes: Option<Attributes>,
    pub created_by: String,
}

impl OverrideRequest {
    pub fn new(source: KnowledgeId, target: ScopeKey, created_by: impl Into<String>) -> Self {
        Self {
            source,
            target,
            content: None,
            content_type: None,
            attributes: None,
            created_by: created_by.into(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

/// Check that an item at `from` may be overridden into `to`.
///
/// The level check runs first, so an upward or same-level move reports
/// `InvalidScopeTransition` even when the tenants also differ.
pub fn check_transition(from: &ScopeKey, to: &ScopeKey) -> KnowledgeResult<()> {
    if !allowed_override_targets(from).contains(&to.level()) {
        return Err(KnowledgeError::InvalidScopeTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    if !from.is_ancestor_of(to) {
        return Err(KnowledgeError::ScopeMismatch {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

/// Creates overrides on top of a [`VersionChainManager`].
#[derive(Debug, Clone, Copy)]
pub struct OverrideEngine<'a> {
    chains: &'a VersionChainManager,
}

impl<'a> OverrideEngine<'a> {
    pub fn new(chains: &'a VersionChainManager) -> Self {
        Self { chains }
    }

    /// Override the item `req.source` into `req.target`.
    ///
    /// Returns the item now at the target scope: freshly created, or the
    /// existing target-chain member that already held the effective content.
    pub fn apply(&self, req: OverrideRequest) -> KnowledgeResult<(KnowledgeItem, bool)> {
        let source = self.chains.get(&req.source)?;
        self.apply_to(&source, req)
    }

    /// Override an already-loaded source item.
    pub fn apply_to(
        &self,
        source: &KnowledgeItem,
        req: OverrideRequest,
    ) -> KnowledgeResult<(KnowledgeItem, bool)> {
        if let Err(err) = check_transition(&source.scope, &req.target) {
            tracing::warn!(
                source = %source.id,
                from = %source.scope,
                to = %req.target,
                "override rejected: {err}"
            );
            return Err(err);
        }

        let effective = NewKnowledge {
            name: source.name.clone(),
            scope: req.target,
            content: req.content.unwrap_or_else(|| source.content.clone()),
            content_type: req.content_type.unwrap_or_else(|| source.content_type.clone()),
            attributes: req.attributes.unwrap_or_else(|| source.attributes.clone()),
            created_by: req.created_by,
        };

        let (item, created) = self.chains.create_or_return(effective)?;
        tracing::info!(
            source = %source.id,
            id = %item.id,
            name = %item.name,
            scope = %item.scope,
            created,
            "override applied"
        );
        Ok((item, created))
    }
}
