//! Cascade resolution: the effective item per name for a runtime context.
//!
//! Reachable scopes are walked from most to least specific
//! (activation → tenant → system). The first scope whose chain for a name is
//! non-empty supplies that name's effective item, via "latest". Specificity
//! always beats recency: an old activation-level item shadows a brand new
//! system-level one.

use std::collections::BTreeMap;

use crate::chain::VersionChainManager;
use crate::error::{KnowledgeError, KnowledgeResult};
use crate::item::KnowledgeItem;
use crate::scope::{ResolutionContext, ScopeKey};

/// Resolves effective knowledge over a [`VersionChainManager`].
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    chains: &'a VersionChainManager,
}

impl<'a> Resolver<'a> {
    pub fn new(chains: &'a VersionChainManager) -> Self {
        Self { chains }
    }

    /// Every name visible from `ctx`, mapped to its effective item.
    ///
    /// Names present only at less specific scopes are still included. A name
    /// with nothing reachable is simply absent.
    ///
    /// Costs one store read per reachable scope level.
    pub fn resolve_all(
        &self,
        ctx: &ResolutionContext,
    ) -> KnowledgeResult<BTreeMap<String, KnowledgeItem>> {
        let cascade = ctx.cascade()?;
        let mut resolved = BTreeMap::new();

        for scope in &cascade {
            for (name, item) in self.chains.latest_at(scope)? {
                resolved.entry(name).or_insert(item);
            }
        }

        tracing::debug!(
            tenant = %ctx.tenant,
            scopes = cascade.len(),
            names = resolved.len(),
            "resolved knowledge set"
        );
        Ok(resolved)
    }

    /// The effective item for one name.
    pub fn resolve_one(
        &self,
        name: &str,
        ctx: &ResolutionContext,
    ) -> KnowledgeResult<KnowledgeItem> {
        for scope in ctx.cascade()? {
            if let Some(item) = self.chains.find_latest(name, &scope)? {
                return Ok(item);
            }
        }
        Err(KnowledgeError::not_found(format!(
            "{name:?} for tenant {}",
            ctx.tenant
        )))
    }

    /// The latest item at every reachable scope for one name, most specific
    /// first. The head of the list is what [`resolve_one`](Self::resolve_one)
    /// returns; the rest is what it shadows.
    pub fn layers(
        &self,
        name: &str,
        ctx: &ResolutionContext,
    ) -> KnowledgeResult<Vec<KnowledgeItem>> {
        let mut layers = Vec::with_capacity(3);
        for scope in ctx.cascade()? {
            if let Some(item) = self.chains.find_latest(name, &scope)? {
                layers.push(item);
            }
        }
        Ok(layers)
    }

    /// Latest item of every chain at exactly one scope, ordered by name.
    pub fn list_scope(&self, scope: &ScopeKey) -> KnowledgeResult<Vec<KnowledgeItem>> {
        scope.validate()?;
        Ok(self.chains.latest_at(scope)?.into_values().collect())
    }
}
