//! Engine facade: the public surface of the knowledge system.
//!
//! [`KnowledgeEngine`] owns the store and the version-chain manager and exposes
//! every operation a front end needs: create, update, override, inspect,
//! resolve, and delete. It is stateless between calls apart from the store, so
//! one engine can be shared across threads behind an `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::chain::VersionChainManager;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::deletion::DeletionManager;
use crate::error::KnowledgeResult;
use crate::item::{KnowledgeId, KnowledgeItem, NewKnowledge};
use crate::overrides::{OverrideEngine, OverrideRequest};
use crate::resolve::Resolver;
use crate::scope::{ResolutionContext, ScopeKey};
use crate::store::{DurableStore, KnowledgeStore, MemStore};

/// The knowledge override and versioning engine.
pub struct KnowledgeEngine {
    config: EngineConfig,
    chains: VersionChainManager,
}

impl KnowledgeEngine {
    /// Create an engine with the given configuration.
    ///
    /// `data_dir = None` selects the in-memory store; otherwise the durable
    /// store is opened (or created) in that directory.
    pub fn new(config: EngineConfig) -> KnowledgeResult<Self> {
        config.validate()?;
        let store: Arc<dyn KnowledgeStore> = match &config.data_dir {
            Some(dir) => Arc::new(DurableStore::open(dir)?),
            None => Arc::new(MemStore::new()),
        };
        tracing::info!(
            persistent = store.is_persistent(),
            data_dir = ?config.data_dir,
            "initializing knowledge engine"
        );
        Self::with_parts(config, store, Arc::new(SystemClock))
    }

    /// Create an engine over an explicit store and clock.
    pub fn with_parts(
        config: EngineConfig,
        store: Arc<dyn KnowledgeStore>,
        clock: Arc<dyn Clock>,
    ) -> KnowledgeResult<Self> {
        config.validate()?;
        let chains = VersionChainManager::new(store, clock, config.limits());
        Ok(Self { config, chains })
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Add a version, or return the chain member already holding this content.
    /// The flag is `true` when a new item was stored.
    pub fn create_or_return(&self, req: NewKnowledge) -> KnowledgeResult<(KnowledgeItem, bool)> {
        self.chains.create_or_return(req)
    }

    /// Record new content for an existing name. Same semantics as
    /// [`create_or_return`](Self::create_or_return), minus the flag.
    pub fn update(&self, req: NewKnowledge) -> KnowledgeResult<KnowledgeItem> {
        Ok(self.chains.create_or_return(req)?.0)
    }

    /// Copy an item into a strictly narrower scope.
    pub fn override_item(&self, req: OverrideRequest) -> KnowledgeResult<KnowledgeItem> {
        Ok(OverrideEngine::new(&self.chains).apply(req)?.0)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, id: &KnowledgeId) -> KnowledgeResult<KnowledgeItem> {
        self.chains.get(id)
    }

    /// Latest version of one chain.
    pub fn latest(&self, name: &str, scope: &ScopeKey) -> KnowledgeResult<KnowledgeItem> {
        self.chains.latest(name, scope)
    }

    /// Full history of one chain, newest first.
    pub fn all_versions(
        &self,
        name: &str,
        scope: &ScopeKey,
    ) -> KnowledgeResult<Vec<KnowledgeItem>> {
        self.chains.all_versions(name, scope)
    }

    /// Latest item of every chain at one scope.
    pub fn list_scope(&self, scope: &ScopeKey) -> KnowledgeResult<Vec<KnowledgeItem>> {
        Resolver::new(&self.chains).list_scope(scope)
    }

    /// Effective item per name for a runtime context.
    pub fn resolve_all(
        &self,
        ctx: &ResolutionContext,
    ) -> KnowledgeResult<BTreeMap<String, KnowledgeItem>> {
        Resolver::new(&self.chains).resolve_all(ctx)
    }

    /// Effective item for one name.
    pub fn resolve_one(
        &self,
        name: &str,
        ctx: &ResolutionContext,
    ) -> KnowledgeResult<KnowledgeItem> {
        Resolver::new(&self.chains).resolve_one(name, ctx)
    }

    /// Latest item at each reachable scope, most specific first.
    pub fn layers(
        &self,
        name: &str,
        ctx: &ResolutionContext,
    ) -> KnowledgeResult<Vec<KnowledgeItem>> {
        Resolver::new(&self.chains).layers(name, ctx)
    }

    // -----------------------------------------------------------------------
    // Deletes
    // -----------------------------------------------------------------------

    /// Remove a whole chain. Returns how many versions went with it.
    pub fn delete_all_versions(&self, name: &str, scope: &ScopeKey) -> KnowledgeResult<usize> {
        DeletionManager::new(&self.chains).delete_all_versions(name, scope)
    }

    /// Remove one version by id.
    pub fn delete_one(&self, id: &KnowledgeId) -> KnowledgeResult<bool> {
        DeletionManager::new(&self.chains).delete_one(id)
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn info(&self) -> KnowledgeResult<EngineInfo> {
        let store = self.chains.store();
        Ok(EngineInfo {
            items: store.len()?,
            persistent: store.is_persistent(),
            max_content_bytes: self.config.max_content_bytes,
            max_name_len: self.config.max_name_len,
        })
    }
}

/// Summary information about the engine state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineInfo {
    pub items: usize,
    pub persistent: bool,
    pub max_content_bytes: usize,
    pub max_name_len: usize,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "knowledge engine info")?;
        writeln!(f, "  items:        {}", self.items)?;
        writeln!(f, "  persistent:   {}", self.persistent)?;
        writeln!(f, "  max content:  {} bytes", self.max_content_bytes)?;
        writeln!(f, "  max name:     {} bytes", self.max_name_len)?;
        Ok(())
    }
}

impl std::fmt::Debug for KnowledgeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeEngine")
            .field("config", &self.config)
            .field("store", &self.chains.store())
            .finish()
    }
}
