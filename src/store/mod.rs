//! Storage backends for knowledge items.
//!
//! Two backends implement the same [`KnowledgeStore`] contract:
//!
//! - [`MemStore`]: concurrent hashmaps (DashMap), nothing survives the process
//! - [`DurableStore`]: ACID transactions on disk (redb)
//!
//! Both enforce uniqueness of `(name, scope, content_hash)` inside a single
//! critical section, which is what makes create-or-return safe under races.

pub mod durable;
pub mod mem;

pub use durable::DurableStore;
pub use mem::MemStore;

use crate::error::StoreError;
use crate::hash::ContentHash;
use crate::item::{KnowledgeId, KnowledgeItem};
use crate::scope::ScopeKey;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// What [`KnowledgeStore::insert_unique`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The item was new and is now stored, with its sequence number assigned.
    Inserted(KnowledgeItem),
    /// The chain already held this content; the stored item is returned.
    Existing(KnowledgeItem),
}

impl InsertOutcome {
    pub fn into_parts(self) -> (KnowledgeItem, bool) {
        match self {
            Self::Inserted(item) => (item, true),
            Self::Existing(item) => (item, false),
        }
    }
}

/// The single storage abstraction the engine reads and writes through.
///
/// Implementations hold no engine logic; they only guarantee atomicity of
/// [`insert_unique`](Self::insert_unique) and per-chain isolation of deletes.
pub trait KnowledgeStore: Send + Sync + std::fmt::Debug {
    /// Insert `item` unless its chain already holds an item with the same
    /// content hash, in which case that item is returned untouched.
    ///
    /// The check and the insert happen atomically. The store assigns
    /// `item.sequence`.
    fn insert_unique(&self, item: KnowledgeItem) -> StoreResult<InsertOutcome>;

    /// Look up one item by id.
    fn get(&self, id: &KnowledgeId) -> StoreResult<Option<KnowledgeItem>>;

    /// All items of one chain, in insertion order.
    fn chain(&self, name: &str, scope: &ScopeKey) -> StoreResult<Vec<KnowledgeItem>>;

    /// Every member of every chain at exactly `scope`, in one read.
    ///
    /// Ordered by name, then insertion order within each chain. Resolution
    /// groups these in memory, so a cascade costs one call per scope level.
    fn items_at(&self, scope: &ScopeKey) -> StoreResult<Vec<KnowledgeItem>>;

    /// Remove a whole chain. Returns how many items were removed.
    fn delete_chain(&self, name: &str, scope: &ScopeKey) -> StoreResult<usize>;

    /// Remove one item. Returns whether it existed.
    fn delete(&self, id: &KnowledgeId) -> StoreResult<bool>;

    /// Total number of stored items.
    fn len(&self) -> StoreResult<usize>;

    /// Whether the backend survives a restart.
    fn is_persistent(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Key layout
// ---------------------------------------------------------------------------

/// Separator between scope, name, and the per-index suffix in storage keys.
///
/// Names and scope qualifiers are validated to contain no control characters,
/// so keys built from them split unambiguously.
pub(crate) const KEY_SEP: char = '\u{1e}';

/// Prefix shared by every key of every chain at `scope`.
pub(crate) fn scope_prefix(scope: &ScopeKey) -> String {
    format!("{}{KEY_SEP}", scope.storage_key())
}

/// Prefix shared by every key of the `(name, scope)` chain.
pub(crate) fn chain_prefix(scope: &ScopeKey, name: &str) -> String {
    format!("{}{name}{KEY_SEP}", scope_prefix(scope))
}

/// Chain-index key; zero-padded so lexical order equals insertion order.
pub(crate) fn sequence_key(scope: &ScopeKey, name: &str, sequence: u64) -> String {
    format!("{}{sequence:020}", chain_prefix(scope, name))
}

/// Uniqueness-index key for `(name, scope, hash)`.
pub(crate) fn hash_key(scope: &ScopeKey, name: &str, hash: &ContentHash) -> String {
    format!("{}{}", chain_prefix(scope, name), hash.to_hex())
}
