//! Knowledge items: immutable, content-addressed versions.
//!
//! A [`KnowledgeItem`] is never edited after creation. "Updating" a piece of
//! knowledge appends a new item to the `(name, scope)` version chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KnowledgeError, KnowledgeResult};
use crate::hash::ContentHash;
use crate::scope::ScopeKey;
use crate::value::Attributes;

/// Globally unique, opaque item identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct KnowledgeId(Uuid);

impl KnowledgeId {
    /// Allocate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for KnowledgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for KnowledgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for KnowledgeId {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> KnowledgeResult<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| KnowledgeError::validation(format!("invalid item id {s:?}: {e}")))
    }
}

/// One immutable version of a named piece of knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: KnowledgeId,
    /// Human-chosen, non-unique name shared by every version in a chain.
    pub name: String,
    /// Opaque payload.
    pub content: String,
    /// Content-type tag (e.g. "text", "prompt", "json").
    pub content_type: String,
    pub scope: ScopeKey,
    /// Digest of type, content and attributes; unique within a chain.
    pub content_hash: ContentHash,
    #[serde(default)]
    pub attributes: Attributes,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    /// Store-assigned insertion order. Breaks `created_at` ties.
    #[serde(default)]
    pub sequence: u64,
}

impl KnowledgeItem {
    /// Whether `self` should count as newer than `other` within a chain.
    ///
    /// Later `created_at` wins; on equal timestamps the item inserted first
    /// wins, keeping "latest" deterministic.
    pub fn supersedes(&self, other: &KnowledgeItem) -> bool {
        self.created_at > other.created_at
            || (self.created_at == other.created_at && self.sequence < other.sequence)
    }
}

/// A request to add knowledge to a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct NewKnowledge {
    pub name: String,
    pub scope: ScopeKey,
    pub content: String,
    pub content_type: String,
    pub attributes: Attributes,
    pub created_by: String,
}

impl NewKnowledge {
    pub fn new(
        name: impl Into<String>,
        scope: ScopeKey,
        content: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            scope,
            content: content.into(),
            content_type: content_type.into(),
            attributes: Attributes::new(),
            created_by: String::new(),
        }
    }

    /// Attribute the request to a caller.
    pub fn by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }
}
