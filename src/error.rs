//! Diagnostic error types for the knowledge engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! so every failure carries a stable code and a hint on what to do next. The
//! engine never panics on bad input and never retries on its own: every write is
//! idempotent, so retrying is left to the caller.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;

/// Top-level error type for knowledge operations.
///
/// The first six variants are the stable error kinds a transport layer maps to
/// status codes; the rest wrap subsystem failures and keep their diagnostics.
#[derive(Debug, Error, Diagnostic)]
pub enum KnowledgeError {
    #[error("not found: {what}")]
    #[diagnostic(
        code(kc::knowledge::not_found),
        help(
            "No knowledge matched the lookup. Check the item id, or the name and \
             scope of the chain. Use `kcascade list` to see what exists at a scope."
        )
    )]
    NotFound { what: String },

    #[error("invalid scope transition: cannot override from {from} to {to}")]
    #[diagnostic(
        code(kc::knowledge::invalid_scope_transition),
        help(
            "Overrides only narrow scope: system -> tenant, system -> activation, \
             or tenant -> activation. Activation-scoped items cannot be overridden."
        )
    )]
    InvalidScopeTransition { from: String, to: String },

    #[error("scope mismatch: {to} does not extend {from}")]
    #[diagnostic(
        code(kc::knowledge::scope_mismatch),
        help(
            "The target scope must belong to the same tenant as the source item. \
             Pick an activation under the source tenant."
        )
    )]
    ScopeMismatch { from: String, to: String },

    #[error("validation failed: {message}")]
    #[diagnostic(code(kc::knowledge::validation), help("{message}"))]
    Validation { message: String },

    #[error("conflict: {message}")]
    #[diagnostic(
        code(kc::knowledge::conflict),
        help(
            "The store refused a write that deduplication could not explain. \
             This points at index corruption; re-read the chain and retry."
        )
    )]
    Conflict { message: String },

    #[error("{caller} lacks {capability} permission on {scope}")]
    #[diagnostic(
        code(kc::knowledge::forbidden),
        help("Ask an administrator of that scope, or pass a role that grants it with `--role`.")
    )]
    Forbidden {
        caller: String,
        capability: String,
        scope: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

impl KnowledgeError {
    /// Shorthand for a [`KnowledgeError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`KnowledgeError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(kc::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(kc::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             If it persists across restarts, the database file may be corrupt."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(kc::store::serde),
        help(
            "Failed to encode or decode a stored item. \
             This usually means the data file was written by an incompatible version."
        )
    )]
    Serialization { message: String },

    #[error("uniqueness conflict on {key}")]
    #[diagnostic(
        code(kc::store::conflict),
        help("An index entry points at a record that does not match it. Retry the write.")
    )]
    Conflict { key: String },
}

/// Convenience alias for functions returning knowledge results.
pub type KnowledgeResult<T> = std::result::Result<T, KnowledgeError>;
