// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # knowledge-cascade
//!
//! Stores named pieces of knowledge (instructions, prompts, configuration
//! blobs) at one of three nested scopes, keeps an immutable version history
//! per `(name, scope)`, and resolves which version is effective for a runtime
//! context.
//!
//! ## Architecture
//!
//! - **Scope lattice** (`scope`): System < Tenant < Activation, plus the legal override moves
//! - **Content identity** (`hash`, `value`): SHA-256 over type, content, and tagged attributes
//! - **Version chains** (`chain`): append-only, deduplicated by content hash
//! - **Overrides** (`overrides`): copy-on-write into a strictly narrower scope
//! - **Resolution** (`resolve`): most specific scope wins, then latest within it
//! - **Deletion** (`deletion`): per-chain or per-item, never across scopes
//! - **Storage** (`store`): in-memory (DashMap) or durable (redb)
//!
//! ## Library usage
//!
//! ```no_run
//! use knowledge_cascade::engine::KnowledgeEngine;
//! use knowledge_cascade::config::EngineConfig;
//! use knowledge_cascade::item::NewKnowledge;
//! use knowledge_cascade::overrides::OverrideRequest;
//! use knowledge_cascade::scope::{ResolutionContext, ScopeKey};
//!
//! let engine = KnowledgeEngine::new(EngineConfig::default()).unwrap();
//! let base = NewKnowledge::new("greeting", ScopeKey::System, "Hello", "text").by("admin");
//! let (base, _) = engine.create_or_return(base).unwrap();
//! let tenant = OverrideRequest::new(base.id, ScopeKey::tenant("t1"), "admin").with_content("Hi");
//! engine.override_item(tenant).unwrap();
//! let effective = engine
//!     .resolve_one("greeting", &ResolutionContext::tenant("t1"))
//!     .unwrap();
//! assert_eq!(effective.content, "Hi");
//! ```

pub mod access;
pub mod chain;
pub mod clock;
pub mod config;
pub mod deletion;
pub mod engine;
pub mod error;
pub mod hash;
pub mod item;
pub mod overrides;
pub mod resolve;
pub mod scope;
pub mod store;
pub mod value;
