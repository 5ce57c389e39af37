//! Capability check applied at the public boundary.
//!
//! The engine itself is authorization-free and trusts its caller. Front ends
//! (the CLI here, an HTTP layer elsewhere) call [`authorize`] once per request
//! before touching the engine.

use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, KnowledgeResult};
use crate::scope::ScopeKey;

/// What a request wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Resolve, list, and inspect knowledge.
    Read,
    /// Create, update, and override.
    Write,
    /// Delete chains or versions.
    Delete,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A role held by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Full control over every scope.
    SystemAdmin,
    /// Full control over one tenant's scopes (tenant and its activations).
    TenantAdmin { tenant: String },
    /// Read-only access everywhere.
    Reader,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SystemAdmin => write!(f, "system-admin"),
            Self::TenantAdmin { tenant } => write!(f, "tenant-admin:{tenant}"),
            Self::Reader => write!(f, "reader"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = KnowledgeError;

    /// Parse `system-admin`, `tenant-admin:<tenant>`, or `reader`.
    fn from_str(s: &str) -> KnowledgeResult<Self> {
        match s.trim() {
            "system-admin" => Ok(Self::SystemAdmin),
            "reader" => Ok(Self::Reader),
            other => match other.strip_prefix("tenant-admin:") {
                Some(tenant) if !tenant.trim().is_empty() => Ok(Self::TenantAdmin {
                    tenant: tenant.to_string(),
                }),
                _ => Err(KnowledgeError::validation(format!(
                    "unknown role {other:?}; expected system-admin, \
                     tenant-admin:<tenant>, or reader"
                ))),
            },
        }
    }
}

impl Role {
    fn grants(&self, capability: Capability, scope: &ScopeKey) -> bool {
        match (self, capability) {
            (_, Capability::Read) => true,
            (Self::SystemAdmin, _) => true,
            (Self::TenantAdmin { tenant }, _) => scope.tenant_id() == Some(tenant.as_str()),
            (Self::Reader, _) => false,
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub identity: String,
    pub roles: Vec<Role>,
}

impl Caller {
    pub fn new(identity: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            identity: identity.into(),
            roles,
        }
    }
}

/// Allow the request iff one of the caller's roles grants `capability` on
/// `scope`. A caller with no roles is denied everything.
pub fn authorize(caller: &Caller, capability: Capability, scope: &ScopeKey) -> KnowledgeResult<()> {
    if caller.roles.iter().any(|r| r.grants(capability, scope)) {
        return Ok(());
    }
    tracing::warn!(
        caller = %caller.identity,
        %capability,
        scope = %scope,
        "request denied"
    );
    Err(KnowledgeError::Forbidden {
        caller: caller.identity.clone(),
        capability: capability.to_string(),
        scope: scope.to_string(),
    })
}
