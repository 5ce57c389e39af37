//! Scope lattice: where a knowledge chain lives and which way overrides may go.
//!
//! Three nested levels form a strict partial order:
//!
//! ```text
//! System  <  Tenant(t)  <  Activation(t, agent, activation)
//! ```
//!
//! Scopes under different tenants (or different activations) are incomparable.
//! Everything here is pure: no state, no I/O.

use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, KnowledgeResult};

/// Separator between qualifiers inside a scope's storage key.
const QUALIFIER_SEP: char = '\u{1f}';

// ---------------------------------------------------------------------------
// Scope level
// ---------------------------------------------------------------------------

/// How specific a scope is. Ordered from least to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScopeLevel {
    System,
    Tenant,
    Activation,
}

impl std::fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Tenant => write!(f, "tenant"),
            Self::Activation => write!(f, "activation"),
        }
    }
}

impl ScopeLevel {
    /// Levels an item at this level may be overridden into.
    ///
    /// The leaf level has no legal target; callers treat the empty slice as a
    /// rejection.
    pub fn override_targets(self) -> &'static [ScopeLevel] {
        match self {
            Self::System => &[ScopeLevel::Tenant, ScopeLevel::Activation],
            Self::Tenant => &[ScopeLevel::Activation],
            Self::Activation => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Scope key
// ---------------------------------------------------------------------------

/// A scope level plus the qualifiers that pin it down.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKey {
    /// Root of the lattice, visible to every tenant.
    System,
    /// Visible to one tenant.
    Tenant { tenant: String },
    /// Visible to one activation of one agent within a tenant.
    Activation {
        tenant: String,
        agent: String,
        activation: String,
    },
}

impl ScopeKey {
    pub fn tenant(tenant: impl Into<String>) -> Self {
        Self::Tenant {
            tenant: tenant.into(),
        }
    }

    pub fn activation(
        tenant: impl Into<String>,
        agent: impl Into<String>,
        activation: impl Into<String>,
    ) -> Self {
        Self::Activation {
            tenant: tenant.into(),
            agent: agent.into(),
            activation: activation.into(),
        }
    }

    /// Build a scope from optional qualifiers, the way a request carries them.
    ///
    /// No qualifiers means System; a tenant alone means Tenant; tenant, agent
    /// and activation together mean Activation. Any other combination is
    /// under-specified and rejected.
    pub fn from_parts(
        tenant: Option<&str>,
        agent: Option<&str>,
        activation: Option<&str>,
    ) -> KnowledgeResult<Self> {
        let scope = match (tenant, agent, activation) {
            (None, None, None) => Self::System,
            (Some(t), None, None) => Self::tenant(t),
            (Some(t), Some(a), Some(x)) => Self::activation(t, a, x),
            (None, _, _) => {
                return Err(KnowledgeError::validation(
                    "agent/activation qualifiers require a tenant id",
                ));
            }
            _ => {
                return Err(KnowledgeError::validation(
                    "an activation scope needs both an agent name and an activation name",
                ));
            }
        };
        scope.validate()?;
        Ok(scope)
    }

    /// The level of this scope in the lattice.
    pub fn level(&self) -> ScopeLevel {
        match self {
            Self::System => ScopeLevel::System,
            Self::Tenant { .. } => ScopeLevel::Tenant,
            Self::Activation { .. } => ScopeLevel::Activation,
        }
    }

    /// Tenant qualifier, if the scope has one.
    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            Self::System => None,
            Self::Tenant { tenant } | Self::Activation { tenant, .. } => Some(tenant),
        }
    }

    /// True iff `self` is strictly less specific than `other` and their
    /// qualifiers agree wherever both specify one.
    pub fn is_ancestor_of(&self, other: &ScopeKey) -> bool {
        match (self, other) {
            (Self::System, Self::Tenant { .. } | Self::Activation { .. }) => true,
            (Self::Tenant { tenant: a }, Self::Activation { tenant: b, .. }) => a == b,
            _ => false,
        }
    }

    /// Check that every qualifier is present and usable as an identifier.
    ///
    /// An empty qualifier is treated as a missing one.
    pub fn validate(&self) -> KnowledgeResult<()> {
        match self {
            Self::System => Ok(()),
            Self::Tenant { tenant } => validate_qualifier("tenant id", tenant),
            Self::Activation {
                tenant,
                agent,
                activation,
            } => {
                validate_qualifier("tenant id", tenant)?;
                validate_qualifier("agent name", agent)?;
                validate_qualifier("activation name", activation)
            }
        }
    }

    /// Stable, prefix-free key used by the stores.
    ///
    /// Qualifiers never contain control characters (see [`validate`](Self::validate)),
    /// so the unit separator cannot collide with qualifier text.
    pub fn storage_key(&self) -> String {
        match self {
            Self::System => "S".to_string(),
            Self::Tenant { tenant } => format!("T{QUALIFIER_SEP}{tenant}"),
            Self::Activation {
                tenant,
                agent,
                activation,
            } => format!(
                "A{QUALIFIER_SEP}{tenant}{QUALIFIER_SEP}{agent}{QUALIFIER_SEP}{activation}"
            ),
        }
    }
}

impl std::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Tenant { tenant } => write!(f, "tenant:{tenant}"),
            Self::Activation {
                tenant,
                agent,
                activation,
            } => write!(f, "activation:{tenant}/{agent}/{activation}"),
        }
    }
}

/// Level of a scope. Free-function form of [`ScopeKey::level`].
pub fn level_of(scope: &ScopeKey) -> ScopeLevel {
    scope.level()
}

/// Whether `a` is a strict ancestor of `b`. See [`ScopeKey::is_ancestor_of`].
pub fn is_ancestor(a: &ScopeKey, b: &ScopeKey) -> bool {
    a.is_ancestor_of(b)
}

/// Levels that an item stored at `source` may be overridden into.
pub fn allowed_override_targets(source: &ScopeKey) -> &'static [ScopeLevel] {
    source.level().override_targets()
}

/// Reject empty qualifiers and anything containing control characters.
pub(crate) fn validate_qualifier(what: &str, value: &str) -> KnowledgeResult<()> {
    if value.trim().is_empty() {
        return Err(KnowledgeError::validation(format!("{what} is missing")));
    }
    if value.chars().any(char::is_control) {
        return Err(KnowledgeError::validation(format!(
            "{what} {value:?} contains control characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Resolution context
// ---------------------------------------------------------------------------

/// The runtime context a caller resolves knowledge for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionContext {
    pub tenant: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub activation: Option<String>,
}

impl ResolutionContext {
    /// A tenant-only context.
    pub fn tenant(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            agent: None,
            activation: None,
        }
    }

    /// A context narrowed to one activation of an agent.
    pub fn activation(
        tenant: impl Into<String>,
        agent: impl Into<String>,
        activation: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            agent: Some(agent.into()),
            activation: Some(activation.into()),
        }
    }

    /// Reachable scopes, most specific first.
    ///
    /// Supplying only one of agent/activation is under-specified and rejected
    /// rather than silently widened to the tenant.
    pub fn cascade(&self) -> KnowledgeResult<Vec<ScopeKey>> {
        validate_qualifier("tenant id", &self.tenant)?;
        let mut scopes = Vec::with_capacity(3);
        match (&self.agent, &self.activation) {
            (Some(agent), Some(activation)) => {
                let leaf = ScopeKey::activation(&self.tenant, agent, activation);
                leaf.validate()?;
                scopes.push(leaf);
            }
            (None, None) => {}
            _ => {
                return Err(KnowledgeError::validation(
                    "resolution context needs both agent and activation, or neither",
                ));
            }
        }
        scopes.push(ScopeKey::tenant(&self.tenant));
        scopes.push(ScopeKey::System);
        Ok(scopes)
    }
}
