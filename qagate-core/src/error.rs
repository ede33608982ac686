//! Error types shared by every qagate crate.

use std::fmt;

use uuid::Uuid;

use crate::model::ResourceKind;

/// Errors produced by the access-control core.
///
/// Authorization outcomes are never errors: a denied resource is an
/// [`AccessDecision`](crate::AccessDecision) with `has_access == false`.
/// Only authentication failures, rule-store conflicts, and lookups of things
/// that do not exist are reported here.
#[derive(Debug)]
pub enum AccessError {
    /// No verified identity. Data operations fail closed with this error.
    AuthRequired(String),
    /// An active user rule already exists for the same key.
    DuplicateRule {
        user_email: String,
        resource_name: String,
        kind: ResourceKind,
        existing: Uuid,
    },
    /// An active role rule already exists for the same resource.
    DuplicateRoleRule {
        resource_name: String,
        kind: ResourceKind,
        existing: Uuid,
    },
    /// An update or delete referenced a rule id that does not exist.
    RuleNotFound(Uuid),
    /// The resource is not part of the resource catalog.
    UnknownResource(String),
    /// No user profile exists for the given email.
    PrincipalNotFound(String),
    /// A rule write payload failed validation.
    InvalidRule(String),
    /// A resource catalog could not be built.
    InvalidCatalog(String),
    /// The rule backend or data transport failed.
    Storage(String),
    /// Configuration could not be loaded or is invalid.
    Config(String),
}

impl AccessError {
    /// Construct a `Storage` variant from any displayable error.
    pub fn storage(err: impl fmt::Display) -> Self {
        AccessError::Storage(err.to_string())
    }

    /// Whether this error means the caller has no verified identity.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, AccessError::AuthRequired(_))
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::AuthRequired(msg) => write!(f, "Authentication required: {msg}"),
            AccessError::DuplicateRule {
                user_email,
                resource_name,
                kind,
                existing,
            } => write!(
                f,
                "An active rule already exists for {user_email} on {kind} '{resource_name}' \
                 (rule {existing}); update the existing rule instead"
            ),
            AccessError::DuplicateRoleRule {
                resource_name,
                kind,
                existing,
            } => write!(
                f,
                "An active role rule already exists for {kind} '{resource_name}' \
                 (rule {existing}); update the existing rule instead"
            ),
            AccessError::RuleNotFound(id) => write!(f, "Rule not found: {id}"),
            AccessError::UnknownResource(name) => write!(f, "Unknown resource: {name}"),
            AccessError::PrincipalNotFound(email) => write!(f, "No user found for {email}"),
            AccessError::InvalidRule(msg) => write!(f, "Invalid rule: {msg}"),
            AccessError::InvalidCatalog(msg) => write!(f, "Invalid resource catalog: {msg}"),
            AccessError::Storage(msg) => write!(f, "Rule storage error: {msg}"),
            AccessError::Config(msg) => write!(f, "Invalid qagate config: {msg}"),
        }
    }
}

impl std::error::Error for AccessError {}

impl From<serde_json::Error> for AccessError {
    fn from(err: serde_json::Error) -> Self {
        AccessError::Storage(format!("malformed record: {err}"))
    }
}

impl From<serde_yaml::Error> for AccessError {
    fn from(err: serde_yaml::Error) -> Self {
        AccessError::Config(err.to_string())
    }
}
