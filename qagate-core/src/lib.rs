//! Core model for qagate, the access-control layer of the quality-audit platform.
//!
//! This crate holds everything that is pure: the data model, the resource
//! catalog, immutable rule snapshots and the [`AccessResolver`]. Storage,
//! identity verification and the administrative surface live in the sibling
//! crates and depend on this one.
//!
//! # Resolution
//!
//! ```
//! use qagate_core::{
//!     AccessResolver, DecisionSource, NewRoleRule, Principal, ResourceDescriptor,
//!     ResourceKind, RoleRule, RuleSnapshot,
//! };
//!
//! let rule = RoleRule::from_new(
//!     NewRoleRule::for_roles(ResourceKind::Page, "audit-reports", ["Auditor", "Admin"]),
//!     chrono::Utc::now(),
//! )
//! .unwrap();
//! let snapshot = RuleSnapshot::new(vec![rule], vec![]);
//!
//! let jane = Principal::new("u-1", "jane@example.com", "Auditor", 2);
//! let reports = ResourceDescriptor::new("audit-reports", ResourceKind::Page);
//!
//! let decision = AccessResolver::resolve(&jane, &reports, &snapshot);
//! assert!(decision.has_access);
//! assert_eq!(decision.source, DecisionSource::Role);
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod resolver;
pub mod snapshot;

use std::future::Future;
use std::pin::Pin;

pub use catalog::{CatalogCategory, CatalogEntry, ResourceCatalog};
pub use config::{AuditConfig, IdentityConfig, LogFormat, QagateConfig, RulesConfig, ServerConfig};
pub use error::AccessError;
pub use model::{
    AccessDecision, AccessType, DecisionSource, NewRoleRule, NewUserRule, Principal,
    ResourceDescriptor, ResourceKind, RoleRule, RoleRulePatch, UserRule, UserRulePatch,
};
pub use resolver::{role_rule_grants, AccessResolver};
pub use snapshot::RuleSnapshot;

/// Boxed, sendable future used at the object-safe seams (backends, providers).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        AccessDecision, AccessError, AccessResolver, AccessType, DecisionSource, Principal,
        ResourceCatalog, ResourceDescriptor, ResourceKind, RuleSnapshot,
    };
}
