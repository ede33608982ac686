//! Rule storage for qagate.
//!
//! The crate is split into two concerns:
//!
//! - **[`RuleBackend`]** is where rules live. [`MemoryRuleBackend`] keeps
//!   them in process; [`TableRuleBackend`] stores them as rows through any
//!   [`DataClient`](qagate_security::DataClient).
//! - **[`RuleStore`]** wraps a backend, validates and duplicate-checks
//!   writes, and hands out immutable [`RuleSnapshot`](qagate_core::RuleSnapshot)s
//!   for the resolver, cached for a configurable TTL.
//!
//! ```ignore
//! use qagate_rules::{MemoryRuleBackend, RuleStore};
//!
//! let store = RuleStore::with_cache(MemoryRuleBackend::new(), 60);
//! store
//!     .create_role_rule(NewRoleRule::for_roles(ResourceKind::Page, "audit-reports", ["Auditor"]))
//!     .await?;
//!
//! let snapshot = store.snapshot().await?;
//! let decision = AccessResolver::resolve(&principal, &resource, &snapshot);
//! ```

pub mod backend;
pub mod cache;
pub mod store;
pub mod table;

pub use backend::{MemoryRuleBackend, RuleBackend};
pub use cache::SnapshotCache;
pub use store::RuleStore;
pub use table::{TableRuleBackend, ROLE_RULES_TABLE, USER_RULES_TABLE};
