//! Backend trait and the in-memory implementation.
//!
//! [`RuleBackend`] is the storage seam of the rule store. Implement it to
//! keep rules anywhere; the store adds validation, duplicate checks and the
//! snapshot cache on top.
//!
//! Provided implementations:
//! - [`MemoryRuleBackend`]: in-memory, for tests and the dev server
//! - [`TableRuleBackend`](crate::TableRuleBackend): rows in two tables
//!   reached through any [`DataClient`](qagate_security::DataClient)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use qagate_core::{AccessError, BoxFuture, ResourceDescriptor, RoleRule, UserRule};
use uuid::Uuid;

/// Persistence for role rules and user rules.
///
/// Backends store what they are given: validation and the one-active-rule
/// per key invariant are enforced by [`RuleStore`](crate::RuleStore).
/// `save_*` and `delete_*` fail with [`AccessError::RuleNotFound`] when the
/// id does not exist.
pub trait RuleBackend: Send + Sync + 'static {
    /// Every role rule, active or not.
    fn role_rules(&self) -> BoxFuture<'_, Result<Vec<RoleRule>, AccessError>>;

    /// Every user rule, active or not.
    fn user_rules(&self) -> BoxFuture<'_, Result<Vec<UserRule>, AccessError>>;

    fn role_rule(&self, id: Uuid) -> BoxFuture<'_, Result<Option<RoleRule>, AccessError>>;

    fn user_rule(&self, id: Uuid) -> BoxFuture<'_, Result<Option<UserRule>, AccessError>>;

    /// The earliest-created active user rule for a normalized key.
    fn find_active_user_rule(
        &self,
        email: &str,
        resource: &ResourceDescriptor,
    ) -> BoxFuture<'_, Result<Option<UserRule>, AccessError>>;

    fn insert_role_rule(&self, rule: RoleRule) -> BoxFuture<'_, Result<RoleRule, AccessError>>;

    fn insert_user_rule(&self, rule: UserRule) -> BoxFuture<'_, Result<UserRule, AccessError>>;

    fn save_role_rule(&self, rule: RoleRule) -> BoxFuture<'_, Result<RoleRule, AccessError>>;

    fn save_user_rule(&self, rule: UserRule) -> BoxFuture<'_, Result<UserRule, AccessError>>;

    fn delete_role_rule(&self, id: Uuid) -> BoxFuture<'_, Result<(), AccessError>>;

    fn delete_user_rule(&self, id: Uuid) -> BoxFuture<'_, Result<(), AccessError>>;
}

// ── MemoryRuleBackend ──────────────────────────────────────────────────

/// In-memory rule backend.
///
/// Clones share storage. [`reads`](Self::reads) counts full-table reads,
/// which is how tests observe the store's snapshot cache.
///
/// ```ignore
/// let backend = MemoryRuleBackend::new();
/// let store = RuleStore::with_cache(backend.clone(), 60);
///
/// store.snapshot().await?;
/// store.snapshot().await?;
/// assert_eq!(backend.reads(), 2); // one per rule set, once
/// ```
#[derive(Clone, Default)]
pub struct MemoryRuleBackend {
    role_rules: Arc<DashMap<Uuid, RoleRule>>,
    user_rules: Arc<DashMap<Uuid, UserRule>>,
    reads: Arc<AtomicUsize>,
}

impl MemoryRuleBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `role_rules`/`user_rules` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

pub(crate) fn by_creation<T>(mut rules: Vec<T>, key: impl Fn(&T) -> (chrono::DateTime<chrono::Utc>, Uuid)) -> Vec<T> {
    rules.sort_by_key(|r| key(r));
    rules
}

impl RuleBackend for MemoryRuleBackend {
    fn role_rules(&self) -> BoxFuture<'_, Result<Vec<RoleRule>, AccessError>> {
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let rules = self.role_rules.iter().map(|r| r.value().clone()).collect();
            Ok(by_creation(rules, |r: &RoleRule| (r.created_at, r.id)))
        })
    }

    fn user_rules(&self) -> BoxFuture<'_, Result<Vec<UserRule>, AccessError>> {
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let rules = self.user_rules.iter().map(|r| r.value().clone()).collect();
            Ok(by_creation(rules, |r: &UserRule| (r.created_at, r.id)))
        })
    }

    fn role_rule(&self, id: Uuid) -> BoxFuture<'_, Result<Option<RoleRule>, AccessError>> {
        Box::pin(async move { Ok(self.role_rules.get(&id).map(|r| r.value().clone())) })
    }

    fn user_rule(&self, id: Uuid) -> BoxFuture<'_, Result<Option<UserRule>, AccessError>> {
        Box::pin(async move { Ok(self.user_rules.get(&id).map(|r| r.value().clone())) })
    }

    fn find_active_user_rule(
        &self,
        email: &str,
        resource: &ResourceDescriptor,
    ) -> BoxFuture<'_, Result<Option<UserRule>, AccessError>> {
        let email = email.to_string();
        let resource = resource.clone();
        Box::pin(async move {
            Ok(self
                .user_rules
                .iter()
                .filter(|r| r.is_active && r.targets(&email, &resource))
                .map(|r| r.value().clone())
                .min_by_key(|r| (r.created_at, r.id)))
        })
    }

    fn insert_role_rule(&self, rule: RoleRule) -> BoxFuture<'_, Result<RoleRule, AccessError>> {
        Box::pin(async move {
            self.role_rules.insert(rule.id, rule.clone());
            Ok(rule)
        })
    }

    fn insert_user_rule(&self, rule: UserRule) -> BoxFuture<'_, Result<UserRule, AccessError>> {
        Box::pin(async move {
            self.user_rules.insert(rule.id, rule.clone());
            Ok(rule)
        })
    }

    fn save_role_rule(&self, rule: RoleRule) -> BoxFuture<'_, Result<RoleRule, AccessError>> {
        Box::pin(async move {
            match self.role_rules.get_mut(&rule.id) {
                Some(mut slot) => {
                    *slot = rule.clone();
                    Ok(rule)
                }
                None => Err(AccessError::RuleNotFound(rule.id)),
            }
        })
    }

    fn save_user_rule(&self, rule: UserRule) -> BoxFuture<'_, Result<UserRule, AccessError>> {
        Box::pin(async move {
            match self.user_rules.get_mut(&rule.id) {
                Some(mut slot) => {
                    *slot = rule.clone();
                    Ok(rule)
                }
                None => Err(AccessError::RuleNotFound(rule.id)),
            }
        })
    }

    fn delete_role_rule(&self, id: Uuid) -> BoxFuture<'_, Result<(), AccessError>> {
        Box::pin(async move {
            self.role_rules
                .remove(&id)
                .map(|_| ())
                .ok_or(AccessError::RuleNotFound(id))
        })
    }

    fn delete_user_rule(&self, id: Uuid) -> BoxFuture<'_, Result<(), AccessError>> {
        Box::pin(async move {
            self.user_rules
                .remove(&id)
                .map(|_| ())
                .ok_or(AccessError::RuleNotFound(id))
        })
    }
}
