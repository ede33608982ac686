//! Immutable, indexed view of the active rule sets.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::{ResourceDescriptor, ResourceKind, RoleRule, UserRule};
use crate::normalize;

type RoleKey = (String, ResourceKind);
type UserKey = (String, String, ResourceKind);

/// Active role and user rules at one point in time.
///
/// A snapshot is never mutated after construction, so any number of
/// concurrent resolutions can read it without synchronization. Rule keys
/// are normalized here; rows read from storage may not be.
///
/// If storage holds more than one active rule for a key (the write-time
/// duplicate check was bypassed), the earliest-created rule wins.
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    role_rules: Vec<RoleRule>,
    user_rules: Vec<UserRule>,
    role_index: HashMap<RoleKey, usize>,
    user_index: HashMap<UserKey, usize>,
    fetched_at: DateTime<Utc>,
}

impl RuleSnapshot {
    pub fn new(role_rules: Vec<RoleRule>, user_rules: Vec<UserRule>) -> Self {
        let mut role_rules: Vec<RoleRule> = role_rules
            .into_iter()
            .filter(|r| r.is_active)
            .map(|mut r| {
                r.resource_name = normalize::resource_name(&r.resource_name);
                r
            })
            .collect();
        role_rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut user_rules: Vec<UserRule> = user_rules
            .into_iter()
            .filter(|r| r.is_active)
            .map(|mut r| {
                r.user_email = normalize::email(&r.user_email);
                r.resource_name = normalize::resource_name(&r.resource_name);
                r
            })
            .collect();
        user_rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut role_index = HashMap::with_capacity(role_rules.len());
        for (idx, rule) in role_rules.iter().enumerate() {
            let key = (rule.resource_name.clone(), rule.kind);
            if let Some(&winner) = role_index.get(&key) {
                let winner: &RoleRule = &role_rules[winner];
                tracing::warn!(
                    resource = %rule.resource_name,
                    kind = %rule.kind,
                    kept = %winner.id,
                    shadowed = %rule.id,
                    "multiple active role rules for one resource"
                );
                continue;
            }
            role_index.insert(key, idx);
        }

        let mut user_index = HashMap::with_capacity(user_rules.len());
        for (idx, rule) in user_rules.iter().enumerate() {
            let key = (rule.user_email.clone(), rule.resource_name.clone(), rule.kind);
            if let Some(&winner) = user_index.get(&key) {
                let winner: &UserRule = &user_rules[winner];
                tracing::warn!(
                    user = %rule.user_email,
                    resource = %rule.resource_name,
                    kind = %rule.kind,
                    kept = %winner.id,
                    shadowed = %rule.id,
                    "multiple active user rules for one key"
                );
                continue;
            }
            user_index.insert(key, idx);
        }

        Self {
            role_rules,
            user_rules,
            role_index,
            user_index,
            fetched_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// The deciding role rule for a resource, if any.
    pub fn role_rule_for(&self, resource: &ResourceDescriptor) -> Option<&RoleRule> {
        self.role_index
            .get(&(resource.name().to_string(), resource.kind()))
            .map(|&idx| &self.role_rules[idx])
    }

    /// The active user rule for a normalized email and a resource, if any.
    pub fn user_rule_for(&self, email: &str, resource: &ResourceDescriptor) -> Option<&UserRule> {
        self.user_index
            .get(&(email.to_string(), resource.name().to_string(), resource.kind()))
            .map(|&idx| &self.user_rules[idx])
    }

    /// Active role rules, oldest first.
    pub fn role_rules(&self) -> &[RoleRule] {
        &self.role_rules
    }

    /// Active user rules, oldest first.
    pub fn user_rules(&self) -> &[UserRule] {
        &self.user_rules
    }

    /// Restrict the snapshot to one resource kind.
    pub fn of_kind(&self, kind: ResourceKind) -> Self {
        let mut snapshot = Self::new(
            self.role_rules.iter().filter(|r| r.kind == kind).cloned().collect(),
            self.user_rules.iter().filter(|r| r.kind == kind).cloned().collect(),
        );
        snapshot.fetched_at = self.fetched_at;
        snapshot
    }

    /// When the underlying rules were read.
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.role_rules.len() + self.user_rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RuleSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
