//! Rule store - clonable handle over a rule backend.

use std::sync::Arc;

use chrono::Utc;
use qagate_core::{
    normalize, AccessError, NewRoleRule, NewUserRule, ResourceDescriptor, ResourceKind, RoleRule,
    RoleRulePatch, RuleSnapshot, RulesConfig, UserRule, UserRulePatch,
};
use uuid::Uuid;

use crate::backend::RuleBackend;
use crate::cache::SnapshotCache;

/// Clonable handle to a [`RuleBackend`] with an optional snapshot cache.
///
/// The store owns the write-path invariants:
/// - payloads are normalized and validated before they reach the backend;
/// - at most one **active** user rule exists per (email, resource, kind);
///   creating a second one fails with [`AccessError::DuplicateRule`];
/// - at most one **active** role rule exists per (resource, kind); a second
///   one fails with [`AccessError::DuplicateRoleRule`].
///
/// # Consistency
///
/// Rule changes are eventually consistent. A write through this store (or
/// [`clear_cache`](Self::clear_cache)) guarantees that the *next* call to
/// [`snapshot`](Self::snapshot) reads the backend again. Snapshots handed out
/// earlier are immutable and keep answering with the rules they were built
/// from, so resolutions already in flight may complete against the older
/// rule set. Writes made directly against the backend are only picked up
/// once the cached snapshot expires or the cache is cleared.
#[derive(Clone)]
pub struct RuleStore {
    backend: Arc<dyn RuleBackend>,
    cache: Option<Arc<SnapshotCache>>,
}

impl RuleStore {
    /// A store that reads the backend on every snapshot.
    pub fn new(backend: impl RuleBackend) -> Self {
        Self {
            backend: Arc::new(backend),
            cache: None,
        }
    }

    /// A store caching snapshots for `ttl_secs`.
    pub fn with_cache(backend: impl RuleBackend, ttl_secs: u64) -> Self {
        Self {
            backend: Arc::new(backend),
            cache: Some(Arc::new(SnapshotCache::new(ttl_secs))),
        }
    }

    pub fn from_config(backend: Arc<dyn RuleBackend>, config: &RulesConfig) -> Self {
        Self {
            backend,
            cache: config
                .cache_enabled
                .then(|| Arc::new(SnapshotCache::new(config.snapshot_ttl_secs))),
        }
    }

    pub fn backend(&self) -> &Arc<dyn RuleBackend> {
        &self.backend
    }

    // ── Snapshots ──────────────────────────────────────────────────────

    /// The active rule set, from cache when fresh.
    pub async fn snapshot(&self) -> Result<Arc<RuleSnapshot>, AccessError> {
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get()) {
            tracing::trace!(rules = cached.len(), "rule snapshot cache hit");
            return Ok(cached);
        }
        self.fresh_snapshot().await
    }

    /// Read both rule sets from the backend, bypassing (and then refreshing)
    /// the cache.
    pub async fn fresh_snapshot(&self) -> Result<Arc<RuleSnapshot>, AccessError> {
        let generation = self.cache.as_ref().map(|c| c.generation());

        let role_rules = self.backend.role_rules().await?;
        let user_rules = self.backend.user_rules().await?;
        let snapshot = Arc::new(RuleSnapshot::new(role_rules, user_rules));
        tracing::debug!(rules = snapshot.len(), "rule snapshot loaded");

        if let Some((cache, generation)) = self.cache.as_ref().zip(generation) {
            if !cache.set(generation, snapshot.clone()) {
                tracing::debug!("rule cache cleared during load, snapshot not cached");
            }
        }
        Ok(snapshot)
    }

    /// Active rules, optionally restricted to one resource kind.
    pub async fn list_active(
        &self,
        kind: Option<ResourceKind>,
    ) -> Result<Arc<RuleSnapshot>, AccessError> {
        let snapshot = self.snapshot().await?;
        Ok(match kind {
            Some(kind) => Arc::new(snapshot.of_kind(kind)),
            None => snapshot,
        })
    }

    /// Drop the cached snapshot. The next [`snapshot`](Self::snapshot) reads
    /// the backend.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
            tracing::debug!("rule cache cleared");
        }
    }

    // ── Listing ────────────────────────────────────────────────────────

    /// Every role rule, including inactive ones, oldest first.
    pub async fn list_role_rules(&self) -> Result<Vec<RoleRule>, AccessError> {
        let mut rules = self.backend.role_rules().await?;
        rules.sort_by_key(|r| (r.created_at, r.id));
        Ok(rules)
    }

    /// Every user rule, including inactive ones, oldest first. When `email`
    /// is given only that user's rules are returned.
    pub async fn list_user_rules(&self, email: Option<&str>) -> Result<Vec<UserRule>, AccessError> {
        let email = email.map(normalize::email);
        let mut rules = self.backend.user_rules().await?;
        if let Some(email) = &email {
            rules.retain(|r| normalize::email(&r.user_email) == *email);
        }
        rules.sort_by_key(|r| (r.created_at, r.id));
        Ok(rules)
    }

    /// The active override for a key, read from the backend, not the cache.
    pub async fn find_active_user_rule(
        &self,
        email: &str,
        resource: &ResourceDescriptor,
    ) -> Result<Option<UserRule>, AccessError> {
        self.backend
            .find_active_user_rule(&normalize::email(email), resource)
            .await
    }

    // ── Role rules ─────────────────────────────────────────────────────

    /// Create a role rule. An active rule is rejected with
    /// [`AccessError::DuplicateRoleRule`] when the resource already has one.
    pub async fn create_role_rule(&self, new: NewRoleRule) -> Result<RoleRule, AccessError> {
        let rule = RoleRule::from_new(new, Utc::now())?;
        if rule.is_active {
            self.ensure_no_active_role_rule(&rule).await?;
        }
        warn_if_both_modes(&rule);
        let rule = self.backend.insert_role_rule(rule).await?;
        self.clear_cache();
        tracing::info!(
            rule_id = %rule.id,
            resource = %rule.resource_name,
            kind = %rule.kind,
            "role rule created"
        );
        Ok(rule)
    }

    pub async fn update_role_rule(
        &self,
        id: Uuid,
        patch: RoleRulePatch,
    ) -> Result<RoleRule, AccessError> {
        let mut rule = self
            .backend
            .role_rule(id)
            .await?
            .ok_or(AccessError::RuleNotFound(id))?;
        let was_active = rule.is_active;
        patch.apply(&mut rule, Utc::now());
        if rule.is_active && !was_active {
            self.ensure_no_active_role_rule(&rule).await?;
        }
        warn_if_both_modes(&rule);
        let rule = self.backend.save_role_rule(rule).await?;
        self.clear_cache();
        tracing::info!(rule_id = %id, is_active = rule.is_active, "role rule updated");
        Ok(rule)
    }

    /// Hard delete; nothing else references the rule.
    pub async fn delete_role_rule(&self, id: Uuid) -> Result<(), AccessError> {
        self.backend.delete_role_rule(id).await?;
        self.clear_cache();
        tracing::info!(rule_id = %id, "role rule deleted");
        Ok(())
    }

    // ── User rules ─────────────────────────────────────────────────────

    /// Create a user override.
    ///
    /// Fails with [`AccessError::DuplicateRule`] when an active rule already
    /// exists for the same (email, resource, kind); update that rule instead.
    pub async fn create_user_rule(&self, new: NewUserRule) -> Result<UserRule, AccessError> {
        let rule = UserRule::from_new(new, Utc::now())?;
        if rule.is_active {
            self.ensure_no_active_rule(&rule).await?;
        }
        let rule = self.backend.insert_user_rule(rule).await?;
        self.clear_cache();
        tracing::info!(
            rule_id = %rule.id,
            user = %rule.user_email,
            resource = %rule.resource_name,
            access = %rule.access_type,
            "user rule created"
        );
        Ok(rule)
    }

    /// Patch a user override. Re-activating a rule is duplicate-checked like
    /// a create.
    pub async fn update_user_rule(
        &self,
        id: Uuid,
        patch: UserRulePatch,
    ) -> Result<UserRule, AccessError> {
        let mut rule = self
            .backend
            .user_rule(id)
            .await?
            .ok_or(AccessError::RuleNotFound(id))?;
        let was_active = rule.is_active;
        patch.apply(&mut rule, Utc::now());
        if rule.is_active && !was_active {
            self.ensure_no_active_rule(&rule).await?;
        }
        let rule = self.backend.save_user_rule(rule).await?;
        self.clear_cache();
        tracing::info!(
            rule_id = %id,
            access = %rule.access_type,
            is_active = rule.is_active,
            "user rule updated"
        );
        Ok(rule)
    }

    /// Hard delete; the user falls back to role-based access.
    pub async fn delete_user_rule(&self, id: Uuid) -> Result<(), AccessError> {
        self.backend.delete_user_rule(id).await?;
        self.clear_cache();
        tracing::info!(rule_id = %id, "user rule deleted");
        Ok(())
    }

    async fn ensure_no_active_role_rule(&self, rule: &RoleRule) -> Result<(), AccessError> {
        let existing = self
            .backend
            .role_rules()
            .await?
            .into_iter()
            .filter(|r| {
                r.is_active
                    && r.id != rule.id
                    && r.kind == rule.kind
                    && r.resource_name == rule.resource_name
            })
            .min_by_key(|r| (r.created_at, r.id));
        match existing {
            Some(existing) => {
                tracing::debug!(
                    existing = %existing.id,
                    resource = %rule.resource_name,
                    "duplicate active role rule rejected"
                );
                Err(AccessError::DuplicateRoleRule {
                    resource_name: rule.resource_name.clone(),
                    kind: rule.kind,
                    existing: existing.id,
                })
            }
            None => Ok(()),
        }
    }

    async fn ensure_no_active_rule(&self, rule: &UserRule) -> Result<(), AccessError> {
        let resource = ResourceDescriptor::new(&rule.resource_name, rule.kind);
        match self
            .backend
            .find_active_user_rule(&rule.user_email, &resource)
            .await?
        {
            Some(existing) if existing.id != rule.id => {
                tracing::debug!(
                    existing = %existing.id,
                    user = %rule.user_email,
                    resource = %rule.resource_name,
                    "duplicate active user rule rejected"
                );
                Err(AccessError::DuplicateRule {
                    user_email: rule.user_email.clone(),
                    resource_name: rule.resource_name.clone(),
                    kind: rule.kind,
                    existing: existing.id,
                })
            }
            _ => Ok(()),
        }
    }
}

fn warn_if_both_modes(rule: &RoleRule) {
    if rule.has_both_modes() {
        tracing::warn!(
            rule_id = %rule.id,
            resource = %rule.resource_name,
            "role rule sets both allowed_roles and min_role_level; min_role_level is ignored"
        );
    }
}
