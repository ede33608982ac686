//! Effective-access reports, explained access tests and minimal-diff toggles.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use qagate_core::{
    AccessDecision, AccessError, AccessResolver, AccessType, DecisionSource, NewUserRule,
    Principal, ResourceCatalog, ResourceDescriptor, ResourceKind, RoleRule, RuleSnapshot,
    UserRule, UserRulePatch,
};
use qagate_rules::RuleStore;
use serde::Serialize;
use uuid::Uuid;

use crate::directory::PrincipalDirectory;

/// Reason recorded on overrides created by [`AccessSimulator::toggle_access`].
const TOGGLE_REASON: &str = "set from access simulator";

/// One resolved resource in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceAccess {
    pub display_label: String,
    #[serde(flatten)]
    pub decision: AccessDecision,
}

/// Decisions for one catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryAccess {
    pub category: String,
    pub resources: Vec<ResourceAccess>,
}

/// Every cataloged resource resolved for one principal.
#[derive(Debug, Clone, Serialize)]
pub struct AccessReport {
    pub email: String,
    pub role: String,
    pub role_level: i32,
    pub generated_at: DateTime<Utc>,
    pub groups: Vec<CategoryAccess>,
}

impl AccessReport {
    /// All decisions in catalog order.
    pub fn decisions(&self) -> impl Iterator<Item = &AccessDecision> {
        self.groups
            .iter()
            .flat_map(|g| g.resources.iter().map(|r| &r.decision))
    }

    /// Number of resources the principal may use.
    pub fn granted(&self) -> usize {
        self.decisions().filter(|d| d.has_access).count()
    }

    /// The decision for a resource, if it is part of the report.
    pub fn decision_for(&self, name: &str, kind: ResourceKind) -> Option<&AccessDecision> {
        self.decisions()
            .find(|d| d.resource_name == name && d.kind == kind)
    }
}

/// A single resolution plus the reason behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessTestResult {
    pub decision: AccessDecision,
    pub reason: String,
    pub tested_at: DateTime<Utc>,
}

/// Per-user override state of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideState {
    NoOverride,
    AllowOverride,
    DenyOverride,
}

impl OverrideState {
    fn of(rule: Option<&UserRule>) -> Self {
        match rule.map(|r| r.access_type) {
            None => OverrideState::NoOverride,
            Some(AccessType::Allow) => OverrideState::AllowOverride,
            Some(AccessType::Deny) => OverrideState::DenyOverride,
        }
    }
}

/// What [`AccessSimulator::toggle_access`] changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "rule", rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// A new override was created.
    Created(UserRule),
    /// The existing override flipped between allow and deny.
    Updated(UserRule),
    /// The override was deleted; role-based access applies again.
    Removed(Uuid),
    /// The principal already had the requested access.
    Unchanged,
}

/// Orchestrates catalog, rule store and resolver for the admin surface.
///
/// Reports and tests resolve against [`RuleStore::snapshot`], so for a
/// given snapshot they are exactly reproducible. Toggles decide from a fresh
/// backend read.
#[derive(Clone)]
pub struct AccessSimulator {
    store: RuleStore,
    catalog: Arc<ResourceCatalog>,
    directory: Arc<dyn PrincipalDirectory>,
}

impl AccessSimulator {
    pub fn new(store: RuleStore, catalog: ResourceCatalog, directory: impl PrincipalDirectory) -> Self {
        Self::from_parts(store, Arc::new(catalog), Arc::new(directory))
    }

    pub fn from_parts(
        store: RuleStore,
        catalog: Arc<ResourceCatalog>,
        directory: Arc<dyn PrincipalDirectory>,
    ) -> Self {
        Self {
            store,
            catalog,
            directory,
        }
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    // ── Principal-based operations ─────────────────────────────────────

    /// Resolve every cataloged resource, grouped by category in catalog order.
    pub async fn build_effective_access_report(
        &self,
        principal: &Principal,
    ) -> Result<AccessReport, AccessError> {
        let snapshot = self.store.snapshot().await?;
        Ok(self.report_from(principal, &snapshot))
    }

    /// Report against an explicit snapshot.
    pub fn report_from(&self, principal: &Principal, snapshot: &RuleSnapshot) -> AccessReport {
        let groups = self
            .catalog
            .grouped()
            .into_iter()
            .map(|group| CategoryAccess {
                category: group.category.to_string(),
                resources: group
                    .entries
                    .into_iter()
                    .map(|entry| ResourceAccess {
                        display_label: entry.display_label.clone(),
                        decision: AccessResolver::resolve(principal, &entry.descriptor(), snapshot),
                    })
                    .collect(),
            })
            .collect();

        AccessReport {
            email: principal.email().to_string(),
            role: principal.role().to_string(),
            role_level: principal.role_level(),
            generated_at: Utc::now(),
            groups,
        }
    }

    /// Resolve one resource and explain which rule decided it.
    pub async fn test_access(
        &self,
        principal: &Principal,
        resource: &ResourceDescriptor,
    ) -> Result<AccessTestResult, AccessError> {
        let snapshot = self.store.snapshot().await?;
        Ok(self.test_from(principal, resource, &snapshot))
    }

    /// Test against an explicit snapshot.
    pub fn test_from(
        &self,
        principal: &Principal,
        resource: &ResourceDescriptor,
        snapshot: &RuleSnapshot,
    ) -> AccessTestResult {
        let decision = AccessResolver::resolve(principal, resource, snapshot);
        let reason = explain(principal, resource, snapshot, &decision);
        tracing::debug!(
            user = %principal.email(),
            resource = %resource.name(),
            has_access = decision.has_access,
            source = ?decision.source,
            "access tested"
        );
        AccessTestResult {
            decision,
            reason,
            tested_at: Utc::now(),
        }
    }

    /// The active override for a resource, read from the backend.
    pub async fn override_state(
        &self,
        principal: &Principal,
        resource: &ResourceDescriptor,
    ) -> Result<OverrideState, AccessError> {
        let existing = self
            .store
            .find_active_user_rule(principal.email(), resource)
            .await?;
        Ok(OverrideState::of(existing.as_ref()))
    }

    /// Make the principal's access to `resource` equal `desired` with the
    /// smallest rule change:
    ///
    /// | override | `desired` vs role default | action |
    /// |----------|---------------------------|--------|
    /// | none     | equal                     | nothing |
    /// | none     | different                 | create allow/deny override |
    /// | any      | equal                     | delete override |
    /// | same     | different                 | nothing |
    /// | opposite | different                 | flip override in place |
    pub async fn toggle_access(
        &self,
        principal: &Principal,
        resource: &ResourceDescriptor,
        desired: bool,
    ) -> Result<ToggleOutcome, AccessError> {
        let snapshot = self.store.fresh_snapshot().await?;
        let role_default = AccessResolver::resolve_role_only(principal, resource, &snapshot).has_access;
        let existing = self
            .store
            .find_active_user_rule(principal.email(), resource)
            .await?;

        let outcome = match existing {
            None if desired == role_default => ToggleOutcome::Unchanged,
            None => {
                let new = NewUserRule::new(principal.email(), resource, AccessType::from_desired(desired))
                    .with_reason(TOGGLE_REASON);
                ToggleOutcome::Created(self.store.create_user_rule(new).await?)
            }
            Some(rule) if desired == role_default => {
                self.store.delete_user_rule(rule.id).await?;
                ToggleOutcome::Removed(rule.id)
            }
            Some(rule) if rule.access_type.grants() == desired => ToggleOutcome::Unchanged,
            Some(rule) => {
                let patch = UserRulePatch::access_type(AccessType::from_desired(desired));
                ToggleOutcome::Updated(self.store.update_user_rule(rule.id, patch).await?)
            }
        };

        tracing::info!(
            user = %principal.email(),
            resource = %resource.name(),
            kind = %resource.kind(),
            desired,
            role_default,
            outcome = outcome_name(&outcome),
            "access toggled"
        );
        Ok(outcome)
    }

    // ── Email-based operations ─────────────────────────────────────────

    /// Look a principal up in the directory.
    pub async fn principal(&self, email: &str) -> Result<Principal, AccessError> {
        self.directory
            .find_by_email(email)
            .await?
            .ok_or_else(|| AccessError::PrincipalNotFound(email.trim().to_string()))
    }

    /// Resolve a cataloged resource by name, and by kind when given.
    pub fn resource(
        &self,
        name: &str,
        kind: Option<ResourceKind>,
    ) -> Result<ResourceDescriptor, AccessError> {
        let entry = match kind {
            Some(kind) => self.catalog.lookup_kind(name, kind)?,
            None => self.catalog.lookup(name)?,
        };
        Ok(entry.descriptor())
    }

    pub async fn report_for_email(&self, email: &str) -> Result<AccessReport, AccessError> {
        let principal = self.principal(email).await?;
        self.build_effective_access_report(&principal).await
    }

    pub async fn test_access_for_email(
        &self,
        email: &str,
        resource_name: &str,
        kind: Option<ResourceKind>,
    ) -> Result<AccessTestResult, AccessError> {
        let resource = self.resource(resource_name, kind)?;
        let principal = self.principal(email).await?;
        self.test_access(&principal, &resource).await
    }

    pub async fn toggle_access_for_email(
        &self,
        email: &str,
        resource_name: &str,
        kind: Option<ResourceKind>,
        desired: bool,
    ) -> Result<ToggleOutcome, AccessError> {
        let resource = self.resource(resource_name, kind)?;
        let principal = self.principal(email).await?;
        self.toggle_access(&principal, &resource, desired).await
    }
}

fn outcome_name(outcome: &ToggleOutcome) -> &'static str {
    match outcome {
        ToggleOutcome::Created(_) => "created",
        ToggleOutcome::Updated(_) => "updated",
        ToggleOutcome::Removed(_) => "removed",
        ToggleOutcome::Unchanged => "unchanged",
    }
}

fn explain(
    principal: &Principal,
    resource: &ResourceDescriptor,
    snapshot: &RuleSnapshot,
    decision: &AccessDecision,
) -> String {
    let role = principal.role();
    let role_rule = snapshot.role_rule_for(resource);
    let role_default = AccessResolver::resolve_role_only(principal, resource, snapshot).has_access;

    match decision.source {
        DecisionSource::IndividualDeny if role_default => {
            format!("individual deny rule overrides role-based grant for role {role}")
        }
        DecisionSource::IndividualDeny => {
            format!("individual deny rule for {}", principal.email())
        }
        DecisionSource::IndividualAllow if role_default => {
            format!("individual allow rule for {} (role {role} is also granted)", principal.email())
        }
        DecisionSource::IndividualAllow => {
            format!("individual allow rule overrides role-based denial for role {role}")
        }
        DecisionSource::Role => match role_rule {
            Some(rule) => role_grant_reason(principal, rule),
            None => format!("role {role} is granted"),
        },
        DecisionSource::DefaultDeny => match role_rule {
            Some(rule) => role_denial_reason(principal, resource, rule),
            None => format!(
                "no rule grants access to {} '{}'; denied by default",
                resource.kind(),
                resource.name()
            ),
        },
    }
}

fn role_grant_reason(principal: &Principal, rule: &RoleRule) -> String {
    match (&rule.allowed_roles, rule.min_role_level) {
        (Some(_), _) => format!("role {} is in the allowed roles", principal.role()),
        (None, Some(min)) => format!(
            "role level {} meets the minimum level {min}",
            principal.role_level()
        ),
        (None, None) => format!("role {} is granted", principal.role()),
    }
}

fn role_denial_reason(principal: &Principal, resource: &ResourceDescriptor, rule: &RoleRule) -> String {
    match (&rule.allowed_roles, rule.min_role_level) {
        (Some(roles), _) if roles.is_empty() => format!(
            "role rule for '{}' allows no roles; denied by default",
            resource.name()
        ),
        (Some(_), _) => format!(
            "role {} is not in the allowed roles for '{}'; denied by default",
            principal.role(),
            resource.name()
        ),
        (None, Some(min)) => format!(
            "role level {} is below the minimum level {min} for '{}'; denied by default",
            principal.role_level(),
            resource.name()
        ),
        (None, None) => format!(
            "role rule for '{}' grants no roles or levels; denied by default",
            resource.name()
        ),
    }
}
