//! Principals, resources, access rules and decisions.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::AccessError;
use crate::normalize;

// ── Resources ──────────────────────────────────────────────────────────

/// What kind of unit a resource is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Page,
    Feature,
    ApiEndpoint,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Page => "page",
            ResourceKind::Feature => "feature",
            ResourceKind::ApiEndpoint => "api_endpoint",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "page" => Ok(ResourceKind::Page),
            "feature" => Ok(ResourceKind::Feature),
            "api_endpoint" => Ok(ResourceKind::ApiEndpoint),
            other => Err(AccessError::InvalidRule(format!(
                "unknown resource kind '{other}'"
            ))),
        }
    }
}

/// Identifies a protected resource by name and kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceDescriptor {
    name: String,
    kind: ResourceKind,
}

impl ResourceDescriptor {
    pub fn new(name: &str, kind: ResourceKind) -> Self {
        Self {
            name: normalize::resource_name(name),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

// ── Principal ──────────────────────────────────────────────────────────

/// The authenticated identity a decision is computed for.
///
/// Built once per session by the external auth step. The email is stored
/// normalized, so two principals differing only in email case or padding
/// resolve identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    id: String,
    email: String,
    role: String,
    role_level: i32,
    department: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, email: &str, role: &str, role_level: i32) -> Self {
        Self {
            id: id.into(),
            email: normalize::email(email),
            role: normalize::role(role),
            role_level,
            department: None,
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn role_level(&self) -> i32 {
        self.role_level
    }

    pub fn department(&self) -> Option<&str> {
        self.department.as_deref()
    }
}

// ── Rules ──────────────────────────────────────────────────────────────

/// Whether a user rule grants or revokes access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Allow,
    Deny,
}

impl AccessType {
    pub fn from_desired(has_access: bool) -> Self {
        if has_access {
            AccessType::Allow
        } else {
            AccessType::Deny
        }
    }

    pub fn grants(&self) -> bool {
        matches!(self, AccessType::Allow)
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessType::Allow => f.write_str("allow"),
            AccessType::Deny => f.write_str("deny"),
        }
    }
}

/// A rule granting a resource to a set of roles or to a minimum role level.
///
/// When `allowed_roles` is present it is authoritative and `min_role_level`
/// is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRule {
    pub id: Uuid,
    pub kind: ResourceKind,
    pub resource_name: String,
    pub allowed_roles: Option<BTreeSet<String>>,
    pub min_role_level: Option<i32>,
    pub is_active: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoleRule {
    /// Materialize a new rule from a validated payload.
    pub fn from_new(new: NewRoleRule, now: DateTime<Utc>) -> Result<Self, AccessError> {
        let new = new.normalized()?;
        Ok(Self {
            id: Uuid::new_v4(),
            kind: new.kind,
            resource_name: new.resource_name,
            allowed_roles: new.allowed_roles.map(|roles| roles.into_iter().collect()),
            min_role_level: new.min_role_level,
            is_active: new.is_active,
            description: new.description,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether both evaluation modes are configured on this rule.
    pub fn has_both_modes(&self) -> bool {
        self.allowed_roles.is_some() && self.min_role_level.is_some()
    }
}

/// A per-user allow/deny override for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRule {
    pub id: Uuid,
    pub user_email: String,
    pub kind: ResourceKind,
    pub resource_name: String,
    pub access_type: AccessType,
    pub is_active: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRule {
    /// Materialize a new rule from a validated payload.
    pub fn from_new(new: NewUserRule, now: DateTime<Utc>) -> Result<Self, AccessError> {
        let new = new.normalized()?;
        Ok(Self {
            id: Uuid::new_v4(),
            user_email: new.user_email,
            kind: new.kind,
            resource_name: new.resource_name,
            access_type: new.access_type,
            is_active: new.is_active,
            reason: new.reason,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether this rule targets the given (normalized) email and resource.
    pub fn targets(&self, email: &str, resource: &ResourceDescriptor) -> bool {
        self.user_email == email
            && self.resource_name == resource.name()
            && self.kind == resource.kind()
    }
}

fn default_active() -> bool {
    true
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Payload for creating a role rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoleRule {
    pub kind: ResourceKind,
    pub resource_name: String,
    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,
    #[serde(default)]
    pub min_role_level: Option<i32>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl NewRoleRule {
    /// Grant `resource_name` to an explicit set of roles.
    pub fn for_roles<I, R>(kind: ResourceKind, resource_name: &str, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            kind,
            resource_name: resource_name.to_string(),
            allowed_roles: Some(roles.into_iter().map(Into::into).collect()),
            min_role_level: None,
            is_active: true,
            description: None,
            created_by: None,
        }
    }

    /// Grant `resource_name` to every role at or above `level`.
    pub fn min_level(kind: ResourceKind, resource_name: &str, level: i32) -> Self {
        Self {
            kind,
            resource_name: resource_name.to_string(),
            allowed_roles: None,
            min_role_level: Some(level),
            is_active: true,
            description: None,
            created_by: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    fn normalized(mut self) -> Result<Self, AccessError> {
        self.resource_name = normalize::resource_name(&self.resource_name);
        if self.resource_name.is_empty() {
            return Err(AccessError::InvalidRule("resource_name cannot be empty".into()));
        }
        self.allowed_roles = self.allowed_roles.map(normalize_roles);
        Ok(self)
    }
}

/// Partial update for a role rule. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRulePatch {
    #[serde(default, deserialize_with = "double_option")]
    pub allowed_roles: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub min_role_level: Option<Option<i32>>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

impl RoleRulePatch {
    pub fn apply(self, rule: &mut RoleRule, now: DateTime<Utc>) {
        if let Some(roles) = self.allowed_roles {
            rule.allowed_roles = roles.map(|r| normalize_roles(r).into_iter().collect());
        }
        if let Some(level) = self.min_role_level {
            rule.min_role_level = level;
        }
        if let Some(active) = self.is_active {
            rule.is_active = active;
        }
        if let Some(description) = self.description {
            rule.description = description;
        }
        rule.updated_at = now;
    }
}

/// Payload for creating a user rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserRule {
    pub user_email: String,
    pub kind: ResourceKind,
    pub resource_name: String,
    pub access_type: AccessType,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl NewUserRule {
    pub fn new(
        user_email: &str,
        resource: &ResourceDescriptor,
        access_type: AccessType,
    ) -> Self {
        Self {
            user_email: user_email.to_string(),
            kind: resource.kind(),
            resource_name: resource.name().to_string(),
            access_type,
            is_active: true,
            reason: None,
            created_by: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn created_by(mut self, who: impl Into<String>) -> Self {
        self.created_by = Some(who.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    fn normalized(mut self) -> Result<Self, AccessError> {
        self.user_email = normalize::email(&self.user_email);
        self.resource_name = normalize::resource_name(&self.resource_name);
        if self.user_email.is_empty() {
            return Err(AccessError::InvalidRule("user_email cannot be empty".into()));
        }
        if self.resource_name.is_empty() {
            return Err(AccessError::InvalidRule("resource_name cannot be empty".into()));
        }
        Ok(self)
    }
}

/// Partial update for a user rule.
///
/// The key (email, resource, kind) is immutable; moving an override to a
/// different resource means deleting it and creating a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRulePatch {
    #[serde(default)]
    pub access_type: Option<AccessType>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub reason: Option<Option<String>>,
}

impl UserRulePatch {
    pub fn access_type(access_type: AccessType) -> Self {
        Self {
            access_type: Some(access_type),
            ..Self::default()
        }
    }

    pub fn apply(self, rule: &mut UserRule, now: DateTime<Utc>) {
        if let Some(access_type) = self.access_type {
            rule.access_type = access_type;
        }
        if let Some(active) = self.is_active {
            rule.is_active = active;
        }
        if let Some(reason) = self.reason {
            rule.reason = reason;
        }
        rule.updated_at = now;
    }
}

fn normalize_roles(roles: Vec<String>) -> Vec<String> {
    roles
        .iter()
        .map(|r| normalize::role(r))
        .filter(|r| !r.is_empty())
        .collect()
}

// ── Decisions ──────────────────────────────────────────────────────────

/// Which step of the resolution algorithm produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    IndividualDeny,
    IndividualAllow,
    Role,
    DefaultDeny,
}

/// The resolved outcome for one principal and one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub resource_name: String,
    pub kind: ResourceKind,
    pub has_access: bool,
    pub source: DecisionSource,
    pub rule_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [ResourceKind::Page, ResourceKind::Feature, ResourceKind::ApiEndpoint] {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!("widget".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn principal_normalizes_email() {
        let p = Principal::new("u1", " Jane@Example.com ", " Auditor ", 2);
        assert_eq!(p.email(), "jane@example.com");
        assert_eq!(p.role(), "Auditor");
    }

    #[test]
    fn role_patch_distinguishes_null_from_absent() {
        let patch: RoleRulePatch =
            serde_json::from_str(r#"{"allowed_roles": null, "is_active": false}"#).unwrap();
        assert_eq!(patch.allowed_roles, Some(None));
        assert_eq!(patch.min_role_level, None);
        assert_eq!(patch.is_active, Some(false));
    }

    #[test]
    fn new_user_rule_rejects_blank_email() {
        let resource = ResourceDescriptor::new("audit-reports", ResourceKind::Page);
        let err = UserRule::from_new(NewUserRule::new("  ", &resource, AccessType::Deny), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AccessError::InvalidRule(_)));
    }

    #[test]
    fn new_role_rule_drops_blank_roles() {
        let rule = RoleRule::from_new(
            NewRoleRule::for_roles(ResourceKind::Page, " Audit-Reports ", ["Auditor ", " "]),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(rule.resource_name, "audit-reports");
        let roles: Vec<_> = rule.allowed_roles.unwrap().into_iter().collect();
        assert_eq!(roles, vec!["Auditor".to_string()]);
    }
}
