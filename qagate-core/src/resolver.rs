//! Per-resource access resolution.

use crate::model::{AccessDecision, DecisionSource, Principal, ResourceDescriptor, RoleRule};
use crate::snapshot::RuleSnapshot;

/// Combines a rule snapshot and a principal into an [`AccessDecision`].
///
/// Resolution is pure: it reads only its arguments, so the same inputs
/// always produce the same decision and calls need no synchronization.
///
/// Precedence, first match wins:
///
/// 1. an active user rule for (email, resource, kind): `deny` then `allow`
///    are returned as-is;
/// 2. the active role rule for (resource, kind), when it grants the
///    principal (`allowed_roles` if set, else `min_role_level`). A role rule
///    that does not grant falls through, it never denies by itself;
/// 3. default deny.
pub struct AccessResolver;

impl AccessResolver {
    pub fn resolve(
        principal: &Principal,
        resource: &ResourceDescriptor,
        snapshot: &RuleSnapshot,
    ) -> AccessDecision {
        if let Some(rule) = snapshot.user_rule_for(principal.email(), resource) {
            let source = if rule.access_type.grants() {
                DecisionSource::IndividualAllow
            } else {
                DecisionSource::IndividualDeny
            };
            return AccessDecision {
                resource_name: resource.name().to_string(),
                kind: resource.kind(),
                has_access: rule.access_type.grants(),
                source,
                rule_id: Some(rule.id),
            };
        }
        Self::resolve_role_only(principal, resource, snapshot)
    }

    /// Resolve while ignoring user overrides: the role-derived default.
    pub fn resolve_role_only(
        principal: &Principal,
        resource: &ResourceDescriptor,
        snapshot: &RuleSnapshot,
    ) -> AccessDecision {
        match snapshot.role_rule_for(resource) {
            Some(rule) if role_rule_grants(rule, principal) => AccessDecision {
                resource_name: resource.name().to_string(),
                kind: resource.kind(),
                has_access: true,
                source: DecisionSource::Role,
                rule_id: Some(rule.id),
            },
            _ => AccessDecision {
                resource_name: resource.name().to_string(),
                kind: resource.kind(),
                has_access: false,
                source: DecisionSource::DefaultDeny,
                rule_id: None,
            },
        }
    }
}

/// Whether a role rule grants the principal.
///
/// `allowed_roles` is authoritative when present, even if `min_role_level`
/// is also set. A rule with neither mode grants nobody.
pub fn role_rule_grants(rule: &RoleRule, principal: &Principal) -> bool {
    match (&rule.allowed_roles, rule.min_role_level) {
        (Some(roles), _) => roles.contains(principal.role()),
        (None, Some(min)) => principal.role_level() >= min,
        (None, None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessType, NewRoleRule, NewUserRule, ResourceKind, UserRule};
    use chrono::Utc;

    fn role_rule(new: NewRoleRule) -> RoleRule {
        RoleRule::from_new(new, Utc::now()).unwrap()
    }

    #[test]
    fn allowed_roles_wins_over_min_level() {
        let mut rule = role_rule(NewRoleRule::for_roles(ResourceKind::Page, "scorecards", ["Admin"]));
        rule.min_role_level = Some(1);
        let agent = Principal::new("u1", "a@x.com", "Agent", 5);
        assert!(!role_rule_grants(&rule, &agent));
    }

    #[test]
    fn min_level_is_inclusive() {
        let rule = role_rule(NewRoleRule::min_level(ResourceKind::Page, "analytics", 3));
        assert!(role_rule_grants(&rule, &Principal::new("u1", "a@x.com", "Lead", 3)));
        assert!(!role_rule_grants(&rule, &Principal::new("u2", "b@x.com", "Agent", 2)));
    }

    #[test]
    fn role_only_ignores_user_override() {
        let resource = ResourceDescriptor::new("analytics", ResourceKind::Page);
        let deny = UserRule::from_new(
            NewUserRule::new("a@x.com", &resource, AccessType::Deny),
            Utc::now(),
        )
        .unwrap();
        let snapshot = RuleSnapshot::new(
            vec![role_rule(NewRoleRule::min_level(ResourceKind::Page, "analytics", 1))],
            vec![deny],
        );
        let p = Principal::new("u1", "a@x.com", "Agent", 1);

        assert_eq!(AccessResolver::resolve(&p, &resource, &snapshot).source, DecisionSource::IndividualDeny);
        let default = AccessResolver::resolve_role_only(&p, &resource, &snapshot);
        assert!(default.has_access);
        assert_eq!(default.source, DecisionSource::Role);
    }
}
