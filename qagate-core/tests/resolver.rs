use chrono::{Duration, Utc};
use qagate_core::{
    AccessResolver, AccessType, DecisionSource, NewRoleRule, NewUserRule, Principal,
    ResourceDescriptor, ResourceKind, RoleRule, RuleSnapshot, UserRule,
};

fn jane() -> Principal {
    Principal::new("u-jane", "jane@example.com", "Auditor", 2)
}

fn reports() -> ResourceDescriptor {
    ResourceDescriptor::new("audit-reports", ResourceKind::Page)
}

fn role_rule(roles: &[&str]) -> RoleRule {
    RoleRule::from_new(
        NewRoleRule::for_roles(ResourceKind::Page, "audit-reports", roles.iter().copied()),
        Utc::now(),
    )
    .unwrap()
}

fn user_rule(email: &str, access: AccessType) -> UserRule {
    UserRule::from_new(NewUserRule::new(email, &reports(), access), Utc::now()).unwrap()
}

// ── Precedence ──

#[test]
fn individual_deny_beats_role_grant() {
    let deny = user_rule("jane@example.com", AccessType::Deny);
    let deny_id = deny.id;
    let snapshot = RuleSnapshot::new(vec![role_rule(&["Auditor"])], vec![deny]);

    let decision = AccessResolver::resolve(&jane(), &reports(), &snapshot);
    assert!(!decision.has_access);
    assert_eq!(decision.source, DecisionSource::IndividualDeny);
    assert_eq!(decision.rule_id, Some(deny_id));
}

#[test]
fn individual_allow_without_role_rule() {
    let snapshot = RuleSnapshot::new(vec![], vec![user_rule("jane@example.com", AccessType::Allow)]);

    let decision = AccessResolver::resolve(&jane(), &reports(), &snapshot);
    assert!(decision.has_access);
    assert_eq!(decision.source, DecisionSource::IndividualAllow);
}

#[test]
fn individual_allow_beats_excluding_role_rule() {
    let snapshot = RuleSnapshot::new(
        vec![role_rule(&["Admin"])],
        vec![user_rule("jane@example.com", AccessType::Allow)],
    );

    let decision = AccessResolver::resolve(&jane(), &reports(), &snapshot);
    assert!(decision.has_access);
    assert_eq!(decision.source, DecisionSource::IndividualAllow);
}

#[test]
fn default_deny_without_rules() {
    let decision = AccessResolver::resolve(&jane(), &reports(), &RuleSnapshot::empty());
    assert!(!decision.has_access);
    assert_eq!(decision.source, DecisionSource::DefaultDeny);
    assert_eq!(decision.rule_id, None);
}

#[test]
fn non_matching_role_rule_falls_through_to_default_deny() {
    let snapshot = RuleSnapshot::new(vec![role_rule(&["Admin"])], vec![]);

    let decision = AccessResolver::resolve(&jane(), &reports(), &snapshot);
    assert!(!decision.has_access);
    assert_eq!(decision.source, DecisionSource::DefaultDeny);
    assert_eq!(decision.rule_id, None);
}

#[test]
fn role_rule_grants_listed_role() {
    let rule = role_rule(&["Auditor", "Admin"]);
    let id = rule.id;
    let snapshot = RuleSnapshot::new(vec![rule], vec![]);

    let decision = AccessResolver::resolve(&jane(), &reports(), &snapshot);
    assert!(decision.has_access);
    assert_eq!(decision.source, DecisionSource::Role);
    assert_eq!(decision.rule_id, Some(id));
}

#[test]
fn inactive_rules_are_ignored() {
    let mut deny = user_rule("jane@example.com", AccessType::Deny);
    deny.is_active = false;
    let snapshot = RuleSnapshot::new(vec![role_rule(&["Auditor"])], vec![deny]);

    let decision = AccessResolver::resolve(&jane(), &reports(), &snapshot);
    assert_eq!(decision.source, DecisionSource::Role);
}

#[test]
fn kind_must_match() {
    let snapshot = RuleSnapshot::new(vec![role_rule(&["Auditor"])], vec![]);
    let feature = ResourceDescriptor::new("audit-reports", ResourceKind::Feature);

    let decision = AccessResolver::resolve(&jane(), &feature, &snapshot);
    assert_eq!(decision.source, DecisionSource::DefaultDeny);
}

// ── Normalization ──

#[test]
fn padded_mixed_case_email_resolves_identically() {
    let snapshot = RuleSnapshot::new(
        vec![role_rule(&["Auditor"])],
        vec![user_rule("jane@example.com", AccessType::Deny)],
    );
    let padded = Principal::new("u-jane", " Jane@Example.com ", "Auditor", 2);

    assert_eq!(
        AccessResolver::resolve(&padded, &reports(), &snapshot),
        AccessResolver::resolve(&jane(), &reports(), &snapshot),
    );
}

#[test]
fn unnormalized_rows_from_storage_still_match() {
    let mut deny = user_rule("jane@example.com", AccessType::Deny);
    deny.user_email = "  JANE@example.COM".to_string();
    deny.resource_name = "Audit-Reports ".to_string();
    let snapshot = RuleSnapshot::new(vec![], vec![deny]);

    let decision = AccessResolver::resolve(&jane(), &reports(), &snapshot);
    assert_eq!(decision.source, DecisionSource::IndividualDeny);
}

// ── Determinism ──

#[test]
fn resolution_is_deterministic() {
    let snapshot = RuleSnapshot::new(
        vec![role_rule(&["Auditor"])],
        vec![user_rule("jane@example.com", AccessType::Allow)],
    );
    let first = AccessResolver::resolve(&jane(), &reports(), &snapshot);
    let second = AccessResolver::resolve(&jane(), &reports(), &snapshot);
    assert_eq!(first, second);
}

#[test]
fn earliest_duplicate_wins() {
    let mut older = user_rule("jane@example.com", AccessType::Deny);
    older.created_at = Utc::now() - Duration::hours(1);
    let newer = user_rule("jane@example.com", AccessType::Allow);
    let older_id = older.id;

    // Input order must not matter.
    let snapshot = RuleSnapshot::new(vec![], vec![newer, older]);
    let decision = AccessResolver::resolve(&jane(), &reports(), &snapshot);
    assert_eq!(decision.rule_id, Some(older_id));
    assert_eq!(decision.source, DecisionSource::IndividualDeny);
}

#[tokio::test]
async fn concurrent_resolutions_share_one_snapshot() {
    let snapshot = std::sync::Arc::new(RuleSnapshot::new(vec![role_rule(&["Auditor"])], vec![]));
    let mut handles = Vec::new();
    for _ in 0..16 {
        let snapshot = snapshot.clone();
        handles.push(tokio::spawn(async move {
            AccessResolver::resolve(&jane(), &reports(), &snapshot)
        }));
    }
    for handle in handles {
        let decision = handle.await.unwrap();
        assert_eq!(decision.source, DecisionSource::Role);
    }
}

#[test]
fn of_kind_filters_rules() {
    let feature_rule = RoleRule::from_new(
        NewRoleRule::min_level(ResourceKind::Feature, "ai-audit", 3),
        Utc::now(),
    )
    .unwrap();
    let snapshot = RuleSnapshot::new(vec![role_rule(&["Auditor"]), feature_rule], vec![]);

    let pages = snapshot.of_kind(ResourceKind::Page);
    assert_eq!(pages.role_rules().len(), 1);
    assert_eq!(pages.role_rules()[0].kind, ResourceKind::Page);
    assert_eq!(pages.fetched_at(), snapshot.fetched_at());
}
