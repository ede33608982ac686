use chrono::Utc;
use qagate_core::{
    AccessError, AccessResolver, AccessType, DecisionSource, NewRoleRule, NewUserRule, Principal,
    ResourceDescriptor, ResourceKind, UserRule, UserRulePatch,
};
use qagate_rules::{RuleBackend, RuleStore, TableRuleBackend, ROLE_RULES_TABLE, USER_RULES_TABLE};
use qagate_security::{EnforcingDataClient, MemoryDataClient, MockSessionProvider};
use uuid::Uuid;

async fn signed_in_store() -> (RuleStore, MemoryDataClient) {
    let provider = MockSessionProvider::signed_in("admin-1", "admin@example.com");
    let rows = MemoryDataClient::with_session(provider);
    let client = EnforcingDataClient::connect(rows.clone()).await;
    (RuleStore::with_cache(TableRuleBackend::new(client), 60), rows)
}

fn reports() -> ResourceDescriptor {
    ResourceDescriptor::new("audit-reports", ResourceKind::Page)
}

#[tokio::test]
async fn test_rules_round_trip_through_tables() {
    let (store, rows) = signed_in_store().await;

    let role = store
        .create_role_rule(NewRoleRule::for_roles(ResourceKind::Page, "audit-reports", ["Auditor"]))
        .await
        .unwrap();
    let user = store
        .create_user_rule(
            NewUserRule::new("omar@example.com", &reports(), AccessType::Allow)
                .with_reason("covering for team lead"),
        )
        .await
        .unwrap();

    assert_eq!(rows.rows(ROLE_RULES_TABLE).len(), 1);
    assert_eq!(rows.rows(USER_RULES_TABLE)[0]["kind"], "page");
    assert_eq!(rows.rows(USER_RULES_TABLE)[0]["access_type"], "allow");

    let listed = store.list_user_rules(None).await.unwrap();
    assert_eq!(listed, vec![user.clone()]);
    assert_eq!(store.list_role_rules().await.unwrap(), vec![role]);

    let omar = Principal::new("u-7", "omar@example.com", "Agent", 1);
    let decision = AccessResolver::resolve(&omar, &reports(), &store.snapshot().await.unwrap());
    assert_eq!(decision.source, DecisionSource::IndividualAllow);
    assert_eq!(decision.rule_id, Some(user.id));
}

#[tokio::test]
async fn test_table_duplicate_check_uses_active_rows_only() {
    let (store, _) = signed_in_store().await;
    store
        .create_user_rule(NewUserRule::new("omar@example.com", &reports(), AccessType::Allow).inactive())
        .await
        .unwrap();
    let active = store
        .create_user_rule(NewUserRule::new("omar@example.com", &reports(), AccessType::Deny))
        .await
        .unwrap();

    let err = store
        .create_user_rule(NewUserRule::new("omar@example.com", &reports(), AccessType::Allow))
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::DuplicateRule { existing, .. } if existing == active.id));
}

#[tokio::test]
async fn test_table_update_and_delete() {
    let (store, rows) = signed_in_store().await;
    let rule = store
        .create_user_rule(NewUserRule::new("omar@example.com", &reports(), AccessType::Allow))
        .await
        .unwrap();

    let updated = store
        .update_user_rule(rule.id, UserRulePatch::access_type(AccessType::Deny))
        .await
        .unwrap();
    assert_eq!(updated.access_type, AccessType::Deny);
    assert_eq!(rows.rows(USER_RULES_TABLE)[0]["access_type"], "deny");

    store.delete_user_rule(rule.id).await.unwrap();
    assert!(rows.rows(USER_RULES_TABLE).is_empty());
    assert!(matches!(
        store.delete_user_rule(rule.id).await,
        Err(AccessError::RuleNotFound(_))
    ));
    assert!(matches!(
        store.delete_role_rule(Uuid::new_v4()).await,
        Err(AccessError::RuleNotFound(_))
    ));
}

#[tokio::test]
async fn test_unnormalized_rows_still_match() {
    let (store, rows) = signed_in_store().await;
    let rule = UserRule::from_new(
        NewUserRule::new("omar@example.com", &reports(), AccessType::Deny),
        Utc::now(),
    )
    .unwrap();
    let mut row = serde_json::to_value(&rule).unwrap();
    row["user_email"] = " Omar@Example.com ".into();
    row["resource_name"] = "Audit-Reports".into();
    rows.seed(USER_RULES_TABLE, [row]);

    let omar = Principal::new("u-7", "omar@example.com", "Agent", 1);
    let decision = AccessResolver::resolve(&omar, &reports(), &store.snapshot().await.unwrap());
    assert_eq!(decision.source, DecisionSource::IndividualDeny);
}

#[tokio::test]
async fn test_signed_out_rule_writes_fail_closed() {
    let provider = MockSessionProvider::new();
    let rows = MemoryDataClient::with_session(provider);
    let client = EnforcingDataClient::connect(rows.clone()).await;
    let store = RuleStore::new(TableRuleBackend::new(client));

    let err = store
        .create_role_rule(NewRoleRule::min_level(ResourceKind::Page, "dashboard", 1))
        .await
        .unwrap_err();
    assert!(err.is_auth_required());
    assert!(store.snapshot().await.unwrap_err().is_auth_required());
    assert_eq!(rows.calls(), 0);
    assert!(rows.rows(ROLE_RULES_TABLE).is_empty());
}

#[tokio::test]
async fn test_storage_outage_surfaces_as_storage_error() {
    let (store, rows) = signed_in_store().await;
    rows.set_offline(true);

    let err = store.snapshot().await.unwrap_err();
    assert!(matches!(err, AccessError::Storage(_)));
}

#[tokio::test]
async fn test_earliest_rule_wins_across_timestamp_precisions() {
    let (store, rows) = signed_in_store().await;
    let row = |created_at: &str| {
        let rule = UserRule::from_new(
            NewUserRule::new("omar@example.com", &reports(), AccessType::Deny),
            Utc::now(),
        )
        .unwrap();
        let mut row = serde_json::to_value(&rule).unwrap();
        row["created_at"] = created_at.into();
        (rule.id, row)
    };
    // as text the later microsecond stamp sorts first
    let (earlier, earlier_row) = row("2024-03-01T09:00:00.123Z");
    let (later, later_row) = row("2024-03-01T09:00:00.123456Z");
    rows.seed(USER_RULES_TABLE, [later_row, earlier_row]);

    let found = store
        .find_active_user_rule("omar@example.com", &reports())
        .await
        .unwrap();
    assert_eq!(found.map(|r| r.id), Some(earlier));

    let listed: Vec<Uuid> = store
        .backend()
        .user_rules()
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(listed, vec![earlier, later]);
}
