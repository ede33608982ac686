//! Rules persisted as rows through a data client.

use qagate_core::{AccessError, BoxFuture, ResourceDescriptor, RoleRule, UserRule};
use qagate_security::{DataClient, QueryBuilder};
use uuid::Uuid;

use crate::backend::{by_creation, RuleBackend};

/// Table holding role rules.
pub const ROLE_RULES_TABLE: &str = "access_control_rules";
/// Table holding per-user override rules.
pub const USER_RULES_TABLE: &str = "user_access_rules";

/// A [`RuleBackend`] storing one JSON row per rule in
/// [`ROLE_RULES_TABLE`] and [`USER_RULES_TABLE`].
///
/// Wrap the client in an
/// [`EnforcingDataClient`](qagate_security::EnforcingDataClient) so rule
/// reads and writes fail closed without a verified identity:
///
/// ```ignore
/// let client = EnforcingDataClient::connect(raw_client).await;
/// let store = RuleStore::with_cache(TableRuleBackend::new(client), 60);
/// ```
pub struct TableRuleBackend<C> {
    client: C,
}

impl<C: DataClient> TableRuleBackend<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: DataClient> RuleBackend for TableRuleBackend<C> {
    fn role_rules(&self) -> BoxFuture<'_, Result<Vec<RoleRule>, AccessError>> {
        Box::pin(async move {
            let res = self
                .client
                .table(ROLE_RULES_TABLE)?
                .select("*")
                .execute()
                .await?;
            Ok(by_creation(res.into_rows()?, |r: &RoleRule| (r.created_at, r.id)))
        })
    }

    fn user_rules(&self) -> BoxFuture<'_, Result<Vec<UserRule>, AccessError>> {
        Box::pin(async move {
            let res = self
                .client
                .table(USER_RULES_TABLE)?
                .select("*")
                .execute()
                .await?;
            Ok(by_creation(res.into_rows()?, |r: &UserRule| (r.created_at, r.id)))
        })
    }

    fn role_rule(&self, id: Uuid) -> BoxFuture<'_, Result<Option<RoleRule>, AccessError>> {
        Box::pin(async move {
            let res = self
                .client
                .table(ROLE_RULES_TABLE)?
                .select("*")
                .eq("id", id.to_string())
                .execute()
                .await?;
            Ok(res.into_first()?)
        })
    }

    fn user_rule(&self, id: Uuid) -> BoxFuture<'_, Result<Option<UserRule>, AccessError>> {
        Box::pin(async move {
            let res = self
                .client
                .table(USER_RULES_TABLE)?
                .select("*")
                .eq("id", id.to_string())
                .execute()
                .await?;
            Ok(res.into_first()?)
        })
    }

    fn find_active_user_rule(
        &self,
        email: &str,
        resource: &ResourceDescriptor,
    ) -> BoxFuture<'_, Result<Option<UserRule>, AccessError>> {
        let query = self.client.table(USER_RULES_TABLE).map(|q| {
            q.select("*")
                .eq("user_email", email)
                .eq("resource_name", resource.name())
                .eq("kind", resource.kind().as_str())
                .eq("is_active", true)
        });
        Box::pin(async move {
            let res = query?.execute().await?;
            // timestamps are compared parsed; stored strings vary in precision
            let rules: Vec<UserRule> = res.into_rows()?;
            Ok(rules.into_iter().min_by_key(|r| (r.created_at, r.id)))
        })
    }

    fn insert_role_rule(&self, rule: RoleRule) -> BoxFuture<'_, Result<RoleRule, AccessError>> {
        Box::pin(async move {
            let row = serde_json::to_value(&rule)?;
            self.client
                .table(ROLE_RULES_TABLE)?
                .insert(vec![row])
                .execute()
                .await?;
            Ok(rule)
        })
    }

    fn insert_user_rule(&self, rule: UserRule) -> BoxFuture<'_, Result<UserRule, AccessError>> {
        Box::pin(async move {
            let row = serde_json::to_value(&rule)?;
            self.client
                .table(USER_RULES_TABLE)?
                .insert(vec![row])
                .execute()
                .await?;
            Ok(rule)
        })
    }

    fn save_role_rule(&self, rule: RoleRule) -> BoxFuture<'_, Result<RoleRule, AccessError>> {
        Box::pin(async move {
            let row = serde_json::to_value(&rule)?;
            let res = self
                .client
                .table(ROLE_RULES_TABLE)?
                .update(row)
                .eq("id", rule.id.to_string())
                .execute()
                .await?;
            if res.is_empty() {
                return Err(AccessError::RuleNotFound(rule.id));
            }
            Ok(rule)
        })
    }

    fn save_user_rule(&self, rule: UserRule) -> BoxFuture<'_, Result<UserRule, AccessError>> {
        Box::pin(async move {
            let row = serde_json::to_value(&rule)?;
            let res = self
                .client
                .table(USER_RULES_TABLE)?
                .update(row)
                .eq("id", rule.id.to_string())
                .execute()
                .await?;
            if res.is_empty() {
                return Err(AccessError::RuleNotFound(rule.id));
            }
            Ok(rule)
        })
    }

    fn delete_role_rule(&self, id: Uuid) -> BoxFuture<'_, Result<(), AccessError>> {
        Box::pin(async move {
            let res = self
                .client
                .table(ROLE_RULES_TABLE)?
                .delete()
                .eq("id", id.to_string())
                .execute()
                .await?;
            if res.is_empty() {
                return Err(AccessError::RuleNotFound(id));
            }
            Ok(())
        })
    }

    fn delete_user_rule(&self, id: Uuid) -> BoxFuture<'_, Result<(), AccessError>> {
        Box::pin(async move {
            let res = self
                .client
                .table(USER_RULES_TABLE)?
                .delete()
                .eq("id", id.to_string())
                .execute()
                .await?;
            if res.is_empty() {
                return Err(AccessError::RuleNotFound(id));
            }
            Ok(())
        })
    }
}
