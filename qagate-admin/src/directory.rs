//! Lookup of user profiles by email.

use std::sync::Arc;

use dashmap::DashMap;
use qagate_core::{normalize, AccessError, BoxFuture, Principal};
use qagate_security::{DataClient, QueryBuilder};
use serde::Deserialize;

/// Table holding user profiles.
pub const USERS_TABLE: &str = "users";

/// Source of user profiles for the email-based simulator entry points.
pub trait PrincipalDirectory: Send + Sync + 'static {
    /// The profile registered under `email`, compared case-insensitively.
    fn find_by_email(&self, email: &str) -> BoxFuture<'_, Result<Option<Principal>, AccessError>>;
}

/// In-memory directory keyed by normalized email. Clones share entries.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    users: Arc<DashMap<String, Principal>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(self, principal: Principal) -> Self {
        self.insert(principal);
        self
    }

    /// Register or replace a profile.
    pub fn insert(&self, principal: Principal) {
        self.users.insert(principal.email().to_string(), principal);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl PrincipalDirectory for MemoryDirectory {
    fn find_by_email(&self, email: &str) -> BoxFuture<'_, Result<Option<Principal>, AccessError>> {
        let email = normalize::email(email);
        Box::pin(async move { Ok(self.users.get(&email).map(|p| p.value().clone())) })
    }
}

#[derive(Deserialize)]
struct UserProfileRow {
    id: serde_json::Value,
    email: String,
    role: String,
    #[serde(default)]
    role_level: i32,
    #[serde(default)]
    department: Option<String>,
}

impl UserProfileRow {
    fn into_principal(self) -> Principal {
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        let principal = Principal::new(id, &self.email, &self.role, self.role_level);
        match self.department {
            Some(department) => principal.with_department(department),
            None => principal,
        }
    }
}

/// Directory reading [`USERS_TABLE`] through a data client.
///
/// Rows need `id`, `email` and `role`; `role_level` defaults to 0 and
/// `department` is optional. Emails are matched in their normalized
/// (trimmed, lowercase) form, which is how profiles are stored.
pub struct TableDirectory<C> {
    client: C,
}

impl<C: DataClient> TableDirectory<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: DataClient> PrincipalDirectory for TableDirectory<C> {
    fn find_by_email(&self, email: &str) -> BoxFuture<'_, Result<Option<Principal>, AccessError>> {
        let query = self.client.table(USERS_TABLE).map(|q| {
            q.select("id, email, role, role_level, department")
                .eq("email", normalize::email(email))
                .limit(1)
        });
        Box::pin(async move {
            let res = query?.execute().await?;
            let row: Option<UserProfileRow> = res.into_first()?;
            Ok(row.map(UserProfileRow::into_principal))
        })
    }
}
