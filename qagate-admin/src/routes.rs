//! Administrative HTTP surface under `/api/access-control`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use qagate_core::{
    AccessDecision, AccessResolver, CatalogEntry, NewRoleRule, NewUserRule, ResourceKind,
    RoleRule, RoleRulePatch, UserRule, UserRulePatch,
};
use qagate_security::{AuditEntry, AuditTrail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::simulator::{
    AccessReport, AccessSimulator, AccessTestResult, OverrideState, ToggleOutcome,
};

/// Mount point of [`router`].
pub const BASE_PATH: &str = "/api/access-control";

const DEFAULT_AUDIT_LIMIT: usize = 50;
const MAX_AUDIT_LIMIT: usize = 500;

/// Shared state of the admin router.
#[derive(Clone)]
pub struct AdminState {
    simulator: AccessSimulator,
    audit: AuditTrail,
}

impl AdminState {
    pub fn new(simulator: AccessSimulator) -> Self {
        Self {
            simulator,
            audit: AuditTrail::disabled(),
        }
    }

    /// Expose the entries of a data-client audit trail on `GET /audit`.
    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    pub fn simulator(&self) -> &AccessSimulator {
        &self.simulator
    }
}

/// Build the admin router, nested under [`BASE_PATH`].
pub fn router(state: AdminState) -> Router {
    let api = Router::new()
        .route("/role-rules", get(list_role_rules).post(create_role_rule))
        .route("/role-rules/{id}", put(update_role_rule).delete(delete_role_rule))
        .route("/user-rules", get(list_user_rules).post(create_user_rule))
        .route("/user-rules/{id}", put(update_user_rule).delete(delete_user_rule))
        .route("/cache/clear", post(clear_cache))
        .route("/resources", get(resources))
        .route("/users/{email}/effective-access", get(effective_access))
        .route("/test", post(test_access))
        .route("/toggle", post(toggle_access))
        .route("/audit", get(audit_entries));

    Router::new().nest(BASE_PATH, api).with_state(state)
}

type ApiResult<T> = Result<T, ApiError>;

// ── Role rules ─────────────────────────────────────────────────────────

async fn list_role_rules(State(state): State<AdminState>) -> ApiResult<Json<Vec<RoleRule>>> {
    Ok(Json(state.simulator.store().list_role_rules().await?))
}

async fn create_role_rule(
    State(state): State<AdminState>,
    Json(new): Json<NewRoleRule>,
) -> ApiResult<(StatusCode, Json<RoleRule>)> {
    let rule = state.simulator.store().create_role_rule(new).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn update_role_rule(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<RoleRulePatch>,
) -> ApiResult<Json<RoleRule>> {
    Ok(Json(state.simulator.store().update_role_rule(id, patch).await?))
}

async fn delete_role_rule(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.simulator.store().delete_role_rule(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── User rules ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UserRuleFilter {
    pub email: Option<String>,
}

async fn list_user_rules(
    State(state): State<AdminState>,
    Query(filter): Query<UserRuleFilter>,
) -> ApiResult<Json<Vec<UserRule>>> {
    let rules = state
        .simulator
        .store()
        .list_user_rules(filter.email.as_deref())
        .await?;
    Ok(Json(rules))
}

async fn create_user_rule(
    State(state): State<AdminState>,
    Json(new): Json<NewUserRule>,
) -> ApiResult<(StatusCode, Json<UserRule>)> {
    let rule = state.simulator.store().create_user_rule(new).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn update_user_rule(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UserRulePatch>,
) -> ApiResult<Json<UserRule>> {
    Ok(Json(state.simulator.store().update_user_rule(id, patch).await?))
}

async fn delete_user_rule(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.simulator.store().delete_user_rule(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Cache and catalog ──────────────────────────────────────────────────

async fn clear_cache(State(state): State<AdminState>) -> Json<serde_json::Value> {
    state.simulator.store().clear_cache();
    Json(serde_json::json!({ "cleared": true }))
}

#[derive(Debug, Serialize)]
pub struct ResourceGroup {
    pub category: String,
    pub resources: Vec<CatalogEntry>,
}

async fn resources(State(state): State<AdminState>) -> Json<Vec<ResourceGroup>> {
    let groups = state
        .simulator
        .catalog()
        .grouped()
        .into_iter()
        .map(|group| ResourceGroup {
            category: group.category.to_string(),
            resources: group.entries.into_iter().cloned().collect(),
        })
        .collect();
    Json(groups)
}

// ── Simulation ─────────────────────────────────────────────────────────

async fn effective_access(
    State(state): State<AdminState>,
    Path(email): Path<String>,
) -> ApiResult<Json<AccessReport>> {
    Ok(Json(state.simulator.report_for_email(&email).await?))
}

#[derive(Debug, Deserialize)]
pub struct TestAccessRequest {
    pub email: String,
    pub resource_name: String,
    #[serde(default)]
    pub kind: Option<ResourceKind>,
}

async fn test_access(
    State(state): State<AdminState>,
    Json(req): Json<TestAccessRequest>,
) -> ApiResult<Json<AccessTestResult>> {
    let result = state
        .simulator
        .test_access_for_email(&req.email, &req.resource_name, req.kind)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ToggleAccessRequest {
    pub email: String,
    pub resource_name: String,
    #[serde(default)]
    pub kind: Option<ResourceKind>,
    pub has_access: bool,
}

#[derive(Debug, Serialize)]
pub struct ToggleAccessResponse {
    pub change: ToggleOutcome,
    pub state: OverrideState,
    pub decision: AccessDecision,
}

async fn toggle_access(
    State(state): State<AdminState>,
    Json(req): Json<ToggleAccessRequest>,
) -> ApiResult<Json<ToggleAccessResponse>> {
    let sim = &state.simulator;
    let resource = sim.resource(&req.resource_name, req.kind)?;
    let principal = sim.principal(&req.email).await?;

    let change = sim.toggle_access(&principal, &resource, req.has_access).await?;
    let override_state = sim.override_state(&principal, &resource).await?;
    let snapshot = sim.store().fresh_snapshot().await?;
    let decision = AccessResolver::resolve(&principal, &resource, &snapshot);

    Ok(Json(ToggleAccessResponse {
        change,
        state: override_state,
        decision,
    }))
}

// ── Audit ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

async fn audit_entries(
    State(state): State<AdminState>,
    Query(query): Query<AuditQuery>,
) -> Json<Vec<AuditEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).min(MAX_AUDIT_LIMIT);
    Json(state.audit.recent(limit))
}
