//! Wiring of the admin application over a data client.

use std::sync::Arc;

use axum::Router;
use qagate_admin::{router, AccessSimulator, AdminState, TableDirectory};
use qagate_core::{AccessError, QagateConfig};
use qagate_rules::{RuleBackend, RuleStore, TableRuleBackend};
use qagate_security::{AuditTrail, DataClient, EnforcingDataClient, IdentityVerifier};
use tower_http::trace::TraceLayer;

/// Wrap `client` with the configured identity cache and audit trail, verify
/// once and keep the cached status current as auth events arrive.
pub async fn connect<C: DataClient>(config: &QagateConfig, client: C) -> EnforcingDataClient<C> {
    let verifier = IdentityVerifier::with_config(client.session(), &config.identity);
    let client = EnforcingDataClient::with_verifier(client, verifier)
        .with_audit(AuditTrail::from_config(&config.audit));

    let status = client.verifier().verify().await;
    if status.is_authenticated {
        tracing::info!(principal_id = ?status.principal_id, "data client verified");
    } else {
        tracing::warn!(reason = %status.denial_reason(), "data client not authenticated; storage calls will be refused");
    }

    if client.verifier().listen_and_refresh().is_some() {
        tracing::debug!("following auth events");
    }
    client
}

/// The admin router with rules and profiles stored through `client`.
pub fn admin_router<C: DataClient>(
    config: &QagateConfig,
    client: EnforcingDataClient<C>,
) -> Result<Router, AccessError> {
    let catalog = config.catalog()?;
    let backend: Arc<dyn RuleBackend> = Arc::new(TableRuleBackend::new(client.clone()));
    let store = RuleStore::from_config(backend, &config.rules);
    let directory = TableDirectory::new(client.clone());

    tracing::debug!(
        resources = catalog.len(),
        snapshot_cache = config.rules.cache_enabled,
        "admin router built"
    );

    let state = AdminState::new(AccessSimulator::new(store, catalog, directory))
        .with_audit(client.audit().clone());
    Ok(router(state).layer(TraceLayer::new_for_http()))
}
