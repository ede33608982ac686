use axum::body::Body;
use axum::Router;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use qagate::{admin_router, connect};
use qagate_admin::USERS_TABLE;
use qagate_core::QagateConfig;
use qagate_security::{MemoryDataClient, MockSessionProvider};
use serde_json::{json, Value};
use tower::util::ServiceExt;

async fn call(app: &Router, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn rows_with_users(provider: MockSessionProvider) -> MemoryDataClient {
    let rows = MemoryDataClient::with_session(provider);
    rows.seed(
        USERS_TABLE,
        [
            json!({"id": "u-1", "email": "jane@example.com", "role": "Auditor", "role_level": 2}),
            json!({"id": 7, "email": "omar@example.com", "role": "Agent", "role_level": 1, "department": "Billing"}),
        ],
    );
    rows
}

#[tokio::test]
async fn test_end_to_end_over_data_client() {
    let config = QagateConfig::default();
    let rows = rows_with_users(MockSessionProvider::signed_in("svc-1", "svc@example.com"));
    let client = connect(&config, rows.clone()).await;
    let app = admin_router(&config, client).unwrap();

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/access-control/role-rules",
        Some(json!({"kind": "page", "resource_name": "analytics", "min_role_level": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rows.rows(qagate_rules::ROLE_RULES_TABLE).len(), 1);

    let (status, report) = call(
        &app,
        Method::GET,
        "/api/access-control/users/Jane@Example.com/effective-access",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["role_level"], 2);

    let (_, toggled) = call(
        &app,
        Method::POST,
        "/api/access-control/toggle",
        Some(json!({"email": "omar@example.com", "resource_name": "analytics", "has_access": true})),
    )
    .await;
    assert_eq!(toggled["change"]["outcome"], "created");
    assert_eq!(rows.rows(qagate_rules::USER_RULES_TABLE)[0]["user_email"], "omar@example.com");

    let (status, audit) = call(&app, Method::GET, "/api/access-control/audit?limit=500", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = audit.as_array().unwrap();
    assert!(!entries.is_empty());
    assert!(entries.iter().all(|e| e["principal_id"] == "svc-1"));
    assert!(entries
        .iter()
        .any(|e| e["target"] == "user_access_rules" && e["operation"] == "insert"));
}

#[tokio::test]
async fn test_signed_out_service_fails_closed() {
    let config = QagateConfig::default();
    let rows = rows_with_users(MockSessionProvider::new());
    let client = connect(&config, rows.clone()).await;
    let app = admin_router(&config, client).unwrap();

    let (status, body) = call(&app, Method::GET, "/api/access-control/role-rules", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = call(
        &app,
        Method::GET,
        "/api/access-control/users/jane@example.com/effective-access",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(rows.calls(), 0);

    // the catalog needs no storage
    let (status, _) = call(&app, Method::GET, "/api/access-control/resources", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_sign_out_event_revokes_access() {
    let config = QagateConfig::default();
    let provider = MockSessionProvider::signed_in("svc-1", "svc@example.com");
    let rows = rows_with_users(provider.clone());
    let client = connect(&config, rows).await;
    let app = admin_router(&config, client).unwrap();

    let (status, _) = call(&app, Method::GET, "/api/access-control/role-rules", None).await;
    assert_eq!(status, StatusCode::OK);

    provider.sign_out();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let (status, _) = call(&app, Method::GET, "/api/access-control/role-rules", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
