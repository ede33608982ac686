use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use qagate_core::IdentityConfig;
use qagate_security::{AuthEvent, IdentityVerifier, MockSessionProvider, Session};

fn verifier_with(provider: &MockSessionProvider, cache_ttl_secs: u64, outage_ttl_secs: u64) -> IdentityVerifier {
    IdentityVerifier::with_config(
        Arc::new(provider.clone()),
        &IdentityConfig {
            cache_ttl_secs,
            outage_ttl_secs,
        },
    )
}

#[tokio::test]
async fn test_signed_in_session_is_authenticated() {
    let provider = MockSessionProvider::signed_in("u-1", "jane@example.com");
    let verifier = IdentityVerifier::new(provider.clone());

    let status = verifier.verify().await;
    assert!(status.is_authenticated);
    assert_eq!(status.principal_id.as_deref(), Some("u-1"));
    assert_eq!(status.email.as_deref(), Some("jane@example.com"));
    assert!(status.error.is_none());
}

#[tokio::test]
async fn test_fresh_status_is_served_from_cache() {
    let provider = MockSessionProvider::signed_in("u-1", "jane@example.com");
    let verifier = IdentityVerifier::new(provider.clone());

    verifier.verify().await;
    verifier.verify().await;
    verifier.verify().await;
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_verifications_share_one_round_trip() {
    let provider =
        MockSessionProvider::signed_in("u-1", "jane@example.com").with_delay(Duration::from_millis(50));
    let verifier = IdentityVerifier::new(provider.clone());

    let statuses = join_all((0..16).map(|_| {
        let verifier = verifier.clone();
        async move { verifier.verify().await }
    }))
    .await;

    assert_eq!(provider.calls(), 1);
    assert!(statuses.iter().all(|s| s.is_authenticated));
}

#[tokio::test]
async fn test_concurrent_verifications_share_an_uncached_outage() {
    let provider = MockSessionProvider::new().with_delay(Duration::from_millis(50));
    provider.fail_with("connection refused");
    let verifier = verifier_with(&provider, 30, 0);

    let statuses = join_all((0..8).map(|_| {
        let verifier = verifier.clone();
        async move { verifier.verify().await }
    }))
    .await;

    assert_eq!(provider.calls(), 1);
    assert!(statuses.iter().all(|s| s.is_outage()));
}

#[tokio::test]
async fn test_signed_out_is_not_an_outage() {
    let provider = MockSessionProvider::new();
    let verifier = IdentityVerifier::new(provider);

    let status = verifier.verify().await;
    assert!(!status.is_authenticated);
    assert!(!status.is_outage());
    assert_eq!(status.denial_reason(), "no active session");
}

#[tokio::test]
async fn test_provider_outage_resolves_to_unauthenticated_with_detail() {
    let provider = MockSessionProvider::new();
    provider.fail_with("503 from auth service");
    let verifier = IdentityVerifier::new(provider);

    let status = verifier.verify().await;
    assert!(!status.is_authenticated);
    assert!(status.is_outage());
    assert!(status.error.as_deref().unwrap().contains("503 from auth service"));
    assert!(status.denial_reason().contains("could not be verified"));
}

#[tokio::test]
async fn test_outage_is_retried_once_its_ttl_lapses() {
    let provider = MockSessionProvider::new();
    provider.fail_with("timeout");
    let verifier = verifier_with(&provider, 30, 0);

    assert!(verifier.verify().await.is_outage());
    provider.sign_in(Session::new("u-1"));
    let status = verifier.verify().await;

    assert!(status.is_authenticated);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_expired_session_is_not_authenticated() {
    let provider = MockSessionProvider::new();
    provider.sign_in(Session::new("u-1").expiring_at(Utc::now() - chrono::Duration::seconds(5)));
    let verifier = IdentityVerifier::new(provider);

    let status = verifier.verify().await;
    assert!(!status.is_authenticated);
    assert!(!status.is_outage());
}

#[tokio::test]
async fn test_invalidate_forces_a_new_round_trip() {
    let provider = MockSessionProvider::signed_in("u-1", "jane@example.com");
    let verifier = IdentityVerifier::new(provider.clone());

    verifier.verify().await;
    verifier.invalidate();
    assert!(verifier.current().is_none());

    verifier.verify().await;
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_invalidation_during_flight_is_not_overwritten() {
    let provider =
        MockSessionProvider::signed_in("u-1", "jane@example.com").with_delay(Duration::from_millis(100));
    let verifier = IdentityVerifier::new(provider.clone());

    let in_flight = {
        let verifier = verifier.clone();
        tokio::spawn(async move { verifier.verify().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    verifier.invalidate();

    let status = in_flight.await.unwrap();
    assert!(status.is_authenticated);
    assert!(verifier.current().is_none());
}

#[tokio::test]
async fn test_user_updated_keeps_the_cache() {
    let provider = MockSessionProvider::signed_in("u-1", "jane@example.com");
    let verifier = IdentityVerifier::new(provider.clone());
    verifier.verify().await;

    verifier.handle_event(AuthEvent::UserUpdated);
    assert!(verifier.current().is_some());

    verifier.handle_event(AuthEvent::TokenRefreshed);
    assert!(verifier.current().is_none());
}

#[tokio::test]
async fn test_sign_out_event_invalidates_through_listener() {
    let provider = MockSessionProvider::signed_in("u-1", "jane@example.com");
    let verifier = IdentityVerifier::new(provider.clone());
    let listener = verifier.listen().expect("mock provider publishes events");

    assert!(verifier.verify().await.is_authenticated);
    provider.sign_out();

    for _ in 0..50 {
        if verifier.current().is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(verifier.current().is_none());
    assert!(!verifier.verify().await.is_authenticated);

    listener.abort();
}

#[tokio::test]
async fn test_refreshing_listener_repopulates_status() {
    let provider = MockSessionProvider::signed_in("u-1", "jane@example.com");
    let verifier = IdentityVerifier::new(provider.clone());
    let listener = verifier.listen_and_refresh().expect("mock provider publishes events");

    assert!(verifier.verify().await.is_authenticated);
    let calls = provider.calls();
    provider.emit(AuthEvent::TokenRefreshed);

    for _ in 0..50 {
        if provider.calls() > calls && verifier.current().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(verifier.current().is_some_and(|s| s.is_authenticated));

    provider.sign_out();
    for _ in 0..50 {
        if verifier.current().is_some_and(|s| !s.is_authenticated) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let status = verifier.current().expect("refreshed after sign-out");
    assert!(!status.is_authenticated);

    listener.abort();
}
