//! Dashboard lifecycle tests: fetch on mount, reload on change, release on
//! teardown.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use studydash::auth::{AuthProvider, Credentials, RestAuth, StaticAuth, User};
use studydash::backend::{Backend, ChangeEvent, ChangeKind, InMemoryBackend, RestBackend};
use studydash::dashboard::{Dashboard, JoinOutcome, MountOutcome, MountedDashboard};
use studydash::notify::{Notification, RecordingNotifier};
use studydash::sessions::NewStudySession;

mod common;

fn student() -> User {
    User {
        id: Uuid::new_v4(),
        email: Some("student@example.com".to_string()),
    }
}

async fn mount(backend: Arc<dyn Backend>, notifier: Arc<RecordingNotifier>) -> MountedDashboard {
    let auth = Arc::new(StaticAuth::signed_in(student()));
    match Dashboard::mount(backend, auth, notifier).await.expect("mount") {
        MountOutcome::Mounted(dashboard) => dashboard,
        MountOutcome::Unauthenticated => panic!("expected a mounted dashboard"),
    }
}

#[tokio::test]
async fn test_change_from_another_client_is_picked_up_on_refresh() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.seed_session("Statistics", "1 hour", 1);
    let notifier = Arc::new(RecordingNotifier::default());
    let mut dashboard = mount(backend.clone(), notifier.clone()).await;
    assert_eq!(dashboard.stats().total_sessions, 1);

    // another client inserts a session; the store broadcasts the change
    backend
        .insert_session(&NewStudySession {
            title: "Physics".to_string(),
            duration: "2 hours".to_string(),
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), dashboard.next_change())
        .await
        .expect("change should arrive")
        .expect("feed open");
    assert_eq!(event.kind, ChangeKind::Insert);

    assert!(dashboard.refresh().await);
    let titles: Vec<_> = dashboard.sessions().into_iter().map(|s| s.title).collect();
    assert_eq!(titles, ["Statistics", "Physics"]);
    assert_eq!(backend.fetch_calls(), 2);
    assert!(notifier.is_empty());

    dashboard.teardown().await;
    assert_eq!(backend.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_participant_changes_do_not_reach_session_listener() {
    let backend = Arc::new(InMemoryBackend::new());
    let session_id = backend.seed_session("Statistics", "1 hour", 0);
    let notifier = Arc::new(RecordingNotifier::default());
    let mut dashboard = mount(backend.clone(), notifier.clone()).await;

    assert_eq!(dashboard.join(session_id).await, JoinOutcome::Joined);
    backend.emit(ChangeEvent::new("session_participants", ChangeKind::Insert));

    let waited = tokio::time::timeout(Duration::from_millis(100), dashboard.next_change()).await;
    assert!(waited.is_err(), "no session change expected");
    assert_eq!(notifier.take(), vec![Notification::joined()]);
}

#[tokio::test]
async fn test_rest_dashboard_reloads_once_per_change() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/study_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            common::session_row("0b0f4f4e-7b1f-4c0e-8f7a-9f2b5a0c3d11", "Zoology", 3),
        ])))
        .expect(2)
        .mount(&server)
        .await;

    let sse = "data: {\"table\":\"study_sessions\",\"type\":\"UPDATE\"}\n\n";
    Mock::given(method("GET"))
        .and(path("/realtime/v1/sse"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse.as_bytes().to_vec(), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let backend = Arc::new(
        RestBackend::new(
            &common::backend_config(&server.uri()),
            Credentials::default(),
        )
        .unwrap(),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let mut dashboard = mount(backend, notifier.clone()).await;
    assert_eq!(dashboard.sessions()[0].participant_count, 3);

    let change = tokio::time::timeout(Duration::from_secs(2), dashboard.next_change())
        .await
        .unwrap();
    assert_eq!(change.map(|c| c.kind), Some(ChangeKind::Update));
    assert!(dashboard.refresh().await);

    // the stream body is finished, so the feed ends
    let end = tokio::time::timeout(Duration::from_secs(2), dashboard.next_change())
        .await
        .unwrap();
    assert!(end.is_none());

    dashboard.teardown().await;
    assert!(notifier.is_empty());
}

fn token_body(access_token: &str, expires_in: i64, refresh_token: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": expires_in,
        "refresh_token": refresh_token,
        "user": { "id": "5f0c6a2e-8a55-4c61-9d4f-0d7a1b9e2c31", "email": "student@example.com" }
    })
}

async fn mount_refresh_grant(server: &MockServer, from: &str, to: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(serde_json::json!({ "refresh_token": from })))
        .respond_with(ResponseTemplate::new(200).set_body_json(to))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_refresh_renews_expired_token_before_loading() {
    let server = MockServer::start().await;

    // every token but the last one is already inside the expiry margin
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("jwt-1", 10, "refresh-1")))
        .mount(&server)
        .await;
    mount_refresh_grant(&server, "refresh-1", token_body("jwt-2", 10, "refresh-2")).await;
    mount_refresh_grant(&server, "refresh-2", token_body("jwt-3", 3600, "refresh-3")).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/study_sessions"))
        .and(header("authorization", "Bearer jwt-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            common::session_row("0b0f4f4e-7b1f-4c0e-8f7a-9f2b5a0c3d11", "Zoology", 1),
        ])))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/study_sessions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "message": "JWT expired"
        })))
        .expect(0)
        .mount(&server)
        .await;

    let config = common::backend_config(&server.uri());
    let credentials = Credentials::default();
    let auth = Arc::new(RestAuth::new(&config, credentials.clone(), None).unwrap());
    auth.sign_in("student@example.com", "hunter22").await.unwrap();
    let backend = Arc::new(RestBackend::new(&config, credentials.clone()).unwrap());
    let notifier = Arc::new(RecordingNotifier::default());

    let MountOutcome::Mounted(dashboard) = Dashboard::open(backend, auth, notifier.clone()).await
    else {
        panic!("expected an opened dashboard");
    };
    assert_eq!(dashboard.sessions().len(), 1);

    assert!(dashboard.refresh().await);
    assert_eq!(credentials.access_token().as_deref(), Some("jwt-3"));
    assert!(notifier.is_empty());
}
