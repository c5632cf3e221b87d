//! REST store integration tests
//!
//! Exercises `RestBackend` through `SessionSynchronizer` against a `wiremock`
//! server: the single aggregate fetch, auth headers, uniqueness mapping, and
//! the SSE change feed.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use studydash::auth::Credentials;
use studydash::backend::{Backend, ChangeEventFilter, ChangeKind, RestBackend};
use studydash::sessions::{NewStudySession, SessionSynchronizer};
use studydash::StudyError;

mod common;

const SESSION_A: &str = "0b0f4f4e-7b1f-4c0e-8f7a-9f2b5a0c3d11";
const SESSION_B: &str = "1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f";
const SESSION_C: &str = "2d3e4f5a-6b7c-4d8e-9f0a-1b2c3d4e5f60";

fn make_sync(server: &MockServer, credentials: Credentials) -> SessionSynchronizer {
    let backend = RestBackend::new(&common::backend_config(&server.uri()), credentials)
        .expect("backend should build");
    SessionSynchronizer::new(Arc::new(backend))
}

/// Counts come from the aggregate embedded in one request, never one request
/// per session.
#[tokio::test]
async fn test_load_uses_single_aggregate_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/study_sessions"))
        .and(query_param(
            "select",
            "*,session_participants:session_participants(count)",
        ))
        .and(header("apikey", common::ANON_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            common::session_row(SESSION_A, "Zoology", 0),
            common::session_row(SESSION_B, "Algebra", 2),
            common::session_row(SESSION_C, "Music", 5),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let sync = make_sync(&server, Credentials::default());
    let sessions = sync.load().await.expect("load should succeed");

    let titles: Vec<_> = sessions.iter().map(|s| s.title.as_str()).collect();
    let counts: Vec<_> = sessions.iter().map(|s| s.participant_count).collect();
    assert_eq!(titles, ["Zoology", "Algebra", "Music"]);
    assert_eq!(counts, [0, 2, 5]);
}

#[tokio::test]
async fn test_load_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/study_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let sync = make_sync(&server, Credentials::default());
    assert!(sync.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_requests_carry_user_token_when_signed_in() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/study_sessions"))
        .and(header("authorization", "Bearer user-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = Credentials::default();
    credentials.set(Some("user-jwt".to_string()));
    let sync = make_sync(&server, credentials);
    sync.load().await.expect("load should succeed");
}

#[tokio::test]
async fn test_requests_fall_back_to_anon_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header(
            "authorization",
            format!("Bearer {}", common::ANON_KEY).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let sync = make_sync(&server, Credentials::default());
    sync.load().await.expect("load should succeed");
}

#[tokio::test]
async fn test_load_server_error_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "message": "internal error"
        })))
        .mount(&server)
        .await;

    let sync = make_sync(&server, Credentials::default());
    let err = sync.load().await.unwrap_err();
    assert!(matches!(err, StudyError::Fetch(ref m) if m.contains("internal error")));
}

#[tokio::test]
async fn test_join_posts_participation() {
    let server = MockServer::start().await;
    let session_id = Uuid::parse_str(SESSION_A).unwrap();
    let user_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/session_participants"))
        .and(header("prefer", "return=minimal"))
        .and(body_json(serde_json::json!([
            { "session_id": session_id, "user_id": user_id }
        ])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let sync = make_sync(&server, Credentials::default());
    sync.join(session_id, user_id).await.expect("join should succeed");
}

#[tokio::test]
async fn test_join_unique_violation_is_duplicate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/session_participants"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint",
            "details": "Key (session_id, user_id) already exists."
        })))
        .mount(&server)
        .await;

    let session_id = Uuid::parse_str(SESSION_A).unwrap();
    let sync = make_sync(&server, Credentials::default());
    let err = sync.join(session_id, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StudyError::DuplicateJoin { session_id: id } if id == session_id));
}

/// A 409 without the uniqueness code (e.g. a foreign key failure) stays
/// generic.
#[tokio::test]
async fn test_join_other_conflict_is_generic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "code": "23503",
            "message": "insert or update violates foreign key constraint"
        })))
        .mount(&server)
        .await;

    let sync = make_sync(&server, Credentials::default());
    let err = sync
        .join(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, StudyError::Join(_)));
}

#[tokio::test]
async fn test_join_server_error_is_generic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let sync = make_sync(&server, Credentials::default());
    let err = sync
        .join(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, StudyError::Join(_)));
}

#[tokio::test]
async fn test_create_returns_inserted_row() {
    let server = MockServer::start().await;
    let created_by = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/study_sessions"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([{
            "id": SESSION_B,
            "title": "Linear Algebra",
            "duration": "2 hours",
            "created_by": created_by,
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let sync = make_sync(&server, Credentials::default());
    let session = sync
        .create(&NewStudySession {
            title: "Linear Algebra".to_string(),
            duration: "2 hours".to_string(),
            created_by,
        })
        .await
        .expect("create should succeed");
    assert_eq!(session.id.to_string(), SESSION_B);
    assert_eq!(session.participant_count, 0);
}

#[tokio::test]
async fn test_subscribe_decodes_sse_changes() {
    let server = MockServer::start().await;
    let sse = concat!(
        "event: ping\n",
        "data: {}\n",
        "\n",
        "event: change\n",
        "data: {\"table\":\"study_sessions\",\"type\":\"INSERT\",\"record\":{\"title\":\"New\"}}\n",
        "\n",
        "data: {\"table\":\"session_participants\",\"type\":\"INSERT\"}\n",
        "\n",
        "data: {\"table\":\"study_sessions\",\"type\":\"DELETE\"}\n",
        "\n",
    );

    Mock::given(method("GET"))
        .and(path("/realtime/v1/sse"))
        .and(query_param("table", "study_sessions"))
        .and(query_param("event", "*"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse.as_bytes().to_vec(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let backend = RestBackend::new(
        &common::backend_config(&server.uri()),
        Credentials::default(),
    )
    .unwrap();
    let mut feed = backend
        .subscribe("study_sessions", ChangeEventFilter::All)
        .await
        .expect("subscribe should succeed");

    let first = tokio::time::timeout(Duration::from_secs(2), feed.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.kind, ChangeKind::Insert);
    assert_eq!(first.record.unwrap()["title"], "New");

    let second = tokio::time::timeout(Duration::from_secs(2), feed.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.kind, ChangeKind::Delete);

    // body finished: the feed ends
    let end = tokio::time::timeout(Duration::from_secs(2), feed.next())
        .await
        .unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_subscribe_rejected_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/realtime/v1/sse"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "message": "JWT expired"
        })))
        .mount(&server)
        .await;

    let sync = make_sync(&server, Credentials::default());
    let err = sync.subscribe(|_| {}).await.unwrap_err();
    assert!(matches!(err, StudyError::Subscription(ref m) if m.contains("JWT expired")));
}
