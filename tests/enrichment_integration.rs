//! Integration tests for the enrichment pipeline and the HTTP API.
//!
//! Each test spins up a stub generation server (and, for API tests, the
//! real axum router) on a random port and exercises the real contract:
//! prompt in, persisted generated message out.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::time::timeout;

use wellwork::api::{AppState, api_routes};
use wellwork::config::GenerationConfig;
use wellwork::enrichment::EnrichmentService;
use wellwork::generation::GenerationClient;
use wellwork::model::{EnergyLevel, Mood};
use wellwork::notify::LogPublisher;
use wellwork::service::{CheckInService, UserService};
use wellwork::store::{CheckInStore, LibSqlBackend, NewCheckIn, UserStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Start a stub chat-completion server returning a fixed body, return its port.
async fn start_generation_stub(status: StatusCode, body: &'static str) -> u16 {
    let app = Router::new().route(
        "/openai/v1/chat/completions",
        post(move || async move { (status, body) }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

/// Start a stub server that never answers within the client timeout.
async fn start_hanging_stub() -> u16 {
    let app = Router::new().route(
        "/openai/v1/chat/completions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            (StatusCode::OK, r#"{"choices":[]}"#)
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

fn client_for(port: u16, timeout: Duration) -> GenerationClient {
    GenerationClient::new(GenerationConfig {
        api_key: SecretString::from("test-key"),
        base_url: format!("http://127.0.0.1:{port}"),
        model: "llama-3.1-8b-instant".to_string(),
        timeout,
    })
}

async fn seed_check_in(db: &LibSqlBackend) -> i64 {
    let user = db.insert_user("alice", "hash").await.unwrap();
    let check_in = db
        .insert_check_in(NewCheckIn {
            user_id: user.id,
            mood: Mood::Happy,
            energy_level: EnergyLevel::High,
            notes: Some("Great day".into()),
        })
        .await
        .unwrap();
    check_in.id
}

// ── Enrichment pipeline ─────────────────────────────────────────────

#[tokio::test]
async fn enrich_persists_message_and_links_check_in() {
    timeout(TEST_TIMEOUT, async {
        let port = start_generation_stub(
            StatusCode::OK,
            r#"{"choices":[{"message":{"content":"Keep it up!"},"confidence":0.9}]}"#,
        )
        .await;

        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let check_in_id = seed_check_in(&db).await;

        let service = EnrichmentService::new(
            Arc::clone(&db) as Arc<dyn CheckInStore>,
            client_for(port, Duration::from_secs(5)),
        );

        let response = service.enrich(check_in_id).await.unwrap();
        assert_eq!(response.check_in_id, check_in_id);
        assert_eq!(response.message, "Keep it up!");
        assert_eq!(response.confidence, Some(0.9));

        // Persisted and linked back to the check-in.
        let stored = db.get_generated_message(check_in_id).await.unwrap().unwrap();
        assert_eq!(stored.message, "Keep it up!");
        assert_eq!(stored.confidence, Some(0.9));

        let check_in = db.get_check_in(check_in_id).await.unwrap().unwrap();
        assert_eq!(check_in.generated_message_id, Some(stored.id));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn enrich_on_timeout_persists_empty_result_without_error() {
    timeout(TEST_TIMEOUT, async {
        let port = start_hanging_stub().await;

        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let check_in_id = seed_check_in(&db).await;

        let service = EnrichmentService::new(
            Arc::clone(&db) as Arc<dyn CheckInStore>,
            client_for(port, Duration::from_millis(100)),
        );

        let response = service.enrich(check_in_id).await.unwrap();
        assert_eq!(response.check_in_id, check_in_id);
        assert_eq!(response.message, "");
        assert_eq!(response.confidence, None);

        // The empty result is persisted too.
        let stored = db.get_generated_message(check_in_id).await.unwrap().unwrap();
        assert_eq!(stored.message, "");
        assert_eq!(stored.confidence, None);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn enrich_on_service_error_persists_empty_result() {
    timeout(TEST_TIMEOUT, async {
        let port = start_generation_stub(StatusCode::SERVICE_UNAVAILABLE, "down").await;

        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let check_in_id = seed_check_in(&db).await;

        let service = EnrichmentService::new(
            Arc::clone(&db) as Arc<dyn CheckInStore>,
            client_for(port, Duration::from_secs(5)),
        );

        let response = service.enrich(check_in_id).await.unwrap();
        assert_eq!(response.message, "");
        assert_eq!(response.confidence, None);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn enrich_clamps_out_of_range_confidence_before_persisting() {
    timeout(TEST_TIMEOUT, async {
        let port = start_generation_stub(
            StatusCode::OK,
            r#"{"choices":[{"message":{"content":"sure"},"confidence":1.7}]}"#,
        )
        .await;

        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let check_in_id = seed_check_in(&db).await;

        let service = EnrichmentService::new(
            Arc::clone(&db) as Arc<dyn CheckInStore>,
            client_for(port, Duration::from_secs(5)),
        );

        let response = service.enrich(check_in_id).await.unwrap();
        assert_eq!(response.confidence, Some(1.0));

        let stored = db.get_generated_message(check_in_id).await.unwrap().unwrap();
        assert_eq!(stored.confidence, Some(1.0));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn enrich_missing_check_in_is_not_found() {
    timeout(TEST_TIMEOUT, async {
        let port = start_generation_stub(StatusCode::OK, r#"{"choices":[]}"#).await;

        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let service = EnrichmentService::new(
            Arc::clone(&db) as Arc<dyn CheckInStore>,
            client_for(port, Duration::from_secs(5)),
        );

        let err = service.enrich(12345).await.unwrap_err();
        assert!(matches!(
            err,
            wellwork::error::ServiceError::NotFound { .. }
        ));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn re_enrichment_replaces_previous_message() {
    timeout(TEST_TIMEOUT, async {
        let port = start_generation_stub(
            StatusCode::OK,
            r#"{"choices":[{"message":{"content":"again"},"confidence":0.5}]}"#,
        )
        .await;

        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let check_in_id = seed_check_in(&db).await;

        let service = EnrichmentService::new(
            Arc::clone(&db) as Arc<dyn CheckInStore>,
            client_for(port, Duration::from_secs(5)),
        );

        let first = service.enrich(check_in_id).await.unwrap();
        let second = service.enrich(check_in_id).await.unwrap();
        assert_eq!(second.check_in_id, check_in_id);

        // Exactly one message remains and the back-reference points at it.
        let stored = db.get_generated_message(check_in_id).await.unwrap().unwrap();
        let check_in = db.get_check_in(check_in_id).await.unwrap().unwrap();
        assert_eq!(check_in.generated_message_id, Some(stored.id));
        assert!(second.generated_at >= first.generated_at);
    })
    .await
    .expect("test timed out");
}

// ── HTTP API ────────────────────────────────────────────────────────

/// Start the full API against an in-memory DB and a stub generation server.
async fn start_api(generation_port: u16) -> u16 {
    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());

    let state = AppState {
        users: Arc::new(UserService::new(
            Arc::clone(&db) as Arc<dyn UserStore>,
            Arc::new(LogPublisher),
        )),
        check_ins: Arc::new(CheckInService::new(Arc::clone(&db) as Arc<dyn CheckInStore>)),
        enrichment: Arc::new(EnrichmentService::new(
            Arc::clone(&db) as Arc<dyn CheckInStore>,
            client_for(generation_port, Duration::from_secs(5)),
        )),
    };

    let app = api_routes(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

#[tokio::test]
async fn api_full_check_in_enrichment_flow() {
    timeout(TEST_TIMEOUT, async {
        let generation_port = start_generation_stub(
            StatusCode::OK,
            r#"{"choices":[{"message":{"content":"Keep it up!"},"confidence":0.9}]}"#,
        )
        .await;
        let api_port = start_api(generation_port).await;
        let base = format!("http://127.0.0.1:{api_port}");
        let http = reqwest::Client::new();

        // Create a user.
        let resp = http
            .post(format!("{base}/api/users"))
            .json(&serde_json::json!({"username": "alice", "password": "hunter22"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);

        // Duplicate username conflicts.
        let resp = http
            .post(format!("{base}/api/users"))
            .json(&serde_json::json!({"username": "alice", "password": "other"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);

        // Record a check-in as alice.
        let resp = http
            .post(format!("{base}/api/checkins"))
            .header("x-username", "alice")
            .json(&serde_json::json!({
                "mood": "HAPPY",
                "energy_level": "HIGH",
                "notes": "Great day"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let check_in: serde_json::Value = resp.json().await.unwrap();
        let check_in_id = check_in["id"].as_i64().unwrap();

        // Enrich it.
        let resp = http
            .post(format!("{base}/api/checkins/{check_in_id}/generate-message"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let enriched: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(enriched["check_in_id"].as_i64().unwrap(), check_in_id);
        assert_eq!(enriched["message"], "Keep it up!");
        assert!((enriched["confidence"].as_f64().unwrap() - 0.9).abs() < 1e-9);

        // The check-in view now inlines the message.
        let resp = http
            .get(format!("{base}/api/checkins/{check_in_id}"))
            .send()
            .await
            .unwrap();
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["generated_message"], "Keep it up!");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn api_maps_errors_to_statuses() {
    timeout(TEST_TIMEOUT, async {
        let generation_port = start_generation_stub(StatusCode::OK, r#"{"choices":[]}"#).await;
        let api_port = start_api(generation_port).await;
        let base = format!("http://127.0.0.1:{api_port}");
        let http = reqwest::Client::new();

        // Unknown check-in → 404.
        let resp = http
            .post(format!("{base}/api/checkins/999/generate-message"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        // Unknown user → 404.
        let resp = http.get(format!("{base}/api/users/999")).send().await.unwrap();
        assert_eq!(resp.status(), 404);

        // Missing caller header → 401.
        let resp = http
            .post(format!("{base}/api/checkins"))
            .json(&serde_json::json!({"mood": "SAD", "energy_level": "LOW"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);

        // Foreign password change → 403.
        for name in ["alice", "bob"] {
            http.post(format!("{base}/api/users"))
                .json(&serde_json::json!({"username": name, "password": "pw"}))
                .send()
                .await
                .unwrap();
        }
        let resp = http
            .get(format!("{base}/api/users/me"))
            .header("x-username", "alice")
            .send()
            .await
            .unwrap();
        let alice: serde_json::Value = resp.json().await.unwrap();
        let alice_id = alice["id"].as_i64().unwrap();

        let resp = http
            .put(format!("{base}/api/users/{alice_id}/password"))
            .header("x-username", "bob")
            .json(&serde_json::json!({"new_password": "stolen"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn api_delete_check_in_cascades() {
    timeout(TEST_TIMEOUT, async {
        let generation_port = start_generation_stub(
            StatusCode::OK,
            r#"{"choices":[{"message":{"content":"bye"},"confidence":0.4}]}"#,
        )
        .await;
        let api_port = start_api(generation_port).await;
        let base = format!("http://127.0.0.1:{api_port}");
        let http = reqwest::Client::new();

        http.post(format!("{base}/api/users"))
            .json(&serde_json::json!({"username": "alice", "password": "pw"}))
            .send()
            .await
            .unwrap();

        let resp = http
            .post(format!("{base}/api/checkins"))
            .header("x-username", "alice")
            .json(&serde_json::json!({"mood": "NEUTRAL", "energy_level": "MEDIUM"}))
            .send()
            .await
            .unwrap();
        let check_in: serde_json::Value = resp.json().await.unwrap();
        let check_in_id = check_in["id"].as_i64().unwrap();

        http.post(format!("{base}/api/checkins/{check_in_id}/generate-message"))
            .send()
            .await
            .unwrap();

        let resp = http
            .delete(format!("{base}/api/checkins/{check_in_id}"))
            .header("x-username", "alice")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 204);

        // Gone, along with its generated message.
        let resp = http
            .get(format!("{base}/api/checkins/{check_in_id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}
