//! Router tests for the HTTP surface

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use cloud_health::api::{AppState, HEALTH_STATUS_HEADER, LIVENESS_PATH, create_app};
use cloud_health::config::{CloudSqlConfig, GcpSettings, ServiceEndpoints};
use cloud_health::health::checks::{GoogleApi, StaticToken};
use cloud_health::health::{self, Aggregator, FnProbe, ProbeContext, ProbeRegistry};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::any};

const GOOGLE_PROBES: [&str; 7] = [
    "cloud_storage",
    "document_ai",
    "firestore",
    "secret_manager",
    "vertex_ai_gemini",
    "vertex_ai_index",
    "cloud_sql",
];

async fn get(app: axum::Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, serde_json::from_slice(&body).unwrap())
}

/// Every Google API answers 503
async fn failing_google_state() -> (MockServer, AppState) {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(503).set_body_string(
            r#"{"error":{"code":503,"message":"The service is currently unavailable."}}"#,
        ))
        .mount(&server)
        .await;

    let settings = GcpSettings {
        project_id: "demo".to_string(),
        region: "us-central1".to_string(),
        location: "us".to_string(),
        firestore_database: "prod-firestore".to_string(),
        gemini_model: "gemini-2.0-flash".to_string(),
        cloud_sql: CloudSqlConfig::default(),
        endpoints: ServiceEndpoints::uniform(&server.uri()),
    };
    let api = GoogleApi::new(
        reqwest::Client::new(),
        Arc::new(StaticToken::new("token")),
        settings,
    );
    let aggregator = health::google_cloud_aggregator(&api).unwrap();

    (server, AppState::new(aggregator, None))
}

fn local_state(deadline: Option<Duration>) -> AppState {
    let registry = ProbeRegistry::new()
        .register(FnProbe::new("cache", |ctx: ProbeContext| async move {
            ctx.record("keys", 12);
            Ok(())
        }))
        .unwrap()
        .register(FnProbe::new("queue", |_| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(())
        }))
        .unwrap();
    AppState::new(Aggregator::new(registry), deadline)
}

#[tokio::test]
async fn liveness_is_independent_of_failing_dependencies() {
    let (_server, state) = failing_google_state().await;
    let app = create_app(state);

    let (status, _, body) = get(app.clone(), LIVENESS_PATH).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "status": "ok" }));

    let (status, headers, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[HEALTH_STATUS_HEADER], "unhealthy");

    let results = body.as_object().unwrap();
    assert_eq!(results.len(), GOOGLE_PROBES.len());
    for name in GOOGLE_PROBES {
        let result = &results[name];
        assert_eq!(result["status"], "unhealthy", "{name} should be unhealthy");
        assert!(
            result["error"]
                .as_str()
                .unwrap()
                .contains("currently unavailable"),
            "{name}: {}",
            result["error"]
        );
    }
}

#[tokio::test]
async fn health_reports_each_probe() {
    let app = create_app(local_state(None));

    let (status, headers, body) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[HEALTH_STATUS_HEADER], "healthy");
    assert_eq!(body["cache"]["status"], "healthy");
    assert_eq!(body["cache"]["details"]["keys"], 12);
    assert!(body["cache"]["latency_ms"].as_f64().unwrap() >= 0.0);
    assert!(body["cache"]["timestamp"].is_string());
    assert!(body["cache"].get("error").is_none());
    assert!(body["queue"].get("details").is_none());
}

#[tokio::test(start_paused = true)]
async fn health_applies_configured_deadline() {
    let registry = ProbeRegistry::new()
        .register(FnProbe::new("stuck", |_| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        }))
        .unwrap();
    let state = AppState::new(Aggregator::new(registry), Some(Duration::from_millis(50)));

    let (status, headers, body) = get(create_app(state), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[HEALTH_STATUS_HEADER], "unhealthy");
    assert_eq!(body["stuck"]["error"], "timeout");
}

#[tokio::test]
async fn root_describes_service() {
    let (status, _, body) = get(create_app(local_state(None)), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "Google Cloud Services Health Check API");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["health_endpoint"], "/health");
    assert!(body["build"]["target"].is_string());
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let response = create_app(local_state(None))
        .oneshot(
            Request::builder()
                .uri(LIVENESS_PATH)
                .header("origin", "https://dashboard.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

/// Starts `fut` inside a second runtime, then shuts that runtime down so the
/// probe tasks it spawned are cancelled
async fn run_on_shutdown_runtime<F: Future>(fut: F) -> F::Output {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let mut fut = Box::pin(fut);
    {
        let _guard = runtime.enter();
        assert!(futures::poll!(&mut fut).is_pending());
    }
    runtime.shutdown_background();
    fut.await
}

#[tokio::test]
async fn cancelled_health_task_is_a_500() {
    let registry = ProbeRegistry::new()
        .register(FnProbe::new("stuck", |_| async {
            futures::future::pending::<()>().await;
            Ok(())
        }))
        .unwrap();
    let app = create_app(AppState::new(Aggregator::new(registry), None));
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = run_on_shutdown_runtime(app.oneshot(request)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(HEALTH_STATUS_HEADER).is_none());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, serde_json::json!({ "error": "health aggregation failed" }));
}

#[tokio::test]
async fn serves_over_tcp() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(cloud_health::server::serve(local_state(None), listener));

    let body: Value = reqwest::get(format!("http://{addr}{LIVENESS_PATH}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
}
