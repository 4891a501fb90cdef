// tests/api_tests.rs
use async_trait::async_trait;
use hyper::{Body, Method, Request, Response, StatusCode};
use std::sync::Arc;
use uptime_sentinel::api::Api;
use uptime_sentinel::metrics::MetricsRegistry;
use uptime_sentinel::monitor::Scheduler;
use uptime_sentinel::probe::{CheckOutcome, Probe, ProbeError, ProbeExecutor, Target};
use uptime_sentinel::storage::{CheckRecord, MemorySink, ResultSink, StorageError};

struct OkProbe;

#[async_trait]
impl Probe for OkProbe {
    async fn get(&self, _target: &Target) -> Result<u16, ProbeError> {
        Ok(200)
    }
}

struct UnavailableSink;

#[async_trait]
impl ResultSink for UnavailableSink {
    async fn list_known_targets(&self) -> Result<Vec<Target>, StorageError> {
        Ok(Vec::new())
    }

    async fn append(&self, _outcome: &CheckOutcome) -> Result<CheckRecord, StorageError> {
        Err(StorageError::Unavailable("offline".into()))
    }

    async fn latest_per_target(&self) -> Result<Vec<CheckRecord>, StorageError> {
        Err(StorageError::Unavailable("offline".into()))
    }
}

fn setup(sink: Arc<dyn ResultSink>) -> (Api, Arc<Scheduler>) {
    let executor = ProbeExecutor::new(Arc::new(OkProbe));
    let scheduler = Arc::new(Scheduler::new(executor, sink.clone(), None));
    (Api::new(scheduler.clone(), sink, None), scheduler)
}

fn request(method: Method, path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: Response<Body>) -> String {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_add_monitor_registers_target() {
    let (api, scheduler) = setup(Arc::new(MemorySink::new()));

    let response = api
        .handle(request(Method::POST, "/api/monitor", r#"{"url":"https://example.com"}"#))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers()["content-type"],
        "application/json"
    );
    assert_eq!(body_string(response).await, r#"{"status":"added"}"#);

    // Adding again is accepted but does not duplicate.
    let response = api
        .handle(request(Method::POST, "/api/monitor", r#"{"url":"https://example.com"}"#))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(scheduler.targets(), vec![Target::new("https://example.com")]);

    let response = api.handle(request(Method::GET, "/api/monitor", "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, r#"["https://example.com"]"#);
}

#[tokio::test]
async fn test_add_monitor_validation() {
    let (api, scheduler) = setup(Arc::new(MemorySink::new()));

    let cases = [
        ("not json", "invalid request body"),
        (r#"{}"#, "url is required"),
        (r#"{"url":""}"#, "url is required"),
        (r#"{"url":"example.com"}"#, "invalid url"),
        (r#"{"url":"ftp://example.com"}"#, "invalid url"),
    ];

    for (body, expected) in cases {
        let response = api.handle(request(Method::POST, "/api/monitor", body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert!(body_string(response).await.starts_with(expected), "body: {}", body);
    }

    assert!(scheduler.targets().is_empty());
}

#[tokio::test]
async fn test_status_returns_latest_checks() {
    let sink = Arc::new(MemorySink::new());
    let (api, scheduler) = setup(sink.clone());

    let response = api.handle(request(Method::GET, "/api/status", "")).await;
    assert_eq!(body_string(response).await, "[]");

    scheduler.add_target("http://a.test");
    scheduler.add_target("http://b.test");
    scheduler.run_cycle().await.unwrap();
    scheduler.run_cycle().await.unwrap();

    let response = api.handle(request(Method::GET, "/api/status", "")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let checks: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    let checks = checks.as_array().unwrap();
    assert_eq!(checks.len(), 2);
    for check in checks {
        assert_eq!(check["status_code"], 200);
        assert!(check["id"].as_u64().unwrap() > 2);
        assert!(check["url"].is_string());
        assert!(check["latency"].is_u64());
    }
}

#[tokio::test]
async fn test_status_storage_failure_is_internal_error() {
    let (api, _scheduler) = setup(Arc::new(UnavailableSink));

    let response = api.handle(request(Method::GET, "/api/status", "")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, "internal server error\n");
}

#[tokio::test]
async fn test_routing_and_cors() {
    let (api, _scheduler) = setup(Arc::new(MemorySink::new()));

    let response = api.handle(request(Method::OPTIONS, "/api/monitor", "")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        response.headers()["access-control-allow-methods"],
        "GET, POST, OPTIONS"
    );
    assert_eq!(response.headers()["access-control-allow-headers"], "Content-Type");

    let response = api.handle(request(Method::DELETE, "/api/status", "")).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let response = api.handle(request(Method::GET, "/nope", "")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let (api, scheduler) = setup(Arc::new(MemorySink::new()));

    let url = format!("https://example.com/{}", "a".repeat(70 * 1024));
    let body = format!(r#"{{"url":"{}"}}"#, url);
    let response = api.handle(request(Method::POST, "/api/monitor", &body)).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(scheduler.targets().is_empty());
}

#[tokio::test]
async fn test_requests_are_counted() {
    let registry = MetricsRegistry::new().unwrap();
    let sink: Arc<dyn ResultSink> = Arc::new(MemorySink::new());
    let executor = ProbeExecutor::new(Arc::new(OkProbe));
    let scheduler = Arc::new(Scheduler::new(executor, sink.clone(), Some(registry.collector())));
    let api = Api::new(scheduler, sink, Some(registry.collector()));

    api.handle(request(Method::GET, "/api/status", "")).await;
    api.handle(request(Method::GET, "/favicon.ico", "")).await;

    let text = String::from_utf8(registry.gather().unwrap()).unwrap();
    assert!(text.contains(
        "sentinel_api_requests_total{method=\"GET\",path=\"/api/status\",status_code=\"200\"} 1"
    ));
    assert!(text.contains(
        "sentinel_api_requests_total{method=\"GET\",path=\"other\",status_code=\"404\"} 1"
    ));
}
