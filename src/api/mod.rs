// ────────────────────────────────
// src/api/mod.rs
// JSON API over the scheduler and the result sink
// ────────────────────────────────

use crate::config::validate_target;
use crate::metrics::MetricsCollector;
use crate::monitor::Scheduler;
use crate::storage::{ResultSink, StorageError};
use hyper::header::{self, HeaderValue};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

const MAX_BODY_BYTES: u64 = 64 * 1024;

pub struct Api {
    scheduler: Arc<Scheduler>,
    sink: Arc<dyn ResultSink>,
    metrics: Option<Arc<MetricsCollector>>,
}

#[derive(Debug, Deserialize)]
struct AddMonitorRequest {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Serialize)]
struct AddMonitorResponse {
    status: &'static str,
}

impl Api {
    pub fn new(
        scheduler: Arc<Scheduler>,
        sink: Arc<dyn ResultSink>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            scheduler,
            sink,
            metrics,
        }
    }

    /// Always produces a response; failures are rendered as error statuses.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let method = req.method().clone();
        let path = route_label(req.uri().path());

        let mut response = match self.route(req).await {
            Ok(response) => response,
            Err(e) => {
                if let ApiError::Storage(ref source) = e {
                    error!("Failed to query checks: {}", source);
                } else {
                    debug!(%method, path, "Rejected request: {}", e);
                }
                e.into()
            }
        };

        apply_cors(&mut response);

        if let Some(metrics) = &self.metrics {
            metrics.record_api_request(method.as_str(), path, response.status().as_u16());
        }

        response
    }

    async fn route(&self, req: Request<Body>) -> Result<Response<Body>, ApiError> {
        if req.method() == Method::OPTIONS {
            return Ok(empty(StatusCode::NO_CONTENT));
        }

        match (req.method(), req.uri().path()) {
            (&Method::GET, "/api/status") => self.latest_checks().await,
            (&Method::GET, "/api/monitor") => self.monitored_targets(),
            (&Method::POST, "/api/monitor") => self.add_monitor(req).await,
            (_, "/api/status") | (_, "/api/monitor") => Err(ApiError::MethodNotAllowed),
            _ => Err(ApiError::NotFound),
        }
    }

    async fn latest_checks(&self) -> Result<Response<Body>, ApiError> {
        let checks = self.sink.latest_per_target().await?;
        json(StatusCode::OK, &checks)
    }

    fn monitored_targets(&self) -> Result<Response<Body>, ApiError> {
        json(StatusCode::OK, &self.scheduler.targets())
    }

    async fn add_monitor(&self, req: Request<Body>) -> Result<Response<Body>, ApiError> {
        let declared_len = req
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared_len.map_or(false, |len| len > MAX_BODY_BYTES) {
            return Err(ApiError::PayloadTooLarge);
        }

        let body = hyper::body::to_bytes(req.into_body())
            .await
            .map_err(|_| ApiError::InvalidBody)?;
        if body.len() as u64 > MAX_BODY_BYTES {
            return Err(ApiError::PayloadTooLarge);
        }

        let payload: AddMonitorRequest =
            serde_json::from_slice(&body).map_err(|_| ApiError::InvalidBody)?;
        if payload.url.is_empty() {
            return Err(ApiError::MissingUrl);
        }
        validate_target(&payload.url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;

        self.scheduler.add_target(payload.url);

        json(StatusCode::CREATED, &AddMonitorResponse { status: "added" })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("invalid request body")]
    InvalidBody,

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("url is required")]
    MissingUrl,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Convert ApiError to a plain-text response
impl From<ApiError> for Response<Body> {
    fn from(err: ApiError) -> Self {
        let status = match err {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::InvalidBody | ApiError::MissingUrl | ApiError::InvalidUrl(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Storage(_) | ApiError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal details stay in the logs.
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
            _ => err.to_string(),
        };

        let mut response = Response::new(Body::from(format!("{}\n", message)));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, ApiError> {
    let body = serde_json::to_vec(value)?;
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

fn empty(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

fn apply_cors(response: &mut Response<Body>) {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

/// Bounded label set for request metrics.
fn route_label(path: &str) -> &'static str {
    match path {
        "/api/status" => "/api/status",
        "/api/monitor" => "/api/monitor",
        _ => "other",
    }
}
