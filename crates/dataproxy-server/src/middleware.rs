use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::metrics;

/// Error code the ORM client expects in a rewritten error envelope.
pub const ENGINE_STARTUP_ERROR_CODE: &str = "P5006";

// =============================================================================
// Authentication
// =============================================================================

/// Expected `Authorization` header value.
#[derive(Clone)]
pub struct ApiKey {
    expected: Arc<str>,
}

impl ApiKey {
    pub fn new(api_key: &str) -> Self {
        Self {
            expected: format!("Bearer {api_key}").into(),
        }
    }

    fn accepts(&self, req: &Request<Body>) -> bool {
        req.headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .is_some_and(|token| token == &*self.expected)
    }
}

/// Checks the bearer token and normalizes the request for the GraphQL handler.
///
/// Edge runtimes of the ORM client post GraphQL with other content types,
/// so every POST is treated as JSON. `OPTIONS` passes without a token.
pub async fn authenticate(State(key): State<ApiKey>, mut req: Request<Body>, next: Next) -> Response {
    if req.method() == Method::POST {
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    if req.method() != Method::OPTIONS && !key.accepts(&req) {
        tracing::debug!(path = %req.uri().path(), "Rejected request without a valid API key");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    next.run(req).await
}

// =============================================================================
// Error envelope
// =============================================================================

#[derive(Clone, Copy)]
pub struct EnvelopeOptions {
    /// Log response bodies at debug level.
    pub log_bodies: bool,
}

/// Rewrites GraphQL error responses into the engine error envelope.
///
/// A JSON body carrying `errors[0].message` is replaced with
/// `{"EngineNotStarted":{"reason":{"KnownEngineStartupError":{..}}}}` and
/// status 400. Any other body passes through unchanged.
pub async fn error_envelope(
    State(options): State<EnvelopeOptions>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let res = next.run(req).await;
    let (parts, body) = res.into_parts();

    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(data) => {
            if options.log_bodies {
                tracing::debug!(body = %data, "Response");
            }
            if let Some(message) = first_error_message(&data) {
                let mut rewritten =
                    (StatusCode::BAD_REQUEST, Json(engine_not_started(message))).into_response();
                let headers = rewritten.headers_mut();
                for (name, value) in &parts.headers {
                    if *name != CONTENT_LENGTH && *name != CONTENT_TYPE {
                        headers.append(name.clone(), value.clone());
                    }
                }
                return rewritten;
            }
        }
        Err(_) => {
            if options.log_bodies {
                tracing::debug!(body = %String::from_utf8_lossy(&bytes), "Response");
            }
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn first_error_message(data: &Value) -> Option<&str> {
    data.pointer("/errors/0/message")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
}

/// The envelope the ORM client decodes as a known engine error.
pub fn engine_not_started(message: &str) -> Value {
    json!({
        "EngineNotStarted": {
            "reason": {
                "KnownEngineStartupError": {
                    "msg": message,
                    "error_code": ENGINE_STARTUP_ERROR_CODE
                }
            }
        }
    })
}

// =============================================================================
// Request id and metrics
// =============================================================================

pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    // Preserve an incoming request id, otherwise generate one.
    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    let Some(req_id_value) = req_id_value else {
        return next.run(req).await;
    };

    req.headers_mut().insert(header_name.clone(), req_id_value.clone());
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

pub async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let route = metrics::route_label(req.uri().path());

    let res = next.run(req).await;
    metrics::record_http_request(&method, route, res.status().as_u16(), started.elapsed());
    res
}
