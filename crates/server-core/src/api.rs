//! HTTP surface of the authority.
//!
//! Handlers are thin: they gather transport evidence and the request body,
//! hand both to the [`Enroller`] and translate the outcome. Every non-success
//! response, including those produced by the body limit, the timeout and
//! routing, is logged once with method, path and status.

use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::timeout::TimeoutLayer;
use tracing::{error, warn};

use crate::{
    enroll::{Enroller, IssuedCertificate},
    error::EnrollError,
    tls::PeerCertificates,
};

/// Largest accepted request body. A public key line is far smaller.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Internal error detail attached to a rejection for the response log.
#[derive(Clone, Debug)]
struct RejectionDetail(String);

/// Routes with rejection logging but no request timeout, for driving with `oneshot` in tests.
pub fn routes(enroller: Enroller) -> Router {
    endpoints(enroller).layer(middleware::from_fn(log_rejections))
}

/// Full router served by the listener; requests exceeding `request_timeout` get 408.
pub fn router(enroller: Enroller, request_timeout: Duration) -> Router {
    endpoints(enroller)
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(middleware::from_fn(log_rejections))
}

fn endpoints(enroller: Enroller) -> Router {
    Router::new()
        .route("/enroll/{hostname}", post(enroll_host))
        .route("/enroll_user", post(enroll_user))
        .route("/status", get(status))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(enroller)
}

async fn log_rejections(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let status = response.status();
    let detail = response
        .extensions()
        .get::<RejectionDetail>()
        .map(|d| d.0.as_str())
        .unwrap_or_default();
    if status.is_server_error() {
        error!(method = %method, path = %path, status = status.as_u16(), error = %detail, "request failed");
    } else if status.is_client_error() {
        warn!(method = %method, path = %path, status = status.as_u16(), reason = %detail, "request rejected");
    }
    response
}

async fn enroll_host(
    State(enroller): State<Enroller>,
    Path(hostname): Path<String>,
    evidence: PeerCertificates,
    body: Bytes,
) -> Response {
    respond(enroller.enroll_host(&evidence, &hostname, &body).await)
}

async fn enroll_user(
    State(enroller): State<Enroller>,
    evidence: PeerCertificates,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    respond(enroller.enroll_user(&evidence, &headers, &body).await)
}

async fn status() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, TEXT_PLAIN)], "ok\n")
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, [(header::CONTENT_TYPE, TEXT_PLAIN)], "not found\n")
}

fn respond(result: Result<IssuedCertificate, EnrollError>) -> Response {
    match result.and_then(|issued| issued.authorized_line()) {
        Ok(line) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_PLAIN)], line).into_response(),
        Err(err) => {
            let detail = RejectionDetail(err.to_string());
            let mut response = err.into_response();
            response.extensions_mut().insert(detail);
            response
        }
    }
}
