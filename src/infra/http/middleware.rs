//! Request-scoped middleware: id tagging and failure logging.

use std::fmt;
use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

/// Correlates the log lines emitted for one request.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(Uuid);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Tag the request and its eventual response with a shared id.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let id = RequestId(Uuid::new_v4());
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;
    response.extensions_mut().insert(id);
    response
}

/// Log failed responses, folding in whatever diagnostic the handler attached.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request.extensions().get::<RequestId>().copied();
    let started = Instant::now();

    let mut response = next.run(request).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let latency_ms = started.elapsed().as_millis() as u64;
    let (source, detail, chain) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => {
            let detail = report
                .messages
                .first()
                .cloned()
                .unwrap_or_else(|| "no diagnostic available".to_string());
            (report.source, detail, report.messages)
        }
        None => ("unknown", "no diagnostic available".to_string(), Vec::new()),
    };
    let request_id = request_id.map(|id| id.to_string()).unwrap_or_default();

    if status.is_server_error() {
        error!(
            target = "breva::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            latency_ms = latency_ms,
            source = source,
            detail = %detail,
            chain = ?chain,
            request_id = request_id,
            "server error response",
        );
    } else {
        warn!(
            target = "breva::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            latency_ms = latency_ms,
            source = source,
            detail = %detail,
            chain = ?chain,
            request_id = request_id,
            "client error response",
        );
    }

    response
}
