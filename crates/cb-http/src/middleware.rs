//! Middleware applied to the whole driver router
//!
//! Every request is logged once with its plugin verb, status and latency.
//! Successful calls log at debug since Docker polls some verbs; client
//! errors log at warn and server errors at error.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::time::{Duration, Instant};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Request logging inside a tower-http trace span
pub fn apply_middleware(router: Router) -> Router {
    router
        .layer(middleware::from_fn(log_verb))
        // Outermost, so the span covers request logging too
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
}

/// `/NetworkDriver.Join` -> `NetworkDriver.Join`
fn verb(path: &str) -> &str {
    path.trim_start_matches('/')
}

async fn log_verb(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    log_outcome(method.as_str(), verb(&path), response.status(), start.elapsed());
    response
}

fn log_outcome(method: &str, verb: &str, status: StatusCode, elapsed: Duration) {
    let millis = elapsed.as_millis();
    if status.is_server_error() {
        tracing::error!("{} {} {} - {}ms", method, verb, status.as_u16(), millis);
    } else if status.is_client_error() {
        tracing::warn!("{} {} {} - {}ms", method, verb, status.as_u16(), millis);
    } else {
        tracing::debug!("{} {} {} - {}ms", method, verb, status.as_u16(), millis);
    }
}
