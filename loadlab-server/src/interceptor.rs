use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::any::Any;
use std::sync::Arc;

use crate::stats::StatsAggregator;
use crate::{error_response, AppState};

/// Count every inbound request by path before it reaches its handler.
///
/// Runs for matched routes and the 404 fallback alike and never short-circuits, so a request
/// stays counted even if its handler later fails, panics or the client goes away.
pub async fn count_request(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    state.stats.record_request(request.uri().path());
    next.run(request).await
}

/// Turn a handler panic into the generic 500 envelope and count it as an error.
pub fn panic_response(
    stats: &Arc<StatsAggregator>,
    err: Box<dyn Any + Send + 'static>,
) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    };

    tracing::error!(%message, "Unhandled fault while serving request");
    internal_error(stats, message)
}

/// Count an unhandled fault and answer with the generic 500 envelope.
pub fn internal_error(stats: &StatsAggregator, message: impl Into<String>) -> Response {
    stats.record_error();
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", message)
}
