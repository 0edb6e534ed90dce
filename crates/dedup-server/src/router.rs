use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router: every path names a resource.
///
/// Request bodies are streamed straight into the store, so axum's default
/// body limit is disabled.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/*resource",
            get(handler::get_resource).put(handler::put_resource),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
