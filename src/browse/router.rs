//! HTTP router for the browsing server

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::browse::handler::{list_tables, missing_tables, table_rows, welcome};
use crate::browse::server::BrowseState;

/// Create the router; `cors` adds `Access-Control-Allow-Origin: *`.
pub fn create_router(state: Arc<BrowseState>, cors: bool) -> Router {
    // Tracing layer for request logging
    let trace = TraceLayer::new_for_http();

    let router = Router::new()
        .route("/", get(welcome))
        .route("/tables", get(list_tables))
        .route("/tables/{name}", get(table_rows))
        .fallback(missing_tables)
        .layer(trace);

    let router = if cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
