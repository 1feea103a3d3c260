//! Route configuration.

use crate::auth::api_key_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let capi_routes = Router::new()
        // Peer transport endpoint
        .route(
            "/capi/{api_key}/tran_pkg/{package_id}",
            get(handlers::transfer_package),
        )
        // Client endpoints
        .route(
            "/capi/{api_key}/get_pkg/{package_id}",
            get(handlers::get_package),
        )
        .route(
            "/capi/{api_key}/pkg/{package_id}",
            get(handlers::package_info).delete(handlers::delete_package),
        )
        .route("/capi/{api_key}/add_pkg", post(handlers::add_package))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ));

    // Health check is unauthenticated for load balancers
    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .merge(capi_routes);

    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
