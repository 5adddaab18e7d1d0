mod handlers;
pub mod middleware;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use middleware::SecurityConfig;

pub fn create_router(engine: Engine) -> Router {
    create_router_with_security(engine, SecurityConfig::disabled())
}

pub fn create_router_with_security(engine: Engine, security: SecurityConfig) -> Router {
    let api = Router::new()
        // Sessions
        .route("/sessions", post(handlers::start_session))
        .route("/sessions/{id}", get(handlers::get_session))
        .route("/sessions/{id}", delete(handlers::end_session))
        .route("/sessions/{id}/branch", post(handlers::select_branch))
        // Documents
        .route("/sessions/{id}/document", put(handlers::write_document))
        .route("/sessions/{id}/document", get(handlers::read_document))
        .route("/sessions/{id}/impact", post(handlers::analyze_impact))
        .route("/sessions/{id}/sections", post(handlers::update_sections))
        // Review
        .route("/sessions/{id}/review", post(handlers::open_review))
        // Health
        .route("/health", get(handlers::health));

    let mut router = Router::new().nest("/api/v1", api);

    if let Some(limiter) = security.rate_limiter.clone() {
        router = router.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }
    router = router.layer(from_fn_with_state(
        security.clone(),
        middleware::auth_middleware,
    ));

    router
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors_layer(&security))
        .with_state(engine)
}
