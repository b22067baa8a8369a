mod activation;
mod admin;
pub mod auth;
pub mod error;
pub mod middleware;
mod password;
pub mod rate_limit;
mod validation;


use axum::{
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::ui::{render_template, render_with_status, IndexTemplate, NotFoundTemplate, PageContext};
use crate::AppState;
use middleware::CurrentSession;

pub fn create_router(state: Arc<AppState>) -> Router {
    let throttle = from_fn_with_state(state.clone(), rate_limit::throttle);

    // Signed-out pages; POSTs are throttled. The gate is a route layer and so
    // wraps the throttle: a signed-in client is redirected before it is counted.
    let anonymous_routes = Router::new()
        .route(
            "/login",
            get(auth::login_page)
                .merge(post(auth::login_submit).layer(throttle.clone())),
        )
        .route(
            "/register",
            get(auth::register_page)
                .merge(post(auth::register_submit).layer(throttle.clone())),
        )
        .route(
            "/activate/resend",
            get(activation::resend_page)
                .merge(post(activation::resend_submit).layer(throttle.clone())),
        )
        .route("/activate/:token", get(activation::activate))
        .route(
            "/user/password/forgot",
            get(password::forgot_page)
                .merge(post(password::forgot_submit).layer(throttle.clone())),
        )
        .route(
            "/user/password/reset/:token",
            get(password::reset_page)
                .merge(post(password::reset_submit).layer(throttle)),
        )
        .route_layer(from_fn(middleware::require_anonymous));

    let authenticated_routes = Router::new()
        .route("/logout", get(auth::logout))
        .route_layer(from_fn(middleware::sensitive))
        .route_layer(from_fn(middleware::require_authenticated));

    let admin_routes = Router::new()
        .route("/admin", get(admin::admin_page).post(admin::admin_page))
        .route("/config", get(admin::config_page).post(admin::config_submit))
        .route("/config/log-level", post(admin::log_level_submit))
        .route_layer(from_fn(middleware::sensitive))
        .route_layer(from_fn(middleware::require_admin));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .merge(anonymous_routes)
        .merge(authenticated_routes)
        .merge(admin_routes)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), middleware::resolve_session))
        .layer(from_fn(middleware::security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(session: CurrentSession) -> Response {
    render_template(IndexTemplate {
        page: PageContext::new("Home", session.get()),
    })
}

async fn health_check() -> &'static str {
    "OK"
}

async fn not_found(session: CurrentSession) -> Response {
    render_with_status(
        StatusCode::NOT_FOUND,
        NotFoundTemplate {
            page: PageContext::new("404 Not Found", session.get()),
        },
    )
}
