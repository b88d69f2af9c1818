use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};
use tracing::Level;

use common::types::Health;

pub mod auth;
pub mod bookings;
pub mod companies;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Build the full application router. The auth middleware wraps everything;
/// its whitelist decides which routes stay public.
pub fn build_router(state: auth::ServerState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", axum::routing::post(auth::register))
        .route("/auth/login", axum::routing::post(auth::login))
        .route("/auth/logout", axum::routing::post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/companies", get(companies::list).post(companies::create))
        .route(
            "/companies/:company_id",
            get(companies::get_one).put(companies::update).delete(companies::delete),
        )
        .route(
            "/companies/:company_id/bookings",
            get(bookings::list_for_company).post(bookings::create),
        )
        .route("/bookings", get(bookings::list))
        .route(
            "/bookings/:booking_id",
            get(bookings::get_one).put(bookings::update).delete(bookings::delete),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_auth))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
