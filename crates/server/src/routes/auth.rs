//! Session endpoints and the authentication middleware.
//!
//! The middleware verifies the token once, rebuilds the acting principal
//! from its claims, and stores it in the request extensions. Handlers read
//! it back with `Extension<AuthContext>`; nothing downstream touches the
//! token again.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::{Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::{json, Value};
use tracing::warn;

use common::types::ApiResponse;
use models::user;
use service::access::AuthContext;
use service::auth_service::{self, AuthSettings, LoginInput, RegisterInput};
use service::mailer::Mailer;

use crate::errors::ApiError;

pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Clone)]
pub struct ServerState {
    pub db: DatabaseConnection,
    pub auth: AuthSettings,
    pub mailer: Arc<dyn Mailer>,
}

fn session_cookie(token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(AUTH_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(false);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

fn session_body(user: &user::Model, token: &str) -> Value {
    json!({
        "user_id": user.id,
        "email": user.email,
        "name": user.name,
        "token": token,
    })
}

/// Register and sign in immediately: the response carries the session
/// token both in the body and as a cookie, same as login.
pub async fn register(
    State(state): State<ServerState>,
    jar: CookieJar,
    Json(input): Json<RegisterInput>,
) -> Result<(CookieJar, Json<ApiResponse<Value>>), ApiError> {
    let created = auth_service::register(&state.db, input).await?;
    let token = auth_service::issue_token(&state.auth, &created)?;
    let jar = jar.add(session_cookie(token.clone()));
    Ok((jar, Json(ApiResponse::ok(session_body(&created, &token)))))
}

pub async fn login(
    State(state): State<ServerState>,
    jar: CookieJar,
    Json(input): Json<LoginInput>,
) -> Result<(CookieJar, Json<ApiResponse<Value>>), ApiError> {
    let session = auth_service::login(&state.db, &state.auth, input).await?;
    let jar = jar.add(session_cookie(session.token.clone()));
    Ok((jar, Json(ApiResponse::ok(session_body(&session.user, &session.token)))))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<ApiResponse<Value>>) {
    let jar = jar.remove(Cookie::from(AUTH_COOKIE));
    (jar, Json(ApiResponse::ok(json!({}))))
}

/// Current user, looked up fresh so the response reflects the row and not
/// just the claims.
pub async fn me(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<ApiResponse<user::Model>>, ApiError> {
    let found = user::Entity::find_by_id(ctx.user_id)
        .one(&state.db)
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "user not found"))?;
    Ok(Json(ApiResponse::ok(found)))
}

/// Role gate for admin-only handlers. Ownership checks live in the service
/// layer; this one is about the route itself.
pub fn ensure_admin(ctx: &AuthContext) -> Result<(), ApiError> {
    if ctx.is_admin() {
        return Ok(());
    }
    Err(ApiError::unauthorized(format!(
        "role {} is not authorized for this action",
        ctx.role.as_str()
    )))
}

/// Routes reachable without a token: health, register/login, company reads,
/// and CORS preflight. Everything else goes through the middleware below.
fn is_public(method: &Method, path: &str) -> bool {
    if *method == Method::OPTIONS {
        return true;
    }
    if path == "/health" || path == "/auth/login" || path == "/auth/register" {
        return true;
    }
    if *method == Method::GET {
        if path == "/companies" {
            return true;
        }
        // A single company read is public; its nested booking routes are not
        if let Some(rest) = path.strip_prefix("/companies/") {
            return !rest.is_empty() && !rest.contains('/');
        }
    }
    false
}

fn token_from_request(req: &Request) -> Result<String, ApiError> {
    if let Some(h) = req.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        return h
            .strip_prefix("Bearer ")
            .map(str::to_string)
            .ok_or_else(|| ApiError::unauthorized("invalid Authorization format (expect Bearer)"));
    }

    // Cookie fallback for browser sessions
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    for part in cookie_header.split(';') {
        if let Some(token) = part.trim().strip_prefix("auth_token=") {
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }
    }
    Err(ApiError::unauthorized("missing Authorization header and auth_token cookie"))
}

/// Global middleware: outside the public whitelist, every request must
/// carry a valid token. The decoded principal is attached to the request
/// for the handlers.
pub async fn require_auth(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_public(req.method(), req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let path = req.uri().path().to_string();
    let token = token_from_request(&req).map_err(|e| {
        warn!(path = %path, "request without usable credentials");
        e
    })?;
    let ctx = auth_service::decode_token(&state.auth.jwt_secret, &token).map_err(|e| {
        warn!(path = %path, error = %e, "token validation failed");
        ApiError::unauthorized("invalid or expired token")
    })?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
