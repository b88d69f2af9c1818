//! Booking handlers. Every route here sits behind the auth middleware, so
//! each handler receives the decoded principal and hands it to the service
//! layer for scoping and ownership checks.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use common::types::ApiResponse;
use models::booking;
use service::access::AuthContext;
use service::booking_service::{self, BookingView};
use service::query::ListParams;

use crate::errors::ApiError;
use crate::routes::auth::ServerState;

#[derive(Debug, Deserialize)]
pub struct BookingDateInput {
    pub booking_date: DateTime<FixedOffset>,
}

async fn list_scoped(
    state: &ServerState,
    ctx: &AuthContext,
    company_scope: Option<Uuid>,
    raw: HashMap<String, String>,
) -> Result<Json<ApiResponse<Vec<Value>>>, ApiError> {
    let params = ListParams::from_query(&raw)?;
    let page = booking_service::list_bookings(&state.db, ctx, company_scope, &params).await?;
    Ok(Json(ApiResponse::list(page.rows, page.total, page.links)))
}

pub async fn list(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Query(mut raw): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse<Vec<Value>>>, ApiError> {
    // `companyId` scopes the listing; it is not a filter field
    let company_scope = match raw.remove("companyId") {
        Some(v) => Some(
            Uuid::parse_str(&v)
                .map_err(|_| ApiError::bad_request(format!("invalid companyId: {v}")))?,
        ),
        None => None,
    };
    list_scoped(&state, &ctx, company_scope, raw).await
}

pub async fn list_for_company(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(company_id): Path<Uuid>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse<Vec<Value>>>, ApiError> {
    list_scoped(&state, &ctx, Some(company_id), raw).await
}

pub async fn get_one(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingView>>, ApiError> {
    let view = booking_service::get_booking(&state.db, &ctx, booking_id).await?;
    Ok(Json(ApiResponse::ok(view)))
}

/// Create a booking against the company in the path, then hand the
/// confirmation to the mailer on a detached task. The client never waits
/// for (or hears about) delivery.
pub async fn create(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(company_id): Path<Uuid>,
    Json(input): Json<BookingDateInput>,
) -> Result<Json<ApiResponse<booking::Model>>, ApiError> {
    let created =
        booking_service::create_booking(&state.db, &ctx, company_id, input.booking_date).await?;
    booking_service::dispatch_booking_notification(
        state.db.clone(),
        state.mailer.clone(),
        created.clone(),
    );
    Ok(Json(ApiResponse::ok(created)))
}

pub async fn update(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
    Json(input): Json<BookingDateInput>,
) -> Result<Json<ApiResponse<booking::Model>>, ApiError> {
    let updated =
        booking_service::update_booking(&state.db, &ctx, booking_id, input.booking_date).await?;
    Ok(Json(ApiResponse::ok(updated)))
}

pub async fn delete(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    booking_service::delete_booking(&state.db, &ctx, booking_id).await?;
    Ok(Json(ApiResponse::ok(json!({}))))
}
