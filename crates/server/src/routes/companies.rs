//! Company directory handlers. Reads are public; writes go through the
//! admin gate.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use common::types::ApiResponse;
use models::company::{self, CompanyFields};
use service::access::AuthContext;
use service::company_service::{self, CompanyUpdate};
use service::query::ListParams;

use crate::errors::ApiError;
use crate::routes::auth::{ensure_admin, ServerState};

pub async fn list(
    State(state): State<ServerState>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse<Vec<Value>>>, ApiError> {
    let params = ListParams::from_query(&raw)?;
    let page = company_service::list_companies(&state.db, &params).await?;
    Ok(Json(ApiResponse::list(page.rows, page.total, page.links)))
}

pub async fn get_one(
    State(state): State<ServerState>,
    Path(company_id): Path<Uuid>,
) -> Result<Json<ApiResponse<company::Model>>, ApiError> {
    let found = company_service::get_company(&state.db, company_id).await?;
    Ok(Json(ApiResponse::ok(found)))
}

pub async fn create(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Json(fields): Json<CompanyFields>,
) -> Result<(StatusCode, Json<ApiResponse<company::Model>>), ApiError> {
    ensure_admin(&ctx)?;
    let created = company_service::create_company(&state.db, fields).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

pub async fn update(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(company_id): Path<Uuid>,
    Json(input): Json<CompanyUpdate>,
) -> Result<Json<ApiResponse<company::Model>>, ApiError> {
    ensure_admin(&ctx)?;
    let updated = company_service::update_company(&state.db, company_id, input).await?;
    Ok(Json(ApiResponse::ok(updated)))
}

pub async fn delete(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(company_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    ensure_admin(&ctx)?;
    company_service::delete_company(&state.db, company_id).await?;
    Ok(Json(ApiResponse::ok(json!({}))))
}
