//! Booking ledger operations.
//!
//! Listing is scoped to the caller unless they are an admin; create enforces
//! the per-user cap inside a transaction; get/update/delete run the
//! existence check, then the ownership gate, then the operation.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use sea_orm::sea_query::SimpleExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use common::types::PageLinks;
use models::{booking, company, user};

use crate::access::{authorize_record, AuthContext};
use crate::errors::ServiceError;
use crate::mailer::Mailer;
use crate::query::{apply_select, Filter, FilterOp, ListParams, SortKey};

/// Per-user cap on concurrently existing bookings.
pub const MAX_ACTIVE_BOOKINGS: u64 = 3;

/// Company fields embedded in booking responses (reverse populate).
#[derive(Debug, Clone, Serialize)]
pub struct CompanyBrief {
    pub name: String,
    pub address: String,
    pub tel: Option<String>,
}

impl From<company::Model> for CompanyBrief {
    fn from(c: company::Model) -> Self {
        Self { name: c.name, address: c.address, tel: c.tel }
    }
}

/// Booking plus its populated company. `company` is None only if the
/// company row vanished between the two reads.
#[derive(Debug, Serialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: booking::Model,
    pub company: Option<CompanyBrief>,
}

#[derive(Debug)]
pub struct BookingPage {
    pub rows: Vec<Value>,
    pub total: u64,
    pub links: PageLinks,
}

/// Booking filters are id-valued; only equality-shaped operators apply.
fn filter_expr(filter: &Filter) -> Result<SimpleExpr, ServiceError> {
    let col = match filter.field.as_str() {
        "company_id" => booking::Column::CompanyId,
        "user_id" => booking::Column::UserId,
        other => {
            return Err(ServiceError::Validation(format!("unknown filter field: {other}")));
        }
    };
    let parse = |v: &str| {
        Uuid::parse_str(v)
            .map_err(|_| ServiceError::Validation(format!("invalid id value: {v}")))
    };
    Ok(match filter.op {
        FilterOp::Eq => col.eq(parse(&filter.value)?),
        FilterOp::Ne => col.ne(parse(&filter.value)?),
        FilterOp::In => {
            let ids = filter.values().iter().map(|v| parse(v)).collect::<Result<Vec<_>, _>>()?;
            col.is_in(ids)
        }
        _ => {
            return Err(ServiceError::Validation(format!(
                "operator not supported for field: {}",
                filter.field
            )));
        }
    })
}

fn sort_column(field: &str) -> Option<booking::Column> {
    match field {
        "booking_date" => Some(booking::Column::BookingDate),
        "created_at" => Some(booking::Column::CreatedAt),
        _ => None,
    }
}

fn build_condition(
    ctx: &AuthContext,
    company_scope: Option<Uuid>,
    filters: &[Filter],
) -> Result<Condition, ServiceError> {
    let mut cond = Condition::all();
    for filter in filters {
        cond = cond.add(filter_expr(filter)?);
    }
    // Scope narrowing happens before pagination: non-admins only ever see
    // their own rows, whatever filters they passed.
    if !ctx.is_admin() {
        cond = cond.add(booking::Column::UserId.eq(ctx.user_id));
    }
    if let Some(company_id) = company_scope {
        cond = cond.add(booking::Column::CompanyId.eq(company_id));
    }
    Ok(cond)
}

pub async fn list_bookings(
    db: &DatabaseConnection,
    ctx: &AuthContext,
    company_scope: Option<Uuid>,
    params: &ListParams,
) -> Result<BookingPage, ServiceError> {
    let cond = build_condition(ctx, company_scope, &params.filters)?;

    let total = booking::Entity::find()
        .filter(cond.clone())
        .count(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;

    let mut select = booking::Entity::find().filter(cond).find_also_related(company::Entity);
    let mut sorted = false;
    for SortKey { field, descending } in &params.sort {
        if let Some(col) = sort_column(field) {
            let order = if *descending { Order::Desc } else { Order::Asc };
            select = select.order_by(col, order);
            sorted = true;
        }
    }
    if !sorted {
        select = select.order_by(booking::Column::CreatedAt, Order::Desc);
    }

    let pairs = select
        .offset(params.offset())
        .limit(params.limit)
        .all(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;

    let rows = pairs
        .into_iter()
        .map(|(b, c)| {
            let view = BookingView { booking: b, company: c.map(CompanyBrief::from) };
            let row = serde_json::to_value(view).map_err(|e| ServiceError::Db(e.to_string()))?;
            Ok(apply_select(row, params.select.as_deref()))
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;

    Ok(BookingPage { total, links: params.links(total), rows })
}

/// Existence first, ownership second: a missing booking is NotFound even
/// for a caller who would not have been allowed to see it.
pub async fn get_booking(
    db: &DatabaseConnection,
    ctx: &AuthContext,
    id: Uuid,
) -> Result<BookingView, ServiceError> {
    let (b, c) = booking::Entity::find_by_id(id)
        .find_also_related(company::Entity)
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("booking"))?;
    authorize_record(ctx, b.user_id)?;
    Ok(BookingView { booking: b, company: c.map(CompanyBrief::from) })
}

/// Create a booking against an existing company, enforcing the per-user
/// cap. Count and insert share one transaction, which narrows (but cannot
/// fully close, under read-committed isolation) the window in which two
/// concurrent creates race past the cap.
#[instrument(skip(db, ctx), fields(user_id = %ctx.user_id, company_id = %company_id))]
pub async fn create_booking(
    db: &DatabaseConnection,
    ctx: &AuthContext,
    company_id: Uuid,
    booking_date: DateTime<FixedOffset>,
) -> Result<booking::Model, ServiceError> {
    company::Entity::find_by_id(company_id)
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("company"))?;

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;

    let existing = booking::count_for_user(&txn, ctx.user_id).await?;
    if existing >= MAX_ACTIVE_BOOKINGS {
        return Err(ServiceError::CapacityExceeded(format!(
            "user {} has already made {} bookings",
            ctx.user_id, MAX_ACTIVE_BOOKINGS
        )));
    }

    let created = booking::create(&txn, ctx.user_id, company_id, booking_date).await?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;

    info!(booking_id = %created.id, "booking_created");
    Ok(created)
}

pub async fn update_booking(
    db: &DatabaseConnection,
    ctx: &AuthContext,
    id: Uuid,
    booking_date: DateTime<FixedOffset>,
) -> Result<booking::Model, ServiceError> {
    let existing = booking::find_by_id(db, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("booking"))?;
    authorize_record(ctx, existing.user_id)?;

    let mut am: booking::ActiveModel = existing.into();
    am.booking_date = Set(booking_date);
    let updated = am.update(db).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    info!(booking_id = %updated.id, "booking_updated");
    Ok(updated)
}

pub async fn delete_booking(
    db: &DatabaseConnection,
    ctx: &AuthContext,
    id: Uuid,
) -> Result<(), ServiceError> {
    let existing = booking::find_by_id(db, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("booking"))?;
    authorize_record(ctx, existing.user_id)?;

    booking::Entity::delete_by_id(id)
        .exec(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;
    info!(booking_id = %id, "booking_deleted");
    Ok(())
}

/// Detached post-creation notification: look up the recipient and hand the
/// booking to the mailer on a spawned task. The HTTP response has already
/// gone out by the time this runs; failures are logged, never propagated.
pub fn dispatch_booking_notification(
    db: DatabaseConnection,
    mailer: Arc<dyn Mailer>,
    created: booking::Model,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let recipient = match user::Entity::find_by_id(created.user_id).one(&db).await {
            Ok(Some(u)) => u,
            Ok(None) => {
                warn!(booking_id = %created.id, user_id = %created.user_id, "notification recipient missing");
                return;
            }
            Err(e) => {
                warn!(booking_id = %created.id, error = %e, "recipient lookup failed");
                return;
            }
        };
        if let Err(e) = mailer.send_booking_confirmation(&recipient, &created).await {
            warn!(booking_id = %created.id, error = %e, "booking confirmation failed");
        }
    })
}
