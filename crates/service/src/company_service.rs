//! Company directory operations: filtered/paginated listing, CRUD, and the
//! cascading delete that removes a company's bookings with it.

use sea_orm::sea_query::SimpleExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use common::types::PageLinks;
use models::booking;
use models::company::{self, CompanyFields};

use crate::errors::ServiceError;
use crate::query::{apply_select, Filter, FilterOp, ListParams, SortKey};

/// One page of serialized rows plus the metadata the envelope needs.
#[derive(Debug)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total: u64,
    pub links: PageLinks,
}

/// Partial update; missing fields keep their current values. `tel` is
/// double-wrapped so an explicit JSON null clears it while an absent key
/// leaves it alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyUpdate {
    pub name: Option<String>,
    pub business: Option<String>,
    pub address: Option<String>,
    pub province: Option<String>,
    pub postalcode: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub tel: Option<Option<String>>,
    pub picture: Option<String>,
}

/// Maps a present-but-null field to `Some(None)` instead of `None`.
fn double_option<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(de).map(Some)
}

/// Text columns that may appear in filters. `created_at` is sort-only: a
/// string-typed bind against timestamptz would not compare meaningfully.
fn filter_column(field: &str) -> Option<company::Column> {
    use company::Column;
    Some(match field {
        "name" => Column::Name,
        "business" => Column::Business,
        "address" => Column::Address,
        "province" => Column::Province,
        "postalcode" => Column::Postalcode,
        "tel" => Column::Tel,
        "picture" => Column::Picture,
        _ => return None,
    })
}

fn sort_column(field: &str) -> Option<company::Column> {
    match field {
        "created_at" => Some(company::Column::CreatedAt),
        other => filter_column(other),
    }
}

fn filter_expr(filter: &Filter) -> Result<SimpleExpr, ServiceError> {
    let col = filter_column(&filter.field)
        .ok_or_else(|| ServiceError::Validation(format!("unknown filter field: {}", filter.field)))?;
    let value = filter.value.as_str();
    Ok(match filter.op {
        FilterOp::Eq => col.eq(value),
        FilterOp::Ne => col.ne(value),
        FilterOp::Gt => col.gt(value),
        FilterOp::Gte => col.gte(value),
        FilterOp::Lt => col.lt(value),
        FilterOp::Lte => col.lte(value),
        FilterOp::In => col.is_in(filter.values()),
    })
}

fn build_condition(filters: &[Filter]) -> Result<Condition, ServiceError> {
    let mut cond = Condition::all();
    for filter in filters {
        cond = cond.add(filter_expr(filter)?);
    }
    Ok(cond)
}

fn apply_sort(
    mut select: sea_orm::Select<company::Entity>,
    keys: &[SortKey],
) -> sea_orm::Select<company::Entity> {
    let mut applied = false;
    for key in keys {
        // Unknown sort fields are skipped rather than rejected
        if let Some(col) = sort_column(&key.field) {
            let order = if key.descending { Order::Desc } else { Order::Asc };
            select = select.order_by(col, order);
            applied = true;
        }
    }
    if !applied {
        select = select.order_by(company::Column::CreatedAt, Order::Desc);
    }
    select
}

pub async fn list_companies(db: &DatabaseConnection, params: &ListParams) -> Result<Page, ServiceError> {
    let cond = build_condition(&params.filters)?;

    let total = company::Entity::find()
        .filter(cond.clone())
        .count(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;

    let select = apply_sort(company::Entity::find().filter(cond), &params.sort);
    let companies = select
        .offset(params.offset())
        .limit(params.limit)
        .all(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;

    let rows = companies
        .into_iter()
        .map(|c| {
            let row = serde_json::to_value(c).map_err(|e| ServiceError::Db(e.to_string()))?;
            Ok(apply_select(row, params.select.as_deref()))
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;

    Ok(Page { total, links: params.links(total), rows })
}

pub async fn get_company(db: &DatabaseConnection, id: Uuid) -> Result<company::Model, ServiceError> {
    company::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("company"))
}

#[instrument(skip(db, fields), fields(name = %fields.name))]
pub async fn create_company(
    db: &DatabaseConnection,
    fields: CompanyFields,
) -> Result<company::Model, ServiceError> {
    let created = company::create(db, fields).await?;
    info!(company_id = %created.id, "company_created");
    Ok(created)
}

pub async fn update_company(
    db: &DatabaseConnection,
    id: Uuid,
    update: CompanyUpdate,
) -> Result<company::Model, ServiceError> {
    let existing = get_company(db, id).await?;

    // Merge onto the current record, then re-validate the whole thing
    let merged = CompanyFields {
        name: update.name.unwrap_or(existing.name.clone()),
        business: update.business.unwrap_or(existing.business.clone()),
        address: update.address.unwrap_or(existing.address.clone()),
        province: update.province.unwrap_or(existing.province.clone()),
        postalcode: update.postalcode.unwrap_or(existing.postalcode.clone()),
        tel: update.tel.unwrap_or_else(|| existing.tel.clone()),
        picture: update.picture.unwrap_or(existing.picture.clone()),
    };
    company::validate_fields(&merged)?;

    let mut am: company::ActiveModel = existing.into();
    am.name = Set(merged.name);
    am.business = Set(merged.business);
    am.address = Set(merged.address);
    am.province = Set(merged.province);
    am.postalcode = Set(merged.postalcode);
    am.tel = Set(merged.tel);
    am.picture = Set(merged.picture);
    let updated = am.update(db).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    info!(company_id = %updated.id, "company_updated");
    Ok(updated)
}

/// Remove a company and every booking that references it, in one
/// transaction: bookings first, then the company row. Returns how many
/// bookings were removed.
#[instrument(skip(db))]
pub async fn delete_company(db: &DatabaseConnection, id: Uuid) -> Result<u64, ServiceError> {
    // Existence check up front so a missing company is 404, not a no-op
    get_company(db, id).await?;

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;

    let removed = booking::Entity::delete_many()
        .filter(booking::Column::CompanyId.eq(id))
        .exec(&txn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .rows_affected;

    company::Entity::delete_by_id(id)
        .exec(&txn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;

    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    info!(company_id = %id, bookings_removed = removed, "company_deleted");
    Ok(removed)
}
