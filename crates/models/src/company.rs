use chrono::Utc;
use sea_orm::{entity::prelude::*, DatabaseConnection, Set, SqlErr};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking;
use crate::errors::ModelError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "company")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub business: String,
    pub address: String,
    pub province: String,
    pub postalcode: String,
    pub tel: Option<String>,
    pub picture: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Bookings,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Bookings => Entity::has_many(booking::Entity).into(),
        }
    }
}

impl Related<booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Writable fields of a company record; `id`/`created_at` are server-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyFields {
    pub name: String,
    pub business: String,
    pub address: String,
    pub province: String,
    pub postalcode: String,
    #[serde(default)]
    pub tel: Option<String>,
    pub picture: String,
}

pub fn validate_fields(fields: &CompanyFields) -> Result<(), ModelError> {
    if fields.name.trim().is_empty() {
        return Err(ModelError::Validation("name required".into()));
    }
    if fields.name.chars().count() > 50 {
        return Err(ModelError::Validation("name cannot be more than 50 characters".into()));
    }
    if fields.business.trim().is_empty() {
        return Err(ModelError::Validation("business description required".into()));
    }
    if fields.address.trim().is_empty() {
        return Err(ModelError::Validation("address required".into()));
    }
    if fields.province.trim().is_empty() {
        return Err(ModelError::Validation("province required".into()));
    }
    if fields.postalcode.trim().is_empty() {
        return Err(ModelError::Validation("postalcode required".into()));
    }
    if fields.postalcode.chars().count() > 5 {
        return Err(ModelError::Validation("postalcode cannot be more than 5 digits".into()));
    }
    if fields.picture.trim().is_empty() {
        return Err(ModelError::Validation("picture URL required".into()));
    }
    Ok(())
}

pub async fn create(db: &DatabaseConnection, fields: CompanyFields) -> Result<Model, ModelError> {
    validate_fields(&fields)?;
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(fields.name),
        business: Set(fields.business),
        address: Set(fields.address),
        province: Set(fields.province),
        postalcode: Set(fields.postalcode),
        tel: Set(fields.tel),
        picture: Set(fields.picture),
        created_at: Set(Utc::now().into()),
    };
    // A duplicate name trips the unique constraint; that's the client's
    // fault, not the database's
    am.insert(db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ModelError::Validation("company name already exists".into())
        }
        _ => ModelError::Db(e.to_string()),
    })
}
