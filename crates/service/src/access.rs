//! Request principal and the ownership/role gate applied before mutations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Result<Self, ServiceError> {
        match s {
            models::user::ROLE_USER => Ok(Role::User),
            models::user::ROLE_ADMIN => Ok(Role::Admin),
            other => Err(ServiceError::Validation(format!("unknown role: {other}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => models::user::ROLE_USER,
            Role::Admin => models::user::ROLE_ADMIN,
        }
    }
}

/// Acting principal, built once by the auth middleware and passed explicitly
/// into every service call. Never re-derived downstream.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub email: String,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Grants access iff the principal is an admin or owns the target record.
/// Callers must check existence first so NotFound wins over Unauthorized.
pub fn authorize_record(ctx: &AuthContext, owner_id: Uuid) -> Result<(), ServiceError> {
    if ctx.is_admin() || ctx.user_id == owner_id {
        return Ok(());
    }
    Err(ServiceError::Unauthorized(format!(
        "user {} is not authorized to access this record",
        ctx.user_id
    )))
}
