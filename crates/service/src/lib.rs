//! Service layer providing business-oriented operations on top of models.
//! - Separates business logic from data access.
//! - Reuses validation and entity definitions in `models` crate.
//! - Provides clear error types and documented interfaces.

pub mod access;
pub mod auth_service;
pub mod booking_service;
pub mod company_service;
pub mod errors;
pub mod mailer;
pub mod query;
#[cfg(test)]
pub mod test_support;
