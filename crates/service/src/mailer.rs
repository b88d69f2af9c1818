//! Notification collaborator for booking confirmations.
//!
//! Delivery runs outside the request path; callers log failures and never
//! surface them to the client.

use async_trait::async_trait;
use models::{booking, user};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_booking_confirmation(
        &self,
        user: &user::Model,
        booking: &booking::Model,
    ) -> Result<(), MailerError>;
}

/// Default collaborator: records the delivery in the log stream. A real
/// provider is wired in by handing a different `Mailer` to the server state.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_booking_confirmation(
        &self,
        user: &user::Model,
        booking: &booking::Model,
    ) -> Result<(), MailerError> {
        info!(
            event = "booking_confirmation_sent",
            recipient = %user.email,
            booking_id = %booking.id,
            company_id = %booking.company_id,
            "booking confirmation dispatched"
        );
        Ok(())
    }
}
