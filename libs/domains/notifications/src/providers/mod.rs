//! Mail transport implementations.
//!
//! This module contains the `EmailTransport` trait used by the email workers and the
//! SMTP implementation backed by lettre.

mod smtp;

pub use smtp::{SmtpConfig, SmtpProvider, SmtpTls};

use crate::error::NotificationResult;
use crate::models::EmailMessage;
use async_trait::async_trait;

/// Acknowledgement returned by a transport after a successful delivery.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReceipt {
    /// Provider-specific message ID, when the relay reports one.
    pub message_id: Option<String>,
}

/// Trait for outbound mail transports.
///
/// Implementations may be slow and may fail. The service never retries; a failed
/// delivery is logged and the message is dropped.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Attempt delivery of one message.
    async fn deliver(&self, message: &EmailMessage) -> NotificationResult<DeliveryReceipt>;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}
