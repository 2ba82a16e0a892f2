//! Error types for the notifications domain.

use std::time::Duration;
use thiserror::Error;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in the notifications domain.
///
/// Only construction and shutdown surface these to callers. Failures inside worker
/// tasks are logged and terminate the affected job, never the worker.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Transport or service configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Template registration or rendering failed.
    #[error("Template rendering error: {0}")]
    TemplateError(String),

    /// The mail transport rejected or failed to deliver a message.
    #[error("Email provider error: {0}")]
    ProviderError(String),

    /// A sender or recipient address could not be parsed.
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Workers did not finish draining before the shutdown deadline.
    #[error("Workers did not drain within {0:?}")]
    DrainTimeout(Duration),
}

impl From<core_config::ConfigError> for NotificationError {
    fn from(err: core_config::ConfigError) -> Self {
        NotificationError::ConfigError(err.to_string())
    }
}

impl From<handlebars::RenderError> for NotificationError {
    fn from(err: handlebars::RenderError) -> Self {
        NotificationError::TemplateError(err.to_string())
    }
}

impl From<handlebars::TemplateError> for NotificationError {
    fn from(err: handlebars::TemplateError) -> Self {
        NotificationError::TemplateError(err.to_string())
    }
}

impl From<lettre::address::AddressError> for NotificationError {
    fn from(err: lettre::address::AddressError) -> Self {
        NotificationError::InvalidEmail(err.to_string())
    }
}
