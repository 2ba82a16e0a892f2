//! Notifications Domain
//!
//! In-process email notifications for license changes and bulk imports. Request
//! handlers hand jobs to bounded queues and move on; a pool of workers renders and
//! delivers them in the background.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   API Handler   │  ← send_email / queue_entity_change / queue_bulk_operation
//! └────────┬────────┘
//!          │ waits only while a queue is full
//!    ┌─────┴──────────────────┬──────────────────────┐
//! ┌──▼───────────┐   ┌────────▼────────┐   ┌─────────▼────────┐
//! │ entity_change│   │ bulk_operation  │   │      email       │
//! │    queue     │   │     queue       │   │      queue       │◄─┐
//! └──────┬───────┘   └────────┬────────┘   └─────────┬────────┘  │
//!        │                    │                      │           │
//! ┌──────▼───────┐   ┌────────▼────────┐   ┌─────────▼────────┐  │
//! │Render Worker │   │ Render Worker   │   │ Email Workers(N) │  │
//! └──────┬───────┘   └────────┬────────┘   └─────────┬────────┘  │
//!        └──────── rendered EmailMessage ────────────┼───────────┘
//!                                          ┌─────────▼────────┐
//!                                          │  EmailTransport  │  ← SMTP
//!                                          └──────────────────┘
//! ```
//!
//! Delivery is best effort: failures are logged and the message is dropped.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{EntityChangeJob, init_from_env};
//!
//! if let Some(notifications) = init_from_env()? {
//!     notifications
//!         .queue_entity_change(EntityChangeJob::new("Ada", "ada@example.com", "created", "MIT"))
//!         .await;
//!
//!     notifications.shutdown(Duration::from_secs(10)).await?;
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod providers;
pub mod service;
pub mod templates;
mod worker;

// Re-export commonly used types
pub use config::{NotificationConfig, QueueCapacities};
pub use error::{NotificationError, NotificationResult};
pub use models::{
    BulkOperationJob, EmailMessage, EntityChangeJob, QueueDepth, QueueKind, TIMESTAMP_FORMAT,
};
pub use providers::{DeliveryReceipt, EmailTransport, SmtpConfig, SmtpProvider, SmtpTls};
pub use service::{NotificationService, init_from_env, is_service_running};
pub use templates::{RenderedEmail, Renderer, TemplateEngine};
