//! Data models for the notifications domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Queues
// ============================================================================

/// The three bounded queues owned by the notification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// Rendered messages waiting for transport.
    Email,
    /// Single-entity change notifications waiting to be rendered.
    EntityChange,
    /// Bulk operation summaries waiting to be rendered.
    BulkOperation,
}

impl QueueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Email => "email",
            QueueKind::EntityChange => "entity_change",
            QueueKind::BulkOperation => "bulk_operation",
        }
    }
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time occupancy of one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    pub kind: QueueKind,
    /// Jobs currently buffered.
    pub queued: usize,
    /// Configured capacity.
    pub capacity: usize,
}

// ============================================================================
// Messages and jobs
// ============================================================================

/// A message ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Recipient email address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
}

impl EmailMessage {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html_body: html_body.into(),
        }
    }
}

/// A change to a single entity, reported back to the actor who made it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChangeJob {
    /// Actor display name.
    pub actor_name: String,
    /// Actor email address; the notification recipient.
    pub actor_email: String,
    /// Free-form action, e.g. "created" or "updated".
    pub action: String,
    /// Name of the affected entity.
    pub entity_name: String,
    /// When the change happened. Filled with the enqueue time when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

impl EntityChangeJob {
    pub fn new(
        actor_name: impl Into<String>,
        actor_email: impl Into<String>,
        action: impl Into<String>,
        entity_name: impl Into<String>,
    ) -> Self {
        Self {
            actor_name: actor_name.into(),
            actor_email: actor_email.into(),
            action: action.into(),
            entity_name: entity_name.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// The recorded timestamp, or now if none was set.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(Utc::now)
    }
}

/// Outcome of a batch operation, reported back to its initiator.
///
/// `success + failed <= total` is expected but not checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOperationJob {
    /// Actor display name.
    pub actor_name: String,
    /// Actor email address; the notification recipient.
    pub actor_email: String,
    /// Kind of batch, e.g. "licenses" or "obligations".
    pub operation_kind: String,
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    /// When the batch finished. Filled with the enqueue time when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

impl BulkOperationJob {
    pub fn new(
        actor_name: impl Into<String>,
        actor_email: impl Into<String>,
        operation_kind: impl Into<String>,
        total: u64,
        success: u64,
        failed: u64,
    ) -> Self {
        Self {
            actor_name: actor_name.into(),
            actor_email: actor_email.into(),
            operation_kind: operation_kind.into(),
            total,
            success,
            failed,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// The recorded timestamp, or now if none was set.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(Utc::now)
    }
}

// ============================================================================
// Template Data Types
// ============================================================================

/// Format used for timestamps in rendered emails.
pub const TIMESTAMP_FORMAT: &str = "%d %b %Y %H:%M:%S UTC";

/// Data for rendering entity change emails.
#[derive(Debug, Clone, Serialize)]
pub struct EntityChangeEmailData {
    pub actor_name: String,
    pub action: String,
    pub entity_name: String,
    pub timestamp: String,
}

impl From<&EntityChangeJob> for EntityChangeEmailData {
    fn from(job: &EntityChangeJob) -> Self {
        Self {
            actor_name: job.actor_name.clone(),
            action: job.action.clone(),
            entity_name: job.entity_name.clone(),
            timestamp: job.occurred_at().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Data for rendering bulk operation summary emails.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOperationEmailData {
    pub actor_name: String,
    pub operation_kind: String,
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub has_failures: bool,
    pub timestamp: String,
}

impl From<&BulkOperationJob> for BulkOperationEmailData {
    fn from(job: &BulkOperationJob) -> Self {
        Self {
            actor_name: job.actor_name.clone(),
            operation_kind: job.operation_kind.clone(),
            total: job.total,
            success: job.success,
            failed: job.failed,
            has_failures: job.failed > 0,
            timestamp: job.occurred_at().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}
