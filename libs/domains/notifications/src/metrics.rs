//! Metrics for the notification queues and workers.
//!
//! Emitted through the `metrics` facade. Without an installed recorder every call
//! is a no-op, so binaries decide whether and where to export them.

use crate::models::QueueKind;
use metrics::{counter, histogram};
use std::time::Duration;

/// Why a job left the pipeline without being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Enqueue attempted after shutdown.
    Shutdown,
    /// The queue closed while the job was waiting for a slot.
    Closed,
    /// The job panicked while being processed.
    Panic,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Shutdown => "shutdown",
            DropReason::Closed => "closed",
            DropReason::Panic => "panic",
        }
    }
}

/// Record a job accepted onto a queue.
pub fn job_enqueued(queue: QueueKind) {
    counter!("notifications_jobs_enqueued_total", "queue" => queue.as_str()).increment(1);
}

/// Record a job dropped before delivery.
pub fn job_dropped(queue: QueueKind, reason: DropReason) {
    counter!(
        "notifications_jobs_dropped_total",
        "queue" => queue.as_str(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record a message accepted by the transport.
pub fn email_sent(duration: Duration) {
    counter!("notifications_emails_sent_total").increment(1);
    histogram!("notifications_delivery_duration_seconds", "status" => "success")
        .record(duration.as_secs_f64());
}

/// Record a message the transport failed to deliver.
pub fn email_failed(duration: Duration) {
    counter!("notifications_emails_failed_total").increment(1);
    histogram!("notifications_delivery_duration_seconds", "status" => "failure")
        .record(duration.as_secs_f64());
}

/// Record a job whose template failed to render.
pub fn render_failed(queue: QueueKind) {
    counter!("notifications_render_failures_total", "queue" => queue.as_str()).increment(1);
}
