//! Worker loops that drain the notification queues.
//!
//! Two kinds of worker exist:
//!
//! - **Email workers** share the generic-email queue and hand each message to the
//!   transport. A pool of them runs concurrently.
//! - **Render workers** own one job queue each (entity change, bulk operation),
//!   render every job and push the resulting message onto the email queue.
//!
//! Every worker runs until its queue is closed and empty. Failures end the current
//! job only; the loop always continues.

use crate::error::NotificationResult;
use crate::metrics::{self, DropReason};
use crate::models::{BulkOperationJob, EmailMessage, EntityChangeJob, QueueKind};
use crate::providers::EmailTransport;
use crate::templates::{RenderedEmail, Renderer};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

/// Receiver shared by a pool of workers. The lock is held only while waiting for
/// the next message, so dequeue order stays FIFO.
pub(crate) type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// A job that is rendered into exactly one email for its actor.
pub(crate) trait NotificationJob: Send + 'static {
    /// Queue this job travels on.
    const QUEUE: QueueKind;

    /// Address the rendered email is sent to.
    fn recipient(&self) -> &str;

    fn render(&self, renderer: &dyn Renderer) -> NotificationResult<RenderedEmail>;
}

impl NotificationJob for EntityChangeJob {
    const QUEUE: QueueKind = QueueKind::EntityChange;

    fn recipient(&self) -> &str {
        &self.actor_email
    }

    fn render(&self, renderer: &dyn Renderer) -> NotificationResult<RenderedEmail> {
        renderer.render_entity_change(self)
    }
}

impl NotificationJob for BulkOperationJob {
    const QUEUE: QueueKind = QueueKind::BulkOperation;

    fn recipient(&self) -> &str {
        &self.actor_email
    }

    fn render(&self, renderer: &dyn Renderer) -> NotificationResult<RenderedEmail> {
        renderer.render_bulk_operation(self)
    }
}

/// Deliver messages from the shared email queue until it closes.
pub(crate) async fn run_email_worker(
    worker_id: usize,
    queue: SharedReceiver<EmailMessage>,
    transport: Arc<dyn EmailTransport>,
) {
    info!(worker_id, transport = transport.name(), "Email worker started");

    loop {
        let next = queue.lock().await.recv().await;
        let Some(message) = next else {
            break;
        };

        let outcome = AssertUnwindSafe(deliver(worker_id, transport.as_ref(), &message))
            .catch_unwind()
            .await;

        if outcome.is_err() {
            error!(worker_id, to = %message.to, "Email delivery panicked, message dropped");
            metrics::job_dropped(QueueKind::Email, DropReason::Panic);
        }
    }

    info!(worker_id, "Email worker stopped");
}

/// One delivery attempt. Failures are logged and the message is dropped.
async fn deliver(worker_id: usize, transport: &dyn EmailTransport, message: &EmailMessage) {
    let start = Instant::now();

    match transport.deliver(message).await {
        Ok(receipt) => {
            metrics::email_sent(start.elapsed());
            info!(
                worker_id,
                to = %message.to,
                subject = %message.subject,
                message_id = ?receipt.message_id,
                "Email sent"
            );
        }
        Err(e) => {
            metrics::email_failed(start.elapsed());
            error!(
                worker_id,
                to = %message.to,
                subject = %message.subject,
                error = %e,
                "Email delivery failed, message dropped"
            );
        }
    }
}

/// Render jobs from `queue` and forward the messages to the email queue until
/// `queue` closes.
pub(crate) async fn run_render_worker<J: NotificationJob>(
    mut queue: mpsc::Receiver<J>,
    renderer: Arc<dyn Renderer>,
    email_queue: mpsc::Sender<EmailMessage>,
) {
    let queue_kind = J::QUEUE;
    info!(queue = %queue_kind, "Render worker started");

    while let Some(job) = queue.recv().await {
        let rendered = std::panic::catch_unwind(AssertUnwindSafe(|| job.render(renderer.as_ref())));

        let message = match rendered {
            Ok(Ok(rendered)) => EmailMessage::new(job.recipient(), rendered.subject, rendered.html),
            Ok(Err(e)) => {
                metrics::render_failed(queue_kind);
                error!(queue = %queue_kind, to = %job.recipient(), error = %e, "Failed to render notification, job dropped");
                continue;
            }
            Err(_) => {
                metrics::job_dropped(queue_kind, DropReason::Panic);
                error!(queue = %queue_kind, to = %job.recipient(), "Rendering panicked, job dropped");
                continue;
            }
        };

        debug!(queue = %queue_kind, to = %message.to, subject = %message.subject, "Forwarding rendered notification");

        match email_queue.send(message).await {
            Ok(()) => metrics::job_enqueued(QueueKind::Email),
            Err(_) => {
                metrics::job_dropped(QueueKind::Email, DropReason::Closed);
                warn!(queue = %queue_kind, "Email queue closed, rendered notification dropped");
            }
        }
    }

    info!(queue = %queue_kind, "Render worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use crate::providers::{DeliveryReceipt, MockEmailTransport};
    use crate::templates::TemplateEngine;

    fn message(n: usize) -> EmailMessage {
        EmailMessage::new("ada@example.com", format!("message {}", n), "<p>Hi</p>")
    }

    #[tokio::test]
    async fn test_email_worker_continues_after_failures() {
        let mut transport = MockEmailTransport::new();
        transport.expect_name().return_const("mock");
        transport
            .expect_deliver()
            .times(3)
            .returning(|_| Err(NotificationError::ProviderError("connection refused".to_string())));

        let (tx, rx) = mpsc::channel(4);
        for n in 0..3 {
            tx.send(message(n)).await.unwrap();
        }
        drop(tx);

        run_email_worker(0, Arc::new(Mutex::new(rx)), Arc::new(transport)).await;
    }

    #[tokio::test]
    async fn test_email_worker_delivers_in_order() {
        let mut transport = MockEmailTransport::new();
        let mut seq = mockall::Sequence::new();
        transport.expect_name().return_const("mock");
        for n in 0..3 {
            let subject = format!("message {}", n);
            transport
                .expect_deliver()
                .times(1)
                .in_sequence(&mut seq)
                .withf(move |m| m.subject == subject)
                .returning(|_| Ok(DeliveryReceipt::default()));
        }

        let (tx, rx) = mpsc::channel(4);
        for n in 0..3 {
            tx.send(message(n)).await.unwrap();
        }
        drop(tx);

        run_email_worker(0, Arc::new(Mutex::new(rx)), Arc::new(transport)).await;
    }

    #[tokio::test]
    async fn test_render_worker_forwards_to_email_queue() {
        let (job_tx, job_rx) = mpsc::channel(2);
        let (email_tx, mut email_rx) = mpsc::channel(2);

        job_tx
            .send(EntityChangeJob::new("Ada", "ada@example.com", "created", "MIT"))
            .await
            .unwrap();
        drop(job_tx);

        let renderer: Arc<dyn Renderer> = Arc::new(TemplateEngine::new().unwrap());
        run_render_worker(job_rx, renderer, email_tx).await;

        let forwarded = email_rx.recv().await.unwrap();
        assert_eq!(forwarded.to, "ada@example.com");
        assert_eq!(forwarded.subject, "License created: MIT");
        assert!(email_rx.recv().await.is_none());
    }

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render_entity_change(&self, _: &EntityChangeJob) -> NotificationResult<RenderedEmail> {
            Err(NotificationError::TemplateError("missing field".to_string()))
        }

        fn render_bulk_operation(&self, job: &BulkOperationJob) -> NotificationResult<RenderedEmail> {
            if job.operation_kind == "panic" {
                panic!("renderer bug");
            }
            Ok(RenderedEmail {
                subject: job.operation_kind.clone(),
                html: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_render_worker_drops_failed_jobs() {
        let (job_tx, job_rx) = mpsc::channel(2);
        let (email_tx, mut email_rx) = mpsc::channel(2);

        job_tx
            .send(EntityChangeJob::new("Ada", "ada@example.com", "created", "MIT"))
            .await
            .unwrap();
        drop(job_tx);

        run_render_worker(job_rx, Arc::new(FailingRenderer), email_tx).await;
        assert!(email_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_render_worker_survives_panic() {
        let (job_tx, job_rx) = mpsc::channel(2);
        let (email_tx, mut email_rx) = mpsc::channel(2);

        job_tx
            .send(BulkOperationJob::new("Ada", "ada@example.com", "panic", 1, 1, 0))
            .await
            .unwrap();
        job_tx
            .send(BulkOperationJob::new("Ada", "ada@example.com", "licenses", 1, 1, 0))
            .await
            .unwrap();
        drop(job_tx);

        run_render_worker(job_rx, Arc::new(FailingRenderer), email_tx).await;

        let forwarded = email_rx.recv().await.unwrap();
        assert_eq!(forwarded.subject, "licenses");
        assert!(email_rx.recv().await.is_none());
    }
}
