//! Notification service: bounded queues plus the worker pool that drains them.

use crate::config::NotificationConfig;
use crate::error::{NotificationError, NotificationResult};
use crate::metrics::{self, DropReason};
use crate::models::{BulkOperationJob, EmailMessage, EntityChangeJob, QueueDepth, QueueKind};
use crate::providers::{EmailTransport, SmtpProvider};
use crate::templates::{Renderer, TemplateEngine};
use crate::worker::{run_email_worker, run_render_worker};
use chrono::Utc;
use core_config::{FromEnv, env_flag};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Producer side of the three queues. Dropped on shutdown to close them.
#[derive(Clone, Debug)]
struct QueueSenders {
    email: mpsc::Sender<EmailMessage>,
    entity_change: mpsc::Sender<EntityChangeJob>,
    bulk_operation: mpsc::Sender<BulkOperationJob>,
}

/// Workers are detached: dropping the last handle only closes the queues, and the
/// workers exit once everything already queued has been delivered.
#[derive(Debug)]
struct ServiceInner {
    senders: RwLock<Option<QueueSenders>>,
    workers: Mutex<Option<Vec<JoinHandle<()>>>>,
    probe_host: String,
    probe_port: u16,
    probe_timeout: Duration,
}

/// Handle to the notification queues.
///
/// Cheap to clone; every clone talks to the same queues and workers. Enqueue
/// operations never report delivery results: failures after handoff are logged
/// and the job is dropped.
#[derive(Clone, Debug)]
pub struct NotificationService {
    inner: Arc<ServiceInner>,
}

impl NotificationService {
    /// Build the service with the SMTP transport and the built-in templates.
    pub fn new(config: NotificationConfig) -> NotificationResult<Self> {
        let transport = SmtpProvider::new(config.smtp.clone())?;
        let renderer = TemplateEngine::new()?;
        Self::with_components(config, Arc::new(transport), Arc::new(renderer))
    }

    /// Build the service with custom collaborators.
    ///
    /// Must be called inside a Tokio runtime; the workers are spawned onto it.
    pub fn with_components(
        config: NotificationConfig,
        transport: Arc<dyn EmailTransport>,
        renderer: Arc<dyn Renderer>,
    ) -> NotificationResult<Self> {
        config.smtp.validate()?;

        let handle = Handle::try_current().map_err(|_| {
            NotificationError::ConfigError(
                "notification service must be constructed inside a Tokio runtime".to_string(),
            )
        })?;

        let email_workers = config.email_workers.max(1);
        let capacities = config.capacities;

        let (email_tx, email_rx) = mpsc::channel(capacities.email.max(1));
        let (entity_tx, entity_rx) = mpsc::channel(capacities.entity_change.max(1));
        let (bulk_tx, bulk_rx) = mpsc::channel(capacities.bulk_operation.max(1));

        let mut workers = Vec::with_capacity(email_workers + 2);

        let email_rx = Arc::new(Mutex::new(email_rx));
        for worker_id in 0..email_workers {
            workers.push(handle.spawn(run_email_worker(
                worker_id,
                Arc::clone(&email_rx),
                Arc::clone(&transport),
            )));
        }
        workers.push(handle.spawn(run_render_worker(
            entity_rx,
            Arc::clone(&renderer),
            email_tx.clone(),
        )));
        workers.push(handle.spawn(run_render_worker(
            bulk_rx,
            Arc::clone(&renderer),
            email_tx.clone(),
        )));

        info!(
            transport = transport.name(),
            endpoint = %config.smtp.endpoint(),
            email_workers,
            email_capacity = capacities.email,
            entity_change_capacity = capacities.entity_change,
            bulk_operation_capacity = capacities.bulk_operation,
            "Notification service started"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                senders: RwLock::new(Some(QueueSenders {
                    email: email_tx,
                    entity_change: entity_tx,
                    bulk_operation: bulk_tx,
                })),
                workers: Mutex::new(Some(workers)),
                probe_host: config.smtp.host.clone(),
                probe_port: config.smtp.port,
                probe_timeout: config.probe_timeout,
            }),
        })
    }

    /// Queue a ready-made email.
    ///
    /// Waits for a free slot when the email queue is full.
    pub async fn send_email(
        &self,
        to: impl Into<String>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
    ) {
        let message = EmailMessage::new(to, subject, html_body);
        debug!(to = %message.to, subject = %message.subject, "Queueing email");

        let sender = self.senders().await.map(|s| s.email);
        push(QueueKind::Email, sender, message).await;
    }

    /// Queue a notification about a change to a single entity.
    ///
    /// An unset timestamp becomes the current time.
    pub async fn queue_entity_change(&self, mut job: EntityChangeJob) {
        job.timestamp.get_or_insert_with(Utc::now);
        debug!(
            actor = %job.actor_name,
            entity = %job.entity_name,
            action = %job.action,
            "Queueing entity change notification"
        );

        let sender = self.senders().await.map(|s| s.entity_change);
        push(QueueKind::EntityChange, sender, job).await;
    }

    /// Queue a bulk operation summary.
    ///
    /// An unset timestamp becomes the current time.
    pub async fn queue_bulk_operation(&self, mut job: BulkOperationJob) {
        job.timestamp.get_or_insert_with(Utc::now);
        debug!(
            actor = %job.actor_name,
            kind = %job.operation_kind,
            total = job.total,
            success = job.success,
            failed = job.failed,
            "Queueing bulk operation notification"
        );

        let sender = self.senders().await.map(|s| s.bulk_operation);
        push(QueueKind::BulkOperation, sender, job).await;
    }

    /// Whether the mail relay accepts TCP connections right now.
    ///
    /// A point-in-time check; always false after shutdown.
    pub async fn is_running(&self) -> bool {
        if self.inner.senders.read().await.is_none() {
            return false;
        }

        let endpoint = (self.inner.probe_host.as_str(), self.inner.probe_port);
        match tokio::time::timeout(self.inner.probe_timeout, TcpStream::connect(endpoint)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!(host = %self.inner.probe_host, port = self.inner.probe_port, error = %e, "SMTP relay unreachable");
                false
            }
            Err(_) => {
                warn!(
                    host = %self.inner.probe_host,
                    port = self.inner.probe_port,
                    timeout = ?self.inner.probe_timeout,
                    "SMTP relay probe timed out"
                );
                false
            }
        }
    }

    /// Occupancy of each queue. Empty after shutdown.
    pub async fn queue_depths(&self) -> Vec<QueueDepth> {
        let Some(senders) = self.senders().await else {
            return Vec::new();
        };

        vec![
            depth(QueueKind::Email, &senders.email),
            depth(QueueKind::EntityChange, &senders.entity_change),
            depth(QueueKind::BulkOperation, &senders.bulk_operation),
        ]
    }

    /// Close the queues and wait for the workers to drain them.
    ///
    /// Jobs already queued are still rendered and delivered. Workers still running
    /// after `drain_timeout` are aborted and their jobs lost. Calling this again is a
    /// no-op.
    pub async fn shutdown(&self, drain_timeout: Duration) -> NotificationResult<()> {
        let Some(senders) = self.inner.senders.write().await.take() else {
            debug!("Notification service already shut down");
            return Ok(());
        };
        drop(senders);

        let Some(mut workers) = self.inner.workers.lock().await.take() else {
            return Ok(());
        };

        info!(timeout = ?drain_timeout, workers = workers.len(), "Draining notification queues");

        let drained = tokio::time::timeout(drain_timeout, async {
            for worker in workers.iter_mut() {
                if let Err(e) = worker.await {
                    error!(error = %e, "Notification worker terminated abnormally");
                }
            }
        })
        .await;

        match drained {
            Ok(()) => {
                info!("Notification queues drained");
                Ok(())
            }
            Err(_) => {
                let remaining = workers.iter().filter(|w| !w.is_finished()).count();
                warn!(remaining, timeout = ?drain_timeout, "Drain timed out, aborting workers");
                for worker in &workers {
                    worker.abort();
                }
                Err(NotificationError::DrainTimeout(drain_timeout))
            }
        }
    }

    async fn senders(&self) -> Option<QueueSenders> {
        self.inner.senders.read().await.clone()
    }
}

/// Liveness check for an optional service. False when the service was never built.
pub async fn is_service_running(service: Option<&NotificationService>) -> bool {
    match service {
        Some(service) => service.is_running().await,
        None => false,
    }
}

/// Build the service from the environment.
///
/// Returns `Ok(None)` when `ENABLE_SMTP` is off; the caller then skips notifications
/// entirely. Configuration errors are returned as-is and are meant to be fatal.
pub fn init_from_env() -> NotificationResult<Option<NotificationService>> {
    if !env_flag("ENABLE_SMTP", false)? {
        info!("SMTP disabled, email notifications are off");
        return Ok(None);
    }

    let config = NotificationConfig::from_env()?;
    NotificationService::new(config).map(Some)
}

async fn push<T>(queue: QueueKind, sender: Option<mpsc::Sender<T>>, job: T) {
    let Some(sender) = sender else {
        metrics::job_dropped(queue, DropReason::Shutdown);
        warn!(queue = %queue, "Notification service is shut down, job dropped");
        return;
    };

    match sender.send(job).await {
        Ok(()) => metrics::job_enqueued(queue),
        Err(_) => {
            metrics::job_dropped(queue, DropReason::Closed);
            warn!(queue = %queue, "Queue closed, job dropped");
        }
    }
}

fn depth<T>(kind: QueueKind, sender: &mpsc::Sender<T>) -> QueueDepth {
    let capacity = sender.max_capacity();
    QueueDepth {
        kind,
        queued: capacity.saturating_sub(sender.capacity()),
        capacity,
    }
}
