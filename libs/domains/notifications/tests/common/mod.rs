//! Shared fakes for the notification service tests.

#![allow(dead_code)]

use async_trait::async_trait;
use domain_notifications::{
    BulkOperationJob, DeliveryReceipt, EmailMessage, EmailTransport, EntityChangeJob,
    NotificationConfig, NotificationError, NotificationResult, NotificationService,
    QueueCapacities, RenderedEmail, Renderer, SmtpConfig, SmtpTls, TemplateEngine,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};

/// Transport that records every message it is given.
///
/// With a gate, each delivery waits for one permit before completing, which lets a
/// test hold workers mid-delivery. Every delivery announces itself on `entered`
/// before waiting.
pub struct RecordingTransport {
    delivered: Mutex<Vec<EmailMessage>>,
    attempts: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    entered: mpsc::UnboundedSender<String>,
    fail: bool,
}

impl RecordingTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        Self::build(None, false)
    }

    /// Deliveries block until permits are added to the returned semaphore.
    pub fn gated() -> (Arc<Self>, Arc<Semaphore>, mpsc::UnboundedReceiver<String>) {
        let gate = Arc::new(Semaphore::new(0));
        let (transport, entered) = Self::build(Some(Arc::clone(&gate)), false);
        (transport, gate, entered)
    }

    /// Every delivery fails.
    pub fn failing() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        Self::build(None, true)
    }

    fn build(
        gate: Option<Arc<Semaphore>>,
        fail: bool,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (entered, entered_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            delivered: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            gate,
            entered,
            fail,
        });
        (transport, entered_rx)
    }

    pub fn delivered(&self) -> Vec<EmailMessage> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn deliver(&self, message: &EmailMessage) -> NotificationResult<DeliveryReceipt> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let _ = self.entered.send(message.subject.clone());

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        if self.fail {
            return Err(NotificationError::ProviderError("connection refused".to_string()));
        }

        self.delivered.lock().unwrap().push(message.clone());
        Ok(DeliveryReceipt::default())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Renderer that records the jobs it sees and delegates to the built-in templates.
pub struct CapturingRenderer {
    inner: TemplateEngine,
    pub entity_changes: Mutex<Vec<EntityChangeJob>>,
    pub bulk_operations: Mutex<Vec<BulkOperationJob>>,
}

impl CapturingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: TemplateEngine::new().unwrap(),
            entity_changes: Mutex::new(Vec::new()),
            bulk_operations: Mutex::new(Vec::new()),
        })
    }
}

impl Renderer for CapturingRenderer {
    fn render_entity_change(&self, job: &EntityChangeJob) -> NotificationResult<RenderedEmail> {
        self.entity_changes.lock().unwrap().push(job.clone());
        self.inner.render_entity_change(job)
    }

    fn render_bulk_operation(&self, job: &BulkOperationJob) -> NotificationResult<RenderedEmail> {
        self.bulk_operations.lock().unwrap().push(job.clone());
        self.inner.render_bulk_operation(job)
    }
}

/// Config pointing at `127.0.0.1:port`. The relay is never dialled for delivery.
pub fn test_config(port: u16) -> NotificationConfig {
    NotificationConfig::new(
        SmtpConfig::new("127.0.0.1", port, "licenses@example.com", "secret")
            .with_tls(SmtpTls::Disabled),
    )
    .with_probe_timeout(Duration::from_secs(1))
}

/// Service with `workers` email workers and every queue sized `capacity`.
pub fn service_with(
    transport: Arc<dyn EmailTransport>,
    renderer: Arc<dyn Renderer>,
    workers: usize,
    capacity: usize,
) -> NotificationService {
    let config = test_config(2525)
        .with_email_workers(workers)
        .with_capacities(QueueCapacities::uniform(capacity));
    NotificationService::with_components(config, transport, renderer)
        .expect("Failed to build notification service")
}

pub fn email_queued(depths: &[domain_notifications::QueueDepth]) -> usize {
    depths
        .iter()
        .find(|d| d.kind == domain_notifications::QueueKind::Email)
        .map(|d| d.queued)
        .unwrap_or(0)
}

/// Wait until `transport` has recorded `count` deliveries, failing after `within`.
pub async fn wait_for_deliveries(transport: &RecordingTransport, count: usize, within: Duration) {
    tokio::time::timeout(within, async {
        while transport.delivered().len() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "expected {} deliveries, got {}",
            count,
            transport.delivered().len()
        )
    });
}
