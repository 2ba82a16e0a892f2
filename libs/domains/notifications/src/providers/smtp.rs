//! SMTP transport implementation using lettre.

use super::{DeliveryReceipt, EmailTransport};
use crate::error::{NotificationError, NotificationResult};
use crate::models::EmailMessage;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound on a single SMTP session.
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// How the connection to the relay is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    /// TLS from the first byte (SMTPS, usually port 465).
    Implicit,
    /// STARTTLS, failing if the relay does not offer it.
    StartTls,
    /// STARTTLS when offered, plaintext otherwise.
    Opportunistic,
    /// Plaintext only (local relays such as Mailpit).
    Disabled,
}

impl SmtpTls {
    /// Implicit TLS on 465, opportunistic STARTTLS elsewhere.
    pub fn default_for_port(port: u16) -> Self {
        if port == 465 {
            SmtpTls::Implicit
        } else {
            SmtpTls::Opportunistic
        }
    }
}

impl FromStr for SmtpTls {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "implicit" | "ssl" | "tls" => Ok(SmtpTls::Implicit),
            "starttls" | "required" => Ok(SmtpTls::StartTls),
            "opportunistic" => Ok(SmtpTls::Opportunistic),
            "none" | "plain" | "off" => Ok(SmtpTls::Disabled),
            other => Err(format!(
                "unknown TLS mode '{}' (expected implicit, starttls, opportunistic or none)",
                other
            )),
        }
    }
}

/// SMTP configuration.
#[derive(Clone)]
pub struct SmtpConfig {
    /// SMTP server host.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Sender email address.
    pub from_email: String,
    /// Optional sender display name.
    pub from_name: Option<String>,
    /// Login name; the sender address is used when unset.
    pub username: Option<String>,
    /// Sender credential.
    pub password: String,
    /// Connection security.
    pub tls: SmtpTls,
}

impl SmtpConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        from_email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            from_email: from_email.into(),
            from_name: None,
            username: None,
            password: password.into(),
            tls: SmtpTls::default_for_port(port),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = Some(name.into());
        self
    }

    pub fn with_tls(mut self, tls: SmtpTls) -> Self {
        self.tls = tls;
        self
    }

    /// Name used to authenticate against the relay.
    pub fn login(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.from_email)
    }

    /// `host:port` of the relay.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check that the configuration is structurally usable.
    pub fn validate(&self) -> NotificationResult<()> {
        if self.host.trim().is_empty() {
            return Err(NotificationError::ConfigError("SMTP host is required".to_string()));
        }
        if self.port == 0 {
            return Err(NotificationError::ConfigError("SMTP port must be non-zero".to_string()));
        }
        if self.from_email.trim().is_empty() {
            return Err(NotificationError::ConfigError(
                "SMTP sender address is required".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(NotificationError::ConfigError(
                "SMTP sender credential is required".to_string(),
            ));
        }
        self.from_email.parse::<Address>()?;
        Ok(())
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tls", &self.tls)
            .finish()
    }
}

/// SMTP mail transport.
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: Arc<SmtpConfig>,
}

impl SmtpProvider {
    /// Validate the configuration and build the transport. Does not connect.
    pub fn new(config: SmtpConfig) -> NotificationResult<Self> {
        config.validate()?;
        let transport = Self::build_transport(&config)?;
        Ok(Self {
            transport,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    fn build_transport(
        config: &SmtpConfig,
    ) -> NotificationResult<AsyncSmtpTransport<Tokio1Executor>> {
        let relay_error = |e: lettre::transport::smtp::Error| {
            NotificationError::ConfigError(format!("Failed to create SMTP relay: {}", e))
        };

        let builder = match config.tls {
            SmtpTls::Implicit => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host).map_err(relay_error)?
            }
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(relay_error)?,
            SmtpTls::Opportunistic => {
                let parameters = TlsParameters::new(config.host.clone()).map_err(relay_error)?;
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                    .tls(Tls::Opportunistic(parameters))
            }
            SmtpTls::Disabled => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };

        let credentials = Credentials::new(config.login().to_string(), config.password.clone());

        Ok(builder
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(SEND_TIMEOUT))
            .build())
    }

    /// Build a lettre Message from an EmailMessage.
    fn build_message(&self, message: &EmailMessage) -> NotificationResult<Message> {
        let from = Mailbox::new(self.config.from_name.clone(), self.config.from_email.parse()?);

        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| NotificationError::InvalidEmail(format!("'{}': {}", message.to, e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(&message.subject)
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())
            .map_err(|e| NotificationError::ProviderError(format!("Failed to build email message: {}", e)))
    }
}

#[async_trait]
impl EmailTransport for SmtpProvider {
    async fn deliver(&self, message: &EmailMessage) -> NotificationResult<DeliveryReceipt> {
        debug!(
            to = %message.to,
            subject = %message.subject,
            host = %self.config.host,
            port = %self.config.port,
            "Sending email via SMTP"
        );

        let email = self.build_message(message)?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| NotificationError::ProviderError(format!("SMTP send failed: {}", e)))?;

        let message_id = response.message().next().map(|s| s.to_string());

        info!(
            to = %message.to,
            message_id = ?message_id,
            "SMTP relay accepted message"
        );

        Ok(DeliveryReceipt { message_id })
    }

    fn name(&self) -> &'static str {
        "SMTP"
    }
}
