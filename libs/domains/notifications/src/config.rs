//! Service configuration.
//!
//! Everything here is fixed at construction. Values are normally read from the
//! environment via [`FromEnv`]; tests build them directly.

use crate::providers::{SmtpConfig, SmtpTls};
use core_config::{ConfigError, FromEnv, env_parse, env_required};
use std::time::Duration;

/// Default number of generic-email workers.
pub const DEFAULT_EMAIL_WORKERS: usize = 5;
/// Default capacity of each queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
/// Default connect timeout for the liveness probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
/// Shortest connect timeout the liveness check accepts.
pub const MIN_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Capacity of each of the three queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCapacities {
    pub email: usize,
    pub entity_change: usize,
    pub bulk_operation: usize,
}

impl QueueCapacities {
    /// Same capacity for every queue.
    pub fn uniform(capacity: usize) -> Self {
        Self {
            email: capacity,
            entity_change: capacity,
            bulk_operation: capacity,
        }
    }

    /// Channels cannot be zero-sized.
    fn clamped(self) -> Self {
        Self {
            email: self.email.max(1),
            entity_change: self.entity_change.max(1),
            bulk_operation: self.bulk_operation.max(1),
        }
    }
}

impl Default for QueueCapacities {
    fn default() -> Self {
        Self::uniform(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Configuration for the notification service.
///
/// There is no disabled mode: `ENABLE_SMTP` is checked by [`crate::init_from_env`]
/// before any of this is read.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Mail relay settings.
    pub smtp: SmtpConfig,
    /// Number of generic-email workers.
    pub email_workers: usize,
    /// Queue capacities.
    pub capacities: QueueCapacities,
    /// Connect timeout used by the liveness probe.
    pub probe_timeout: Duration,
}

impl NotificationConfig {
    pub fn new(smtp: SmtpConfig) -> Self {
        Self {
            smtp,
            email_workers: DEFAULT_EMAIL_WORKERS,
            capacities: QueueCapacities::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Set the email worker pool size (at least one).
    pub fn with_email_workers(mut self, count: usize) -> Self {
        self.email_workers = count.max(1);
        self
    }

    /// Set the queue capacities (each at least one).
    pub fn with_capacities(mut self, capacities: QueueCapacities) -> Self {
        self.capacities = capacities.clamped();
        self
    }

    /// Set the liveness connect timeout (at least one second).
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout.max(MIN_PROBE_TIMEOUT);
        self
    }
}

impl FromEnv for NotificationConfig {
    /// Reads:
    /// - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USER`, `SMTP_PASSWORD`: required
    /// - `SMTP_USERNAME`, `SMTP_FROM_NAME`, `SMTP_TLS`: optional
    /// - `EMAIL_WORKER_POOL_SIZE`: default 5
    /// - `EMAIL_QUEUE_CAPACITY`, `ENTITY_CHANGE_QUEUE_CAPACITY`,
    ///   `BULK_OPERATION_QUEUE_CAPACITY`: default 100
    /// - `SMTP_PROBE_TIMEOUT_SECS`: default 2, at least 1
    fn from_env() -> Result<Self, ConfigError> {
        let host = env_required("SMTP_HOST")?;
        let port: u16 = env_required("SMTP_PORT")?
            .trim()
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "SMTP_PORT".to_string(),
                details: format!("{}", e),
            })?;
        let from_email = env_required("SMTP_USER")?;
        let password = env_required("SMTP_PASSWORD")?;

        let mut smtp = SmtpConfig::new(host, port, from_email, password);
        if let Ok(username) = std::env::var("SMTP_USERNAME") {
            if !username.trim().is_empty() {
                smtp = smtp.with_username(username);
            }
        }
        if let Ok(name) = std::env::var("SMTP_FROM_NAME") {
            if !name.trim().is_empty() {
                smtp = smtp.with_from_name(name);
            }
        }
        let default_tls = SmtpTls::default_for_port(port);
        smtp = smtp.with_tls(env_parse("SMTP_TLS", default_tls)?);

        let default_capacity = DEFAULT_QUEUE_CAPACITY;
        let capacities = QueueCapacities {
            email: env_parse("EMAIL_QUEUE_CAPACITY", default_capacity)?,
            entity_change: env_parse("ENTITY_CHANGE_QUEUE_CAPACITY", default_capacity)?,
            bulk_operation: env_parse("BULK_OPERATION_QUEUE_CAPACITY", default_capacity)?,
        };

        Ok(NotificationConfig::new(smtp)
            .with_email_workers(env_parse("EMAIL_WORKER_POOL_SIZE", DEFAULT_EMAIL_WORKERS)?)
            .with_capacities(capacities)
            .with_probe_timeout(Duration::from_secs(env_parse(
                "SMTP_PROBE_TIMEOUT_SECS",
                DEFAULT_PROBE_TIMEOUT.as_secs(),
            )?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [(&str, Option<&str>); 4] = [
        ("SMTP_HOST", Some("smtp.example.com")),
        ("SMTP_PORT", Some("587")),
        ("SMTP_USER", Some("licenses@example.com")),
        ("SMTP_PASSWORD", Some("hunter2")),
    ];

    const OPTIONAL_UNSET: [(&str, Option<&str>); 9] = [
        ("SMTP_USERNAME", None),
        ("SMTP_FROM_NAME", None),
        ("SMTP_TLS", None),
        ("EMAIL_WORKER_POOL_SIZE", None),
        ("EMAIL_QUEUE_CAPACITY", None),
        ("ENTITY_CHANGE_QUEUE_CAPACITY", None),
        ("BULK_OPERATION_QUEUE_CAPACITY", None),
        ("SMTP_PROBE_TIMEOUT_SECS", None),
        ("APP_ENV", None),
    ];

    fn with_env<F: FnOnce()>(overrides: &[(&str, Option<&str>)], f: F) {
        let mut vars: Vec<(&str, Option<&str>)> = REQUIRED.to_vec();
        vars.extend_from_slice(&OPTIONAL_UNSET);
        for (key, value) in overrides {
            vars.retain(|(k, _)| k != key);
            vars.push((*key, *value));
        }
        temp_env::with_vars(vars, f);
    }

    #[test]
    fn test_from_env_defaults() {
        with_env(&[], || {
            let config = NotificationConfig::from_env().unwrap();
            assert_eq!(config.smtp.host, "smtp.example.com");
            assert_eq!(config.smtp.port, 587);
            assert_eq!(config.smtp.from_email, "licenses@example.com");
            assert_eq!(config.smtp.login(), "licenses@example.com");
            assert_eq!(config.smtp.tls, SmtpTls::Opportunistic);
            assert_eq!(config.email_workers, 5);
            assert_eq!(config.capacities, QueueCapacities::uniform(100));
            assert_eq!(config.probe_timeout, Duration::from_secs(2));
        });
    }

    #[test]
    fn test_from_env_overrides() {
        with_env(
            &[
                ("SMTP_PORT", Some("465")),
                ("SMTP_USERNAME", Some("relay-login")),
                ("EMAIL_WORKER_POOL_SIZE", Some("2")),
                ("BULK_OPERATION_QUEUE_CAPACITY", Some("7")),
            ],
            || {
                let config = NotificationConfig::from_env().unwrap();
                assert_eq!(config.smtp.tls, SmtpTls::Implicit);
                assert_eq!(config.smtp.login(), "relay-login");
                assert_eq!(config.email_workers, 2);
                assert_eq!(config.capacities.bulk_operation, 7);
                assert_eq!(config.capacities.email, 100);
            },
        );
    }

    #[test]
    fn test_from_env_missing_password() {
        with_env(&[("SMTP_PASSWORD", None)], || {
            let err = NotificationConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("SMTP_PASSWORD"));
        });
    }

    #[test]
    fn test_from_env_invalid_port() {
        with_env(&[("SMTP_PORT", Some("smtp"))], || {
            let err = NotificationConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::ParseError { ref key, .. } if key == "SMTP_PORT"));
        });
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        with_env(
            &[
                ("EMAIL_WORKER_POOL_SIZE", Some("0")),
                ("EMAIL_QUEUE_CAPACITY", Some("0")),
            ],
            || {
                let config = NotificationConfig::from_env().unwrap();
                assert_eq!(config.email_workers, 1);
                assert_eq!(config.capacities.email, 1);
            },
        );
    }

    #[test]
    fn test_zero_connect_timeout_is_clamped() {
        with_env(&[("SMTP_PROBE_TIMEOUT_SECS", Some("0"))], || {
            let config = NotificationConfig::from_env().unwrap();
            assert_eq!(config.probe_timeout, Duration::from_secs(1));
        });
    }

    #[test]
    fn test_builder_clamps_connect_timeout() {
        let smtp = SmtpConfig::new("smtp.example.com", 587, "licenses@example.com", "hunter2");
        let config = NotificationConfig::new(smtp.clone()).with_probe_timeout(Duration::ZERO);
        assert_eq!(config.probe_timeout, MIN_PROBE_TIMEOUT);

        let config = NotificationConfig::new(smtp).with_probe_timeout(Duration::from_secs(5));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
    }
}
