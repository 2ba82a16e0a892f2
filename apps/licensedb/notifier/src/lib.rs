//! LicenseDB Notifier
//!
//! Command-line caller for the notification queues. Useful for checking relay
//! settings and for sending one-off notifications from scripts.
//!
//! ```text
//! licensedb-notifier probe
//! licensedb-notifier send --to ada@example.com --subject Hi --html "<p>Hi</p>"
//! licensedb-notifier entity-change --actor-name Ada --actor-email ada@example.com \
//!     --action created --entity MIT
//! licensedb-notifier bulk --actor-name Ada --actor-email ada@example.com \
//!     --kind licenses --total 10 --success 9 --failed 1
//! ```
//!
//! Every enqueue command drains the queues before exiting, so the process does not
//! end while mail is still in flight.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use core_config::Environment;
use core_config::tracing::init_tracing;
use domain_notifications::{
    BulkOperationJob, EntityChangeJob, NotificationService, init_from_env, is_service_running,
};
use eyre::{Result, WrapErr, eyre};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "licensedb-notifier")]
#[command(about = "Queue LicenseDB email notifications and check the mail relay")]
pub struct Cli {
    /// Seconds to wait for queued mail to drain before exiting
    #[arg(long, global = true, default_value_t = 10)]
    pub drain_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check whether the SMTP relay accepts connections
    Probe,

    /// Send a pre-rendered email
    Send {
        #[arg(long)]
        to: String,

        #[arg(long)]
        subject: String,

        /// HTML body
        #[arg(long)]
        html: String,
    },

    /// Notify an actor about a change to a single license
    EntityChange {
        #[arg(long)]
        actor_name: String,

        #[arg(long)]
        actor_email: String,

        /// e.g. created, updated, deleted
        #[arg(long)]
        action: String,

        #[arg(long)]
        entity: String,

        /// RFC 3339 timestamp; defaults to now
        #[arg(long)]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Send an import summary to its initiator
    Bulk {
        #[arg(long)]
        actor_name: String,

        #[arg(long)]
        actor_email: String,

        /// e.g. licenses, obligations
        #[arg(long)]
        kind: String,

        #[arg(long)]
        total: u64,

        #[arg(long)]
        success: u64,

        #[arg(long)]
        failed: u64,

        /// RFC 3339 timestamp; defaults to now
        #[arg(long)]
        timestamp: Option<DateTime<Utc>>,
    },
}

/// Parse arguments, set up logging and run the requested command.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let service = init_from_env().wrap_err("Failed to initialize notification service")?;

    execute(cli, service).await
}

/// Run one command against an optional service.
///
/// `None` means notifications are disabled: enqueue commands succeed without sending
/// and `probe` fails.
pub async fn execute(cli: Cli, service: Option<NotificationService>) -> Result<()> {
    if matches!(cli.command, Commands::Probe) {
        let reachable = is_service_running(service.as_ref()).await;
        if let Some(service) = &service {
            service.shutdown(Duration::from_secs(cli.drain_timeout_secs)).await?;
        }

        if !reachable {
            println!("unreachable");
            return Err(eyre!("SMTP relay is not reachable"));
        }
        println!("reachable");
        return Ok(());
    }

    let Some(service) = service else {
        warn!("SMTP is disabled (ENABLE_SMTP), nothing sent");
        return Ok(());
    };

    match cli.command {
        Commands::Probe => {}

        Commands::Send { to, subject, html } => {
            service.send_email(to, subject, html).await;
        }

        Commands::EntityChange {
            actor_name,
            actor_email,
            action,
            entity,
            timestamp,
        } => {
            let mut job = EntityChangeJob::new(actor_name, actor_email, action, entity);
            job.timestamp = timestamp;
            service.queue_entity_change(job).await;
        }

        Commands::Bulk {
            actor_name,
            actor_email,
            kind,
            total,
            success,
            failed,
            timestamp,
        } => {
            let mut job = BulkOperationJob::new(actor_name, actor_email, kind, total, success, failed);
            job.timestamp = timestamp;
            service.queue_bulk_operation(job).await;
        }
    }

    let drain_timeout = Duration::from_secs(cli.drain_timeout_secs);
    service
        .shutdown(drain_timeout)
        .await
        .wrap_err("Queued notifications did not drain before exit")?;

    info!("Notifications flushed");
    Ok(())
}
