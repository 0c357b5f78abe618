//! Mail outbox processor
//!
//! Polls the outbox, claims rows one at a time, and hands them to the
//! [`Mailer`]. Delivery is at-least-once: a crash between send and mark
//! leaves the row in progress until the stuck timeout returns it to pending.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::mail::mailer::Mailer;
use crate::mail::outbox::{MailOutboxRepository, OutboxStatus};
use crate::shared::error::Result;

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub max_retries: u32,
    pub stuck_timeout: chrono::Duration,
}

impl From<&khoomi_config::MailOutboxConfig> for ProcessorConfig {
    fn from(config: &khoomi_config::MailOutboxConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(50)),
            batch_size: config.batch_size.max(1) as usize,
            max_retries: config.max_retries,
            stuck_timeout: chrono::Duration::seconds(config.stuck_timeout_secs.max(1)),
        }
    }
}

pub struct MailOutboxProcessor {
    repository: Arc<MailOutboxRepository>,
    mailer: Arc<dyn Mailer>,
    config: ProcessorConfig,
}

impl MailOutboxProcessor {
    pub fn new(repository: Arc<MailOutboxRepository>, mailer: Arc<dyn Mailer>, config: ProcessorConfig) -> Self {
        Self {
            repository,
            mailer,
            config,
        }
    }

    /// Run until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_ms = %self.config.poll_interval.as_millis(),
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            "Starting mail outbox processor"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.process_batch().await {
                Ok(0) => {}
                Ok(count) => debug!(count, "Processed mail batch"),
                Err(e) => error!(error = %e, "Error processing mail outbox"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.changed() => {}
            }
        }

        info!("Mail outbox processor stopped");
    }

    /// Drain up to one batch; returns the number of rows attempted.
    pub async fn process_batch(&self) -> Result<usize> {
        let reset = self.repository.reset_stuck(self.config.stuck_timeout).await?;
        if reset > 0 {
            warn!(count = reset, "Returned stuck mail rows to pending");
        }

        let mut attempted = 0;
        while attempted < self.config.batch_size {
            let Some(item) = self.repository.claim_next().await? else {
                break;
            };
            attempted += 1;

            match self.mailer.send(item.envelope()).await {
                Ok(()) => self.repository.mark_sent(&item.id).await?,
                Err(e) => {
                    let status = self
                        .repository
                        .mark_failed(&item, &e.to_string(), self.config.max_retries)
                        .await?;
                    if status == OutboxStatus::Failed {
                        error!(id = %item.id, kind = %item.kind, error = %e, "Mail delivery failed permanently");
                    } else {
                        warn!(id = %item.id, kind = %item.kind, error = %e, "Mail delivery failed, will retry");
                    }
                }
            }
        }

        Ok(attempted)
    }
}
