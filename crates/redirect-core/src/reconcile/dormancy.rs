//! Dormancy reconciler
//!
//! Parks the DNS of domains whose device stopped reporting for longer than
//! the configured window. Selection is recomputed from the clock each tick:
//! the store returns the single domain with the oldest update before the
//! window, so a starving domain is picked again until it is handled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use tracing::{debug, info, warn};

use crate::config::DormancyConfig;
use crate::dns::DnsSynchronizer;
use crate::error::{Error, Result, with_timeout};
use crate::metrics::{record_domain_clean, record_domain_clean_error};
use crate::reconcile::{Reconciler, ReconcilerHandle, ReconcilerTask};
use crate::traits::{CursorStore, DomainStore, Mailer, UserStore};

/// What one dormancy tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DormancyOutcome {
    /// No domain past the window
    Idle,
    /// Owner pays; only the timestamp was refreshed
    Exempt { domain: String },
    /// DNS parked and addresses cleared
    Cleaned { domain: String },
}

pub struct DormancyReconciler {
    domains: Arc<dyn DomainStore>,
    users: Arc<dyn UserStore>,
    dns: Arc<DnsSynchronizer>,
    mailer: Arc<dyn Mailer>,
    cursor: Arc<dyn CursorStore<DateTime<Utc>>>,
    config: DormancyConfig,
    mail_timeout: Duration,
}

impl DormancyReconciler {
    pub fn new(
        domains: Arc<dyn DomainStore>,
        users: Arc<dyn UserStore>,
        dns: Arc<DnsSynchronizer>,
        mailer: Arc<dyn Mailer>,
        cursor: Arc<dyn CursorStore<DateTime<Utc>>>,
        config: DormancyConfig,
    ) -> Self {
        Self {
            domains,
            users,
            dns,
            mailer,
            cursor,
            config,
            mail_timeout: Duration::ZERO,
        }
    }

    pub fn with_mail_timeout(mut self, timeout: Duration) -> Self {
        self.mail_timeout = timeout;
        self
    }

    /// Spawn the loop on the configured interval
    pub fn start(self: Arc<Self>) -> ReconcilerHandle {
        let interval = self.config.interval();
        ReconcilerTask::new(self, interval).spawn()
    }

    /// Start of the dormancy window relative to `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        now.checked_sub_months(Months::new(self.config.window_months))
            .ok_or_else(|| Error::config("dormancy window reaches before the representable range"))
    }

    /// Handle the most dormant domain, if any
    pub async fn clean(&self, now: DateTime<Utc>) -> Result<DormancyOutcome> {
        let before = self.window_start(now)?;
        let Some(mut domain) = self.domains.find_domain_with_oldest_update_before(before).await? else {
            debug!(before = %before, "No dormant domains");
            return Ok(DormancyOutcome::Idle);
        };

        // The store may race a device update; trust only what we loaded
        if !domain.is_dormant(before) {
            debug!(domain = %domain.name, "Domain was refreshed, skipping");
            return Ok(DormancyOutcome::Idle);
        }

        let owner = self.users.find_user_by_id(domain.user_id).await?;

        if owner.as_ref().is_some_and(|user| user.is_subscribed()) {
            domain.last_update = Some(now);
            self.domains.update_domain(&domain).await?;
            info!(domain = %domain.name, user_id = domain.user_id, "Subscribed owner, postponing dormancy check");
            return Ok(DormancyOutcome::Exempt { domain: domain.name });
        }

        record_domain_clean();
        self.dns.retire(&domain).await?;
        domain.clear_addresses();

        match &owner {
            Some(user) => {
                let sent = with_timeout(
                    "mail.send_dns_clean_notification",
                    self.mail_timeout,
                    self.mailer.send_dns_clean_notification(&user.email, &domain.name),
                )
                .await;
                if let Err(e) = sent {
                    warn!(domain = %domain.name, user_id = user.id, "Unable to send dns clean notification: {}", e);
                }
            }
            None => {
                warn!(domain = %domain.name, user_id = domain.user_id, "Domain owner not found, skipping notification");
            }
        }

        domain.last_update = Some(now);
        self.domains.update_domain(&domain).await?;

        info!(domain = %domain.name, user_id = domain.user_id, last_update = ?domain.last_update, "Parked dormant domain");
        Ok(DormancyOutcome::Cleaned { domain: domain.name })
    }
}

#[async_trait]
impl Reconciler for DormancyReconciler {
    fn name(&self) -> &'static str {
        "dormancy"
    }

    async fn on_start(&self) {
        match self.cursor.get().await {
            Ok(last) if last == DateTime::<Utc>::UNIX_EPOCH => {
                info!("No previous dormancy sweep recorded");
            }
            Ok(last) => info!(window = %last, "Last dormancy sweep window"),
            Err(e) => warn!("Unable to read dormancy cursor: {}", e),
        }
    }

    /// Clean one domain, then record the swept window even if cleaning failed
    async fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        let cleaned = self.clean(now).await;
        if cleaned.is_err() {
            record_domain_clean_error();
        }

        let recorded = match self.window_start(now) {
            Ok(before) => self.cursor.set(before).await,
            Err(e) => Err(e),
        };

        cleaned?;
        recorded
    }
}
