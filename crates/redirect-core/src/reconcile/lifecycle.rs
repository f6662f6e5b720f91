//! User lifecycle reconciler
//!
//! Walks users in ascending id order, one per tick, moving free-tier
//! accounts through trial, lock warning and lock. The cursor holds the last
//! processed id; it only advances once every transition for that user
//! succeeded, so a failed send is retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::LifecycleConfig;
use crate::error::{Result, with_timeout};
use crate::metrics::{LifecycleTransition, record_lifecycle_transition};
use crate::reconcile::{Reconciler, ReconcilerHandle, ReconcilerTask};
use crate::traits::{CursorStore, DomainRemover, Mailer, UserStore};

/// What one lifecycle tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// Scan exhausted, cursor reset to zero
    Wrapped,
    /// The id vanished between the scan and the load
    Missing { user_id: i64 },
    /// Subscribed or already locked
    Exempt { user_id: i64 },
    /// Transitions that fired, possibly none
    Processed {
        user_id: i64,
        transitions: Vec<LifecycleTransition>,
    },
}

pub struct LifecycleReconciler {
    users: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    remover: Arc<dyn DomainRemover>,
    cursor: Arc<dyn CursorStore<i64>>,
    config: LifecycleConfig,
    mail_timeout: Duration,
}

impl LifecycleReconciler {
    pub fn new(
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        remover: Arc<dyn DomainRemover>,
        cursor: Arc<dyn CursorStore<i64>>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            users,
            mailer,
            remover,
            cursor,
            config,
            mail_timeout: Duration::ZERO,
        }
    }

    pub fn with_mail_timeout(mut self, timeout: Duration) -> Self {
        self.mail_timeout = timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Spawn the loop, or return `None` when the lifecycle is disabled
    pub fn start(self: Arc<Self>) -> Option<ReconcilerHandle> {
        if !self.config.enabled {
            warn!("User lifecycle reconciler is disabled");
            return None;
        }
        let interval = self.config.interval();
        Some(ReconcilerTask::new(self, interval).spawn())
    }

    /// Process the user after the cursor
    pub async fn process(&self, now: DateTime<Utc>) -> Result<LifecycleOutcome> {
        let after = self.cursor.get().await?;

        let Some(user_id) = self.users.find_next_user_id_after(after).await? else {
            self.cursor.set(0).await?;
            debug!(after, "User scan exhausted, restarting from the first user");
            return Ok(LifecycleOutcome::Wrapped);
        };

        let Some(mut user) = self.users.find_user_by_id(user_id).await? else {
            warn!(user_id, "User disappeared before processing");
            self.cursor.set(user_id).await?;
            return Ok(LifecycleOutcome::Missing { user_id });
        };

        if user.is_lifecycle_exempt() {
            debug!(user_id, subscribed = user.is_subscribed(), locked = user.is_locked(), "User exempt from lifecycle");
            self.cursor.set(user_id).await?;
            return Ok(LifecycleOutcome::Exempt { user_id });
        }

        let mut transitions = Vec::new();

        if user.is_ready_for_trial_email() {
            self.send("mail.send_trial", self.mailer.send_trial(&user.email)).await?;
            user.mark_trial_email_sent();
            self.users.update_user(&user).await?;
            record_lifecycle_transition(LifecycleTransition::Trial);
            info!(user_id, "Trial email sent");
            transitions.push(LifecycleTransition::Trial);
        }

        if user.is_ready_for_lock_email(now, self.config.lock_warning_after()) {
            self.send("mail.send_account_lock_soon", self.mailer.send_account_lock_soon(&user.email))
                .await?;
            user.mark_lock_email_sent();
            self.users.update_user(&user).await?;
            record_lifecycle_transition(LifecycleTransition::Warn);
            info!(user_id, registered_at = %user.registered_at, "Lock warning sent");
            transitions.push(LifecycleTransition::Warn);
        }

        if user.is_ready_for_lock(now, self.config.lock_after()) {
            self.remover.delete_all_domains(user_id).await?;
            user.lock();
            self.users.update_user(&user).await?;
            self.send("mail.send_account_locked", self.mailer.send_account_locked(&user.email))
                .await?;
            record_lifecycle_transition(LifecycleTransition::Lock);
            info!(user_id, registered_at = %user.registered_at, "Account locked");
            transitions.push(LifecycleTransition::Lock);
        }

        self.cursor.set(user_id).await?;
        Ok(LifecycleOutcome::Processed {
            user_id,
            transitions,
        })
    }

    async fn send<F>(&self, operation: &str, fut: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        with_timeout(operation, self.mail_timeout, fut).await
    }
}

#[async_trait]
impl Reconciler for LifecycleReconciler {
    fn name(&self) -> &'static str {
        "user-lifecycle"
    }

    async fn on_start(&self) {
        match self.cursor.get().await {
            Ok(after) => info!(after, "Resuming user scan"),
            Err(e) => warn!("Unable to read lifecycle cursor: {}", e),
        }
    }

    async fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        self.process(now).await.map(|_| ())
    }
}
