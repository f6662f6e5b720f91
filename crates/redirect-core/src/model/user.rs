use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Account owner
///
/// Free-tier accounts move strictly forward through
/// created → trial email sent → lock warning sent → locked.
/// A subscription exempts the account from that progression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub active: bool,
    /// Present for paying accounts
    pub subscription_id: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub trial_email_sent: bool,
    pub lock_email_sent: bool,
    pub locked: bool,
}

impl User {
    pub fn is_subscribed(&self) -> bool {
        self.subscription_id.is_some()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Subscribed and locked accounts are left alone by the lifecycle loop
    pub fn is_lifecycle_exempt(&self) -> bool {
        self.is_subscribed() || self.is_locked()
    }

    /// Time elapsed since registration, zero if the clock is behind it
    pub fn registered_for(&self, now: DateTime<Utc>) -> Duration {
        let elapsed = now.signed_duration_since(self.registered_at);
        elapsed.max(Duration::zero())
    }

    pub fn is_ready_for_trial_email(&self) -> bool {
        !self.trial_email_sent
    }

    pub fn is_ready_for_lock_email(&self, now: DateTime<Utc>, after: Duration) -> bool {
        !self.lock_email_sent && self.registered_for(now) >= after
    }

    pub fn is_ready_for_lock(&self, now: DateTime<Utc>, after: Duration) -> bool {
        !self.locked && self.registered_for(now) >= after
    }

    pub fn mark_trial_email_sent(&mut self) {
        self.trial_email_sent = true;
    }

    pub fn mark_lock_email_sent(&mut self) {
        self.lock_email_sent = true;
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }
}
