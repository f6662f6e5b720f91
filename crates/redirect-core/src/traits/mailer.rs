// # Mailer Trait
//
// Lifecycle and dormancy notifications. Delivery is at-least-once: a failed
// tick may resend, duplicates are tolerated.

use async_trait::async_trait;

/// Outgoing notification mail
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Tell the owner that DNS for `domain` was retired after dormancy
    async fn send_dns_clean_notification(&self, to: &str, domain: &str) -> Result<(), crate::Error>;

    /// Welcome a new free-tier account to its trial
    async fn send_trial(&self, to: &str) -> Result<(), crate::Error>;

    /// Warn that the account will be locked soon
    async fn send_account_lock_soon(&self, to: &str) -> Result<(), crate::Error>;

    /// Confirm the account was locked and its domains removed
    async fn send_account_locked(&self, to: &str) -> Result<(), crate::Error>;
}
