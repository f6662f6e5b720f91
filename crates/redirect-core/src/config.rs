//! Configuration types for the redirect core
//!
//! This module defines all configuration structures used throughout the crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main redirect configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedirectConfig {
    /// DNS publication settings
    #[serde(default)]
    pub dns: DnsConfig,

    /// Domain dormancy loop
    #[serde(default)]
    pub dormancy: DormancyConfig,

    /// User lifecycle loop
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Notification delivery
    #[serde(default)]
    pub mail: MailConfig,

    /// Domain services
    pub service: ServiceConfig,

    /// Where the dormancy loop records its last window
    #[serde(default)]
    pub dormancy_cursor: CursorStoreConfig,

    /// Where the lifecycle loop records its last user id
    #[serde(default)]
    pub lifecycle_cursor: CursorStoreConfig,
}

impl RedirectConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.dns.validate()?;
        self.dormancy.validate()?;
        self.lifecycle.validate()?;
        self.service.validate()?;
        self.dormancy_cursor.validate()?;
        self.lifecycle_cursor.validate()?;
        Ok(())
    }
}

/// DNS publication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// TTL of every published record set (in seconds)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u32,

    /// TTL of ACME challenge records (in seconds)
    #[serde(default = "default_challenge_ttl_secs")]
    pub challenge_ttl_secs: u32,

    /// Maximum length of one TXT character-string
    ///
    /// Set to 0 to publish DKIM values unsplit.
    #[serde(default = "default_txt_chunk_limit")]
    pub txt_chunk_limit: usize,

    /// Upper bound for a single provider call (in seconds, 0 disables)
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl DnsConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ttl_secs == 0 {
            return Err(crate::Error::config("DNS ttl must be > 0"));
        }
        if self.challenge_ttl_secs == 0 {
            return Err(crate::Error::config("challenge ttl must be > 0"));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            challenge_ttl_secs: default_challenge_ttl_secs(),
            txt_chunk_limit: default_txt_chunk_limit(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

/// Domain dormancy loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DormancyConfig {
    /// Pause between ticks (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Calendar months without a device update before a domain is parked
    #[serde(default = "default_window_months")]
    pub window_months: u32,
}

impl DormancyConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("dormancy interval must be > 0"));
        }
        if self.window_months == 0 {
            return Err(crate::Error::config("dormancy window must be at least one month"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for DormancyConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            window_months: default_window_months(),
        }
    }
}

/// User lifecycle loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// When false the loop is never started
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Pause between ticks (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Account age at which the lock warning is sent
    #[serde(default = "default_lock_warning_after_days")]
    pub lock_warning_after_days: i64,

    /// Account age at which the account is locked
    #[serde(default = "default_lock_after_days")]
    pub lock_after_days: i64,
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("lifecycle interval must be > 0"));
        }
        if self.lock_warning_after_days <= 0 {
            return Err(crate::Error::config("lock warning threshold must be > 0 days"));
        }
        if self.lock_after_days <= self.lock_warning_after_days {
            return Err(crate::Error::config(
                "lock threshold must be later than the lock warning threshold",
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn lock_warning_after(&self) -> chrono::Duration {
        chrono::Duration::days(self.lock_warning_after_days)
    }

    pub fn lock_after(&self) -> chrono::Duration {
        chrono::Duration::days(self.lock_after_days)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            lock_warning_after_days: default_lock_warning_after_days(),
            lock_after_days: default_lock_after_days(),
        }
    }
}

/// Notification delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Upper bound for a single send (in seconds, 0 disables)
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl MailConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

/// Domain service settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Parent domain of the free tier (e.g., "example.com")
    pub main_domain: String,

    /// Hosted zone shared by every free-tier domain
    pub free_hosted_zone_id: String,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.main_domain.is_empty() {
            return Err(crate::Error::config("main domain cannot be empty"));
        }
        if self.free_hosted_zone_id.is_empty() {
            return Err(crate::Error::config("free hosted zone id cannot be empty"));
        }
        Ok(())
    }
}

/// Cursor store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CursorStoreConfig {
    /// File-based cursor
    File {
        /// Path to the cursor file
        path: String,
    },

    /// In-memory cursor (not persistent)
    #[default]
    Memory,
}

impl CursorStoreConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            CursorStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("cursor file path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

fn default_ttl_secs() -> u32 {
    600
}

fn default_challenge_ttl_secs() -> u32 {
    10
}

fn default_txt_chunk_limit() -> usize {
    255
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_interval_secs() -> u64 {
    10
}

fn default_window_months() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

fn default_lock_warning_after_days() -> i64 {
    20
}

fn default_lock_after_days() -> i64 {
    30
}
