//! Metrics instrumentation for the redirect core.
//!
//! Counters go through the `metrics` facade and are no-ops until the binary
//! installs a recorder.

use metrics::{counter, histogram};

/// Record one provider call and its outcome.
pub fn record_dns_call(action: &'static str, outcome: DnsCallOutcome, duration: std::time::Duration) {
    counter!("dns.client.connect", "action" => action).increment(1);
    match outcome {
        DnsCallOutcome::Commit => counter!("dns.client.commit", "action" => action).increment(1),
        DnsCallOutcome::Error => counter!("dns.client.error", "action" => action).increment(1),
    }
    histogram!("dns.client.duration.seconds", "action" => action).record(duration.as_secs_f64());
}

/// Provider call outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsCallOutcome {
    /// The provider accepted the change.
    Commit,
    /// The call failed or timed out.
    Error,
}

/// A dormant domain was parked.
pub fn record_domain_clean() {
    counter!("domain.clean").increment(1);
}

/// A dormancy tick failed.
pub fn record_domain_clean_error() {
    counter!("domain.clean.error").increment(1);
}

/// A user moved along the lifecycle.
pub fn record_lifecycle_transition(transition: LifecycleTransition) {
    let name = match transition {
        LifecycleTransition::Trial => "user.lifecycle.trial",
        LifecycleTransition::Warn => "user.lifecycle.warn",
        LifecycleTransition::Lock => "user.lifecycle.lock",
    };
    counter!(name).increment(1);
}

/// Lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleTransition {
    Trial,
    Warn,
    Lock,
}
