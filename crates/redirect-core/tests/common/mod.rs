//! Test doubles and common utilities for contract tests
//!
//! Every double records its calls so tests can assert on side effects
//! without a database, DNS provider or mail relay.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use redirect_core::dns::records::PARKED_IPV4;
use redirect_core::dns::{ChangeAction, ChangeBatch, DnsSynchronizer};
use redirect_core::error::Result;
use redirect_core::traits::{DomainRemover, DomainStore, Mailer, UserStore, ZoneClient};
use redirect_core::{DnsConfig, Domain, Error, User};

/// Fixed clock for deterministic tests
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
}

pub fn user(id: i64, registered_days_ago: i64) -> User {
    User {
        id,
        email: format!("user{}@example.com", id),
        active: true,
        registered_at: now() - Duration::days(registered_days_ago),
        ..Default::default()
    }
}

pub fn domain(id: u64, user_id: i64, last_update: Option<DateTime<Utc>>) -> Domain {
    Domain {
        id,
        user_id,
        name: format!("device{}.example.com", id),
        ip: Some("1.2.3.4".to_string()),
        update_token: Some(format!("token-{}", id)),
        hosted_zone_id: "zone-free".to_string(),
        last_update,
        ..Default::default()
    }
}

/// A zone client that records every batch
#[derive(Clone, Default)]
pub struct RecordingZoneClient {
    batches: Arc<Mutex<Vec<(String, ChangeBatch)>>>,
    deleted_zones: Arc<Mutex<Vec<String>>>,
    fail: Arc<AtomicBool>,
    zone_missing: Arc<AtomicBool>,
    stall_zone_delete: Arc<AtomicBool>,
}

impl RecordingZoneClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every change call fail
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Answer zone deletion with "not found"
    pub fn zone_missing(&self, missing: bool) {
        self.zone_missing.store(missing, Ordering::SeqCst);
    }

    /// Never answer zone deletion
    pub fn stall_zone_delete(&self, stall: bool) {
        self.stall_zone_delete.store(stall, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<(String, ChangeBatch)> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Number of parked record sets deleted, one per retired domain
    pub fn retirements(&self) -> usize {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, batch)| {
                batch.changes.iter().any(|change| {
                    change.action == ChangeAction::Delete
                        && change.record_set.values.iter().any(|v| v == PARKED_IPV4)
                })
            })
            .count()
    }

    pub fn publications(&self) -> usize {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, batch)| batch.changes.iter().any(|c| c.action == ChangeAction::Create))
            .count()
    }

    pub fn deleted_zones(&self) -> Vec<String> {
        self.deleted_zones.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ZoneClient for RecordingZoneClient {
    async fn change_record_sets(&self, zone_id: &str, batch: &ChangeBatch) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::dns_provider("provider unavailable"));
        }
        self.batches
            .lock()
            .unwrap()
            .push((zone_id.to_string(), batch.clone()));
        Ok(())
    }

    async fn create_hosted_zone(&self, domain: &str) -> Result<String> {
        Ok(format!("zone-{}", domain))
    }

    async fn delete_hosted_zone(&self, zone_id: &str) -> Result<()> {
        if self.stall_zone_delete.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        if self.zone_missing.load(Ordering::SeqCst) {
            return Err(Error::not_found(format!("zone {}", zone_id)));
        }
        self.deleted_zones.lock().unwrap().push(zone_id.to_string());
        Ok(())
    }

    async fn hosted_zone_name_servers(&self, _zone_id: &str) -> Result<Vec<String>> {
        Ok(vec![
            "ns1.example.net".to_string(),
            "ns2.example.net".to_string(),
        ])
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Synchronizer wired to a recording client
pub fn synchronizer(client: &RecordingZoneClient) -> Arc<DnsSynchronizer> {
    synchronizer_with(client, DnsConfig::default())
}

pub fn synchronizer_with(client: &RecordingZoneClient, config: DnsConfig) -> Arc<DnsSynchronizer> {
    Arc::new(DnsSynchronizer::new(Arc::new(client.clone()), config))
}

/// In-memory domain and user tables
#[derive(Clone, Default)]
pub struct MemoryStore {
    domains: Arc<Mutex<BTreeMap<u64, Domain>>>,
    users: Arc<Mutex<BTreeMap<i64, User>>>,
    domain_updates: Arc<AtomicUsize>,
    user_updates: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(self, domain: Domain) -> Self {
        self.domains.lock().unwrap().insert(domain.id, domain);
        self
    }

    pub fn with_user(self, user: User) -> Self {
        self.users.lock().unwrap().insert(user.id, user);
        self
    }

    pub fn domain(&self, id: u64) -> Option<Domain> {
        self.domains.lock().unwrap().get(&id).cloned()
    }

    pub fn user(&self, id: i64) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    pub fn domain_update_count(&self) -> usize {
        self.domain_updates.load(Ordering::SeqCst)
    }

    pub fn user_update_count(&self) -> usize {
        self.user_updates.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DomainStore for MemoryStore {
    async fn find_domain_with_oldest_update_before(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Option<Domain>> {
        // None sorts before Some, matching "null first"
        Ok(self
            .domains
            .lock()
            .unwrap()
            .values()
            .filter(|domain| domain.is_dormant(before))
            .min_by_key(|domain| (domain.last_update, domain.id))
            .cloned())
    }

    async fn find_domain_by_token(&self, token: &str) -> Result<Option<Domain>> {
        Ok(self
            .domains
            .lock()
            .unwrap()
            .values()
            .find(|domain| domain.update_token.as_deref() == Some(token))
            .cloned())
    }

    async fn find_domain_by_name(&self, name: &str) -> Result<Option<Domain>> {
        Ok(self
            .domains
            .lock()
            .unwrap()
            .values()
            .find(|domain| domain.name == name)
            .cloned())
    }

    async fn find_user_domains(&self, user_id: i64) -> Result<Vec<Domain>> {
        Ok(self
            .domains
            .lock()
            .unwrap()
            .values()
            .filter(|domain| domain.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_domain(&self, domain: &Domain) -> Result<()> {
        self.domain_updates.fetch_add(1, Ordering::SeqCst);
        self.domains
            .lock()
            .unwrap()
            .insert(domain.id, domain.clone());
        Ok(())
    }

    async fn delete_domain(&self, domain_id: u64) -> Result<()> {
        self.domains.lock().unwrap().remove(&domain_id);
        Ok(())
    }

    async fn delete_user_domains(&self, user_id: i64) -> Result<()> {
        self.domains
            .lock()
            .unwrap()
            .retain(|_, domain| domain.user_id != user_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_next_user_id_after(&self, after: i64) -> Result<Option<i64>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .range(after + 1..)
            .next()
            .map(|(id, _)| *id))
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        self.user_updates.fetch_add(1, Ordering::SeqCst);
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(())
    }
}

/// Kind of notification sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    DnsClean { to: String, domain: String },
    Trial { to: String },
    LockSoon { to: String },
    Locked { to: String },
}

/// A mailer that records sends and can be made to fail
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<Sent>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, sent: Sent) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::mail("relay refused"));
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send_dns_clean_notification(&self, to: &str, domain: &str) -> Result<()> {
        self.record(Sent::DnsClean {
            to: to.to_string(),
            domain: domain.to_string(),
        })
    }

    async fn send_trial(&self, to: &str) -> Result<()> {
        self.record(Sent::Trial { to: to.to_string() })
    }

    async fn send_account_lock_soon(&self, to: &str) -> Result<()> {
        self.record(Sent::LockSoon { to: to.to_string() })
    }

    async fn send_account_locked(&self, to: &str) -> Result<()> {
        self.record(Sent::Locked { to: to.to_string() })
    }
}

/// A remover that only records which accounts were torn down
#[derive(Clone, Default)]
pub struct RecordingRemover {
    calls: Arc<Mutex<Vec<i64>>>,
}

impl RecordingRemover {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<i64> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DomainRemover for RecordingRemover {
    async fn delete_all_domains(&self, user_id: i64) -> Result<()> {
        self.calls.lock().unwrap().push(user_id);
        Ok(())
    }
}
