//! DNS synchronizer
//!
//! Makes a hosted zone match either a domain's live state or the fixed
//! parked state. The synchronizer keeps no record state: the full desired
//! set is recomputed from the domain on every call, and any provider failure
//! aborts the whole operation so callers retry it from the start.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::DnsConfig;
use crate::dns::records::{
    CHALLENGE_CLEANUP_VALUE, ChangeAction, ChangeBatch, DomainProjection, PUBLISHED_SPF, RecordSet,
    RecordType, quote_txt,
};
use crate::error::{Result, with_timeout};
use crate::metrics::{DnsCallOutcome, record_dns_call};
use crate::model::Domain;
use crate::traits::ZoneClient;

/// Publishes and retires domain record sets against a [`ZoneClient`]
pub struct DnsSynchronizer {
    client: Arc<dyn ZoneClient>,
    config: DnsConfig,
}

impl DnsSynchronizer {
    pub fn new(client: Arc<dyn ZoneClient>, config: DnsConfig) -> Self {
        Self { client, config }
    }

    /// Publish the domain's current state.
    ///
    /// The zone is first parked, then the live set is created, so providers
    /// that reject duplicate records never see one.
    pub async fn synchronize(&self, domain: &Domain) -> Result<()> {
        self.retire(domain).await?;

        let fqdn = domain.fqdn();
        let ipv4 = domain.dns_ipv4();
        let ipv6 = domain.dns_ipv6();
        let mx = format!("1 {}", fqdn);
        let projection = DomainProjection {
            fqdn: &fqdn,
            ipv4: ipv4.as_deref(),
            ipv6: ipv6.as_deref(),
            dkim_key: domain.dkim_key.as_deref(),
            spf: PUBLISHED_SPF,
            mx: &mx,
        };
        let batch = projection.batch(
            ChangeAction::Create,
            self.config.ttl_secs,
            self.config.txt_chunk_limit,
        );
        self.commit("create", &domain.hosted_zone_id, &batch).await?;

        info!(
            domain = %domain.name,
            zone_id = %domain.hosted_zone_id,
            ipv4 = ?ipv4,
            ipv6 = ?ipv6,
            "Published domain records"
        );
        Ok(())
    }

    /// Replace the domain's records with placeholders, then delete them.
    ///
    /// The provider only deletes exact values, which are unknown once a device
    /// is gone; upserting known values first makes the delete deterministic.
    pub async fn retire(&self, domain: &Domain) -> Result<()> {
        let fqdn = domain.fqdn();
        let parked = DomainProjection::parked(&fqdn);
        let ttl = self.config.ttl_secs;
        let limit = self.config.txt_chunk_limit;

        self.commit(
            "park",
            &domain.hosted_zone_id,
            &parked.batch(ChangeAction::Upsert, ttl, limit),
        )
        .await?;
        self.commit(
            "retire",
            &domain.hosted_zone_id,
            &parked.batch(ChangeAction::Delete, ttl, limit),
        )
        .await?;

        debug!(domain = %domain.name, zone_id = %domain.hosted_zone_id, "Retired domain records");
        Ok(())
    }

    /// Publish ACME validation tokens as a quoted TXT record set
    pub async fn present_challenge(&self, zone_id: &str, fqdn: &str, values: &[String]) -> Result<()> {
        let batch = ChangeBatch::new(vec![
            RecordSet::new(
                fqdn,
                RecordType::Txt,
                self.config.challenge_ttl_secs,
                quote_txt(values),
            )
            .change(ChangeAction::Upsert),
        ]);
        self.commit("challenge.present", zone_id, &batch).await?;
        info!(zone_id = %zone_id, name = %fqdn, values = values.len(), "Presented ACME challenge");
        Ok(())
    }

    /// Remove an ACME challenge record without knowing its current tokens
    pub async fn remove_challenge(&self, zone_id: &str, fqdn: &str) -> Result<()> {
        let cleanup = || {
            RecordSet::new(
                fqdn,
                RecordType::Txt,
                self.config.challenge_ttl_secs,
                [CHALLENGE_CLEANUP_VALUE],
            )
        };
        self.commit(
            "challenge.park",
            zone_id,
            &ChangeBatch::new(vec![cleanup().change(ChangeAction::Upsert)]),
        )
        .await?;
        self.commit(
            "challenge.remove",
            zone_id,
            &ChangeBatch::new(vec![cleanup().change(ChangeAction::Delete)]),
        )
        .await?;
        info!(zone_id = %zone_id, name = %fqdn, "Removed ACME challenge");
        Ok(())
    }

    /// Name servers of a hosted zone
    pub async fn name_servers(&self, zone_id: &str) -> Result<Vec<String>> {
        self.call(
            "zone.name_servers",
            "hosted_zone_name_servers",
            zone_id,
            self.client.hosted_zone_name_servers(zone_id),
        )
        .await
    }

    /// Delete a hosted zone; a zone that is already gone is `NotFound`
    pub async fn delete_hosted_zone(&self, zone_id: &str) -> Result<()> {
        self.call(
            "zone.delete",
            "delete_hosted_zone",
            zone_id,
            self.client.delete_hosted_zone(zone_id),
        )
        .await
    }

    async fn commit(&self, action: &'static str, zone_id: &str, batch: &ChangeBatch) -> Result<()> {
        let result = self
            .call(
                action,
                "change_record_sets",
                zone_id,
                self.client.change_record_sets(zone_id, batch),
            )
            .await;
        debug!(
            action,
            zone_id = %zone_id,
            changes = batch.len(),
            ok = result.is_ok(),
            "Committed change batch"
        );
        result
    }

    /// Every provider call runs under the configured timeout and is counted
    async fn call<T, F>(&self, action: &'static str, method: &str, zone_id: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let operation = format!("{}.{}", self.client.provider_name(), method);
        let result = with_timeout(&operation, self.config.call_timeout(), fut).await;

        let outcome = if result.is_ok() {
            DnsCallOutcome::Commit
        } else {
            DnsCallOutcome::Error
        };
        record_dns_call(action, outcome, started.elapsed());

        if let Err(e) = &result {
            debug!(action, zone_id = %zone_id, error = %e, "Provider call failed");
        }
        result
    }
}
