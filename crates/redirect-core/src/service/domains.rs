//! Domain services
//!
//! The online device-update path and domain removal. Both go through the
//! same [`DnsSynchronizer`] as the reconcilers, so the zone only ever sees
//! the live projection or the parked one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::change::{self, DeviceAddresses};
use crate::config::ServiceConfig;
use crate::dns::DnsSynchronizer;
use crate::error::{Error, Result};
use crate::model::{Domain, DomainUpdate};
use crate::traits::{DomainRemover, DomainStore, UserStore};

const UNKNOWN_TOKEN: &str = "unknown domain update token";

pub struct Domains {
    domains: Arc<dyn DomainStore>,
    users: Arc<dyn UserStore>,
    dns: Arc<DnsSynchronizer>,
    config: ServiceConfig,
}

impl Domains {
    pub fn new(
        domains: Arc<dyn DomainStore>,
        users: Arc<dyn UserStore>,
        dns: Arc<DnsSynchronizer>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            domains,
            users,
            dns,
            config,
        }
    }

    /// Resolve an update token to its domain.
    ///
    /// Tokens of missing or inactive owners are treated as unknown.
    pub async fn get_domain(&self, token: &str) -> Result<Domain> {
        let domain = self
            .domains
            .find_domain_by_token(token)
            .await?
            .ok_or_else(|| Error::not_found(UNKNOWN_TOKEN))?;

        match self.users.find_user_by_id(domain.user_id).await? {
            Some(user) if user.active => Ok(domain),
            _ => Err(Error::not_found(UNKNOWN_TOKEN)),
        }
    }

    /// Apply a device address report.
    ///
    /// DNS is pushed only when a projected attribute changed, and before the
    /// row is written: a failed push leaves the stored domain untouched.
    pub async fn update(
        &self,
        request: &DomainUpdate,
        request_ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Domain> {
        let mut domain = self.get_domain(&request.token).await?;

        let existing = DeviceAddresses::from(&domain);
        let reported = DeviceAddresses::from_update(request, request_ip);
        let changed = change::changed(&existing, &reported);
        reported.apply_to(&mut domain);

        if changed {
            self.dns.synchronize(&domain).await?;
        } else {
            debug!(domain = %domain.name, "Addresses unchanged, skipping DNS push");
        }

        domain.last_update = Some(now);
        self.domains.update_domain(&domain).await?;

        info!(domain = %domain.name, changed, "Domain updated");
        Ok(domain)
    }

    /// Name servers of a custom domain's own zone, `None` for free domains
    pub async fn name_servers(&self, domain: &Domain) -> Result<Option<Vec<String>>> {
        if !self.has_own_zone(domain) {
            return Ok(None);
        }
        let servers = self.dns.name_servers(&domain.hosted_zone_id).await?;
        Ok(Some(servers))
    }

    /// Remove one domain owned by `user_id`
    pub async fn delete_domain(&self, user_id: i64, name: &str) -> Result<()> {
        let domain = match self.domains.find_domain_by_name(name).await? {
            Some(domain) if domain.user_id == user_id => domain,
            _ => return Err(Error::not_found(format!("domain {}", name))),
        };

        self.retire_domain(&domain).await?;
        self.domains.delete_domain(domain.id).await?;
        info!(domain = %domain.name, user_id, "Domain deleted");
        Ok(())
    }

    fn has_own_zone(&self, domain: &Domain) -> bool {
        domain.hosted_zone_id != self.config.free_hosted_zone_id
    }

    /// Park the domain's records and drop its own zone, if it has one
    async fn retire_domain(&self, domain: &Domain) -> Result<()> {
        self.dns.retire(domain).await?;

        if !self.has_own_zone(domain) {
            return Ok(());
        }

        let challenge = format!("_acme-challenge.{}", domain.fqdn());
        self.dns
            .remove_challenge(&domain.hosted_zone_id, &challenge)
            .await?;

        match self.dns.delete_hosted_zone(&domain.hosted_zone_id).await {
            Ok(()) => {
                info!(domain = %domain.name, zone_id = %domain.hosted_zone_id, "Hosted zone deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(zone_id = %domain.hosted_zone_id, "No such hosted zone, ignoring");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl DomainRemover for Domains {
    async fn delete_all_domains(&self, user_id: i64) -> Result<()> {
        let domains = self.domains.find_user_domains(user_id).await?;
        for domain in &domains {
            self.retire_domain(domain).await?;
        }
        self.domains.delete_user_domains(user_id).await?;
        info!(user_id, count = domains.len(), "All user domains deleted");
        Ok(())
    }
}
