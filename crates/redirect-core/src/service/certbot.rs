//! ACME DNS-01 challenge records
//!
//! A device may only touch challenge names strictly below its own domain.

use std::sync::Arc;

use crate::dns::DnsSynchronizer;
use crate::error::{Error, Result};
use crate::model::Domain;
use crate::traits::DomainStore;

pub struct Certbot {
    domains: Arc<dyn DomainStore>,
    dns: Arc<DnsSynchronizer>,
}

impl Certbot {
    pub fn new(domains: Arc<dyn DomainStore>, dns: Arc<DnsSynchronizer>) -> Self {
        Self { domains, dns }
    }

    pub async fn present(&self, token: &str, fqdn: &str, values: &[String]) -> Result<()> {
        let domain = self.authorize(token, fqdn).await?;
        self.dns
            .present_challenge(&domain.hosted_zone_id, fqdn, values)
            .await
    }

    pub async fn cleanup(&self, token: &str, fqdn: &str) -> Result<()> {
        let domain = self.authorize(token, fqdn).await?;
        self.dns.remove_challenge(&domain.hosted_zone_id, fqdn).await
    }

    async fn authorize(&self, token: &str, fqdn: &str) -> Result<Domain> {
        let domain = self
            .domains
            .find_domain_by_token(token)
            .await?
            .ok_or_else(|| Error::not_found("unknown domain update token"))?;

        let suffix = format!(".{}", domain.name.trim_end_matches('.'));
        if !fqdn.trim_end_matches('.').ends_with(&suffix) {
            return Err(Error::policy(format!(
                "{} is outside of {}, only same domain is allowed",
                fqdn, domain.name
            )));
        }
        Ok(domain)
    }
}
