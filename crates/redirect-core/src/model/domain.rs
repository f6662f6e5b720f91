use std::net::{IpAddr, Ipv4Addr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered subdomain and the addresses its device last reported
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: u64,
    pub user_id: i64,
    /// Fully-qualified name without the trailing dot, e.g. `device.example.com`
    pub name: String,
    pub ip: Option<String>,
    pub ipv6: Option<String>,
    pub local_ip: Option<String>,
    /// When set, the LAN address is published instead of the public one
    pub map_local_address: bool,
    pub dkim_key: Option<String>,
    pub update_token: Option<String>,
    pub hosted_zone_id: String,
    pub last_update: Option<DateTime<Utc>>,
}

impl Domain {
    /// Absolute DNS name with trailing dot
    pub fn fqdn(&self) -> String {
        format!("{}.", self.name)
    }

    /// The address selected by `map_local_address`
    pub fn access_ip(&self) -> Option<&str> {
        if self.map_local_address {
            self.local_ip.as_deref()
        } else {
            self.ip.as_deref()
        }
    }

    /// Address to publish in the AAAA family, if any.
    ///
    /// The explicit IPv6 field wins; otherwise the active address is used when
    /// it is itself a genuine IPv6 literal.
    pub fn dns_ipv6(&self) -> Option<String> {
        self.ipv6
            .as_deref()
            .filter(|ip| is_genuine_ipv6(ip))
            .or_else(|| self.access_ip().filter(|ip| is_genuine_ipv6(ip)))
            .map(str::to_string)
    }

    /// Address to publish in the A family, if any.
    ///
    /// IPv4-mapped IPv6 literals are published in their IPv4 form.
    pub fn dns_ipv4(&self) -> Option<String> {
        self.access_ip().and_then(as_ipv4).map(|ip| ip.to_string())
    }

    /// Whether the device has been silent since before `before`.
    ///
    /// A domain that was never updated counts as dormant.
    pub fn is_dormant(&self, before: DateTime<Utc>) -> bool {
        match self.last_update {
            Some(last_update) => last_update < before,
            None => true,
        }
    }

    /// Forget every reported address after the DNS projection was retired
    pub fn clear_addresses(&mut self) {
        self.ip = None;
        self.ipv6 = None;
        self.local_ip = None;
    }
}

fn is_genuine_ipv6(value: &str) -> bool {
    match value.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => v6.to_ipv4_mapped().is_none(),
        _ => false,
    }
}

fn as_ipv4(value: &str) -> Option<Ipv4Addr> {
    match value.parse::<IpAddr>().ok()? {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}

/// Address report pushed by a device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainUpdate {
    pub token: String,
    pub ip: Option<String>,
    pub local_ip: Option<String>,
    pub ipv6: Option<String>,
    pub dkim_key: Option<String>,
    #[serde(default)]
    pub map_local_address: bool,
    #[serde(default)]
    pub ipv4_enabled: bool,
    #[serde(default)]
    pub ipv6_enabled: bool,
}
