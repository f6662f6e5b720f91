//! Change detection for device address reports
//!
//! A DNS push is the most expensive call on the update path, so it only
//! happens when something the zone projects from actually changed.

use crate::model::{Domain, DomainUpdate};

/// The device-reported attributes that feed the DNS projection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceAddresses {
    pub map_local_address: bool,
    pub ip: Option<String>,
    pub ipv6: Option<String>,
    pub dkim_key: Option<String>,
    pub local_ip: Option<String>,
}

impl From<&Domain> for DeviceAddresses {
    fn from(domain: &Domain) -> Self {
        Self {
            map_local_address: domain.map_local_address,
            ip: domain.ip.clone(),
            ipv6: domain.ipv6.clone(),
            dkim_key: domain.dkim_key.clone(),
            local_ip: domain.local_ip.clone(),
        }
    }
}

impl DeviceAddresses {
    /// Addresses a device update would store.
    ///
    /// IPv4 fields only count when IPv4 is enabled, IPv6 only when IPv6 is
    /// enabled. `request_ip` stands in for a missing public IPv4.
    pub fn from_update(update: &DomainUpdate, request_ip: Option<&str>) -> Self {
        let (ip, local_ip) = if update.ipv4_enabled {
            (
                update.ip.clone().or_else(|| request_ip.map(str::to_string)),
                update.local_ip.clone(),
            )
        } else {
            (None, None)
        };
        let ipv6 = if update.ipv6_enabled {
            update.ipv6.clone()
        } else {
            None
        };

        Self {
            map_local_address: update.map_local_address,
            ip,
            ipv6,
            dkim_key: update.dkim_key.clone(),
            local_ip,
        }
    }

    /// Copy these addresses onto a domain record
    pub fn apply_to(self, domain: &mut Domain) {
        domain.map_local_address = self.map_local_address;
        domain.ip = self.ip;
        domain.ipv6 = self.ipv6;
        domain.dkim_key = self.dkim_key;
        domain.local_ip = self.local_ip;
    }
}

/// Whether any projected attribute differs between `existing` and `new`
pub fn changed(existing: &DeviceAddresses, new: &DeviceAddresses) -> bool {
    existing.map_local_address != new.map_local_address
        || !equals(existing.ip.as_deref(), new.ip.as_deref())
        || !equals(existing.local_ip.as_deref(), new.local_ip.as_deref())
        || !equals(existing.ipv6.as_deref(), new.ipv6.as_deref())
        || !equals(existing.dkim_key.as_deref(), new.dkim_key.as_deref())
}

/// Absent-aware equality: two absent values are equal, absent never equals present
pub fn equals(left: Option<&str>, right: Option<&str>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}
