//! Record sets and change batches
//!
//! The zone is never read back: every synchronization recomputes the full
//! desired set from the domain and the fixed policy values below.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder IPv4 used to park a domain
pub const PARKED_IPV4: &str = "127.0.0.1";
/// Placeholder IPv6 used to park a domain
pub const PARKED_IPV6: &str = "fe80::";
/// Placeholder DKIM key used to park a domain
pub const PARKED_DKIM: &str = "none";
/// Mail exchanger of a parked domain
pub const PARKED_MX: &str = "1 mx";
/// Reject-all sender policy
pub const PARKED_SPF: &str = "\"v=spf1 -all\"";
/// Sender policy of a live domain
pub const PUBLISHED_SPF: &str = "\"v=spf1 a mx -all\"";
/// Known value written before deleting an ACME challenge record
pub const CHALLENGE_CLEANUP_VALUE: &str = "\"cleanup\"";

/// DNS record families projected per domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Mx,
    Spf,
    Txt,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Mx => "MX",
            RecordType::Spf => "SPF",
            RecordType::Txt => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a record set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Create,
    Upsert,
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeAction::Create => "CREATE",
            ChangeAction::Upsert => "UPSERT",
            ChangeAction::Delete => "DELETE",
        })
    }
}

/// All values published under one name and type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Absolute name with trailing dot
    pub name: String,
    pub record_type: RecordType,
    pub ttl: u32,
    pub values: Vec<String>,
}

impl RecordSet {
    pub fn new<I, V>(name: impl Into<String>, record_type: RecordType, ttl: u32, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            record_type,
            ttl,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn change(self, action: ChangeAction) -> Change {
        Change {
            action,
            record_set: self,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub action: ChangeAction,
    pub record_set: RecordSet,
}

/// Changes submitted to the provider in one call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub changes: Vec<Change>,
}

impl ChangeBatch {
    pub fn new(changes: Vec<Change>) -> Self {
        Self { changes }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Inputs of the per-domain projection
#[derive(Debug, Clone, Copy)]
pub struct DomainProjection<'a> {
    /// Absolute name with trailing dot
    pub fqdn: &'a str,
    pub ipv4: Option<&'a str>,
    pub ipv6: Option<&'a str>,
    pub dkim_key: Option<&'a str>,
    pub spf: &'a str,
    pub mx: &'a str,
}

impl<'a> DomainProjection<'a> {
    /// The placeholder projection used to retire a domain
    pub fn parked(fqdn: &'a str) -> Self {
        Self {
            fqdn,
            ipv4: Some(PARKED_IPV4),
            ipv6: Some(PARKED_IPV6),
            dkim_key: Some(PARKED_DKIM),
            spf: PARKED_SPF,
            mx: PARKED_MX,
        }
    }

    /// Record sets for this projection.
    ///
    /// AAAA and A are emitted for the apex and its wildcard, DKIM only when a
    /// key is present. MX, SPF and TXT are always emitted.
    pub fn record_sets(&self, ttl: u32, txt_chunk_limit: usize) -> Vec<RecordSet> {
        let wildcard = format!("*.{}", self.fqdn);
        let mut sets = Vec::with_capacity(8);

        if let Some(ipv6) = self.ipv6 {
            sets.push(RecordSet::new(self.fqdn, RecordType::Aaaa, ttl, [ipv6]));
            sets.push(RecordSet::new(wildcard.as_str(), RecordType::Aaaa, ttl, [ipv6]));
        }
        if let Some(ipv4) = self.ipv4 {
            sets.push(RecordSet::new(self.fqdn, RecordType::A, ttl, [ipv4]));
            sets.push(RecordSet::new(wildcard.as_str(), RecordType::A, ttl, [ipv4]));
        }
        if let Some(key) = self.dkim_key {
            sets.push(RecordSet::new(
                dkim_name(self.fqdn),
                RecordType::Txt,
                ttl,
                [dkim_value(key, txt_chunk_limit)],
            ));
        }
        sets.push(RecordSet::new(self.fqdn, RecordType::Mx, ttl, [self.mx]));
        sets.push(RecordSet::new(self.fqdn, RecordType::Spf, ttl, [self.spf]));
        sets.push(RecordSet::new(self.fqdn, RecordType::Txt, ttl, [self.spf]));

        sets
    }

    /// Record sets wrapped into a single-action batch
    pub fn batch(&self, action: ChangeAction, ttl: u32, txt_chunk_limit: usize) -> ChangeBatch {
        ChangeBatch::new(
            self.record_sets(ttl, txt_chunk_limit)
                .into_iter()
                .map(|set| set.change(action))
                .collect(),
        )
    }
}

/// Name of the DKIM selector record
pub fn dkim_name(fqdn: &str) -> String {
    format!("mail._domainkey.{}", fqdn)
}

/// DKIM TXT value split into quoted character-strings of at most `limit` chars
pub fn dkim_value(key: &str, limit: usize) -> String {
    let full = format!("v=DKIM1; k=rsa; p={}", key);
    let chunks = split_by(&full, limit);
    format!("\"{}\"", chunks.join("\" \""))
}

/// Wrap each value in quotes as TXT character-strings
pub fn quote_txt<I, V>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = V>,
    V: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| format!("\"{}\"", value.as_ref()))
        .collect()
}

fn split_by(value: &str, limit: usize) -> Vec<String> {
    if limit == 0 {
        return vec![value.to_string()];
    }
    let chars: Vec<char> = value.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(limit)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
