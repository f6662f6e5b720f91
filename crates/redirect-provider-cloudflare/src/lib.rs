// # Cloudflare Zone Client
//
// This crate provides the Cloudflare implementation of `ZoneClient` for the
// redirect service.
//
// ## Implementation Status
//
// - ✅ One batch request per change batch (`POST /zones/:id/dns_records/batch`)
// - ✅ Create, upsert and exact-value delete semantics
// - ✅ Hosted zone create, delete and name server lookup
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Specific error handling for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry logic (a failed reconciler tick is retried on the next tick)
// - ❌ NO caching of record state between calls
// - ❌ SPF record type (deprecated by Cloudflare, the TXT copy carries the policy)
//
// ## Security Requirements
//
// - API token NEVER appears in logs
// - API token MUST be provided via environment variables only
// - Construction fails if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - Batch DNS Records: POST `/zones/:zone_id/dns_records/batch`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Zones: POST `/zones`, GET `/zones/:zone_id`, DELETE `/zones/:zone_id`

use std::time::Duration;

use async_trait::async_trait;
use redirect_core::dns::{Change, ChangeAction, ChangeBatch, RecordSet, RecordType};
use redirect_core::{Error, Result, ZoneClient};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "cloudflare";

/// Cloudflare zone client
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the client will:
/// - Perform zone reads (name server lookups)
/// - Log every intended record change, without looking up record ids
/// - **NOT** modify records or zones
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct CloudflareZoneClient {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Account that owns newly created zones
    account_id: Option<String>,

    api_base: String,

    client: reqwest::Client,

    dry_run: bool,
}

impl std::fmt::Debug for CloudflareZoneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareZoneClient")
            .field("api_token", &"<REDACTED>")
            .field("account_id", &self.account_id)
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareZoneClient {
    /// Create a new Cloudflare zone client
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Edit and DNS:Edit permissions
    /// - `account_id`: Account for `create_hosted_zone`, optional otherwise
    /// - `dry_run`: If true, log record changes and skip writes
    pub fn new(
        api_token: impl Into<String>,
        account_id: Option<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        if dry_run {
            tracing::warn!("Cloudflare client running in DRY-RUN mode - no changes will be made");
        }

        Ok(Self {
            api_token,
            account_id,
            api_base: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Point the client at a different API endpoint (e.g. a local proxy)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// List the records currently published under one name and type
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=example.com&type=A
    /// Authorization: Bearer <token>
    /// ```
    async fn existing_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<ExistingRecord>> {
        let url = format!("{}/zones/{}/dns_records", self.api_base, zone_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .query(&[
                ("name", name),
                ("type", record_type.as_str()),
                ("per_page", "100"),
            ])
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let json = read_response(response, "Record lookup").await?;
        let records: Vec<ExistingRecord> = serde_json::from_value(json["result"].clone())
            .map_err(|e| {
                Error::provider(PROVIDER, format!("Invalid response format: result: {}", e))
            })?;

        tracing::debug!(
            zone_id = %zone_id,
            name = %name,
            record_type = %record_type,
            "Found {} existing records",
            records.len()
        );
        Ok(records)
    }

    /// Translate a change batch into one Cloudflare batch request
    async fn plan(&self, zone_id: &str, batch: &ChangeBatch) -> Result<BatchRequest> {
        let mut request = BatchRequest::default();
        for change in &batch.changes {
            if change.record_set.record_type == RecordType::Spf {
                tracing::debug!(
                    name = %change.record_set.name,
                    "Skipping SPF record type, published as TXT instead"
                );
                continue;
            }

            let existing = match change.action {
                ChangeAction::Create => Vec::new(),
                ChangeAction::Upsert | ChangeAction::Delete => {
                    self.existing_records(
                        zone_id,
                        &record_name(&change.record_set.name),
                        change.record_set.record_type,
                    )
                    .await?
                }
            };
            plan_change(change, &existing, &mut request)?;
        }
        Ok(request)
    }

    async fn zone(&self, zone_id: &str) -> Result<Value> {
        let url = format!("{}/zones/{}", self.api_base, zone_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;
        read_response(response, "Zone lookup").await
    }
}

#[async_trait]
impl ZoneClient for CloudflareZoneClient {
    /// Apply a change batch atomically
    ///
    /// # API Calls
    ///
    /// ```http
    /// # For every upsert or delete, find the current record ids
    /// # (dry-run mode logs the batch and makes no request at all)
    /// GET /zones/:zone_id/dns_records?name=...&type=...
    ///
    /// # Apply
    /// POST /zones/:zone_id/dns_records/batch
    /// {
    ///   "deletes": [{"id": "..."}],
    ///   "posts": [{"name": "...", "type": "A", "content": "1.2.3.4", "ttl": 600}]
    /// }
    /// ```
    async fn change_record_sets(&self, zone_id: &str, batch: &ChangeBatch) -> Result<()> {
        // Dry-run publishes nothing, so deletes must not expect earlier writes
        if self.dry_run {
            for change in &batch.changes {
                tracing::info!(
                    "[DRY-RUN] Would {} {} {} in zone {}: {:?}",
                    change.action,
                    change.record_set.record_type,
                    change.record_set.name,
                    zone_id,
                    change.record_set.values
                );
            }
            return Ok(());
        }

        let request = self.plan(zone_id, batch).await?;
        if request.is_empty() {
            tracing::debug!(zone_id = %zone_id, "Nothing to change");
            return Ok(());
        }

        let url = format!("{}/zones/{}/dns_records/batch", self.api_base, zone_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;
        read_response(response, "Batch change").await?;

        tracing::info!(
            zone_id = %zone_id,
            deletes = request.deletes.len(),
            posts = request.posts.len(),
            "Cloudflare batch applied"
        );
        Ok(())
    }

    /// ```http
    /// POST /zones
    /// {"name": "example.org", "account": {"id": "..."}, "type": "full"}
    /// ```
    async fn create_hosted_zone(&self, domain: &str) -> Result<String> {
        let account_id = self
            .account_id
            .as_deref()
            .ok_or_else(|| Error::config("Cloudflare account id is required to create zones"))?;

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would create zone {}", domain);
            return Ok(format!("dry-run-{}", domain));
        }

        let url = format!("{}/zones", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&serde_json::json!({
                "name": domain,
                "account": {"id": account_id},
                "type": "full",
            }))
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let json = read_response(response, "Zone creation").await?;
        let zone_id = json["result"]["id"].as_str().ok_or_else(|| {
            Error::provider(PROVIDER, "Invalid response format: zone.id is not a string")
        })?;

        tracing::info!(domain = %domain, zone_id = %zone_id, "Created hosted zone");
        Ok(zone_id.to_string())
    }

    async fn delete_hosted_zone(&self, zone_id: &str) -> Result<()> {
        if self.dry_run {
            tracing::info!("[DRY-RUN] Would delete zone {}", zone_id);
            return Ok(());
        }

        let url = format!("{}/zones/{}", self.api_base, zone_id);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;
        read_response(response, "Zone deletion").await?;

        tracing::info!(zone_id = %zone_id, "Deleted hosted zone");
        Ok(())
    }

    async fn hosted_zone_name_servers(&self, zone_id: &str) -> Result<Vec<String>> {
        let json = self.zone(zone_id).await?;
        let servers = json["result"]["name_servers"].as_array().ok_or_else(|| {
            Error::provider(PROVIDER, "Invalid response format: name_servers is not an array")
        })?;
        Ok(servers
            .iter()
            .filter_map(|server| server.as_str().map(str::to_string))
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// A record as returned by the list endpoint
#[derive(Debug, Clone, Deserialize)]
struct ExistingRecord {
    id: String,
    content: String,
    #[serde(default)]
    priority: Option<u16>,
}

/// A record to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct RecordBody {
    name: String,
    #[serde(rename = "type")]
    record_type: &'static str,
    content: String,
    ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<u16>,
}

impl RecordBody {
    fn matches(&self, existing: &ExistingRecord) -> bool {
        existing.content == self.content
            && (self.priority.is_none() || existing.priority == self.priority)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct RecordId {
    id: String,
}

#[derive(Debug, Default, Serialize)]
struct BatchRequest {
    deletes: Vec<RecordId>,
    posts: Vec<RecordBody>,
}

impl BatchRequest {
    fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.posts.is_empty()
    }
}

/// Cloudflare names carry no trailing dot
fn record_name(name: &str) -> String {
    name.trim_end_matches('.').to_string()
}

fn record_bodies(set: &RecordSet) -> Result<Vec<RecordBody>> {
    let name = record_name(&set.name);
    set.values
        .iter()
        .map(|value| {
            let (content, priority) = match set.record_type {
                RecordType::Mx => {
                    let (priority, host) = value.split_once(' ').ok_or_else(|| {
                        Error::provider(PROVIDER, format!("Invalid MX value: {}", value))
                    })?;
                    let priority = priority.parse::<u16>().map_err(|_| {
                        Error::provider(PROVIDER, format!("Invalid MX priority: {}", value))
                    })?;
                    (record_name(host), Some(priority))
                }
                _ => (value.clone(), None),
            };
            Ok(RecordBody {
                name: name.clone(),
                record_type: set.record_type.as_str(),
                content,
                ttl: set.ttl,
                priority,
            })
        })
        .collect()
}

/// Add one change to the batch given the records currently published
fn plan_change(change: &Change, existing: &[ExistingRecord], request: &mut BatchRequest) -> Result<()> {
    let bodies = record_bodies(&change.record_set)?;
    match change.action {
        ChangeAction::Create => {
            request.posts.extend(bodies);
        }
        ChangeAction::Upsert => {
            request
                .deletes
                .extend(existing.iter().map(|record| RecordId {
                    id: record.id.clone(),
                }));
            request.posts.extend(bodies);
        }
        ChangeAction::Delete => {
            for body in &bodies {
                let record = existing
                    .iter()
                    .find(|record| body.matches(record))
                    .ok_or_else(|| {
                        Error::provider(
                            PROVIDER,
                            format!(
                                "Cannot delete {} {} {}: no record with that value",
                                body.record_type, body.name, body.content
                            ),
                        )
                    })?;
                request.deletes.push(RecordId {
                    id: record.id.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Check the status and decode the JSON envelope
async fn read_response(response: reqwest::Response, context: &str) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(status_error(status.as_u16(), &error_text, context));
    }

    let json: Value = response
        .json()
        .await
        .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

    if json["success"].as_bool() == Some(false) {
        return Err(Error::provider(
            PROVIDER,
            format!("{} rejected: {}", context, json["errors"]),
        ));
    }
    Ok(json)
}

fn status_error(status: u16, error_text: &str, context: &str) -> Error {
    match status {
        401 | 403 => Error::provider(
            PROVIDER,
            format!(
                "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
                status
            ),
        ),
        404 => Error::not_found(format!("{}: {}", context, error_text)),
        409 => Error::provider(
            PROVIDER,
            format!("Conflict: Record is being updated by another process. Status: {}", status),
        ),
        429 => Error::provider(
            PROVIDER,
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{} failed: {} - {}", context, status, error_text),
        ),
    }
}
