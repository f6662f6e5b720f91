// # Zone Client Trait
//
// Defines the interface to the external DNS provider that hosts the zones.
//
// ## Implementations
//
// - Cloudflare: `redirect-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use redirect_core::dns::{ChangeAction, ChangeBatch, RecordSet, RecordType};
// use redirect_core::ZoneClient;
//
// let batch = ChangeBatch::new(vec![
//     RecordSet::new("device.example.com.", RecordType::A, 600, ["1.2.3.4"])
//         .change(ChangeAction::Upsert),
// ]);
// client.change_record_sets("zone-id", &batch).await?;
// ```

use async_trait::async_trait;

use crate::dns::ChangeBatch;

/// Trait for DNS provider implementations
///
/// Implementations translate a [`ChangeBatch`] into the provider's API.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// A zone client is a thin, stateless adapter:
/// - ✅ Perform API calls against its provider only
/// - ✅ Map provider failures onto [`crate::Error`]
/// - ❌ No retry or backoff (a failed reconciler tick is retried on the next tick)
/// - ❌ No decision about *what* to publish (owned by `DnsSynchronizer`)
/// - ❌ No caching of record state between calls
///
/// # Batch Semantics
///
/// - `Create`: the record set must not exist yet
/// - `Upsert`: create or replace the record set
/// - `Delete`: the record set must exist with exactly the given values
///
/// A batch either applies completely or fails.
#[async_trait]
pub trait ZoneClient: Send + Sync {
    /// Apply a batch of record changes to a hosted zone
    ///
    /// # Parameters
    ///
    /// - `zone_id`: The provider's hosted zone identifier
    /// - `batch`: Changes to apply
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Every change was applied
    /// - `Err(Error)`: Nothing may be assumed about the zone state
    async fn change_record_sets(
        &self,
        zone_id: &str,
        batch: &ChangeBatch,
    ) -> Result<(), crate::Error>;

    /// Create a hosted zone for a custom domain
    ///
    /// # Returns
    ///
    /// The identifier of the new zone
    async fn create_hosted_zone(&self, domain: &str) -> Result<String, crate::Error>;

    /// Delete a hosted zone
    ///
    /// # Returns
    ///
    /// - `Err(Error::NotFound)`: The zone does not exist (callers may ignore this)
    async fn delete_hosted_zone(&self, zone_id: &str) -> Result<(), crate::Error>;

    /// Name servers delegated to a hosted zone
    async fn hosted_zone_name_servers(&self, zone_id: &str) -> Result<Vec<String>, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
