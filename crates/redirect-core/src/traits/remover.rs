use async_trait::async_trait;

/// Tears down every domain of an account.
///
/// Implementations must retire each domain's DNS through the synchronizer's
/// parked path before the rows disappear.
#[async_trait]
pub trait DomainRemover: Send + Sync {
    async fn delete_all_domains(&self, user_id: i64) -> Result<(), crate::Error>;
}
