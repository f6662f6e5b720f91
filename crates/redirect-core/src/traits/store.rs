// # Data Store Traits
//
// The narrow read/update contracts this core needs from the database.
// The data store is the single source of truth; every write is
// last-write-wins on the one row it touches.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Domain, User};

/// Domain table access
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// The domain with the oldest `last_update` strictly before `before`.
    ///
    /// Domains that were never updated sort first and always qualify.
    async fn find_domain_with_oldest_update_before(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Option<Domain>, crate::Error>;

    async fn find_domain_by_token(&self, token: &str) -> Result<Option<Domain>, crate::Error>;

    async fn find_domain_by_name(&self, name: &str) -> Result<Option<Domain>, crate::Error>;

    async fn find_user_domains(&self, user_id: i64) -> Result<Vec<Domain>, crate::Error>;

    async fn update_domain(&self, domain: &Domain) -> Result<(), crate::Error>;

    async fn delete_domain(&self, domain_id: u64) -> Result<(), crate::Error>;

    async fn delete_user_domains(&self, user_id: i64) -> Result<(), crate::Error>;
}

/// User table access
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, crate::Error>;

    /// Smallest user id greater than `after`, `None` once the table is exhausted
    async fn find_next_user_id_after(&self, after: i64) -> Result<Option<i64>, crate::Error>;

    async fn update_user(&self, user: &User) -> Result<(), crate::Error>;
}
