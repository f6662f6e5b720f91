// # MySQL Store
//
// Production `DomainStore` and `UserStore` over the service's MySQL schema.
//
// Only the narrow read/update contracts the reconcilers and domain services
// need are implemented. Schema migrations and account acquisition live
// elsewhere.
//
// ## Account status column
//
// The `user.status` column encodes the free-tier progression:
//
// | status | meaning              |
// |--------|----------------------|
// | 0      | created              |
// | 1      | trial email sent     |
// | 2      | lock email sent      |
// | 3      | locked               |
// | 4      | subscribed           |

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use redirect_core::{Domain, DomainStore, Error, Result, User, UserStore};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

pub const STATUS_CREATED: i64 = 0;
pub const STATUS_TRIAL_EMAIL_SENT: i64 = 1;
pub const STATUS_LOCK_EMAIL_SENT: i64 = 2;
pub const STATUS_LOCKED: i64 = 3;
pub const STATUS_SUBSCRIBED: i64 = 4;

const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_MAX_LIFETIME: Duration = Duration::from_secs(180);

// MySQL assigns left to right: status_at must compare against the old status
const UPDATE_USER: &str = "UPDATE user SET \
     email = ?, active = ?, subscription_id = ?, \
     status_at = IF(status <> ?, ?, status_at), status = ? \
     WHERE id = ?";

const DOMAIN_COLUMNS: &str = "CAST(id AS UNSIGNED) AS id, \
    CAST(user_id AS SIGNED) AS user_id, \
    lower(name) AS name, \
    ip, ipv6, local_ip, map_local_address, dkim_key, update_token, \
    hosted_zone_id, last_update";

const USER_COLUMNS: &str = "CAST(id AS SIGNED) AS id, \
    email, active, subscription_id, \
    CAST(status AS SIGNED) AS status, registered_at";

/// Connection settings
#[derive(Clone)]
pub struct MysqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    /// ⚠️ NEVER log this value
    pub password: String,
}

impl std::fmt::Debug for MysqlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl MysqlConfig {
    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DomainRow {
    id: u64,
    user_id: i64,
    name: String,
    ip: Option<String>,
    ipv6: Option<String>,
    local_ip: Option<String>,
    map_local_address: Option<bool>,
    dkim_key: Option<String>,
    update_token: Option<String>,
    hosted_zone_id: Option<String>,
    last_update: Option<NaiveDateTime>,
}

impl From<DomainRow> for Domain {
    fn from(row: DomainRow) -> Self {
        Domain {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            ip: row.ip,
            ipv6: row.ipv6,
            local_ip: row.local_ip,
            map_local_address: row.map_local_address.unwrap_or(false),
            dkim_key: row.dkim_key,
            update_token: row.update_token,
            hosted_zone_id: row.hosted_zone_id.unwrap_or_default(),
            last_update: row.last_update.map(|at| at.and_utc()),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    active: bool,
    subscription_id: Option<String>,
    status: i64,
    registered_at: Option<NaiveDateTime>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let (trial_email_sent, lock_email_sent, locked) = flags_from_status(row.status);
        User {
            id: row.id,
            email: row.email,
            active: row.active,
            subscription_id: row.subscription_id,
            registered_at: row
                .registered_at
                .map(|at| at.and_utc())
                .unwrap_or(DateTime::UNIX_EPOCH),
            trial_email_sent,
            lock_email_sent,
            locked,
        }
    }
}

/// Progression flags (trial sent, lock email sent, locked) for a status value
fn flags_from_status(status: i64) -> (bool, bool, bool) {
    match status {
        STATUS_TRIAL_EMAIL_SENT => (true, false, false),
        STATUS_LOCK_EMAIL_SENT => (true, true, false),
        STATUS_LOCKED => (true, true, true),
        _ => (false, false, false),
    }
}

/// Status value for a user, the furthest progression step wins
fn status_for(user: &User) -> i64 {
    if user.locked {
        STATUS_LOCKED
    } else if user.lock_email_sent {
        STATUS_LOCK_EMAIL_SENT
    } else if user.trial_email_sent {
        STATUS_TRIAL_EMAIL_SENT
    } else if user.is_subscribed() {
        STATUS_SUBSCRIBED
    } else {
        STATUS_CREATED
    }
}

fn naive(at: Option<DateTime<Utc>>) -> Option<NaiveDateTime> {
    at.map(|at| at.naive_utc())
}

fn db_error(operation: &str, e: sqlx::Error) -> Error {
    tracing::error!(operation = %operation, "Database error: {}", e);
    Error::database(format!("{}: {}", operation, e))
}

/// MySQL-backed domain and user store
#[derive(Debug, Clone)]
pub struct MysqlStore {
    pool: MySqlPool,
}

impl MysqlStore {
    /// Open a connection pool
    ///
    /// The pool connects lazily, so this succeeds even while the database is
    /// still starting; the first query reports connection failures.
    pub fn connect_lazy(config: &MysqlConfig) -> Self {
        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .max_lifetime(CONNECTION_MAX_LIFETIME)
            .connect_lazy_with(config.connect_options());
        tracing::info!(host = %config.host, database = %config.database, "MySQL pool created");
        Self { pool }
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn find_domain_by(&self, field: &str, value: &str) -> Result<Option<Domain>> {
        let query = format!("SELECT {} FROM domain WHERE {} = ?", DOMAIN_COLUMNS, field);
        let row = sqlx::query_as::<_, DomainRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find domain", e))?;
        Ok(row.map(Domain::from))
    }
}

#[async_trait]
impl DomainStore for MysqlStore {
    async fn find_domain_with_oldest_update_before(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Option<Domain>> {
        let query = format!(
            "SELECT {} FROM domain \
             WHERE last_update < ? OR last_update IS NULL \
             ORDER BY last_update, id LIMIT 1",
            DOMAIN_COLUMNS
        );
        let row = sqlx::query_as::<_, DomainRow>(&query)
            .bind(before.naive_utc())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find oldest domain", e))?;
        Ok(row.map(Domain::from))
    }

    async fn find_domain_by_token(&self, token: &str) -> Result<Option<Domain>> {
        self.find_domain_by("update_token", token).await
    }

    async fn find_domain_by_name(&self, name: &str) -> Result<Option<Domain>> {
        self.find_domain_by("name", &name.to_lowercase()).await
    }

    async fn find_user_domains(&self, user_id: i64) -> Result<Vec<Domain>> {
        let query = format!(
            "SELECT {} FROM domain WHERE user_id = ? ORDER BY id",
            DOMAIN_COLUMNS
        );
        let rows = sqlx::query_as::<_, DomainRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("find user domains", e))?;
        Ok(rows.into_iter().map(Domain::from).collect())
    }

    async fn update_domain(&self, domain: &Domain) -> Result<()> {
        sqlx::query(
            "UPDATE domain SET \
             name = ?, ip = ?, ipv6 = ?, dkim_key = ?, local_ip = ?, \
             map_local_address = ?, update_token = ?, user_id = ?, last_update = ? \
             WHERE id = ?",
        )
        .bind(domain.name.to_lowercase())
        .bind(&domain.ip)
        .bind(&domain.ipv6)
        .bind(&domain.dkim_key)
        .bind(&domain.local_ip)
        .bind(domain.map_local_address)
        .bind(&domain.update_token)
        .bind(domain.user_id)
        .bind(naive(domain.last_update))
        .bind(domain.id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update domain", e))?;
        Ok(())
    }

    async fn delete_domain(&self, domain_id: u64) -> Result<()> {
        sqlx::query("DELETE FROM domain WHERE id = ?")
            .bind(domain_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete domain", e))?;
        Ok(())
    }

    async fn delete_user_domains(&self, user_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM domain WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete user domains", e))?;
        tracing::debug!(user_id, rows = result.rows_affected(), "Deleted user domains");
        Ok(())
    }
}

#[async_trait]
impl UserStore for MysqlStore {
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM user WHERE id = ?", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find user", e))?;
        Ok(row.map(User::from))
    }

    async fn find_next_user_id_after(&self, after: i64) -> Result<Option<i64>> {
        let next: Option<i64> =
            sqlx::query_scalar("SELECT CAST(MIN(id) AS SIGNED) FROM user WHERE id > ?")
                .bind(after)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("find next user", e))?;
        Ok(next)
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let status = status_for(user);
        sqlx::query(UPDATE_USER)
            .bind(&user.email)
            .bind(user.active)
            .bind(&user.subscription_id)
            .bind(status)
            .bind(Utc::now().naive_utc())
            .bind(status)
            .bind(user.id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("update user", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_row(status: i64) -> UserRow {
        UserRow {
            id: 7,
            email: "owner@example.com".to_string(),
            active: true,
            subscription_id: None,
            status,
            registered_at: None,
        }
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            STATUS_CREATED,
            STATUS_TRIAL_EMAIL_SENT,
            STATUS_LOCK_EMAIL_SENT,
            STATUS_LOCKED,
        ] {
            let user = User::from(user_row(status));
            assert_eq!(status_for(&user), status);
        }
    }

    #[test]
    fn test_subscribed_status() {
        let mut row = user_row(STATUS_SUBSCRIBED);
        row.subscription_id = Some("I-123".to_string());
        let user = User::from(row);

        assert!(user.is_lifecycle_exempt());
        assert!(!user.trial_email_sent);
        assert_eq!(status_for(&user), STATUS_SUBSCRIBED);
    }

    #[test]
    fn test_locked_user_keeps_earlier_steps() {
        let user = User::from(user_row(STATUS_LOCKED));
        assert!(user.trial_email_sent);
        assert!(user.lock_email_sent);
        assert!(user.is_locked());
    }

    #[test]
    fn test_missing_registration_is_epoch() {
        let user = User::from(user_row(STATUS_CREATED));
        assert_eq!(user.registered_at, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_domain_row_defaults() {
        let row = DomainRow {
            id: 10,
            user_id: 7,
            name: "device.example.com".to_string(),
            ip: Some("1.2.3.4".to_string()),
            ipv6: None,
            local_ip: None,
            map_local_address: None,
            dkim_key: None,
            update_token: Some("token".to_string()),
            hosted_zone_id: None,
            last_update: None,
        };

        let domain = Domain::from(row);
        assert!(!domain.map_local_address);
        assert_eq!(domain.hosted_zone_id, "");
        assert_eq!(domain.last_update, None);
        assert_eq!(domain.fqdn(), "device.example.com.");
    }

    #[test]
    fn test_password_not_exposed_in_debug() {
        let config = MysqlConfig {
            host: "db".to_string(),
            port: 3306,
            database: "redirect".to_string(),
            user: "redirect".to_string(),
            password: "hunter2".to_string(),
        };

        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("MysqlConfig"));
    }

    #[test]
    fn test_status_at_only_moves_on_transition() {
        let stamp = UPDATE_USER.find("status_at = IF(status <> ?, ?, status_at)").unwrap();
        let status = UPDATE_USER.find(", status = ?").unwrap();
        assert!(stamp < status);
        assert_eq!(UPDATE_USER.matches('?').count(), 7);
    }
}
