// # redirectd - Redirect Reconciler Daemon
//
// A THIN integration layer: no DNS logic, lifecycle rules or retry logic
// lives here. Everything the loops do is in redirect-core.
//
// The redirectd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging, metrics and the runtime
// 3. Wiring the MySQL store, Cloudflare client and SMTP mailer into the core
// 4. Starting the dormancy and user lifecycle reconcilers
// 5. Stopping them on SIGTERM/SIGINT
//
// Exactly one redirectd may run against a database. There is no distributed
// lock; two instances would send duplicate mail.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Service
// - `REDIRECT_MAIN_DOMAIN`: Shared parent domain, e.g. example.com
// - `REDIRECT_FREE_HOSTED_ZONE_ID`: Zone hosting every free subdomain
//
// ### DNS Provider
// - `REDIRECT_CLOUDFLARE_API_TOKEN`: API token
// - `REDIRECT_CLOUDFLARE_ACCOUNT_ID`: Account for new zones (optional)
// - `REDIRECT_MODE`: `dry-run` to log DNS writes instead of applying them
// - `REDIRECT_DNS_TTL`: Record TTL in seconds (default 600)
// - `REDIRECT_DNS_CALL_TIMEOUT_SECS`: Per-call limit (default 10, 0 disables)
//
// ### Database
// - `REDIRECT_DB_HOST`, `REDIRECT_DB_PORT` (default 3306)
// - `REDIRECT_DB_NAME`, `REDIRECT_DB_USER`, `REDIRECT_DB_PASSWORD`
//
// ### Mail
// - `REDIRECT_SMTP_HOST`, `REDIRECT_SMTP_PORT` (default 25)
// - `REDIRECT_SMTP_TLS` (default false), `REDIRECT_SMTP_LOGIN`, `REDIRECT_SMTP_PASSWORD`
// - `REDIRECT_MAIL_FROM`: Sender address
// - `REDIRECT_MAIL_SUPPORT`: Blind copy of every notification (optional)
// - `REDIRECT_MAIL_TEMPLATE_DIR`: Directory with the notification templates
// - `REDIRECT_MAIL_CALL_TIMEOUT_SECS`: Per-send limit (default 10, 0 disables)
//
// ### Reconcilers
// - `REDIRECT_DORMANCY_INTERVAL_SECS` (default 10)
// - `REDIRECT_DORMANCY_WINDOW_MONTHS` (default 1)
// - `REDIRECT_LIFECYCLE_ENABLED` (default true)
// - `REDIRECT_LIFECYCLE_INTERVAL_SECS` (default 10)
// - `REDIRECT_LOCK_WARNING_AFTER_DAYS` (default 20)
// - `REDIRECT_LOCK_AFTER_DAYS` (default 30)
//
// ### Cursors
// - `REDIRECT_CURSOR_STORE_TYPE`: file or memory (default file)
// - `REDIRECT_CURSOR_DIR`: Directory for cursor files (default /var/lib/redirect)
//
// ### Observability
// - `REDIRECT_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `REDIRECT_PROMETHEUS_ADDR`: Exporter listen address (`prometheus` feature)
//
// ## Example
//
// ```bash
// export REDIRECT_MAIN_DOMAIN=example.com
// export REDIRECT_FREE_HOSTED_ZONE_ID=023e105f4ecef8ad9ca31a8372d0c353
// export REDIRECT_CLOUDFLARE_API_TOKEN=your_token
// export REDIRECT_DB_HOST=localhost REDIRECT_DB_NAME=redirect REDIRECT_DB_USER=redirect
// export REDIRECT_SMTP_HOST=localhost REDIRECT_MAIL_FROM=support@example.com
// export REDIRECT_MAIL_TEMPLATE_DIR=/etc/redirect/mail
//
// redirectd
// ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use redirect_core::{
    CursorStoreConfig, DnsConfig, DnsSynchronizer, DomainRemover, Domains, DormancyConfig,
    DormancyReconciler, LifecycleConfig, LifecycleReconciler, MailConfig, Mailer,
    RedirectConfig, ReconcilerHandle, ServiceConfig, ZoneClient, cursor,
};
use redirect_mail_smtp::{SmtpConfig, SmtpMailer};
use redirect_provider_cloudflare::CloudflareZoneClient;
use redirect_store_mysql::{MysqlConfig, MysqlStore};
use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound for stopping both reconcilers after a signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_CURSOR_DIR: &str = "/var/lib/redirect";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum RedirectExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<RedirectExitCode> for ExitCode {
    fn from(code: RedirectExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    redirect: RedirectConfig,
    cloudflare_api_token: String,
    cloudflare_account_id: Option<String>,
    dry_run: bool,
    mysql: MysqlConfig,
    smtp: SmtpConfig,
    log_level: String,
    prometheus_addr: Option<SocketAddr>,
}

/// Typed environment lookups with defaults
struct Env<F> {
    get: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.get)(name).filter(|value| !value.is_empty())
    }

    fn required(&self, name: &str) -> Result<String> {
        self.string(name)
            .with_context(|| format!("{} is required. Set it via: export {}=...", name, name))
    }

    fn or(&self, name: &str, default: &str) -> String {
        self.string(name).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(name) {
            Some(value) => value
                .parse()
                .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, value, e)),
            None => Ok(default),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env { get };

        let dns_defaults = DnsConfig::default();
        let dns = DnsConfig {
            ttl_secs: env.parse("REDIRECT_DNS_TTL", dns_defaults.ttl_secs)?,
            call_timeout_secs: env.parse(
                "REDIRECT_DNS_CALL_TIMEOUT_SECS",
                dns_defaults.call_timeout_secs,
            )?,
            ..dns_defaults
        };

        let dormancy_defaults = DormancyConfig::default();
        let dormancy = DormancyConfig {
            interval_secs: env.parse(
                "REDIRECT_DORMANCY_INTERVAL_SECS",
                dormancy_defaults.interval_secs,
            )?,
            window_months: env.parse(
                "REDIRECT_DORMANCY_WINDOW_MONTHS",
                dormancy_defaults.window_months,
            )?,
        };

        let lifecycle_defaults = LifecycleConfig::default();
        let lifecycle = LifecycleConfig {
            enabled: env.parse("REDIRECT_LIFECYCLE_ENABLED", lifecycle_defaults.enabled)?,
            interval_secs: env.parse(
                "REDIRECT_LIFECYCLE_INTERVAL_SECS",
                lifecycle_defaults.interval_secs,
            )?,
            lock_warning_after_days: env.parse(
                "REDIRECT_LOCK_WARNING_AFTER_DAYS",
                lifecycle_defaults.lock_warning_after_days,
            )?,
            lock_after_days: env.parse(
                "REDIRECT_LOCK_AFTER_DAYS",
                lifecycle_defaults.lock_after_days,
            )?,
        };

        let mail = MailConfig {
            call_timeout_secs: env.parse(
                "REDIRECT_MAIL_CALL_TIMEOUT_SECS",
                MailConfig::default().call_timeout_secs,
            )?,
        };

        let main_domain = env.required("REDIRECT_MAIN_DOMAIN")?;
        let service = ServiceConfig {
            main_domain: main_domain.clone(),
            free_hosted_zone_id: env.required("REDIRECT_FREE_HOSTED_ZONE_ID")?,
        };

        let (dormancy_cursor, lifecycle_cursor) = match env
            .or("REDIRECT_CURSOR_STORE_TYPE", "file")
            .as_str()
        {
            "file" => {
                let dir = env.or("REDIRECT_CURSOR_DIR", DEFAULT_CURSOR_DIR);
                let path = |name: &str| Path::new(&dir).join(name).display().to_string();
                (
                    CursorStoreConfig::File {
                        path: path("dormancy.json"),
                    },
                    CursorStoreConfig::File {
                        path: path("lifecycle.json"),
                    },
                )
            }
            "memory" => (CursorStoreConfig::Memory, CursorStoreConfig::Memory),
            other => anyhow::bail!(
                "REDIRECT_CURSOR_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                other
            ),
        };

        let mysql = MysqlConfig {
            host: env.required("REDIRECT_DB_HOST")?,
            port: env.parse("REDIRECT_DB_PORT", 3306)?,
            database: env.required("REDIRECT_DB_NAME")?,
            user: env.required("REDIRECT_DB_USER")?,
            password: env.or("REDIRECT_DB_PASSWORD", ""),
        };

        let smtp = SmtpConfig {
            host: env.required("REDIRECT_SMTP_HOST")?,
            port: env.parse("REDIRECT_SMTP_PORT", 25)?,
            tls: env.parse("REDIRECT_SMTP_TLS", false)?,
            login: env.or("REDIRECT_SMTP_LOGIN", ""),
            password: env.or("REDIRECT_SMTP_PASSWORD", ""),
            from: env.required("REDIRECT_MAIL_FROM")?,
            support_address: env.string("REDIRECT_MAIL_SUPPORT"),
            template_dir: env.required("REDIRECT_MAIL_TEMPLATE_DIR")?,
            main_domain,
        };

        let prometheus_addr = env
            .string("REDIRECT_PROMETHEUS_ADDR")
            .map(|addr| {
                addr.parse::<SocketAddr>().map_err(|e| {
                    anyhow::anyhow!("REDIRECT_PROMETHEUS_ADDR '{}' is invalid: {}", addr, e)
                })
            })
            .transpose()?;

        Ok(Self {
            redirect: RedirectConfig {
                dns,
                dormancy,
                lifecycle,
                mail,
                service,
                dormancy_cursor,
                lifecycle_cursor,
            },
            cloudflare_api_token: env.required("REDIRECT_CLOUDFLARE_API_TOKEN")?,
            cloudflare_account_id: env.string("REDIRECT_CLOUDFLARE_ACCOUNT_ID"),
            dry_run: env.or("REDIRECT_MODE", "live").eq_ignore_ascii_case("dry-run"),
            mysql,
            smtp,
            log_level: env.or("REDIRECT_LOG_LEVEL", "info"),
            prometheus_addr,
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.redirect.validate()?;

        // Check for obvious placeholder tokens (common mistake)
        let token_lower = self.cloudflare_api_token.to_lowercase();
        if token_lower.contains("your_token") || token_lower.contains("replace_me") {
            anyhow::bail!(
                "REDIRECT_CLOUDFLARE_API_TOKEN appears to be a placeholder. \
                Use an actual API token from Cloudflare."
            );
        }

        if self.smtp.tls && self.smtp.login.is_empty() {
            anyhow::bail!("REDIRECT_SMTP_LOGIN is required when REDIRECT_SMTP_TLS=true");
        }

        for cursor in [&self.redirect.dormancy_cursor, &self.redirect.lifecycle_cursor] {
            if let CursorStoreConfig::File { path } = cursor
                && let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                anyhow::bail!(
                    "REDIRECT_CURSOR_DIR does not exist: {}. \
                    Create it first: sudo mkdir -p {}",
                    parent.display(),
                    parent.display()
                );
            }
        }

        if cfg!(not(feature = "prometheus")) && self.prometheus_addr.is_some() {
            eprintln!(
                "WARNING: REDIRECT_PROMETHEUS_ADDR is set but redirectd was built \
                without the prometheus feature. Metrics are not exported."
            );
        }

        log_level(&self.log_level)?;
        Ok(())
    }
}

fn log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "REDIRECT_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return RedirectExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return RedirectExitCode::ConfigError.into();
    }

    // Initialize tracing
    let level = log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RedirectExitCode::ConfigError.into();
    }

    info!("Starting redirectd daemon");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RedirectExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let handles = match start_daemon(config).await {
            Ok(handles) => handles,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return RedirectExitCode::ConfigError;
            }
        };

        if let Err(e) = run_until_shutdown(handles).await {
            error!("Daemon error: {:#}", e);
            RedirectExitCode::RuntimeError
        } else {
            RedirectExitCode::CleanShutdown
        }
    });

    result.into()
}

#[cfg(feature = "prometheus")]
fn start_prometheus_exporter(addr: SocketAddr) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to start Prometheus exporter")?;

    info!(%addr, "Prometheus metrics exporter started");
    Ok(())
}

/// Wire collaborators and start both reconcilers
async fn start_daemon(config: Config) -> Result<Vec<ReconcilerHandle>> {
    #[cfg(feature = "prometheus")]
    if let Some(addr) = config.prometheus_addr {
        start_prometheus_exporter(addr)?;
    }

    let redirect = config.redirect;

    let zone_client: Arc<dyn ZoneClient> = Arc::new(
        CloudflareZoneClient::new(
            config.cloudflare_api_token,
            config.cloudflare_account_id,
            config.dry_run,
        )
        .context("Failed to create Cloudflare client")?,
    );
    info!("DNS provider: {}", zone_client.provider_name());

    let store = Arc::new(MysqlStore::connect_lazy(&config.mysql));
    let mailer: Arc<dyn Mailer> =
        Arc::new(SmtpMailer::new(&config.smtp).context("Failed to create SMTP mailer")?);

    let dns = Arc::new(DnsSynchronizer::new(zone_client, redirect.dns.clone()));
    let remover: Arc<dyn DomainRemover> = Arc::new(Domains::new(
        store.clone(),
        store.clone(),
        dns.clone(),
        redirect.service.clone(),
    ));

    let dormancy_cursor = cursor::from_config::<DateTime<Utc>>(&redirect.dormancy_cursor)
        .await
        .context("Failed to open dormancy cursor")?;
    let lifecycle_cursor = cursor::from_config::<i64>(&redirect.lifecycle_cursor)
        .await
        .context("Failed to open lifecycle cursor")?;

    let mail_timeout = redirect.mail.call_timeout();
    let mut handles = Vec::new();

    let dormancy = Arc::new(
        DormancyReconciler::new(
            store.clone(),
            store.clone(),
            dns,
            mailer.clone(),
            dormancy_cursor,
            redirect.dormancy.clone(),
        )
        .with_mail_timeout(mail_timeout),
    );
    handles.push(dormancy.start());

    let lifecycle = Arc::new(
        LifecycleReconciler::new(
            store,
            mailer,
            remover,
            lifecycle_cursor,
            redirect.lifecycle.clone(),
        )
        .with_mail_timeout(mail_timeout),
    );
    if let Some(handle) = lifecycle.start() {
        handles.push(handle);
    }

    info!("Daemon initialized: {} reconciler(s) running", handles.len());
    Ok(handles)
}

/// Wait for a shutdown signal, then stop every reconciler between ticks
async fn run_until_shutdown(handles: Vec<ReconcilerHandle>) -> Result<()> {
    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    let stop_all = async {
        for handle in handles {
            let name = handle.name();
            handle.stop().await;
            info!("Stopped {}", name);
        }
    };

    tokio::time::timeout(SHUTDOWN_TIMEOUT, stop_all)
        .await
        .map_err(|_| anyhow::anyhow!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT))?;

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("REDIRECT_MAIN_DOMAIN", "example.com"),
            ("REDIRECT_FREE_HOSTED_ZONE_ID", "zone-free"),
            ("REDIRECT_CLOUDFLARE_API_TOKEN", "cf-token-0123456789abcdef"),
            ("REDIRECT_DB_HOST", "localhost"),
            ("REDIRECT_DB_NAME", "redirect"),
            ("REDIRECT_DB_USER", "redirect"),
            ("REDIRECT_SMTP_HOST", "localhost"),
            ("REDIRECT_MAIL_FROM", "support@example.com"),
            ("REDIRECT_MAIL_TEMPLATE_DIR", "/etc/redirect/mail"),
            ("REDIRECT_CURSOR_STORE_TYPE", "memory"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_lookup(|name| vars.get(name).map(|value| value.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base()).unwrap();

        assert_eq!(config.redirect.dns.ttl_secs, 600);
        assert_eq!(config.redirect.dormancy.window_months, 1);
        assert!(config.redirect.lifecycle.enabled);
        assert_eq!(config.mysql.port, 3306);
        assert_eq!(config.smtp.main_domain, "example.com");
        assert!(!config.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_required_value() {
        let mut vars = base();
        vars.remove("REDIRECT_FREE_HOSTED_ZONE_ID");

        let err = load(&vars).err().unwrap();
        assert!(err.to_string().contains("REDIRECT_FREE_HOSTED_ZONE_ID"));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut vars = base();
        vars.insert("REDIRECT_LOCK_AFTER_DAYS", "thirty");

        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_lock_before_warning_fails_validation() {
        let mut vars = base();
        vars.insert("REDIRECT_LOCK_WARNING_AFTER_DAYS", "30");
        vars.insert("REDIRECT_LOCK_AFTER_DAYS", "20");

        assert!(load(&vars).unwrap().validate().is_err());
    }

    #[test]
    fn test_file_cursors_under_dir() {
        let mut vars = base();
        vars.insert("REDIRECT_CURSOR_STORE_TYPE", "file");
        vars.insert("REDIRECT_CURSOR_DIR", "/tmp");

        let config = load(&vars).unwrap();
        assert!(matches!(
            config.redirect.lifecycle_cursor,
            CursorStoreConfig::File { ref path } if path == "/tmp/lifecycle.json"
        ));
    }

    #[test]
    fn test_dry_run_and_log_level() {
        let mut vars = base();
        vars.insert("REDIRECT_MODE", "dry-run");
        vars.insert("REDIRECT_LOG_LEVEL", "verbose");

        let config = load(&vars).unwrap();
        assert!(config.dry_run);
        assert!(config.validate().is_err());
    }
}
