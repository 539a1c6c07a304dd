use std::path::PathBuf;

use anyhow::{Context, bail};
use lote_api::notifier::MailSettings;
use lote_api::session::MAX_SESSION_TTL_DAYS;

/// Log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "lote=debug,lote_api=debug,lote_db=info,tower_http=debug";

/// Server settings, read once at startup.
///
/// Mail settings are kept raw; they are validated when a dispatch needs
/// them, so an incomplete mail setup does not stop the server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub session_secret: Option<String>,
    pub session_ttl_days: i64,
    pub mail: MailSettings,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port: u16 = var("LOTE_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("LOTE_PORT must be a port number")?;

        let session_ttl_days: i64 = var("LOTE_SESSION_TTL_DAYS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .context("LOTE_SESSION_TTL_DAYS must be a whole number of days")?;
        if !(1..=MAX_SESSION_TTL_DAYS).contains(&session_ttl_days) {
            bail!("LOTE_SESSION_TTL_DAYS must be between 1 and {MAX_SESSION_TTL_DAYS}");
        }

        Ok(Self {
            host: var("LOTE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: PathBuf::from(var("LOTE_DB_PATH").unwrap_or_else(|| "lotes.db".into())),
            session_secret: var("LOTE_SESSION_SECRET"),
            session_ttl_days,
            mail: MailSettings {
                recipients: var("RECIPIENTS").or_else(|| var("EMAIL_RECIPIENTS")),
                host: var("EMAIL_SERVER_HOST"),
                port: var("EMAIL_SERVER_PORT"),
                from_address: var("EMAIL_FROM_ADDRESS"),
                app_password: var("EMAIL_APP_PASSWORD"),
            },
        })
    }
}

/// Account written by `lote-seed`.
pub struct SeedConfig {
    pub db_path: PathBuf,
    pub username: String,
    pub password: String,
    pub name: String,
}

impl SeedConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            db_path: PathBuf::from(var("LOTE_DB_PATH").unwrap_or_else(|| "lotes.db".into())),
            username: var("SEED_USERNAME").unwrap_or_else(|| "admin".into()),
            password: var("SEED_PASSWORD").context("SEED_PASSWORD must be set")?,
            name: var("SEED_NAME").unwrap_or_else(|| "Admin".into()),
        })
    }
}
