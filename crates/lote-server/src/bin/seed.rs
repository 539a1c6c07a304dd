//! Create or update the login account described by `SEED_USERNAME`,
//! `SEED_PASSWORD` and `SEED_NAME`.

use tracing::info;

use lote_api::auth::hash_password;
use lote_db::Database;
use lote_server::config::{DEFAULT_LOG_FILTER, SeedConfig};

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let config = SeedConfig::from_env()?;
    let db = Database::open(&config.db_path)?;

    let password_hash = hash_password(&config.password)?;
    let user = db.upsert_user(&config.username, &config.name, &password_hash)?;

    info!("Seeded user '{}' ({})", config.username, user.id);

    Ok(())
}
