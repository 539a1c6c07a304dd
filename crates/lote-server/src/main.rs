use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};

use lote_api::notifier::SmtpNotifier;
use lote_api::router;
use lote_api::session::SessionConfig;
use lote_api::state::AppStateInner;
use lote_db::Database;
use lote_server::config::{DEFAULT_LOG_FILTER, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    // Config
    let config = ServerConfig::from_env()?;

    if config.session_secret.is_none() {
        error!("LOTE_SESSION_SECRET is not set; sign-in and authenticated routes will fail");
    }
    if let Err(e) = config.mail.validate() {
        warn!("Mail settings incomplete ({}); notifications will fail until fixed", e);
    }

    // Init database
    let db = Database::open(&config.db_path)?;

    let state = AppStateInner::new(
        db,
        SessionConfig::new(config.session_secret, config.session_ttl_days),
        config.mail,
        Arc::new(SmtpNotifier),
    );

    let app = router::app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Lote server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await;
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received Ctrl+C, shutting down...");
    }
}
