use std::sync::Arc;

use lote_db::{Database, StoreError, label};
use tracing::error;

use crate::notifier::{MailSettings, Notifier};
use crate::session::SessionConfig;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub session: SessionConfig,
    pub mail: MailSettings,
    pub notifier: Arc<dyn Notifier>,
    /// Source of new batch labels.
    pub labels: fn() -> String,
}

impl AppStateInner {
    pub fn new(
        db: Database,
        session: SessionConfig,
        mail: MailSettings,
        notifier: Arc<dyn Notifier>,
    ) -> AppState {
        Arc::new(Self {
            db,
            session,
            mail,
            notifier,
            labels: label::generate,
        })
    }
}

/// Run a store call off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StoreError::Internal(e.into())
        })?
}
