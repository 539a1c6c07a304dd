use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::resolve_session;
use crate::state::AppState;
use crate::{auth, lotes, pages};

/// Build the application router. Every route sees the resolved session;
/// the ones that need it reject on their own.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::root))
        .route("/health", get(pages::health))
        .route("/login", get(pages::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/dashboard", get(pages::dashboard))
        .route("/api/login", post(auth::api_login))
        .route("/api/batches", get(lotes::list_lotes).post(lotes::create_lote))
        .route("/api/batches/{id}", get(lotes::get_lote))
        .route("/api/batches/{id}/notify", post(lotes::notify_lote))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
