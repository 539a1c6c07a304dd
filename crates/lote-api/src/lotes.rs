use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use lote_types::{api::CreateLoteRequest, models::Lote};
use tracing::{debug, info, warn};

use crate::dispatch::dispatch;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::state::{AppState, blocking};

/// `GET /api/batches`: the caller's batches, newest first.
pub async fn list_lotes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Lote>>, ApiError> {
    let owner = user.id;
    let lotes = blocking(&state, move |db| db.list_lotes_by_owner(owner)).await?;
    Ok(Json(lotes))
}

/// `POST /api/batches`
pub async fn create_lote(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<CreateLoteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|e| {
        debug!("Rejected batch body: {}", e);
        ApiError::BadRequest("Corpo da requisição inválido".to_string())
    })?;

    let new_lote = req.validate().map_err(ApiError::Validation)?;

    // The label prefix is fixed; a requested one is accepted but not applied.
    if let Some(prefix) = req
        .prefixo_lote
        .as_ref()
        .filter(|p| !p.is_null() && p.as_str() != Some(""))
    {
        debug!("Ignoring requested label prefix {}", prefix);
    }

    let owner = user.id;
    let numero_lote = (state.labels)();
    let lote = blocking(&state, move |db| {
        db.create_lote_with_label(owner, &numero_lote, &new_lote)
    })
    .await?;

    info!("User {} created lote {} ({})", owner, lote.id, lote.numero_lote);

    Ok((StatusCode::CREATED, Json(lote)))
}

/// `GET /api/batches/{id}`
pub async fn get_lote(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Lote>, ApiError> {
    let lote = blocking(&state, move |db| db.get_lote(&id)).await?;

    if !lote.is_owned_by(user.id) {
        warn!("User {} attempted to read lote {}", user.id, lote.id);
        return Err(ApiError::Forbidden("Acesso negado ao lote".to_string()));
    }

    Ok(Json(lote))
}

/// `POST /api/batches/{id}/notify`
pub async fn notify_lote(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Lote>, ApiError> {
    let caller = user.map(|CurrentUser(identity)| identity);
    let lote = dispatch(&state, caller.as_ref(), &id).await?;
    Ok(Json(lote))
}
