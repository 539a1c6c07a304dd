use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lote_db::StoreError;
use lote_types::api::{ErrorResponse, FieldError};
use thiserror::Error;
use tracing::error;

use crate::notifier::{ConfigError, NotifyError};

/// Every failure a request can end in. Converted into a status code and a
/// `{"message": ...}` body at the handler boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid request body")]
    Validation(Vec<FieldError>),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("mail transport failure: {0}")]
    TransportFailure(#[from] NotifyError),

    #[error("internal error: {0:#}")]
    Internal(#[source] anyhow::Error),
}

pub const LABEL_CONFLICT_MESSAGE: &str = "Erro ao gerar número de lote único, tente novamente.";

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Configuration(_) | Self::TransportFailure(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing text. Server-side failures get a generic message so
    /// transport settings never leak.
    fn public_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Não autorizado".to_string(),
            Self::Validation(_) => "Dados inválidos".to_string(),
            Self::BadRequest(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Configuration(_) | Self::TransportFailure(_) => {
                "Erro interno no servidor ao processar o envio.".to_string()
            }
            Self::Internal(_) => "Erro interno no servidor.".to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::NotFound("Lote não encontrado".to_string()),
            StoreError::UniquenessConflict { field } if field == "numero_lote" => {
                Self::Conflict(LABEL_CONFLICT_MESSAGE.to_string())
            }
            StoreError::UniquenessConflict { field } => {
                Self::Conflict(format!("Valor duplicado para {field}"))
            }
            StoreError::Internal(source) => Self::Internal(source),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!("{}", self);
        }

        let body = ErrorResponse {
            message: self.public_message(),
            errors: match self {
                Self::Validation(errors) => errors,
                _ => Vec::new(),
            },
        };

        (status, Json(body)).into_response()
    }
}
