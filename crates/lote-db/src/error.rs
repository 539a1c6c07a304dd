use rusqlite::{ErrorCode, ffi};
use thiserror::Error;

/// Closed set of store outcomes callers switch on.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A UNIQUE constraint rejected the write. `field` is the column name
    /// reported by SQLite (e.g. `numero_lote`).
    #[error("unique constraint violated on {field}")]
    UniquenessConflict { field: String },

    #[error("storage error: {0}")]
    Internal(#[source] anyhow::Error),
}

impl StoreError {
    pub fn is_conflict_on(&self, column: &str) -> bool {
        matches!(self, Self::UniquenessConflict { field } if field == column)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound,
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation
                    && (failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                        || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
            {
                Self::UniquenessConflict {
                    field: message
                        .as_deref()
                        .map(constraint_column)
                        .unwrap_or_default(),
                }
            }
            _ => Self::Internal(error.into()),
        }
    }
}

/// "UNIQUE constraint failed: lotes.numero_lote" -> "numero_lote"
fn constraint_column(message: &str) -> String {
    message
        .rsplit(['.', ' '])
        .next()
        .unwrap_or_default()
        .to_string()
}
