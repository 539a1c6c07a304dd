//! Row types as read from SQLite, kept apart from the lote-types models so
//! the store does not depend on the wire format.

use chrono::{DateTime, NaiveDateTime, Utc};
use lote_types::models::Lote;
use uuid::Uuid;

use crate::StoreError;

/// Stored user. Every column except the id is nullable in the schema;
/// login requires `username` and `password` to be present.
pub struct UserRow {
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct LoteRow {
    pub id: String,
    pub numero_fatura: Option<String>,
    pub nome_produto: Option<String>,
    pub nome_empresa: Option<String>,
    pub referencia: Option<String>,
    pub numero_lote: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub email_enviado: Option<bool>,
    pub user_id: String,
}

impl LoteRow {
    pub fn into_lote(self) -> Result<Lote, StoreError> {
        Ok(Lote {
            id: parse_uuid(&self.id, "id")?,
            user_id: parse_uuid(&self.user_id, "user_id")?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            numero_fatura: self.numero_fatura,
            nome_produto: self.nome_produto,
            nome_empresa: self.nome_empresa,
            referencia: self.referencia,
            numero_lote: self.numero_lote.unwrap_or_default(),
            // NULL is read as "not sent"
            email_enviado: self.email_enviado.unwrap_or(false),
        })
    }
}

fn parse_uuid(value: &str, column: &str) -> Result<Uuid, StoreError> {
    value.parse().map_err(|e| {
        StoreError::Internal(anyhow::anyhow!("Corrupt {} '{}': {}", column, value, e))
    })
}

/// Accepts RFC 3339 (written by the application) and SQLite's
/// `datetime('now')` format "YYYY-MM-DD HH:MM:SS" (column defaults).
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| StoreError::Internal(anyhow::anyhow!("Corrupt timestamp '{}': {}", value, e)))
}
