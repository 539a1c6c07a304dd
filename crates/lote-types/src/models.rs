use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated caller, as carried by a session token.
/// Never includes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub name: String,
}

/// A generated batch ("lote").
///
/// Serialized with the field names the dashboard and existing API clients
/// already consume (`numero_lote`, `email_enviado`, `createdAt`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lote {
    pub id: Uuid,
    pub numero_fatura: Option<String>,
    pub nome_produto: Option<String>,
    pub nome_empresa: Option<String>,
    pub referencia: Option<String>,
    pub numero_lote: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    pub email_enviado: bool,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
}

/// Where a batch stands with respect to its one-time e-mail notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Created, notification not sent yet.
    Created,
    /// Notification sent; terminal.
    Notified,
}

impl Lote {
    pub fn dispatch_state(&self) -> DispatchState {
        if self.email_enviado {
            DispatchState::Notified
        } else {
            DispatchState::Created
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

/// Validated input for creating a batch. The label, owner and timestamps
/// are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLote {
    pub numero_fatura: String,
    pub nome_produto: String,
    pub nome_empresa: Option<String>,
    pub referencia: Option<String>,
}
