use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Identity, NewLote};

// -- Session claims --

/// Claims carried by the signed session token. Shared by the issuer
/// (login) and the verifier (auth middleware).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub name: String,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.sub,
            username: self.username.clone(),
            name: self.name.clone(),
        }
    }
}

// -- Auth --

/// HTML login form body (`application/x-www-form-urlencoded`).
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "callbackUrl", default)]
    pub callback_url: Option<String>,
}

/// JSON login body for API clients.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Identity,
}

// -- Batches --

/// Body of `POST /api/batches`.
///
/// `quantidade` and `prefixo_lote` are collected by the dashboard but are
/// not persisted and do not influence the generated label, so any JSON
/// value is accepted for them.
#[derive(Debug, Default, Deserialize)]
pub struct CreateLoteRequest {
    pub numero_fatura: Option<String>,
    pub nome_produto: Option<String>,
    pub nome_empresa: Option<String>,
    pub referencia: Option<String>,
    pub quantidade: Option<serde_json::Value>,
    pub prefixo_lote: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn required(field: &str) -> Self {
        Self {
            field: field.to_string(),
            message: "Campo obrigatório".to_string(),
        }
    }
}

impl CreateLoteRequest {
    /// Trim every text field, drop blank optionals and require the
    /// invoice number and product name.
    pub fn validate(&self) -> Result<NewLote, Vec<FieldError>> {
        let numero_fatura = non_blank(&self.numero_fatura);
        let nome_produto = non_blank(&self.nome_produto);

        let mut errors = Vec::new();
        if numero_fatura.is_none() {
            errors.push(FieldError::required("numero_fatura"));
        }
        if nome_produto.is_none() {
            errors.push(FieldError::required("nome_produto"));
        }

        match (numero_fatura, nome_produto) {
            (Some(numero_fatura), Some(nome_produto)) => Ok(NewLote {
                numero_fatura,
                nome_produto,
                nome_empresa: non_blank(&self.nome_empresa),
                referencia: non_blank(&self.referencia),
            }),
            _ => Err(errors),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}
