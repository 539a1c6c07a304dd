use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Form, Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use lote_db::{Database, StoreError};
use lote_types::api::{LoginForm, LoginRequest, LoginResponse};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::session::SessionConfig;
use crate::state::AppState;

/// Where a successful form login lands when no usable callback is given.
pub const DEFAULT_LANDING: &str = "/dashboard";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("session secret is not configured")]
    SessionUnavailable,

    #[error("session expiry out of range")]
    ExpiryOutOfRange,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingCredentials => {
                ApiError::BadRequest("Usuário e senha são obrigatórios".to_string())
            }
            AuthError::InvalidCredentials => ApiError::Unauthenticated,
            AuthError::Store(e) => ApiError::from(e),
            other => ApiError::Internal(other.into()),
        }
    }
}

/// Identity projection of a user whose password just checked out.
/// Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedUser {
    pub id: Uuid,
    pub username: Option<String>,
    pub name: Option<String>,
}

/// Check a login name and password against the store.
///
/// Unknown users, users without a stored hash and wrong passwords all
/// produce the same `InvalidCredentials`. Blocking: argon2 is CPU-bound.
pub fn verify_credentials(
    db: &Database,
    username: &str,
    password: &str,
) -> Result<VerifiedUser, AuthError> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    let user = db
        .get_user_by_username(username)?
        .ok_or(AuthError::InvalidCredentials)?;

    let stored = user
        .password
        .as_deref()
        .ok_or(AuthError::InvalidCredentials)?;

    let parsed_hash = PasswordHash::new(stored).map_err(|e| {
        warn!("Stored password hash for '{}' is unreadable: {}", username, e);
        AuthError::InvalidCredentials
    })?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)?;

    let id = user
        .id
        .parse()
        .map_err(|e: uuid::Error| AuthError::Store(StoreError::Internal(e.into())))?;

    Ok(VerifiedUser {
        id,
        username: user.username,
        name: user.name,
    })
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

async fn verify_blocking(
    state: &AppState,
    username: String,
    password: String,
) -> Result<VerifiedUser, AuthError> {
    let db = state.clone();
    tokio::task::spawn_blocking(move || verify_credentials(&db.db, &username, &password))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            AuthError::Store(StoreError::Internal(e.into()))
        })?
}

/// Only same-origin paths are accepted as post-login destinations.
pub fn safe_callback(callback: Option<&str>) -> &str {
    match callback {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => DEFAULT_LANDING,
    }
}

fn issue_cookie(session: &SessionConfig, user: &VerifiedUser, jar: CookieJar) -> Result<CookieJar, AuthError> {
    let token = session.issue(user)?;
    Ok(jar.add(session.cookie(token)))
}

/// `POST /login`: form exchange. Always answers with a redirect; failures
/// land back on the login page with an `error` code it knows how to render.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    if !state.session.is_enabled() {
        error!("Login attempted while the session secret is not configured");
        return Redirect::to("/login?error=Configuration").into_response();
    }

    let outcome = verify_blocking(&state, form.username.clone(), form.password)
        .await
        .and_then(|user| issue_cookie(&state.session, &user, jar).map(|jar| (user, jar)));

    match outcome {
        Ok((user, jar)) => {
            info!("User '{}' signed in", form.username);
            debug!("Session issued for {}", user.id);
            let target = safe_callback(form.callback_url.as_deref());
            (jar, Redirect::to(target)).into_response()
        }
        Err(AuthError::MissingCredentials | AuthError::InvalidCredentials) => {
            info!("Rejected sign-in for '{}'", form.username);
            Redirect::to("/login?error=CredentialsSignin").into_response()
        }
        Err(e) => {
            error!("Sign-in failed: {}", e);
            Redirect::to("/login?error=Configuration").into_response()
        }
    }
}

/// `POST /api/login`: JSON exchange for API clients.
pub async fn api_login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = body.map_err(|e| {
        debug!("Rejected login body: {}", e);
        ApiError::BadRequest("Corpo da requisição inválido".to_string())
    })?;

    let user = verify_blocking(
        &state,
        req.username.unwrap_or_default(),
        req.password.unwrap_or_default(),
    )
    .await?;

    let token = state.session.issue(&user)?;
    let claims = state
        .session
        .verify(&token)
        .ok_or(AuthError::SessionUnavailable)?;

    Ok(Json(LoginResponse {
        token,
        user: claims.identity(),
    }))
}

/// `POST /logout`: drop the session cookie.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (jar.remove(SessionConfig::removal_cookie()), Redirect::to("/login"))
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn db_with_admin(password_hash: &str) -> TestResult<Database> {
        let db = Database::open_in_memory()?;
        db.upsert_user("admin", "Admin", password_hash)?;
        Ok(db)
    }

    #[test]
    fn correct_password_yields_identity() -> TestResult {
        let db = db_with_admin(&hash_password("s3cret")?)?;

        let user = verify_credentials(&db, "admin", "s3cret")?;

        assert_eq!(user.username.as_deref(), Some("admin"));
        assert_eq!(user.name.as_deref(), Some("Admin"));

        Ok(())
    }

    #[test]
    fn wrong_password_and_unknown_user_look_the_same() -> TestResult {
        let db = db_with_admin(&hash_password("s3cret")?)?;

        assert!(matches!(
            verify_credentials(&db, "admin", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            verify_credentials(&db, "nobody", "s3cret"),
            Err(AuthError::InvalidCredentials)
        ));

        Ok(())
    }

    #[test]
    fn empty_inputs_skip_the_lookup() -> TestResult {
        let db = Database::open_in_memory()?;

        assert!(matches!(
            verify_credentials(&db, "", "x"),
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            verify_credentials(&db, "admin", ""),
            Err(AuthError::MissingCredentials)
        ));

        Ok(())
    }

    #[test]
    fn hash_password_salts_each_hash() -> TestResult {
        let first = hash_password("s3cret")?;
        let second = hash_password("s3cret")?;

        assert!(first.starts_with("$argon2id$"), "{first}");
        assert_ne!(first, second);

        Ok(())
    }

    #[test]
    fn unreadable_hash_is_invalid_credentials() -> TestResult {
        let db = db_with_admin("not-a-phc-string")?;

        assert!(matches!(
            verify_credentials(&db, "admin", "anything"),
            Err(AuthError::InvalidCredentials)
        ));

        Ok(())
    }

    #[test]
    fn callback_must_be_a_local_path() {
        assert_eq!(safe_callback(Some("/dashboard?x=1")), "/dashboard?x=1");
        assert_eq!(safe_callback(Some("https://evil.example")), DEFAULT_LANDING);
        assert_eq!(safe_callback(Some("//evil.example")), DEFAULT_LANDING);
        assert_eq!(safe_callback(Some("/\\evil.example")), DEFAULT_LANDING);
        assert_eq!(safe_callback(None), DEFAULT_LANDING);
    }
}
