use std::sync::Arc;

use axum::{body::Body, http::Response};
use http_body_util::BodyExt;
use lote_db::Database;
use lote_types::models::Identity;
use testresult::TestResult;

use crate::auth::{VerifiedUser, hash_password};
use crate::notifier::{MailSettings, MockNotifier};
use crate::session::{SESSION_COOKIE, SessionConfig};
use crate::state::{AppState, AppStateInner};

pub(crate) const TEST_SECRET: &str = "test-session-secret";
pub(crate) const TEST_PASSWORD: &str = "correct horse battery";

pub(crate) fn state_with(notifier: MockNotifier, mail: MailSettings) -> TestResult<AppState> {
    Ok(AppStateInner::new(
        Database::open_in_memory()?,
        SessionConfig::new(Some(TEST_SECRET.into()), 30),
        mail,
        Arc::new(notifier),
    ))
}

/// A user whose stored hash is not a valid PHC string; enough for
/// session-based tests that never go through the password check.
pub(crate) fn seed_user(state: &AppState, username: &str) -> TestResult<Identity> {
    store_user(state, username, "unused-hash")
}

pub(crate) fn seed_user_with_password(state: &AppState, username: &str) -> TestResult<Identity> {
    store_user(state, username, &hash_password(TEST_PASSWORD)?)
}

fn store_user(state: &AppState, username: &str, hash: &str) -> TestResult<Identity> {
    let name = format!("{username} name");
    let row = state.db.upsert_user(username, &name, hash)?;

    Ok(Identity {
        id: row.id.parse()?,
        username: username.to_string(),
        name,
    })
}

/// `Cookie` header value carrying a fresh session for `user`.
pub(crate) fn session_cookie(state: &AppState, user: &Identity) -> TestResult<String> {
    let token = state.session.issue(&VerifiedUser {
        id: user.id,
        username: Some(user.username.clone()),
        name: Some(user.name.clone()),
    })?;

    Ok(format!("{SESSION_COOKIE}={token}"))
}

pub(crate) async fn body_json(response: Response<Body>) -> TestResult<serde_json::Value> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

pub(crate) async fn body_text(response: Response<Body>) -> TestResult<String> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(String::from_utf8(bytes.to_vec())?)
}
