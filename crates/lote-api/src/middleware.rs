use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use lote_types::{api::Claims, models::Identity};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::session::SESSION_COOKIE;
use crate::state::AppState;

/// Resolve the caller from the session cookie or an `Authorization: Bearer`
/// header and attach the verified claims to the request.
///
/// Never rejects: routes decide for themselves whether a session is
/// required (see [`CurrentUser`]). Cookie sessions older than a day are
/// re-issued on the way out.
pub async fn resolve_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let from_cookie = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    // An unusable cookie must not shadow a valid bearer token.
    let cookie_claims = from_cookie
        .as_deref()
        .and_then(|token| state.session.verify(token));
    let via_cookie = cookie_claims.is_some();
    let Some(claims) = cookie_claims.or_else(|| {
        from_header
            .as_deref()
            .and_then(|token| state.session.verify(token))
    }) else {
        return next.run(req).await;
    };

    let renewal = if via_cookie && state.session.needs_renewal(&claims) {
        state
            .session
            .renew(&claims)
            .inspect_err(|e| warn!("Session renewal failed: {}", e))
            .ok()
    } else {
        None
    };

    req.extensions_mut().insert(claims);
    let response = next.run(req).await;

    match renewal {
        // A handler that set its own cookie (logout) wins.
        Some(token) if !response.headers().contains_key(header::SET_COOKIE) => {
            debug!("Renewed session cookie");
            (jar.add(state.session.cookie(token)), response).into_response()
        }
        _ => response,
    }
}

/// The authenticated caller. Extracting it on a request without a valid
/// session rejects with 401; use `Option<CurrentUser>` to decide in the
/// handler instead.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

fn identity_from(parts: &Parts) -> Option<Identity> {
    parts.extensions.get::<Claims>().map(Claims::identity)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from(parts)
            .map(CurrentUser)
            .ok_or(ApiError::Unauthenticated)
    }
}

impl<S> OptionalFromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(identity_from(parts).map(CurrentUser))
    }
}
