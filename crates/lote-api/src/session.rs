//! Stateless signed session tokens (HS256 JWT), carried in a cookie or a
//! bearer header. Nothing is stored server-side.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use lote_types::api::Claims;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{AuthError, VerifiedUser};

pub const SESSION_COOKIE: &str = "lote_session";

/// Display name stored in the token when the user has none.
pub const DEFAULT_DISPLAY_NAME: &str = "Usuário";

/// Tokens older than this are re-issued on the next authenticated request.
const RENEW_AFTER_SECS: i64 = 24 * 60 * 60;

/// Upper bound on the session lifetime, in days.
pub const MAX_SESSION_TTL_DAYS: i64 = 3650;

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Clone)]
pub struct SessionConfig {
    secret: Option<String>,
    ttl: Duration,
}

impl SessionConfig {
    /// A missing, blank or placeholder secret leaves the issuer disabled:
    /// logins and authenticated routes then fail closed.
    pub fn new(secret: Option<String>, ttl_days: i64) -> Self {
        let secret = secret.filter(|s| {
            let usable = !s.trim().is_empty() && !PLACEHOLDER_SECRETS.contains(&s.as_str());
            if !usable {
                warn!("Session secret is blank or a placeholder; sessions are disabled");
            }
            usable
        });

        let clamped = ttl_days.clamp(1, MAX_SESSION_TTL_DAYS);
        if clamped != ttl_days {
            warn!("Session lifetime of {} days clamped to {}", ttl_days, clamped);
        }

        Self {
            secret,
            ttl: Duration::days(clamped),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Issue a token for a freshly verified user. Absent login or display
    /// names are normalized so every token carries the same claim set.
    pub fn issue(&self, user: &VerifiedUser) -> Result<String, AuthError> {
        self.sign(
            user.id,
            user.username.clone().unwrap_or_default(),
            user.name
                .clone()
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
        )
    }

    /// Re-issue with the same identity claims and a fresh expiry.
    pub fn renew(&self, claims: &Claims) -> Result<String, AuthError> {
        self.sign(claims.sub, claims.username.clone(), claims.name.clone())
    }

    fn sign(&self, sub: Uuid, username: String, name: String) -> Result<String, AuthError> {
        let secret = self.secret.as_deref().ok_or(AuthError::SessionUnavailable)?;
        let now = Utc::now();
        let expires = now
            .checked_add_signed(self.ttl)
            .ok_or(AuthError::ExpiryOutOfRange)?;

        let claims = Claims {
            sub,
            username,
            name,
            iat: now.timestamp() as usize,
            exp: expires.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?)
    }

    /// Verify signature and expiry. Any failure means "no session".
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let secret = self.secret.as_deref()?;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| debug!("Rejected session token: {}", e))
        .ok()
        .map(|data| data.claims)
    }

    pub fn needs_renewal(&self, claims: &Claims) -> bool {
        Utc::now().timestamp() - claims.iat as i64 > RENEW_AFTER_SECS
    }

    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.ttl.num_seconds()))
            .build()
    }

    pub fn removal_cookie() -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, "")).path("/").build()
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn verified(username: Option<&str>, name: Option<&str>) -> VerifiedUser {
        VerifiedUser {
            id: Uuid::new_v4(),
            username: username.map(str::to_string),
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn issued_token_round_trips_identity() -> TestResult {
        let config = SessionConfig::new(Some("test-secret".into()), 30);
        let user = verified(Some("admin"), Some("Admin"));

        let claims = config
            .verify(&config.issue(&user)?)
            .ok_or("token did not verify")?;

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.name, "Admin");
        assert!(claims.exp > claims.iat);

        Ok(())
    }

    #[test]
    fn absent_names_are_normalized() -> TestResult {
        let config = SessionConfig::new(Some("test-secret".into()), 30);

        let claims = config
            .verify(&config.issue(&verified(None, None))?)
            .ok_or("token did not verify")?;

        assert_eq!(claims.username, "");
        assert_eq!(claims.name, DEFAULT_DISPLAY_NAME);

        Ok(())
    }

    #[test]
    fn placeholder_secret_disables_sessions() {
        let config = SessionConfig::new(Some("dev-secret-change-me".into()), 30);

        assert!(!config.is_enabled());
        assert!(matches!(
            config.issue(&verified(Some("admin"), None)),
            Err(AuthError::SessionUnavailable)
        ));
        assert!(config.verify("anything").is_none());
    }

    #[test]
    fn token_from_other_secret_is_rejected() -> TestResult {
        let issuer = SessionConfig::new(Some("secret-a".into()), 30);
        let verifier = SessionConfig::new(Some("secret-b".into()), 30);

        let token = issuer.issue(&verified(Some("admin"), None))?;

        assert!(verifier.verify(&token).is_none());

        Ok(())
    }

    #[test]
    fn oversized_lifetime_is_clamped() -> TestResult {
        let config = SessionConfig::new(Some("test-secret".into()), 200_000_000);

        let claims = config
            .verify(&config.issue(&verified(Some("admin"), None))?)
            .ok_or("token did not verify")?;

        assert_eq!(
            (claims.exp - claims.iat) as i64,
            MAX_SESSION_TTL_DAYS * 24 * 60 * 60
        );

        Ok(())
    }

    #[test]
    fn renewal_due_after_a_day() {
        let config = SessionConfig::new(Some("test-secret".into()), 30);
        let now = Utc::now().timestamp() as usize;
        let mut claims = Claims {
            sub: Uuid::nil(),
            username: "admin".into(),
            name: "Admin".into(),
            iat: now,
            exp: now + 3600,
        };

        assert!(!config.needs_renewal(&claims));

        claims.iat = now - 2 * 24 * 60 * 60;
        assert!(config.needs_renewal(&claims));
    }
}
