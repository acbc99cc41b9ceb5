use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{session_error, AppResult};

/// Name of the cookie carrying the signed session id
pub const SESSION_COOKIE: &str = "eventelf_session";

/// Claims inside the session cookie
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Session id
    pub sub: String,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
}

/// Signs and verifies session cookies
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_minutes: i64,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_minutes,
        }
    }

    /// A fresh random session id
    pub fn new_session_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Sign a session id into a cookie value
    pub fn sign(&self, session_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = Duration::try_minutes(self.ttl_minutes)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| session_error("session TTL is out of range"))?;

        let claims = SessionClaims {
            sub: session_id.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| session_error(&format!("Failed to sign session cookie: {}", e)))
    }

    /// Verify a cookie value and return the session id it carries
    pub fn verify(&self, token: &str) -> Option<String> {
        decode::<SessionClaims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims.sub)
            .map_err(|e| debug!("Rejected session cookie: {:?}", e))
            .ok()
    }

    /// Session id from the request cookies, if a valid one is present
    pub fn session_id_from(&self, jar: &CookieJar) -> Option<String> {
        jar.get(SESSION_COOKIE)
            .and_then(|cookie| self.verify(cookie.value()))
    }

    /// Build the `Set-Cookie` value for a session id
    pub fn cookie_for(&self, session_id: &str) -> AppResult<Cookie<'static>> {
        let value = self.sign(session_id)?;
        Ok(Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::minutes(self.ttl_minutes))
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let keys = SessionKeys::new(b"secret", 60);
        let id = SessionKeys::new_session_id();

        let token = keys.sign(&id).unwrap();

        assert_eq!(keys.verify(&token), Some(id));
    }

    /// A cookie signed with another key is treated as no session at all
    #[test]
    fn test_foreign_signature_is_rejected() {
        let ours = SessionKeys::new(b"secret", 60);
        let theirs = SessionKeys::new(b"other-secret", 60);

        let token = theirs.sign("abc").unwrap();

        assert_eq!(ours.verify(&token), None);
        assert_eq!(ours.verify("not-a-jwt"), None);
    }

    #[test]
    fn test_expired_cookie_is_rejected() {
        // Past the default 60 second leeway
        let keys = SessionKeys::new(b"secret", -5);
        let token = keys.sign("abc").unwrap();
        assert_eq!(keys.verify(&token), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let keys = SessionKeys::new(b"secret", 30);
        let cookie = keys.cookie_for("abc").unwrap();

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));

        let jar = CookieJar::new().add(cookie);
        assert_eq!(keys.session_id_from(&jar), Some("abc".to_string()));
    }

    #[test]
    fn test_out_of_range_ttl_is_an_error() {
        let keys = SessionKeys::new(b"secret", i64::MAX);

        assert!(keys.sign("abc").is_err());
    }
}
