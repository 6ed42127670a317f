/*!
 * # Authentication and Authorization Module
 *
 * Username/password accounts with server-side sessions:
 *
 * - argon2 password hashing
 * - opaque random session tokens, stored only as SHA-256 digests
 * - single-use password reset tokens with expiry
 *
 * Requests authenticate with `Authorization: Bearer <token>` or the
 * `session_id` cookie set at login. [`AuthUser`] and [`AdminUser`] are the
 * extractors handlers use to gate access.
 */

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{errors::ServiceError, AppState};

pub mod password_reset_token;
pub mod session;
pub mod user;

mod password;

pub use password::{hash_password, verify_password};

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session_id";

const TOKEN_BYTES: usize = 32;

/// Generates a random 256-bit token, hex encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 hex digest used to store tokens at rest
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Authenticated user resolved from a live session
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

/// Authenticated user that is also an active administrator
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Pulls the raw session token from the bearer header or the session cookie.
pub async fn extract_session_token(parts: &mut Parts, state: &AppState) -> Option<String> {
    if let Some(token) = bearer_token(parts) {
        return Some(token);
    }

    let cookies = Cookies::from_request_parts(parts, state).await.ok()?;
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(parts, state)
            .await
            .ok_or_else(|| ServiceError::Unauthorized("Sesión requerida".to_string()))?;

        state.services.accounts.resolve_session(&token).await
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state)
            .await
            .map_err(|_| forbidden())?;

        if !user.is_admin {
            tracing::debug!(username = %user.username, "admin route refused");
            return Err(forbidden());
        }

        Ok(AdminUser(user))
    }
}

/// Raw session token of the request, if it carries one
#[derive(Debug, Clone)]
pub struct SessionToken(pub Option<String>);

#[async_trait]
impl FromRequestParts<AppState> for SessionToken {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(SessionToken(extract_session_token(parts, state).await))
    }
}

fn forbidden() -> ServiceError {
    ServiceError::Forbidden("Acceso restringido a administradores".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn tokens_are_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_hash_is_stable_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn bearer_header_is_parsed() {
        let (parts, _) = Request::builder()
            .header(header::AUTHORIZATION, "Bearer  tok123 ")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts).as_deref(), Some("tok123"));

        let (parts, _) = Request::builder()
            .header(header::AUTHORIZATION, "Basic abc")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), None);
    }
}
