//! Authentication: password hashing, API tokens and the bearer middleware.
//!
//! Each registered user owns one random API token. Protected routes resolve
//! `Authorization: Bearer <token>` to the user and hand it to handlers as an
//! [`AuthenticatedOwner`] request extension.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rand::Rng;

use mentor_core::types::Owner;

use crate::error::ApiError;
use crate::state::AppState;

/// The caller resolved from a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedOwner(pub Owner);

/// Generate a random 64-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a password with Argon2 and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Middleware that validates Bearer token authentication.
///
/// Returns 401 if the header is missing, malformed or names no user.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(value) = req.headers().get("authorization") else {
        return ApiError::Unauthorized("Missing Authorization header".to_string()).into_response();
    };
    let Ok(value) = value.to_str() else {
        return ApiError::Unauthorized("Invalid Authorization header encoding".to_string())
            .into_response();
    };
    let Some(token) = value.strip_prefix("Bearer ").map(str::trim) else {
        return ApiError::Unauthorized("Invalid bearer token".to_string()).into_response();
    };

    match state.owners.find_by_token(token) {
        Ok(Some(owner)) => {
            req.extensions_mut().insert(AuthenticatedOwner(owner));
            next.run(req).await
        }
        Ok(None) => ApiError::Unauthorized("Invalid bearer token".to_string()).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
