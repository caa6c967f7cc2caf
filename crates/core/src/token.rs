// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access tokens for the database proxy.
//!
//! Tokens are HMAC-SHA256 JWTs signed with the process-wide
//! `JWT_SIGNING_KEY`. The subject is the user id, the audience is fixed;
//! every other algorithm or audience is rejected.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Audience claim carried by every proxy access token.
pub const TOKEN_AUDIENCE: &str = "dbproxy";

/// Token lifetime. Engines are restarted well within this window.
const TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing subject")]
    MissingSubject,
    #[error("invalid access token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

/// Claims carried by a proxy access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    /// The user id encoded in the subject, if it parses.
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Sign an access token for the given user.
pub fn sign_token(key: &str, user_id: i64) -> Result<String, TokenError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let claims = Claims {
        sub: user_id.to_string(),
        aud: TOKEN_AUDIENCE.to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(key.as_bytes()),
    )?)
}

/// Verify a token and return its claims.
///
/// Rejects any signing algorithm other than HS256, an audience that is not
/// [`TOKEN_AUDIENCE`], an empty subject, and expired tokens.
pub fn verify_token(key: &str, token: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[TOKEN_AUDIENCE]);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(key.as_bytes()),
        &validation,
    )?;
    if data.claims.sub.is_empty() {
        return Err(TokenError::MissingSubject);
    }
    Ok(data.claims)
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
