// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-token gate applied to every table route.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use regex::Regex;
use thiserror::Error;

use almond_core::{verify_token, Claims, TokenError};

use crate::error::ErrorBody;
use crate::AppState;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("malformed authorization header")]
    Malformed,
    #[error("invalid authorization header: {0}")]
    InvalidToken(#[from] TokenError),
}

pub(crate) struct AuthGate {
    signing_key: String,
    bearer: Regex,
}

impl AuthGate {
    pub fn new(signing_key: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            signing_key: signing_key.to_string(),
            bearer: Regex::new(r"^[bB]earer\s+(.+)$")?,
        })
    }

    /// Extract and verify the bearer token carried by the request.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let header = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::MissingHeader)?;
        let token = self
            .bearer
            .captures(header)
            .and_then(|captures| captures.get(1))
            .ok_or(AuthError::Malformed)?;
        Ok(verify_token(&self.signing_key, token.as_str())?)
    }
}

pub(crate) async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    match state.auth.authorize(request.headers()) {
        Ok(claims) => {
            tracing::debug!(subject = %claims.sub, "request authorized");
            next.run(request).await
        }
        Err(error) => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new(error.to_string())),
        )
            .into_response(),
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
