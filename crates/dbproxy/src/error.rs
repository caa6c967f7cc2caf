// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error-to-status mapping and the response envelopes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use almond_storage::StorageError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("table name not found")]
    TableNotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            ProxyError::TableNotFound => StatusCode::NOT_FOUND,
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
            ProxyError::Storage(StorageError::InvalidKey)
            | ProxyError::Storage(StorageError::UnknownField(_))
            | ProxyError::Storage(StorageError::InvalidFieldValue(_)) => StatusCode::BAD_REQUEST,
            ProxyError::Storage(StorageError::Db(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

#[derive(Serialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Serialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Serialize)]
struct OkEnvelope<T> {
    result: &'static str,
    data: T,
}

/// `{"data": …}` — the synctable envelope.
pub(crate) fn data<T: Serialize>(value: T) -> Response {
    Json(DataEnvelope { data: value }).into_response()
}

/// `{"result":"ok","data": …}` — the localtable envelope.
pub(crate) fn ok_data<T: Serialize>(value: T) -> Response {
    Json(OkEnvelope {
        result: "ok",
        data: value,
    })
    .into_response()
}

/// Deserialize a JSON request body; failures are 400s.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ProxyError> {
    serde_json::from_slice(body).map_err(|e| ProxyError::BadRequest(e.to_string()))
}
