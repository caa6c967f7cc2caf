// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for engine backends.
//!
//! Backends expose three endpoints per engine: status, kill, and run. The
//! trait seam keeps the reconciler testable against a scripted fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::user::EngineState;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Connection-level failure; the backend may be mid-rollout. Requeued
    /// without touching the declared status.
    #[error("failed to reach backend: {0}")]
    Dial(String),
    #[error("engine request failed: {0}")]
    Http(String),
    #[error("unexpected engine response status: {0}")]
    Status(u16),
}

impl EngineError {
    pub fn is_dial(&self) -> bool {
        matches!(self, EngineError::Dial(_))
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            EngineError::Dial(error.to_string())
        } else {
            EngineError::Http(error.to_string())
        }
    }
}

/// Options handed to a backend when launching an engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformOptions {
    pub user_id: i64,
    pub cloud_id: String,
    pub auth_token: String,
    pub developer_key: Option<String>,
    pub locale: String,
    pub timezone: String,
    pub db_proxy_url: String,
    pub db_proxy_access_token: String,
    pub human_name: Option<String>,
    pub email: Option<String>,
}

#[async_trait]
pub trait EngineClient: Send + Sync {
    async fn engine_status(&self, backend: &str, user_id: i64)
        -> Result<EngineState, EngineError>;
    async fn kill_engine(&self, backend: &str, user_id: i64) -> Result<(), EngineError>;
    async fn run_engine(
        &self,
        backend: &str,
        options: &PlatformOptions,
    ) -> Result<(), EngineError>;
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// Production client over reqwest.
pub struct HttpEngineClient {
    client: reqwest::Client,
}

impl HttpEngineClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpEngineClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineClient for HttpEngineClient {
    async fn engine_status(
        &self,
        backend: &str,
        user_id: i64,
    ) -> Result<EngineState, EngineError> {
        let url = format!("{backend}/engine-status?userid={user_id}");
        tracing::debug!(%url, "querying engine status");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::Status(response.status().as_u16()));
        }
        let body: DataEnvelope<EngineState> = response.json().await?;
        tracing::debug!(user_id, state = %body.data, "engine status");
        Ok(body.data)
    }

    async fn kill_engine(&self, backend: &str, user_id: i64) -> Result<(), EngineError> {
        let url = format!("{backend}/kill-engine?userid={user_id}");
        tracing::info!(%url, "killing engine");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn run_engine(
        &self,
        backend: &str,
        options: &PlatformOptions,
    ) -> Result<(), EngineError> {
        let url = format!("{backend}/run-engine");
        tracing::info!(%url, user_id = options.user_id, "starting engine");
        let response = self.client.post(&url).json(options).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
