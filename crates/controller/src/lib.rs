// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! almond-controller: the engine reconcile manager.
//!
//! # Module layout
//!
//! - [`user`] — the declared `User` object and engine states
//! - [`reconciler`] — the reconcile loop itself
//! - [`backends`] — shared-fleet placement
//! - [`templates`] — dedicated-workload manifests
//! - [`engine`] — HTTP client for engine backends
//! - [`cache`] — TTL'd cache for user lookups
//!
//! # Architecture
//!
//! The orchestrator invokes [`reconciler::reconcile`] once per declared
//! `user-<id>` object (serialized per name, parallel across names). Shared
//! users map onto the `shared-backend` fleet by consistent indexing;
//! trusted developers get a dedicated Deployment + Service stamped from
//! JSON templates. Engine state is observed over HTTP and driven toward
//! running; idle engines are retired together with their declared object.

use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::Controller;
use kube::runtime::watcher;
use thiserror::Error;

use almond_core::Config;
use almond_storage::{StorageError, UserStore};

pub mod backends;
pub mod cache;
pub mod engine;
pub mod metrics;
pub mod reconciler;
pub mod templates;
pub mod user;

pub use reconciler::{reconcile, error_policy, Context, ReconcileError, RECONCILE_TIMEOUT};
pub use user::{EngineState, User, UserSpec, UserStatus};

use cache::DbCache;
use engine::HttpEngineClient;
use metrics::ControllerMetrics;
use templates::{Templates, TemplateError};

/// Default port for the controller's metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Kube(#[from] kube::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to set up metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Startup options for `almond-cloud controller`.
pub struct ControllerOptions {
    pub deployment_template: PathBuf,
    pub service_template: PathBuf,
    pub metrics_port: u16,
}

/// Build the context and run the controller until shutdown.
pub async fn run(config: Arc<Config>, options: ControllerOptions) -> Result<(), ControllerError> {
    // Template problems are fatal; nothing can be provisioned without them.
    let templates = Arc::new(Templates::load(
        &options.deployment_template,
        &options.service_template,
    )?);
    let client = kube::Client::try_default().await?;
    let pool = almond_storage::db::connect(&config.database_url, None).await?;
    let metrics = ControllerMetrics::new()?;

    let context = Arc::new(Context {
        client: client.clone(),
        config,
        users: UserStore::new(pool),
        user_cache: DbCache::new(),
        devkey_cache: DbCache::new(),
        engines: Arc::new(HttpEngineClient::new()),
        templates,
        metrics: metrics.clone(),
    });

    tokio::spawn(metrics::serve(options.metrics_port, metrics));

    let users: Api<User> = Api::all(client);
    Controller::new(users, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => tracing::debug!(%object, "reconciled"),
                Err(error) => tracing::warn!(error = %error, "reconcile dispatch failed"),
            }
        })
        .await;
    Ok(())
}
