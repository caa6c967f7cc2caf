// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! almond-dbproxy: the HTTP face of the per-user tables.
//!
//! A thin adapter: handlers parse raw path captures, dispatch the table name
//! through the storage registry, call the table layer, and wrap the result
//! in the fixed JSON envelope. Every route except `/metrics` sits behind the
//! bearer-token gate.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Router};
use sqlx::AnyPool;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use almond_core::Config;
use almond_storage::{LocalTable, StorageError, SyncTable};

mod auth;
mod error;
mod local;
mod metrics;
mod params;
mod sync;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::ProxyError;

use auth::AuthGate;
use metrics::ProxyMetrics;

/// Default listen port for `almond-cloud dbproxy`.
pub const DEFAULT_PORT: u16 = 8200;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to set up metrics: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("invalid bearer pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Composition root for the proxy: tables, auth gate, and metrics.
pub struct AppState {
    pub(crate) local: LocalTable,
    pub(crate) sync: SyncTable,
    pub(crate) auth: AuthGate,
    pub(crate) metrics: ProxyMetrics,
}

impl AppState {
    pub fn new(pool: AnyPool, signing_key: &str) -> Result<Self, ServeError> {
        Ok(Self {
            local: LocalTable::new(pool.clone()),
            sync: SyncTable::new(pool),
            auth: AuthGate::new(signing_key)?,
            metrics: ProxyMetrics::new()?,
        })
    }
}

/// Build the full proxy router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/localtable/{name}/{userid}", get(local::get_all))
        .route(
            "/localtable/{name}/{userid}/{uniqueid}",
            get(local::get_one)
                .post(local::insert_one)
                .delete(local::delete_one),
        )
        // The third segment doubles as a `by-<field>` selector when a value
        // segment follows; it shares the `{uniqueid}` capture name because
        // the router requires consistent parameter names per position.
        .route(
            "/localtable/{name}/{userid}/{uniqueid}/{value}",
            get(local::get_by_field),
        )
        .route("/synctable/{name}/{userid}", get(sync::get_all))
        .route(
            "/synctable/{name}/{userid}/{uniqueid}",
            get(sync::get_one)
                .post(sync::insert_one)
                .delete(sync::delete_one),
        )
        .route("/synctable/raw/{name}/{userid}", get(sync::get_raw))
        .route(
            "/synctable/changes/{name}/{userid}/{millis}",
            get(sync::get_changes_after),
        )
        .route(
            "/synctable/changes/{name}/{userid}",
            post(sync::handle_changes),
        )
        .route("/synctable/sync/{name}/{userid}/{millis}", post(sync::sync_at))
        .route("/synctable/replace/{name}/{userid}", post(sync::replace_all))
        .route(
            "/synctable/{name}/{userid}/{uniqueid}/{millis}",
            post(sync::insert_if_recent).delete(sync::delete_if_recent),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/metrics", get(metrics::serve_metrics))
        .merge(api)
        .layer(middleware::from_fn_with_state(state.clone(), metrics::track))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Connect to the store and run the proxy until the listener fails.
pub async fn serve(config: &Config, port: u16, tls_cert: Option<&Path>) -> Result<(), ServeError> {
    let pool = almond_storage::db::connect(&config.database_url, tls_cert).await?;
    let state = Arc::new(AppState::new(pool, &config.jwt_signing_key)?);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "database proxy listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
