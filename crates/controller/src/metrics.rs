// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconcile counters and the controller's observability endpoint.

use std::net::SocketAddr;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

#[derive(Clone)]
pub struct ControllerMetrics {
    registry: Registry,
    pub(crate) reconciles: IntCounter,
    pub(crate) failures: IntCounter,
}

impl ControllerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let reconciles = IntCounter::new(
            "controller_reconciles_total",
            "Reconcile iterations started.",
        )?;
        let failures = IntCounter::new(
            "controller_reconcile_failures_total",
            "Reconcile iterations that ended in an error.",
        )?;
        registry.register(Box::new(reconciles.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        Ok(Self {
            registry,
            reconciles,
            failures,
        })
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

async fn serve_metrics(
    axum::extract::State(metrics): axum::extract::State<ControllerMetrics>,
) -> Response {
    match metrics.encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(error) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response(),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Serve `/metrics` and `/healthz`; runs for the life of the controller.
pub async fn serve(port: u16, metrics: ControllerMetrics) {
    let router = Router::new()
        .route("/metrics", get(serve_metrics))
        .route("/healthz", get(healthz))
        .with_state(metrics);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%addr, error = %error, "failed to bind metrics listener");
            return;
        }
    };
    tracing::info!(%addr, "metrics listening");
    if let Err(error) = axum::serve(listener, router).await {
        tracing::error!(error = %error, "metrics server exited");
    }
}
