// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for router tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tower::ServiceExt;

pub(crate) const SIGNING_KEY: &str = "proxy-test-key";

/// A proxy router over a fresh in-memory SQLite database.
pub(crate) async fn test_router() -> (Router, AnyPool) {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    almond_storage::db::init_schema(&pool).await.unwrap();
    let state = Arc::new(crate::AppState::new(pool.clone(), SIGNING_KEY).unwrap());
    (crate::router(state), pool)
}

pub(crate) fn bearer() -> String {
    format!("Bearer {}", almond_core::sign_token(SIGNING_KEY, 1).unwrap())
}

/// Fire one request and return `(status, parsed JSON body)`.
pub(crate) async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (u16, serde_json::Value) {
    send_with_auth(router, method, uri, body, Some(bearer())).await
}

pub(crate) async fn send_with_auth(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
    authorization: Option<String>,
) -> (u16, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(authorization) = authorization {
        builder = builder.header(header::AUTHORIZATION, authorization);
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status().as_u16();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}
