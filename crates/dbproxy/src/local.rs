// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for the `/localtable` routes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawPathParams, State};
use axum::response::Response;

use almond_storage::{with_local_row, Row};

use crate::error::{ok_data, parse_json};
use crate::{params, AppState, ProxyError};

pub(crate) async fn get_all(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
) -> Result<Response, ProxyError> {
    with_local_row!(
        params::table_name(&path),
        |R| {
            let user_id = params::user_id(&path)?;
            let rows: Vec<R> = state.local.get_all(user_id).await?;
            Ok(ok_data(rows))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn get_one(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
) -> Result<Response, ProxyError> {
    with_local_row!(
        params::table_name(&path),
        |R| {
            let key = params::key(&path)?;
            let row: R = state.local.get_one(&key).await?;
            Ok(ok_data(row))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn get_by_field(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
) -> Result<Response, ProxyError> {
    with_local_row!(
        params::table_name(&path),
        |R| {
            let user_id = params::user_id(&path)?;
            let field = params::by_field(&path)?;
            let value = params::param(&path, "value");
            let rows: Vec<R> = state.local.get_by_field(user_id, field, value).await?;
            Ok(ok_data(rows))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn insert_one(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
    body: Bytes,
) -> Result<Response, ProxyError> {
    with_local_row!(
        params::table_name(&path),
        |R| {
            let key = params::key(&path)?;
            let mut row: R = parse_json(&body)?;
            row.set_key(key);
            state.local.insert_one(&row).await?;
            Ok(ok_data(true))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn delete_one(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
) -> Result<Response, ProxyError> {
    with_local_row!(
        params::table_name(&path),
        |R| {
            let key = params::key(&path)?;
            state.local.delete_one::<R>(&key).await?;
            Ok(ok_data(true))
        },
        || Err(ProxyError::TableNotFound)
    )
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
