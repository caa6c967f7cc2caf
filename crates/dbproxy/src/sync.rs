// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for the `/synctable` routes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawPathParams, State};
use axum::response::Response;
use serde::Serialize;

use almond_storage::{with_sync_row, Row, SyncRecord, SyncRow};

use crate::error::{data, parse_json};
use crate::{params, AppState, ProxyError};

/// Body of the `sync` response: the newest journal timestamp, our side of
/// the exchange, and the fate of each pushed record.
#[derive(Serialize)]
struct SyncAtBody<R> {
    #[serde(rename = "lastModified")]
    last_modified: i64,
    #[serde(rename = "ourChange")]
    our_change: Vec<SyncRecord<R>>,
    done: Vec<bool>,
}

/// Write bodies must agree with the path: a set uniqueId and the same user.
fn check_row_key<R: SyncRow>(row: &R, user_id: i64) -> Result<(), ProxyError> {
    if row.key().unique_id.is_empty() {
        return Err(ProxyError::BadRequest("uniqueId must be set".to_string()));
    }
    if row.key().user_id != user_id {
        return Err(ProxyError::BadRequest("userid does not match".to_string()));
    }
    Ok(())
}

pub(crate) async fn get_all(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
) -> Result<Response, ProxyError> {
    with_sync_row!(
        params::table_name(&path),
        |R| {
            let user_id = params::user_id(&path)?;
            let rows: Vec<R> = state.sync.get_all(user_id).await?;
            Ok(data(rows))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn get_one(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
) -> Result<Response, ProxyError> {
    with_sync_row!(
        params::table_name(&path),
        |R| {
            let key = params::key(&path)?;
            let row: R = state.sync.get_one(&key).await?;
            Ok(data(row))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn get_raw(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
) -> Result<Response, ProxyError> {
    with_sync_row!(
        params::table_name(&path),
        |R| {
            let user_id = params::user_id(&path)?;
            let records: Vec<SyncRecord<R>> = state.sync.get_raw(user_id).await?;
            Ok(data(records))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn get_changes_after(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
) -> Result<Response, ProxyError> {
    with_sync_row!(
        params::table_name(&path),
        |R| {
            let user_id = params::user_id(&path)?;
            let since = params::millis(&path)?;
            let records: Vec<SyncRecord<R>> = state.sync.get_changes_after(since, user_id).await?;
            Ok(data(records))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn handle_changes(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
    body: Bytes,
) -> Result<Response, ProxyError> {
    with_sync_row!(
        params::table_name(&path),
        |R| {
            let user_id = params::user_id(&path)?;
            let changes: Vec<SyncRecord<R>> = parse_json(&body)?;
            let done = state.sync.handle_changes(&changes, user_id).await?;
            Ok(data(done))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn sync_at(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
    body: Bytes,
) -> Result<Response, ProxyError> {
    with_sync_row!(
        params::table_name(&path),
        |R| {
            let user_id = params::user_id(&path)?;
            let anchor = params::millis(&path)?;
            let pushed: Vec<SyncRecord<R>> = parse_json(&body)?;
            let (last_modified, our_change, done) =
                state.sync.sync_at(anchor, user_id, &pushed).await?;
            Ok(data(SyncAtBody {
                last_modified,
                our_change,
                done,
            }))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn replace_all(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
    body: Bytes,
) -> Result<Response, ProxyError> {
    with_sync_row!(
        params::table_name(&path),
        |R| {
            let user_id = params::user_id(&path)?;
            let records: Vec<SyncRecord<R>> = parse_json(&body)?;
            state.sync.replace_all(&records, user_id).await?;
            Ok(data(true))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn insert_one(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
    body: Bytes,
) -> Result<Response, ProxyError> {
    with_sync_row!(
        params::table_name(&path),
        |R| {
            let user_id = params::user_id(&path)?;
            let row: R = parse_json(&body)?;
            check_row_key(&row, user_id)?;
            let last_modified = state.sync.insert_one(&row).await?;
            Ok(data(last_modified))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn insert_if_recent(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
    body: Bytes,
) -> Result<Response, ProxyError> {
    with_sync_row!(
        params::table_name(&path),
        |R| {
            let user_id = params::user_id(&path)?;
            let last_modified = params::millis(&path)?;
            let row: R = parse_json(&body)?;
            check_row_key(&row, user_id)?;
            let done = state.sync.insert_if_recent(&row, last_modified).await?;
            Ok(data(done))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn delete_one(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
) -> Result<Response, ProxyError> {
    with_sync_row!(
        params::table_name(&path),
        |R| {
            let key = params::key(&path)?;
            let last_modified = state.sync.delete_one::<R>(&key).await?;
            Ok(data(last_modified))
        },
        || Err(ProxyError::TableNotFound)
    )
}

pub(crate) async fn delete_if_recent(
    State(state): State<Arc<AppState>>,
    path: RawPathParams,
) -> Result<Response, ProxyError> {
    with_sync_row!(
        params::table_name(&path),
        |R| {
            let key = params::key(&path)?;
            let last_modified = params::millis(&path)?;
            let done = state.sync.delete_if_recent::<R>(&key, last_modified).await?;
            Ok(data(done))
        },
        || Err(ProxyError::TableNotFound)
    )
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
