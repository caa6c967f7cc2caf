// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw path-parameter parsing.
//!
//! Captures are read through [`RawPathParams`], which performs no percent
//! decoding; ids and field values reach the table layer exactly as they
//! appeared on the wire.

use axum::extract::RawPathParams;

use almond_storage::Key;

use crate::ProxyError;

pub(crate) fn param<'a>(params: &'a RawPathParams, name: &str) -> &'a str {
    params
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .unwrap_or("")
}

pub(crate) fn table_name<'a>(params: &'a RawPathParams) -> &'a str {
    param(params, "name")
}

/// The `userid` segment: a nonzero 64-bit integer.
pub(crate) fn user_id(params: &RawPathParams) -> Result<i64, ProxyError> {
    let raw = param(params, "userid");
    let user_id: i64 = raw
        .parse()
        .map_err(|_| ProxyError::BadRequest(format!("invalid userid {raw:?}")))?;
    if user_id == 0 {
        return Err(ProxyError::BadRequest("userId must be non-zero".to_string()));
    }
    Ok(user_id)
}

/// The full `(uniqueid, userid)` key.
pub(crate) fn key(params: &RawPathParams) -> Result<Key, ProxyError> {
    let user_id = user_id(params)?;
    let unique_id = param(params, "uniqueid");
    if unique_id.is_empty() {
        return Err(ProxyError::BadRequest("uniqueId must be set".to_string()));
    }
    Ok(Key::new(unique_id, user_id))
}

/// The `millis` segment: a 64-bit timestamp.
pub(crate) fn millis(params: &RawPathParams) -> Result<i64, ProxyError> {
    let raw = param(params, "millis");
    raw.parse()
        .map_err(|_| ProxyError::BadRequest(format!("invalid millis {raw:?}")))
}

/// The `by-<field>` selector of the field-lookup route. The selector rides
/// in the `uniqueid` position of the path.
pub(crate) fn by_field<'a>(params: &'a RawPathParams) -> Result<&'a str, ProxyError> {
    let raw = param(params, "uniqueid");
    raw.strip_prefix("by-")
        .filter(|field| !field.is_empty())
        .ok_or_else(|| ProxyError::BadRequest(format!("invalid field selector {raw:?}")))
}
