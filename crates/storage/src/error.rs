// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced by the table layers.
///
/// Store failures pass through unchanged; the HTTP layer decides how each
/// variant maps to a status code.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A row key was missing its uniqueId or carried the reserved user id 0.
    #[error("invalid key")]
    InvalidKey,
    /// A field name outside the table's column list.
    #[error("invalid field: {0}")]
    UnknownField(String),
    /// A field value that does not parse as the column's type.
    #[error("invalid value for field {0}")]
    InvalidFieldValue(String),
    #[error("row not found")]
    NotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
