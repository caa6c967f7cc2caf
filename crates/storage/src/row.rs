// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row and sync-record types shared by every registered table.
//!
//! Tables are declared with [`define_row!`]; sync tables additionally
//! implement [`SyncRow`] via [`define_sync_row!`]. The original runtime
//! registry downcast is replaced by static dispatch (see [`crate::registry`]),
//! so a "container of sync records" is simply `Vec<SyncRecord<R>>`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::any::AnyRow;

/// Composite primary key shared by every per-user table.
///
/// `user_id` 0 is reserved as invalid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    #[serde(rename = "uniqueId", default)]
    pub unique_id: String,
    #[serde(rename = "userId", default)]
    pub user_id: i64,
}

impl Key {
    pub fn new(unique_id: impl Into<String>, user_id: i64) -> Self {
        Self {
            unique_id: unique_id.into(),
            user_id,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.unique_id.is_empty() && self.user_id != 0
    }
}

/// A typed column value carried between rows and the SQL layer.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(Option<String>),
    Int(Option<i64>),
}

impl FieldValue {
    /// Empty means NULL, or the empty string for text columns.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(v) => v.as_deref().unwrap_or("").is_empty(),
            FieldValue::Int(v) => v.is_none(),
        }
    }
}

/// Conversion between struct fields and [`FieldValue`].
pub trait ColumnValue: Sized {
    fn to_field_value(&self) -> FieldValue;
    fn from_field_value(value: FieldValue) -> Self;
}

impl ColumnValue for Option<String> {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }

    fn from_field_value(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(v) => v,
            FieldValue::Int(v) => v.map(|n| n.to_string()),
        }
    }
}

impl ColumnValue for Option<i64> {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Int(*self)
    }

    fn from_field_value(value: FieldValue) -> Self {
        match value {
            FieldValue::Int(v) => v,
            FieldValue::Text(v) => v.and_then(|s| s.parse().ok()),
        }
    }
}

/// A registered table row: key accessors plus ordered column metadata.
pub trait Row:
    Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static
{
    const TABLE: &'static str;
    /// Non-key column names, in declaration order.
    const FIELDS: &'static [&'static str];

    fn key(&self) -> &Key;
    fn set_key(&mut self, key: Key);

    /// The value of a non-key column, or None for an unknown name.
    fn field(&self, name: &str) -> Option<FieldValue>;
    fn set_field(&mut self, name: &str, value: FieldValue);

    /// Decode from a result set carrying the key and every column.
    /// Columns absent from the row (tombstone joins) decode as NULL.
    fn decode(row: &AnyRow) -> Result<Self, sqlx::Error>;

    fn has_field(name: &str) -> bool {
        Self::FIELDS.contains(&name)
    }
}

/// A row whose table is paired with a `_journal` side table.
pub trait SyncRow: Row {
    const JOURNAL_TABLE: &'static str;
    /// Column whose non-empty value marks a record as present rather than a
    /// tombstone.
    const DISCRIMINATOR: &'static str;

    /// True for insert/update records, false for tombstones.
    fn discriminator(&self) -> bool {
        self.field(Self::DISCRIMINATOR)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }
}

/// Logical join of a base row and its journal entry.
///
/// On the wire this flattens to the row's JSON plus `lastModified`; a
/// tombstone serializes with null payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "R: Serialize", deserialize = "R: DeserializeOwned"))]
pub struct SyncRecord<R> {
    #[serde(flatten)]
    pub row: R,
    #[serde(rename = "lastModified")]
    pub last_modified: i64,
}

impl<R: SyncRow> SyncRecord<R> {
    pub fn new(row: R, last_modified: i64) -> Self {
        Self { row, last_modified }
    }

    /// A tombstone record carrying only the key.
    pub fn tombstone(key: Key, last_modified: i64) -> Self {
        let mut row = R::default();
        row.set_key(key);
        Self { row, last_modified }
    }

    pub fn key(&self) -> &Key {
        self.row.key()
    }

    pub fn discriminator(&self) -> bool {
        self.row.discriminator()
    }

    /// Decode from the `journal LEFT JOIN base` result shape.
    pub fn decode(row: &AnyRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row as _;
        Ok(Self {
            row: R::decode(row)?,
            last_modified: row.try_get("lastModified")?,
        })
    }
}

/// Declare a table row struct and its [`Row`] implementation.
///
/// Column order is the `FIELDS` order; each column lists its Rust type
/// (`Option<String>` or `Option<i64>`) and its on-disk/JSON name.
///
/// ```ignore
/// define_row! {
///     /// Doc comment for the table.
///     pub struct UserDevice("user_device") {
///         state: Option<String> = "state",
///     }
/// }
/// ```
#[macro_export]
macro_rules! define_row {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($table:literal) {
            $( $field:ident: $ty:ty = $col:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize,
        )]
        pub struct $name {
            #[serde(flatten)]
            pub key: $crate::row::Key,
            $(
                #[serde(rename = $col, default)]
                pub $field: $ty,
            )+
        }

        impl $crate::row::Row for $name {
            const TABLE: &'static str = $table;
            const FIELDS: &'static [&'static str] = &[$($col),+];

            fn key(&self) -> &$crate::row::Key {
                &self.key
            }

            fn set_key(&mut self, key: $crate::row::Key) {
                self.key = key;
            }

            fn field(&self, name: &str) -> Option<$crate::row::FieldValue> {
                use $crate::row::ColumnValue as _;
                match name {
                    $( $col => Some(self.$field.to_field_value()), )+
                    _ => None,
                }
            }

            fn set_field(&mut self, name: &str, value: $crate::row::FieldValue) {
                match name {
                    $( $col => {
                        self.$field = $crate::row::ColumnValue::from_field_value(value);
                    } )+
                    _ => {}
                }
            }

            fn decode(row: &sqlx::any::AnyRow) -> Result<Self, sqlx::Error> {
                use sqlx::Row as _;
                Ok(Self {
                    key: $crate::row::Key {
                        unique_id: row.try_get("uniqueId")?,
                        user_id: row.try_get("userId")?,
                    },
                    $( $field: row.try_get($col)?, )+
                })
            }
        }
    };
}

/// `` `uniqueId`, `userId`, `field`... `` for base-table selects and upserts.
pub(crate) fn base_columns<R: Row>() -> String {
    let mut out = String::from("`uniqueId`, `userId`");
    for field in R::FIELDS {
        out.push_str(", `");
        out.push_str(field);
        out.push('`');
    }
    out
}

/// Column list for the `journal LEFT JOIN base` shape, with the key and
/// timestamp taken from the journal side.
pub(crate) fn joined_columns<R: Row>() -> String {
    let mut out = String::from("tj.`uniqueId`, tj.`userId`, tj.`lastModified`");
    for field in R::FIELDS {
        out.push_str(", t.`");
        out.push_str(field);
        out.push('`');
    }
    out
}

pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub(crate) type AnyQuery<'q> = sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>;

pub(crate) fn bind_field(query: AnyQuery<'_>, value: FieldValue) -> AnyQuery<'_> {
    match value {
        FieldValue::Text(v) => query.bind(v),
        FieldValue::Int(v) => query.bind(v),
    }
}

/// Pair a row type with its journal table and discriminator column.
#[macro_export]
macro_rules! define_sync_row {
    ($name:ident, journal = $journal:literal, discriminator = $disc:literal) => {
        impl $crate::row::SyncRow for $name {
            const JOURNAL_TABLE: &'static str = $journal;
            const DISCRIMINATOR: &'static str = $disc;
        }
    };
}

#[cfg(test)]
#[path = "row_tests.rs"]
mod tests;
