// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain per-user CRUD over a single table.
//!
//! Every operation is one statement; concurrency correctness is the store's
//! responsibility. No journal side effects.

use sqlx::AnyPool;

use crate::row::{base_columns, bind_field, placeholders, FieldValue, Key, Row};
use crate::StorageError;

#[derive(Clone)]
pub struct LocalTable {
    pool: AnyPool,
}

impl LocalTable {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// All rows belonging to `user_id`.
    pub async fn get_all<R: Row>(&self, user_id: i64) -> Result<Vec<R>, StorageError> {
        if user_id == 0 {
            return Err(StorageError::InvalidKey);
        }
        let sql = format!(
            "SELECT {} FROM `{}` WHERE `userId` = ?",
            base_columns::<R>(),
            R::TABLE
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.pool).await?;
        rows.iter().map(|r| Ok(R::decode(r)?)).collect()
    }

    /// All rows matching `userId AND field = value`.
    ///
    /// `field` must be one of the table's columns; values for integer
    /// columns must parse.
    pub async fn get_by_field<R: Row>(
        &self,
        user_id: i64,
        field: &str,
        value: &str,
    ) -> Result<Vec<R>, StorageError> {
        if user_id == 0 {
            return Err(StorageError::InvalidKey);
        }
        let probe = R::default()
            .field(field)
            .ok_or_else(|| StorageError::UnknownField(field.to_string()))?;
        let bound = match probe {
            FieldValue::Text(_) => FieldValue::Text(Some(value.to_string())),
            FieldValue::Int(_) => FieldValue::Int(Some(value.parse().map_err(|_| {
                StorageError::InvalidFieldValue(field.to_string())
            })?)),
        };
        let sql = format!(
            "SELECT {} FROM `{}` WHERE `userId` = ? AND `{}` = ?",
            base_columns::<R>(),
            R::TABLE,
            field
        );
        let query = bind_field(sqlx::query(&sql).bind(user_id), bound);
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(|r| Ok(R::decode(r)?)).collect()
    }

    /// Point lookup by full key.
    pub async fn get_one<R: Row>(&self, key: &Key) -> Result<R, StorageError> {
        if !key.is_valid() {
            return Err(StorageError::InvalidKey);
        }
        let sql = format!(
            "SELECT {} FROM `{}` WHERE `uniqueId` = ? AND `userId` = ?",
            base_columns::<R>(),
            R::TABLE
        );
        let row = sqlx::query(&sql)
            .bind(key.unique_id.clone())
            .bind(key.user_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(R::decode(&r)?),
            None => Err(StorageError::NotFound),
        }
    }

    /// Upsert by primary key, updating every column.
    pub async fn insert_one<R: Row>(&self, row: &R) -> Result<(), StorageError> {
        if !row.key().is_valid() {
            return Err(StorageError::InvalidKey);
        }
        let sql = format!(
            "REPLACE INTO `{}` ({}) VALUES ({})",
            R::TABLE,
            base_columns::<R>(),
            placeholders(2 + R::FIELDS.len())
        );
        let mut query = sqlx::query(&sql)
            .bind(row.key().unique_id.clone())
            .bind(row.key().user_id);
        for field in R::FIELDS {
            let value = row.field(field).unwrap_or(FieldValue::Text(None));
            query = bind_field(query, value);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    /// Delete by primary key; NotFound when no row matched.
    pub async fn delete_one<R: Row>(&self, key: &Key) -> Result<(), StorageError> {
        if !key.is_valid() {
            return Err(StorageError::InvalidKey);
        }
        let sql = format!("DELETE FROM `{}` WHERE `uniqueId` = ? AND `userId` = ?", R::TABLE);
        let result = sqlx::query(&sql)
            .bind(key.unique_id.clone())
            .bind(key.user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "local_table_tests.rs"]
mod tests;
