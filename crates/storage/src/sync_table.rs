// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journalled last-writer-wins replication over a base/journal table pair.
//!
//! Every mutation keeps the invariant: one journal row per key, with the
//! base row present iff the key is live. A journal row without a base row is
//! a tombstone. Conditional writes compare against the journal timestamp
//! with strict greater-than semantics, so equal timestamps keep the existing
//! record and retries are idempotent under the same `(key, lastModified)`.
//!
//! Multi-statement operations run inside a single transaction and roll back
//! on any error.

use almond_core::{Clock, SystemClock};
use sqlx::{AnyConnection, AnyPool};

use crate::row::{
    base_columns, bind_field, joined_columns, placeholders, Key, Row, SyncRecord, SyncRow,
};
use crate::StorageError;

#[derive(Clone)]
pub struct SyncTable<C: Clock = SystemClock> {
    pool: AnyPool,
    clock: C,
}

impl SyncTable<SystemClock> {
    pub fn new(pool: AnyPool) -> Self {
        Self {
            pool,
            clock: SystemClock,
        }
    }
}

impl<C: Clock> SyncTable<C> {
    pub fn with_clock(pool: AnyPool, clock: C) -> Self {
        Self { pool, clock }
    }

    /// All current base rows for a user.
    pub async fn get_all<R: SyncRow>(&self, user_id: i64) -> Result<Vec<R>, StorageError> {
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

    /// Point lookup by full key.
    pub async fn get_one<R: SyncRow>(&self, key: &Key) -> Result<R, StorageError> {
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

    /// Every journal entry for the user joined with any base-row payload.
    /// Tombstones come back with null payload fields.
    pub async fn get_raw<R: SyncRow>(
        &self,
        user_id: i64,
    ) -> Result<Vec<SyncRecord<R>>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        raw_query::<R>(&mut conn, None, user_id).await
    }

    /// Journal entries strictly newer than `since`, joined as in
    /// [`SyncTable::get_raw`].
    pub async fn get_changes_after<R: SyncRow>(
        &self,
        since: i64,
        user_id: i64,
    ) -> Result<Vec<SyncRecord<R>>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        raw_query::<R>(&mut conn, Some(since), user_id).await
    }

    /// Apply a batch of pushed records, each conditionally by its
    /// discriminator, inside one transaction. The result list reports which
    /// records won their freshness check.
    pub async fn handle_changes<R: SyncRow>(
        &self,
        changes: &[SyncRecord<R>],
        user_id: i64,
    ) -> Result<Vec<bool>, StorageError> {
        let mut tx = self.pool.begin().await?;
        let results = apply_changes(&mut tx, changes).await?;
        tx.commit().await?;
        tracing::debug!(
            table = R::TABLE,
            user_id,
            pushed = changes.len(),
            applied = results.iter().filter(|r| **r).count(),
            "applied pushed changes"
        );
        Ok(results)
    }

    /// The complete client/server reconciliation exchange, atomically: read
    /// our changes since the anchor, note the newest journal timestamp for
    /// the user, and apply the pushed changes.
    pub async fn sync_at<R: SyncRow>(
        &self,
        anchor: i64,
        user_id: i64,
        pushed: &[SyncRecord<R>],
    ) -> Result<(i64, Vec<SyncRecord<R>>, Vec<bool>), StorageError> {
        let mut tx = self.pool.begin().await?;
        let our_changes = raw_query::<R>(&mut tx, Some(anchor), user_id).await?;
        let latest = latest_journal_ms(&mut tx, R::JOURNAL_TABLE, user_id).await?;
        let done = apply_changes(&mut tx, pushed).await?;
        tx.commit().await?;
        Ok((latest, our_changes, done))
    }

    /// Replace the user's entire view: drop all base and journal rows, then
    /// unconditionally insert every record whose discriminator is true.
    pub async fn replace_all<R: SyncRow>(
        &self,
        records: &[SyncRecord<R>],
        user_id: i64,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        let delete_base = format!("DELETE FROM `{}` WHERE `userId` = ?", R::TABLE);
        sqlx::query(&delete_base)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let delete_journal = format!("DELETE FROM `{}` WHERE `userId` = ?", R::JOURNAL_TABLE);
        sqlx::query(&delete_journal)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        for record in records {
            if !record.discriminator() {
                continue;
            }
            insert_record(&mut tx, record).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Conditionally upsert one row at the supplied timestamp.
    pub async fn insert_if_recent<R: SyncRow>(
        &self,
        row: &R,
        last_modified: i64,
    ) -> Result<bool, StorageError> {
        let record = SyncRecord::new(row.clone(), last_modified);
        let mut tx = self.pool.begin().await?;
        let done = insert_if_recent_tx(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(done)
    }

    /// Conditionally delete one row at the supplied timestamp.
    pub async fn delete_if_recent<R: SyncRow>(
        &self,
        key: &Key,
        last_modified: i64,
    ) -> Result<bool, StorageError> {
        let record = SyncRecord::<R>::tombstone(key.clone(), last_modified);
        let mut tx = self.pool.begin().await?;
        let done = delete_if_recent_tx(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(done)
    }

    /// Unconditional upsert, stamped with the process clock. Returns the
    /// assigned timestamp.
    pub async fn insert_one<R: SyncRow>(&self, row: &R) -> Result<i64, StorageError> {
        let now = self.clock.epoch_ms();
        let record = SyncRecord::new(row.clone(), now);
        let mut tx = self.pool.begin().await?;
        insert_record(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(now)
    }

    /// Unconditional delete, stamped with the process clock. Returns the
    /// assigned tombstone timestamp.
    pub async fn delete_one<R: SyncRow>(&self, key: &Key) -> Result<i64, StorageError> {
        let now = self.clock.epoch_ms();
        let record = SyncRecord::<R>::tombstone(key.clone(), now);
        let mut tx = self.pool.begin().await?;
        delete_record(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(now)
    }
}

/// `journal LEFT JOIN base`, optionally restricted to entries newer than
/// `since`.
async fn raw_query<R: SyncRow>(
    conn: &mut AnyConnection,
    since: Option<i64>,
    user_id: i64,
) -> Result<Vec<SyncRecord<R>>, StorageError> {
    let mut sql = format!(
        "SELECT {} FROM `{}` AS tj \
         LEFT OUTER JOIN `{}` AS t \
         ON tj.`uniqueId` = t.`uniqueId` AND tj.`userId` = t.`userId` \
         WHERE ",
        joined_columns::<R>(),
        R::JOURNAL_TABLE,
        R::TABLE
    );
    if since.is_some() {
        sql.push_str("tj.`lastModified` > ? AND ");
    }
    sql.push_str("tj.`userId` = ?");

    let mut query = sqlx::query(&sql);
    if let Some(since) = since {
        query = query.bind(since);
    }
    let rows = query.bind(user_id).fetch_all(&mut *conn).await?;
    rows.iter().map(|r| Ok(SyncRecord::decode(r)?)).collect()
}

/// Newest journal timestamp for the user, or 0 when the journal is empty.
async fn latest_journal_ms(
    conn: &mut AnyConnection,
    journal_table: &str,
    user_id: i64,
) -> Result<i64, StorageError> {
    use sqlx::Row as _;
    let sql = format!(
        "SELECT max(`lastModified`) AS `lastModified` FROM `{journal_table}` WHERE `userId` = ?"
    );
    let row = sqlx::query(&sql)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.try_get::<Option<i64>, _>(0)?.unwrap_or(0))
}

async fn apply_changes<R: SyncRow>(
    conn: &mut AnyConnection,
    changes: &[SyncRecord<R>],
) -> Result<Vec<bool>, StorageError> {
    let mut results = Vec::with_capacity(changes.len());
    for change in changes {
        let done = if change.discriminator() {
            insert_if_recent_tx(conn, change).await?
        } else {
            delete_if_recent_tx(conn, change).await?
        };
        results.push(done);
    }
    Ok(results)
}

/// True when the record is strictly newer than the journal entry for its
/// key (or the key has no journal entry yet).
async fn fresher_than_journal(
    conn: &mut AnyConnection,
    journal_table: &str,
    key: &Key,
    last_modified: i64,
) -> Result<bool, StorageError> {
    use sqlx::Row as _;
    let sql = format!(
        "SELECT `lastModified` FROM `{journal_table}` WHERE `uniqueId` = ? AND `userId` = ?"
    );
    let row = sqlx::query(&sql)
        .bind(key.unique_id.clone())
        .bind(key.user_id)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(r) => Ok(r.try_get::<i64, _>(0)? < last_modified),
        None => Ok(true),
    }
}

async fn insert_if_recent_tx<R: SyncRow>(
    conn: &mut AnyConnection,
    record: &SyncRecord<R>,
) -> Result<bool, StorageError> {
    if !fresher_than_journal(conn, R::JOURNAL_TABLE, record.key(), record.last_modified).await? {
        return Ok(false);
    }
    insert_record(conn, record).await?;
    Ok(true)
}

async fn delete_if_recent_tx<R: SyncRow>(
    conn: &mut AnyConnection,
    record: &SyncRecord<R>,
) -> Result<bool, StorageError> {
    if !fresher_than_journal(conn, R::JOURNAL_TABLE, record.key(), record.last_modified).await? {
        return Ok(false);
    }
    delete_record(conn, record).await?;
    Ok(true)
}

/// Unconditional upsert of the base row and its journal entry.
async fn insert_record<R: SyncRow>(
    conn: &mut AnyConnection,
    record: &SyncRecord<R>,
) -> Result<(), StorageError> {
    let sql = format!(
        "REPLACE INTO `{}` ({}) VALUES ({})",
        R::TABLE,
        base_columns::<R>(),
        placeholders(2 + R::FIELDS.len())
    );
    let mut query = sqlx::query(&sql)
        .bind(record.key().unique_id.clone())
        .bind(record.key().user_id);
    for field in R::FIELDS {
        let value = record
            .row
            .field(field)
            .unwrap_or(crate::row::FieldValue::Text(None));
        query = bind_field(query, value);
    }
    query.execute(&mut *conn).await?;
    upsert_journal(conn, R::JOURNAL_TABLE, record.key(), record.last_modified).await
}

/// Unconditional delete of the base row, leaving a journal tombstone.
async fn delete_record<R: SyncRow>(
    conn: &mut AnyConnection,
    record: &SyncRecord<R>,
) -> Result<(), StorageError> {
    let sql = format!("DELETE FROM `{}` WHERE `uniqueId` = ? AND `userId` = ?", R::TABLE);
    sqlx::query(&sql)
        .bind(record.key().unique_id.clone())
        .bind(record.key().user_id)
        .execute(&mut *conn)
        .await?;
    upsert_journal(conn, R::JOURNAL_TABLE, record.key(), record.last_modified).await
}

async fn upsert_journal(
    conn: &mut AnyConnection,
    journal_table: &str,
    key: &Key,
    last_modified: i64,
) -> Result<(), StorageError> {
    let sql = format!(
        "REPLACE INTO `{journal_table}` (`uniqueId`, `userId`, `lastModified`) VALUES (?, ?, ?)"
    );
    sqlx::query(&sql)
        .bind(key.unique_id.clone())
        .bind(key.user_id)
        .bind(last_modified)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "sync_table_tests.rs"]
mod tests;
