// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for storage tests.

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

/// A fresh in-memory SQLite database with the full schema applied.
///
/// One connection, pinned open: an in-memory SQLite database lives and dies
/// with its connection.
pub(crate) async fn sqlite_pool() -> AnyPool {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    crate::db::init_schema(&pool).await.unwrap();
    pool
}

/// Insert a journal row directly, bypassing the protocol.
pub(crate) async fn seed_journal(pool: &AnyPool, table: &str, unique_id: &str, user_id: i64, lm: i64) {
    let sql = format!(
        "REPLACE INTO `{table}_journal` (`uniqueId`, `userId`, `lastModified`) VALUES (?, ?, ?)"
    );
    sqlx::query(&sql)
        .bind(unique_id.to_string())
        .bind(user_id)
        .bind(lm)
        .execute(pool)
        .await
        .unwrap();
}

/// Read a journal timestamp directly, bypassing the protocol.
pub(crate) async fn journal_ms(pool: &AnyPool, table: &str, unique_id: &str, user_id: i64) -> Option<i64> {
    use sqlx::Row as _;
    let sql = format!(
        "SELECT `lastModified` FROM `{table}_journal` WHERE `uniqueId` = ? AND `userId` = ?"
    );
    sqlx::query(&sql)
        .bind(unique_id.to_string())
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .unwrap()
        .map(|r| r.try_get(0).unwrap())
}
