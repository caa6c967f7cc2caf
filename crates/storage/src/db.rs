// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool construction and schema bootstrap.

use std::path::Path;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use crate::StorageError;

/// Open a connection pool for `DATABASE_URL`.
///
/// `tls_cert` optionally points at a CA bundle for MySQL connections
/// (`--aws-tls-cert`); certificate registration beyond the URL parameters is
/// the driver's concern.
pub async fn connect(database_url: &str, tls_cert: Option<&Path>) -> Result<AnyPool, StorageError> {
    sqlx::any::install_default_drivers();
    let url = apply_tls_cert(database_url, tls_cert);
    let pool = AnyPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await?;
    tracing::info!(url = %redact(&url), "connected to database");
    Ok(pool)
}

/// Append CA parameters to a MySQL URL. Other schemes pass through.
pub fn apply_tls_cert(database_url: &str, tls_cert: Option<&Path>) -> String {
    let Some(cert) = tls_cert else {
        return database_url.to_string();
    };
    if !database_url.starts_with("mysql:") {
        return database_url.to_string();
    }
    let sep = if database_url.contains('?') { '&' } else { '?' };
    format!(
        "{database_url}{sep}ssl-mode=VERIFY_CA&ssl-ca={}",
        cert.display()
    )
}

fn redact(url: &str) -> String {
    match url.split_once('@') {
        Some((scheme, rest)) => match scheme.split_once("://") {
            Some((s, _)) => format!("{s}://***@{rest}"),
            None => url.to_string(),
        },
        None => url.to_string(),
    }
}

/// Statements creating every table the control plane reads or writes.
///
/// Base and journal tables share the composite `(uniqueId, userId)` primary
/// key; the journal carries only `lastModified`. Types are restricted to
/// what MySQL and SQLite both accept.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS `user_device` (
        `uniqueId` VARCHAR(255) NOT NULL,
        `userId` BIGINT NOT NULL,
        `state` TEXT,
        PRIMARY KEY (`uniqueId`, `userId`))",
    "CREATE TABLE IF NOT EXISTS `user_device_journal` (
        `uniqueId` VARCHAR(255) NOT NULL,
        `userId` BIGINT NOT NULL,
        `lastModified` BIGINT NOT NULL,
        PRIMARY KEY (`uniqueId`, `userId`))",
    "CREATE TABLE IF NOT EXISTS `user_channel` (
        `uniqueId` VARCHAR(255) NOT NULL,
        `userId` BIGINT NOT NULL,
        `value` TEXT,
        PRIMARY KEY (`uniqueId`, `userId`))",
    "CREATE TABLE IF NOT EXISTS `user_channel_journal` (
        `uniqueId` VARCHAR(255) NOT NULL,
        `userId` BIGINT NOT NULL,
        `lastModified` BIGINT NOT NULL,
        PRIMARY KEY (`uniqueId`, `userId`))",
    "CREATE TABLE IF NOT EXISTS `user_app` (
        `uniqueId` VARCHAR(255) NOT NULL,
        `userId` BIGINT NOT NULL,
        `code` TEXT,
        `state` TEXT,
        `name` TEXT,
        `description` TEXT,
        PRIMARY KEY (`uniqueId`, `userId`))",
    "CREATE TABLE IF NOT EXISTS `user_app_journal` (
        `uniqueId` VARCHAR(255) NOT NULL,
        `userId` BIGINT NOT NULL,
        `lastModified` BIGINT NOT NULL,
        PRIMARY KEY (`uniqueId`, `userId`))",
    "CREATE TABLE IF NOT EXISTS `user_preference` (
        `uniqueId` VARCHAR(255) NOT NULL,
        `userId` BIGINT NOT NULL,
        `value` TEXT,
        PRIMARY KEY (`uniqueId`, `userId`))",
    "CREATE TABLE IF NOT EXISTS `user_conversation` (
        `uniqueId` VARCHAR(255) NOT NULL,
        `userId` BIGINT NOT NULL,
        `conversationId` TEXT,
        `previousId` TEXT,
        `dialogueId` TEXT,
        `context` TEXT,
        `agent` TEXT,
        `agentTimestamp` TEXT,
        `agentTarget` TEXT,
        `intermediateContext` TEXT,
        `user` TEXT,
        `userTimestamp` TEXT,
        `userTarget` TEXT,
        `vote` TEXT,
        `comment` TEXT,
        PRIMARY KEY (`uniqueId`, `userId`))",
    "CREATE TABLE IF NOT EXISTS `user_conversation_history` (
        `uniqueId` VARCHAR(255) NOT NULL,
        `userId` BIGINT NOT NULL,
        `conversationId` TEXT,
        `messageId` BIGINT,
        `message` TEXT,
        PRIMARY KEY (`uniqueId`, `userId`))",
    "CREATE TABLE IF NOT EXISTS `user_conversation_state` (
        `uniqueId` VARCHAR(255) NOT NULL,
        `userId` BIGINT NOT NULL,
        `history` TEXT,
        `dialogueState` TEXT,
        `lastMessageId` BIGINT,
        PRIMARY KEY (`uniqueId`, `userId`))",
    "CREATE TABLE IF NOT EXISTS `users` (
        `id` BIGINT NOT NULL,
        `username` VARCHAR(255),
        `human_name` TEXT,
        `email` TEXT,
        `locale` VARCHAR(32),
        `timezone` VARCHAR(64),
        `cloud_id` VARCHAR(255),
        `auth_token` VARCHAR(255),
        `roles` BIGINT NOT NULL DEFAULT 0,
        `developer_org` BIGINT,
        PRIMARY KEY (`id`))",
    "CREATE TABLE IF NOT EXISTS `organizations` (
        `id` BIGINT NOT NULL,
        `developer_key` TEXT,
        PRIMARY KEY (`id`))",
];

/// Create every table if it does not exist yet.
pub async fn init_schema(pool: &AnyPool) -> Result<(), StorageError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
