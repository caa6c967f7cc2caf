// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control-plane user entity.
//!
//! Only the columns the reconciler consumes are modeled; the `users` table
//! itself is owned by the account system.

use sqlx::AnyPool;

use crate::StorageError;

/// Role bit marking a trusted developer, eligible for a dedicated backend.
pub const ROLE_TRUSTED_DEVELOPER: i64 = 0x08;

/// A registered user, as read from the `users` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: i64,
    pub cloud_id: String,
    pub auth_token: String,
    pub locale: String,
    pub timezone: String,
    pub human_name: Option<String>,
    pub email: Option<String>,
    pub roles: i64,
    pub developer_org: Option<i64>,
}

impl User {
    pub fn is_trusted_developer(&self) -> bool {
        self.roles & ROLE_TRUSTED_DEVELOPER != 0
    }
}

/// Read access to users and their organizations.
#[derive(Clone)]
pub struct UserStore {
    pool: AnyPool,
}

impl UserStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// The user with the given id, or NotFound.
    pub async fn get_user(&self, user_id: i64) -> Result<User, StorageError> {
        use sqlx::Row as _;
        let row = sqlx::query(
            "SELECT `id`, `cloud_id`, `auth_token`, `locale`, `timezone`, \
             `human_name`, `email`, `roles`, `developer_org` \
             FROM `users` WHERE `id` = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(User {
            id: row.try_get("id")?,
            cloud_id: row.try_get::<Option<String>, _>("cloud_id")?.unwrap_or_default(),
            auth_token: row
                .try_get::<Option<String>, _>("auth_token")?
                .unwrap_or_default(),
            locale: row.try_get::<Option<String>, _>("locale")?.unwrap_or_default(),
            timezone: row
                .try_get::<Option<String>, _>("timezone")?
                .unwrap_or_default(),
            human_name: row.try_get("human_name")?,
            email: row.try_get("email")?,
            roles: row.try_get("roles")?,
            developer_org: row.try_get("developer_org")?,
        })
    }

    /// The developer key of the user's organization, if any. NotFound when
    /// the user does not exist.
    pub async fn get_developer_key(&self, user_id: i64) -> Result<Option<String>, StorageError> {
        use sqlx::Row as _;
        let row = sqlx::query(
            "SELECT o.`developer_key` FROM `users` u \
             LEFT OUTER JOIN `organizations` o ON u.`developer_org` = o.`id` \
             WHERE u.`id` = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;
        Ok(row.try_get("developer_key")?)
    }
}

#[cfg(test)]
#[path = "users_tests.rs"]
mod tests;
