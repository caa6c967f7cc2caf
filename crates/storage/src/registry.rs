// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Table-name dispatch.
//!
//! The original design resolved table names through a runtime registry of
//! reflective descriptors. Here registration is a compile-time mapping: the
//! dispatch macros bind a type alias to the row type for a name and expand
//! the caller's body once per table, so every operation stays statically
//! typed and the unknown-name case is an ordinary match arm.

/// Names of the registered local tables.
pub const LOCAL_TABLES: &[&str] = &[
    "user_preference",
    "user_conversation",
    "user_conversation_history",
    "user_conversation_state",
];

/// Names of the registered sync tables.
pub const SYNC_TABLES: &[&str] = &["user_app", "user_channel", "user_device"];

pub fn is_local_table(name: &str) -> bool {
    LOCAL_TABLES.contains(&name)
}

pub fn is_sync_table(name: &str) -> bool {
    SYNC_TABLES.contains(&name)
}

/// Run `$body` with `$ty` bound to the local-table row type named by
/// `$name`, or evaluate the fallback for an unknown name.
///
/// ```ignore
/// with_local_row!(name, |R| {
///     let rows = table.get_all::<R>(user_id).await?;
///     Ok(respond(rows))
/// }, || Err(ProxyError::TableNotFound))
/// ```
#[macro_export]
macro_rules! with_local_row {
    ($name:expr, |$ty:ident| $body:expr, || $missing:expr) => {
        match $name {
            "user_preference" => {
                type $ty = $crate::models::UserPreference;
                $body
            }
            "user_conversation" => {
                type $ty = $crate::models::UserConversation;
                $body
            }
            "user_conversation_history" => {
                type $ty = $crate::models::UserConversationHistory;
                $body
            }
            "user_conversation_state" => {
                type $ty = $crate::models::UserConversationState;
                $body
            }
            _ => $missing,
        }
    };
}

/// Run `$body` with `$ty` bound to the sync-table row type named by
/// `$name`, or evaluate the fallback for an unknown name.
#[macro_export]
macro_rules! with_sync_row {
    ($name:expr, |$ty:ident| $body:expr, || $missing:expr) => {
        match $name {
            "user_app" => {
                type $ty = $crate::models::UserApp;
                $body
            }
            "user_channel" => {
                type $ty = $crate::models::UserChannel;
                $body
            }
            "user_device" => {
                type $ty = $crate::models::UserDevice;
                $body
            }
            _ => $missing,
        }
    };
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
