// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The registered per-user tables.
//!
//! Sync tables carry a `_journal` side table and a discriminator column;
//! local tables are plain per-user storage with no replication.

use crate::{define_row, define_sync_row};

define_row! {
    /// Configured device, synchronized between the cloud and the engine.
    pub struct UserDevice("user_device") {
        state: Option<String> = "state",
    }
}
define_sync_row!(UserDevice, journal = "user_device_journal", discriminator = "state");

define_row! {
    /// Channel state, synchronized between the cloud and the engine.
    pub struct UserChannel("user_channel") {
        value: Option<String> = "value",
    }
}
define_sync_row!(UserChannel, journal = "user_channel_journal", discriminator = "value");

define_row! {
    /// Installed app, synchronized between the cloud and the engine.
    pub struct UserApp("user_app") {
        code: Option<String> = "code",
        state: Option<String> = "state",
        name: Option<String> = "name",
        description: Option<String> = "description",
    }
}
define_sync_row!(UserApp, journal = "user_app_journal", discriminator = "code");

define_row! {
    /// Engine preference store.
    pub struct UserPreference("user_preference") {
        value: Option<String> = "value",
    }
}

define_row! {
    /// One dialogue turn of a conversation.
    pub struct UserConversation("user_conversation") {
        conversation_id: Option<String> = "conversationId",
        previous_id: Option<String> = "previousId",
        dialogue_id: Option<String> = "dialogueId",
        context: Option<String> = "context",
        agent: Option<String> = "agent",
        agent_timestamp: Option<String> = "agentTimestamp",
        agent_target: Option<String> = "agentTarget",
        intermediate_context: Option<String> = "intermediateContext",
        user: Option<String> = "user",
        user_timestamp: Option<String> = "userTimestamp",
        user_target: Option<String> = "userTarget",
        vote: Option<String> = "vote",
        comment: Option<String> = "comment",
    }
}

define_row! {
    /// Raw message log of a conversation.
    pub struct UserConversationHistory("user_conversation_history") {
        conversation_id: Option<String> = "conversationId",
        message_id: Option<i64> = "messageId",
        message: Option<String> = "message",
    }
}

define_row! {
    /// Resumable dialogue state of a conversation.
    pub struct UserConversationState("user_conversation_state") {
        history: Option<String> = "history",
        dialogue_state: Option<String> = "dialogueState",
        last_message_id: Option<i64> = "lastMessageId",
    }
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
