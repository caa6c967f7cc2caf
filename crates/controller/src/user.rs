// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The declared user object and the engine state machine.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Mode for users placed on the shared backend fleet.
pub const MODE_SHARED: &str = "shared";
/// Mode for trusted developers with a dedicated workload.
pub const MODE_DEVELOPER: &str = "developer";

/// Desired state of a user's engine, declared by the account system.
///
/// The reconciler fills in `mode` on first sight and drives `status`.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "backend.almond-cloud.dev",
    version = "v1",
    kind = "User",
    namespaced
)]
#[kube(status = "UserStatus")]
pub struct UserSpec {
    pub id: i64,
    #[serde(default)]
    pub mode: String,
}

/// Observed engine state, written back after every reconcile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct UserStatus {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub backend: String,
}

/// State of a per-user engine process.
///
/// `running` and `idle` are reported by the engine itself; `starting` and
/// `stopping` are assigned by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Starting,
    Running,
    Idle,
    Stopping,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EngineState::Starting => "starting",
            EngineState::Running => "running",
            EngineState::Idle => "idle",
            EngineState::Stopping => "stopping",
        };
        write!(f, "{label}")
    }
}
