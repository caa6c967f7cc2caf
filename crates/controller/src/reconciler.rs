// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The user reconcile loop.
//!
//! Each invocation drives one `user-<id>` object toward its desired state:
//! resolve a backend (shared fleet or dedicated workload), observe the
//! engine, and start or retire it as needed. Observed state and the chosen
//! mode are written back on every exit path; the whole iteration runs under
//! a ten-second deadline and requeues itself with backoff on failure.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Endpoints, Service};
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::json;
use thiserror::Error;
use tracing::Instrument;

use almond_core::{sign_token, Config, TokenError};
use almond_storage::{StorageError, User as DbUser, UserStore};

use crate::backends::{backend_urls, pick_backend, service_url, SHARED_BACKEND};
use crate::cache::DbCache;
use crate::engine::{EngineClient, EngineError, PlatformOptions};
use crate::metrics::ControllerMetrics;
use crate::templates::{new_deployment, new_service, parse_user_id, Templates};
use crate::user::{EngineState, User, UserStatus, MODE_DEVELOPER, MODE_SHARED};

/// Deadline for one reconcile iteration.
pub const RECONCILE_TIMEOUT: Duration = Duration::from_secs(10);

const RUNNING_REQUEUE: Duration = Duration::from_secs(10);
const START_REQUEUE: Duration = Duration::from_secs(1);
const ERROR_REQUEUE: Duration = Duration::from_secs(2);
const CREATE_REQUEUE: Duration = Duration::from_secs(2);

const CACHE_USER: &str = "user";
const CACHE_DEVELOPER_KEY: &str = "developer-key";

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid user name {0:?}")]
    BadName(String),
    #[error("backend endpoints not found")]
    NoBackends,
    #[error("reconcile deadline exceeded")]
    DeadlineExceeded,
    #[error(transparent)]
    Kube(#[from] kube::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl ReconcileError {
    fn is_dial(&self) -> bool {
        matches!(self, ReconcileError::Engine(error) if error.is_dial())
    }
}

/// Everything a reconcile needs, built once at startup.
pub struct Context {
    pub client: kube::Client,
    pub config: Arc<Config>,
    pub users: UserStore,
    pub user_cache: DbCache<DbUser>,
    pub devkey_cache: DbCache<Option<String>>,
    pub engines: Arc<dyn EngineClient>,
    pub templates: Arc<Templates>,
    pub metrics: ControllerMetrics,
}

/// Per-iteration scratch: the status under construction and the declared
/// object, once retrieved, that it will be written back to.
#[derive(Default)]
struct Scratch {
    status: UserStatus,
    retrieved: Option<User>,
    mode: &'static str,
}

/// Entry point handed to the controller runtime.
pub async fn reconcile(user: Arc<User>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    ctx.metrics.reconciles.inc();
    let name = user.name_any();
    let namespace = user.namespace().unwrap_or_else(|| "default".to_string());
    let span = tracing::info_span!("reconcile", %name, %namespace);
    let work = reconcile_user(&name, &namespace, &ctx).instrument(span);
    match tokio::time::timeout(RECONCILE_TIMEOUT, work).await {
        Ok(result) => result,
        Err(_) => Err(ReconcileError::DeadlineExceeded),
    }
}

/// Failed reconciles requeue shortly; the next iteration re-observes.
pub fn error_policy(_user: Arc<User>, error: &ReconcileError, ctx: Arc<Context>) -> Action {
    ctx.metrics.failures.inc();
    tracing::warn!(error = %error, "reconcile failed");
    Action::requeue(ERROR_REQUEUE)
}

async fn reconcile_user(
    name: &str,
    namespace: &str,
    ctx: &Context,
) -> Result<Action, ReconcileError> {
    let api: Api<User> = Api::namespaced(ctx.client.clone(), namespace);
    let mut scratch = Scratch::default();

    let result = run(name, namespace, ctx, &api, &mut scratch).await;

    if let Err(error) = &result {
        // Dial errors requeue without turning the status into an error.
        if !error.is_dial() {
            scratch.status.state = error.to_string();
        }
    }
    if let Some(declared) = &scratch.retrieved {
        write_back(&api, declared, &scratch.status, scratch.mode).await;
    }
    result
}

async fn run(
    name: &str,
    namespace: &str,
    ctx: &Context,
    api: &Api<User>,
    scratch: &mut Scratch,
) -> Result<Action, ReconcileError> {
    let user_id = parse_user_id(name).ok_or_else(|| ReconcileError::BadName(name.to_string()))?;
    let db_user = ctx
        .user_cache
        .get_or_fetch(CACHE_USER, user_id, true, || ctx.users.get_user(user_id))
        .await?;
    let developer = db_user.is_trusted_developer() && ctx.config.enable_developer_backend;
    scratch.mode = if developer { MODE_DEVELOPER } else { MODE_SHARED };

    if developer {
        developer_path(name, namespace, ctx, api, user_id, &db_user, scratch).await
    } else {
        shared_path(name, namespace, ctx, api, user_id, &db_user, scratch).await
    }
}

async fn shared_path(
    name: &str,
    namespace: &str,
    ctx: &Context,
    api: &Api<User>,
    user_id: i64,
    db_user: &DbUser,
    scratch: &mut Scratch,
) -> Result<Action, ReconcileError> {
    let endpoints: Api<Endpoints> = Api::namespaced(ctx.client.clone(), namespace);
    let urls = endpoints
        .get_opt(SHARED_BACKEND)
        .await?
        .map(|eps| backend_urls(&eps))
        .unwrap_or_default();
    let backend = pick_backend(&urls, user_id)
        .ok_or(ReconcileError::NoBackends)?
        .to_string();
    scratch.status.backend = backend.clone();

    let engine_state = ctx.engines.engine_status(&backend, user_id).await?;
    scratch.status.state = engine_state.to_string();

    let Some(declared) = api.get_opt(name).await? else {
        // Already deleted: stop anything still running on its behalf.
        if engine_alive(engine_state) {
            ctx.engines.kill_engine(&backend, user_id).await?;
        }
        return Ok(Action::await_change());
    };
    scratch.retrieved = Some(declared);

    if marked_for_deletion(scratch) {
        if engine_alive(engine_state) {
            ctx.engines.kill_engine(&backend, user_id).await?;
        }
        return Ok(Action::await_change());
    }

    converge(name, ctx, api, user_id, db_user, &backend, engine_state, scratch).await
}

async fn developer_path(
    name: &str,
    namespace: &str,
    ctx: &Context,
    api: &Api<User>,
    user_id: i64,
    db_user: &DbUser,
    scratch: &mut Scratch,
) -> Result<Action, ReconcileError> {
    let deployments: Api<Deployment> = Api::namespaced(ctx.client.clone(), namespace);
    let services: Api<Service> = Api::namespaced(ctx.client.clone(), namespace);

    let Some(declared) = api.get_opt(name).await? else {
        teardown_developer(ctx, &deployments, &services, name, user_id, None).await?;
        return Ok(Action::await_change());
    };
    scratch.retrieved = Some(declared);

    if marked_for_deletion(scratch) {
        let backend = match services.get_opt(name).await? {
            Some(service) => service_url(&service),
            None => None,
        };
        let engine_state = match &backend {
            Some(backend) => ctx.engines.engine_status(backend, user_id).await.ok(),
            None => None,
        };
        let kill = backend.as_deref().zip(engine_state);
        teardown_developer(ctx, &deployments, &services, name, user_id, kill).await?;
        return Ok(Action::await_change());
    }

    // Dedicated workload first: bring up the deployment...
    let Some(deployment) = deployments.get_opt(name).await? else {
        let manifest = new_deployment(&ctx.templates.deployment, name, namespace);
        deployments.create(&PostParams::default(), &manifest).await?;
        tracing::info!("created developer deployment");
        scratch.status.state = EngineState::Starting.to_string();
        return Ok(Action::requeue(CREATE_REQUEUE));
    };
    let available = deployment
        .status
        .as_ref()
        .and_then(|status| status.available_replicas)
        .unwrap_or(0);
    if available < 1 {
        scratch.status.state = EngineState::Starting.to_string();
        return Ok(Action::requeue(CREATE_REQUEUE));
    }

    // ...then the service fronting it.
    let service = match services.get_opt(name).await? {
        Some(service) => service,
        None => {
            let manifest = new_service(&ctx.templates.service, name, namespace);
            services.create(&PostParams::default(), &manifest).await?;
            tracing::info!("created developer service");
            scratch.status.state = EngineState::Starting.to_string();
            return Ok(Action::requeue(CREATE_REQUEUE));
        }
    };
    let Some(backend) = service_url(&service) else {
        scratch.status.state = EngineState::Starting.to_string();
        return Ok(Action::requeue(CREATE_REQUEUE));
    };
    scratch.status.backend = backend.clone();

    let engine_state = ctx.engines.engine_status(&backend, user_id).await?;
    scratch.status.state = engine_state.to_string();

    converge(name, ctx, api, user_id, db_user, &backend, engine_state, scratch).await
}

/// Drive the engine toward the desired state once a backend is known.
#[allow(clippy::too_many_arguments)]
async fn converge(
    name: &str,
    ctx: &Context,
    api: &Api<User>,
    user_id: i64,
    db_user: &DbUser,
    backend: &str,
    engine_state: EngineState,
    scratch: &mut Scratch,
) -> Result<Action, ReconcileError> {
    // Scaling may have moved the user to a different backend; retire the
    // engine at the old address first. Not fatal if the old host is gone.
    let previous = scratch
        .retrieved
        .as_ref()
        .and_then(|user| user.status.as_ref())
        .map(|status| status.backend.clone())
        .unwrap_or_default();
    if !previous.is_empty() && previous != backend {
        if let Err(error) = ctx.engines.kill_engine(&previous, user_id).await {
            tracing::warn!(%previous, error = %error, "failed to kill engine at previous backend");
        }
    }

    match decide(engine_state) {
        EngineDecision::Keep => Ok(Action::requeue(RUNNING_REQUEUE)),
        EngineDecision::Retire => {
            // Idle engines are stopped and their declared object removed;
            // the next login recreates it.
            ctx.engines.kill_engine(backend, user_id).await?;
            api.delete(name, &DeleteParams::default()).await?;
            scratch.retrieved = None;
            Ok(Action::await_change())
        }
        EngineDecision::Start => {
            let developer_key = ctx
                .devkey_cache
                .get_or_fetch(CACHE_DEVELOPER_KEY, user_id, true, || {
                    ctx.users.get_developer_key(user_id)
                })
                .await?;
            let options = platform_options(&ctx.config, db_user, developer_key)?;
            start_engine(ctx.engines.as_ref(), backend, &options, &mut scratch.status).await
        }
    }
}

/// Launch the engine. Failures land in the status string and requeue;
/// connection-level failures bubble up for a clean requeue instead.
async fn start_engine(
    engines: &dyn EngineClient,
    backend: &str,
    options: &PlatformOptions,
    status: &mut UserStatus,
) -> Result<Action, ReconcileError> {
    match engines.run_engine(backend, options).await {
        Ok(()) => {
            status.state = EngineState::Starting.to_string();
            Ok(Action::requeue(START_REQUEUE))
        }
        Err(error) if error.is_dial() => Err(error.into()),
        Err(error) => {
            status.state = error.to_string();
            Ok(Action::requeue(ERROR_REQUEUE))
        }
    }
}

/// What to do with an engine in the given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineDecision {
    /// Healthy; re-observe later.
    Keep,
    /// Idle; stop it and drop the declared object.
    Retire,
    /// Not serving; (re)start it.
    Start,
}

fn decide(state: EngineState) -> EngineDecision {
    match state {
        EngineState::Running => EngineDecision::Keep,
        EngineState::Idle => EngineDecision::Retire,
        EngineState::Starting | EngineState::Stopping => EngineDecision::Start,
    }
}

fn engine_alive(state: EngineState) -> bool {
    matches!(state, EngineState::Running | EngineState::Idle)
}

fn marked_for_deletion(scratch: &Scratch) -> bool {
    scratch
        .retrieved
        .as_ref()
        .map(|user| user.metadata.deletion_timestamp.is_some())
        .unwrap_or(false)
}

/// One step of a developer-backend teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TeardownStep {
    KillEngine(String),
    DeleteService,
    DeleteDeployment,
}

/// Teardown order: the engine dies first (it needs the service address),
/// then the service, then the deployment.
fn teardown_plan(kill: Option<(&str, EngineState)>) -> Vec<TeardownStep> {
    let mut plan = Vec::new();
    if let Some((backend, state)) = kill {
        if engine_alive(state) {
            plan.push(TeardownStep::KillEngine(backend.to_string()));
        }
    }
    plan.push(TeardownStep::DeleteService);
    plan.push(TeardownStep::DeleteDeployment);
    plan
}

async fn teardown_developer(
    ctx: &Context,
    deployments: &Api<Deployment>,
    services: &Api<Service>,
    name: &str,
    user_id: i64,
    kill: Option<(&str, EngineState)>,
) -> Result<(), ReconcileError> {
    for step in teardown_plan(kill) {
        match step {
            TeardownStep::KillEngine(backend) => {
                if let Err(error) = ctx.engines.kill_engine(&backend, user_id).await {
                    tracing::warn!(%backend, error = %error, "failed to kill developer engine");
                }
            }
            TeardownStep::DeleteService => {
                delete_ignoring_missing(services, name).await?;
            }
            TeardownStep::DeleteDeployment => {
                delete_ignoring_missing(deployments, name).await?;
            }
        }
    }
    tracing::info!(user_id, "developer backend torn down");
    Ok(())
}

async fn delete_ignoring_missing<K>(api: &Api<K>, name: &str) -> Result<(), ReconcileError>
where
    K: kube::Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
        Err(error) => Err(error.into()),
    }
}

/// Assemble the run-engine request body for a user.
fn platform_options(
    config: &Config,
    user: &DbUser,
    developer_key: Option<String>,
) -> Result<PlatformOptions, TokenError> {
    let token = sign_token(&config.jwt_signing_key, user.id)?;
    Ok(PlatformOptions {
        user_id: user.id,
        cloud_id: user.cloud_id.clone(),
        auth_token: user.auth_token.clone(),
        developer_key,
        locale: user.locale.clone(),
        timezone: user.timezone.clone(),
        db_proxy_url: config.database_proxy_url.clone(),
        db_proxy_access_token: token,
        human_name: user.human_name.clone(),
        email: user.email.clone(),
    })
}

/// Write `spec.mode` (when empty) and the computed status back to the
/// declared object. Failures are logged and tolerated; the next reconcile
/// re-observes and rewrites.
async fn write_back(api: &Api<User>, declared: &User, status: &UserStatus, mode: &str) {
    let name = declared.name_any();
    if declared.spec.mode.is_empty() && !mode.is_empty() {
        let patch = json!({"spec": {"mode": mode}});
        if let Err(error) = api
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            tracing::warn!(%name, error = %error, "failed to write back mode");
        }
    }
    let patch = json!({"status": status});
    match api
        .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
    {
        Ok(_) => {
            tracing::info!(%name, state = %status.state, backend = %status.backend, "status updated")
        }
        Err(error) => tracing::warn!(%name, error = %error, "failed to write back status"),
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
