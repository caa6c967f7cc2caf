// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workload templates for developer backends.
//!
//! Templates are plain JSON manifests read once at startup; a missing or
//! malformed template is fatal. Instantiation clones the template and stamps
//! the per-user name, namespace, and `app` label.

use std::path::{Path, PathBuf};

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse template {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// The deployment and service templates for dedicated backends.
pub struct Templates {
    pub deployment: Deployment,
    pub service: Service,
}

impl Templates {
    pub fn load(deployment_path: &Path, service_path: &Path) -> Result<Self, TemplateError> {
        Ok(Self {
            deployment: read_json(deployment_path)?,
            service: read_json(service_path)?,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, TemplateError> {
    let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| TemplateError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// The workload name for a user id (`user-<id>`).
pub fn user_name(user_id: i64) -> String {
    format!("user-{user_id}")
}

/// Parse the user id out of a `user-<id>` name.
pub fn parse_user_id(name: &str) -> Option<i64> {
    name.strip_prefix("user-")?.parse().ok()
}

/// Instantiate the deployment template for a user: set name and namespace,
/// and stamp `app=<name>` on the object, the selector, and the pod template.
/// The stored template is never mutated.
pub fn new_deployment(template: &Deployment, name: &str, namespace: &str) -> Deployment {
    let mut deployment = template.clone();
    deployment.metadata.name = Some(name.to_string());
    deployment.metadata.namespace = Some(namespace.to_string());
    deployment
        .metadata
        .labels
        .get_or_insert_with(Default::default)
        .insert("app".to_string(), name.to_string());

    let spec = deployment.spec.get_or_insert_with(Default::default);
    spec.selector
        .match_labels
        .get_or_insert_with(Default::default)
        .insert("app".to_string(), name.to_string());
    spec.template
        .metadata
        .get_or_insert_with(Default::default)
        .labels
        .get_or_insert_with(Default::default)
        .insert("app".to_string(), name.to_string());
    deployment
}

/// Instantiate the service template for a user: set name and namespace, and
/// stamp `app=<name>` on the object and the selector.
pub fn new_service(template: &Service, name: &str, namespace: &str) -> Service {
    let mut service = template.clone();
    service.metadata.name = Some(name.to_string());
    service.metadata.namespace = Some(namespace.to_string());
    service
        .metadata
        .labels
        .get_or_insert_with(Default::default)
        .insert("app".to_string(), name.to_string());
    service
        .spec
        .get_or_insert_with(Default::default)
        .selector
        .get_or_insert_with(Default::default)
        .insert("app".to_string(), name.to_string());
    service
}

#[cfg(test)]
#[path = "templates_tests.rs"]
mod tests;
