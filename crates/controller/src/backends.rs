// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared-backend placement.
//!
//! Non-privileged users land on the shared fleet: the endpoint list of the
//! `shared-backend` workload, indexed by `user_id mod n`. Endpoints of a
//! stateful workload are name-ordered, so the mapping only moves when the
//! fleet is resized.

use k8s_openapi::api::core::v1::{Endpoints, Service};

/// Workload whose endpoints host engines for shared users.
pub const SHARED_BACKEND: &str = "shared-backend";

/// Flatten an Endpoints object into backend URLs, in the order the
/// orchestrator reports them.
pub fn backend_urls(endpoints: &Endpoints) -> Vec<String> {
    let mut urls = Vec::new();
    for subset in endpoints.subsets.iter().flatten() {
        let Some(port) = subset.ports.as_ref().and_then(|ports| ports.first()) else {
            continue;
        };
        for address in subset.addresses.iter().flatten() {
            urls.push(format!("http://{}:{}", address.ip, port.port));
        }
    }
    urls
}

/// Deterministic placement: the same user always maps to the same backend
/// for a fixed endpoint list.
pub fn pick_backend(urls: &[String], user_id: i64) -> Option<&str> {
    if urls.is_empty() {
        return None;
    }
    let index = user_id.rem_euclid(urls.len() as i64) as usize;
    Some(&urls[index])
}

/// The URL of a developer backend service, once it has an address and a
/// port.
pub fn service_url(service: &Service) -> Option<String> {
    let spec = service.spec.as_ref()?;
    let cluster_ip = spec.cluster_ip.as_ref().filter(|ip| !ip.is_empty())?;
    let port = spec.ports.as_ref().and_then(|ports| ports.first())?;
    Some(format!("http://{cluster_ip}:{}", port.port))
}

#[cfg(test)]
#[path = "backends_tests.rs"]
mod tests;
