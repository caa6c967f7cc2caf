// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration loaded from a `config.d/` directory.
//!
//! `$THINGENGINE_CONFIGDIR` (default `/etc/almond-cloud`) names a directory
//! containing `config.d/` with any number of `*.yaml` and `*.json` files.
//! Files are parsed in name-sorted order and later files overwrite earlier
//! keys, so operators can layer secrets over base settings.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the configuration directory.
pub const CONFIG_DIR_ENV: &str = "THINGENGINE_CONFIGDIR";

/// Default configuration directory.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/almond-cloud";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Configuration record shared by the proxy and the controller.
///
/// Key names match the on-disk spelling exactly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(rename = "NL_SERVER_URL", default)]
    pub nl_server_url: String,
    #[serde(rename = "DATABASE_URL", default)]
    pub database_url: String,
    #[serde(rename = "DATABASE_PROXY_URL", default)]
    pub database_proxy_url: String,
    #[serde(rename = "JWT_SIGNING_KEY", default)]
    pub jwt_signing_key: String,
    #[serde(rename = "ENABLE_DEVELOPER_BACKEND", default)]
    pub enable_developer_backend: bool,
}

impl Config {
    /// Load configuration from `$THINGENGINE_CONFIGDIR` or the default
    /// directory. A missing directory yields the default configuration so
    /// development setups can run on environment defaults alone.
    pub fn load() -> Result<Self, ConfigError> {
        let dir = std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
        Self::load_from(Path::new(&dir))
    }

    /// Load configuration from an explicit base directory.
    pub fn load_from(base: &Path) -> Result<Self, ConfigError> {
        let dir = base.join("config.d");
        let mut merged = serde_json::Map::new();

        for path in config_files(&dir)? {
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let value = parse_file(&path, &text)?;
            if let serde_json::Value::Object(map) = value {
                // Later files overwrite earlier keys.
                for (k, v) in map {
                    merged.insert(k, v);
                }
            }
        }

        serde_json::from_value(serde_json::Value::Object(merged)).map_err(|e| ConfigError::Parse {
            path: dir,
            message: e.to_string(),
        })
    }
}

/// List `*.yaml` and `*.json` files in name-sorted (glob) order.
fn config_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("json")
            )
        })
        .collect();
    files.sort();
    Ok(files)
}

fn parse_file(path: &Path, text: &str) -> Result<serde_json::Value, ConfigError> {
    let parsed = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_str(text).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str::<serde_yaml::Value>(text)
            .map_err(|e| e.to_string())
            .and_then(|v| serde_json::to_value(v).map_err(|e| e.to_string()))
    };
    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
