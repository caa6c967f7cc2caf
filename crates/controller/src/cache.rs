// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-local cache for database lookups.
//!
//! A latency optimization only: entries expire after two hours, stale
//! entries are never returned, and the map is lock-guarded because distinct
//! users reconcile in parallel.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;

use almond_core::{Clock, SystemClock};

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60 * 60);

struct Entry<T> {
    value: T,
    expires_at_ms: i64,
}

pub struct DbCache<T, C: Clock = SystemClock> {
    ttl_ms: i64,
    clock: C,
    entries: Mutex<HashMap<String, Entry<T>>>,
}

impl<T: Clone> DbCache<T, SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(DEFAULT_TTL, SystemClock)
    }
}

impl<T: Clone> Default for DbCache<T, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, C: Clock> DbCache<T, C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            ttl_ms: ttl.as_millis() as i64,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value for `"{prefix}-{user_id}"`, or run the
    /// fetcher and cache its result. `use_cache = false` always refetches
    /// and refreshes the entry.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        prefix: &str,
        user_id: i64,
        use_cache: bool,
        fetcher: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = format!("{prefix}-{user_id}");
        if use_cache {
            let now = self.clock.epoch_ms();
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some(entry) if entry.expires_at_ms > now => return Ok(entry.value.clone()),
                Some(_) => {
                    entries.remove(&key);
                }
                None => {}
            }
        }
        let value = fetcher().await?;
        let expires_at_ms = self.clock.epoch_ms() + self.ttl_ms;
        self.entries.lock().insert(
            key,
            Entry {
                value: value.clone(),
                expires_at_ms,
            },
        );
        Ok(value)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
