// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};

use almond_core::FakeClock;

use super::*;

fn cache(clock: &FakeClock) -> DbCache<String, FakeClock> {
    DbCache::with_clock(DEFAULT_TTL, clock.clone())
}

#[tokio::test]
async fn second_read_hits_the_cache() {
    let clock = FakeClock::new();
    let cache = cache(&clock);
    let fetches = AtomicUsize::new(0);

    for _ in 0..3 {
        let value: Result<String, ()> = cache
            .get_or_fetch("user", 1, true, || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok("value".to_string())
            })
            .await;
        assert_eq!(value.unwrap(), "value");
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_entries_are_refetched() {
    let clock = FakeClock::new();
    let cache = cache(&clock);
    let fetches = AtomicUsize::new(0);
    let mut fetch = || {
        fetches.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, ()>(format!("v{}", fetches.load(Ordering::SeqCst))) }
    };

    let first = cache.get_or_fetch("user", 1, true, &mut fetch).await.unwrap();
    clock.advance(DEFAULT_TTL + Duration::from_millis(1));
    let second = cache.get_or_fetch("user", 1, true, &mut fetch).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn bypassing_the_cache_refreshes_the_entry() {
    let clock = FakeClock::new();
    let cache = cache(&clock);

    let first: Result<String, ()> = cache
        .get_or_fetch("user", 1, true, || async { Ok("old".to_string()) })
        .await;
    assert_eq!(first.unwrap(), "old");

    let refreshed: Result<String, ()> = cache
        .get_or_fetch("user", 1, false, || async { Ok("new".to_string()) })
        .await;
    assert_eq!(refreshed.unwrap(), "new");

    // The refreshed value is now served from cache.
    let cached: Result<String, ()> = cache
        .get_or_fetch("user", 1, true, || async { Ok("unused".to_string()) })
        .await;
    assert_eq!(cached.unwrap(), "new");
}

#[tokio::test]
async fn entries_are_scoped_by_prefix_and_user() {
    let clock = FakeClock::new();
    let cache = cache(&clock);
    let a: Result<String, ()> = cache
        .get_or_fetch("user", 1, true, || async { Ok("a".to_string()) })
        .await;
    let b: Result<String, ()> = cache
        .get_or_fetch("developer-key", 1, true, || async { Ok("b".to_string()) })
        .await;
    let c: Result<String, ()> = cache
        .get_or_fetch("user", 2, true, || async { Ok("c".to_string()) })
        .await;
    assert_eq!(a.unwrap(), "a");
    assert_eq!(b.unwrap(), "b");
    assert_eq!(c.unwrap(), "c");
}

#[tokio::test]
async fn fetch_errors_propagate_and_are_not_cached() {
    let clock = FakeClock::new();
    let cache = cache(&clock);
    let failed: Result<String, &str> = cache
        .get_or_fetch("user", 1, true, || async { Err("boom") })
        .await;
    assert_eq!(failed.unwrap_err(), "boom");

    let recovered: Result<String, &str> = cache
        .get_or_fetch("user", 1, true, || async { Ok("fine".to_string()) })
        .await;
    assert_eq!(recovered.unwrap(), "fine");
}
