// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use almond_core::FakeClock;
use proptest::prelude::*;

use super::*;
use crate::models::UserDevice;
use crate::test_util::{journal_ms, seed_journal, sqlite_pool};

fn device(unique_id: &str, user_id: i64, state: &str) -> UserDevice {
    UserDevice {
        key: Key::new(unique_id, user_id),
        state: Some(state.to_string()),
    }
}

fn record(unique_id: &str, user_id: i64, lm: i64, state: &str) -> SyncRecord<UserDevice> {
    SyncRecord::new(device(unique_id, user_id, state), lm)
}

fn tombstone(unique_id: &str, user_id: i64, lm: i64) -> SyncRecord<UserDevice> {
    SyncRecord::tombstone(Key::new(unique_id, user_id), lm)
}

async fn seeded_table() -> SyncTable {
    let table = SyncTable::new(sqlite_pool().await);
    // (u1, 1) present at lm=100 with state "s1".
    assert!(table.insert_if_recent(&device("u1", 1, "s1"), 100).await.unwrap());
    table
}

#[tokio::test]
async fn fresh_push_is_applied() {
    let table = seeded_table().await;
    let done = table
        .handle_changes(&[record("u1", 1, 200, "s2")], 1)
        .await
        .unwrap();
    assert_eq!(done, vec![true]);
    let row: UserDevice = table.get_one(&Key::new("u1", 1)).await.unwrap();
    assert_eq!(row.state.as_deref(), Some("s2"));
}

#[tokio::test]
async fn stale_push_is_ignored() {
    let table = seeded_table().await;
    let done = table
        .handle_changes(&[record("u1", 1, 50, "stale")], 1)
        .await
        .unwrap();
    assert_eq!(done, vec![false]);
    let row: UserDevice = table.get_one(&Key::new("u1", 1)).await.unwrap();
    assert_eq!(row.state.as_deref(), Some("s1"));
}

#[tokio::test]
async fn equal_timestamp_favors_the_existing_record() {
    let table = seeded_table().await;
    assert!(!table.insert_if_recent(&device("u1", 1, "tie"), 100).await.unwrap());
    let row: UserDevice = table.get_one(&Key::new("u1", 1)).await.unwrap();
    assert_eq!(row.state.as_deref(), Some("s1"));
}

#[tokio::test]
async fn mixed_batch_applies_each_conditionally() {
    let table = seeded_table().await;
    assert!(table.insert_if_recent(&device("u2", 1, "s2"), 100).await.unwrap());
    let done = table
        .handle_changes(
            &[
                record("u1", 1, 50, "stale"), // loses to lm=100
                record("u2", 1, 102, "s2b"),  // wins
                tombstone("u2", 1, 103),      // deletes what the previous wrote
            ],
            1,
        )
        .await
        .unwrap();
    assert_eq!(done, vec![false, true, true]);
    assert!(matches!(
        table.get_one::<UserDevice>(&Key::new("u2", 1)).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn delete_if_recent_leaves_a_tombstone() {
    let table = seeded_table().await;
    assert!(table
        .delete_if_recent::<UserDevice>(&Key::new("u1", 1), 150)
        .await
        .unwrap());
    // Base row gone, journal entry advanced.
    assert!(matches!(
        table.get_one::<UserDevice>(&Key::new("u1", 1)).await,
        Err(StorageError::NotFound)
    ));
    let raw: Vec<SyncRecord<UserDevice>> = table.get_raw(1).await.unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].last_modified, 150);
    assert_eq!(raw[0].row.state, None);
    assert!(!raw[0].discriminator());
}

#[tokio::test]
async fn freshness_check_binds_both_key_parts() {
    // A newer journal entry for the same uniqueId under a different user
    // must not shadow this user's freshness check.
    let table = SyncTable::new(sqlite_pool().await);
    assert!(table.insert_if_recent(&device("shared", 2, "other"), 900).await.unwrap());
    assert!(table
        .delete_if_recent::<UserDevice>(&Key::new("shared", 1), 10)
        .await
        .unwrap());
    assert!(table.insert_if_recent(&device("shared", 1, "mine"), 20).await.unwrap());
    let row: UserDevice = table.get_one(&Key::new("shared", 1)).await.unwrap();
    assert_eq!(row.state.as_deref(), Some("mine"));
}

#[tokio::test]
async fn get_changes_after_is_strictly_greater() {
    let table = SyncTable::new(sqlite_pool().await);
    assert!(table.insert_if_recent(&device("u1", 1, "a"), 101).await.unwrap());
    assert!(table.insert_if_recent(&device("u2", 1, "b"), 102).await.unwrap());
    let changes: Vec<SyncRecord<UserDevice>> = table.get_changes_after(101, 1).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].key().unique_id, "u2");
    assert_eq!(changes[0].last_modified, 102);
}

#[tokio::test]
async fn sync_at_round_trip() {
    let table = SyncTable::new(sqlite_pool().await);
    assert!(table.insert_if_recent(&device("u1", 1, "s1"), 101).await.unwrap());
    assert!(table.insert_if_recent(&device("u2", 1, "s2"), 102).await.unwrap());
    let (latest, ours, done) = table
        .sync_at::<UserDevice>(100, 1, &[])
        .await
        .unwrap();
    assert_eq!(latest, 102);
    let mut lms: Vec<i64> = ours.iter().map(|r| r.last_modified).collect();
    lms.sort_unstable();
    assert_eq!(lms, vec![101, 102]);
    assert!(done.is_empty());
}

#[tokio::test]
async fn sync_at_applies_pushed_changes_atomically() {
    let table = seeded_table().await;
    let (latest, ours, done) = table
        .sync_at(100, 1, &[record("u9", 1, 300, "new")])
        .await
        .unwrap();
    // Reads happen before the push is applied.
    assert_eq!(latest, 100);
    assert!(ours.is_empty());
    assert_eq!(done, vec![true]);
    let row: UserDevice = table.get_one(&Key::new("u9", 1)).await.unwrap();
    assert_eq!(row.state.as_deref(), Some("new"));
}

#[tokio::test]
async fn sync_at_is_scoped_to_the_user() {
    let table = SyncTable::new(sqlite_pool().await);
    assert!(table.insert_if_recent(&device("u1", 1, "mine"), 100).await.unwrap());
    assert!(table.insert_if_recent(&device("u1", 2, "theirs"), 999).await.unwrap());
    let (latest, ours, _) = table.sync_at::<UserDevice>(0, 1, &[]).await.unwrap();
    assert_eq!(latest, 100);
    assert_eq!(ours.len(), 1);
    assert_eq!(ours[0].key().user_id, 1);
}

#[tokio::test]
async fn replace_all_keeps_only_present_records() {
    let table = seeded_table().await;
    assert!(table.insert_if_recent(&device("u2", 1, "s2"), 101).await.unwrap());
    assert!(table.insert_if_recent(&device("u3", 1, "s3"), 102).await.unwrap());
    table
        .replace_all(
            &[
                record("a", 1, 10, "a-state"),
                record("b", 1, 11, "b-state"),
                record("c", 1, 12, ""), // empty discriminator, skipped
            ],
            1,
        )
        .await
        .unwrap();
    let mut rows: Vec<UserDevice> = table.get_all(1).await.unwrap();
    rows.sort_by(|a, b| a.key.unique_id.cmp(&b.key.unique_id));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].key.unique_id, "a");
    assert_eq!(rows[1].key.unique_id, "b");
    // Journal reflects exactly the kept records.
    let raw: Vec<SyncRecord<UserDevice>> = table.get_raw(1).await.unwrap();
    assert_eq!(raw.len(), 2);
}

#[tokio::test]
async fn replace_all_with_no_records_clears_the_user() {
    let table = seeded_table().await;
    table.replace_all::<UserDevice>(&[], 1).await.unwrap();
    assert!(table.get_all::<UserDevice>(1).await.unwrap().is_empty());
    assert!(table.get_raw::<UserDevice>(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn insert_one_stamps_the_process_clock() {
    let pool = sqlite_pool().await;
    let clock = FakeClock::new();
    clock.set_epoch_ms(5_000);
    let table = SyncTable::with_clock(pool.clone(), clock.clone());
    let assigned = table.insert_one(&device("u1", 1, "s1")).await.unwrap();
    assert_eq!(assigned, 5_000);
    assert_eq!(journal_ms(&pool, "user_device", "u1", 1).await, Some(5_000));

    clock.advance(std::time::Duration::from_millis(250));
    let assigned = table.delete_one::<UserDevice>(&Key::new("u1", 1)).await.unwrap();
    assert_eq!(assigned, 5_250);
    assert_eq!(journal_ms(&pool, "user_device", "u1", 1).await, Some(5_250));
}

#[tokio::test]
async fn get_raw_reports_tombstones_with_null_payload() {
    let pool = sqlite_pool().await;
    let table = SyncTable::new(pool.clone());
    assert!(table.insert_if_recent(&device("live", 1, "x"), 10).await.unwrap());
    seed_journal(&pool, "user_device", "dead", 1, 20).await;
    let mut raw: Vec<SyncRecord<UserDevice>> = table.get_raw(1).await.unwrap();
    raw.sort_by(|a, b| a.key().unique_id.cmp(&b.key().unique_id));
    assert_eq!(raw.len(), 2);
    assert_eq!(raw[0].key().unique_id, "dead");
    assert!(!raw[0].discriminator());
    assert_eq!(raw[1].key().unique_id, "live");
    assert!(raw[1].discriminator());
}

#[tokio::test]
async fn sync_at_double_submit_is_idempotent() {
    let push = vec![record("u5", 1, 500, "v"), tombstone("u6", 1, 501)];
    let table = seeded_table().await;
    let (_, _, first) = table.sync_at(0, 1, &push).await.unwrap();
    assert_eq!(first, vec![true, true]);
    let state_after_first: Vec<SyncRecord<UserDevice>> = table.get_raw(1).await.unwrap();

    let (_, _, second) = table.sync_at(0, 1, &push).await.unwrap();
    // Equal timestamps tie in favor of what is already stored.
    assert_eq!(second, vec![false, false]);
    let state_after_second: Vec<SyncRecord<UserDevice>> = table.get_raw(1).await.unwrap();
    assert_eq!(state_after_first, state_after_second);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Random interleavings of conditional inserts and deletes agree with a
    /// last-writer-wins model and never move a journal timestamp backwards.
    #[test]
    fn conditional_writes_follow_the_lww_model(
        ops in proptest::collection::vec((0usize..3, 1i64..400, any::<bool>()), 1..32)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let keys = ["k0", "k1", "k2"];
            let pool = sqlite_pool().await;
            let table = SyncTable::new(pool.clone());
            let mut model: HashMap<&str, i64> = HashMap::new();

            for (key_idx, lm, is_insert) in ops {
                let unique_id = keys[key_idx];
                let expect_applied = model.get(unique_id).map(|prev| *prev < lm).unwrap_or(true);
                let applied = if is_insert {
                    table
                        .insert_if_recent(&device(unique_id, 1, "state"), lm)
                        .await
                        .unwrap()
                } else {
                    table
                        .delete_if_recent::<UserDevice>(&Key::new(unique_id, 1), lm)
                        .await
                        .unwrap()
                };
                prop_assert_eq!(applied, expect_applied);
                if applied {
                    model.insert(unique_id, lm);
                }
                // The stored journal timestamp always matches the model.
                let stored = journal_ms(&pool, "user_device", unique_id, 1).await;
                prop_assert_eq!(stored, model.get(unique_id).copied());
            }
            Ok(())
        })?;
    }
}
