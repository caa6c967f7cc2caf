// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::models::{UserApp, UserDevice};
use yare::parameterized;

#[parameterized(
    valid = { "u1", 1, true },
    empty_unique_id = { "", 1, false },
    zero_user_id = { "u1", 0, false },
    both_invalid = { "", 0, false },
)]
fn key_validity(unique_id: &str, user_id: i64, valid: bool) {
    assert_eq!(Key::new(unique_id, user_id).is_valid(), valid);
}

#[test]
fn field_value_emptiness() {
    assert!(FieldValue::Text(None).is_empty());
    assert!(FieldValue::Text(Some(String::new())).is_empty());
    assert!(!FieldValue::Text(Some("x".to_string())).is_empty());
    assert!(FieldValue::Int(None).is_empty());
    assert!(!FieldValue::Int(Some(0)).is_empty());
}

#[test]
fn row_field_access() {
    let mut row = UserDevice::default();
    row.set_key(Key::new("u1", 1));
    row.set_field("state", FieldValue::Text(Some("s1".to_string())));
    assert_eq!(row.state.as_deref(), Some("s1"));
    assert_eq!(row.field("state"), Some(FieldValue::Text(Some("s1".to_string()))));
    assert_eq!(row.field("nope"), None);
    assert!(UserDevice::has_field("state"));
    assert!(!UserDevice::has_field("nope"));
}

#[test]
fn discriminator_follows_primary_field() {
    let mut row = UserDevice {
        key: Key::new("u1", 1),
        state: Some("configured".to_string()),
    };
    assert!(row.discriminator());
    row.state = Some(String::new());
    assert!(!row.discriminator());
    row.state = None;
    assert!(!row.discriminator());
}

#[test]
fn sync_record_json_shape() {
    let record = SyncRecord::new(
        UserDevice {
            key: Key::new("u1", 1),
            state: Some("s1".to_string()),
        },
        101,
    );
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "uniqueId": "u1",
            "userId": 1,
            "lastModified": 101,
            "state": "s1",
        })
    );
}

#[test]
fn sync_record_parses_client_push() {
    let record: SyncRecord<UserDevice> = serde_json::from_str(
        r#"{"uniqueId":"u1","userId":1,"lastModified":200,"state":"s2"}"#,
    )
    .unwrap();
    assert_eq!(record.key(), &Key::new("u1", 1));
    assert_eq!(record.last_modified, 200);
    assert_eq!(record.row.state.as_deref(), Some("s2"));
    assert!(record.discriminator());
}

#[test]
fn tombstone_serializes_null_payload() {
    let record = SyncRecord::<UserDevice>::tombstone(Key::new("u3", 1), 103);
    assert!(!record.discriminator());
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["state"], serde_json::Value::Null);
    assert_eq!(json["lastModified"], 103);
}

#[test]
fn missing_payload_fields_default_to_null() {
    let record: SyncRecord<UserApp> =
        serde_json::from_str(r#"{"uniqueId":"a1","userId":7,"lastModified":5}"#).unwrap();
    assert_eq!(record.row.code, None);
    assert!(!record.discriminator());
}

#[test]
fn column_value_conversions() {
    let text: Option<String> = ColumnValue::from_field_value(FieldValue::Int(Some(3)));
    assert_eq!(text.as_deref(), Some("3"));
    let n: Option<i64> = ColumnValue::from_field_value(FieldValue::Text(Some("12".to_string())));
    assert_eq!(n, Some(12));
    let bad: Option<i64> = ColumnValue::from_field_value(FieldValue::Text(Some("x".to_string())));
    assert_eq!(bad, None);
}
