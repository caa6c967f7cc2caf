// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const KEY: &str = "test-signing-key";

#[test]
fn round_trip() {
    let token = sign_token(KEY, 42).unwrap();
    let claims = verify_token(KEY, &token).unwrap();
    assert_eq!(claims.sub, "42");
    assert_eq!(claims.aud, TOKEN_AUDIENCE);
    assert_eq!(claims.user_id(), Some(42));
}

#[test]
fn wrong_key_is_rejected() {
    let token = sign_token(KEY, 42).unwrap();
    assert!(verify_token("other-key", &token).is_err());
}

#[test]
fn wrong_audience_is_rejected() {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = Claims {
        sub: "42".to_string(),
        aud: "somewhere-else".to_string(),
        iat: now,
        exp: now + 3600,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(KEY.as_bytes()),
    )
    .unwrap();
    assert!(verify_token(KEY, &token).is_err());
}

#[test]
fn empty_subject_is_rejected() {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = Claims {
        sub: String::new(),
        aud: TOKEN_AUDIENCE.to_string(),
        iat: now,
        exp: now + 3600,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(KEY.as_bytes()),
    )
    .unwrap();
    assert!(matches!(
        verify_token(KEY, &token),
        Err(TokenError::MissingSubject)
    ));
}

#[test]
fn expired_token_is_rejected() {
    let claims = Claims {
        sub: "42".to_string(),
        aud: TOKEN_AUDIENCE.to_string(),
        iat: 1_000,
        exp: 2_000,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(KEY.as_bytes()),
    )
    .unwrap();
    assert!(verify_token(KEY, &token).is_err());
}

#[test]
fn other_signing_algorithms_are_rejected() {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = Claims {
        sub: "42".to_string(),
        aud: TOKEN_AUDIENCE.to_string(),
        iat: now,
        exp: now + 3600,
    };
    let token = encode(
        &Header::new(Algorithm::HS384),
        &claims,
        &EncodingKey::from_secret(KEY.as_bytes()),
    )
    .unwrap();
    assert!(verify_token(KEY, &token).is_err());
}

#[test]
fn garbage_is_rejected() {
    assert!(verify_token(KEY, "not-a-token").is_err());
}
