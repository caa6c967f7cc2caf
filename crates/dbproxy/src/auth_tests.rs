// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_util::{send_with_auth, test_router, SIGNING_KEY};
use almond_core::sign_token;
use yare::parameterized;

fn gate() -> AuthGate {
    AuthGate::new(SIGNING_KEY).unwrap()
}

fn headers_with(value: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(value) = value {
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
    }
    headers
}

#[test]
fn missing_header_is_rejected() {
    assert!(matches!(
        gate().authorize(&headers_with(None)),
        Err(AuthError::MissingHeader)
    ));
}

#[parameterized(
    no_scheme = { "abcdef" },
    wrong_scheme = { "Token abcdef" },
    empty_token = { "Bearer " },
)]
fn malformed_headers_are_rejected(value: &str) {
    assert!(matches!(
        gate().authorize(&headers_with(Some(value))),
        Err(AuthError::Malformed)
    ));
}

#[parameterized(
    uppercase = { "Bearer" },
    lowercase = { "bearer" },
)]
fn valid_token_passes(scheme: &str) {
    let token = sign_token(SIGNING_KEY, 42).unwrap();
    let claims = gate()
        .authorize(&headers_with(Some(&format!("{scheme} {token}"))))
        .unwrap();
    assert_eq!(claims.sub, "42");
}

#[test]
fn token_signed_with_another_key_is_rejected() {
    let token = sign_token("some-other-key", 42).unwrap();
    assert!(matches!(
        gate().authorize(&headers_with(Some(&format!("Bearer {token}")))),
        Err(AuthError::InvalidToken(_))
    ));
}

#[tokio::test]
async fn routes_require_a_token() {
    let (router, _pool) = test_router().await;
    let (status, body) =
        send_with_auth(&router, "GET", "/synctable/user_device/1", None, None).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "missing authorization header");

    let (status, _) = send_with_auth(
        &router,
        "GET",
        "/synctable/user_device/1",
        None,
        Some("Bearer garbage".to_string()),
    )
    .await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn metrics_endpoint_is_open() {
    let (router, _pool) = test_router().await;
    let (status, _) = send_with_auth(&router, "GET", "/metrics", None, None).await;
    assert_eq!(status, 200);
}
