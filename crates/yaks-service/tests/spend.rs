//! Feature spending integration tests.
//!
//! These run without a platform configured: the debit, feature-use
//! lifecycle, and uniqueness rules are exercised end to end while effect
//! application is skipped. Effect behavior is covered in `expiry.rs`.

mod common;

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use common::TestHarness;
use serde_json::json;

async fn spend(
    harness: &TestHarness,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = harness
        .server
        .post("/v1/wallet/spend")
        .add_header("authorization", harness.user_auth_header())
        .json(&body)
        .await;
    let status = response.status_code();
    (status, response.json())
}

// ============================================================================
// Success paths
// ============================================================================

#[tokio::test]
async fn permanent_feature_spend_has_no_expiry() {
    let harness = TestHarness::new();
    harness.grant(100).await;

    let (status, body) = spend(
        &harness,
        json!({ "feature_key": "post_highlight", "post_id": 7, "feature_data": {"color": "gold"} }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["new_balance"], 75);
    assert!(body["feature_use_id"].as_str().is_some());
    assert!(body.get("expires_at").is_none());

    assert_eq!(harness.balance().await, 75);
}

#[tokio::test]
async fn timed_feature_spend_expires_at_the_configured_duration() {
    let harness = TestHarness::new();
    harness.grant(100).await;

    let before = Utc::now();
    let (status, body) = spend(&harness, json!({ "feature_key": "post_pin", "post_id": 7 })).await;
    let after = Utc::now();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["new_balance"], 50);

    let expires_at: DateTime<Utc> = body["expires_at"]
        .as_str()
        .expect("timed use carries expires_at")
        .parse()
        .unwrap();
    assert!(expires_at >= before + Duration::hours(24));
    assert!(expires_at <= after + Duration::hours(24));
}

#[tokio::test]
async fn spend_appends_a_spend_transaction_with_feature_source() {
    let harness = TestHarness::new();
    harness.grant(100).await;

    spend(&harness, json!({ "feature_key": "post_highlight", "post_id": 7 })).await;

    let response = harness
        .server
        .get("/v1/wallet")
        .add_header("authorization", harness.user_auth_header())
        .await;
    let body: serde_json::Value = response.json();
    let spend_tx = body["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|tx| tx["type"] == "spend")
        .expect("spend transaction recorded");
    assert_eq!(spend_tx["amount"], -25);
    assert_eq!(spend_tx["source"], "feature_post_highlight");
    assert_eq!(body["lifetime_spent"], 25);
}

#[tokio::test]
async fn same_feature_on_different_posts_is_allowed() {
    let harness = TestHarness::new();
    harness.grant(100).await;

    let (_, first) = spend(&harness, json!({ "feature_key": "post_highlight", "post_id": 7 })).await;
    let (_, second) =
        spend(&harness, json!({ "feature_key": "post_highlight", "post_id": 8 })).await;

    assert_eq!(first["success"], true);
    assert_eq!(second["success"], true);
    assert_eq!(harness.balance().await, 50);
}

#[tokio::test]
async fn user_feature_needs_no_target() {
    let harness = TestHarness::new();
    harness.grant(100).await;

    let (status, body) = spend(
        &harness,
        json!({ "feature_key": "custom_flair", "feature_data": {"text": "Yak Herder"} }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["new_balance"], 0);
}

// ============================================================================
// Failure paths (structured results, never HTTP errors)
// ============================================================================

#[tokio::test]
async fn duplicate_application_to_the_same_post_fails() {
    let harness = TestHarness::new();
    harness.grant(100).await;

    let (_, first) = spend(&harness, json!({ "feature_key": "post_highlight", "post_id": 7 })).await;
    assert_eq!(first["success"], true);

    let (status, second) =
        spend(&harness, json!({ "feature_key": "post_highlight", "post_id": 7 })).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(second["success"], false);
    assert!(second["error"]
        .as_str()
        .unwrap()
        .contains("already applied"));

    // The rejected purchase debited nothing.
    assert_eq!(harness.balance().await, 75);
}

#[tokio::test]
async fn insufficient_balance_fails_without_mutation() {
    let harness = TestHarness::new();
    harness.grant(20).await;

    let (status, body) = spend(&harness, json!({ "feature_key": "post_pin", "post_id": 7 })).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("insufficient balance"));
    assert_eq!(harness.balance().await, 20);
}

#[tokio::test]
async fn unknown_feature_fails() {
    let harness = TestHarness::new();
    harness.grant(100).await;

    let (status, body) = spend(&harness, json!({ "feature_key": "no_such_feature" })).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn post_feature_without_a_post_fails() {
    let harness = TestHarness::new();
    harness.grant(100).await;

    let (status, body) = spend(&harness, json!({ "feature_key": "post_highlight" })).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("post"));
    assert_eq!(harness.balance().await, 100);
}

#[tokio::test]
async fn spend_requires_user_auth() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/wallet/spend")
        .json(&json!({ "feature_key": "post_highlight", "post_id": 7 }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn spend_is_denied_when_yaks_are_disabled() {
    let harness = TestHarness::disabled();
    harness.grant(100).await;

    let (status, body) = spend(&harness, json!({ "feature_key": "post_highlight", "post_id": 7 })).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(harness.balance().await, 100);
}
