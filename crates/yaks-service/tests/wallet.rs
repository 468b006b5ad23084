//! Wallet summary and purchase-stub integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

// ============================================================================
// Wallet summary
// ============================================================================

#[tokio::test]
async fn wallet_summary_creates_wallet_lazily() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/wallet")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 0);
    assert_eq!(body["lifetime_earned"], 0);
    assert_eq!(body["lifetime_spent"], 0);
    assert!(body["transactions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn wallet_summary_without_auth_fails() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/wallet").await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn wallet_summary_lists_seeded_features_cheapest_first() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/wallet")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 6);
    assert_eq!(features[0]["key"], "post_highlight");
    assert_eq!(features[0]["cost"], 25);

    let costs: Vec<i64> = features.iter().map(|f| f["cost"].as_i64().unwrap()).collect();
    let mut sorted = costs.clone();
    sorted.sort_unstable();
    assert_eq!(costs, sorted);
}

#[tokio::test]
async fn affordability_flags_follow_the_balance() {
    let harness = TestHarness::new();
    harness.grant(40).await;

    let response = harness
        .server
        .get("/v1/wallet")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    for feature in body["features"].as_array().unwrap() {
        let affordable = feature["affordable"].as_bool().unwrap();
        let cost = feature["cost"].as_i64().unwrap();
        assert_eq!(affordable, cost <= 40, "feature {}", feature["key"]);
    }
}

#[tokio::test]
async fn wallet_summary_shows_recent_transactions_newest_first() {
    let harness = TestHarness::new();
    harness.grant(100).await;
    // ULID ids order by millisecond; keep the two grants in distinct ones.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    harness.grant(50).await;

    let response = harness
        .server
        .get("/v1/wallet")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 150);

    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["amount"], 50);
    assert_eq!(transactions[1]["amount"], 100);
    assert_eq!(transactions[0]["type"], "admin");
}

// ============================================================================
// Purchase (stubbed payment flow)
// ============================================================================

#[tokio::test]
async fn purchase_credits_yaks_at_the_configured_rate() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/wallet/purchase")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "amount_usd": 5.0 }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["yaks_added"], 500);
    assert_eq!(body["new_balance"], 500);

    assert_eq!(harness.balance().await, 500);
}

#[tokio::test]
async fn purchase_appends_a_purchase_transaction() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/wallet/purchase")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "amount_usd": 1.0 }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/v1/wallet")
        .add_header("authorization", harness.user_auth_header())
        .await;
    let body: serde_json::Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["type"], "purchase");
    assert_eq!(transactions[0]["amount"], 100);
}

#[tokio::test]
async fn purchase_rejects_non_positive_amounts() {
    let harness = TestHarness::new();

    for amount in [0.0, -5.0] {
        let response = harness
            .server
            .post("/v1/wallet/purchase")
            .add_header("authorization", harness.user_auth_header())
            .json(&json!({ "amount_usd": amount }))
            .await;

        response.assert_status_bad_request();
    }

    assert_eq!(harness.balance().await, 0);
}

#[tokio::test]
async fn purchase_is_denied_when_yaks_are_disabled() {
    let harness = TestHarness::disabled();

    let response = harness
        .server
        .post("/v1/wallet/purchase")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "amount_usd": 5.0 }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], false);

    assert_eq!(harness.balance().await, 0);
}
