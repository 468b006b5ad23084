//! Admin surface integration tests: stats, grants, transaction audit, and
//! catalog CRUD.

mod common;

use common::TestHarness;
use serde_json::json;

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn admin_routes_require_the_service_key() {
    let harness = TestHarness::new();

    harness.server.get("/v1/admin/stats").await.assert_status_unauthorized();

    harness
        .server
        .get("/v1/admin/stats")
        .add_header("x-api-key", "wrong-key".to_string())
        .await
        .assert_status_unauthorized();
}

// ============================================================================
// Stats
// ============================================================================

#[tokio::test]
async fn stats_reflect_ledger_activity() {
    let harness = TestHarness::new();
    harness.grant(100).await;

    harness
        .server
        .post("/v1/wallet/spend")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "feature_key": "post_highlight", "post_id": 7 }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/v1/admin/stats")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["total_wallets"], 1);
    assert_eq!(body["total_transactions"], 2);
    assert_eq!(body["total_yaks_in_circulation"], 75);
    assert_eq!(body["total_yaks_earned"], 100);
    assert_eq!(body["total_yaks_spent"], 25);
    assert_eq!(body["total_feature_uses"], 1);
    assert_eq!(body["active_feature_uses"], 1);
    assert_eq!(body["recent_transactions"].as_array().unwrap().len(), 2);
}

// ============================================================================
// Grants
// ============================================================================

#[tokio::test]
async fn grant_credits_the_wallet_with_an_audit_record() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/admin/grant")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": 500,
            "reason": "Contest winner"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["new_balance"], 500);

    let response = harness
        .server
        .get("/v1/wallet")
        .add_header("authorization", harness.user_auth_header())
        .await;
    let body: serde_json::Value = response.json();
    let tx = &body["transactions"].as_array().unwrap()[0];
    assert_eq!(tx["type"], "admin");
    assert_eq!(tx["description"], "Contest winner");
}

#[tokio::test]
async fn grant_rejects_bad_input() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/admin/grant")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "user_id": "not-a-uuid", "amount": 10 }))
        .await
        .assert_status_bad_request();

    harness
        .server
        .post("/v1/admin/grant")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "user_id": harness.test_user_id.to_string(), "amount": 0 }))
        .await
        .assert_status_bad_request();
}

// ============================================================================
// Transaction audit
// ============================================================================

#[tokio::test]
async fn transactions_filter_by_type_and_user() {
    let harness = TestHarness::new();
    harness.grant(100).await;

    let other = yaks_core::UserId::generate();
    harness.grant_to(&other, 30).await;

    harness
        .server
        .post("/v1/wallet/spend")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "feature_key": "post_highlight", "post_id": 7 }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/v1/admin/transactions?type=spend")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["amount"], -25);

    let url = format!("/v1/admin/transactions?user_id={other}");
    let response = harness
        .server
        .get(&url)
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["user_id"], other.to_string());

    harness
        .server
        .get("/v1/admin/transactions?type=bogus")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await
        .assert_status_bad_request();
}

// ============================================================================
// Feature catalog CRUD
// ============================================================================

#[tokio::test]
async fn feature_catalog_crud() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/admin/features")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["features"].as_array().unwrap().len(), 6);

    let response = harness
        .server
        .post("/v1/admin/features")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "feature_key": "topic_spotlight",
            "feature_name": "Topic Spotlight",
            "description": "Feature the topic on the front page",
            "cost": 200,
            "category": "topic",
            "settings": { "duration_hours": 12 }
        }))
        .await;
    response.assert_status_ok();

    // Duplicate keys are rejected.
    harness
        .server
        .post("/v1/admin/features")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "feature_key": "topic_spotlight",
            "feature_name": "Topic Spotlight",
            "cost": 200
        }))
        .await
        .assert_status(axum::http::StatusCode::CONFLICT);

    let response = harness
        .server
        .put("/v1/admin/features/topic_spotlight")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "cost": 250, "enabled": false }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["feature"]["cost"], 250);
    assert_eq!(body["feature"]["enabled"], false);

    // A disabled feature cannot be purchased.
    harness.grant(1000).await;
    let response = harness
        .server
        .post("/v1/wallet/spend")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "feature_key": "topic_spotlight", "topic_id": 3 }))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], false);

    harness
        .server
        .put("/v1/admin/features/no_such_feature")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "cost": 10 }))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn feature_cost_must_be_positive() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/admin/features")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "feature_key": "freebie",
            "feature_name": "Freebie",
            "cost": 0
        }))
        .await
        .assert_status_bad_request();

    harness
        .server
        .put("/v1/admin/features/post_highlight")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "cost": -5 }))
        .await
        .assert_status_bad_request();
}

// ============================================================================
// Earning rule CRUD
// ============================================================================

#[tokio::test]
async fn earning_rules_list_and_update() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/admin/earning-rules")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let rules = body["earning_rules"].as_array().unwrap();
    assert_eq!(rules.len(), 4);
    let post_created = rules
        .iter()
        .find(|r| r["action_key"] == "post_created")
        .unwrap();
    assert_eq!(post_created["amount"], 2);
    assert_eq!(post_created["daily_cap"], 20);
    assert_eq!(post_created["settings"]["min_length"], 20);

    let response = harness
        .server
        .put("/v1/admin/earning-rules/post_created")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "amount": 5, "daily_cap": 10 }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["earning_rule"]["amount"], 5);
    assert_eq!(body["earning_rule"]["daily_cap"], 10);

    harness
        .server
        .put("/v1/admin/earning-rules/post_created")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "min_trust_level": 9 }))
        .await
        .assert_status_bad_request();

    harness
        .server
        .put("/v1/admin/earning-rules/no_such_rule")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "amount": 1 }))
        .await
        .assert_status_not_found();
}

// ============================================================================
// Package CRUD
// ============================================================================

#[tokio::test]
async fn package_crud_roundtrip() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/admin/packages")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "name": "Starter Pack",
            "description": "A small pile of Yaks",
            "price_usd": 4.99,
            "yaks": 500,
            "bonus_yaks": 50
        }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let id = body["package"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["package"]["total_yaks"], 550);
    assert_eq!(body["package"]["price_cents"], 499);
    assert_eq!(body["package"]["position"], 1);

    harness
        .server
        .post("/v1/admin/packages")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "name": "Herd Pack", "price_usd": 19.99, "yaks": 2500 }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/v1/admin/packages")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let packages = body["packages"].as_array().unwrap();
    assert_eq!(packages.len(), 2);
    assert_eq!(packages[0]["name"], "Starter Pack");
    assert_eq!(packages[1]["position"], 2);

    let response = harness
        .server
        .put(&format!("/v1/admin/packages/{id}"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "bonus_yaks": 100, "enabled": false }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["package"]["total_yaks"], 600);
    assert_eq!(body["package"]["enabled"], false);

    harness
        .server
        .delete(&format!("/v1/admin/packages/{id}"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .await
        .assert_status_ok();

    harness
        .server
        .delete(&format!("/v1/admin/packages/{id}"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn package_validation() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/admin/packages")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "name": "Empty", "price_usd": 1.0, "yaks": 0 }))
        .await
        .assert_status_bad_request();

    harness
        .server
        .post("/v1/admin/packages")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "name": "Negative", "price_usd": -1.0, "yaks": 10 }))
        .await
        .assert_status_bad_request();
}
