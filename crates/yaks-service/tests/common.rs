//! Common test utilities for yaks-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use yaks_core::{FeatureTarget, PostId, TopicId, UserId};
use yaks_service::platform::{
    FeatureBag, Platform, PlatformError, PlatformPost, PlatformTopic, PlatformUser,
};
use yaks_service::{create_router, seed, AppState, ServiceConfig};
use yaks_store::RocksStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// The service API key for forum-to-service requests.
    pub service_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh, seeded database and no
    /// platform configured.
    pub fn new() -> Self {
        Self::build(None, true)
    }

    /// Create a harness whose platform client points at a mock server.
    pub fn with_platform(platform_base_url: &str) -> Self {
        Self::build(Some(platform_base_url.to_string()), true)
    }

    /// Create a harness with the Yaks system disabled.
    pub fn disabled() -> Self {
        Self::build(None, false)
    }

    fn build(platform_base_url: Option<String>, yaks_enabled: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");
        seed::seed_defaults(&store).expect("Failed to seed defaults");

        let service_api_key = "test-service-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            yaks_enabled,
            dollar_to_yak_rate: 100,
            service_api_key: Some(service_api_key.clone()),
            platform_api_key: platform_base_url.as_ref().map(|_| "test-platform-key".into()),
            platform_base_url,
            sweep_interval_seconds: 24 * 60 * 60,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        };

        let state = Arc::new(AppState::new(Arc::new(store), config));
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            _temp_dir: temp_dir,
            test_user_id,
            service_api_key,
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer user-token:{}", self.test_user_id)
    }

    /// Get an auth header for an arbitrary user.
    pub fn auth_header_for(user_id: &UserId) -> String {
        format!("Bearer user-token:{user_id}")
    }

    /// Grant Yaks to the test user through the admin surface.
    pub async fn grant(&self, amount: i64) {
        self.grant_to(&self.test_user_id, amount).await;
    }

    /// Grant Yaks to an arbitrary user through the admin surface.
    pub async fn grant_to(&self, user_id: &UserId, amount: i64) {
        self.server
            .post("/v1/admin/grant")
            .add_header("x-api-key", self.service_api_key.clone())
            .json(&serde_json::json!({
                "user_id": user_id.to_string(),
                "amount": amount,
                "reason": "Test grant"
            }))
            .await
            .assert_status_ok();
    }

    /// Fetch the test user's current balance through the wallet summary.
    pub async fn balance(&self) -> i64 {
        self.balance_of(&self.test_user_id).await
    }

    /// Fetch an arbitrary user's current balance.
    pub async fn balance_of(&self, user_id: &UserId) -> i64 {
        let response = self
            .server
            .get("/v1/wallet")
            .add_header("authorization", Self::auth_header_for(user_id))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["balance"].as_i64().expect("balance in summary")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory platform for component-level tests of the effect and expiry
/// machinery. Feature bags and topic pin state live in shared maps;
/// individual targets can be made to fail to exercise error isolation.
#[derive(Default)]
pub struct MockPlatform {
    /// Feature bags keyed by target (e.g. "post:7").
    pub bags: Mutex<HashMap<String, FeatureBag>>,
    /// Topic pinned state keyed by topic id.
    pub pinned: Mutex<HashMap<i64, bool>>,
    /// Targets whose bag writes fail with a 500.
    pub fail_targets: Mutex<HashSet<String>>,
    /// Trust level reported for every user.
    pub trust_level: Mutex<u8>,
}

impl MockPlatform {
    pub fn new() -> Self {
        let platform = Self::default();
        *platform.trust_level.lock().unwrap() = 4;
        platform
    }

    /// Make bag writes for one target fail until cleared.
    pub fn fail_target(&self, target: &FeatureTarget) {
        self.fail_targets.lock().unwrap().insert(target.to_string());
    }

    /// Clear all injected failures.
    pub fn clear_failures(&self) {
        self.fail_targets.lock().unwrap().clear();
    }

    /// Whether a target's bag currently contains the named marker.
    pub fn has_marker(&self, target: &FeatureTarget, marker: &str) -> bool {
        self.bags
            .lock()
            .unwrap()
            .get(&target.to_string())
            .is_some_and(|bag| bag.contains_key(marker))
    }

    /// Whether a topic is currently pinned.
    pub fn is_pinned(&self, topic_id: TopicId) -> bool {
        self.pinned
            .lock()
            .unwrap()
            .get(&topic_id.get())
            .copied()
            .unwrap_or(false)
    }

    fn check_failure(&self, target: &FeatureTarget) -> Result<(), PlatformError> {
        if self.fail_targets.lock().unwrap().contains(&target.to_string()) {
            return Err(PlatformError::Api {
                status: 500,
                message: "injected failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<PlatformUser>, PlatformError> {
        Ok(Some(PlatformUser {
            id: *user_id,
            username: "test-user".into(),
            trust_level: *self.trust_level.lock().unwrap(),
        }))
    }

    async fn get_post(&self, post_id: PostId) -> Result<Option<PlatformPost>, PlatformError> {
        Ok(Some(PlatformPost {
            id: post_id,
            topic_id: TopicId(post_id.get() * 10),
            raw: "This is a test post long enough to qualify for earning rules.".into(),
        }))
    }

    async fn get_topic(&self, topic_id: TopicId) -> Result<Option<PlatformTopic>, PlatformError> {
        Ok(Some(PlatformTopic {
            id: topic_id,
            title: "Test topic".into(),
            first_post_raw: Some(
                "This is a test topic body long enough to qualify for earning rules.".into(),
            ),
        }))
    }

    async fn get_feature_bag(&self, target: &FeatureTarget) -> Result<FeatureBag, PlatformError> {
        Ok(self
            .bags
            .lock()
            .unwrap()
            .get(&target.to_string())
            .cloned()
            .unwrap_or_default())
    }

    async fn put_feature_bag(
        &self,
        target: &FeatureTarget,
        bag: &FeatureBag,
    ) -> Result<(), PlatformError> {
        self.check_failure(target)?;
        self.bags
            .lock()
            .unwrap()
            .insert(target.to_string(), bag.clone());
        Ok(())
    }

    async fn set_topic_pinned(
        &self,
        topic_id: TopicId,
        pinned: bool,
        _until: Option<DateTime<Utc>>,
        _global: bool,
    ) -> Result<(), PlatformError> {
        self.pinned.lock().unwrap().insert(topic_id.get(), pinned);
        Ok(())
    }

    async fn sync_balance(&self, _user_id: &UserId, _balance: i64) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn publish_balance(&self, _user_id: &UserId, _balance: i64) -> Result<(), PlatformError> {
        Ok(())
    }
}
