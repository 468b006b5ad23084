//! HTTP client for the forum's internal platform API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use yaks_core::{FeatureTarget, PostId, TopicId, UserId};

use super::{FeatureBag, Platform, PlatformPost, PlatformTopic, PlatformUser};

/// Error type for platform operations.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Platform API returned an error.
    #[error("platform API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error body returned by the platform API.
#[derive(Debug, Deserialize)]
struct PlatformErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Client for the forum's internal platform API.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PlatformClient {
    /// Create a new platform client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// URL path segment for an attachment target.
    fn target_path(target: &FeatureTarget) -> String {
        match target {
            FeatureTarget::Post(id) => format!("posts/{id}"),
            FeatureTarget::Topic(id) => format!("topics/{id}"),
            FeatureTarget::Profile(id) => format!("users/{id}"),
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PlatformError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let message = response
                .json::<PlatformErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| status.to_string());
            Err(PlatformError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn handle_empty_response(response: reqwest::Response) -> Result<(), PlatformError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response
                .json::<PlatformErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| status.to_string());
            Err(PlatformError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn get_optional<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
    ) -> Result<Option<T>, PlatformError> {
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Self::handle_response(response).await.map(Some)
    }
}

#[async_trait]
impl Platform for PlatformClient {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<PlatformUser>, PlatformError> {
        self.get_optional(format!("{}/internal/users/{user_id}", self.base_url))
            .await
    }

    async fn get_post(&self, post_id: PostId) -> Result<Option<PlatformPost>, PlatformError> {
        self.get_optional(format!("{}/internal/posts/{post_id}", self.base_url))
            .await
    }

    async fn get_topic(&self, topic_id: TopicId) -> Result<Option<PlatformTopic>, PlatformError> {
        self.get_optional(format!("{}/internal/topics/{topic_id}", self.base_url))
            .await
    }

    async fn get_feature_bag(&self, target: &FeatureTarget) -> Result<FeatureBag, PlatformError> {
        let url = format!(
            "{}/internal/{}/yak-features",
            self.base_url,
            Self::target_path(target)
        );

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        // A target with no bag yet reads as empty.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(FeatureBag::new());
        }

        Self::handle_response(response).await
    }

    async fn put_feature_bag(
        &self,
        target: &FeatureTarget,
        bag: &FeatureBag,
    ) -> Result<(), PlatformError> {
        let url = format!(
            "{}/internal/{}/yak-features",
            self.base_url,
            Self::target_path(target)
        );

        let response = self
            .client
            .put(&url)
            .header("x-api-key", &self.api_key)
            .json(bag)
            .send()
            .await?;

        Self::handle_empty_response(response).await
    }

    async fn set_topic_pinned(
        &self,
        topic_id: TopicId,
        pinned: bool,
        until: Option<DateTime<Utc>>,
        global: bool,
    ) -> Result<(), PlatformError> {
        let url = format!("{}/internal/topics/{topic_id}/pinned", self.base_url);

        let response = self
            .client
            .put(&url)
            .header("x-api-key", &self.api_key)
            .json(&serde_json::json!({
                "pinned": pinned,
                "until": until.map(|t| t.to_rfc3339()),
                "global": global,
            }))
            .send()
            .await?;

        Self::handle_empty_response(response).await
    }

    async fn sync_balance(&self, user_id: &UserId, balance: i64) -> Result<(), PlatformError> {
        let url = format!("{}/internal/users/{user_id}/yak-balance", self.base_url);

        let response = self
            .client
            .put(&url)
            .header("x-api-key", &self.api_key)
            .json(&serde_json::json!({ "balance": balance }))
            .send()
            .await?;

        Self::handle_empty_response(response).await
    }

    async fn publish_balance(&self, user_id: &UserId, balance: i64) -> Result<(), PlatformError> {
        let url = format!(
            "{}/internal/users/{user_id}/notifications/yak-balance",
            self.base_url
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&serde_json::json!({ "balance": balance }))
            .send()
            .await?;

        Self::handle_empty_response(response).await
    }
}
