//! Wallet summary, spending, and the stubbed purchase flow.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use yaks_core::{Feature, PostId, TopicId, Transaction, TransactionKind};
use yaks_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::platform;
use crate::state::AppState;

/// One transaction in the wallet summary.
#[derive(Debug, Serialize)]
pub struct TransactionView {
    /// Transaction id.
    pub id: String,
    /// Signed amount (positive = credit, negative = debit).
    pub amount: i64,
    /// Transaction kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Machine-readable origin.
    pub source: String,
    /// Human-readable description.
    pub description: String,
    /// Timestamp.
    pub created_at: String,
}

impl From<&Transaction> for TransactionView {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            amount: tx.amount,
            kind: tx.kind.as_str().to_string(),
            source: tx.source.clone(),
            description: tx.description.clone(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// One purchasable feature in the wallet summary.
#[derive(Debug, Serialize)]
pub struct FeatureView {
    /// Feature key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Cost in Yaks.
    pub cost: i64,
    /// Target category.
    pub category: Option<String>,
    /// Whether the user's balance covers the cost.
    pub affordable: bool,
}

impl FeatureView {
    fn new(feature: &Feature, balance: i64) -> Self {
        Self {
            key: feature.feature_key.clone(),
            name: feature.feature_name.clone(),
            description: feature.description.clone(),
            cost: feature.cost,
            category: feature.category.map(|c| format!("{c:?}").to_lowercase()),
            affordable: feature.affordable_by(balance),
        }
    }
}

/// Wallet summary response.
#[derive(Debug, Serialize)]
pub struct WalletSummaryResponse {
    /// Current balance.
    pub balance: i64,
    /// Lifetime Yaks earned.
    pub lifetime_earned: i64,
    /// Lifetime Yaks spent.
    pub lifetime_spent: i64,
    /// Recent transactions, newest first.
    pub transactions: Vec<TransactionView>,
    /// Enabled features, cheapest first, with affordability flags.
    pub features: Vec<FeatureView>,
}

/// Get the user's wallet, recent history, and the feature shop.
pub async fn get_wallet_summary(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<WalletSummaryResponse>, ApiError> {
    let wallet = state.store.get_or_create_wallet(&auth.user_id)?;
    let transactions = state.store.list_transactions_by_user(&auth.user_id, 50, 0)?;

    let mut features: Vec<Feature> = state
        .store
        .list_features()?
        .into_iter()
        .filter(|f| f.enabled)
        .collect();
    features.sort_by_key(|f| f.cost);

    Ok(Json(WalletSummaryResponse {
        balance: wallet.balance,
        lifetime_earned: wallet.lifetime_earned,
        lifetime_spent: wallet.lifetime_spent,
        transactions: transactions.iter().map(TransactionView::from).collect(),
        features: features
            .iter()
            .map(|f| FeatureView::new(f, wallet.balance))
            .collect(),
    }))
}

/// Spend request.
#[derive(Debug, Deserialize)]
pub struct SpendRequest {
    /// The feature to purchase.
    pub feature_key: String,
    /// Post to apply it to (post-category features).
    pub post_id: Option<i64>,
    /// Topic to apply it to (topic-category features; derived from the post
    /// when omitted).
    pub topic_id: Option<i64>,
    /// Feature configuration (color, flair text, ...).
    #[serde(default)]
    pub feature_data: serde_json::Value,
}

/// Spend response: a structured result, never an HTTP error for expected
/// purchase failures.
#[derive(Debug, Serialize)]
pub struct SpendResponse {
    /// Whether the purchase succeeded.
    pub success: bool,
    /// Balance after the debit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<i64>,
    /// The created feature use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_use_id: Option<String>,
    /// When the effect lapses (absent = permanent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    /// Human-readable error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Spend Yaks to purchase and apply a feature.
pub async fn spend(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<SpendRequest>,
) -> (StatusCode, Json<SpendResponse>) {
    let result = state
        .lifecycle
        .apply_feature(
            auth.user_id,
            &body.feature_key,
            body.post_id.map(PostId),
            body.topic_id.map(TopicId),
            body.feature_data,
        )
        .await;

    match result {
        Ok(outcome) => (
            StatusCode::OK,
            Json(SpendResponse {
                success: true,
                new_balance: Some(outcome.new_balance),
                feature_use_id: Some(outcome.feature_use.id.to_string()),
                expires_at: outcome.feature_use.expires_at.map(|t| t.to_rfc3339()),
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(SpendResponse {
                success: false,
                new_balance: None,
                feature_use_id: None,
                expires_at: None,
                error: Some(e.to_string()),
            }),
        ),
    }
}

/// Purchase request (stubbed payment flow).
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    /// Amount in dollars.
    pub amount_usd: f64,
}

/// Purchase response.
#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    /// Whether the purchase succeeded.
    pub success: bool,
    /// Balance after the credit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<i64>,
    /// Yaks added.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaks_added: Option<i64>,
    /// Human-readable error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Buy Yaks for dollars. Payment processing is a stub: the credit is
/// applied immediately with a `purchase` transaction.
pub async fn purchase(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    if !state.config.yaks_enabled {
        return Ok(Json(PurchaseResponse {
            success: false,
            new_balance: None,
            yaks_added: None,
            error: Some("Yaks are disabled".into()),
        }));
    }

    if !(0.0..=10_000.0).contains(&body.amount_usd) || body.amount_usd <= 0.0 {
        return Err(ApiError::BadRequest("invalid purchase amount".into()));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let yaks_to_add = (body.amount_usd * state.config.dollar_to_yak_rate as f64).round() as i64;
    if yaks_to_add <= 0 {
        return Err(ApiError::BadRequest("purchase amount too small".into()));
    }

    let transaction = Transaction::purchase(
        auth.user_id,
        yaks_to_add,
        "stripe_purchase_stub",
        format!("Purchased {yaks_to_add} Yaks for ${}", body.amount_usd),
        serde_json::json!({
            "amount_usd": body.amount_usd,
            "payment_method": "stub",
        }),
    );
    debug_assert_eq!(transaction.kind, TransactionKind::Purchase);

    let wallet = state.store.credit(&transaction)?;

    tracing::info!(
        user_id = %auth.user_id,
        yaks_added = yaks_to_add,
        amount_usd = body.amount_usd,
        balance = wallet.balance,
        "Yaks purchased (stub)"
    );

    platform::sync_and_publish(state.platform.as_deref(), &auth.user_id, wallet.balance).await;

    Ok(Json(PurchaseResponse {
        success: true,
        new_balance: Some(wallet.balance),
        yaks_added: Some(yaks_to_add),
        error: None,
    }))
}
