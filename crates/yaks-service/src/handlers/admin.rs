//! Admin surface: stats, grants, transaction audit, and catalog CRUD.
//!
//! Every handler here requires the service API key.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use yaks_core::{
    EarningRule, Feature, FeatureCategory, FeatureSettings, Package, PackageId, RuleSettings,
    Transaction, TransactionKind, UserId,
};
use yaks_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::platform;
use crate::state::AppState;

// ============================================================================
// Stats
// ============================================================================

/// One transaction row in admin views.
#[derive(Debug, Serialize)]
pub struct AdminTransactionView {
    /// Transaction id.
    pub id: String,
    /// The user whose balance changed.
    pub user_id: String,
    /// Signed amount.
    pub amount: i64,
    /// Transaction kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Machine-readable origin.
    pub source: String,
    /// Human-readable description.
    pub description: String,
    /// Free-form metadata.
    pub metadata: serde_json::Value,
    /// Timestamp.
    pub created_at: String,
}

impl From<&Transaction> for AdminTransactionView {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            user_id: tx.user_id.to_string(),
            amount: tx.amount,
            kind: tx.kind.as_str().to_string(),
            source: tx.source.clone(),
            description: tx.description.clone(),
            metadata: tx.metadata.clone(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// System-wide stats response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Number of wallets.
    pub total_wallets: u64,
    /// Number of ledger transactions.
    pub total_transactions: u64,
    /// Sum of all balances.
    pub total_yaks_in_circulation: i64,
    /// Sum of lifetime earned.
    pub total_yaks_earned: i64,
    /// Sum of lifetime spent.
    pub total_yaks_spent: i64,
    /// All feature uses ever created.
    pub total_feature_uses: u64,
    /// Currently active feature uses.
    pub active_feature_uses: u64,
    /// Most recent transactions.
    pub recent_transactions: Vec<AdminTransactionView>,
}

/// System-wide Yak statistics.
pub async fn stats(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Result<Json<StatsResponse>, ApiError> {
    let totals = state.store.wallet_totals()?;
    let use_counts = state.store.feature_use_counts(Utc::now())?;
    let recent = state.store.list_recent_transactions(25, None, None)?;

    Ok(Json(StatsResponse {
        total_wallets: totals.wallets,
        total_transactions: state.store.transaction_count()?,
        total_yaks_in_circulation: totals.balance,
        total_yaks_earned: totals.lifetime_earned,
        total_yaks_spent: totals.lifetime_spent,
        total_feature_uses: use_counts.total,
        active_feature_uses: use_counts.active,
        recent_transactions: recent.iter().map(AdminTransactionView::from).collect(),
    }))
}

// ============================================================================
// Grants
// ============================================================================

/// Grant request.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    /// User to grant Yaks to.
    pub user_id: String,
    /// Amount to grant. Must be positive.
    pub amount: i64,
    /// Audit-logged reason.
    pub reason: Option<String>,
}

/// Grant Yaks to a user with an audit-logged reason.
pub async fn grant(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<GrantRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id: UserId = body
        .user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid user id".into()))?;
    if body.amount <= 0 {
        return Err(ApiError::BadRequest("amount must be positive".into()));
    }

    let reason = body.reason.unwrap_or_else(|| "Admin grant".into());
    let transaction = Transaction::admin_grant(
        user_id,
        body.amount,
        reason.clone(),
        serde_json::json!({ "granted_by": auth.service_name }),
    );
    let wallet = state.store.credit(&transaction)?;

    // The audit trail: who granted how much, and why.
    tracing::info!(
        user_id = %user_id,
        amount = body.amount,
        reason = %reason,
        granted_by = %auth.service_name,
        new_balance = wallet.balance,
        "Yaks granted"
    );

    platform::sync_and_publish(state.platform.as_deref(), &user_id, wallet.balance).await;

    Ok(Json(serde_json::json!({
        "success": true,
        "new_balance": wallet.balance,
        "transaction_id": transaction.id.to_string(),
    })))
}

// ============================================================================
// Transactions
// ============================================================================

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Filter by user.
    pub user_id: Option<String>,
    /// Filter by kind (purchase, earn, spend, refund, admin).
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Maximum rows (default 100, capped at 100).
    pub limit: Option<usize>,
}

/// List transactions with filtering.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = query
        .user_id
        .map(|s| {
            s.parse::<UserId>()
                .map_err(|_| ApiError::BadRequest("invalid user id".into()))
        })
        .transpose()?;
    let kind = query
        .kind
        .map(|s| {
            s.parse::<TransactionKind>()
                .map_err(|()| ApiError::BadRequest(format!("invalid transaction type: {s}")))
        })
        .transpose()?;
    let limit = query.limit.unwrap_or(100).min(100);

    let transactions = state
        .store
        .list_recent_transactions(limit, user_id.as_ref(), kind)?;

    Ok(Json(serde_json::json!({
        "transactions": transactions
            .iter()
            .map(AdminTransactionView::from)
            .collect::<Vec<_>>(),
    })))
}

// ============================================================================
// Features
// ============================================================================

/// A feature with full settings, for admin views.
#[derive(Debug, Serialize)]
pub struct AdminFeatureView {
    /// Feature key.
    pub feature_key: String,
    /// Display name.
    pub feature_name: String,
    /// Description.
    pub description: String,
    /// Cost in Yaks.
    pub cost: i64,
    /// Target category.
    pub category: Option<FeatureCategory>,
    /// Whether purchasable.
    pub enabled: bool,
    /// Duration and feature-specific settings.
    pub settings: FeatureSettings,
}

impl From<&Feature> for AdminFeatureView {
    fn from(f: &Feature) -> Self {
        Self {
            feature_key: f.feature_key.clone(),
            feature_name: f.feature_name.clone(),
            description: f.description.clone(),
            cost: f.cost,
            category: f.category,
            enabled: f.enabled,
            settings: f.settings.clone(),
        }
    }
}

/// List all features, ordered by category then cost.
pub async fn list_features(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut features = state.store.list_features()?;
    features.sort_by(|a, b| {
        let a_key = (a.category.map(|c| format!("{c:?}")), a.cost);
        let b_key = (b.category.map(|c| format!("{c:?}")), b.cost);
        a_key.cmp(&b_key)
    });

    Ok(Json(serde_json::json!({
        "features": features.iter().map(AdminFeatureView::from).collect::<Vec<_>>(),
    })))
}

/// Feature creation request.
#[derive(Debug, Deserialize)]
pub struct CreateFeatureRequest {
    /// Unique machine key.
    pub feature_key: String,
    /// Display name.
    pub feature_name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Cost in Yaks. Must be positive.
    pub cost: i64,
    /// Target category.
    pub category: Option<FeatureCategory>,
    /// Whether purchasable (default true).
    pub enabled: Option<bool>,
    /// Duration and feature-specific settings.
    #[serde(default)]
    pub settings: FeatureSettings,
}

/// Create a new purchasable feature.
pub async fn create_feature(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<CreateFeatureRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.cost <= 0 {
        return Err(ApiError::BadRequest("cost must be positive".into()));
    }
    if body.feature_key.is_empty() {
        return Err(ApiError::BadRequest("feature_key is required".into()));
    }
    if state.store.get_feature(&body.feature_key)?.is_some() {
        return Err(ApiError::Conflict(format!(
            "feature already exists: {}",
            body.feature_key
        )));
    }

    let feature = Feature {
        feature_key: body.feature_key,
        feature_name: body.feature_name,
        description: body.description,
        cost: body.cost,
        category: body.category,
        enabled: body.enabled.unwrap_or(true),
        settings: body.settings,
    };
    state.store.put_feature(&feature)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "feature": AdminFeatureView::from(&feature),
    })))
}

/// Feature update request. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateFeatureRequest {
    /// New display name.
    pub feature_name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New cost. Must be positive.
    pub cost: Option<i64>,
    /// New enabled flag.
    pub enabled: Option<bool>,
    /// New settings (replaces all settings).
    pub settings: Option<FeatureSettings>,
}

/// Update an existing feature.
pub async fn update_feature(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(feature_key): Path<String>,
    Json(body): Json<UpdateFeatureRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut feature = state
        .store
        .get_feature(&feature_key)?
        .ok_or_else(|| ApiError::NotFound(format!("feature not found: {feature_key}")))?;

    if let Some(name) = body.feature_name {
        feature.feature_name = name;
    }
    if let Some(description) = body.description {
        feature.description = description;
    }
    if let Some(cost) = body.cost {
        if cost <= 0 {
            return Err(ApiError::BadRequest("cost must be positive".into()));
        }
        feature.cost = cost;
    }
    if let Some(enabled) = body.enabled {
        feature.enabled = enabled;
    }
    if let Some(settings) = body.settings {
        feature.settings = settings;
    }

    state.store.put_feature(&feature)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "feature": AdminFeatureView::from(&feature),
    })))
}

// ============================================================================
// Earning rules
// ============================================================================

/// An earning rule, for admin views.
#[derive(Debug, Serialize)]
pub struct AdminRuleView {
    /// Stable action key.
    pub action_key: String,
    /// Display name.
    pub action_name: String,
    /// Description.
    pub description: String,
    /// Yaks per qualifying action.
    pub amount: i64,
    /// Grants per user per day (0 = unlimited).
    pub daily_cap: u32,
    /// Minimum trust level.
    pub min_trust_level: u8,
    /// Whether active.
    pub enabled: bool,
    /// Threshold settings.
    pub settings: RuleSettings,
}

impl From<&EarningRule> for AdminRuleView {
    fn from(r: &EarningRule) -> Self {
        Self {
            action_key: r.action_key.clone(),
            action_name: r.action_name.clone(),
            description: r.description.clone(),
            amount: r.amount,
            daily_cap: r.daily_cap,
            min_trust_level: r.min_trust_level,
            enabled: r.enabled,
            settings: r.settings.clone(),
        }
    }
}

/// List all earning rules.
pub async fn list_earning_rules(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut rules = state.store.list_earning_rules()?;
    rules.sort_by(|a, b| a.action_key.cmp(&b.action_key));

    Ok(Json(serde_json::json!({
        "earning_rules": rules.iter().map(AdminRuleView::from).collect::<Vec<_>>(),
    })))
}

/// Earning rule update request. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateRuleRequest {
    /// New amount.
    pub amount: Option<i64>,
    /// New daily cap (0 = unlimited).
    pub daily_cap: Option<u32>,
    /// New minimum trust level (0-4).
    pub min_trust_level: Option<u8>,
    /// New enabled flag.
    pub enabled: Option<bool>,
    /// New threshold settings (replaces all settings).
    pub settings: Option<RuleSettings>,
}

/// Update an existing earning rule.
pub async fn update_earning_rule(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(action_key): Path<String>,
    Json(body): Json<UpdateRuleRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut rule = state
        .store
        .get_earning_rule(&action_key)?
        .ok_or_else(|| ApiError::NotFound(format!("earning rule not found: {action_key}")))?;

    if let Some(amount) = body.amount {
        if amount < 0 {
            return Err(ApiError::BadRequest("amount must not be negative".into()));
        }
        rule.amount = amount;
    }
    if let Some(daily_cap) = body.daily_cap {
        rule.daily_cap = daily_cap;
    }
    if let Some(min_trust_level) = body.min_trust_level {
        if min_trust_level > 4 {
            return Err(ApiError::BadRequest("min_trust_level must be 0-4".into()));
        }
        rule.min_trust_level = min_trust_level;
    }
    if let Some(enabled) = body.enabled {
        rule.enabled = enabled;
    }
    if let Some(settings) = body.settings {
        rule.settings = settings;
    }

    state.store.put_earning_rule(&rule)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "earning_rule": AdminRuleView::from(&rule),
    })))
}

// ============================================================================
// Packages
// ============================================================================

/// A package, for admin and shop views.
#[derive(Debug, Serialize)]
pub struct PackageView {
    /// Package id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Price in dollars.
    pub price_usd: f64,
    /// Price in cents.
    pub price_cents: i64,
    /// Base Yaks.
    pub yaks: i64,
    /// Bonus Yaks.
    pub bonus_yaks: i64,
    /// Base plus bonus.
    pub total_yaks: i64,
    /// Whether offered.
    pub enabled: bool,
    /// Display ordering.
    pub position: u32,
}

impl From<&Package> for PackageView {
    fn from(p: &Package) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            description: p.description.clone(),
            price_usd: p.price_usd(),
            price_cents: p.price_cents,
            yaks: p.yaks,
            bonus_yaks: p.bonus_yaks,
            total_yaks: p.total_yaks(),
            enabled: p.enabled,
            position: p.position,
        }
    }
}

/// List all packages, ordered by position.
pub async fn list_packages(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Result<Json<serde_json::Value>, ApiError> {
    let packages = state.store.list_packages()?;
    Ok(Json(serde_json::json!({
        "packages": packages.iter().map(PackageView::from).collect::<Vec<_>>(),
    })))
}

/// Package creation request.
#[derive(Debug, Deserialize)]
pub struct CreatePackageRequest {
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Price in dollars.
    pub price_usd: f64,
    /// Base Yaks. Must be positive.
    pub yaks: i64,
    /// Bonus Yaks (default 0).
    pub bonus_yaks: Option<i64>,
    /// Whether offered (default true).
    pub enabled: Option<bool>,
}

/// Create a new package. Position is appended after the current last.
pub async fn create_package(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<CreatePackageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.yaks <= 0 {
        return Err(ApiError::BadRequest("yaks must be positive".into()));
    }
    if body.price_usd < 0.0 {
        return Err(ApiError::BadRequest("price must not be negative".into()));
    }
    if body.bonus_yaks.is_some_and(|b| b < 0) {
        return Err(ApiError::BadRequest("bonus_yaks must not be negative".into()));
    }

    let next_position = state
        .store
        .list_packages()?
        .iter()
        .map(|p| p.position)
        .max()
        .map_or(1, |max| max + 1);

    #[allow(clippy::cast_possible_truncation)]
    let package = Package {
        id: PackageId::generate(),
        name: body.name,
        description: body.description,
        price_cents: (body.price_usd * 100.0).round() as i64,
        yaks: body.yaks,
        bonus_yaks: body.bonus_yaks.unwrap_or(0),
        enabled: body.enabled.unwrap_or(true),
        position: next_position,
        created_at: Utc::now(),
    };
    state.store.put_package(&package)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "package": PackageView::from(&package),
    })))
}

/// Package update request. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdatePackageRequest {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New price in dollars.
    pub price_usd: Option<f64>,
    /// New base Yaks.
    pub yaks: Option<i64>,
    /// New bonus Yaks.
    pub bonus_yaks: Option<i64>,
    /// New enabled flag.
    pub enabled: Option<bool>,
    /// New display position.
    pub position: Option<u32>,
}

/// Update an existing package.
pub async fn update_package(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(id): Path<String>,
    Json(body): Json<UpdatePackageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id: PackageId = id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid package id".into()))?;
    let mut package = state
        .store
        .get_package(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("package not found: {id}")))?;

    if let Some(name) = body.name {
        package.name = name;
    }
    if let Some(description) = body.description {
        package.description = description;
    }
    if let Some(price_usd) = body.price_usd {
        if price_usd < 0.0 {
            return Err(ApiError::BadRequest("price must not be negative".into()));
        }
        #[allow(clippy::cast_possible_truncation)]
        {
            package.price_cents = (price_usd * 100.0).round() as i64;
        }
    }
    if let Some(yaks) = body.yaks {
        if yaks <= 0 {
            return Err(ApiError::BadRequest("yaks must be positive".into()));
        }
        package.yaks = yaks;
    }
    if let Some(bonus_yaks) = body.bonus_yaks {
        if bonus_yaks < 0 {
            return Err(ApiError::BadRequest("bonus_yaks must not be negative".into()));
        }
        package.bonus_yaks = bonus_yaks;
    }
    if let Some(enabled) = body.enabled {
        package.enabled = enabled;
    }
    if let Some(position) = body.position {
        package.position = position;
    }

    state.store.put_package(&package)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "package": PackageView::from(&package),
    })))
}

/// Delete a package.
pub async fn delete_package(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id: PackageId = id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid package id".into()))?;
    state.store.delete_package(&id)?;

    Ok(Json(serde_json::json!({ "success": true })))
}
