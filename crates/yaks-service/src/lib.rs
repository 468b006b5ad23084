//! HTTP API service for the Yaks virtual-currency ledger.
//!
//! The service wires the storage layer to the forum: users earn Yaks
//! through rate-limited actions and spend them on time-bounded features
//! applied to posts, topics, or their profile. The earning engine, the
//! feature purchase and lifecycle manager, and the expiry machinery live
//! here; atomic balance mutation lives in `yaks-store`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod auth;
pub mod config;
pub mod earning;
pub mod effects;
pub mod error;
pub mod expiry;
pub mod features;
pub mod handlers;
pub mod platform;
pub mod routes;
pub mod seed;
pub mod state;

pub use config::ServiceConfig;
pub use earning::{CanEarn, EarningEngine};
pub use features::{FeatureLifecycle, SpendSuccess};
pub use routes::create_router;
pub use state::AppState;
