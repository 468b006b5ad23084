//! HTTP request handlers.

pub mod admin;
pub mod award;
pub mod health;
pub mod wallet;
