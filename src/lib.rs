//! DDoS visit analytics.
//!
//! Aggregates the visits of a security platform report into dashboard
//! statistics, filters them by security rule and country, and exports them.

pub mod config;
pub mod core;
pub mod models;
pub mod utils;
