//! Core functionality for the DDoS visit analytics dashboard.
//!
//! This module contains the report pipeline: record normalization, the
//! aggregators, the rule engine, site-level statistics, the dashboard
//! orchestrator and the exports.

pub mod visit;
pub mod analytics;
pub mod threats;
pub mod timeline;
pub mod rule_engine;
pub mod stats;
pub mod dashboard;
pub mod export;

pub use visit::{RawReport, RuleInfo, RulesMap, Visit, VisitError};
pub use analytics::AnalyticsError;
pub use rule_engine::{extract_rules, filter_visits_by_country, filter_visits_by_rule, visit_has_rule, RuleStat, VisitFilter};
pub use dashboard::{Dashboard, DashboardError, DashboardStats, ReportQuery, RequestTicket, StatsPublisher};
pub use export::ExportError;
