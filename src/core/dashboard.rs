//! Stats re-aggregation orchestrator.
//!
//! A `Dashboard` owns one report session: the full visit collection, its
//! rules map, the report window and the active rule/country selection.
//! Every state change rebuilds the working set from the full collection and
//! republishes a fresh `DashboardStats` snapshot; nothing is recomputed
//! incrementally.
//!
//! Report fetches happen outside the dashboard and may complete out of
//! order. Each fetch is tagged with a `RequestTicket`, and only the most
//! recently issued ticket may install its report.

use std::collections::BTreeMap;

use chrono::FixedOffset;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::analytics::{
    client_stats, country_options, country_stats, endpoint_stats, ip_stats, request_results,
    visit_summary, ClientStats, CountryStat, EndpointStat, IpStat, RequestResults, VisitSummary,
};
use crate::core::rule_engine::{extract_rules, selection, RuleStat, VisitFilter};
use crate::core::stats::{api_stats, ApiStats};
use crate::core::threats::{threat_stats, ThreatStats};
use crate::core::timeline::{timeline, Timeline};
use crate::core::visit::{RawReport, RulesMap, Visit};
use crate::models::DashboardConfig;

/// Errors raised by dashboard state transitions
#[derive(Error, Debug, PartialEq)]
pub enum DashboardError {
    #[error("Discarding stale response for request {ticket} (latest is {latest})")]
    StaleResponse { ticket: u64, latest: u64 },
    #[error("No report loaded")]
    NoReport,
}

/// Receives every freshly computed stats snapshot
#[cfg_attr(test, mockall::automock)]
pub trait StatsPublisher {
    fn publish(&mut self, stats: &DashboardStats);
}

/// Report window requested from the fetch collaborator, in ms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl ReportQuery {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    /// Smallest window holding every visit start time of `report`
    pub fn covering(report: &RawReport) -> Option<Self> {
        let (start_ms, end_ms) = report.start_time_range()?;
        Some(Self { start_ms, end_ms })
    }
}

/// Handle of an in-flight report fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    sequence: u64,
    query: ReportQuery,
}

impl RequestTicket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn query(&self) -> ReportQuery {
        self.query
    }
}

/// Everything the presentation layer renders for one working set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub filter: VisitFilter,
    pub working_visits: u64,
    pub total_visits: u64,
    pub summary: VisitSummary,
    pub countries: BTreeMap<String, CountryStat>,
    pub clients: ClientStats,
    pub endpoints: Vec<EndpointStat>,
    pub ips: Vec<IpStat>,
    pub threats: ThreatStats,
    pub timeline: Timeline,
    pub request_results: RequestResults,
    /// Countries of the full collection
    pub country_options: Vec<String>,
    /// Rule catalogue of the full collection
    pub rules: Vec<RuleStat>,
    pub api_stats: ApiStats,
}

/// Loaded report and the data derived from it once
struct Session {
    query: ReportQuery,
    report: RawReport,
    visits: Vec<Visit>,
    rules: Vec<RuleStat>,
    country_options: Vec<String>,
    api_stats: ApiStats,
}

pub struct Dashboard<P: StatsPublisher> {
    publisher: P,
    config: DashboardConfig,
    time_zone: FixedOffset,
    session: Option<Session>,
    filter: VisitFilter,
    last_issued: u64,
}

impl<P: StatsPublisher> Dashboard<P> {
    pub fn new(publisher: P, config: DashboardConfig) -> Self {
        let time_zone = config.time_zone();
        Self {
            publisher,
            config,
            time_zone,
            session: None,
            filter: VisitFilter::default(),
            last_issued: 0,
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn time_zone(&self) -> FixedOffset {
        self.time_zone
    }

    pub fn filter(&self) -> &VisitFilter {
        &self.filter
    }

    pub fn report(&self) -> Option<&RawReport> {
        self.session.as_ref().map(|session| &session.report)
    }

    pub fn rules_map(&self) -> Option<&RulesMap> {
        self.session.as_ref().map(|session| &session.report.rules_map)
    }

    pub fn visits(&self) -> &[Visit] {
        self.session
            .as_ref()
            .map(|session| session.visits.as_slice())
            .unwrap_or(&[])
    }

    /// Register a new report fetch; any earlier ticket becomes stale
    pub fn begin_request(&mut self, query: ReportQuery) -> RequestTicket {
        self.last_issued += 1;
        debug!(
            "Report request {} for {}..{}",
            self.last_issued, query.start_ms, query.end_ms
        );
        RequestTicket {
            sequence: self.last_issued,
            query,
        }
    }

    /// Install the report fetched for `ticket` and publish its stats.
    ///
    /// A new report resets the selection to all rules and all countries.
    pub fn complete_request(
        &mut self,
        ticket: RequestTicket,
        report: RawReport,
    ) -> Result<DashboardStats, DashboardError> {
        if ticket.sequence != self.last_issued {
            warn!(
                "Discarding response of request {}, request {} is newer",
                ticket.sequence, self.last_issued
            );
            return Err(DashboardError::StaleResponse {
                ticket: ticket.sequence,
                latest: self.last_issued,
            });
        }

        let visits = report.normalized_visits();
        let rules = extract_rules(&visits, &report.rules_map);
        let site_stats = report.stats.as_ref().map(api_stats).unwrap_or_default();
        info!(
            "Loaded report with {} visits and {} rules",
            visits.len(),
            rules.len()
        );

        self.session = Some(Session {
            query: ticket.query,
            country_options: country_options(&visits),
            report,
            visits,
            rules,
            api_stats: site_stats,
        });
        self.filter = VisitFilter::default();
        self.refresh()
    }

    /// Select a rule by display name; `"all"` clears the rule filter
    pub fn select_rule(&mut self, rule: &str) -> Result<DashboardStats, DashboardError> {
        self.ensure_loaded()?;
        self.filter.rule = selection(rule);
        info!("Rule filter: {}", rule);
        self.refresh()
    }

    /// Select a country by name; `"all"` clears the country filter
    pub fn select_country(&mut self, country: &str) -> Result<DashboardStats, DashboardError> {
        self.ensure_loaded()?;
        self.filter.country = selection(country);
        info!("Country filter: {}", country);
        self.refresh()
    }

    pub fn clear_filters(&mut self) -> Result<DashboardStats, DashboardError> {
        self.ensure_loaded()?;
        self.filter = VisitFilter::default();
        info!("Filters cleared");
        self.refresh()
    }

    /// Visits passing the active selection
    pub fn working_set(&self) -> Vec<Visit> {
        match &self.session {
            Some(session) => self.filter.apply(&session.visits, &session.report.rules_map),
            None => Vec::new(),
        }
    }

    /// Compute the stats of the current working set without publishing them
    pub fn stats(&self) -> Result<DashboardStats, DashboardError> {
        let session = self.session.as_ref().ok_or(DashboardError::NoReport)?;
        let working = self.working_set();
        let limit = self.config.top_limit;

        Ok(DashboardStats {
            filter: self.filter.clone(),
            working_visits: working.len() as u64,
            total_visits: session.visits.len() as u64,
            summary: visit_summary(&working),
            countries: country_stats(&working),
            clients: client_stats(&working),
            endpoints: endpoint_stats(&working, limit),
            ips: ip_stats(&working, limit),
            threats: threat_stats(&working),
            timeline: timeline(
                &working,
                session.query.start_ms,
                session.query.end_ms,
                &self.time_zone,
                self.config.bucket_minutes,
            ),
            request_results: request_results(&working),
            country_options: session.country_options.clone(),
            rules: session.rules.clone(),
            api_stats: session.api_stats.clone(),
        })
    }

    fn refresh(&mut self) -> Result<DashboardStats, DashboardError> {
        let stats = self.stats()?;
        debug!(
            "Publishing stats for {} of {} visits",
            stats.working_visits, stats.total_visits
        );
        self.publisher.publish(&stats);
        Ok(stats)
    }

    fn ensure_loaded(&self) -> Result<(), DashboardError> {
        if self.session.is_none() {
            return Err(DashboardError::NoReport);
        }
        Ok(())
    }
}
