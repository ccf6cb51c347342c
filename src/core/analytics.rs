//! Visit analytics for the DDoS visit dashboard.
//!
//! Every aggregator here is a pure function over a slice of normalized
//! visits. Nothing is updated incrementally: each call builds its working
//! sets from scratch and reduces them to counts and sorted lists before
//! returning.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::visit::Visit;
use crate::utils::percentage;

/// Default number of endpoints and IPs kept in the rankings
pub const DEFAULT_TOP_LIMIT: usize = 15;

/// Errors that can occur inside an aggregation pass
#[derive(Error, Debug, PartialEq)]
pub enum AnalyticsError {
    #[error("Counter overflow while aggregating {0}")]
    CounterOverflow(String),
}

/// Severity of a country, derived from its unique IP count
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
    Minimal,
}

impl Severity {
    pub fn from_ip_count(ip_count: usize) -> Self {
        match ip_count {
            n if n >= 50 => Severity::High,
            n if n >= 20 => Severity::Medium,
            n if n >= 5 => Severity::Low,
            _ => Severity::Minimal,
        }
    }
}

/// Per-country statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryStat {
    pub name: String,
    pub visits: u64,
    pub ip_count: usize,
    /// DDoS threat occurrences
    pub threats: u64,
    pub severity: Severity,
}

/// Boolean capability counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BooleanCounts {
    #[serde(rename = "true")]
    pub supported: u64,
    #[serde(rename = "false")]
    pub unsupported: u64,
}

impl BooleanCounts {
    fn record(&mut self, value: bool) {
        if value {
            self.supported += 1;
        } else {
            self.unsupported += 1;
        }
    }
}

/// Client frequency tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStats {
    pub client_type: BTreeMap<String, u64>,
    pub client_application: BTreeMap<String, u64>,
    pub supports_cookies: BooleanCounts,
    pub supports_java_script: BooleanCounts,
}

/// Attacked endpoint statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStat {
    pub url: String,
    pub attacks: u64,
    pub total_hits: u64,
    pub total_threats: u64,
    pub unique_ips_count: usize,
    pub countries_count: usize,
    pub threat_types_count: usize,
    pub countries_list: Vec<String>,
    pub threat_types_list: Vec<String>,
}

/// Attacking IP statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpStat {
    pub ip: String,
    pub hits: u64,
    pub visits: u64,
    pub total_threats: u64,
    pub countries_count: usize,
    pub countries_list: Vec<String>,
    pub threat_types_count: usize,
    pub threat_types_list: Vec<String>,
    pub endpoints_count: usize,
    pub endpoints_list: Vec<String>,
    pub user_agents_count: usize,
}

/// Count of one request result label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestResultStat {
    pub label: String,
    pub count: u64,
    pub percentage: f64,
}

/// Request result distribution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResults {
    pub results: Vec<RequestResultStat>,
    pub total_requests: u64,
}

impl RequestResults {
    pub fn count(&self, label: &str) -> u64 {
        self.results
            .iter()
            .find(|stat| stat.label == label)
            .map(|stat| stat.count)
            .unwrap_or(0)
    }
}

/// Headline numbers of a visit set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitSummary {
    pub total_visits: u64,
    pub attacked_visits: u64,
    /// DDoS threat occurrences
    pub total_threats: u64,
    pub unique_ips: usize,
}

#[derive(Default)]
struct CountryAccumulator {
    name: String,
    visits: u64,
    ips: BTreeSet<String>,
    threats: u64,
}

/// Group visits by country code.
///
/// A visit listing several countries counts fully in each of them, so the
/// per-country unique IP counts can add up to more than the global count.
pub fn country_stats(visits: &[Visit]) -> BTreeMap<String, CountryStat> {
    let mut countries: BTreeMap<&str, CountryAccumulator> = BTreeMap::new();

    for visit in visits {
        let ddos_threats = visit.ddos_threats();
        for (code, name) in visit.country_pairs() {
            let entry = countries.entry(code).or_insert_with(|| CountryAccumulator {
                name: name.to_string(),
                ..Default::default()
            });
            entry.visits += 1;
            entry.ips.extend(visit.client_ips.iter().cloned());
            entry.threats = entry.threats.saturating_add(ddos_threats);
        }
    }

    debug!("Country stats computed for {} countries", countries.len());

    countries
        .into_iter()
        .map(|(code, acc)| {
            let ip_count = acc.ips.len();
            (
                code.to_string(),
                CountryStat {
                    name: acc.name,
                    visits: acc.visits,
                    ip_count,
                    threats: acc.threats,
                    severity: Severity::from_ip_count(ip_count),
                },
            )
        })
        .collect()
}

/// Client type, application and capability frequencies
pub fn client_stats(visits: &[Visit]) -> ClientStats {
    let mut stats = ClientStats::default();

    for visit in visits {
        *stats.client_type.entry(visit.client_type.clone()).or_insert(0) += 1;
        *stats
            .client_application
            .entry(visit.client_application.clone())
            .or_insert(0) += 1;
        stats.supports_cookies.record(visit.supports_cookies);
        stats.supports_java_script.record(visit.supports_javascript);
    }

    stats
}

#[derive(Default)]
struct EndpointAccumulator {
    attacks: u64,
    total_hits: u64,
    total_threats: u64,
    ips: BTreeSet<String>,
    countries: BTreeSet<String>,
    threat_types: BTreeSet<String>,
}

/// Most attacked entry pages, by number of attacked visits
pub fn endpoint_stats(visits: &[Visit], limit: usize) -> Vec<EndpointStat> {
    let mut endpoints: BTreeMap<&str, EndpointAccumulator> = BTreeMap::new();

    for visit in visits.iter().filter(|v| v.is_attacked()) {
        let Some(entry_page) = visit.entry_page.as_deref() else {
            continue;
        };
        let entry = endpoints.entry(entry_page).or_default();
        entry.attacks += 1;
        entry.total_hits = entry.total_hits.saturating_add(visit.hits);
        entry.total_threats = entry.total_threats.saturating_add(visit.total_threats());
        entry.threat_types.extend(visit.security_summary.keys().cloned());
        entry.ips.extend(visit.client_ips.iter().cloned());
        entry.countries.extend(visit.countries().map(str::to_string));
    }

    let mut ranked: Vec<EndpointStat> = endpoints
        .into_iter()
        .map(|(url, acc)| EndpointStat {
            url: url.to_string(),
            attacks: acc.attacks,
            total_hits: acc.total_hits,
            total_threats: acc.total_threats,
            unique_ips_count: acc.ips.len(),
            countries_count: acc.countries.len(),
            threat_types_count: acc.threat_types.len(),
            countries_list: acc.countries.into_iter().collect(),
            threat_types_list: acc.threat_types.into_iter().collect(),
        })
        .collect();

    // Stable sort keeps URL order among equal attack counts
    ranked.sort_by(|a, b| b.attacks.cmp(&a.attacks));
    ranked.truncate(limit);

    debug!("Endpoint stats: {} attacked endpoints kept", ranked.len());
    ranked
}

#[derive(Default)]
struct IpAccumulator {
    hits: u64,
    visits: u64,
    total_threats: u64,
    countries: BTreeSet<String>,
    threat_types: BTreeSet<String>,
    endpoints: BTreeSet<String>,
    user_agents: BTreeSet<String>,
}

/// Most active attacking IPs, by hits.
///
/// Every IP of a visit receives the visit's full hit and threat counts.
pub fn ip_stats(visits: &[Visit], limit: usize) -> Vec<IpStat> {
    let mut ips: BTreeMap<&str, IpAccumulator> = BTreeMap::new();

    for visit in visits.iter().filter(|v| v.is_attacked()) {
        let total_threats = visit.total_threats();
        for ip in &visit.client_ips {
            let entry = ips.entry(ip.as_str()).or_default();
            entry.hits = entry.hits.saturating_add(visit.hits);
            entry.visits += 1;
            entry.total_threats = entry.total_threats.saturating_add(total_threats);
            entry.threat_types.extend(visit.security_summary.keys().cloned());
            entry.countries.extend(visit.countries().map(str::to_string));
            if let Some(entry_page) = &visit.entry_page {
                entry.endpoints.insert(entry_page.clone());
            }
            if let Some(user_agent) = &visit.user_agent {
                entry.user_agents.insert(user_agent.clone());
            }
        }
    }

    let mut ranked: Vec<IpStat> = ips
        .into_iter()
        .map(|(ip, acc)| IpStat {
            ip: ip.to_string(),
            hits: acc.hits,
            visits: acc.visits,
            total_threats: acc.total_threats,
            countries_count: acc.countries.len(),
            countries_list: acc.countries.into_iter().collect(),
            threat_types_count: acc.threat_types.len(),
            threat_types_list: acc.threat_types.into_iter().collect(),
            endpoints_count: acc.endpoints.len(),
            endpoints_list: acc.endpoints.into_iter().collect(),
            user_agents_count: acc.user_agents.len(),
        })
        .collect();

    ranked.sort_by(|a, b| b.hits.cmp(&a.hits));
    ranked.truncate(limit);

    debug!("IP stats: {} attacking IPs kept", ranked.len());
    ranked
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> &'a str {
    match value.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &value[prefix.len()..],
        _ => value,
    }
}

/// Map a raw `requestResult` to its dashboard label
pub fn classify_request_result(raw: &str) -> String {
    let stripped = strip_prefix_ignore_case(raw, "api.request_result.");
    let cleaned = strip_prefix_ignore_case(stripped, "req_");
    let lower = cleaned.to_lowercase();

    let label = if lower.contains("captcha") {
        "CAPTCHA"
    } else if lower.contains("block") {
        "BLOCKED"
    } else if lower.contains("javascript") {
        "JAVASCRIPT_CHALLENGE"
    } else if lower.contains("cookieless") {
        "COOKIELESS_SESSION"
    } else if lower.contains("allowed") || lower.contains("pass") {
        "ALLOWED"
    } else {
        return cleaned.to_uppercase().replace('_', " ");
    };
    label.to_string()
}

/// Distribution of request outcomes over every action of every visit
pub fn request_results(visits: &[Visit]) -> RequestResults {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut total_requests = 0;

    for action in visits.iter().flat_map(|v| v.actions.iter()) {
        if let Some(result) = &action.request_result {
            *counts.entry(classify_request_result(result)).or_insert(0) += 1;
            total_requests += 1;
        }
    }

    let mut results: Vec<RequestResultStat> = counts
        .into_iter()
        .map(|(label, count)| RequestResultStat {
            percentage: percentage(count, total_requests),
            label,
            count,
        })
        .collect();
    results.sort_by(|a, b| b.count.cmp(&a.count));

    RequestResults {
        results,
        total_requests,
    }
}

/// Headline counters of the visit set
pub fn visit_summary(visits: &[Visit]) -> VisitSummary {
    let unique_ips: BTreeSet<&str> = visits
        .iter()
        .flat_map(|v| v.client_ips.iter().map(String::as_str))
        .collect();

    VisitSummary {
        total_visits: visits.len() as u64,
        attacked_visits: visits.iter().filter(|v| v.is_attacked()).count() as u64,
        total_threats: visits
            .iter()
            .fold(0, |total, v| total.saturating_add(v.ddos_threats())),
        unique_ips: unique_ips.len(),
    }
}

/// Sorted, distinct country names present in the visit set
pub fn country_options(visits: &[Visit]) -> Vec<String> {
    let countries: BTreeSet<&str> = visits.iter().flat_map(|v| v.countries()).collect();
    countries.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::Value;

    use crate::core::visit::{RawVisit, Visit};

    pub fn visit(value: Value) -> Visit {
        let raw: RawVisit = serde_json::from_value(value).unwrap();
        Visit::from(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::visit;
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<Visit> {
        vec![
            visit(json!({
                "id": "v1", "hits": 10, "entryPage": "/login",
                "clientIPs": ["1.1.1.1"], "country": ["Chile"], "countryCode": ["CL"],
                "clientType": "Bot", "clientApplication": "curl", "userAgent": "curl/8.0",
                "supportsCookies": true,
                "securitySummary": {"api.threats.ddos": 3},
                "actions": [{"requestResult": "api.request_result.req_blocked"}]
            })),
            visit(json!({
                "id": "v2", "hits": 4, "entryPage": "/login",
                "clientIPs": ["1.1.1.1", "2.2.2.2"],
                "country": ["Chile", "Argentina"], "countryCode": ["CL", "AR"],
                "clientType": "Browser", "supportsJavaScript": true,
                "securitySummary": {"api.threats.ddos": 1, "api.threats.bot_access_control": 2},
                "actions": [
                    {"requestResult": "api.request_result.req_captcha_served"},
                    {"requestResult": "api.request_result.req_passed"}
                ]
            })),
            visit(json!({
                "id": "v3", "hits": 50, "entryPage": "/",
                "clientIPs": ["3.3.3.3"], "country": ["Chile"], "countryCode": ["CL"],
                "actions": [{"requestResult": "api.request_result.req_cached"}]
            })),
        ]
    }

    #[test]
    fn test_country_stats_example() {
        let visits = vec![visit(json!({
            "countryCode": ["CL"], "country": ["Chile"], "clientIPs": ["1.1.1.1"],
            "securitySummary": {"ddos": 3}, "hits": 10
        }))];
        let stats = country_stats(&visits);
        assert_eq!(
            stats["CL"],
            CountryStat {
                name: "Chile".to_string(),
                visits: 1,
                ip_count: 1,
                threats: 3,
                severity: Severity::Minimal,
            }
        );
    }

    #[test]
    fn test_country_stats_counts_every_country() {
        let stats = country_stats(&sample());
        assert_eq!(stats["CL"].visits, 3);
        assert_eq!(stats["CL"].ip_count, 3);
        assert_eq!(stats["CL"].threats, 4);
        assert_eq!(stats["AR"].visits, 1);
        assert_eq!(stats["AR"].ip_count, 2);
        assert_eq!(stats["AR"].threats, 1);

        // Per-country IPs exceed the global unique count by design
        let sum: usize = stats.values().map(|s| s.ip_count).sum();
        assert!(sum > visit_summary(&sample()).unique_ips);
    }

    #[test]
    fn test_country_stats_tolerates_length_mismatch() {
        let visits = vec![visit(json!({
            "countryCode": ["CL", "AR"], "country": ["Chile"], "clientIPs": ["1.1.1.1"]
        }))];
        let stats = country_stats(&visits);
        assert_eq!(stats.len(), 1);
        assert!(stats.contains_key("CL"));
    }

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(Severity::from_ip_count(0), Severity::Minimal);
        assert_eq!(Severity::from_ip_count(4), Severity::Minimal);
        assert_eq!(Severity::from_ip_count(5), Severity::Low);
        assert_eq!(Severity::from_ip_count(20), Severity::Medium);
        assert_eq!(Severity::from_ip_count(49), Severity::Medium);
        assert_eq!(Severity::from_ip_count(50), Severity::High);
    }

    #[test]
    fn test_client_stats() {
        let stats = client_stats(&sample());
        assert_eq!(stats.client_type["Bot"], 1);
        assert_eq!(stats.client_type["Browser"], 1);
        assert_eq!(stats.client_type["Unknown"], 1);
        assert_eq!(stats.client_application["curl"], 1);
        assert_eq!(stats.client_application["Unknown"], 2);
        assert_eq!(stats.supports_cookies, BooleanCounts { supported: 1, unsupported: 2 });
        assert_eq!(stats.supports_java_script, BooleanCounts { supported: 1, unsupported: 2 });

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["supportsCookies"]["true"], json!(1));
    }

    #[test]
    fn test_endpoint_stats() {
        let endpoints = endpoint_stats(&sample(), DEFAULT_TOP_LIMIT);
        assert_eq!(endpoints.len(), 1);
        let login = &endpoints[0];
        assert_eq!(login.url, "/login");
        assert_eq!(login.attacks, 2);
        assert_eq!(login.total_hits, 14);
        assert_eq!(login.total_threats, 6);
        assert_eq!(login.unique_ips_count, 2);
        assert_eq!(login.countries_list, vec!["Argentina", "Chile"]);
        assert_eq!(
            login.threat_types_list,
            vec!["api.threats.bot_access_control", "api.threats.ddos"]
        );
    }

    #[test]
    fn test_threat_free_visits_are_excluded() {
        let visits = vec![visit(json!({
            "securitySummary": {}, "clientIPs": ["2.2.2.2"], "entryPage": "/a"
        }))];
        assert!(endpoint_stats(&visits, DEFAULT_TOP_LIMIT).is_empty());
        assert!(ip_stats(&visits, DEFAULT_TOP_LIMIT).is_empty());
    }

    #[test]
    fn test_attacked_visit_without_entry_page() {
        let visits = vec![visit(json!({
            "securitySummary": {"ddos": 1}, "clientIPs": ["2.2.2.2"]
        }))];
        assert!(endpoint_stats(&visits, DEFAULT_TOP_LIMIT).is_empty());
        assert_eq!(ip_stats(&visits, DEFAULT_TOP_LIMIT).len(), 1);
    }

    #[test]
    fn test_ip_stats_give_full_counts_to_each_ip() {
        let ips = ip_stats(&sample(), DEFAULT_TOP_LIMIT);
        assert_eq!(ips.len(), 2);

        assert_eq!(ips[0].ip, "1.1.1.1");
        assert_eq!(ips[0].hits, 14);
        assert_eq!(ips[0].visits, 2);
        assert_eq!(ips[0].total_threats, 6);
        assert_eq!(ips[0].user_agents_count, 1);
        assert_eq!(ips[0].endpoints_list, vec!["/login"]);

        assert_eq!(ips[1].ip, "2.2.2.2");
        assert_eq!(ips[1].hits, 4);
        assert_eq!(ips[1].total_threats, 3);
        assert_eq!(ips[1].countries_count, 2);
    }

    #[test]
    fn test_rankings_are_truncated() {
        let visits: Vec<Visit> = (0..20)
            .map(|i| {
                visit(json!({
                    "hits": i, "entryPage": format!("/page/{}", i),
                    "clientIPs": [format!("10.0.0.{}", i)],
                    "securitySummary": {"ddos": 1}
                }))
            })
            .collect();
        let ips = ip_stats(&visits, DEFAULT_TOP_LIMIT);
        assert_eq!(ips.len(), 15);
        assert_eq!(ips[0].hits, 19);
        assert_eq!(ips[14].hits, 5);
        assert_eq!(endpoint_stats(&visits, 3).len(), 3);
    }

    #[test]
    fn test_classify_request_result() {
        assert_eq!(classify_request_result("api.request_result.req_captcha_served"), "CAPTCHA");
        assert_eq!(classify_request_result("api.request_result.req_blocked_ddos"), "BLOCKED");
        assert_eq!(classify_request_result("req_challenge_javascript"), "JAVASCRIPT_CHALLENGE");
        assert_eq!(classify_request_result("api.request_result.req_cookieless"), "COOKIELESS_SESSION");
        assert_eq!(classify_request_result("api.request_result.req_passed"), "ALLOWED");
        assert_eq!(classify_request_result("REQ_ALLOWED"), "ALLOWED");
        assert_eq!(classify_request_result("api.request_result.req_cached_ok"), "CACHED OK");
    }

    #[test]
    fn test_prefixes_are_stripped_ignoring_case() {
        assert_eq!(classify_request_result("REQ_CACHED"), "CACHED");
        assert_eq!(classify_request_result("req_cached"), "CACHED");
        assert_eq!(classify_request_result("API.REQUEST_RESULT.REQ_CACHED_OK"), "CACHED OK");
        assert_eq!(classify_request_result("re"), "RE");
    }

    #[test]
    fn test_request_results() {
        let results = request_results(&sample());
        assert_eq!(results.total_requests, 4);
        assert_eq!(results.count("BLOCKED"), 1);
        assert_eq!(results.count("CAPTCHA"), 1);
        assert_eq!(results.count("ALLOWED"), 1);
        assert_eq!(results.count("CACHED"), 1);
        assert!(results.results.iter().all(|r| r.percentage == 25.0));
    }

    #[test]
    fn test_visit_summary_and_country_options() {
        let summary = visit_summary(&sample());
        assert_eq!(summary.total_visits, 3);
        assert_eq!(summary.attacked_visits, 2);
        assert_eq!(summary.total_threats, 4);
        assert_eq!(summary.unique_ips, 3);
        assert_eq!(country_options(&sample()), vec!["Argentina", "Chile"]);
    }

    #[test]
    fn test_aggregators_are_idempotent() {
        let visits = sample();
        assert_eq!(country_stats(&visits), country_stats(&visits));
        assert_eq!(client_stats(&visits), client_stats(&visits));
        assert_eq!(endpoint_stats(&visits, DEFAULT_TOP_LIMIT), endpoint_stats(&visits, DEFAULT_TOP_LIMIT));
        assert_eq!(ip_stats(&visits, DEFAULT_TOP_LIMIT), ip_stats(&visits, DEFAULT_TOP_LIMIT));
        assert_eq!(request_results(&visits), request_results(&visits));
    }

    #[test]
    fn test_counters_grow_with_the_visit_set() {
        let all = sample();
        let subset = &all[..2];

        let small = country_stats(subset);
        let large = country_stats(&all);
        for (code, stat) in &small {
            assert!(large[code].visits >= stat.visits);
            assert!(large[code].ip_count >= stat.ip_count);
            assert!(large[code].threats >= stat.threats);
        }

        let small = ip_stats(subset, usize::MAX);
        let large = ip_stats(&all, usize::MAX);
        for stat in &small {
            let bigger = large.iter().find(|s| s.ip == stat.ip).unwrap();
            assert!(bigger.hits >= stat.hits);
            assert!(bigger.visits >= stat.visits);
        }

        let small = client_stats(subset);
        let large = client_stats(&all);
        for (client_type, count) in &small.client_type {
            assert!(large.client_type[client_type] >= *count);
        }

        let small = endpoint_stats(subset, usize::MAX);
        let large = endpoint_stats(&all, usize::MAX);
        for stat in &small {
            let bigger = large.iter().find(|s| s.url == stat.url).unwrap();
            assert!(bigger.attacks >= stat.attacks);
            assert!(bigger.total_hits >= stat.total_hits);
            assert!(bigger.total_threats >= stat.total_threats);
            assert!(bigger.unique_ips_count >= stat.unique_ips_count);
        }

        let small = request_results(subset);
        let large = request_results(&all);
        assert!(large.total_requests >= small.total_requests);
        for stat in &small.results {
            assert!(large.count(&stat.label) >= stat.count);
        }

        let small = visit_summary(subset);
        let large = visit_summary(&all);
        assert!(large.total_visits >= small.total_visits);
        assert!(large.attacked_visits >= small.attacked_visits);
        assert!(large.total_threats >= small.total_threats);
        assert!(large.unique_ips >= small.unique_ips);
    }

    #[test]
    fn test_huge_threat_counts_saturate() {
        let visits = vec![
            visit(json!({
                "entryPage": "/", "hits": u64::MAX, "clientIPs": ["1.1.1.1"],
                "country": ["Chile"], "countryCode": ["CL"],
                "securitySummary": {"ddos": u64::MAX, "bot": 1}
            })),
            visit(json!({
                "entryPage": "/", "hits": 1, "clientIPs": ["1.1.1.1"],
                "country": ["Chile"], "countryCode": ["CL"],
                "securitySummary": {"ddos": 1}
            })),
        ];

        assert_eq!(visit_summary(&visits).total_threats, u64::MAX);
        assert_eq!(country_stats(&visits)["CL"].threats, u64::MAX);

        let endpoints = endpoint_stats(&visits, DEFAULT_TOP_LIMIT);
        assert_eq!(endpoints[0].total_hits, u64::MAX);
        assert_eq!(endpoints[0].total_threats, u64::MAX);

        let ips = ip_stats(&visits, DEFAULT_TOP_LIMIT);
        assert_eq!(ips[0].hits, u64::MAX);
        assert_eq!(ips[0].total_threats, u64::MAX);
    }

    #[test]
    fn test_empty_input() {
        assert!(country_stats(&[]).is_empty());
        assert_eq!(client_stats(&[]), ClientStats::default());
        assert_eq!(request_results(&[]), RequestResults::default());
        assert_eq!(visit_summary(&[]), VisitSummary::default());
    }
}
