//! Visit record model for DDoS visit reports.
//!
//! Reports arrive as loosely typed JSON. The `Raw*` types mirror that JSON
//! and tolerate missing or mistyped fields; `Visit` is the normalized model
//! every aggregator works on. Normalization happens once, in
//! `From<&RawVisit> for Visit`, so no aggregator substitutes defaults itself.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::stats::RawApiStats;
use crate::utils::{clean_identifier, is_custom_rule, DDOS_THREAT_KEY};

/// Placeholder used for absent descriptive fields.
pub const UNKNOWN: &str = "Unknown";

/// Errors that can occur while reading a report
#[derive(Error, Debug)]
pub enum VisitError {
    #[error("Report parsing error: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Deserialize a field, treating a value of the wrong JSON type as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

/// Custom rule definition resolved through the rules map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleInfo {
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RuleInfo {
    pub fn new(name: &str, action: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            action: Some(action.to_string()),
            extra: Map::new(),
        }
    }
}

/// Attack-code prefix to custom rule lookup, valid for one report.
pub type RulesMap = BTreeMap<String, RuleInfo>;

/// Threat as received inside an action
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawThreat {
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub security_rule: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub security_rule_action: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub attack_codes: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Action as received inside a visit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawAction {
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub request_result: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub threats: Option<Vec<RawThreat>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Visit as received from the reporting API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawVisit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_views: Option<Value>,
    #[serde(
        rename = "clientIPs",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_ips: Option<Vec<Value>>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub country: Option<Vec<Value>>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub country_code: Option<Vec<Value>>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub client_type: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub client_application: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub entry_page: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub supports_cookies: Option<bool>,
    #[serde(
        rename = "supportsJavaScript",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub supports_javascript: Option<bool>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub security_summary: Option<BTreeMap<String, Value>>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<RawAction>>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub served_via: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full report payload handed over by the fetch collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawReport {
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total_visits: Option<u64>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
    #[serde(deserialize_with = "lenient_or_default")]
    pub visits: Vec<RawVisit>,
    #[serde(deserialize_with = "lenient_or_default")]
    pub rules_map: RulesMap,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub stats: Option<RawApiStats>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawReport {
    /// Parse a report from its JSON text
    pub fn from_json_str(json: &str) -> Result<Self, VisitError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Normalize every visit of the report
    pub fn normalized_visits(&self) -> Vec<Visit> {
        self.visits.iter().map(Visit::from).collect()
    }

    /// Earliest and latest visit start times, read without normalizing the visits
    pub fn start_time_range(&self) -> Option<(i64, i64)> {
        self.visits
            .iter()
            .filter_map(|visit| visit.start_time.as_ref().and_then(value_to_millis))
            .fold(None, |range, ms| match range {
                None => Some((ms, ms)),
                Some((start, end)) => Some((start.min(ms), end.max(ms))),
            })
    }
}

/// One detected security-rule match within an action
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Threat {
    pub security_rule: String,
    pub security_rule_action: Option<String>,
    pub attack_codes: Vec<String>,
}

impl Threat {
    pub fn is_custom_rule(&self) -> bool {
        is_custom_rule(&self.security_rule)
    }
}

/// One request-processing event within a visit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Action {
    pub request_result: Option<String>,
    pub threats: Vec<Threat>,
}

/// Normalized visit
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub id: String,
    /// Start time in milliseconds since the Unix epoch
    pub start_time: Option<i64>,
    pub hits: u64,
    pub page_views: u64,
    pub client_ips: Vec<String>,
    pub country: Vec<String>,
    pub country_code: Vec<String>,
    pub client_type: String,
    pub client_application: String,
    pub user_agent: Option<String>,
    pub entry_page: Option<String>,
    pub supports_cookies: bool,
    pub supports_javascript: bool,
    pub security_summary: BTreeMap<String, u64>,
    pub actions: Vec<Action>,
    pub served_via: Vec<String>,
}

impl Default for Visit {
    fn default() -> Self {
        Self {
            id: String::new(),
            start_time: None,
            hits: 0,
            page_views: 0,
            client_ips: Vec::new(),
            country: Vec::new(),
            country_code: Vec::new(),
            client_type: UNKNOWN.to_string(),
            client_application: UNKNOWN.to_string(),
            user_agent: None,
            entry_page: None,
            supports_cookies: false,
            supports_javascript: false,
            security_summary: BTreeMap::new(),
            actions: Vec::new(),
            served_via: Vec::new(),
        }
    }
}

impl Visit {
    /// A visit is attacked when its security summary has at least one entry
    pub fn is_attacked(&self) -> bool {
        !self.security_summary.is_empty()
    }

    /// Sum of all security summary occurrences, saturating at `u64::MAX`
    pub fn total_threats(&self) -> u64 {
        self.security_summary
            .values()
            .fold(0, |total, count| total.saturating_add(*count))
    }

    /// Occurrences recorded under the DDoS threat type
    pub fn ddos_threats(&self) -> u64 {
        self.security_summary
            .iter()
            .filter(|(key, _)| clean_identifier(key) == DDOS_THREAT_KEY)
            .fold(0, |total, (_, count)| total.saturating_add(*count))
    }

    /// `(country code, country name)` pairs zipped by position.
    ///
    /// Codes without a matching non-empty name are skipped.
    pub fn country_pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.country_code
            .iter()
            .enumerate()
            .filter_map(move |(index, code)| {
                let name = self.country.get(index)?;
                if code.is_empty() || name.is_empty() {
                    return None;
                }
                Some((code.as_str(), name.as_str()))
            })
    }

    /// Non-blank country names of the visit
    pub fn countries(&self) -> impl Iterator<Item = &str> + '_ {
        self.country
            .iter()
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
    }

    /// Every threat of every action
    pub fn threats(&self) -> impl Iterator<Item = &Threat> + '_ {
        self.actions.iter().flat_map(|action| action.threats.iter())
    }

    pub fn has_custom_rule(&self) -> bool {
        self.threats().any(Threat::is_custom_rule)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.start_time
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    pub fn user_agent_or_unknown(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn entry_page_or_unknown(&self) -> &str {
        self.entry_page.as_deref().unwrap_or(UNKNOWN)
    }
}

/// Render a scalar JSON value as a string; `null` yields nothing.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn value_to_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f > 0.0)
            .map(|f| f as u64)
            .unwrap_or(0),
        _ => 0,
    }
}

fn float_to_millis(f: f64) -> Option<i64> {
    (f.is_finite() && f.abs() < i64::MAX as f64).then(|| f as i64)
}

/// Start time in ms; values chrono cannot represent are treated as absent
fn value_to_millis(value: &Value) -> Option<i64> {
    let ms = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_to_millis)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_millis))
        }
        _ => None,
    }?;
    Utc.timestamp_millis_opt(ms).single().map(|_| ms)
}

fn strings(values: Option<&Vec<Value>>) -> Vec<String> {
    values
        .map(|values| {
            values
                .iter()
                .map(|v| value_to_string(v).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default()
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|s| !s.is_empty()).cloned()
}

impl From<&RawThreat> for Threat {
    fn from(raw: &RawThreat) -> Self {
        Self {
            security_rule: raw.security_rule.clone().unwrap_or_default(),
            security_rule_action: non_empty(raw.security_rule_action.as_ref()),
            attack_codes: raw
                .attack_codes
                .iter()
                .flatten()
                .filter_map(value_to_string)
                .collect(),
        }
    }
}

impl From<&RawAction> for Action {
    fn from(raw: &RawAction) -> Self {
        Self {
            request_result: non_empty(raw.request_result.as_ref()),
            threats: raw.threats.iter().flatten().map(Threat::from).collect(),
        }
    }
}

impl From<&RawVisit> for Visit {
    fn from(raw: &RawVisit) -> Self {
        let mut client_ips = strings(raw.client_ips.as_ref());
        client_ips.retain(|ip| !ip.is_empty());

        Self {
            id: raw.id.as_ref().and_then(value_to_string).unwrap_or_default(),
            start_time: raw.start_time.as_ref().and_then(value_to_millis),
            hits: raw.hits.as_ref().map(value_to_count).unwrap_or(0),
            page_views: raw.page_views.as_ref().map(value_to_count).unwrap_or(0),
            client_ips,
            country: strings(raw.country.as_ref()),
            country_code: strings(raw.country_code.as_ref()),
            client_type: non_empty(raw.client_type.as_ref()).unwrap_or_else(|| UNKNOWN.to_string()),
            client_application: non_empty(raw.client_application.as_ref())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            user_agent: non_empty(raw.user_agent.as_ref()),
            entry_page: non_empty(raw.entry_page.as_ref()),
            supports_cookies: raw.supports_cookies.unwrap_or(false),
            supports_javascript: raw.supports_javascript.unwrap_or(false),
            security_summary: raw
                .security_summary
                .iter()
                .flatten()
                .map(|(key, count)| (key.clone(), value_to_count(count)))
                .collect(),
            actions: raw.actions.iter().flatten().map(Action::from).collect(),
            served_via: strings(raw.served_via.as_ref()),
        }
    }
}

impl From<RawVisit> for Visit {
    fn from(raw: RawVisit) -> Self {
        Visit::from(&raw)
    }
}
