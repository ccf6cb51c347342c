//! Site-level statistics reported by the security platform.
//!
//! These come pre-aggregated with the report (`stats.incap_rules`,
//! `stats.threats`, `stats.incap_rules_timeseries`) and are ranked once per
//! report. Rule and country filters do not apply to them.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of rules and threats kept in the incident rankings
pub const TOP_INCIDENTS: usize = 10;

/// Number of rule series kept in the incident timeline
pub const TOP_RULE_SERIES: usize = 5;

/// Incident counter for a rule or a threat type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawIncidentCount {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incidents: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Incident time series of a single rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRuleSeries {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incidents: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `stats` section of a report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawApiStats {
    pub incap_rules: Vec<RawIncidentCount>,
    pub threats: Vec<RawIncidentCount>,
    pub incap_rules_timeseries: Vec<RawRuleSeries>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Ranked incident counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentStat {
    pub id: Option<String>,
    pub name: String,
    pub incidents: u64,
}

/// Ranked rule incident series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSeries {
    pub id: String,
    pub name: String,
    pub action: String,
    /// `(timestamp ms, incidents)` points as reported
    pub data: Vec<(i64, u64)>,
    pub total_incidents: u64,
    pub created_at: String,
    pub updated_by: String,
}

/// Top rule series and their combined incidents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesTimeseries {
    pub rules: Vec<RuleSeries>,
    pub total_incidents: u64,
}

/// Site-level statistics ready for presentation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStats {
    pub top_incap_rules: Vec<IncidentStat>,
    pub top_threats: Vec<IncidentStat>,
    pub rules_timeseries: RulesTimeseries,
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// `[timestamp, count]` pairs; malformed points are skipped
fn points(value: Option<&Value>) -> Vec<(i64, u64)> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let pair = item.as_array()?;
            let ts = pair.first()?.as_i64()?;
            Some((ts, count(pair.get(1))))
        })
        .collect()
}

/// Rank incident counters: keep those with incidents, highest first
pub fn top_incidents(entries: &[RawIncidentCount], limit: usize) -> Vec<IncidentStat> {
    let mut ranked: Vec<IncidentStat> = entries
        .iter()
        .map(|entry| IncidentStat {
            id: text(entry.id.as_ref()),
            name: text(entry.name.as_ref()).unwrap_or_else(|| "Unknown".to_string()),
            incidents: count(entry.incidents.as_ref()),
        })
        .filter(|stat| stat.incidents > 0)
        .collect();
    ranked.sort_by(|a, b| b.incidents.cmp(&a.incidents).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(limit);
    ranked
}

/// Rank rule series by their summed incidents
pub fn rules_timeseries(series: &[RawRuleSeries], limit: usize) -> RulesTimeseries {
    let mut rules: Vec<RuleSeries> = series
        .iter()
        .map(|raw| {
            let data = points(raw.incidents.as_ref());
            let total_incidents = data.iter().fold(0, |total: u64, (_, n)| total.saturating_add(*n));
            let name = text(raw.name.as_ref());
            RuleSeries {
                id: text(raw.id.as_ref())
                    .or_else(|| name.clone())
                    .unwrap_or_default(),
                name: name.unwrap_or_else(|| "Unknown Rule".to_string()),
                action: text(raw.action.as_ref()).unwrap_or_else(|| "Unknown Action".to_string()),
                data,
                total_incidents,
                created_at: text(raw.created_at.as_ref()).unwrap_or_else(|| "Unknown".to_string()),
                updated_by: text(raw.updated_by.as_ref()).unwrap_or_else(|| "Unknown".to_string()),
            }
        })
        .filter(|rule| rule.total_incidents > 0)
        .collect();

    rules.sort_by(|a, b| {
        b.total_incidents
            .cmp(&a.total_incidents)
            .then_with(|| a.name.cmp(&b.name))
    });
    rules.truncate(limit);

    let total_incidents = rules
        .iter()
        .fold(0, |total: u64, rule| total.saturating_add(rule.total_incidents));
    debug!("{} rule series kept with {} incidents", rules.len(), total_incidents);

    RulesTimeseries { rules, total_incidents }
}

/// Build the site-level statistics of a report
pub fn api_stats(raw: &RawApiStats) -> ApiStats {
    ApiStats {
        top_incap_rules: top_incidents(&raw.incap_rules, TOP_INCIDENTS),
        top_threats: top_incidents(&raw.threats, TOP_INCIDENTS),
        rules_timeseries: rules_timeseries(&raw.incap_rules_timeseries, TOP_RULE_SERIES),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_stats() -> RawApiStats {
        serde_json::from_value(json!({
            "incap_rules": [
                {"id": 1, "name": "Block bad bots", "incidents": 40},
                {"id": 2, "name": "Quiet rule", "incidents": 0},
                {"id": 3, "name": "Geo block", "incidents": 90}
            ],
            "threats": [
                {"name": "DDoS", "incidents": 12},
                {"name": "SQL Injection", "incidents": 3}
            ],
            "incap_rules_timeseries": [
                {"id": 10, "name": "Rate limit", "action": "RULE_ACTION_BLOCK",
                 "incidents": [[1700000000000_i64, 5], [1700000300000_i64, 7]]},
                {"name": "No id", "incidents": [[1700000000000_i64, 1]]},
                {"id": 12, "name": "Idle", "incidents": [[1700000000000_i64, 0]]},
                {"id": 13, "incidents": "broken"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_top_incidents_drops_idle_and_sorts() {
        let stats = api_stats(&raw_stats());
        let names: Vec<_> = stats.top_incap_rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Geo block", "Block bad bots"]);
        assert_eq!(stats.top_incap_rules[0].id.as_deref(), Some("3"));
        assert_eq!(stats.top_threats.len(), 2);
    }

    #[test]
    fn test_top_incidents_limit() {
        let entries: Vec<RawIncidentCount> = (1..=15)
            .map(|i| serde_json::from_value(json!({"name": format!("r{}", i), "incidents": i})).unwrap())
            .collect();
        let top = top_incidents(&entries, TOP_INCIDENTS);
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].incidents, 15);
        assert_eq!(top[9].incidents, 6);
    }

    #[test]
    fn test_rules_timeseries() {
        let series = api_stats(&raw_stats()).rules_timeseries;
        assert_eq!(series.rules.len(), 2);
        assert_eq!(series.total_incidents, 13);

        let first = &series.rules[0];
        assert_eq!(first.id, "10");
        assert_eq!(first.total_incidents, 12);
        assert_eq!(first.updated_by, "Unknown");

        let second = &series.rules[1];
        assert_eq!(second.id, "No id");
        assert_eq!(second.action, "Unknown Action");
    }

    #[test]
    fn test_empty_stats() {
        let stats = api_stats(&RawApiStats::default());
        assert!(stats.top_incap_rules.is_empty());
        assert!(stats.rules_timeseries.rules.is_empty());
        assert_eq!(stats.rules_timeseries.total_incidents, 0);
    }
}
