//! Threat statistics and attack-pattern breakdown.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::core::analytics::AnalyticsError;
use crate::core::visit::Visit;
use crate::utils::percentage;

/// Attack pattern category of a security rule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AttackCategory {
    Ddos,
    Bot,
    Injection,
    Other,
}

impl AttackCategory {
    /// Categorize a `securityRule` identifier by substring
    pub fn of_rule(security_rule: &str) -> Self {
        if security_rule.contains("ddos") {
            AttackCategory::Ddos
        } else if security_rule.contains("bot") {
            AttackCategory::Bot
        } else if ["injection", "sql", "xss"]
            .iter()
            .any(|needle| security_rule.contains(needle))
        {
            AttackCategory::Injection
        } else {
            AttackCategory::Other
        }
    }
}

/// Statistics of one security summary threat type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatStat {
    pub threat_type: String,
    pub total_occurrences: u64,
    pub affected_visits: u64,
    pub affected_ips_count: usize,
    pub countries_list: Vec<String>,
    pub attack_codes_list: Vec<String>,
}

/// Threat records falling in one attack category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackPattern {
    pub category: AttackCategory,
    pub count: u64,
    /// Share of the pass's total threat occurrences
    pub percentage: f64,
    pub unique_threats: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatStats {
    pub threats: Vec<ThreatStat>,
    pub attack_patterns: Vec<AttackPattern>,
    pub total_threats: u64,
}

#[derive(Default)]
struct ThreatAccumulator {
    total_occurrences: u64,
    affected_visits: u64,
    ips: BTreeSet<String>,
    countries: BTreeSet<String>,
    attack_codes: BTreeSet<String>,
}

#[derive(Default)]
struct PatternAccumulator {
    count: u64,
    rules: BTreeSet<String>,
}

fn add(counter: &mut u64, value: u64, what: &str) -> Result<(), AnalyticsError> {
    *counter = counter
        .checked_add(value)
        .ok_or_else(|| AnalyticsError::CounterOverflow(what.to_string()))?;
    Ok(())
}

fn try_threat_stats(visits: &[Visit]) -> Result<ThreatStats, AnalyticsError> {
    let mut threats: BTreeMap<&str, ThreatAccumulator> = BTreeMap::new();
    let mut patterns: BTreeMap<AttackCategory, PatternAccumulator> = BTreeMap::new();
    let mut total_threats: u64 = 0;

    for visit in visits {
        for (threat_type, count) in &visit.security_summary {
            let entry = threats.entry(threat_type.as_str()).or_default();
            add(&mut entry.total_occurrences, *count, threat_type)?;
            add(&mut entry.affected_visits, 1, threat_type)?;
            add(&mut total_threats, *count, "total threats")?;
            entry.ips.extend(visit.client_ips.iter().cloned());
            entry.countries.extend(visit.countries().map(str::to_string));
        }
    }

    // Attack codes attach to any threat type seen in the pass, whatever the visit order
    for threat in visits.iter().flat_map(|v| v.threats()) {
        if threat.security_rule.is_empty() {
            continue;
        }
        if let Some(entry) = threats.get_mut(threat.security_rule.as_str()) {
            entry
                .attack_codes
                .extend(threat.attack_codes.iter().filter(|c| !c.is_empty()).cloned());
        }

        let pattern = patterns
            .entry(AttackCategory::of_rule(&threat.security_rule))
            .or_default();
        add(&mut pattern.count, 1, "attack patterns")?;
        pattern.rules.insert(threat.security_rule.clone());
    }

    let mut threat_list: Vec<ThreatStat> = threats
        .into_iter()
        .map(|(threat_type, acc)| ThreatStat {
            threat_type: threat_type.to_string(),
            total_occurrences: acc.total_occurrences,
            affected_visits: acc.affected_visits,
            affected_ips_count: acc.ips.len(),
            countries_list: acc.countries.into_iter().collect(),
            attack_codes_list: acc.attack_codes.into_iter().collect(),
        })
        .collect();
    threat_list.sort_by(|a, b| b.total_occurrences.cmp(&a.total_occurrences));

    let mut attack_patterns: Vec<AttackPattern> = patterns
        .into_iter()
        .map(|(category, acc)| AttackPattern {
            category,
            count: acc.count,
            percentage: percentage(acc.count, total_threats),
            unique_threats: acc.rules.len(),
        })
        .collect();
    attack_patterns.sort_by(|a, b| b.count.cmp(&a.count));

    Ok(ThreatStats {
        threats: threat_list,
        attack_patterns,
        total_threats,
    })
}

/// Per threat type statistics plus the attack-pattern breakdown.
///
/// A failing pass yields an empty result instead of an error.
pub fn threat_stats(visits: &[Visit]) -> ThreatStats {
    match try_threat_stats(visits) {
        Ok(stats) => {
            debug!(
                "Threat stats: {} threat types, {} occurrences",
                stats.threats.len(),
                stats.total_threats
            );
            stats
        }
        Err(e) => {
            error!("Failed to compute threat stats: {}", e);
            ThreatStats::default()
        }
    }
}
