//! Security rule catalogue and visit filtering.
//!
//! Rules observed in a report come from two places: system threat types
//! (security summary keys and non-custom threat records) and user-defined
//! rules (custom-rule threat records resolved through the rules map). Both
//! are keyed by their display name, which is also the filter key.
//!
//! The catalogue and the filter derive display names through the same
//! function, `rule_activations`, so a rule listed for a visit always
//! selects that visit and vice versa.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::visit::{RulesMap, Visit};
use crate::utils::{attack_code_prefix, clean_identifier, ALL_FILTER};

/// Where a rule activation comes from
#[derive(Debug, Clone, PartialEq)]
pub enum RuleSource {
    /// Built-in threat type of the security platform
    System,
    /// User-defined rule resolved through the rules map
    Custom {
        rule_id: String,
        action: Option<String>,
    },
}

/// One rule activation observed in a visit
#[derive(Debug, Clone, PartialEq)]
pub struct RuleActivation {
    pub name: String,
    pub occurrences: u64,
    pub source: RuleSource,
}

/// Catalogue entry of a selectable rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleStat {
    pub name: String,
    pub count: u64,
    /// Distinct visits activating the rule
    pub visits: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub is_custom_rule: bool,
}

/// Display name of a built-in threat type
pub fn system_rule_name(identifier: &str) -> String {
    format!("System Rule: {}", clean_identifier(identifier).to_uppercase())
}

/// Display name and action of a custom rule id
pub fn custom_rule_name(rule_id: &str, rules_map: &RulesMap) -> (String, Option<String>) {
    match rules_map.get(rule_id) {
        Some(info) => (
            info.name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("Unknown Rule (ID: {})", rule_id)),
            Some(
                info.action
                    .clone()
                    .filter(|action| !action.is_empty())
                    .unwrap_or_else(|| "Unknown Action".to_string()),
            ),
        ),
        None => (format!("Rule ID: {}", rule_id), None),
    }
}

/// Every rule activation of a visit, in report order
pub fn rule_activations(visit: &Visit, rules_map: &RulesMap) -> Vec<RuleActivation> {
    let mut activations: Vec<RuleActivation> = visit
        .security_summary
        .iter()
        .map(|(threat_type, count)| RuleActivation {
            name: system_rule_name(threat_type),
            occurrences: *count,
            source: RuleSource::System,
        })
        .collect();

    for threat in visit.threats() {
        if threat.is_custom_rule() {
            for code in &threat.attack_codes {
                let rule_id = attack_code_prefix(code);
                // "0" marks a threat without a rule
                if rule_id.is_empty() || rule_id == "0" {
                    continue;
                }
                let (name, action) = custom_rule_name(rule_id, rules_map);
                activations.push(RuleActivation {
                    name,
                    occurrences: 1,
                    source: RuleSource::Custom {
                        rule_id: rule_id.to_string(),
                        action,
                    },
                });
            }
        } else if !threat.security_rule.is_empty() {
            activations.push(RuleActivation {
                name: system_rule_name(&threat.security_rule),
                occurrences: 1,
                source: RuleSource::System,
            });
        }
    }

    activations
}

struct RuleAccumulator {
    count: u64,
    visits: u64,
    last_visit: usize,
    source: RuleSource,
}

/// Build the catalogue of rules activated across `visits`, most used first
pub fn extract_rules(visits: &[Visit], rules_map: &RulesMap) -> Vec<RuleStat> {
    let mut rules: BTreeMap<String, RuleAccumulator> = BTreeMap::new();

    for (index, visit) in visits.iter().enumerate() {
        for activation in rule_activations(visit, rules_map) {
            let entry = rules
                .entry(activation.name)
                .or_insert_with(|| RuleAccumulator {
                    count: 0,
                    visits: 0,
                    last_visit: index,
                    source: activation.source,
                });
            entry.count = entry.count.saturating_add(activation.occurrences);
            if entry.visits == 0 || entry.last_visit != index {
                entry.visits += 1;
                entry.last_visit = index;
            }
        }
    }

    let mut catalogue: Vec<RuleStat> = rules
        .into_iter()
        .map(|(name, acc)| {
            let (rule_id, rule_action, is_custom_rule) = match acc.source {
                RuleSource::System => (None, None, false),
                RuleSource::Custom { rule_id, action } => (Some(rule_id), action, true),
            };
            RuleStat {
                name,
                count: acc.count,
                visits: acc.visits,
                rule_action,
                rule_id,
                is_custom_rule,
            }
        })
        .collect();
    catalogue.sort_by(|a, b| b.count.cmp(&a.count));

    info!("Found {} unique security rules", catalogue.len());
    catalogue
}

/// Whether `visit` activates the rule displayed as `rule_name`
pub fn visit_has_rule(visit: &Visit, rule_name: &str, rules_map: &RulesMap) -> bool {
    rule_activations(visit, rules_map)
        .iter()
        .any(|activation| activation.name == rule_name)
}

/// Visits activating `rule_name`; `"all"` keeps every visit
pub fn filter_visits_by_rule(visits: &[Visit], rule_name: &str, rules_map: &RulesMap) -> Vec<Visit> {
    if rule_name == ALL_FILTER {
        return visits.to_vec();
    }
    let filtered: Vec<Visit> = visits
        .iter()
        .filter(|visit| visit_has_rule(visit, rule_name, rules_map))
        .cloned()
        .collect();
    debug!(
        "Filtered {} visits out of {} for rule: {}",
        filtered.len(),
        visits.len(),
        rule_name
    );
    filtered
}

/// Whether `visit` lists `country`, ignoring case
pub fn visit_in_country(visit: &Visit, country: &str) -> bool {
    let wanted = country.to_lowercase();
    visit.country.iter().any(|name| name.to_lowercase() == wanted)
}

/// Visits from `country`; `"all"` keeps every visit
pub fn filter_visits_by_country(visits: &[Visit], country: &str) -> Vec<Visit> {
    if country == ALL_FILTER {
        return visits.to_vec();
    }
    visits
        .iter()
        .filter(|visit| visit_in_country(visit, country))
        .cloned()
        .collect()
}

/// Selector value as a filter; `"all"` and empty mean no filter
pub fn selection(value: &str) -> Option<String> {
    (value != ALL_FILTER && !value.is_empty()).then(|| value.to_string())
}

/// Active rule and country selection.
///
/// Both dimensions are checked per visit in a single pass, so the result
/// does not depend on which filter was picked first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitFilter {
    pub rule: Option<String>,
    pub country: Option<String>,
}

impl VisitFilter {
    /// Build a filter from selector values, `"all"` meaning no filter
    pub fn from_selection(rule: &str, country: &str) -> Self {
        Self {
            rule: selection(rule),
            country: selection(country),
        }
    }

    pub fn is_active(&self) -> bool {
        self.rule.is_some() || self.country.is_some()
    }

    pub fn matches(&self, visit: &Visit, rules_map: &RulesMap) -> bool {
        let country_ok = self
            .country
            .as_deref()
            .map_or(true, |country| visit_in_country(visit, country));
        country_ok
            && self
                .rule
                .as_deref()
                .map_or(true, |rule| visit_has_rule(visit, rule, rules_map))
    }

    pub fn apply(&self, visits: &[Visit], rules_map: &RulesMap) -> Vec<Visit> {
        if !self.is_active() {
            return visits.to_vec();
        }
        visits
            .iter()
            .filter(|visit| self.matches(visit, rules_map))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analytics::fixtures::visit;
    use crate::core::visit::RuleInfo;
    use serde_json::json;

    fn rules_map() -> RulesMap {
        let mut map = RulesMap::new();
        map.insert("42".to_string(), RuleInfo::new("SQLi Block", "BLOCK"));
        map.insert("77".to_string(), RuleInfo::default());
        map
    }

    fn sample() -> Vec<Visit> {
        vec![
            visit(json!({
                "id": "a", "country": ["Chile"],
                "securitySummary": {"api.threats.ddos": 4},
                "actions": [{"threats": [
                    {"securityRule": "api.threats.ddos"},
                    {"securityRule": "api.threats.customRule", "attackCodes": ["42.1", "0.1", ""]}
                ]}]
            })),
            visit(json!({
                "id": "b", "country": ["Peru", "Chile"],
                "actions": [{"threats": [
                    {"securityRule": "customRule", "attackCodes": ["42.3", 99, "77.0"]},
                    {"securityRule": "api.acl.blacklisted_ips"}
                ]}]
            })),
            visit(json!({
                "id": "c", "country": ["peru"],
                "securitySummary": {"api.threats.bot_access_control": 2}
            })),
            visit(json!({"id": "d", "country": ["Brazil"]})),
        ]
    }

    #[test]
    fn test_custom_rule_example() {
        let v = visit(json!({
            "actions": [{"threats": [{"securityRule": "customRule", "attackCodes": ["42.1"]}]}]
        }));
        let rules = extract_rules(std::slice::from_ref(&v), &rules_map());
        assert_eq!(
            rules,
            vec![RuleStat {
                name: "SQLi Block".to_string(),
                count: 1,
                visits: 1,
                rule_action: Some("BLOCK".to_string()),
                rule_id: Some("42".to_string()),
                is_custom_rule: true,
            }]
        );
        assert!(visit_has_rule(&v, "SQLi Block", &rules_map()));
        assert!(!visit_has_rule(&v, "System Rule: DDOS", &rules_map()));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(system_rule_name("api.threats.ddos"), "System Rule: DDOS");
        assert_eq!(system_rule_name("api.acl.blacklisted_ips"), "System Rule: ACL.BLACKLISTED_IPS");
        assert_eq!(
            custom_rule_name("77", &rules_map()),
            ("Unknown Rule (ID: 77)".to_string(), Some("Unknown Action".to_string()))
        );
        assert_eq!(custom_rule_name("99", &rules_map()), ("Rule ID: 99".to_string(), None));
    }

    #[test]
    fn test_extract_rules() {
        let rules = extract_rules(&sample(), &rules_map());
        let by_name: BTreeMap<&str, &RuleStat> = rules.iter().map(|r| (r.name.as_str(), r)).collect();

        let ddos = by_name["System Rule: DDOS"];
        assert_eq!(ddos.count, 5);
        assert_eq!(ddos.visits, 1);
        assert!(!ddos.is_custom_rule);

        let sqli = by_name["SQLi Block"];
        assert_eq!(sqli.count, 2);
        assert_eq!(sqli.visits, 2);
        assert_eq!(sqli.rule_id.as_deref(), Some("42"));

        assert_eq!(by_name["Rule ID: 99"].rule_action, None);
        assert!(by_name["Rule ID: 99"].is_custom_rule);
        assert_eq!(by_name["System Rule: BOT_ACCESS_CONTROL"].count, 2);
        assert!(by_name.contains_key("System Rule: ACL.BLACKLISTED_IPS"));
        assert!(by_name.contains_key("Unknown Rule (ID: 77)"));
        assert!(!by_name.keys().any(|name| name.contains("ID: 0")));

        assert_eq!(rules[0].name, "System Rule: DDOS");
        assert!(rules.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn test_catalogue_and_filter_agree() {
        let visits = sample();
        let map = rules_map();
        let all_names: Vec<String> = extract_rules(&visits, &map).into_iter().map(|r| r.name).collect();

        for v in &visits {
            let own: Vec<String> = extract_rules(std::slice::from_ref(v), &map)
                .into_iter()
                .map(|r| r.name)
                .collect();
            for name in &all_names {
                assert_eq!(
                    visit_has_rule(v, name, &map),
                    own.contains(name),
                    "visit {} rule {}",
                    v.id,
                    name
                );
            }
        }
    }

    #[test]
    fn test_catalogue_is_idempotent_and_grows_with_visits() {
        let visits = sample();
        let map = rules_map();
        assert_eq!(extract_rules(&visits, &map), extract_rules(&visits, &map));

        let large = extract_rules(&visits, &map);
        for end in 0..visits.len() {
            for rule in extract_rules(&visits[..end], &map) {
                let bigger = large.iter().find(|r| r.name == rule.name).unwrap();
                assert!(bigger.count >= rule.count);
                assert!(bigger.visits >= rule.visits);
            }
        }
    }

    #[test]
    fn test_huge_rule_counts_saturate() {
        let v = visit(json!({
            "securitySummary": {"api.threats.ddos": u64::MAX},
            "actions": [{"threats": [{"securityRule": "api.threats.ddos"}]}]
        }));
        let rules = extract_rules(std::slice::from_ref(&v), &RulesMap::new());
        assert_eq!(rules[0].name, "System Rule: DDOS");
        assert_eq!(rules[0].count, u64::MAX);
    }

    #[test]
    fn test_filter_by_rule() {
        let visits = sample();
        let map = rules_map();
        let ids = |vs: Vec<Visit>| vs.into_iter().map(|v| v.id).collect::<Vec<_>>();

        assert_eq!(ids(filter_visits_by_rule(&visits, "SQLi Block", &map)), vec!["a", "b"]);
        assert_eq!(ids(filter_visits_by_rule(&visits, "System Rule: DDOS", &map)), vec!["a"]);
        assert!(filter_visits_by_rule(&visits, "No such rule", &map).is_empty());
        assert_eq!(filter_visits_by_rule(&visits, "all", &map), visits);
    }

    #[test]
    fn test_filter_by_country() {
        let visits = sample();
        let ids = |vs: Vec<Visit>| vs.into_iter().map(|v| v.id).collect::<Vec<_>>();

        assert_eq!(ids(filter_visits_by_country(&visits, "PERU")), vec!["b", "c"]);
        assert_eq!(ids(filter_visits_by_country(&visits, "chile")), vec!["a", "b"]);
        assert_eq!(filter_visits_by_country(&visits, "all").len(), 4);
    }

    #[test]
    fn test_filters_commute() {
        let visits = sample();
        let map = rules_map();
        for rule in ["SQLi Block", "System Rule: BOT_ACCESS_CONTROL", "all"] {
            for country in ["Chile", "peru", "Brazil", "all"] {
                let country_first =
                    filter_visits_by_rule(&filter_visits_by_country(&visits, country), rule, &map);
                let rule_first =
                    filter_visits_by_country(&filter_visits_by_rule(&visits, rule, &map), country);
                let combined = VisitFilter::from_selection(rule, country).apply(&visits, &map);
                assert_eq!(country_first, rule_first);
                assert_eq!(country_first, combined);
            }
        }
    }

    #[test]
    fn test_visit_filter_selection() {
        let filter = VisitFilter::from_selection("all", "Chile");
        assert_eq!(filter.rule, None);
        assert_eq!(filter.country.as_deref(), Some("Chile"));
        assert!(filter.is_active());
        assert!(!VisitFilter::from_selection("all", "all").is_active());
    }
}
