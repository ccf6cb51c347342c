use std::time::{SystemTime, UNIX_EPOCH};

/// Stripped identifier of the custom-rule sentinel.
pub const CUSTOM_RULE_SENTINEL: &str = "customRule";

/// Stripped security summary key counted as a DDoS threat.
pub const DDOS_THREAT_KEY: &str = "ddos";

/// Filter value that disables a filter dimension.
pub const ALL_FILTER: &str = "all";

pub fn get_current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Strip the platform namespace from a threat or rule identifier.
///
/// `api.threats.ddos` becomes `ddos`, `api.acl.blacklisted_ips` becomes
/// `acl.blacklisted_ips`; anything else is returned as is.
pub fn clean_identifier(raw: &str) -> &str {
    let stripped = raw.strip_prefix("api.threats.").unwrap_or(raw);
    stripped.strip_prefix("api.").unwrap_or(stripped)
}

/// Whether a `securityRule` value designates a user-defined rule.
pub fn is_custom_rule(security_rule: &str) -> bool {
    clean_identifier(security_rule) == CUSTOM_RULE_SENTINEL
}

/// Significant part of an attack code: everything before the first `.`.
pub fn attack_code_prefix(code: &str) -> &str {
    code.split('.').next().unwrap_or_default()
}

/// Percentage of `count` over `total`, rounded to one decimal place.
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = count as f64 / total as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}
