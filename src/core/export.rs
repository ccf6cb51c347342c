//! Report exports: detailed visit CSV, IP summary JSON and full report JSON.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::TimeZone;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::rule_engine::custom_rule_name;
use crate::core::visit::{RawReport, RulesMap, Visit, UNKNOWN};
use crate::utils::attack_code_prefix;

/// Detailed CSV header
pub const CSV_HEADERS: [&str; 14] = [
    "Visit ID",
    "Start Time",
    "Custom Rule",
    "Reglas Activadas",
    "Client IPs",
    "Country",
    "Country Code",
    "User Agent",
    "Hits",
    "Page Views",
    "Client Type",
    "Client Application",
    "Served Via",
    "Entry Page",
];

/// Errors that can occur while exporting
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Flattened visit row of the IP export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpExportRow {
    pub ip: String,
    pub country: String,
    pub client_type: String,
    pub hits: u64,
}

/// Quote a CSV field when it holds a comma, quote or line break
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn join_or_unknown(values: &[String]) -> String {
    if values.is_empty() {
        UNKNOWN.to_string()
    } else {
        values.join(", ")
    }
}

fn format_start_time<Tz: TimeZone>(visit: &Visit, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match visit.started_at() {
        Some(started) => started
            .with_timezone(tz)
            .format("%-m/%-d/%Y, %-I:%M:%S %p")
            .to_string(),
        None => UNKNOWN.to_string(),
    }
}

/// `"<rule> (<action>)"` for every custom rule code of the visit
fn activated_rules(visit: &Visit, rules_map: &RulesMap) -> String {
    let mut rules = Vec::new();

    for threat in visit.threats().filter(|t| t.is_custom_rule()) {
        for code in &threat.attack_codes {
            let rule_id = attack_code_prefix(code);
            if rule_id.is_empty() || rule_id == "0" {
                continue;
            }
            let (name, _) = custom_rule_name(rule_id, rules_map);
            let action = rules_map
                .get(rule_id)
                .and_then(|info| info.action.clone())
                .filter(|action| !action.is_empty())
                .or_else(|| threat.security_rule_action.clone())
                .unwrap_or_else(|| "UNKNOWN".to_string());
            rules.push(format!("{} ({})", name, action));
        }
    }

    if rules.is_empty() {
        "No rules activated".to_string()
    } else {
        rules.join("; ")
    }
}

fn csv_row<Tz: TimeZone>(visit: &Visit, rules_map: &RulesMap, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let id = if visit.id.is_empty() { "N/A" } else { visit.id.as_str() };
    let fields = [
        id.to_string(),
        format_start_time(visit, tz),
        if visit.has_custom_rule() { "1" } else { "0" }.to_string(),
        activated_rules(visit, rules_map),
        join_or_unknown(&visit.client_ips),
        join_or_unknown(&visit.country),
        join_or_unknown(&visit.country_code),
        visit.user_agent_or_unknown().to_string(),
        visit.hits.to_string(),
        visit.page_views.to_string(),
        visit.client_type.clone(),
        visit.client_application.clone(),
        join_or_unknown(&visit.served_via),
        visit.entry_page_or_unknown().to_string(),
    ];
    fields
        .iter()
        .map(|field| escape_field(field))
        .collect::<Vec<_>>()
        .join(",")
}

/// Detailed per-visit CSV, dates rendered in `tz`
pub fn detailed_csv<Tz: TimeZone>(visits: &[Visit], rules_map: &RulesMap, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut rows = Vec::with_capacity(visits.len() + 1);
    rows.push(
        CSV_HEADERS
            .iter()
            .map(|header| escape_field(header))
            .collect::<Vec<_>>()
            .join(","),
    );
    rows.extend(visits.iter().map(|visit| csv_row(visit, rules_map, tz)));
    rows.join("\n")
}

/// One row per visit with its IPs and countries flattened
pub fn ip_rows(visits: &[Visit]) -> Vec<IpExportRow> {
    visits
        .iter()
        .map(|visit| IpExportRow {
            ip: visit.client_ips.join(", "),
            country: visit.country.join(", "),
            client_type: visit.client_type.clone(),
            hits: visit.hits,
        })
        .collect()
}

pub fn ip_export(visits: &[Visit]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&ip_rows(visits))?)
}

/// Full report as received, unknown fields included
pub fn report_json(report: &RawReport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write an export under `dir`, creating it if needed
pub fn write_export(dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, contents)?;
    info!("Exported {} bytes to {}", contents.len(), path.display());
    Ok(path)
}
