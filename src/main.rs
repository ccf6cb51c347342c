//! DDoS visit analytics
//!
//! Command-line front end: loads a report, applies the requested rule and
//! country filters, and prints or saves the dashboard stats or an export.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use log::info;

use ddos_visit_analytics::config;
use ddos_visit_analytics::core::export::{detailed_csv, ip_export, report_json, write_export};
use ddos_visit_analytics::core::{Dashboard, DashboardStats, RawReport, ReportQuery, StatsPublisher};
use ddos_visit_analytics::utils::{get_current_timestamp_millis, ALL_FILTER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Dashboard stats as JSON
    Stats,
    /// Detailed per-visit CSV
    Csv,
    /// Flattened IP rows as JSON
    Ips,
    /// Full report as JSON
    Report,
}

#[derive(Parser, Debug)]
#[command(name = "ddos-visit-analytics", version, about = "Aggregate and export DDoS visit reports")]
struct Args {
    /// Report JSON file
    #[arg(short, long)]
    report: PathBuf,

    /// Security rule display name, or "all"
    #[arg(long, default_value = ALL_FILTER)]
    rule: String,

    /// Country name, or "all"
    #[arg(long, default_value = ALL_FILTER)]
    country: String,

    /// Report window start (ms since epoch)
    #[arg(long)]
    start: Option<i64>,

    /// Report window end (ms since epoch)
    #[arg(long)]
    end: Option<i64>,

    #[arg(short, long, value_enum, default_value_t = Format::Stats)]
    format: Format,

    /// Directory to save the output in; printed to stdout when absent
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save into the configured export directory
    #[arg(long)]
    save: bool,
}

struct LogPublisher;

impl StatsPublisher for LogPublisher {
    fn publish(&mut self, stats: &DashboardStats) {
        info!(
            "Stats ready: {} of {} visits, {} attacked, {} DDoS threats",
            stats.working_visits,
            stats.total_visits,
            stats.summary.attacked_visits,
            stats.summary.total_threats
        );
    }
}

fn report_window(args: &Args, report: &RawReport) -> ReportQuery {
    let covering = ReportQuery::covering(report);
    let now = get_current_timestamp_millis();
    ReportQuery::new(
        args.start
            .or(covering.map(|q| q.start_ms))
            .unwrap_or(now),
        args.end.or(covering.map(|q| q.end_ms)).unwrap_or(now),
    )
}

fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    let args = Args::parse();
    let config = config::load_config().context("Failed to load configuration")?;

    let json = fs::read_to_string(&args.report)
        .with_context(|| format!("Failed to read report {}", args.report.display()))?;
    let report = RawReport::from_json_str(&json).context("Failed to parse report")?;

    let mut dashboard = Dashboard::new(LogPublisher, config.dashboard.clone());
    let ticket = dashboard.begin_request(report_window(&args, &report));
    let mut stats = dashboard.complete_request(ticket, report)?;
    if args.rule != ALL_FILTER {
        stats = dashboard.select_rule(&args.rule)?;
    }
    if args.country != ALL_FILTER {
        stats = dashboard.select_country(&args.country)?;
    }

    let (contents, prefix, extension) = match args.format {
        Format::Stats => (serde_json::to_string_pretty(&stats)?, "ddos_stats", "json"),
        Format::Csv => {
            let rules_map = dashboard.rules_map().cloned().unwrap_or_default();
            (
                detailed_csv(&dashboard.working_set(), &rules_map, &dashboard.time_zone()),
                "ddos_detailed_report",
                "csv",
            )
        }
        Format::Ips => (ip_export(&dashboard.working_set())?, "ddos_ips", "json"),
        Format::Report => {
            let report = dashboard.report().context("No report loaded")?;
            (report_json(report)?, "ddos_report", "json")
        }
    };

    let output_dir = match (args.output, args.save) {
        (Some(dir), _) => Some(dir),
        (None, true) => Some(PathBuf::from(&config.export.output_dir)),
        (None, false) => None,
    };

    match output_dir {
        Some(dir) => {
            let path = write_export(&dir, &config.export.file_name(prefix, extension), &contents)?;
            println!("{}", path.display());
        }
        None => println!("{}", contents),
    }

    Ok(())
}
