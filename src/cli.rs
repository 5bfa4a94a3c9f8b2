//! CLI definition and dispatch.

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::clock::{FixedClock, SystemClock};
use crate::adapters::csv_adapter::{CsvArchiveAdapter, CsvFeedAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::archive::{ArchiveDecision, ArchiveRecord};
use crate::domain::engine::{Engine, Recomputation, RecomputeOutcome, RecomputeParams};
use crate::domain::error::PricedashError;
use crate::domain::granularity::Granularity;
use crate::domain::loader::parse_timestamp;
use crate::domain::report::{PreviousReport, ReportSnapshot};
use crate::domain::settings::{ArchiveBackend, Settings};
use crate::ports::archive_port::ArchivePort;
use crate::ports::clock_port::Clock;

#[derive(Parser, Debug)]
#[command(
    name = "pricedash",
    about = "Price time-series analytics and daily archival"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct Selection {
    #[arg(short, long)]
    pub config: PathBuf,
    #[arg(short, long, default_value = "realtime")]
    pub granularity: Granularity,
    /// First date to include (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// Last date to include (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,
    /// Evaluate as if the clock read this time
    #[arg(long, value_parser = parse_at)]
    pub at: Option<NaiveDateTime>,
    /// Print the full recomputation as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl Selection {
    fn params(&self) -> RecomputeParams {
        RecomputeParams {
            start: self.from,
            end: self.to,
            granularity: self.granularity,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Archive the day if due, then recompute metrics and the report
    Tick(Selection),
    /// Recompute metrics and the report without touching the archive
    Report(Selection),
    /// Run the daily archiver once
    Archive {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_parser = parse_at)]
        at: Option<NaiveDateTime>,
    },
    /// Show the report finalized at the last archive cutoff
    Previous {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn parse_at(s: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(s).ok_or_else(|| format!("invalid timestamp '{s}', expected YYYY-MM-DD HH:MM:SS"))
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Tick(selection) => run_selection(&selection, true),
        Command::Report(selection) => run_selection(&selection, false),
        Command::Archive { config, at } => run_archive(&config, at),
        Command::Previous { config, json } => run_previous(&config, json),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

pub fn load_settings(path: &PathBuf) -> Result<Settings, ExitCode> {
    let adapter = load_config(path)?;
    Settings::from_config(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

pub fn open_archive(settings: &Settings) -> Result<Box<dyn ArchivePort>, PricedashError> {
    match settings.archive_backend {
        ArchiveBackend::Csv => Ok(Box::new(CsvArchiveAdapter::new(
            settings.archive_path.clone(),
        ))),
        #[cfg(feature = "sqlite")]
        ArchiveBackend::Sqlite => {
            use crate::adapters::sqlite_adapter::SqliteArchiveAdapter;
            Ok(Box::new(SqliteArchiveAdapter::open(&settings.archive_path)?))
        }
        #[cfg(not(feature = "sqlite"))]
        ArchiveBackend::Sqlite => Err(PricedashError::ConfigInvalid {
            section: "archive".into(),
            key: "backend".into(),
            reason: "sqlite feature is required for the sqlite backend".into(),
        }),
    }
}

/// Stands in for an archive that could not be opened. Every call reports the
/// store as unavailable, which the engine treats as an empty history.
struct UnavailableArchive {
    reason: String,
}

impl ArchivePort for UnavailableArchive {
    fn read_records(&self) -> Result<Vec<ArchiveRecord>, PricedashError> {
        Err(PricedashError::unavailable("daily archive", &self.reason))
    }

    fn append(&self, _record: &ArchiveRecord) -> Result<(), PricedashError> {
        Err(PricedashError::unavailable("daily archive", &self.reason))
    }
}

/// Opens the configured archive. Only a configuration problem is an error; a
/// store that cannot be reached degrades to [`UnavailableArchive`].
pub fn archive_store(settings: &Settings) -> Result<Box<dyn ArchivePort>, PricedashError> {
    match open_archive(settings) {
        Ok(store) => Ok(store),
        Err(e @ PricedashError::ConfigInvalid { .. }) => Err(e),
        Err(e) => {
            tracing::error!(error = %e, "archive unavailable, continuing without history");
            let reason = match e {
                PricedashError::SourceUnavailable { reason, .. } => reason,
                other => other.to_string(),
            };
            Ok(Box::new(UnavailableArchive { reason }))
        }
    }
}

fn clock_for(at: Option<NaiveDateTime>) -> Box<dyn Clock> {
    match at {
        Some(now) => Box::new(FixedClock::new(now)),
        None => Box::new(SystemClock),
    }
}

fn run_selection(selection: &Selection, archive_first: bool) -> ExitCode {
    let settings = match load_settings(&selection.config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let archive = match archive_store(&settings) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let feed = CsvFeedAdapter::new(settings.feed_path.clone());
    let reports = JsonReportAdapter::new(settings.report_path.clone());
    let clock = clock_for(selection.at);
    let engine = Engine::new(&feed, archive.as_ref(), clock.as_ref(), settings.report)
        .with_report_store(&reports);
    let params = selection.params();

    let outcome = if archive_first {
        let tick = engine.tick(&params);
        if let Some(decision) = &tick.archive {
            eprintln!("Archive: {}", describe_decision(decision));
        }
        tick.recompute
    } else {
        engine.recompute(clock.now(), &params)
    };

    match outcome {
        RecomputeOutcome::NoData => {
            if selection.json {
                println!("{}", serde_json::json!({ "status": "no_data" }));
            } else {
                eprintln!("No data for the selected range.");
            }
            ExitCode::SUCCESS
        }
        RecomputeOutcome::Ready(recomputation) => {
            if selection.json {
                match serde_json::to_string_pretty(&recomputation) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("error: failed to serialize report: {e}");
                        return ExitCode::from(1);
                    }
                }
            } else {
                eprint!("{}", render_summary(&recomputation));
            }
            ExitCode::SUCCESS
        }
    }
}

fn run_archive(config_path: &PathBuf, at: Option<NaiveDateTime>) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let archive = match archive_store(&settings) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let feed = CsvFeedAdapter::new(settings.feed_path.clone());
    let reports = JsonReportAdapter::new(settings.report_path.clone());
    let clock = clock_for(at);
    let engine = Engine::new(&feed, archive.as_ref(), clock.as_ref(), settings.report)
        .with_report_store(&reports);

    match engine.archive_now() {
        Ok(decision) => {
            eprintln!("Archive: {}", describe_decision(&decision));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_previous(config_path: &PathBuf, json: bool) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let archive = match archive_store(&settings) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let feed = CsvFeedAdapter::new(settings.feed_path.clone());
    let reports = JsonReportAdapter::new(settings.report_path.clone());
    let clock = SystemClock;
    let engine = Engine::new(&feed, archive.as_ref(), &clock, settings.report)
        .with_report_store(&reports);

    let previous = engine.previous_report();
    if json {
        match serde_json::to_string_pretty(&previous) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("error: failed to serialize report: {e}");
                return ExitCode::from(1);
            }
        }
    } else {
        eprint!("{}", render_previous(&previous));
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let backend = match settings.archive_backend {
        ArchiveBackend::Csv => "csv",
        ArchiveBackend::Sqlite => "sqlite",
    };
    eprintln!("Configuration OK");
    eprintln!("  Feed:              {}", settings.feed_path.display());
    eprintln!(
        "  Archive:           {} ({backend})",
        settings.archive_path.display()
    );
    eprintln!("  Previous report:   {}", settings.report_path.display());
    eprintln!(
        "  Session close:     {}",
        settings.report.session_close.format("%H:%M")
    );
    eprintln!("  Cutoff hour:       {:02}:00", settings.report.cutoff_hour);
    eprintln!("  Reporting day:     {}", settings.report.reporting_weekday);
    eprintln!(
        "  Risk-free rate:    {:.2}%",
        settings.report.risk_free_rate * 100.0
    );
    ExitCode::SUCCESS
}

pub fn describe_decision(decision: &ArchiveDecision) -> String {
    match decision {
        ArchiveDecision::NotDue => "not due".to_string(),
        ArchiveDecision::AlreadyArchived(date) => format!("{date} already archived"),
        ArchiveDecision::NothingToArchive(date) => format!("no intraday bars for {date}"),
        ArchiveDecision::Append(record) => format!(
            "appended {} (open {:.2}, high {:.2}, low {:.2}, close {:.2})",
            record.date, record.open, record.high, record.low, record.close
        ),
    }
}

fn label(key: &str) -> String {
    let mut words = key.split('_').map(|w| {
        let mut chars = w.chars();
        match chars.next() {
            Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        }
    });
    let first = words.next().unwrap_or_default();
    words.fold(first, |acc, w| acc + " " + &w)
}

fn render_report(out: &mut String, report: &ReportSnapshot) {
    let session = report
        .session_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "no session".to_string());
    let _ = writeln!(out, "=== Session {session} ===");
    for (key, value) in report.price_fields() {
        let _ = writeln!(out, "{:<22}{value}", format!("{}:", label(key)));
    }

    let _ = writeln!(out, "\n=== Risk Metrics ===");
    for (key, value) in report.risk_fields() {
        let _ = writeln!(out, "{:<22}{value}", format!("{}:", label(key)));
    }
}

/// Console summary of a recomputation, one `Label: value` per line.
pub fn render_summary(recomputation: &Recomputation) -> String {
    let derived = &recomputation.derived;
    let mut out = String::new();
    render_report(&mut out, &recomputation.report);

    let s = &derived.summary;
    let _ = writeln!(out, "\n=== {} Series ===", label(derived.granularity.as_str()));
    let _ = writeln!(out, "{:<22}{}", "Points:", derived.len());
    let _ = writeln!(out, "{:<22}{:.2}%", "Cumulative Return:", s.cumulative_return * 100.0);
    let _ = writeln!(out, "{:<22}{:.2}%", "Max Drawdown:", s.max_drawdown * 100.0);
    let _ = writeln!(out, "{:<22}{:.2}", "Volatility:", s.volatility);
    let _ = writeln!(out, "{:<22}{:.2}", "Sharpe Ratio:", s.sharpe_ratio);
    let _ = writeln!(out, "{:<22}{:.2}", "Sortino Ratio:", s.sortino_ratio);
    out
}

pub fn render_previous(previous: &PreviousReport) -> String {
    match previous {
        PreviousReport::Available(report) => {
            let mut out = format!("Report finalized at {}\n", report.generated_at);
            render_report(&mut out, report);
            out
        }
        PreviousReport::Missing => format!("{}\n", crate::domain::report::NO_PREVIOUS_REPORT),
    }
}
