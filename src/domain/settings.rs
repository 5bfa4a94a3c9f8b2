//! Typed, validated configuration.
//!
//! Every field is checked before a tick runs; a bad config is the one error
//! that stops the CLI.

use crate::domain::archive::DEFAULT_CUTOFF_HOUR;
use crate::domain::error::PricedashError;
use crate::domain::metrics::DEFAULT_RISK_FREE_RATE;
use crate::domain::report::ReportSettings;
use crate::ports::config_port::ConfigPort;
use chrono::{NaiveTime, Weekday};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_REPORT_FILE: &str = "previous_report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveBackend {
    Csv,
    Sqlite,
}

impl FromStr for ArchiveBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ArchiveBackend::Csv),
            "sqlite" => Ok(ArchiveBackend::Sqlite),
            other => Err(format!("unknown archive backend '{other}' (expected csv or sqlite)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub feed_path: PathBuf,
    pub archive_backend: ArchiveBackend,
    pub archive_path: PathBuf,
    /// Report finalized at the last archive cutoff.
    pub report_path: PathBuf,
    pub report: ReportSettings,
}

impl Settings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PricedashError> {
        let feed_path = required_path(config, "feed", "path")?;
        let archive_path = required_path(config, "archive", "path")?;
        let archive_backend = parse_archive_backend(config)?;
        let report_path = match config.get_string("archive", "report_path") {
            Some(_) => required_path(config, "archive", "report_path")?,
            None => archive_path.with_file_name(DEFAULT_REPORT_FILE),
        };

        let report = ReportSettings {
            session_close: parse_time(config, "session", "close", "16:00")?,
            cutoff_hour: parse_cutoff_hour(config)?,
            reporting_weekday: parse_weekday(config)?,
            risk_free_rate: parse_risk_free_rate(config)?,
        };

        Ok(Self {
            feed_path,
            archive_backend,
            archive_path,
            report_path,
            report,
        })
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> PricedashError {
    PricedashError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required_path(config: &dyn ConfigPort, section: &str, key: &str) -> Result<PathBuf, PricedashError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(PathBuf::from(s.trim())),
        Some(_) => Err(invalid(section, key, "path must not be empty")),
        None => Err(PricedashError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn parse_archive_backend(config: &dyn ConfigPort) -> Result<ArchiveBackend, PricedashError> {
    let value = config
        .get_string("archive", "backend")
        .unwrap_or_else(|| "csv".to_string());
    value
        .parse()
        .map_err(|reason: String| invalid("archive", "backend", reason))
}

fn parse_time(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: &str,
) -> Result<NaiveTime, PricedashError> {
    let value = config
        .get_string(section, key)
        .unwrap_or_else(|| default.to_string());
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| invalid(section, key, format!("invalid time '{value}', expected HH:MM")))
}

fn parse_cutoff_hour(config: &dyn ConfigPort) -> Result<u32, PricedashError> {
    let value = config.get_int("session", "cutoff_hour", i64::from(DEFAULT_CUTOFF_HOUR));
    if !(0..=23).contains(&value) {
        return Err(invalid("session", "cutoff_hour", "cutoff_hour must be between 0 and 23"));
    }
    Ok(value as u32)
}

fn parse_weekday(config: &dyn ConfigPort) -> Result<Weekday, PricedashError> {
    let value = config
        .get_string("session", "reporting_weekday")
        .unwrap_or_else(|| "Fri".to_string());
    value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| invalid("session", "reporting_weekday", format!("invalid weekday '{value}'")))
}

fn parse_risk_free_rate(config: &dyn ConfigPort) -> Result<f64, PricedashError> {
    let value = config.get_double("metrics", "risk_free_rate", DEFAULT_RISK_FREE_RATE);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "metrics",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(value)
}
