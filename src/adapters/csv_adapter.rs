//! CSV file adapters for the intraday feed and the daily archive.
//!
//! Both files share the columns `Date, OpenPrice, ClosePrice, High, Low`.
//! Header names are matched after trimming whitespace.

use crate::domain::archive::ArchiveRecord;
use crate::domain::error::PricedashError;
use crate::domain::loader::{parse_timestamp, RawRow};
use crate::domain::price_bar::PriceBar;
use crate::ports::archive_port::ArchivePort;
use crate::ports::feed_port::FeedPort;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

const COLUMNS: [&str; 5] = ["Date", "OpenPrice", "ClosePrice", "High", "Low"];

fn parse_rows(content: &str, source_name: &str) -> Result<Vec<RawRow>, PricedashError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| PricedashError::unavailable(source_name, format!("unreadable header: {e}")))?
        .clone();

    let mut index = [0usize; 5];
    for (slot, name) in index.iter_mut().zip(COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                PricedashError::unavailable(source_name, format!("missing {name} column"))
            })?;
    }

    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(source = source_name, line = line + 2, error = %e, "skipping unreadable row");
                continue;
            }
        };
        let field = |i: usize| record.get(index[i]).unwrap_or("");
        rows.push(RawRow::new(field(0), field(1), field(2), field(3), field(4)));
    }
    Ok(rows)
}

/// Reads the intraday feed written by the upstream collector.
pub struct CsvFeedAdapter {
    path: PathBuf,
}

impl CsvFeedAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl FeedPort for CsvFeedAdapter {
    fn read_rows(&self) -> Result<Vec<RawRow>, PricedashError> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            PricedashError::unavailable(
                "intraday feed",
                format!("failed to read {}: {}", self.path.display(), e),
            )
        })?;
        parse_rows(&content, "intraday feed")
    }
}

/// Append-only daily archive in a CSV file. A missing file is an empty archive.
pub struct CsvArchiveAdapter {
    path: PathBuf,
}

impl CsvArchiveAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_content(&self) -> Result<String, PricedashError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(PricedashError::unavailable(
                "daily archive",
                format!("failed to read {}: {}", self.path.display(), e),
            )),
        }
    }

    fn records_from(content: &str) -> Result<Vec<ArchiveRecord>, PricedashError> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut by_date = BTreeMap::new();
        for row in parse_rows(content, "daily archive")? {
            match to_record(&row) {
                Some(record) => {
                    by_date.entry(record.date).or_insert(record);
                }
                None => tracing::warn!(date = %row.date, "skipping malformed archive row"),
            }
        }
        Ok(by_date.into_values().collect())
    }

    /// Every date present in the file, including rows whose prices are unusable.
    fn stored_dates(content: &str) -> Result<BTreeSet<NaiveDate>, PricedashError> {
        if content.trim().is_empty() {
            return Ok(BTreeSet::new());
        }
        Ok(parse_rows(content, "daily archive")?
            .iter()
            .filter_map(|row| parse_timestamp(&row.date))
            .map(|ts| ts.date())
            .collect())
    }
}

fn to_record(row: &RawRow) -> Option<ArchiveRecord> {
    let timestamp = parse_timestamp(&row.date)?;
    let price = |s: &str| s.trim().parse::<f64>().ok();
    let bar = PriceBar::new(
        timestamp,
        price(row.open.as_str())?,
        price(row.high.as_str())?,
        price(row.low.as_str())?,
        price(row.close.as_str())?,
    )
    .ok()?;
    Some(ArchiveRecord {
        date: bar.date(),
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
    })
}

impl ArchivePort for CsvArchiveAdapter {
    fn read_records(&self) -> Result<Vec<ArchiveRecord>, PricedashError> {
        Self::records_from(&self.read_content()?)
    }

    fn append(&self, record: &ArchiveRecord) -> Result<(), PricedashError> {
        let existing = self.read_content()?;
        if Self::stored_dates(&existing)?.contains(&record.date) {
            return Err(PricedashError::ArchiveConflict { date: record.date });
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                PricedashError::archive(format!("failed to open {}: {}", self.path.display(), e))
            })?;

        if !existing.is_empty() && !existing.ends_with('\n') {
            file.write_all(b"\n")?;
        }

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if existing.trim().is_empty() {
            wtr.write_record(COLUMNS).map_err(PricedashError::archive)?;
        }
        wtr.write_record([
            record.date.format("%Y-%m-%d").to_string(),
            record.open.to_string(),
            record.close.to_string(),
            record.high.to_string(),
            record.low.to_string(),
        ])
        .map_err(PricedashError::archive)?;
        wtr.flush()?;
        Ok(())
    }
}
