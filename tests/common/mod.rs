#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use pricedash::domain::archive::ArchiveRecord;
use pricedash::domain::error::PricedashError;
use pricedash::domain::loader::RawRow;
pub use pricedash::domain::price_bar::PriceBar;
use pricedash::domain::time_series::TimeSeries;
use pricedash::ports::archive_port::ArchivePort;
use pricedash::ports::feed_port::FeedPort;
use std::cell::RefCell;
use std::io::Write;

pub struct MockFeedPort {
    pub rows: Vec<RawRow>,
    pub error: Option<String>,
}

impl MockFeedPort {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            error: None,
        }
    }

    pub fn with_row(mut self, date: &str, open: f64, close: f64, high: f64, low: f64) -> Self {
        self.rows.push(RawRow::new(
            date,
            &open.to_string(),
            &close.to_string(),
            &high.to_string(),
            &low.to_string(),
        ));
        self
    }

    pub fn with_raw(mut self, row: RawRow) -> Self {
        self.rows.push(row);
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl FeedPort for MockFeedPort {
    fn read_rows(&self) -> Result<Vec<RawRow>, PricedashError> {
        if let Some(reason) = &self.error {
            return Err(PricedashError::SourceUnavailable {
                source_name: "mock feed".into(),
                reason: reason.clone(),
            });
        }
        Ok(self.rows.clone())
    }
}

/// In-memory archive that enforces one record per date like the real stores.
#[derive(Default)]
pub struct MemoryArchivePort {
    pub records: RefCell<Vec<ArchiveRecord>>,
    pub appends: RefCell<usize>,
}

impl MemoryArchivePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, record: ArchiveRecord) -> Self {
        self.records.borrow_mut().push(record);
        self
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }
}

impl ArchivePort for MemoryArchivePort {
    fn read_records(&self) -> Result<Vec<ArchiveRecord>, PricedashError> {
        Ok(self.records.borrow().clone())
    }

    fn append(&self, record: &ArchiveRecord) -> Result<(), PricedashError> {
        if self.records.borrow().iter().any(|r| r.date == record.date) {
            return Err(PricedashError::ArchiveConflict { date: record.date });
        }
        *self.appends.borrow_mut() += 1;
        self.records.borrow_mut().push(*record);
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, min, 0).unwrap()
}

pub fn make_bar(timestamp: NaiveDateTime, close: f64) -> PriceBar {
    PriceBar::new(timestamp, close, close + 1.0, close - 1.0, close).unwrap()
}

pub fn make_record(d: NaiveDate, open: f64, close: f64) -> ArchiveRecord {
    ArchiveRecord {
        date: d,
        open,
        high: open.max(close) + 1.0,
        low: open.min(close) - 1.0,
        close,
    }
}

/// One bar every `step_minutes` from 09:30 on `day`, with closes following `closes`.
pub fn session(day: NaiveDate, step_minutes: i64, closes: &[f64]) -> TimeSeries {
    let open = day.and_hms_opt(9, 30, 0).unwrap();
    TimeSeries::from_bars(closes.iter().enumerate().map(|(i, &close)| {
        make_bar(open + chrono::Duration::minutes(step_minutes * i as i64), close)
    }))
}

/// Consecutive calendar-day records starting at `start`.
pub fn daily_records(start: NaiveDate, closes: &[f64]) -> Vec<ArchiveRecord> {
    let mut prev = closes.first().copied().unwrap_or(100.0);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let record = make_record(start + chrono::Duration::days(i as i64), prev, close);
            prev = close;
            record
        })
        .collect()
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
