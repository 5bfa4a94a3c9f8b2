//! End-of-day archive state machine.
//!
//! The check runs on every poll and fires only during the cutoff hour. It is
//! level-triggered, so repeated calls within that hour must be no-ops once
//! the day is stored.

use crate::domain::error::PricedashError;
use crate::domain::price_bar::PriceBar;
use crate::domain::time_series::TimeSeries;
use crate::ports::archive_port::ArchivePort;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEFAULT_CUTOFF_HOUR: u32 = 20;

/// One finalized bar per calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArchiveRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl ArchiveRecord {
    /// Aggregates a day's bars: first open, last close, extreme high and low.
    /// `None` when `bars` is empty.
    pub fn from_session(date: NaiveDate, bars: &[PriceBar]) -> Option<Self> {
        let first = bars.first()?;
        let last = bars.last()?;
        Some(Self {
            date,
            open: first.open,
            high: bars.iter().map(|b| b.high).fold(f64::MIN, f64::max),
            low: bars.iter().map(|b| b.low).fold(f64::MAX, f64::min),
            close: last.close,
        })
    }

    /// The record as a bar stamped at midnight of its date.
    pub fn to_bar(&self) -> Result<PriceBar, PricedashError> {
        PriceBar::new(
            self.date.and_time(NaiveTime::MIN),
            self.open,
            self.high,
            self.low,
            self.close,
        )
    }
}

/// Date-keyed view of the persisted archive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Archive {
    records: BTreeMap<NaiveDate, ArchiveRecord>,
}

impl Archive {
    /// Builds the view; on duplicate dates the first stored record is kept,
    /// since records are immutable once written.
    pub fn from_records(records: impl IntoIterator<Item = ArchiveRecord>) -> Self {
        let mut map = BTreeMap::new();
        for record in records {
            map.entry(record.date).or_insert(record);
        }
        Self { records: map }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.records.contains_key(&date)
    }

    pub fn get(&self, date: NaiveDate) -> Option<&ArchiveRecord> {
        self.records.get(&date)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ArchiveRecord> {
        self.records.values()
    }

    /// The archive after `decision`; only `Append` changes anything.
    pub fn apply(&self, decision: &ArchiveDecision) -> Self {
        let mut next = self.clone();
        if let ArchiveDecision::Append(record) = decision {
            next.records.entry(record.date).or_insert(*record);
        }
        next
    }

    /// Daily series of the archive. Records that fail bar validation are
    /// skipped with a warning.
    pub fn to_series(&self) -> TimeSeries {
        let bars: Vec<PriceBar> = self
            .records
            .values()
            .filter_map(|r| match r.to_bar() {
                Ok(bar) => Some(bar),
                Err(e) => {
                    tracing::warn!(date = %r.date, error = %e, "skipping invalid archive record");
                    None
                }
            })
            .collect();
        TimeSeries::from_sorted(bars)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveDecision {
    NotDue,
    AlreadyArchived(NaiveDate),
    NothingToArchive(NaiveDate),
    Append(ArchiveRecord),
}

pub fn archive_if_due(
    now: NaiveDateTime,
    intraday: &TimeSeries,
    archive: &Archive,
    cutoff_hour: u32,
) -> ArchiveDecision {
    if now.hour() != cutoff_hour {
        return ArchiveDecision::NotDue;
    }
    let today = now.date();
    if archive.contains(today) {
        return ArchiveDecision::AlreadyArchived(today);
    }
    let session = intraday.on_date(today);
    match ArchiveRecord::from_session(today, session.bars()) {
        Some(record) => ArchiveDecision::Append(record),
        None => ArchiveDecision::NothingToArchive(today),
    }
}

/// Read, decide, append against a store. A conflict reported by the store
/// means another tick already wrote the day and is treated as done.
pub fn run_archive(
    now: NaiveDateTime,
    intraday: &TimeSeries,
    store: &dyn ArchivePort,
    cutoff_hour: u32,
) -> Result<ArchiveDecision, PricedashError> {
    // Outside the cutoff hour the store is not read at all.
    if now.hour() != cutoff_hour {
        return Ok(ArchiveDecision::NotDue);
    }

    let archive = Archive::from_records(store.read_records()?);
    let decision = archive_if_due(now, intraday, &archive, cutoff_hour);

    match &decision {
        ArchiveDecision::Append(record) => match store.append(record) {
            Ok(()) => {
                tracing::info!(
                    date = %record.date,
                    open = record.open,
                    close = record.close,
                    "archived daily bar"
                );
                Ok(decision)
            }
            Err(PricedashError::ArchiveConflict { date }) => {
                tracing::debug!(%date, "archive already written by an earlier tick");
                Ok(ArchiveDecision::AlreadyArchived(date))
            }
            Err(e) => Err(e),
        },
        ArchiveDecision::AlreadyArchived(date) => {
            tracing::debug!(%date, "day already archived");
            Ok(decision)
        }
        ArchiveDecision::NothingToArchive(date) => {
            tracing::debug!(%date, "no intraday bars to archive");
            Ok(decision)
        }
        ArchiveDecision::NotDue => Ok(decision),
    }
}
