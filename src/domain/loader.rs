//! Series loader: raw feed rows to a validated `TimeSeries`.
//!
//! Rows that fail numeric coercion, date parsing, or the OHLC invariant are
//! dropped and counted, never surfaced as errors.

use crate::domain::price_bar::PriceBar;
use crate::domain::time_series::TimeSeries;
use crate::ports::feed_port::FeedPort;
use chrono::{NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

/// One untyped feed row, columns `Date, OpenPrice, ClosePrice, High, Low`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub date: String,
    pub open: String,
    pub close: String,
    pub high: String,
    pub low: String,
}

impl RawRow {
    pub fn new(date: &str, open: &str, close: &str, high: &str, low: &str) -> Self {
        Self {
            date: date.to_string(),
            open: open.to_string(),
            close: close.to_string(),
            high: high.to_string(),
            low: low.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub bad_date: usize,
    pub bad_price: usize,
    pub inconsistent: usize,
}

impl DropCounts {
    pub fn total(&self) -> usize {
        self.bad_date + self.bad_price + self.inconsistent
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub series: TimeSeries,
    pub dropped: DropCounts,
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_price(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn load_series(rows: Vec<RawRow>) -> LoadReport {
    let mut dropped = DropCounts::default();
    let mut bars = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(timestamp) = parse_timestamp(&row.date) else {
            dropped.bad_date += 1;
            continue;
        };
        let prices = (
            parse_price(&row.open),
            parse_price(&row.high),
            parse_price(&row.low),
            parse_price(&row.close),
        );
        let (Some(open), Some(high), Some(low), Some(close)) = prices else {
            dropped.bad_price += 1;
            continue;
        };
        match PriceBar::new(timestamp, open, high, low, close) {
            Ok(bar) => bars.push(bar),
            Err(e) => {
                tracing::debug!(error = %e, "dropping inconsistent bar");
                dropped.inconsistent += 1;
            }
        }
    }

    if dropped.total() > 0 {
        tracing::warn!(
            bad_date = dropped.bad_date,
            bad_price = dropped.bad_price,
            inconsistent = dropped.inconsistent,
            "dropped unusable feed rows"
        );
    }

    LoadReport {
        series: TimeSeries::from_bars(bars),
        dropped,
    }
}

/// Loads through `port`, degrading to an empty series if the source cannot be read.
pub fn load_or_empty(port: &dyn FeedPort) -> TimeSeries {
    match port.read_rows() {
        Ok(rows) => load_series(rows).series,
        Err(e) => {
            tracing::warn!(error = %e, "feed unavailable, continuing with no data");
            TimeSeries::empty()
        }
    }
}
