//! OHLC price bar representation.

use crate::domain::error::PricedashError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PriceBar {
    /// Builds a bar, rejecting non-finite or non-positive prices and any
    /// violation of `low <= {open, close} <= high`.
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Result<Self, PricedashError> {
        for (name, value) in [("open", open), ("high", high), ("low", low), ("close", close)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PricedashError::data_quality(format!(
                    "{name} price {value} at {timestamp} is not a positive number"
                )));
            }
        }
        if low > open.min(close) || high < open.max(close) {
            return Err(PricedashError::data_quality(format!(
                "bar at {timestamp} violates low <= open/close <= high \
                 (o={open}, h={high}, l={low}, c={close})"
            )));
        }
        Ok(Self {
            timestamp,
            open,
            high,
            low,
            close,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// (close - open) / open
    pub fn intraday_return(&self) -> f64 {
        (self.close - self.open) / self.open
    }

    /// ln(close / prev_close)
    pub fn log_return(&self, prev_close: f64) -> f64 {
        (self.close / prev_close).ln()
    }
}
