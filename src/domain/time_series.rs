//! Time-ordered bar sequence.
//!
//! A `TimeSeries` is strictly increasing by timestamp. The only public way in
//! is [`TimeSeries::from_bars`], which sorts and resolves duplicate timestamps
//! by keeping the last occurrence in input order.

use crate::domain::price_bar::PriceBar;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TimeSeries {
    bars: Vec<PriceBar>,
}

impl TimeSeries {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sorts ascending; a later bar with the same timestamp replaces an earlier one.
    pub fn from_bars(bars: impl IntoIterator<Item = PriceBar>) -> Self {
        let by_time: BTreeMap<NaiveDateTime, PriceBar> =
            bars.into_iter().map(|bar| (bar.timestamp, bar)).collect();
        Self {
            bars: by_time.into_values().collect(),
        }
    }

    /// Caller guarantees strictly increasing timestamps.
    pub(crate) fn from_sorted(bars: Vec<PriceBar>) -> Self {
        debug_assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Self { bars }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Bars dated within `[start, end]`; an open bound is unbounded.
    pub fn between(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let bars = self
            .bars
            .iter()
            .filter(|b| start.is_none_or(|s| b.date() >= s))
            .filter(|b| end.is_none_or(|e| b.date() <= e))
            .copied()
            .collect();
        Self { bars }
    }

    pub fn on_date(&self, date: NaiveDate) -> Self {
        self.between(Some(date), Some(date))
    }

    /// Bars of the latest calendar date present.
    pub fn last_session(&self) -> Self {
        match self.last() {
            Some(bar) => self.on_date(bar.date()),
            None => Self::empty(),
        }
    }

    /// Distinct calendar dates, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.bars.iter().map(|b| b.date()).collect();
        dates.dedup();
        dates
    }
}
