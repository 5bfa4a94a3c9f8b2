//! Calendar resampling of bar sequences.
//!
//! Each bucket aggregates to a single bar with:
//! - Open: first bar's open
//! - High: max high across the bucket
//! - Low: min low across the bucket
//! - Close: last bar's close
//!
//! The output bar is stamped at the bucket start (00:00 of the day, of the
//! ISO week's Monday, or of the month's first day).

use crate::domain::granularity::Granularity;
use crate::domain::metrics::{compute_metrics, DerivedSeries};
use crate::domain::price_bar::PriceBar;
use crate::domain::time_series::TimeSeries;
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Realtime | Granularity::Daily => date,
        Granularity::Weekly => {
            date - Days::new(u64::from(date.weekday().num_days_from_monday()))
        }
        Granularity::Monthly => date.with_day(1).unwrap_or(date),
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

fn is_one_bar_per_day(series: &TimeSeries) -> bool {
    series
        .bars()
        .windows(2)
        .all(|w| w[0].date() != w[1].date())
}

pub fn resample(series: &TimeSeries, granularity: Granularity) -> TimeSeries {
    if granularity == Granularity::Realtime
        || (granularity == Granularity::Daily && is_one_bar_per_day(series))
    {
        return series.clone();
    }

    let mut resampled = Vec::new();
    let mut current: Option<(NaiveDate, PriceBar)> = None;

    for bar in series.bars() {
        let start = bucket_start(bar.date(), granularity);
        match current {
            Some((key, ref mut agg)) if key == start => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
            }
            Some((_, agg)) => {
                resampled.push(agg);
                current = Some((start, PriceBar { timestamp: midnight(start), ..*bar }));
            }
            None => {
                current = Some((start, PriceBar { timestamp: midnight(start), ..*bar }));
            }
        }
    }

    if let Some((_, agg)) = current {
        resampled.push(agg);
    }

    TimeSeries::from_sorted(resampled)
}

/// Resamples to `granularity` and recomputes metrics with its window and factor.
pub fn resample_metrics(
    series: &TimeSeries,
    granularity: Granularity,
    risk_free_rate: f64,
) -> DerivedSeries {
    compute_metrics(&resample(series, granularity), granularity, risk_free_rate)
}
