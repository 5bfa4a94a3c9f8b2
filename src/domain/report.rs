//! Report snapshot: price block and gated risk block.
//!
//! Risk figures are disclosed only on the reporting weekday or from the
//! cutoff hour onwards. Outside that window, or when they cannot be computed,
//! the block carries a placeholder message instead of numbers.

use crate::domain::archive::DEFAULT_CUTOFF_HOUR;
use crate::domain::error::PricedashError;
use crate::domain::granularity::Granularity;
use crate::domain::metrics::{compute_metrics, DEFAULT_RISK_FREE_RATE};
use crate::domain::time_series::TimeSeries;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    /// Bar time treated as the official session close.
    pub session_close: NaiveTime,
    pub cutoff_hour: u32,
    pub reporting_weekday: Weekday,
    pub risk_free_rate: f64,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            session_close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
            cutoff_hour: DEFAULT_CUTOFF_HOUR,
            reporting_weekday: Weekday::Fri,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
        }
    }
}

/// A price that may be missing from the feed. Serializes as a number or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceValue {
    Available(f64),
    Unavailable,
}

impl PriceValue {
    pub fn value(self) -> Option<f64> {
        match self {
            PriceValue::Available(v) => Some(v),
            PriceValue::Unavailable => None,
        }
    }
}

impl From<Option<f64>> for PriceValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(PriceValue::Unavailable, PriceValue::Available)
    }
}

impl fmt::Display for PriceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceValue::Available(v) => write!(f, "{v:.2}"),
            PriceValue::Unavailable => f.write_str("unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBlock {
    pub opening_price: PriceValue,
    pub closing_price: PriceValue,
    pub latest_price: PriceValue,
    pub session_high: PriceValue,
    pub session_low: PriceValue,
    pub variation: PriceValue,
    pub variation_pct: PriceValue,
    /// (close - open) / open of the latest bar, in percent.
    pub last_bar_return_pct: PriceValue,
}

impl PriceBlock {
    pub fn compute(series: &TimeSeries, session_close: NaiveTime) -> Self {
        let bars = series.bars();
        let open = series.first().map(|b| b.open);
        let latest = series.last().map(|b| b.close);
        let closing = bars
            .iter()
            .rev()
            .find(|b| b.time() == session_close)
            .map(|b| b.close);
        let high = bars.iter().map(|b| b.high).reduce(f64::max);
        let low = bars.iter().map(|b| b.low).reduce(f64::min);
        let variation = open.zip(latest).map(|(o, l)| l - o);
        let variation_pct = open.zip(variation).map(|(o, v)| v / o * 100.0);
        let last_bar_return_pct = series.last().map(|b| b.intraday_return() * 100.0);

        Self {
            opening_price: open.into(),
            closing_price: closing.into(),
            latest_price: latest.into(),
            session_high: high.into(),
            session_low: low.into(),
            variation: variation.into(),
            variation_pct: variation_pct.into(),
            last_bar_return_pct: last_bar_return_pct.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub intraday_volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub cumulative_return_pct: f64,
    pub max_drawdown_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RiskBlock {
    Disclosed(RiskMetrics),
    /// Outside the disclosure window.
    Withheld { message: String },
    /// Inside the window, but the figures could not be computed.
    Unavailable { message: String },
}

impl RiskBlock {
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, RiskBlock::Disclosed(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            RiskBlock::Disclosed(_) => None,
            RiskBlock::Withheld { message } | RiskBlock::Unavailable { message } => Some(message),
        }
    }

    pub fn metrics(&self) -> Option<&RiskMetrics> {
        match self {
            RiskBlock::Disclosed(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub generated_at: NaiveDateTime,
    pub session_date: Option<NaiveDate>,
    pub prices: PriceBlock,
    pub risk: RiskBlock,
}

impl ReportSnapshot {
    pub fn price_fields(&self) -> Vec<(&'static str, String)> {
        let p = &self.prices;
        vec![
            ("opening_price", p.opening_price.to_string()),
            ("closing_price", p.closing_price.to_string()),
            ("latest_price", p.latest_price.to_string()),
            ("session_high", p.session_high.to_string()),
            ("session_low", p.session_low.to_string()),
            ("variation", p.variation.to_string()),
            ("variation_pct", p.variation_pct.to_string()),
            ("last_bar_return_pct", p.last_bar_return_pct.to_string()),
        ]
    }

    pub fn risk_fields(&self) -> Vec<(&'static str, String)> {
        match &self.risk {
            RiskBlock::Disclosed(m) => vec![
                ("intraday_volatility", format!("{:.2}", m.intraday_volatility)),
                ("sharpe_ratio", format!("{:.2}", m.sharpe_ratio)),
                ("sortino_ratio", format!("{:.2}", m.sortino_ratio)),
                ("cumulative_return_pct", format!("{:.2}", m.cumulative_return_pct)),
                ("max_drawdown_pct", format!("{:.2}", m.max_drawdown_pct)),
            ],
            RiskBlock::Withheld { message } | RiskBlock::Unavailable { message } => {
                vec![("message", message.clone())]
            }
        }
    }
}

pub const NO_PREVIOUS_REPORT: &str = "No report available for the previous day.";

/// The report finalized at the last archive cutoff, if one was saved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PreviousReport {
    Available(ReportSnapshot),
    Missing,
}

impl PreviousReport {
    pub fn report(&self) -> Option<&ReportSnapshot> {
        match self {
            PreviousReport::Available(r) => Some(r),
            PreviousReport::Missing => None,
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            PreviousReport::Available(_) => None,
            PreviousReport::Missing => Some(NO_PREVIOUS_REPORT),
        }
    }
}

pub fn is_disclosed(now: NaiveDateTime, settings: &ReportSettings) -> bool {
    now.weekday() == settings.reporting_weekday || now.hour() >= settings.cutoff_hour
}

fn finite(metric: &str, value: f64) -> Result<f64, PricedashError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PricedashError::NonFinite {
            metric: metric.to_string(),
        })
    }
}

/// Realtime risk figures over an intraday session.
pub fn compute_risk_metrics(
    session: &TimeSeries,
    risk_free_rate: f64,
) -> Result<RiskMetrics, PricedashError> {
    if session.len() < 2 {
        return Err(PricedashError::InsufficientData {
            bars: session.len(),
            minimum: 2,
        });
    }
    let summary = compute_metrics(session, Granularity::Realtime, risk_free_rate).summary;
    Ok(RiskMetrics {
        intraday_volatility: finite("intraday volatility", summary.volatility)?,
        sharpe_ratio: finite("sharpe ratio", summary.sharpe_ratio)?,
        sortino_ratio: finite("sortino ratio", summary.sortino_ratio)?,
        cumulative_return_pct: finite("cumulative return", summary.cumulative_return * 100.0)?,
        max_drawdown_pct: finite("max drawdown", summary.max_drawdown * 100.0)?,
    })
}

pub fn build_report(
    series: &TimeSeries,
    now: NaiveDateTime,
    settings: &ReportSettings,
) -> ReportSnapshot {
    let prices = PriceBlock::compute(series, settings.session_close);

    let risk = if !is_disclosed(now, settings) {
        RiskBlock::Withheld {
            message: format!(
                "Risk metrics are published from {:02}:00, or all day on {}.",
                settings.cutoff_hour, settings.reporting_weekday
            ),
        }
    } else {
        match compute_risk_metrics(series, settings.risk_free_rate) {
            Ok(metrics) => RiskBlock::Disclosed(metrics),
            Err(e) => {
                tracing::warn!(error = %e, "risk metrics unavailable");
                RiskBlock::Unavailable {
                    message: format!("Risk metrics are unavailable: {e}."),
                }
            }
        }
    };

    ReportSnapshot {
        generated_at: now,
        session_date: series.last().map(|b| b.date()),
        prices,
        risk,
    }
}
