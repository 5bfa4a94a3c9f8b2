//! Aggregation granularity and its windowing parameters.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Longest intraday window, in minutes (a 6.5 hour trading day).
pub const TRADING_MINUTES_PER_DAY: i64 = 390;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Realtime,
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub const ALL: [Granularity; 4] = [
        Granularity::Realtime,
        Granularity::Daily,
        Granularity::Weekly,
        Granularity::Monthly,
    ];

    /// Rolling window length in bars. `None` for realtime, which uses an
    /// expanding intraday window instead.
    pub fn rolling_window(self) -> Option<usize> {
        match self {
            Granularity::Realtime => None,
            Granularity::Daily => Some(20),
            Granularity::Weekly => Some(8),
            Granularity::Monthly => Some(6),
        }
    }

    /// sqrt(periods per year). `None` for realtime.
    pub fn annualization_factor(self) -> Option<f64> {
        match self {
            Granularity::Realtime => None,
            Granularity::Daily => Some(252.0_f64.sqrt()),
            Granularity::Weekly => Some(52.0_f64.sqrt()),
            Granularity::Monthly => Some(12.0_f64.sqrt()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Realtime => "realtime",
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "realtime" | "intraday" => Ok(Granularity::Realtime),
            "daily" | "day" => Ok(Granularity::Daily),
            "weekly" | "week" => Ok(Granularity::Weekly),
            "monthly" | "month" => Ok(Granularity::Monthly),
            other => Err(format!(
                "unknown granularity '{other}' (expected realtime, daily, weekly or monthly)"
            )),
        }
    }
}
