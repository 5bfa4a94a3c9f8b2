//! Metrics engine: returns, volatility, risk ratios and drawdown.

use super::granularity::{Granularity, TRADING_MINUTES_PER_DAY};
use super::price_bar::PriceBar;
use super::stats::{finite_or_zero, mean, sample_stddev};
use super::time_series::TimeSeries;
use serde::Serialize;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.03;

/// Standard deviations at or below this are treated as zero dispersion.
const MIN_DISPERSION: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedPoint {
    #[serde(flatten)]
    pub bar: PriceBar,
    /// (close - open) / open
    #[serde(rename = "return")]
    pub ret: f64,
    pub log_return: f64,
    pub cumulative_return: f64,
    pub volatility: f64,
    pub drawdown: f64,
    pub sharpe_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub cumulative_return: f64,
    pub max_drawdown: f64,
    pub volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedSeries {
    pub granularity: Granularity,
    pub points: Vec<DerivedPoint>,
    pub summary: SeriesSummary,
}

impl DerivedSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Converts an annual risk-free rate to a per-bar continuously compounded rate.
pub fn per_bar_risk_free(annual_rate: f64) -> f64 {
    (1.0 + annual_rate).ln() / TRADING_DAYS_PER_YEAR
}

/// ln(close[i] / close[i-1]), with 0 at index 0.
pub fn log_returns(bars: &[PriceBar]) -> Vec<f64> {
    let mut out = Vec::with_capacity(bars.len());
    if !bars.is_empty() {
        out.push(0.0);
    }
    out.extend(bars.windows(2).map(|w| finite_or_zero(w[1].log_return(w[0].close))));
    out
}

pub fn excess_returns(log_returns: &[f64], per_bar_rf: f64) -> Vec<f64> {
    log_returns.iter().map(|r| r - per_bar_rf).collect()
}

fn dispersion(values: &[f64]) -> Option<f64> {
    sample_stddev(values).filter(|sd| *sd > MIN_DISPERSION)
}

/// mean(excess) / stdev(excess); 0 with fewer than two observations or no dispersion.
pub fn sharpe_ratio(excess: &[f64]) -> f64 {
    match (mean(excess), dispersion(excess)) {
        (Some(m), Some(sd)) => finite_or_zero(m / sd),
        _ => 0.0,
    }
}

/// mean(excess) / stdev(negative excess); 0 when the downside deviation is
/// undefined (fewer than two negative observations) or zero.
pub fn sortino_ratio(excess: &[f64]) -> f64 {
    let downside: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();
    match (mean(excess), dispersion(&downside)) {
        (Some(m), Some(dd)) => finite_or_zero(m / dd),
        _ => 0.0,
    }
}

/// Running sum of log returns and its distance below the running peak.
pub fn drawdown_curve(log_returns: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut cumulative = Vec::with_capacity(log_returns.len());
    let mut drawdown = Vec::with_capacity(log_returns.len());
    let mut total = 0.0_f64;
    let mut peak = f64::NEG_INFINITY;

    for r in log_returns {
        total += r;
        peak = peak.max(total);
        cumulative.push(total);
        drawdown.push(total - peak);
    }

    (cumulative, drawdown)
}

pub fn max_drawdown(drawdown: &[f64]) -> f64 {
    drawdown.iter().copied().fold(0.0_f64, f64::min)
}

/// Whole-session intraday volatility, in percent.
pub fn realtime_volatility(bars: &[PriceBar]) -> f64 {
    let returns = log_returns(bars);
    expanding_realtime_volatility(bars, &returns)
        .last()
        .copied()
        .unwrap_or(0.0)
}

/// stdev(log returns so far) * sqrt(elapsed minutes, capped at one trading day) * 100.
fn expanding_realtime_volatility(bars: &[PriceBar], log_returns: &[f64]) -> Vec<f64> {
    let Some(first) = bars.first() else {
        return Vec::new();
    };
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let minutes = (bar.timestamp - first.timestamp)
                .num_minutes()
                .clamp(0, TRADING_MINUTES_PER_DAY);
            match sample_stddev(&log_returns[1..=i]) {
                Some(sd) => finite_or_zero(sd * (minutes as f64).sqrt() * 100.0),
                None => 0.0,
            }
        })
        .collect()
}

/// stdev(return over the trailing window) * factor * 100.
fn rolling_volatility(returns: &[f64], window: usize, factor: f64) -> Vec<f64> {
    (0..returns.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            match sample_stddev(&returns[start..=i]) {
                Some(sd) => finite_or_zero(sd * factor * 100.0),
                None => 0.0,
            }
        })
        .collect()
}

/// Sharpe over the trailing `window` log returns ending at each bar. Index 0
/// carries no return, so windows never reach back past index 1.
fn rolling_sharpe(excess: &[f64], window: Option<usize>) -> Vec<f64> {
    (0..excess.len())
        .map(|i| {
            if i == 0 {
                return 0.0;
            }
            let start = match window {
                Some(w) => (i + 1).saturating_sub(w).max(1),
                None => 1,
            };
            sharpe_ratio(&excess[start..=i])
        })
        .collect()
}

pub fn compute_metrics(
    series: &TimeSeries,
    granularity: Granularity,
    risk_free_rate: f64,
) -> DerivedSeries {
    let bars = series.bars();
    let rf = per_bar_risk_free(risk_free_rate);

    let rets: Vec<f64> = bars.iter().map(|b| finite_or_zero(b.intraday_return())).collect();
    let logs = log_returns(bars);
    let excess = excess_returns(&logs, rf);
    let (cumulative, drawdown) = drawdown_curve(&logs);

    let window = granularity.rolling_window();
    let volatility = match (window, granularity.annualization_factor()) {
        (Some(w), Some(factor)) => rolling_volatility(&rets, w, factor),
        _ => expanding_realtime_volatility(bars, &logs),
    };
    let sharpe = rolling_sharpe(&excess, window);

    let points: Vec<DerivedPoint> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| DerivedPoint {
            bar: *bar,
            ret: rets[i],
            log_return: logs[i],
            cumulative_return: cumulative[i],
            volatility: volatility[i],
            drawdown: drawdown[i],
            sharpe_ratio: sharpe[i],
        })
        .collect();

    let summary = summarize(&points, &excess, window);

    DerivedSeries {
        granularity,
        points,
        summary,
    }
}

fn summarize(points: &[DerivedPoint], excess: &[f64], window: Option<usize>) -> SeriesSummary {
    if points.len() < 2 {
        return SeriesSummary::default();
    }

    let observations = &excess[1..];
    let bounded = match window {
        Some(w) => &observations[observations.len().saturating_sub(w)..],
        None => observations,
    };
    let drawdowns: Vec<f64> = points.iter().map(|p| p.drawdown).collect();

    SeriesSummary {
        sharpe_ratio: sharpe_ratio(bounded),
        sortino_ratio: sortino_ratio(bounded),
        cumulative_return: points.last().map(|p| p.cumulative_return).unwrap_or(0.0),
        max_drawdown: max_drawdown(&drawdowns),
        volatility: points.last().map(|p| p.volatility).unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn make_bars(closes: &[f64], step: Duration) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                PriceBar::new(start() + step * i as i32, close, close, close, close).unwrap()
            })
            .collect()
    }

    fn make_series(closes: &[f64]) -> TimeSeries {
        TimeSeries::from_bars(make_bars(closes, Duration::days(1)))
    }

    #[test]
    fn per_bar_risk_free_uses_log_compounding() {
        assert_relative_eq!(per_bar_risk_free(0.03), 1.03_f64.ln() / 252.0, epsilon = 1e-15);
    }

    #[test]
    fn log_returns_start_at_zero() {
        let bars = make_bars(&[100.0, 110.0, 99.0], Duration::days(1));
        let logs = log_returns(&bars);
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0], 0.0);
        assert_relative_eq!(logs[1], (1.1_f64).ln(), epsilon = 1e-12);
        assert_relative_eq!(logs[2], (99.0_f64 / 110.0).ln(), epsilon = 1e-12);
    }

    #[test]
    fn two_bar_scenario_returns() {
        let bars = vec![
            PriceBar::new(start(), 100.0, 102.0, 99.0, 101.0).unwrap(),
            PriceBar::new(start() + Duration::minutes(5), 101.0, 101.0, 100.0, 100.0).unwrap(),
        ];
        let derived = compute_metrics(&TimeSeries::from_bars(bars), Granularity::Realtime, 0.03);
        assert_relative_eq!(derived.points[1].ret, -0.0099, epsilon = 1e-4);
        assert_relative_eq!(derived.points[1].log_return, -0.00995, epsilon = 1e-5);
    }

    #[test]
    fn sharpe_of_single_observation_is_zero() {
        assert_eq!(sharpe_ratio(&[0.01]), 0.0);
        assert_eq!(sharpe_ratio(&[]), 0.0);
    }

    #[test]
    fn sharpe_known_value() {
        let excess = [0.01, 0.02, 0.03];
        // mean 0.02, sample stdev 0.01
        assert_relative_eq!(sharpe_ratio(&excess), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn sortino_without_losses_is_zero() {
        assert_eq!(sortino_ratio(&[0.01, 0.02, 0.03]), 0.0);
    }

    #[test]
    fn sortino_known_value() {
        let excess = [0.03, -0.01, -0.03, 0.05];
        // mean 0.01, downside sample stdev of [-0.01, -0.03] = 0.01414...
        let expected = 0.01 / (0.0002_f64).sqrt();
        assert_relative_eq!(sortino_ratio(&excess), expected, epsilon = 1e-9);
    }

    #[test]
    fn constant_price_ratios_are_zero() {
        let derived = compute_metrics(&make_series(&[50.0; 30]), Granularity::Daily, 0.03);
        assert_eq!(derived.summary.sharpe_ratio, 0.0);
        assert_eq!(derived.summary.sortino_ratio, 0.0);
        assert!(derived.points.iter().all(|p| p.sharpe_ratio == 0.0));
        assert!(derived.points.iter().all(|p| p.volatility == 0.0));
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        let logs = [0.0, 0.1, -0.3, 0.1, 0.25];
        let (cum, dd) = drawdown_curve(&logs);
        assert_relative_eq!(cum[4], 0.15, epsilon = 1e-12);
        assert_relative_eq!(dd[2], -0.3, epsilon = 1e-12);
        assert_relative_eq!(dd[3], -0.2, epsilon = 1e-12);
        assert_relative_eq!(dd[4], 0.0, epsilon = 1e-12);
        assert_relative_eq!(max_drawdown(&dd), -0.3, epsilon = 1e-12);
    }

    #[test]
    fn short_series_is_all_sentinels() {
        let derived = compute_metrics(&make_series(&[100.0]), Granularity::Daily, 0.03);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived.summary, SeriesSummary::default());
        let p = &derived.points[0];
        assert_eq!((p.volatility, p.drawdown, p.sharpe_ratio), (0.0, 0.0, 0.0));
    }

    #[test]
    fn empty_series_yields_empty_derived() {
        let derived = compute_metrics(&TimeSeries::empty(), Granularity::Weekly, 0.03);
        assert!(derived.is_empty());
        assert_eq!(derived.granularity, Granularity::Weekly);
    }

    #[test]
    fn daily_volatility_uses_bounded_window() {
        // intraday returns alternate +1% / -1%
        let bars: Vec<PriceBar> = (0..25)
            .map(|i| {
                let (open, close) = if i % 2 == 0 { (100.0, 101.0) } else { (101.0, 99.99) };
                PriceBar::new(
                    start() + Duration::days(i),
                    open,
                    open.max(close),
                    open.min(close),
                    close,
                )
                .unwrap()
            })
            .collect();
        let series = TimeSeries::from_bars(bars);
        let derived = compute_metrics(&series, Granularity::Daily, 0.03);

        let rets: Vec<f64> = series.bars().iter().map(|b| b.intraday_return()).collect();
        let expected_last =
            sample_stddev(&rets[5..25]).unwrap() * 252.0_f64.sqrt() * 100.0;
        assert_relative_eq!(derived.points[24].volatility, expected_last, epsilon = 1e-9);

        // two observations at index 1: window is bounded by what exists
        let expected_second = sample_stddev(&rets[0..2]).unwrap() * 252.0_f64.sqrt() * 100.0;
        assert_relative_eq!(derived.points[1].volatility, expected_second, epsilon = 1e-9);
        assert_eq!(derived.points[0].volatility, 0.0);
    }

    #[test]
    fn realtime_volatility_caps_minutes() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + (i % 3) as f64).collect();
        let bars = make_bars(&closes, Duration::minutes(5));
        let logs = log_returns(&bars);
        let sd = sample_stddev(&logs[1..]).unwrap();
        // 99 * 5 = 495 elapsed minutes, capped at 390
        assert_relative_eq!(
            realtime_volatility(&bars),
            sd * 390.0_f64.sqrt() * 100.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn realtime_volatility_uses_elapsed_minutes() {
        let bars = make_bars(&[100.0, 101.0, 100.5], Duration::minutes(10));
        let logs = log_returns(&bars);
        let sd = sample_stddev(&logs[1..]).unwrap();
        assert_relative_eq!(
            realtime_volatility(&bars),
            sd * 20.0_f64.sqrt() * 100.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn realtime_summary_matches_last_point() {
        let bars = make_bars(&[100.0, 101.0, 100.5, 102.0], Duration::minutes(5));
        let derived = compute_metrics(&TimeSeries::from_bars(bars.clone()), Granularity::Realtime, 0.03);
        assert_eq!(derived.summary.volatility, derived.points[3].volatility);
        assert_relative_eq!(derived.summary.volatility, realtime_volatility(&bars), epsilon = 1e-12);
    }

    #[test]
    fn summary_ratios_use_trailing_window() {
        let closes: Vec<f64> = (0..12).map(|i| 100.0 * (1.0 + 0.01 * ((i * 7 % 5) as f64 - 2.0))).collect();
        let series = make_series(&closes);
        let derived = compute_metrics(&series, Granularity::Monthly, 0.0);

        let logs = log_returns(series.bars());
        let trailing = &logs[logs.len() - 6..];
        assert_relative_eq!(derived.summary.sharpe_ratio, sharpe_ratio(trailing), epsilon = 1e-12);
        assert_relative_eq!(derived.summary.sortino_ratio, sortino_ratio(trailing), epsilon = 1e-12);
        assert_relative_eq!(derived.summary.sharpe_ratio, derived.points[11].sharpe_ratio, epsilon = 1e-12);
    }

    #[test]
    fn rising_series_has_positive_sharpe_and_no_drawdown() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 * (1.0 + 0.001 * (i * i) as f64)).collect();
        let derived = compute_metrics(&make_series(&closes), Granularity::Daily, 0.0);
        assert!(derived.summary.sharpe_ratio > 0.0);
        assert_eq!(derived.summary.max_drawdown, 0.0);
        assert!(derived.summary.cumulative_return > 0.0);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn granularity() -> impl Strategy<Value = Granularity> {
            prop::sample::select(Granularity::ALL.to_vec())
        }

        proptest! {
            #[test]
            fn drawdown_never_positive(
                closes in prop::collection::vec(1.0f64..1000.0, 1..80),
                g in granularity(),
            ) {
                let derived = compute_metrics(&make_series(&closes), g, 0.03);
                for p in &derived.points {
                    prop_assert!(p.drawdown <= 0.0);
                }
                prop_assert!(derived.summary.max_drawdown <= 0.0);
            }

            #[test]
            fn volatility_never_negative(
                closes in prop::collection::vec(1.0f64..1000.0, 1..80),
                g in granularity(),
            ) {
                let derived = compute_metrics(&make_series(&closes), g, 0.03);
                for p in &derived.points {
                    prop_assert!(p.volatility >= 0.0);
                    prop_assert!(p.volatility.is_finite());
                }
            }
        }
    }
}
