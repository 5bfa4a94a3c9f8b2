//! Scheduler-facing entry points.
//!
//! Each call recomputes from the current feed and archive contents; nothing
//! is cached between ticks.

use crate::domain::archive::{run_archive, Archive, ArchiveDecision};
use crate::domain::error::PricedashError;
use crate::domain::granularity::Granularity;
use crate::domain::loader::load_or_empty;
use crate::domain::metrics::{compute_metrics, DerivedSeries};
use crate::domain::report::{build_report, PreviousReport, ReportSettings, ReportSnapshot};
use crate::domain::resample::resample_metrics;
use crate::domain::time_series::TimeSeries;
use crate::ports::archive_port::ArchivePort;
use crate::ports::clock_port::Clock;
use crate::ports::feed_port::FeedPort;
use crate::ports::report_store_port::ReportStorePort;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecomputeParams {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub granularity: Granularity,
}

impl RecomputeParams {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            start: None,
            end: None,
            granularity,
        }
    }

    fn has_range(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recomputation {
    pub report: ReportSnapshot,
    pub derived: DerivedSeries,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecomputeOutcome {
    NoData,
    Ready(Recomputation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// `None` when the archive step failed; the failure is logged.
    pub archive: Option<ArchiveDecision>,
    pub recompute: RecomputeOutcome,
}

pub struct Engine<'a> {
    feed: &'a dyn FeedPort,
    archive: &'a dyn ArchivePort,
    clock: &'a dyn Clock,
    reports: Option<&'a dyn ReportStorePort>,
    settings: ReportSettings,
}

impl<'a> Engine<'a> {
    pub fn new(
        feed: &'a dyn FeedPort,
        archive: &'a dyn ArchivePort,
        clock: &'a dyn Clock,
        settings: ReportSettings,
    ) -> Self {
        Self {
            feed,
            archive,
            clock,
            reports: None,
            settings,
        }
    }

    /// Keeps the report finalized at each archive cutoff in `reports`.
    pub fn with_report_store(mut self, reports: &'a dyn ReportStorePort) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Archive-if-due followed by a recompute, both at the clock's current time.
    pub fn tick(&self, params: &RecomputeParams) -> TickOutcome {
        let now = self.clock.now();
        let intraday = load_or_empty(self.feed);

        let archive = match run_archive(now, &intraday, self.archive, self.settings.cutoff_hour) {
            Ok(decision) => {
                self.persist_report(now, &intraday, &decision);
                Some(decision)
            }
            Err(e) => {
                tracing::error!(error = %e, "archive step failed");
                None
            }
        };

        TickOutcome {
            archive,
            recompute: self.recompute_from(now, &intraday, params),
        }
    }

    /// Archive step alone, at the clock's current time.
    pub fn archive_now(&self) -> Result<ArchiveDecision, PricedashError> {
        let now = self.clock.now();
        let intraday = load_or_empty(self.feed);
        let decision = run_archive(now, &intraday, self.archive, self.settings.cutoff_hour)?;
        self.persist_report(now, &intraday, &decision);
        Ok(decision)
    }

    /// The report saved at the most recent cutoff that appended a record.
    pub fn previous_report(&self) -> PreviousReport {
        let Some(reports) = self.reports else {
            return PreviousReport::Missing;
        };
        match reports.latest() {
            Ok(Some(report)) => PreviousReport::Available(report),
            Ok(None) => PreviousReport::Missing,
            Err(e) => {
                tracing::warn!(error = %e, "previous report unreadable");
                PreviousReport::Missing
            }
        }
    }

    pub fn recompute(&self, now: NaiveDateTime, params: &RecomputeParams) -> RecomputeOutcome {
        let intraday = load_or_empty(self.feed);
        self.recompute_from(now, &intraday, params)
    }

    // Only a fresh append finalizes a day; a failed save leaves the archive as written.
    fn persist_report(&self, now: NaiveDateTime, intraday: &TimeSeries, decision: &ArchiveDecision) {
        let (Some(reports), ArchiveDecision::Append(record)) = (self.reports, decision) else {
            return;
        };
        let report = build_report(&intraday.on_date(record.date), now, &self.settings);
        match reports.save(&report) {
            Ok(()) => tracing::info!(date = %record.date, "saved finalized report"),
            Err(e) => tracing::error!(error = %e, date = %record.date, "failed to save finalized report"),
        }
    }

    fn load_archive(&self) -> TimeSeries {
        match self.archive.read_records() {
            Ok(records) => Archive::from_records(records).to_series(),
            Err(e) => {
                tracing::warn!(error = %e, "archive unavailable, continuing with no history");
                TimeSeries::empty()
            }
        }
    }

    fn recompute_from(
        &self,
        now: NaiveDateTime,
        intraday: &TimeSeries,
        params: &RecomputeParams,
    ) -> RecomputeOutcome {
        let rf = self.settings.risk_free_rate;

        let derived = match params.granularity {
            Granularity::Realtime => {
                let chart = if params.has_range() {
                    intraday.between(params.start, params.end)
                } else {
                    intraday.last_session()
                };
                compute_metrics(&chart, Granularity::Realtime, rf)
            }
            granularity => {
                let history = self.load_archive().between(params.start, params.end);
                resample_metrics(&history, granularity, rf)
            }
        };

        if derived.is_empty() {
            tracing::info!(granularity = %params.granularity, "no data for selection");
            return RecomputeOutcome::NoData;
        }

        let report = build_report(&intraday.last_session(), now, &self.settings);
        RecomputeOutcome::Ready(Recomputation { report, derived })
    }
}
