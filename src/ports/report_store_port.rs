//! Storage port for the report finalized at each archive cutoff.

use crate::domain::error::PricedashError;
use crate::domain::report::ReportSnapshot;

pub trait ReportStorePort {
    /// Replaces the stored report.
    fn save(&self, report: &ReportSnapshot) -> Result<(), PricedashError>;

    /// The most recently saved report, or `None` if nothing was ever saved.
    fn latest(&self) -> Result<Option<ReportSnapshot>, PricedashError>;
}
