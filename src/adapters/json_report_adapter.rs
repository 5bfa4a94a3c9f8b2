//! Finalized daily report kept as a single JSON file.

use crate::domain::error::PricedashError;
use crate::domain::report::ReportSnapshot;
use crate::ports::report_store_port::ReportStorePort;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct JsonReportAdapter {
    path: PathBuf,
}

impl JsonReportAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ReportStorePort for JsonReportAdapter {
    fn save(&self, report: &ReportSnapshot) -> Result<(), PricedashError> {
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| PricedashError::archive(format!("failed to encode report: {e}")))?;

        // Write beside the target and rename so readers never see a partial file.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|e| {
            PricedashError::archive(format!("failed to write {}: {}", staging.display(), e))
        })?;
        fs::rename(&staging, &self.path).map_err(|e| {
            PricedashError::archive(format!("failed to replace {}: {}", self.path.display(), e))
        })
    }

    fn latest(&self) -> Result<Option<ReportSnapshot>, PricedashError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PricedashError::unavailable(
                    "previous report",
                    format!("failed to read {}: {}", self.path.display(), e),
                ));
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| PricedashError::unavailable("previous report", format!("corrupt file: {e}")))
    }
}
