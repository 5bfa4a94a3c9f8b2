//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for pricedash.
#[derive(Debug, thiserror::Error)]
pub enum PricedashError {
    #[error("data quality: {reason}")]
    DataQuality { reason: String },

    #[error("{source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("insufficient data: have {bars} bars, need {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("{metric} is not a finite number")]
    NonFinite { metric: String },

    #[error("archive already holds a record for {date}")]
    ArchiveConflict { date: NaiveDate },

    #[error("archive error: {reason}")]
    Archive { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PricedashError {
    pub(crate) fn data_quality(reason: impl Into<String>) -> Self {
        Self::DataQuality {
            reason: reason.into(),
        }
    }

    pub(crate) fn unavailable(source_name: &str, reason: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn archive(reason: impl std::fmt::Display) -> Self {
        Self::Archive {
            reason: reason.to_string(),
        }
    }
}

impl From<&PricedashError> for std::process::ExitCode {
    fn from(err: &PricedashError) -> Self {
        let code: u8 = match err {
            PricedashError::Io(_) => 1,
            PricedashError::ConfigParse { .. }
            | PricedashError::ConfigMissing { .. }
            | PricedashError::ConfigInvalid { .. } => 2,
            PricedashError::Archive { .. } | PricedashError::ArchiveConflict { .. } => 3,
            PricedashError::DataQuality { .. }
            | PricedashError::SourceUnavailable { .. }
            | PricedashError::InsufficientData { .. }
            | PricedashError::NonFinite { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
