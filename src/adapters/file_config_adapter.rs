//! INI file configuration adapter.
//!
//! Sections read by [`Settings`](crate::domain::settings::Settings):
//! `[feed] path`, `[archive] backend/path/report_path`,
//! `[session] close/cutoff_hour/reporting_weekday` and
//! `[metrics] risk_free_rate`. Values are trimmed; a numeric key that fails to
//! parse falls back to its default with a warning.

use crate::domain::error::PricedashError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;
use std::str::FromStr;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PricedashError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| PricedashError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parsed_or<T: FromStr + Copy>(&self, section: &str, key: &str, default: T) -> T {
        let Some(raw) = self.get_string(section, key) else {
            return default;
        };
        raw.parse().unwrap_or_else(|_| {
            tracing::warn!(section, key, value = %raw, "unparseable config value, using default");
            default
        })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|value| value.trim().to_string())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.parsed_or(section, key, default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.parsed_or(section, key, default)
    }
}
