//! Core domain types and logic.

pub mod price_bar;
pub mod time_series;
pub mod granularity;
pub mod stats;
pub mod loader;
pub mod metrics;
pub mod resample;
pub mod archive;
pub mod report;
pub mod settings;
pub mod engine;
pub mod error;
