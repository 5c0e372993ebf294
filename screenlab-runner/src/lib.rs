//! screenlab runner — screen orchestration and reporting.
//!
//! This crate builds on `screenlab-core` to provide:
//! - Runner configuration (`[run]` settings plus core thresholds)
//! - Price history loading with cache/download/synthetic fallback
//! - Screen runs producing a fingerprinted `ScreenReport`
//! - README, JSON and CSV output

pub mod config;
pub mod data_loader;
pub mod report;
pub mod screen;

pub use config::{RunSettings, RunnerConfig};
pub use data_loader::{load_history, LoadError, LoadOptions, LoadedData};
pub use report::{update_readme, write_artifacts, ReportError, ReportPaths};
pub use screen::{run_screen, screen_loaded, RunError, ScreenReport, ScreenSession, SCHEMA_VERSION};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunnerConfig>();
        assert_sync::<RunnerConfig>();
        assert_send::<LoadOptions>();
        assert_sync::<LoadOptions>();
    }

    #[test]
    fn screen_report_is_send_sync() {
        assert_send::<ScreenReport>();
        assert_sync::<ScreenReport>();
    }

    #[test]
    fn loaded_data_is_send_sync() {
        assert_send::<LoadedData>();
        assert_sync::<LoadedData>();
    }
}
