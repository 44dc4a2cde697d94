#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal progress and logging for the `lowe` binary.
//!
//! [`FetchProgress`] draws one bar per fan-out fetch, [`DownloadProgress`]
//! one bar per dictionary download run. [`init_logger`] routes `log`
//! output through `indicatif-log-bridge` so log lines don't tear either.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use lowe_acs::progress::ProgressCallback;

pub use indicatif::MultiProgress;

const FETCH_TEMPLATE: &str =
    "{prefix:.bold} {wide_bar:.cyan/dim} {pos}/{len} cells [{eta}] {msg:.dim}";

const DOWNLOAD_TEMPLATE: &str =
    "dictionaries {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}] {msg}";

/// Bar for [`lowe_acs::AcsClient::fetch_table_with_progress`].
///
/// Spins while locations resolve. Once the cell count is known the prefix
/// shows the request (`S1701,S2801 2015-2019`) and the message the last
/// cell to come back.
pub struct FetchProgress {
    bar: ProgressBar,
}

impl FetchProgress {
    /// Adds a spinner to `multi`; it becomes a bar on `set_total`.
    #[must_use]
    pub fn attach(multi: &MultiProgress) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Resolving locations...");
        Arc::new(Self { bar })
    }
}

impl ProgressCallback for FetchProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(
            ProgressStyle::with_template(FETCH_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        self.bar.set_message("");
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_prefix(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }

    fn cell_finished(&self, variable: &str, year: u16, location: &str) {
        self.bar.set_message(format!("{variable} {year} {location}"));
        self.bar.inc(1);
    }
}

/// Bar for `lowe dict download`: one step per (year, kind) dictionary.
pub struct DownloadProgress {
    bar: ProgressBar,
}

impl DownloadProgress {
    /// Adds a bar of `dictionaries` steps to `multi`.
    #[must_use]
    pub fn attach(multi: &MultiProgress, dictionaries: u64) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new(dictionaries));
        bar.set_style(
            ProgressStyle::with_template(DOWNLOAD_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        Arc::new(Self { bar })
    }
}

impl ProgressCallback for DownloadProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Installs `pretty_env_logger` (filtered by `RUST_LOG`) behind
/// `indicatif-log-bridge` and returns the [`MultiProgress`] every bar must
/// be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();
    log::set_max_level(level);

    multi
}
