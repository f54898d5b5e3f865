//! File logging; the terminal itself belongs to the UI

use crate::config::Cli;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<Option<PathBuf>> = OnceLock::new();

pub fn log_path() -> PathBuf {
    env::var("MICSCOPE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("micscope.log"))
}

/// Unknown names fall back to `info`
pub fn parse_level(name: &str) -> LevelFilter {
    name.trim().parse::<LevelFilter>().unwrap_or(LevelFilter::INFO)
}

/// Install the global subscriber once; returns the log file in use
pub fn init_tracing(cli: &Cli) -> Option<PathBuf> {
    if cli.no_logs {
        return None;
    }

    TRACING_INIT
        .get_or_init(|| {
            let path = log_path();
            let file = OpenOptions::new().create(true).append(true).open(&path).ok()?;
            let level = parse_level(&cli.log_level);

            let installed = if cli.json_logs {
                let subscriber = tracing_subscriber::fmt()
                    .json()
                    .with_timer(UtcTime::rfc_3339())
                    .with_max_level(level)
                    .with_writer(Mutex::new(file))
                    .with_current_span(false)
                    .with_span_list(false)
                    .finish();
                tracing::subscriber::set_global_default(subscriber)
            } else {
                let subscriber = tracing_subscriber::fmt()
                    .with_timer(UtcTime::rfc_3339())
                    .with_max_level(level)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .finish();
                tracing::subscriber::set_global_default(subscriber)
            };

            installed.ok().map(|_| path)
        })
        .clone()
}
