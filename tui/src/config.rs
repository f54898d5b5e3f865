//! Command line and layered configuration
//!
//! Built-in defaults, then a TOML file, then `MICSCOPE_*` environment
//! variables, then command line flags. Values are clamped, never rejected.

use anyhow::{Context, Result};
use clap::Parser;
use micscope_core::audio::DeviceSelector;
use micscope_core::filters::DenoiseMode;
use micscope_core::spectrum::DbRange;
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf};

use crate::theme::{BarColoring, ThemeKind};
use crate::view::PlotMode;

const DEFAULT_SPECTRUM_RANGE: DbRange = DbRange::new(-200.0, 200.0);

/// Live microphone spectrum and spectrogram in the terminal
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "micscope", version)]
pub struct Cli {
    /// Print audio input devices and exit
    #[arg(long = "list-devices", default_value_t = false)]
    pub list_devices: bool,

    /// Input device: index from --list-devices, or part of its name
    #[arg(long)]
    pub device: Option<DeviceSelector>,

    /// Analysis sample rate in Hz
    #[arg(long)]
    pub rate: Option<u32>,

    /// Samples per analysed chunk (power of two)
    #[arg(long)]
    pub chunk: Option<usize>,

    /// Initial plot: spectrum or spectrogram
    #[arg(long)]
    pub mode: Option<PlotMode>,

    /// Denoiser: off, gate or spectral
    #[arg(long)]
    pub denoise: Option<DenoiseMode>,

    /// Theme: light, dark or cycle
    #[arg(long)]
    pub theme: Option<ThemeKind>,

    /// Redraw interval in milliseconds
    #[arg(long = "frame-ms")]
    pub frame_ms: Option<u64>,

    /// Directory for saved plots
    #[arg(long = "export-dir")]
    pub export_dir: Option<PathBuf>,

    /// Config file (defaults to <config dir>/micscope.toml)
    #[arg(long, env = "MICSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long = "log-level", env = "MICSCOPE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Disable the log file
    #[arg(long = "no-logs", env = "MICSCOPE_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Write logs as JSON lines
    #[arg(long = "json-logs", default_value_t = false)]
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub device: DeviceSelector,
    pub sample_rate: u32,
    pub chunk_size: usize,
    pub mode: PlotMode,
    pub denoise: DenoiseMode,
    pub theme: ThemeKind,
    /// Overrides the theme's own bar colouring
    pub bar_coloring: Option<BarColoring>,
    pub frame_ms: u64,
    pub export_dir: PathBuf,

    pub nperseg: usize,
    pub noverlap: usize,

    /// Clamp applied to spectrum magnitudes and the spectrum y-axis
    pub spectrum_range: DbRange,
    /// Fixed spectrogram colour range; `None` autoscales to the history
    pub spectrogram_range: Option<DbRange>,
    /// Spectrogram columns kept for display
    pub history_columns: usize,

    pub gate_threshold_db: f64,
}

impl Config {
    pub fn defaults() -> Self {
        Self {
            device: DeviceSelector::Default,
            sample_rate: 48_000,
            chunk_size: 1024,
            mode: PlotMode::Spectrum,
            denoise: DenoiseMode::Off,
            theme: ThemeKind::Light,
            bar_coloring: None,
            frame_ms: 30,
            export_dir: PathBuf::from("."),
            nperseg: 512,
            noverlap: 256,
            spectrum_range: DEFAULT_SPECTRUM_RANGE,
            spectrogram_range: None,
            history_columns: 600,
            gate_threshold_db: -40.0,
        }
    }

    pub fn load(cli: &Cli) -> Result<Self> {
        let file = load_file_config(cli.config.as_deref())?;
        Ok(Self::layered(file, |name| env::var(name).ok(), cli))
    }

    /// Apply every layer over the defaults and sanitize
    fn layered(
        file: Option<FileConfig>,
        env_lookup: impl Fn(&str) -> Option<String>,
        cli: &Cli,
    ) -> Self {
        let mut cfg = Self::defaults();

        if let Some(fc) = file {
            cfg.apply_file(fc);
        }
        cfg.apply_env(env_lookup);
        cfg.apply_cli(cli);
        cfg.sanitize();
        cfg
    }

    fn apply_file(&mut self, fc: FileConfig) {
        if let Some(v) = fc.device.as_deref().and_then(parse_or_warn) {
            self.device = v;
        }
        if let Some(v) = fc.sample_rate {
            self.sample_rate = v;
        }
        if let Some(v) = fc.chunk_size {
            self.chunk_size = v;
        }
        if let Some(v) = fc.mode.as_deref().and_then(parse_or_warn) {
            self.mode = v;
        }
        if let Some(v) = fc.denoise.as_deref().and_then(parse_or_warn) {
            self.denoise = v;
        }
        if let Some(v) = fc.theme.as_deref().and_then(parse_or_warn) {
            self.theme = v;
        }
        if let Some(v) = fc.bar_coloring.as_deref().and_then(parse_or_warn) {
            self.bar_coloring = Some(v);
        }
        if let Some(v) = fc.frame_ms {
            self.frame_ms = v;
        }
        if let Some(v) = fc.export_dir {
            self.export_dir = v;
        }
        if let Some(v) = fc.nperseg {
            self.nperseg = v;
        }
        if let Some(v) = fc.noverlap {
            self.noverlap = v;
        }
        if let Some(v) = fc.db_floor {
            self.spectrum_range.floor = v;
        }
        if let Some(v) = fc.db_ceil {
            self.spectrum_range.ceil = v;
        }
        if let (Some(floor), Some(ceil)) = (fc.spectrogram_floor, fc.spectrogram_ceil) {
            self.spectrogram_range = Some(DbRange::new(floor, ceil));
        }
        if let Some(v) = fc.history_columns {
            self.history_columns = v;
        }
        if let Some(v) = fc.gate_threshold_db {
            self.gate_threshold_db = v;
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env_parse(&lookup, "MICSCOPE_DEVICE") {
            self.device = v;
        }
        if let Some(v) = env_parse(&lookup, "MICSCOPE_RATE") {
            self.sample_rate = v;
        }
        if let Some(v) = env_parse(&lookup, "MICSCOPE_CHUNK") {
            self.chunk_size = v;
        }
        if let Some(v) = env_parse(&lookup, "MICSCOPE_MODE") {
            self.mode = v;
        }
        if let Some(v) = env_parse(&lookup, "MICSCOPE_DENOISE") {
            self.denoise = v;
        }
        if let Some(v) = env_parse(&lookup, "MICSCOPE_THEME") {
            self.theme = v;
        }
        if let Some(v) = env_parse(&lookup, "MICSCOPE_BAR_COLORING") {
            self.bar_coloring = Some(v);
        }
        if let Some(v) = env_parse(&lookup, "MICSCOPE_FRAME_MS") {
            self.frame_ms = v;
        }
        if let Some(v) = lookup("MICSCOPE_EXPORT_DIR") {
            self.export_dir = PathBuf::from(v);
        }
        if let Some(v) = env_parse(&lookup, "MICSCOPE_NPERSEG") {
            self.nperseg = v;
        }
        if let Some(v) = env_parse(&lookup, "MICSCOPE_NOVERLAP") {
            self.noverlap = v;
        }
        if let Some(v) = env_parse(&lookup, "MICSCOPE_DB_FLOOR") {
            self.spectrum_range.floor = v;
        }
        if let Some(v) = env_parse(&lookup, "MICSCOPE_DB_CEIL") {
            self.spectrum_range.ceil = v;
        }
        if let Some(v) = env_parse(&lookup, "MICSCOPE_HISTORY_COLUMNS") {
            self.history_columns = v;
        }
        if let Some(v) = env_parse(&lookup, "MICSCOPE_GATE_DB") {
            self.gate_threshold_db = v;
        }
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(v) = &cli.device {
            self.device = v.clone();
        }
        if let Some(v) = cli.rate {
            self.sample_rate = v;
        }
        if let Some(v) = cli.chunk {
            self.chunk_size = v;
        }
        if let Some(v) = cli.mode {
            self.mode = v;
        }
        if let Some(v) = cli.denoise {
            self.denoise = v;
        }
        if let Some(v) = cli.theme {
            self.theme = v;
        }
        if let Some(v) = cli.frame_ms {
            self.frame_ms = v;
        }
        if let Some(v) = &cli.export_dir {
            self.export_dir = v.clone();
        }
    }

    fn sanitize(&mut self) {
        // clamp instead of failing
        self.chunk_size = self.chunk_size.clamp(256, 8192).next_power_of_two().min(8192);
        self.sample_rate = self.sample_rate.clamp(8_000, 192_000);
        self.frame_ms = self.frame_ms.clamp(8, 200);

        self.nperseg = self.nperseg.clamp(16, self.chunk_size);
        if self.noverlap >= self.nperseg {
            self.noverlap = self.nperseg / 2;
        }

        if !self.spectrum_range.is_valid() {
            self.spectrum_range = DEFAULT_SPECTRUM_RANGE;
        }
        if self.spectrogram_range.is_some_and(|r| !r.is_valid()) {
            self.spectrogram_range = None;
        }

        self.history_columns = self.history_columns.clamp(16, 4096);
        self.gate_threshold_db = self.gate_threshold_db.clamp(-120.0, 0.0);
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    device: Option<String>,
    sample_rate: Option<u32>,
    chunk_size: Option<usize>,
    mode: Option<String>,
    denoise: Option<String>,
    theme: Option<String>,
    bar_coloring: Option<String>,
    frame_ms: Option<u64>,
    export_dir: Option<PathBuf>,
    nperseg: Option<usize>,
    noverlap: Option<usize>,
    db_floor: Option<f64>,
    db_ceil: Option<f64>,
    spectrogram_floor: Option<f64>,
    spectrogram_ceil: Option<f64>,
    history_columns: Option<usize>,
    gate_threshold_db: Option<f64>,
}

fn env_parse<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name).and_then(|v| parse_or_warn(&v))
}

fn parse_or_warn<T>(raw: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(value = raw, error = %err, "ignoring invalid config value");
            None
        }
    }
}

/// Explicit path (flag or `MICSCOPE_CONFIG`) must exist; the default location
/// is optional
fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("config file does not exist: {}", path.display());
        }
        return Ok(Some(read_toml(path)?));
    }

    let Some(dir) = dirs::config_dir() else {
        return Ok(None);
    };
    let path = dir.join("micscope.toml");
    if path.exists() {
        return Ok(Some(read_toml(&path)?));
    }

    Ok(None)
}

fn read_toml(path: &Path) -> Result<FileConfig> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<FileConfig>(&s)
        .with_context(|| format!("invalid TOML in {}", path.display()))
}
