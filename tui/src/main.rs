//! micscope: live microphone spectrum and spectrogram in the terminal

mod app;
mod config;
mod export;
mod render;
mod telemetry;
mod terminal;
mod theme;
mod view;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{Cli, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = telemetry::init_tracing(&cli);

    if cli.list_devices {
        return list_devices();
    }

    let config = Config::load(&cli).context("failed to load configuration")?;
    tracing::info!(
        device = %config.device,
        sample_rate = config.sample_rate,
        chunk_size = config.chunk_size,
        mode = %config.mode,
        denoise = %config.denoise,
        log = ?log_path,
        "starting"
    );

    app::run(config)
}

fn list_devices() -> Result<()> {
    let devices =
        micscope_core::audio::list_input_devices().context("failed to enumerate devices")?;
    if devices.is_empty() {
        println!("no input devices found");
        return Ok(());
    }
    for device in devices {
        println!(
            "{:>3}  {}  ({} Hz, {} ch)",
            device.index, device.name, device.sample_rate, device.channels
        );
    }
    Ok(())
}
