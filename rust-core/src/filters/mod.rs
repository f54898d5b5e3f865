//! Window functions and per-chunk denoisers

pub mod spectral_gate;
pub mod windows;

pub use spectral_gate::{SpectralGate, SpectralGateConfig};
pub use windows::{generate_periodic_window, generate_window, WindowType};

use crate::audio::gate::{GateParams, NoiseGate};
use std::fmt;
use std::str::FromStr;

/// Which denoiser runs before the transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DenoiseMode {
    #[default]
    Off,
    /// Time-domain RMS gate
    Gate,
    /// Spectral gating
    Spectral,
}

impl DenoiseMode {
    pub fn name(&self) -> &'static str {
        match self {
            DenoiseMode::Off => "off",
            DenoiseMode::Gate => "gate",
            DenoiseMode::Spectral => "spectral",
        }
    }

    /// Next mode in display order, wrapping around
    pub fn cycle(self) -> Self {
        match self {
            DenoiseMode::Off => DenoiseMode::Gate,
            DenoiseMode::Gate => DenoiseMode::Spectral,
            DenoiseMode::Spectral => DenoiseMode::Off,
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            DenoiseMode::Off => 0,
            DenoiseMode::Gate => 1,
            DenoiseMode::Spectral => 2,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => DenoiseMode::Gate,
            2 => DenoiseMode::Spectral,
            _ => DenoiseMode::Off,
        }
    }
}

impl fmt::Display for DenoiseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DenoiseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(DenoiseMode::Off),
            "gate" => Ok(DenoiseMode::Gate),
            "spectral" => Ok(DenoiseMode::Spectral),
            other => Err(format!("unknown denoise mode: {other}")),
        }
    }
}

/// Chunk-level denoiser with in-place processing
pub trait Denoiser: Send {
    fn process_block_inplace(&mut self, buffer: &mut [f64]);
    fn reset(&mut self);
}

impl Denoiser for NoiseGate {
    fn process_block_inplace(&mut self, buffer: &mut [f64]) {
        NoiseGate::process_block_inplace(self, buffer)
    }

    fn reset(&mut self) {
        NoiseGate::reset(self)
    }
}

impl Denoiser for SpectralGate {
    fn process_block_inplace(&mut self, buffer: &mut [f64]) {
        SpectralGate::process_block_inplace(self, buffer)
    }

    fn reset(&mut self) {
        SpectralGate::reset(self)
    }
}

/// Build the denoiser for `mode`, or `None` when denoising is off
pub fn build_denoiser(
    mode: DenoiseMode,
    sample_rate: f64,
    gate: GateParams,
    spectral: &SpectralGateConfig,
) -> Option<Box<dyn Denoiser>> {
    match mode {
        DenoiseMode::Off => None,
        DenoiseMode::Gate => Some(Box::new(NoiseGate::new(gate, sample_rate))),
        DenoiseMode::Spectral => Some(Box::new(SpectralGate::new(SpectralGateConfig {
            sample_rate,
            ..spectral.clone()
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse_and_cycle() {
        assert_eq!("Spectral".parse::<DenoiseMode>(), Ok(DenoiseMode::Spectral));
        assert_eq!("none".parse::<DenoiseMode>(), Ok(DenoiseMode::Off));
        assert!("wiener".parse::<DenoiseMode>().is_err());

        let mut mode = DenoiseMode::Off;
        for _ in 0..3 {
            mode = mode.cycle();
        }
        assert_eq!(mode, DenoiseMode::Off);
    }

    #[test]
    fn test_mode_u8_roundtrip() {
        for mode in [DenoiseMode::Off, DenoiseMode::Gate, DenoiseMode::Spectral] {
            assert_eq!(DenoiseMode::from_u8(mode.to_u8()), mode);
        }
    }

    #[test]
    fn test_build_denoiser() {
        let spectral = SpectralGateConfig::default();
        assert!(build_denoiser(DenoiseMode::Off, 48000.0, GateParams::default(), &spectral).is_none());

        let mut gate = build_denoiser(DenoiseMode::Gate, 48000.0, GateParams::default(), &spectral).unwrap();
        let mut silent = vec![0.0; 256];
        gate.process_block_inplace(&mut silent);
        assert!(silent.iter().all(|&v| v == 0.0));

        let mut spectral_gate =
            build_denoiser(DenoiseMode::Spectral, 44100.0, GateParams::default(), &spectral).unwrap();
        let mut buf = vec![0.0; 1024];
        spectral_gate.process_block_inplace(&mut buf);
        spectral_gate.reset();
    }
}
