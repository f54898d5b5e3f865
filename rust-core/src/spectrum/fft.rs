//! FFT engine using realfft for real-valued signals
//!
//! Optimized for real-time spectral analysis

use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpectrumError {
    #[error("FFT processing failed: {0}")]
    Fft(String),

    #[error("Invalid FFT size {0}: must be at least 2")]
    InvalidSize(usize),
}

/// FFT engine for real-valued signals
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    /// Real FFT processor
    r2c: Arc<dyn RealToComplex<f64>>,

    /// Reusable input buffer
    input_buffer: Vec<f64>,

    /// Reusable output buffer (complex spectrum)
    output_buffer: Vec<Complex<f64>>,

    /// Scratch space for the FFT processor
    scratch: Vec<Complex<f64>>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - FFT size (number of samples)
    pub fn new(fft_size: usize) -> Result<Self, SpectrumError> {
        if fft_size < 2 {
            return Err(SpectrumError::InvalidSize(fft_size));
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);

        let input_buffer = r2c.make_input_vec();
        let output_buffer = r2c.make_output_vec();
        let scratch = r2c.make_scratch_vec();

        Ok(Self {
            fft_size,
            r2c,
            input_buffer,
            output_buffer,
            scratch,
        })
    }

    /// Compute FFT and return the complex spectrum for k = 0..=fft_size/2
    ///
    /// The signal is zero-padded if shorter than `fft_size` and truncated if
    /// longer. The returned slice is owned by the engine and is overwritten
    /// by the next call.
    pub fn compute_complex(&mut self, signal: &[f64]) -> Result<&[Complex<f64>], SpectrumError> {
        let copy_len = signal.len().min(self.fft_size);
        self.input_buffer[..copy_len].copy_from_slice(&signal[..copy_len]);
        self.input_buffer[copy_len..].fill(0.0);

        self.r2c
            .process_with_scratch(&mut self.input_buffer, &mut self.output_buffer, &mut self.scratch)
            .map_err(|e| SpectrumError::Fft(e.to_string()))?;

        Ok(&self.output_buffer)
    }

    /// Compute FFT and return magnitude spectrum |X[k]| for k = 0..=fft_size/2
    pub fn compute_magnitude(&mut self, signal: &[f64]) -> Result<Vec<f64>, SpectrumError> {
        let spectrum = self.compute_complex(signal)?;
        Ok(spectrum.iter().map(|c| c.norm()).collect())
    }

    /// Compute power spectrum |X[k]|²
    pub fn compute_power(&mut self, signal: &[f64]) -> Result<Vec<f64>, SpectrumError> {
        let spectrum = self.compute_complex(signal)?;
        Ok(spectrum.iter().map(|c| c.norm_sqr()).collect())
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Get number of frequency bins (fft_size/2 + 1 for real FFT)
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Convert bin index to normalized frequency (units of π rad/sample)
    pub fn bin_to_frequency(&self, bin: usize) -> f64 {
        2.0 * bin as f64 / self.fft_size as f64
    }

    /// Convert bin index to Hz at the given sample rate
    pub fn bin_to_hz(&self, bin: usize, sample_rate: f64) -> f64 {
        bin as f64 * sample_rate / self.fft_size as f64
    }

    /// Get frequency axis in normalized units (0 to 1, where 1 = π rad/sample)
    pub fn frequency_axis(&self) -> Vec<f64> {
        (0..self.num_bins())
            .map(|bin| self.bin_to_frequency(bin))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_fft_dc_signal() {
        let mut fft = FftEngine::new(1024).unwrap();

        // DC signal shorter than the FFT: zero-padded
        let signal = vec![1.0; 100];
        let spectrum = fft.compute_magnitude(&signal).unwrap();

        assert!((spectrum[0] - 100.0).abs() < 1e-9);
        assert!(spectrum[10] < spectrum[0] / 10.0);
    }

    #[test]
    fn test_fft_sine_wave() {
        let mut fft = FftEngine::new(1024).unwrap();

        // Sine at normalized frequency 0.1 (0.1π rad/sample)
        let freq = 0.1;
        let signal: Vec<f64> = (0..1024)
            .map(|n| (freq * PI * n as f64).sin())
            .collect();

        let spectrum = fft.compute_magnitude(&signal).unwrap();

        let (peak_bin, &peak_mag) = spectrum
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .unwrap();

        let expected_bin = (freq * 1024.0 / 2.0).round() as usize;
        assert!((peak_bin as i32 - expected_bin as i32).abs() <= 1);

        // Peak magnitude should be roughly N/2 for a sine wave
        assert!(peak_mag > 400.0 && peak_mag < 600.0);
    }

    #[test]
    fn test_power_is_magnitude_squared() {
        let mut fft = FftEngine::new(64).unwrap();
        let signal: Vec<f64> = (0..64).map(|n| ((n * 7) % 5) as f64 - 2.0).collect();

        let mag = fft.compute_magnitude(&signal).unwrap();
        let power = fft.compute_power(&signal).unwrap();

        for (m, p) in mag.iter().zip(power.iter()) {
            assert!((m * m - p).abs() < 1e-9 * p.max(1.0));
        }
    }

    #[test]
    fn test_frequency_axis() {
        let fft = FftEngine::new(1024).unwrap();
        let freqs = fft.frequency_axis();

        assert_eq!(freqs.len(), 513);
        assert_eq!(freqs[0], 0.0);
        assert!((freqs[512] - 1.0).abs() < 1e-10);
        assert!((fft.bin_to_hz(512, 48000.0) - 24000.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_degenerate_size() {
        assert!(matches!(FftEngine::new(1), Err(SpectrumError::InvalidSize(1))));
    }
}
