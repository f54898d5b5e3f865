//! Non-stationary spectral gating
//!
//! Each chunk is taken through a centred STFT. Every bin is compared against
//! a slow running estimate of its own magnitude, and bins that do not rise
//! clearly above that estimate are attenuated before resynthesis. The
//! estimate persists across chunks, so steady background hum and hiss fade
//! out while transients and new tones pass.

use super::windows::{generate_periodic_window, WindowType};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Keeps ratios finite when the noise estimate is zero
const NOISE_EPSILON: f64 = 1e-12;

/// Spectral gate parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralGateConfig {
    /// STFT length
    pub n_fft: usize,

    /// STFT hop
    pub hop: usize,

    /// Sample rate in Hz
    pub sample_rate: f64,

    /// Time constant of the running noise estimate in seconds
    pub time_constant_s: f64,

    /// Steepness of the mask sigmoid
    pub sigmoid_slope: f64,

    /// How far above the noise estimate (as a ratio) a bin must rise to pass
    pub thresh_mult: f64,

    /// Width of the mask smoothing along frequency in Hz
    pub freq_smooth_hz: f64,

    /// Width of the mask smoothing along time in milliseconds
    pub time_smooth_ms: f64,

    /// Fraction of gated energy removed (1.0 = full gating)
    pub prop_decrease: f64,
}

impl Default for SpectralGateConfig {
    fn default() -> Self {
        Self {
            n_fft: 256,
            hop: 64,
            sample_rate: 48000.0,
            time_constant_s: 2.0,
            sigmoid_slope: 10.0,
            thresh_mult: 2.0,
            freq_smooth_hz: 500.0,
            time_smooth_ms: 50.0,
            prop_decrease: 1.0,
        }
    }
}

/// Spectral-gating denoiser with a persistent noise estimate
pub struct SpectralGate {
    config: SpectralGateConfig,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,

    /// Per-bin running magnitude estimate (bins 0..=n_fft/2)
    noise: Vec<f64>,
    noise_ready: bool,

    /// Per-frame smoothing coefficient of the noise estimate
    alpha: f64,

    /// Mask smoothing half-widths (bins, frames)
    freq_radius: usize,
    time_radius: usize,

    // Reusable work buffers
    padded: Vec<f64>,
    spectra: Vec<Complex<f64>>,
    mask: Vec<f64>,
    smoothed: Vec<f64>,
    frame_buf: Vec<Complex<f64>>,
    output: Vec<f64>,
    norm: Vec<f64>,
}

impl SpectralGate {
    pub fn new(config: SpectralGateConfig) -> Self {
        let n_fft = config.n_fft.max(4);
        let hop = config.hop.clamp(1, n_fft);
        let config = SpectralGateConfig { n_fft, hop, ..config };

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);
        let ifft = planner.plan_fft_inverse(n_fft);
        let window = generate_periodic_window(WindowType::Hann, n_fft);

        let frame_seconds = hop as f64 / config.sample_rate;
        let alpha = (-frame_seconds / config.time_constant_s.max(1e-6)).exp();

        let bin_hz = config.sample_rate / n_fft as f64;
        let freq_radius = (config.freq_smooth_hz / bin_hz / 2.0).round() as usize;
        let time_radius = (config.time_smooth_ms / 1000.0 / frame_seconds / 2.0).round() as usize;

        Self {
            noise: vec![0.0; n_fft / 2 + 1],
            noise_ready: false,
            alpha,
            freq_radius,
            time_radius,
            fft,
            ifft,
            window,
            padded: Vec::new(),
            spectra: Vec::new(),
            mask: Vec::new(),
            smoothed: Vec::new(),
            frame_buf: vec![Complex::new(0.0, 0.0); n_fft],
            output: Vec::new(),
            norm: Vec::new(),
            config,
        }
    }

    /// Denoise a chunk in-place
    ///
    /// Chunks shorter than one STFT frame pass through unchanged.
    pub fn process_block_inplace(&mut self, buffer: &mut [f64]) {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop;
        let len = buffer.len();
        if len < n_fft {
            return;
        }

        // Centre frames by padding half a frame on each side, then round up
        // to a whole number of hops.
        let pad = n_fft / 2;
        let padded_len = len + 2 * pad;
        let frames = 1 + (padded_len - n_fft).div_ceil(hop);
        let total = (frames - 1) * hop + n_fft;

        self.padded.clear();
        self.padded.resize(total, 0.0);
        self.padded[pad..pad + len].copy_from_slice(buffer);

        let bins = n_fft / 2 + 1;
        self.spectra.resize(frames * n_fft, Complex::new(0.0, 0.0));
        self.mask.resize(frames * bins, 0.0);

        self.analyze_frames(frames, bins);
        self.smooth_mask(frames, bins);
        self.resynthesize(frames, bins, total);

        for (i, sample) in buffer.iter_mut().enumerate() {
            let norm = self.norm[pad + i];
            *sample = if norm > 1e-8 {
                self.output[pad + i] / norm
            } else {
                0.0
            };
        }
    }

    /// Forward STFT, noise tracking and raw mask
    fn analyze_frames(&mut self, frames: usize, bins: usize) {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop;
        let slope = self.config.sigmoid_slope;
        let thresh = self.config.thresh_mult;

        for f in 0..frames {
            let start = f * hop;
            let spectrum = &mut self.spectra[f * n_fft..(f + 1) * n_fft];
            for (i, c) in spectrum.iter_mut().enumerate() {
                *c = Complex::new(self.padded[start + i] * self.window[i], 0.0);
            }
            self.fft.process(spectrum);

            if !self.noise_ready {
                for k in 0..bins {
                    self.noise[k] = spectrum[k].norm();
                }
                self.noise_ready = true;
            }

            for k in 0..bins {
                let mag = spectrum[k].norm();
                let noise = &mut self.noise[k];
                *noise = self.alpha * *noise + (1.0 - self.alpha) * mag;

                let ratio = (mag - *noise) / (*noise + NOISE_EPSILON);
                self.mask[f * bins + k] = sigmoid(slope * (ratio - thresh));
            }
        }
    }

    /// Box-smooth the mask along frequency, then along time
    fn smooth_mask(&mut self, frames: usize, bins: usize) {
        let fr = self.freq_radius;
        let tr = self.time_radius;
        self.smoothed.resize(frames * bins, 0.0);

        if fr > 0 {
            for f in 0..frames {
                let row = &self.mask[f * bins..(f + 1) * bins];
                for k in 0..bins {
                    let lo = k.saturating_sub(fr);
                    let hi = (k + fr).min(bins - 1);
                    let sum: f64 = row[lo..=hi].iter().sum();
                    self.smoothed[f * bins + k] = sum / (hi - lo + 1) as f64;
                }
            }
            self.mask.copy_from_slice(&self.smoothed);
        }

        if tr > 0 {
            for k in 0..bins {
                for f in 0..frames {
                    let lo = f.saturating_sub(tr);
                    let hi = (f + tr).min(frames - 1);
                    let sum: f64 = (lo..=hi).map(|g| self.mask[g * bins + k]).sum();
                    self.smoothed[f * bins + k] = sum / (hi - lo + 1) as f64;
                }
            }
            self.mask.copy_from_slice(&self.smoothed);
        }
    }

    /// Apply gains and overlap-add the inverse STFT
    fn resynthesize(&mut self, frames: usize, bins: usize, total: usize) {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop;
        let prop = self.config.prop_decrease.clamp(0.0, 1.0);
        let inv_n = 1.0 / n_fft as f64;

        self.output.clear();
        self.output.resize(total, 0.0);
        self.norm.clear();
        self.norm.resize(total, 0.0);

        for f in 0..frames {
            self.frame_buf
                .copy_from_slice(&self.spectra[f * n_fft..(f + 1) * n_fft]);

            for k in 0..bins {
                let gain = 1.0 - prop * (1.0 - self.mask[f * bins + k]);
                self.frame_buf[k] *= gain;
                // Mirror onto the negative frequencies
                if k != 0 && k != n_fft - k {
                    self.frame_buf[n_fft - k] *= gain;
                }
            }
            self.ifft.process(&mut self.frame_buf);

            let start = f * hop;
            for i in 0..n_fft {
                let w = self.window[i];
                self.output[start + i] += self.frame_buf[i].re * inv_n * w;
                self.norm[start + i] += w * w;
            }
        }
    }

    /// Forget the noise estimate
    pub fn reset(&mut self) {
        self.noise.fill(0.0);
        self.noise_ready = false;
    }

    pub fn config(&self) -> &SpectralGateConfig {
        &self.config
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq_hz: f64, amp: f64, n: usize, offset: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amp * (2.0 * PI * freq_hz * (i + offset) as f64 / 48000.0).sin())
            .collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn test_unity_gain_reconstructs_input() {
        let mut gate = SpectralGate::new(SpectralGateConfig {
            prop_decrease: 0.0,
            ..SpectralGateConfig::default()
        });
        let input: Vec<f64> = (0..1024).map(|i| ((i * 37) % 101) as f64 / 101.0 - 0.5).collect();
        let mut buf = input.clone();
        gate.process_block_inplace(&mut buf);

        for (a, b) in input.iter().zip(buf.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut gate = SpectralGate::new(SpectralGateConfig::default());
        let mut buf = vec![0.0; 1024];
        gate.process_block_inplace(&mut buf);
        assert!(buf.iter().all(|&v| v.abs() < 1e-12));
    }

    #[test]
    fn test_steady_tone_is_gated() {
        let mut gate = SpectralGate::new(SpectralGateConfig::default());
        let mut last = Vec::new();
        for chunk in 0..6 {
            let mut buf = tone(1500.0, 0.5, 1024, chunk * 1024);
            gate.process_block_inplace(&mut buf);
            last = buf;
        }
        assert!(rms(&last) < 0.1 * rms(&tone(1500.0, 0.5, 1024, 0)));
    }

    #[test]
    fn test_onset_after_silence_passes() {
        let mut gate = SpectralGate::new(SpectralGateConfig::default());
        for _ in 0..4 {
            let mut quiet = vec![0.0; 1024];
            gate.process_block_inplace(&mut quiet);
        }
        let input = tone(1600.0, 0.5, 1024, 0);
        let mut buf = input.clone();
        gate.process_block_inplace(&mut buf);
        assert!(rms(&buf) > 0.8 * rms(&input));
    }

    #[test]
    fn test_reset_forgets_noise() {
        let mut gate = SpectralGate::new(SpectralGateConfig::default());
        for chunk in 0..4 {
            let mut buf = tone(1500.0, 0.5, 1024, chunk * 1024);
            gate.process_block_inplace(&mut buf);
        }
        gate.reset();
        assert!(!gate.noise_ready);
        assert!(gate.noise.iter().all(|&n| n == 0.0));
    }

    #[test]
    fn test_short_block_passes_through() {
        let mut gate = SpectralGate::new(SpectralGateConfig::default());
        let mut buf = vec![0.3; 100];
        gate.process_block_inplace(&mut buf);
        assert!(buf.iter().all(|&v| v == 0.3));
    }
}
