//! Short-time FFT over a chunk
//!
//! Welch-style segmenting with constant detrend and one-sided density
//! scaling, so each chunk becomes a small `(bins × segments)` power matrix.

use super::fft::{FftEngine, SpectrumError};
use super::scale::power_to_db;
use super::windowing::{apply_window_inplace, detrend_constant, window_power_sum};
use crate::filters::windows::{generate_periodic_window, WindowType};
use ndarray::Array2;

/// Spectrogram configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrogramConfig {
    /// Segment length
    pub nperseg: usize,

    /// Samples shared by consecutive segments
    pub noverlap: usize,

    /// Segment window (periodic)
    pub window: WindowType,

    /// Sample rate in Hz
    pub sample_rate: f64,

    /// Multiplier applied to [-1, 1] float samples before analysis
    pub pcm_scale: f64,

    /// Added to the power before the logarithm
    pub epsilon: f64,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            nperseg: 512,
            noverlap: 256,
            window: WindowType::Tukey,
            sample_rate: 48000.0,
            pcm_scale: super::analysis::PCM16_SCALE,
            epsilon: 1e-10,
        }
    }
}

impl SpectrogramConfig {
    /// Hop between segment starts
    pub fn step(&self) -> usize {
        self.nperseg - self.noverlap
    }

    /// Number of segments a chunk of `len` samples yields
    pub fn segments_for(&self, len: usize) -> usize {
        if len < self.nperseg {
            return 0;
        }
        (len - self.noverlap) / self.step()
    }

    pub fn num_bins(&self) -> usize {
        self.nperseg / 2 + 1
    }
}

/// Spectrogram of one chunk
#[derive(Debug, Clone)]
pub struct SpectrogramFrame {
    /// Bin frequencies in Hz (`k · fs / nperseg`)
    pub frequencies: Vec<f64>,

    /// Segment centre times in seconds, relative to the chunk start
    pub times: Vec<f64>,

    /// Power spectral density in dB, shape `(bins, segments)`
    pub power_db: Array2<f64>,
}

impl SpectrogramFrame {
    pub fn num_bins(&self) -> usize {
        self.power_db.nrows()
    }

    pub fn num_segments(&self) -> usize {
        self.power_db.ncols()
    }
}

/// Spectrogram engine for fixed-size chunks
pub struct Spectrogram {
    config: SpectrogramConfig,
    fft_engine: FftEngine,
    window: Vec<f64>,
    scale: f64,
    segment: Vec<f64>,
    frequencies: Vec<f64>,
}

impl Spectrogram {
    pub fn new(config: SpectrogramConfig) -> Result<Self, SpectrumError> {
        if config.noverlap >= config.nperseg {
            return Err(SpectrumError::InvalidSize(config.nperseg));
        }
        let fft_engine = FftEngine::new(config.nperseg)?;
        let window = generate_periodic_window(config.window, config.nperseg);

        // Density scaling: 1 / (fs · Σw²)
        let scale = 1.0 / (config.sample_rate * window_power_sum(&window));

        let frequencies = (0..config.num_bins())
            .map(|k| fft_engine.bin_to_hz(k, config.sample_rate))
            .collect();

        Ok(Self {
            segment: vec![0.0; config.nperseg],
            config,
            fft_engine,
            window,
            scale,
            frequencies,
        })
    }

    /// Compute the spectrogram of a chunk
    ///
    /// A chunk shorter than one segment yields a frame with zero columns.
    pub fn compute(&mut self, chunk: &[f64]) -> Result<SpectrogramFrame, SpectrumError> {
        let nperseg = self.config.nperseg;
        let step = self.config.step();
        let segments = self.config.segments_for(chunk.len());
        let bins = self.config.num_bins();
        let fs = self.config.sample_rate;
        let pcm_scale = self.config.pcm_scale;
        let epsilon = self.config.epsilon;

        let mut power_db = Array2::<f64>::zeros((bins, segments));
        let mut times = Vec::with_capacity(segments);

        for seg in 0..segments {
            let start = seg * step;
            for (dst, &src) in self.segment.iter_mut().zip(&chunk[start..start + nperseg]) {
                *dst = src * pcm_scale;
            }
            detrend_constant(&mut self.segment);
            apply_window_inplace(&mut self.segment, &self.window);

            let spectrum = self.fft_engine.compute_complex(&self.segment)?;
            for (k, c) in spectrum.iter().enumerate() {
                let mut p = c.norm_sqr() * self.scale;
                // One-sided: fold negative frequencies, except DC and Nyquist
                if k != 0 && !(nperseg % 2 == 0 && k == bins - 1) {
                    p *= 2.0;
                }
                power_db[[k, seg]] = power_to_db(p, epsilon);
            }

            times.push((nperseg as f64 / 2.0 + start as f64) / fs);
        }

        Ok(SpectrogramFrame {
            frequencies: self.frequencies.clone(),
            times,
            power_db,
        })
    }

    pub fn config(&self) -> &SpectrogramConfig {
        &self.config
    }

    /// Seconds between consecutive columns
    pub fn seconds_per_column(&self) -> f64 {
        self.config.step() as f64 / self.config.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn unit_config() -> SpectrogramConfig {
        SpectrogramConfig {
            pcm_scale: 1.0,
            ..SpectrogramConfig::default()
        }
    }

    #[test]
    fn test_shape_and_axes() {
        let mut stft = Spectrogram::new(unit_config()).unwrap();
        let frame = stft.compute(&vec![0.0; 1024]).unwrap();

        // (1024 - 256) / 256 = 3 segments of 257 bins
        assert_eq!(frame.num_bins(), 257);
        assert_eq!(frame.num_segments(), 3);
        assert_eq!(frame.frequencies.len(), 257);
        assert!((frame.frequencies[256] - 24000.0).abs() < 1e-9);

        let expected = [256.0 / 48000.0, 512.0 / 48000.0, 768.0 / 48000.0];
        for (t, e) in frame.times.iter().zip(expected.iter()) {
            assert!((t - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_silence_is_epsilon_floor() {
        let mut stft = Spectrogram::new(unit_config()).unwrap();
        let frame = stft.compute(&vec![0.0; 1024]).unwrap();
        assert!(frame.power_db.iter().all(|&db| (db + 100.0).abs() < 1e-9));
    }

    #[test]
    fn test_dc_offset_is_detrended() {
        let mut stft = Spectrogram::new(unit_config()).unwrap();
        let frame = stft.compute(&vec![0.7; 1024]).unwrap();
        assert!(frame.power_db.iter().all(|&db| db < -90.0));
    }

    #[test]
    fn test_tone_energy_lands_in_its_bin() {
        let mut stft = Spectrogram::new(unit_config()).unwrap();
        // 1500 Hz is bin 16 at 48 kHz / 512
        let chunk: Vec<f64> = (0..1024)
            .map(|n| (2.0 * PI * 1500.0 * n as f64 / 48000.0).sin())
            .collect();
        let frame = stft.compute(&chunk).unwrap();

        for seg in 0..frame.num_segments() {
            let column = frame.power_db.column(seg);
            let (peak, _) = column
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
                .unwrap();
            assert_eq!(peak, 16);
        }
    }

    #[test]
    fn test_density_integrates_to_signal_power() {
        // Σ PSD · Δf ≈ mean-square of a sine = A²/2
        let mut stft = Spectrogram::new(unit_config()).unwrap();
        let amp = 0.5;
        let chunk: Vec<f64> = (0..1024)
            .map(|n| amp * (2.0 * PI * 3000.0 * n as f64 / 48000.0).sin())
            .collect();
        let frame = stft.compute(&chunk).unwrap();
        let df = 48000.0 / 512.0;
        let total: f64 = frame
            .power_db
            .column(1)
            .iter()
            .map(|&db| 10f64.powf(db / 10.0) - 1e-10)
            .sum::<f64>()
            * df;
        let expected = amp * amp / 2.0;
        assert!((total - expected).abs() / expected < 0.02, "total {total}");
    }

    #[test]
    fn test_short_chunk_yields_no_columns() {
        let mut stft = Spectrogram::new(unit_config()).unwrap();
        let frame = stft.compute(&vec![0.1; 100]).unwrap();
        assert_eq!(frame.num_segments(), 0);
        assert_eq!(frame.num_bins(), 257);
    }

    #[test]
    fn test_rejects_overlap_not_below_segment() {
        let cfg = SpectrogramConfig {
            noverlap: 512,
            ..unit_config()
        };
        assert!(Spectrogram::new(cfg).is_err());
    }
}
