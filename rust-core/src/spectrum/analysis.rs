//! Live spectrum analyzer
//!
//! One chunk in, one dB magnitude spectrum out. The defaults reproduce the
//! classic bar-spectrum view: no window, 16-bit PCM scale, 20·log10 with a
//! 1e-6 floor, clipped to ±200 dB.

use super::fft::{FftEngine, SpectrumError};
use super::scale::{amplitude_to_db, DbRange};
use super::windowing::apply_window_inplace;
use crate::filters::windows::{generate_periodic_window, WindowType};

/// Full-scale value of signed 16-bit PCM
pub const PCM16_SCALE: f64 = 32768.0;

/// Spectrum analyzer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumConfig {
    /// Samples per analysed chunk (FFT size)
    pub chunk_size: usize,

    /// Sample rate in Hz
    pub sample_rate: f64,

    /// Window applied before the FFT
    pub window: WindowType,

    /// Multiplier applied to [-1, 1] float samples before the FFT
    pub pcm_scale: f64,

    /// Added to the magnitude before the logarithm
    pub epsilon: f64,

    /// Output clamp
    pub range: DbRange,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            sample_rate: 48000.0,
            window: WindowType::Rectangular,
            pcm_scale: PCM16_SCALE,
            epsilon: 1e-6,
            range: DbRange::new(-200.0, 200.0),
        }
    }
}

/// One analysed chunk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumFrame {
    /// Bin centre frequencies in Hz, `k · rate / chunk_size`
    pub frequencies: Vec<f64>,

    /// Clamped magnitude in dB, same length as `frequencies`
    pub magnitudes_db: Vec<f64>,
}

impl SpectrumFrame {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Loudest bin as `(hz, db)`
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.magnitudes_db
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, &db)| (self.frequencies[i], db))
    }

    /// Loudest bin whose frequency lies in `[lo_hz, hi_hz]`
    pub fn peak_in(&self, lo_hz: f64, hi_hz: f64) -> Option<(f64, f64)> {
        let (freqs, mags) = self.band(lo_hz, hi_hz);
        mags.iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, &db)| (freqs[i], db))
    }

    /// Frequencies and magnitudes of the bins inside `[lo_hz, hi_hz]`
    pub fn band(&self, lo_hz: f64, hi_hz: f64) -> (&[f64], &[f64]) {
        let start = self.frequencies.partition_point(|&f| f < lo_hz);
        let end = self.frequencies.partition_point(|&f| f <= hi_hz).max(start);
        (&self.frequencies[start..end], &self.magnitudes_db[start..end])
    }
}

/// Real-time spectrum analyzer
pub struct SpectrumAnalyzer {
    config: SpectrumConfig,
    fft_engine: FftEngine,
    window: Vec<f64>,
    scratch: Vec<f64>,
    frequencies: Vec<f64>,
}

impl SpectrumAnalyzer {
    /// Create new spectrum analyzer
    pub fn new(config: SpectrumConfig) -> Result<Self, SpectrumError> {
        let fft_engine = FftEngine::new(config.chunk_size)?;
        let window = generate_periodic_window(config.window, config.chunk_size);
        let frequencies = Self::bin_frequencies(&config);

        Ok(Self {
            scratch: vec![0.0; config.chunk_size],
            config,
            fft_engine,
            window,
            frequencies,
        })
    }

    fn bin_frequencies(config: &SpectrumConfig) -> Vec<f64> {
        let half = config.chunk_size / 2;
        (0..half)
            .map(|k| k as f64 * config.sample_rate / config.chunk_size as f64)
            .collect()
    }

    /// Analyze a chunk and return its clamped dB spectrum
    ///
    /// Chunks shorter than `chunk_size` are zero-padded, longer ones truncated.
    pub fn analyze(&mut self, chunk: &[f64]) -> Result<SpectrumFrame, SpectrumError> {
        let n = chunk.len().min(self.config.chunk_size);
        let scale = self.config.pcm_scale;
        for (dst, &src) in self.scratch.iter_mut().zip(chunk[..n].iter()) {
            *dst = src * scale;
        }
        self.scratch[n..].fill(0.0);
        apply_window_inplace(&mut self.scratch, &self.window);

        let spectrum = self.fft_engine.compute_complex(&self.scratch)?;
        let half = self.config.chunk_size / 2;
        let epsilon = self.config.epsilon;
        let range = self.config.range;

        let magnitudes_db = spectrum[..half]
            .iter()
            .map(|c| range.clamp(amplitude_to_db(c.norm(), epsilon)))
            .collect();

        Ok(SpectrumFrame {
            frequencies: self.frequencies.clone(),
            magnitudes_db,
        })
    }

    /// Replace the configuration, replanning the FFT if the size changed
    pub fn update_config(&mut self, config: SpectrumConfig) -> Result<(), SpectrumError> {
        if config.chunk_size != self.config.chunk_size {
            self.fft_engine = FftEngine::new(config.chunk_size)?;
            self.scratch = vec![0.0; config.chunk_size];
        }
        self.window = generate_periodic_window(config.window, config.chunk_size);
        self.frequencies = Self::bin_frequencies(&config);
        self.config = config;
        Ok(())
    }

    /// Get current configuration
    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    /// Number of bins per frame (chunk_size / 2)
    pub fn num_bins(&self) -> usize {
        self.frequencies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq_hz: f64, amp: f64, n: usize, rate: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amp * (2.0 * PI * freq_hz * i as f64 / rate).sin())
            .collect()
    }

    #[test]
    fn test_frequency_axis_matches_linspace() {
        let analyzer = SpectrumAnalyzer::new(SpectrumConfig {
            sample_rate: 44100.0,
            ..SpectrumConfig::default()
        })
        .unwrap();
        let frame_len = analyzer.num_bins();
        assert_eq!(frame_len, 512);
        // linspace(0, rate/2, N/2, endpoint=False)
        let step = 44100.0 / 2.0 / 512.0;
        for (k, f) in analyzer.frequencies.iter().enumerate() {
            assert!((f - k as f64 * step).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sine_peak_location() {
        let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig::default()).unwrap();

        // 3 kHz lands exactly on bin 64 at 48 kHz / 1024
        let frame = analyzer.analyze(&sine(3000.0, 0.5, 1024, 48000.0)).unwrap();
        let (hz, db) = frame.peak().unwrap();
        assert!((hz - 3000.0).abs() < 1e-9);

        // |X| = A·scale·N/2 for a bin-centred sine
        let expected = 20.0 * (0.5 * PCM16_SCALE * 512.0_f64).log10();
        assert!((db - expected).abs() < 0.01, "peak {db} expected {expected}");
    }

    #[test]
    fn test_silence_hits_epsilon_floor() {
        let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig::default()).unwrap();
        let frame = analyzer.analyze(&vec![0.0; 1024]).unwrap();
        assert_eq!(frame.len(), 512);
        assert!(frame.magnitudes_db.iter().all(|&db| (db + 120.0).abs() < 1e-6));
    }

    #[test]
    fn test_output_is_clamped() {
        let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig {
            range: DbRange::new(-50.0, 50.0),
            ..SpectrumConfig::default()
        })
        .unwrap();
        let frame = analyzer.analyze(&vec![1.0; 1024]).unwrap();
        assert!(frame.magnitudes_db.iter().all(|&db| (-50.0..=50.0).contains(&db)));
        assert_eq!(frame.magnitudes_db[0], 50.0);
        assert_eq!(frame.magnitudes_db[10], -50.0);
    }

    #[test]
    fn test_short_chunk_is_zero_padded() {
        let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig::default()).unwrap();
        let frame = analyzer.analyze(&[0.25; 10]).unwrap();
        assert_eq!(frame.len(), 512);
    }

    #[test]
    fn test_band_and_peak_in() {
        let frame = SpectrumFrame {
            frequencies: vec![0.0, 100.0, 200.0, 300.0, 400.0],
            magnitudes_db: vec![50.0, 1.0, 9.0, 3.0, 40.0],
        };
        let (f, m) = frame.band(100.0, 300.0);
        assert_eq!(f, &[100.0, 200.0, 300.0]);
        assert_eq!(m, &[1.0, 9.0, 3.0]);
        assert_eq!(frame.peak_in(100.0, 300.0), Some((200.0, 9.0)));
        assert_eq!(frame.peak(), Some((0.0, 50.0)));
        assert!(frame.band(1000.0, 2000.0).0.is_empty());
    }

    #[test]
    fn test_update_config_resizes() {
        let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig::default()).unwrap();
        analyzer
            .update_config(SpectrumConfig {
                chunk_size: 2048,
                ..SpectrumConfig::default()
            })
            .unwrap();
        assert_eq!(analyzer.num_bins(), 1024);
        let frame = analyzer.analyze(&vec![0.0; 2048]).unwrap();
        assert_eq!(frame.len(), 1024);
    }
}
