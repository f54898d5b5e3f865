//! Spectral analysis: live spectrum, chunk spectrogram and rolling history

pub mod analysis;
pub mod fft;
pub mod history;
pub mod scale;
pub mod stft;
pub mod windowing;

pub use analysis::{SpectrumAnalyzer, SpectrumConfig, SpectrumFrame, PCM16_SCALE};
pub use fft::{FftEngine, SpectrumError};
pub use history::SpectrogramHistory;
pub use scale::{amplitude_to_db, power_to_db, DbRange};
pub use stft::{Spectrogram, SpectrogramConfig, SpectrogramFrame};
