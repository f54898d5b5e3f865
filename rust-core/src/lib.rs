//! micscope - live microphone spectrum and spectrogram core
//!
//! Capture, denoising and spectral analysis. Frontends drive an
//! [`AudioProcessor`] and drain [`AnalysisFrame`]s from it.

pub mod audio;
pub mod filters;
pub mod spectrum;

pub use audio::{AnalysisFrame, AudioError, AudioProcessor, DeviceSelector, ProcessorConfig, StreamInfo};
pub use filters::{DenoiseMode, WindowType};
pub use spectrum::{DbRange, SpectrogramHistory, SpectrumAnalyzer};
