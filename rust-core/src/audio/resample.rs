//! Device-rate to analysis-rate conversion
//!
//! Devices that refuse the requested rate are captured at their default rate
//! and converted here, so every downstream stage sees one fixed rate.

use super::input::AudioError;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Default input block for the sinc resampler
pub const DEFAULT_RESAMPLE_BLOCK: usize = 512;

/// Streaming mono rate converter
pub struct RateConverter {
    from_hz: u32,
    to_hz: u32,
    inner: Option<SincFixedIn<f64>>,
    pending: Vec<f64>,
    block: Vec<f64>,
}

impl RateConverter {
    /// Create a converter
    ///
    /// # Arguments
    /// * `from_hz` - Capture rate
    /// * `to_hz` - Analysis rate
    /// * `block` - Input samples consumed per resampler call
    pub fn new(from_hz: u32, to_hz: u32, block: usize) -> Result<Self, AudioError> {
        if from_hz == 0 || to_hz == 0 {
            return Err(AudioError::Resample(format!(
                "invalid rates {from_hz} Hz -> {to_hz} Hz"
            )));
        }

        let block = block.max(16);
        let inner = if from_hz == to_hz {
            None
        } else {
            let params = SincInterpolationParameters {
                sinc_len: 128,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Cubic,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };
            let ratio = to_hz as f64 / from_hz as f64;
            let resampler = SincFixedIn::<f64>::new(ratio, 1.0, params, block, 1)
                .map_err(|e| AudioError::Resample(e.to_string()))?;
            tracing::debug!(from_hz, to_hz, block, "sinc resampler ready");
            Some(resampler)
        };

        Ok(Self {
            from_hz,
            to_hz,
            inner,
            pending: Vec::with_capacity(block * 2),
            block: vec![0.0; block],
        })
    }

    /// True when input is forwarded unchanged
    pub fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }

    pub fn from_hz(&self) -> u32 {
        self.from_hz
    }

    pub fn to_hz(&self) -> u32 {
        self.to_hz
    }

    /// Feed captured samples, appending whatever output is ready to `out`
    ///
    /// Input that does not fill a whole block is held until the next call.
    pub fn push(&mut self, input: &[f64], out: &mut Vec<f64>) -> Result<(), AudioError> {
        let Some(resampler) = self.inner.as_mut() else {
            out.extend_from_slice(input);
            return Ok(());
        };

        self.pending.extend_from_slice(input);
        let block_len = self.block.len();
        let mut consumed = 0;

        while self.pending.len() - consumed >= block_len {
            self.block
                .copy_from_slice(&self.pending[consumed..consumed + block_len]);
            let produced = resampler
                .process(std::slice::from_ref(&self.block), None)
                .map_err(|e| AudioError::Resample(e.to_string()))?;
            if let Some(channel) = produced.first() {
                out.extend_from_slice(channel);
            }
            consumed += block_len;
        }

        self.pending.drain(..consumed);
        Ok(())
    }

    /// Drop buffered input and resampler history
    pub fn reset(&mut self) {
        self.pending.clear();
        if let Some(resampler) = self.inner.as_mut() {
            resampler.reset();
        }
    }
}
