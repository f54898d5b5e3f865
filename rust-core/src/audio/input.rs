//! Audio input capture using cpal
//!
//! Opens an input device, downmixes whatever it delivers to mono `f64`, and
//! pushes it into the ring buffer from the realtime callback.

use super::buffer::AudioProducer;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio input device found")]
    NoDevice,

    #[error("No input device matches {0}")]
    DeviceNotFound(DeviceSelector),

    #[error("Failed to get device name: {0}")]
    DeviceName(String),

    #[error("Failed to get default config: {0}")]
    DefaultConfig(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to build stream: {0}")]
    BuildStream(String),

    #[error("Failed to play stream: {0}")]
    PlayStream(String),

    #[error("Resampler error: {0}")]
    Resample(String),

    #[error("Analysis setup failed: {0}")]
    Analysis(String),

    #[error("Failed to spawn processing thread: {0}")]
    Thread(String),
}

/// How to choose the capture device
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceSelector {
    /// Host default input
    #[default]
    Default,
    /// Position in [`list_input_devices`]
    Index(usize),
    /// Case-insensitive substring of the device name
    Name(String),
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Default => f.write_str("default"),
            DeviceSelector::Index(i) => write!(f, "#{i}"),
            DeviceSelector::Name(n) => write!(f, "\"{n}\""),
        }
    }
}

impl FromStr for DeviceSelector {
    type Err = String;

    /// `default`, a bare index, or anything else as a name filter
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty device selector".to_string());
        }
        if s.eq_ignore_ascii_case("default") {
            return Ok(DeviceSelector::Default);
        }
        if let Ok(index) = s.parse::<usize>() {
            return Ok(DeviceSelector::Index(index));
        }
        Ok(DeviceSelector::Name(s.to_string()))
    }
}

/// Audio input device information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDeviceInfo {
    pub index: usize,
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Counters shared between the callback and the rest of the pipeline
#[derive(Debug, Default)]
pub struct CaptureStats {
    captured: AtomicU64,
    dropped: AtomicU64,
    stream_errors: AtomicU64,
}

impl CaptureStats {
    pub fn record(&self, captured: usize, dropped: usize) {
        self.captured.fetch_add(captured as u64, Ordering::Relaxed);
        if dropped > 0 {
            self.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        }
    }

    pub fn record_error(&self) {
        self.stream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn captured(&self) -> u64 {
        self.captured.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn stream_errors(&self) -> u64 {
        self.stream_errors.load(Ordering::Relaxed)
    }
}

/// Audio input stream
pub struct AudioInput {
    stream: Stream,
    device_info: AudioDeviceInfo,
}

impl AudioInput {
    /// Open the selected device
    ///
    /// # Arguments
    /// * `selector` - Which device to open
    /// * `requested_rate` - Preferred capture rate; the device default is
    ///   used when the device cannot run at it
    /// * `producer` - Ring buffer producer for captured audio
    /// * `stats` - Shared capture counters
    ///
    /// # Returns
    /// Paused input stream; call [`AudioInput::start`] to begin capture
    pub fn open(
        selector: &DeviceSelector,
        requested_rate: u32,
        producer: AudioProducer,
        stats: Arc<CaptureStats>,
    ) -> Result<Self, AudioError> {
        let (index, device) = select_device(selector)?;
        let name = device
            .name()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?;

        let (config, sample_format) = choose_config(&device, requested_rate)?;

        let device_info = AudioDeviceInfo {
            index,
            name,
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        };

        tracing::info!(
            device = %device_info.name,
            sample_rate = device_info.sample_rate,
            channels = device_info.channels,
            format = ?sample_format,
            "opening input stream"
        );

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, producer, stats)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, producer, stats)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, producer, stats)?,
            other => return Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
        };

        Ok(Self {
            stream,
            device_info,
        })
    }

    /// Start capturing audio
    pub fn start(&self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::PlayStream(e.to_string()))
    }

    /// Pause audio capture
    pub fn pause(&self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::PlayStream(e.to_string()))
    }

    /// Get device information
    pub fn device_info(&self) -> &AudioDeviceInfo {
        &self.device_info
    }
}

fn select_device(selector: &DeviceSelector) -> Result<(usize, Device), AudioError> {
    let host = cpal::default_host();

    match selector {
        DeviceSelector::Default => {
            let device = host.default_input_device().ok_or(AudioError::NoDevice)?;
            // Best effort: locate the default in the enumeration for display
            let default_name = device.name().ok();
            let index = host
                .input_devices()
                .ok()
                .and_then(|mut devices| {
                    devices.position(|d| d.name().ok() == default_name)
                })
                .unwrap_or(0);
            Ok((index, device))
        }
        DeviceSelector::Index(wanted) => host
            .input_devices()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?
            .enumerate()
            .find(|(i, _)| i == wanted)
            .ok_or_else(|| AudioError::DeviceNotFound(selector.clone())),
        DeviceSelector::Name(filter) => {
            let filter = filter.to_lowercase();
            host.input_devices()
                .map_err(|e| AudioError::DeviceName(e.to_string()))?
                .enumerate()
                .find(|(_, d)| {
                    d.name()
                        .map(|n| n.to_lowercase().contains(&filter))
                        .unwrap_or(false)
                })
                .ok_or_else(|| AudioError::DeviceNotFound(selector.clone()))
        }
    }
}

/// Pick a stream config, preferring `requested_rate` with the fewest channels
fn choose_config(device: &Device, requested_rate: u32) -> Result<(StreamConfig, SampleFormat), AudioError> {
    let wanted = SampleRate(requested_rate);

    if let Ok(ranges) = device.supported_input_configs() {
        let best = ranges
            .filter(|r| r.min_sample_rate() <= wanted && wanted <= r.max_sample_rate())
            .filter(|r| is_supported_format(r.sample_format()))
            .min_by_key(|r| (r.channels(), format_rank(r.sample_format())));

        if let Some(range) = best {
            let supported = range.with_sample_rate(wanted);
            let format = supported.sample_format();
            return Ok((supported.config(), format));
        }
    }

    let fallback = device
        .default_input_config()
        .map_err(|e| AudioError::DefaultConfig(e.to_string()))?;
    tracing::warn!(
        requested = requested_rate,
        actual = fallback.sample_rate().0,
        "device cannot capture at the requested rate, resampling"
    );
    let format = fallback.sample_format();
    Ok((fallback.config(), format))
}

fn is_supported_format(format: SampleFormat) -> bool {
    matches!(format, SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
}

fn format_rank(format: SampleFormat) -> u8 {
    match format {
        SampleFormat::F32 => 0,
        SampleFormat::I16 => 1,
        _ => 2,
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut producer: AudioProducer,
    stats: Arc<CaptureStats>,
) -> Result<Stream, AudioError>
where
    T: SizedSample,
    f64: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let error_stats = Arc::clone(&stats);

    // Grows to the largest callback once, then reused
    let mut mono: Vec<f64> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                downmix_into(data, channels, &mut mono);
                let written = producer.write(&mono);
                stats.record(mono.len(), mono.len() - written);
            },
            move |err| {
                error_stats.record_error();
                tracing::warn!(error = %err, "audio input stream error");
            },
            None,
        )
        .map_err(|e| AudioError::BuildStream(e.to_string()))
}

/// Average interleaved frames down to one channel
pub(crate) fn downmix_into<T>(data: &[T], channels: usize, out: &mut Vec<f64>)
where
    T: Sample,
    f64: FromSample<T>,
{
    out.clear();
    let channels = channels.max(1);
    let scale = 1.0 / channels as f64;
    for frame in data.chunks_exact(channels) {
        let sum: f64 = frame.iter().map(|&s| f64::from_sample(s)).sum();
        out.push(sum * scale);
    }
}

/// List available audio input devices
///
/// Indices are positions in the host's input enumeration and match
/// [`DeviceSelector::Index`].
pub fn list_input_devices() -> Result<Vec<AudioDeviceInfo>, AudioError> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let device_iter = host
        .input_devices()
        .map_err(|e| AudioError::DeviceName(e.to_string()))?;

    for (index, device) in device_iter.enumerate() {
        let Ok(name) = device.name() else { continue };
        let Ok(config) = device.default_input_config() else { continue };
        devices.push(AudioDeviceInfo {
            index,
            name,
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
        });
    }

    Ok(devices)
}
