//! Processing thread - keeps the hot loop off the UI thread
//!
//! capture callback → ring → resample → fixed chunks → denoise →
//! spectrum + spectrogram → bounded channel. The UI only drains the channel.

use crate::audio::buffer::{AudioConsumer, AudioRingBuffer};
use crate::audio::frames::FrameAssembler;
use crate::audio::gate::GateParams;
use crate::audio::input::{AudioDeviceInfo, AudioError, AudioInput, CaptureStats, DeviceSelector};
use crate::audio::resample::{RateConverter, DEFAULT_RESAMPLE_BLOCK};
use crate::filters::{build_denoiser, DenoiseMode, Denoiser, SpectralGateConfig};
use crate::spectrum::{
    Spectrogram, SpectrogramConfig, SpectrogramFrame, SpectrumAnalyzer, SpectrumConfig,
    SpectrumError, SpectrumFrame,
};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Idle sleep when the ring is empty
const IDLE_SLEEP: Duration = Duration::from_micros(500);

/// Processor configuration
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub device: DeviceSelector,

    /// Analysis rate in Hz; capture is resampled to it when needed
    pub sample_rate: u32,

    /// Samples per analysed chunk
    pub chunk_size: usize,

    /// Ring capacity in samples
    pub ring_capacity: usize,

    /// Frames the channel holds before new ones are dropped
    pub channel_capacity: usize,

    pub denoise: DenoiseMode,
    pub spectrum: SpectrumConfig,
    pub spectrogram: SpectrogramConfig,
    pub gate: GateParams,
    pub spectral_gate: SpectralGateConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            device: DeviceSelector::Default,
            sample_rate: 48000,
            chunk_size: 1024,
            ring_capacity: 96000,
            channel_capacity: 32,
            denoise: DenoiseMode::Off,
            spectrum: SpectrumConfig::default(),
            spectrogram: SpectrogramConfig::default(),
            gate: GateParams::default(),
            spectral_gate: SpectralGateConfig::default(),
        }
    }
}

/// What `start` opened
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub device: AudioDeviceInfo,
    /// Rate the device delivers
    pub capture_rate: u32,
    /// Rate every frame is analysed at
    pub analysis_rate: u32,
    pub chunk_size: usize,
}

impl StreamInfo {
    pub fn is_resampling(&self) -> bool {
        self.capture_rate != self.analysis_rate
    }
}

/// Results for one chunk
#[derive(Debug, Clone)]
pub struct AnalysisFrame {
    /// Sequence number since `start`
    pub index: u64,
    pub spectrum: SpectrumFrame,
    pub spectrogram: SpectrogramFrame,
    /// Level of the chunk before denoising
    pub rms_dbfs: f64,
    pub denoise: DenoiseMode,
}

/// Snapshot of the pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Samples delivered by the device
    pub captured: u64,
    /// Samples lost to a full ring
    pub dropped: u64,
    /// Frames analysed
    pub frames: u64,
    /// Frames discarded because the consumer lagged
    pub lagged: u64,
    /// Device stream errors
    pub stream_errors: u64,
    /// Chunks that failed analysis
    pub processing_errors: u64,
}

#[derive(Debug, Default)]
struct WorkerCounters {
    frames: AtomicU64,
    lagged: AtomicU64,
    errors: AtomicU64,
}

/// Per-chunk DSP: denoise, level, spectrum and spectrogram
///
/// Owns all analysis state, so it can be driven without a device.
pub struct ChunkPipeline {
    analyzer: SpectrumAnalyzer,
    spectrogram: Spectrogram,
    denoiser: Option<Box<dyn Denoiser>>,
    mode: DenoiseMode,
    sample_rate: f64,
    gate: GateParams,
    spectral_gate: SpectralGateConfig,
    scratch: Vec<f64>,
    next_index: u64,
}

impl ChunkPipeline {
    pub fn new(config: &ProcessorConfig) -> Result<Self, SpectrumError> {
        let sample_rate = config.sample_rate as f64;
        let analyzer = SpectrumAnalyzer::new(SpectrumConfig {
            chunk_size: config.chunk_size,
            sample_rate,
            ..config.spectrum.clone()
        })?;
        let spectrogram = Spectrogram::new(SpectrogramConfig {
            sample_rate,
            ..config.spectrogram.clone()
        })?;

        Ok(Self {
            analyzer,
            spectrogram,
            denoiser: build_denoiser(config.denoise, sample_rate, config.gate, &config.spectral_gate),
            mode: config.denoise,
            sample_rate,
            gate: config.gate,
            spectral_gate: config.spectral_gate.clone(),
            scratch: Vec::with_capacity(config.chunk_size),
            next_index: 0,
        })
    }

    /// Swap the denoiser; a new one starts from fresh state
    pub fn set_denoise(&mut self, mode: DenoiseMode) {
        if mode == self.mode {
            return;
        }
        self.denoiser = build_denoiser(mode, self.sample_rate, self.gate, &self.spectral_gate);
        self.mode = mode;
    }

    pub fn denoise(&self) -> DenoiseMode {
        self.mode
    }

    pub fn process(&mut self, chunk: &[f64]) -> Result<AnalysisFrame, SpectrumError> {
        let rms_dbfs = rms_dbfs(chunk);

        self.scratch.clear();
        self.scratch.extend_from_slice(chunk);
        if let Some(denoiser) = self.denoiser.as_mut() {
            denoiser.process_block_inplace(&mut self.scratch);
        }

        let spectrum = self.analyzer.analyze(&self.scratch)?;
        let spectrogram = self.spectrogram.compute(&self.scratch)?;

        let index = self.next_index;
        self.next_index += 1;

        Ok(AnalysisFrame {
            index,
            spectrum,
            spectrogram,
            rms_dbfs,
            denoise: self.mode,
        })
    }
}

/// RMS level in dBFS, floored at -200
pub fn rms_dbfs(chunk: &[f64]) -> f64 {
    if chunk.is_empty() {
        return -200.0;
    }
    let mean_sq = chunk.iter().map(|s| s * s).sum::<f64>() / chunk.len() as f64;
    (20.0 * (mean_sq.sqrt() + 1e-10).log10()).max(-200.0)
}

/// Capture and analysis driver
pub struct AudioProcessor {
    config: ProcessorConfig,
    audio_input: Option<AudioInput>,
    process_thread: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    denoise: Arc<AtomicU8>,
    capture_stats: Arc<CaptureStats>,
    counters: Arc<WorkerCounters>,
    frames_rx: Option<Receiver<AnalysisFrame>>,
    info: Option<StreamInfo>,
}

impl AudioProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        let denoise = Arc::new(AtomicU8::new(config.denoise.to_u8()));
        Self {
            config,
            audio_input: None,
            process_thread: None,
            running: Arc::new(AtomicBool::new(false)),
            denoise,
            capture_stats: Arc::new(CaptureStats::default()),
            counters: Arc::new(WorkerCounters::default()),
            frames_rx: None,
            info: None,
        }
    }

    /// Open the input and spawn the worker
    ///
    /// Calling this while running returns the current stream info.
    pub fn start(&mut self) -> Result<StreamInfo, AudioError> {
        if let (true, Some(info)) = (self.is_running(), self.info.as_ref()) {
            return Ok(info.clone());
        }

        let (producer, consumer) = AudioRingBuffer::new(self.config.ring_capacity).split();
        let input = AudioInput::open(
            &self.config.device,
            self.config.sample_rate,
            producer,
            Arc::clone(&self.capture_stats),
        )?;

        let device = input.device_info().clone();
        let info = StreamInfo {
            capture_rate: device.sample_rate,
            analysis_rate: self.config.sample_rate,
            chunk_size: self.config.chunk_size,
            device,
        };

        let converter = RateConverter::new(
            info.capture_rate,
            info.analysis_rate,
            DEFAULT_RESAMPLE_BLOCK,
        )?;
        let pipeline = ChunkPipeline::new(&ProcessorConfig {
            denoise: self.current_denoise(),
            ..self.config.clone()
        })
        .map_err(|e| AudioError::Analysis(e.to_string()))?;

        let (tx, rx) = bounded(self.config.channel_capacity.max(1));

        input.start()?;
        self.running.store(true, Ordering::SeqCst);

        let worker = Worker {
            consumer,
            converter,
            frames: FrameAssembler::new(self.config.chunk_size),
            pipeline,
            tx,
            running: Arc::clone(&self.running),
            denoise: Arc::clone(&self.denoise),
            counters: Arc::clone(&self.counters),
        };

        let handle = std::thread::Builder::new()
            .name("micscope-dsp".into())
            .spawn(move || worker.run())
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                AudioError::Thread(e.to_string())
            })?;

        tracing::info!(
            device = %info.device.name,
            capture_rate = info.capture_rate,
            analysis_rate = info.analysis_rate,
            chunk = info.chunk_size,
            "capture started"
        );

        self.audio_input = Some(input);
        self.process_thread = Some(handle);
        self.frames_rx = Some(rx);
        self.info = Some(info.clone());
        Ok(info)
    }

    /// Stop capture and join the worker
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.process_thread.take() {
            if handle.join().is_err() {
                tracing::error!("processing thread panicked");
            }
        }

        if let Some(input) = self.audio_input.take() {
            if let Err(err) = input.pause() {
                tracing::warn!(error = %err, "failed to pause input stream");
            }
            tracing::info!("capture stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.process_thread.is_some()
    }

    /// Change the denoiser; applies from the next chunk
    pub fn set_denoise(&self, mode: DenoiseMode) {
        self.denoise.store(mode.to_u8(), Ordering::Relaxed);
        tracing::debug!(mode = %mode, "denoise mode changed");
    }

    pub fn current_denoise(&self) -> DenoiseMode {
        DenoiseMode::from_u8(self.denoise.load(Ordering::Relaxed))
    }

    /// Next pending frame, if any
    pub fn try_recv(&self) -> Option<AnalysisFrame> {
        self.frames_rx.as_ref()?.try_recv().ok()
    }

    /// All pending frames, oldest first
    pub fn drain(&self) -> Vec<AnalysisFrame> {
        self.frames_rx
            .as_ref()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            captured: self.capture_stats.captured(),
            dropped: self.capture_stats.dropped(),
            frames: self.counters.frames.load(Ordering::Relaxed),
            lagged: self.counters.lagged.load(Ordering::Relaxed),
            stream_errors: self.capture_stats.stream_errors(),
            processing_errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }

    /// Info of the last opened stream
    pub fn info(&self) -> Option<&StreamInfo> {
        self.info.as_ref()
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }
}

impl Drop for AudioProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    consumer: AudioConsumer,
    converter: RateConverter,
    frames: FrameAssembler,
    pipeline: ChunkPipeline,
    tx: Sender<AnalysisFrame>,
    running: Arc<AtomicBool>,
    denoise: Arc<AtomicU8>,
    counters: Arc<WorkerCounters>,
}

impl Worker {
    fn run(mut self) {
        let mut read_buf = vec![0.0; 4096];
        let mut converted = Vec::with_capacity(8192);

        // Stale audio from before start would show up as a burst
        self.consumer.discard_all();

        while self.running.load(Ordering::SeqCst) {
            let n = self.consumer.read(&mut read_buf);
            if n == 0 {
                std::thread::sleep(IDLE_SLEEP);
                continue;
            }

            converted.clear();
            if let Err(err) = self.converter.push(&read_buf[..n], &mut converted) {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %err, "resampling failed, dropping block");
                self.converter.reset();
                continue;
            }
            self.frames.push(&converted);

            if !self.drain_frames() {
                tracing::debug!("frame receiver gone, worker exiting");
                self.running.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    /// Analyse every complete chunk; false once the receiver is gone
    fn drain_frames(&mut self) -> bool {
        while let Some(result) = self.next_analysis() {
            let frame = match result {
                Ok(frame) => frame,
                Err(err) => {
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(error = %err, "chunk analysis failed");
                    continue;
                }
            };
            self.counters.frames.fetch_add(1, Ordering::Relaxed);

            match self.tx.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.counters.lagged.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
        true
    }

    /// Analyse one pending chunk with the denoiser currently requested
    fn next_analysis(&mut self) -> Option<Result<AnalysisFrame, SpectrumError>> {
        let wanted = DenoiseMode::from_u8(self.denoise.load(Ordering::Relaxed));
        if wanted != self.pipeline.denoise() {
            self.pipeline.set_denoise(wanted);
        }

        let chunk = self.frames.next_frame()?;
        Some(self.pipeline.process(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, amp: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amp * (2.0 * PI * freq * i as f64 / 48000.0).sin())
            .collect()
    }

    #[test]
    fn test_rms_dbfs() {
        assert_eq!(rms_dbfs(&[]), -200.0);
        assert!((rms_dbfs(&[1.0; 64]) - 0.0).abs() < 1e-6);
        assert!((rms_dbfs(&[0.1; 64]) + 20.0).abs() < 1e-6);
        assert!(rms_dbfs(&[0.0; 64]) <= -199.0);
    }

    #[test]
    fn test_pipeline_produces_matching_frames() {
        let mut pipeline = ChunkPipeline::new(&ProcessorConfig::default()).unwrap();
        let chunk = sine(3000.0, 0.5, 1024);

        let first = pipeline.process(&chunk).unwrap();
        let second = pipeline.process(&chunk).unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);

        assert_eq!(first.spectrum.len(), 512);
        assert_eq!(first.spectrogram.num_bins(), 257);
        assert_eq!(first.spectrogram.num_segments(), 3);

        let (peak_hz, _) = first.spectrum.peak().unwrap();
        assert!((peak_hz - 3000.0).abs() < 50.0);
        assert!((first.rms_dbfs - 20.0 * (0.5 / 2f64.sqrt()).log10()).abs() < 0.1);
    }

    #[test]
    fn test_pipeline_uses_analysis_rate() {
        let config = ProcessorConfig {
            sample_rate: 16000,
            chunk_size: 2048,
            ..ProcessorConfig::default()
        };
        let mut pipeline = ChunkPipeline::new(&config).unwrap();
        let frame = pipeline.process(&vec![0.0; 2048]).unwrap();
        assert_eq!(frame.spectrum.len(), 1024);
        assert!((frame.spectrum.frequencies[1] - 16000.0 / 2048.0).abs() < 1e-9);
    }

    #[test]
    fn test_set_denoise_switches_mode() {
        let mut pipeline = ChunkPipeline::new(&ProcessorConfig::default()).unwrap();
        assert_eq!(pipeline.denoise(), DenoiseMode::Off);

        pipeline.set_denoise(DenoiseMode::Gate);
        let frame = pipeline.process(&vec![0.0001; 1024]).unwrap();
        assert_eq!(frame.denoise, DenoiseMode::Gate);
        // A closed gate leaves nothing above the silence floor
        assert!(frame.spectrum.magnitudes_db.iter().all(|&db| db < -100.0));
    }

    #[test]
    fn test_worker_drops_when_channel_full() {
        let config = ProcessorConfig::default();
        let (mut producer, consumer) = AudioRingBuffer::new(16384).split();
        let (tx, rx) = bounded(2);
        let counters = Arc::new(WorkerCounters::default());

        let mut worker = Worker {
            consumer,
            converter: RateConverter::new(48000, 48000, 512).unwrap(),
            frames: FrameAssembler::new(config.chunk_size),
            pipeline: ChunkPipeline::new(&config).unwrap(),
            tx,
            running: Arc::new(AtomicBool::new(true)),
            denoise: Arc::new(AtomicU8::new(0)),
            counters: Arc::clone(&counters),
        };

        producer.write(&sine(1000.0, 0.3, 1024 * 5));
        let mut buf = vec![0.0; 8192];
        let n = worker.consumer.read(&mut buf);
        worker.frames.push(&buf[..n]);
        assert!(worker.drain_frames());

        assert_eq!(counters.frames.load(Ordering::Relaxed), 5);
        assert_eq!(counters.lagged.load(Ordering::Relaxed), 3);
        let received: Vec<u64> = rx.try_iter().map(|f| f.index).collect();
        assert_eq!(received, vec![0, 1]);

        drop(rx);
        worker.frames.push(&vec![0.0; 1024]);
        assert!(!worker.drain_frames());
    }

    #[test]
    fn test_denoise_switch_applies_to_next_chunk() {
        let config = ProcessorConfig::default();
        let (_producer, consumer) = AudioRingBuffer::new(1024).split();
        let (tx, _rx) = bounded(4);
        let denoise = Arc::new(AtomicU8::new(DenoiseMode::Off.to_u8()));

        let mut worker = Worker {
            consumer,
            converter: RateConverter::new(48000, 48000, 512).unwrap(),
            frames: FrameAssembler::new(config.chunk_size),
            pipeline: ChunkPipeline::new(&config).unwrap(),
            tx,
            running: Arc::new(AtomicBool::new(true)),
            denoise: Arc::clone(&denoise),
            counters: Arc::new(WorkerCounters::default()),
        };

        // Two chunks arrive in one read
        worker.frames.push(&sine(1000.0, 0.3, 2048));

        let first = worker.next_analysis().unwrap().unwrap();
        assert_eq!(first.denoise, DenoiseMode::Off);

        denoise.store(DenoiseMode::Gate.to_u8(), Ordering::Relaxed);
        let second = worker.next_analysis().unwrap().unwrap();
        assert_eq!(second.denoise, DenoiseMode::Gate);
        assert!(worker.next_analysis().is_none());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut processor = AudioProcessor::new(ProcessorConfig::default());
        processor.stop();
        processor.stop();
        assert!(!processor.is_running());
        assert!(processor.info().is_none());
        // Drop stops once more
        drop(processor);
    }

    #[test]
    fn test_processor_idle_state() {
        let processor = AudioProcessor::new(ProcessorConfig::default());
        assert!(!processor.is_running());
        assert!(processor.try_recv().is_none());
        assert!(processor.drain().is_empty());
        assert_eq!(processor.stats(), ProcessorStats::default());

        processor.set_denoise(DenoiseMode::Spectral);
        assert_eq!(processor.current_denoise(), DenoiseMode::Spectral);
    }
}
