//! Audio capture and the processing thread

pub mod buffer;
pub mod frames;
pub mod gate;
pub mod input;
pub mod processor;
pub mod resample;

pub use buffer::AudioRingBuffer;
pub use frames::FrameAssembler;
pub use gate::{GateParams, NoiseGate};
pub use input::{list_input_devices, AudioDeviceInfo, AudioError, AudioInput, CaptureStats, DeviceSelector};
pub use processor::{AnalysisFrame, AudioProcessor, ChunkPipeline, ProcessorConfig, ProcessorStats, StreamInfo};
pub use resample::RateConverter;
