use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use micscope_core::audio::{ChunkPipeline, ProcessorConfig};
use micscope_core::filters::{DenoiseMode, SpectralGate, SpectralGateConfig};
use micscope_core::spectrum::{Spectrogram, SpectrogramConfig, SpectrumAnalyzer, SpectrumConfig};
use std::f64::consts::PI;

fn test_chunk(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64 / 48000.0;
            0.4 * (2.0 * PI * 440.0 * t).sin() + 0.1 * (2.0 * PI * 5000.0 * t).sin()
        })
        .collect()
}

fn bench_spectrum(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectrum");
    for size in [1024usize, 4096] {
        let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig {
            chunk_size: size,
            ..SpectrumConfig::default()
        })
        .unwrap();
        let chunk = test_chunk(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &chunk, |b, chunk| {
            b.iter(|| analyzer.analyze(black_box(chunk)).unwrap())
        });
    }
    group.finish();
}

fn bench_spectrogram(c: &mut Criterion) {
    let mut stft = Spectrogram::new(SpectrogramConfig::default()).unwrap();
    let chunk = test_chunk(1024);
    c.bench_function("spectrogram_1024", |b| {
        b.iter(|| stft.compute(black_box(&chunk)).unwrap())
    });
}

fn bench_spectral_gate(c: &mut Criterion) {
    let mut gate = SpectralGate::new(SpectralGateConfig::default());
    let chunk = test_chunk(1024);
    let mut buf = chunk.clone();
    c.bench_function("spectral_gate_1024", |b| {
        b.iter(|| {
            buf.copy_from_slice(&chunk);
            gate.process_block_inplace(black_box(&mut buf));
        })
    });
}

fn bench_full_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_pipeline");
    let chunk = test_chunk(1024);
    for mode in [DenoiseMode::Off, DenoiseMode::Gate, DenoiseMode::Spectral] {
        let mut pipeline = ChunkPipeline::new(&ProcessorConfig {
            denoise: mode,
            ..ProcessorConfig::default()
        })
        .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(mode), &chunk, |b, chunk| {
            b.iter(|| pipeline.process(black_box(chunk)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_spectrum,
    bench_spectrogram,
    bench_spectral_gate,
    bench_full_chunk
);
criterion_main!(benches);
