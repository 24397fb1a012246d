//! Performance benchmarks for the refinement stages

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use speech_refine::preprocessing::compressor::{compress, CompressorConfig};
use speech_refine::preprocessing::noise_reduction::{reduce_noise, NoiseReductionConfig};
use speech_refine::preprocessing::resample::resample;
use speech_refine::{refine, Container, RefineConfig, SampleBuffer};

/// 10 seconds of a 440 Hz tone over low-level noise
fn synthetic_speech(sample_rate: u32) -> Vec<f32> {
    let mut state = 42u64;
    (0..sample_rate as usize * 10)
        .map(|i| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let noise = ((state >> 40) as f32 / (1u64 << 24) as f32 - 0.5) * 0.02;
            let tone = (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / sample_rate as f32).sin() * 0.2;
            tone + noise
        })
        .collect()
}

fn bench_stages(c: &mut Criterion) {
    let samples = synthetic_speech(44100);
    let buffer = SampleBuffer::mono(samples, 44100).unwrap();

    c.bench_function("resample_10s_44k_to_22k", |b| {
        b.iter(|| resample(black_box(buffer.clone()), 22050, 1).unwrap());
    });

    let resampled = resample(buffer, 22050, 1).unwrap();
    let nr_config = NoiseReductionConfig::default();
    c.bench_function("reduce_noise_10s", |b| {
        b.iter(|| {
            let mut work = resampled.clone();
            reduce_noise(black_box(&mut work), &nr_config).unwrap()
        });
    });

    let comp_config = CompressorConfig::default();
    c.bench_function("compress_10s", |b| {
        b.iter(|| {
            let mut work = resampled.clone();
            compress(black_box(&mut work), &comp_config).unwrap()
        });
    });
}

fn bench_refine(c: &mut Criterion) {
    let samples = synthetic_speech(44100);
    let buffer = SampleBuffer::mono(samples, 44100).unwrap();
    let wav = speech_refine::io::encoder::encode(&buffer, Container::Wav, 16).unwrap();
    let config = RefineConfig::default();

    c.bench_function("refine_10s_wav", |b| {
        b.iter(|| refine(black_box(&wav), Some(Container::Wav), black_box(&config)).unwrap());
    });
}

criterion_group!(benches, bench_stages, bench_refine);
criterion_main!(benches);
