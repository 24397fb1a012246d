//! # Speech Refine
//!
//! An audio refinement engine for synthesized speech: takes a complete clip
//! of raw encoded audio and produces a loudness-normalized, noise-reduced
//! WAV asset in a fixed target format, plus a report of what was done.
//!
//! ## Features
//!
//! - **Decoding**: WAV through hound, MP3/FLAC/Ogg/AAC through Symphonia
//! - **Resampling**: Band-limited sinc conversion with channel mixing
//! - **Noise Reduction**: STFT spectral subtraction from a quiet-frame noise profile
//! - **Normalization**: RMS target with a clip-safe peak ceiling
//! - **Compression**: Soft-knee, stereo-linked dynamics compressor
//!
//! ## Quick Start
//!
//! ```no_run
//! use speech_refine::{refine, RefineConfig};
//!
//! let raw = std::fs::read("voice.mp3")?;
//! let (wav, report) = refine(&raw, None, &RefineConfig::default())?;
//!
//! println!("Gain: {:.2} dB", report.applied_gain_db);
//! println!("Loudness: {:.2} dBFS", report.final_rms_dbfs());
//! std::fs::write("voice.wav", wav)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! Every run follows the same fixed order:
//!
//! ```text
//! Decode → Resample → Noise Reduction → Normalize → Compress → Encode
//! ```
//!
//! Stages work on a [`SampleBuffer`]; the orchestrator checks the buffer
//! between stages and aggregates per-stage metadata into a
//! [`RefinementReport`]. The library does no file, network or environment
//! I/O and never installs a logger.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod preprocessing;

// Re-export main types
pub use analysis::loudness::LoudnessMeasurement;
pub use analysis::report::{RefinementReport, StageTiming};
pub use config::{OutputConfig, RefineConfig};
pub use error::{RefineError, Stage};
pub use io::{AudioCodec, Container, NativeCodec, SampleBuffer};
pub use pipeline::{refine_batch, Clip};

use pipeline::{check_peak_ceiling, check_stage_output, BufferShape, StageTimer};
use preprocessing::compressor::compress;
use preprocessing::noise_reduction::reduce_noise;
use preprocessing::normalization::normalize;
use preprocessing::resample::resample;
use std::time::Instant;

/// Main refinement function
///
/// Decodes `raw`, runs every enabled stage and encodes the result in the
/// configured output format, using the codecs linked into the crate.
///
/// # Arguments
///
/// * `raw` - One complete encoded clip
/// * `container` - Declared container, or `None` to detect it from the bytes
/// * `config` - Stage and output configuration
///
/// # Returns
///
/// The encoded output bytes and a [`RefinementReport`]
///
/// # Errors
///
/// Any [`RefineError`]. The configuration is validated before decoding, and
/// no bytes are returned on failure.
///
/// # Example
///
/// ```no_run
/// use speech_refine::{refine, Container, RefineConfig};
///
/// let raw = std::fs::read("take1.wav")?;
/// let mut config = RefineConfig::default();
/// config.normalization.target_dbfs = -16.0;
/// let (bytes, report) = refine(&raw, Some(Container::Wav), &config)?;
/// println!("{}", report.to_json()?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn refine(
    raw: &[u8],
    container: Option<Container>,
    config: &RefineConfig,
) -> Result<(Vec<u8>, RefinementReport), RefineError> {
    refine_with(&NativeCodec, raw, container, config)
}

/// Refinement with a caller-supplied codec adapter
///
/// Same as [`refine`], but decoding and encoding go through `codec`.
pub fn refine_with(
    codec: &dyn AudioCodec,
    raw: &[u8],
    container: Option<Container>,
    config: &RefineConfig,
) -> Result<(Vec<u8>, RefinementReport), RefineError> {
    let start_time = Instant::now();

    config.validate()?;

    let input_container = container.or_else(|| Container::sniff(raw));
    log::info!(
        "Starting refinement: {} bytes ({}) -> {} Hz/{} ch/{}-bit {}",
        raw.len(),
        input_container.map_or_else(|| "unknown container".to_string(), |c| c.to_string()),
        config.output.sample_rate,
        config.output.channels,
        config.output.bit_depth,
        config.output.container
    );

    let mut timer = StageTimer::new();

    // Decode
    let buffer = timer.run(Stage::Decode, || codec.decode(raw, container))?;
    if !buffer.is_finite() {
        return Err(RefineError::CorruptInput(
            "decoded stream contains non-finite samples".to_string(),
        ));
    }
    let input_shape = BufferShape::of(&buffer);
    let original_duration_secs = buffer.duration_secs();

    // Resample
    let target = input_shape.resampled(config.output.sample_rate, config.output.channels);
    let mut buffer = timer.run(Stage::Resample, || {
        resample(buffer, config.output.sample_rate, config.output.channels)
    })?;
    check_stage_output(Stage::Resample, &buffer, target)?;

    // Noise reduction
    let noise = if config.noise_reduction.enabled {
        let metadata = timer.run(Stage::NoiseReduction, || {
            reduce_noise(&mut buffer, &config.noise_reduction)
        })?;
        check_stage_output(Stage::NoiseReduction, &buffer, target)?;
        Some(metadata)
    } else {
        timer.skip(Stage::NoiseReduction);
        None
    };

    // Normalization
    let loudness = if config.normalization.enabled {
        let metadata = timer.run(Stage::Normalization, || {
            normalize(&mut buffer, &config.normalization)
        })?;
        check_stage_output(Stage::Normalization, &buffer, target)?;
        check_peak_ceiling(Stage::Normalization, &buffer, config.normalization.max_peak)?;
        Some(metadata)
    } else {
        timer.skip(Stage::Normalization);
        None
    };

    // Compression
    let dynamics = if config.compressor.enabled {
        let metadata = timer.run(Stage::Compression, || compress(&mut buffer, &config.compressor))?;
        check_stage_output(Stage::Compression, &buffer, target)?;
        if config.normalization.enabled {
            check_peak_ceiling(Stage::Compression, &buffer, config.normalization.max_peak)?;
        }
        Some(metadata)
    } else {
        timer.skip(Stage::Compression);
        None
    };

    // Encode
    let bytes = timer.run(Stage::Encode, || {
        codec.encode(&buffer, config.output.container, config.output.bit_depth)
    })?;

    let final_loudness = buffer.measure();
    let report = RefinementReport {
        input_container,
        input_sample_rate: input_shape.sample_rate,
        input_channels: input_shape.channels,
        output_container: config.output.container,
        output_sample_rate: buffer.sample_rate(),
        output_channels: buffer.channels(),
        output_bit_depth: config.output.bit_depth,
        original_duration_secs,
        final_duration_secs: buffer.duration_secs(),
        applied_gain_db: loudness.map_or(0.0, |m| m.gain_db),
        clip_limited: loudness.is_some_and(|m| m.clip_limited),
        noise_floor_dbfs: noise.as_ref().and_then(|m| m.noise_floor_dbfs),
        noise_reduction_degraded: noise.as_ref().is_some_and(|m| m.degraded),
        max_gain_reduction_db: dynamics.map_or(0.0, |m| m.max_gain_reduction_db),
        final_loudness,
        output_bytes: bytes.len(),
        stage_timings: timer.into_timings(),
        processing_time_ms: start_time.elapsed().as_secs_f32() * 1000.0,
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    log::info!(
        "Refinement complete: {:.3}s -> {:.3}s, gain {:.2} dB{}, loudness {:.2} dBFS RMS / {:.2} dBFS peak, {:.1} ms",
        report.original_duration_secs,
        report.final_duration_secs,
        report.applied_gain_db,
        if report.clip_limited { " (clip-limited)" } else { "" },
        report.final_loudness.rms_dbfs,
        report.final_loudness.peak_dbfs,
        report.processing_time_ms
    );

    Ok((bytes, report))
}
