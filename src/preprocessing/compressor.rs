//! Soft-knee feed-forward dynamics compressor
//!
//! A stereo-linked peak envelope follower (fast attack, slower release)
//! drives a soft-knee gain computer. The envelope moves one sample at a time,
//! so the gain has no steps.

use crate::analysis::loudness::amplitude_to_dbfs;
use crate::error::{RefineError, Stage};
use crate::io::sample_buffer::SampleBuffer;
use serde::{Deserialize, Serialize};

/// Compressor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorConfig {
    /// Run the stage at all (default: true)
    pub enabled: bool,

    /// Level above which gain reduction starts, in dBFS (default: -10.0)
    pub threshold_dbfs: f32,

    /// Input/output slope above the threshold, >= 1.0 (default: 2.0)
    pub ratio: f32,

    /// Width of the soft knee centred on the threshold, in dB; 0 is a hard knee (default: 6.0)
    pub knee_db: f32,

    /// Envelope attack time in milliseconds (default: 5.0)
    pub attack_ms: f32,

    /// Envelope release time in milliseconds (default: 50.0)
    pub release_ms: f32,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_dbfs: -10.0,
            ratio: 2.0,
            knee_db: 6.0,
            attack_ms: 5.0,
            release_ms: 50.0,
        }
    }
}

impl CompressorConfig {
    /// Check every parameter against its accepted range
    pub fn validate(&self) -> Result<(), RefineError> {
        if !(self.threshold_dbfs.is_finite() && self.threshold_dbfs <= 0.0) {
            return Err(RefineError::invalid_parameter(
                Stage::Compression,
                "threshold_dbfs",
                self.threshold_dbfs,
                "<= 0.0",
            ));
        }
        if !(self.ratio >= 1.0 && self.ratio.is_finite()) {
            return Err(RefineError::invalid_parameter(
                Stage::Compression,
                "ratio",
                self.ratio,
                ">= 1.0",
            ));
        }
        if !(self.knee_db >= 0.0 && self.knee_db.is_finite()) {
            return Err(RefineError::invalid_parameter(
                Stage::Compression,
                "knee_db",
                self.knee_db,
                ">= 0.0",
            ));
        }
        if !(self.attack_ms > 0.0 && self.attack_ms.is_finite()) {
            return Err(RefineError::invalid_parameter(
                Stage::Compression,
                "attack_ms",
                self.attack_ms,
                "> 0.0",
            ));
        }
        if !(self.release_ms > 0.0 && self.release_ms.is_finite()) {
            return Err(RefineError::invalid_parameter(
                Stage::Compression,
                "release_ms",
                self.release_ms,
                "> 0.0",
            ));
        }
        Ok(())
    }
}

/// Outcome of a compression pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionMetadata {
    /// Largest gain reduction applied, in dB (positive)
    pub max_gain_reduction_db: f32,

    /// Mean gain reduction over all frames, in dB (positive)
    pub mean_gain_reduction_db: f32,
}

/// Soft-knee static curve: gain reduction in dB for a level in dBFS
fn gain_reduction_db(level_db: f32, threshold_db: f32, ratio: f32, knee_db: f32) -> f32 {
    let slope = 1.0 - 1.0 / ratio;
    let excess = level_db - threshold_db;

    if knee_db > 0.0 && 2.0 * excess.abs() <= knee_db {
        // quadratic blend inside the knee
        let x = excess + knee_db / 2.0;
        slope * x * x / (2.0 * knee_db)
    } else if excess > 0.0 {
        slope * excess
    } else {
        0.0
    }
}

/// One-pole smoothing coefficient for a time constant
fn time_coefficient(time_ms: f32, sample_rate: u32) -> f32 {
    (-1.0 / (time_ms * 0.001 * sample_rate as f32)).exp()
}

/// Compress a buffer in place
///
/// # Errors
///
/// `InvalidParameter` if `ratio < 1.0`, attack or release is not positive, or
/// another parameter is out of range. `ratio == 1.0` leaves the buffer untouched.
pub fn compress(buffer: &mut SampleBuffer, config: &CompressorConfig) -> Result<CompressionMetadata, RefineError> {
    config.validate()?;

    if config.ratio == 1.0 || buffer.is_empty() {
        log::debug!("Compressor is a no-op (ratio {:.2})", config.ratio);
        return Ok(CompressionMetadata::default());
    }

    log::debug!(
        "Compressing: threshold={:.1} dBFS, ratio={:.2}:1, knee={:.1} dB, attack={:.1} ms, release={:.1} ms",
        config.threshold_dbfs,
        config.ratio,
        config.knee_db,
        config.attack_ms,
        config.release_ms
    );

    let sample_rate = buffer.sample_rate();
    let channels = buffer.channels() as usize;
    let attack = time_coefficient(config.attack_ms, sample_rate);
    let release = time_coefficient(config.release_ms, sample_rate);

    let mut envelope = 0.0f32;
    let mut max_reduction = 0.0f32;
    let mut total_reduction = 0.0f64;

    for frame in buffer.samples_mut().chunks_exact_mut(channels) {
        // linked detector: the loudest channel drives both
        let level = frame.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        let coeff = if level > envelope { attack } else { release };
        envelope = coeff * envelope + (1.0 - coeff) * level;

        let reduction = gain_reduction_db(
            amplitude_to_dbfs(envelope),
            config.threshold_dbfs,
            config.ratio,
            config.knee_db,
        );

        if reduction > 0.0 {
            let gain = 10.0_f32.powf(-reduction / 20.0);
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
        }

        max_reduction = max_reduction.max(reduction);
        total_reduction += reduction as f64;
    }

    let frames = buffer.frames();
    let metadata = CompressionMetadata {
        max_gain_reduction_db: max_reduction,
        mean_gain_reduction_db: (total_reduction / frames as f64) as f32,
    };

    log::debug!(
        "Compression: max reduction {:.2} dB, mean {:.2} dB",
        metadata.max_gain_reduction_db,
        metadata.mean_gain_reduction_db
    );

    Ok(metadata)
}
