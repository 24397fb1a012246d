//! RMS loudness normalization
//!
//! Measures the RMS level of the whole buffer and applies one global gain so
//! it lands on the target level. The gain is capped so the peak never exceeds
//! `max_peak`; when the cap kicks in the result is quieter than the target and
//! the metadata says so.
//!
//! # Example
//!
//! ```no_run
//! use speech_refine::io::SampleBuffer;
//! use speech_refine::preprocessing::normalization::{normalize, NormalizationConfig};
//!
//! let mut buffer = SampleBuffer::mono(vec![0.05f32; 22050], 22050)?;
//! let metadata = normalize(&mut buffer, &NormalizationConfig::default())?;
//! println!("Applied gain: {:.2} dB", metadata.gain_db);
//! # Ok::<(), speech_refine::RefineError>(())
//! ```

use crate::analysis::loudness::{amplitude_to_dbfs, peak, rms, LoudnessMeasurement};
use crate::error::{RefineError, Stage};
use crate::io::sample_buffer::SampleBuffer;
use serde::{Deserialize, Serialize};

/// Lowest accepted target level in dBFS
pub const MIN_TARGET_DBFS: f32 = -30.0;

/// Highest accepted target level in dBFS
pub const MAX_TARGET_DBFS: f32 = -6.0;

/// Normalization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Run the stage at all (default: true)
    pub enabled: bool,

    /// Target RMS level in dBFS, within [-30, -6] (default: -18.0)
    pub target_dbfs: f32,

    /// Largest allowed absolute sample value after gain (default: 0.98)
    pub max_peak: f32,

    /// Inputs with RMS below this level are rejected as silent (default: -60.0)
    pub silence_floor_dbfs: f32,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_dbfs: -18.0,
            max_peak: 0.98,
            silence_floor_dbfs: -60.0,
        }
    }
}

impl NormalizationConfig {
    /// Check every parameter against its accepted range
    pub fn validate(&self) -> Result<(), RefineError> {
        if !(MIN_TARGET_DBFS..=MAX_TARGET_DBFS).contains(&self.target_dbfs) {
            return Err(RefineError::invalid_parameter(
                Stage::Normalization,
                "target_dbfs",
                self.target_dbfs,
                format!("[{}, {}]", MIN_TARGET_DBFS, MAX_TARGET_DBFS),
            ));
        }
        if !(self.max_peak > 0.0 && self.max_peak <= 1.0) {
            return Err(RefineError::invalid_parameter(
                Stage::Normalization,
                "max_peak",
                self.max_peak,
                "(0.0, 1.0]",
            ));
        }
        if self.silence_floor_dbfs.is_nan() || self.silence_floor_dbfs >= self.target_dbfs {
            return Err(RefineError::invalid_parameter(
                Stage::Normalization,
                "silence_floor_dbfs",
                self.silence_floor_dbfs,
                format!("< target_dbfs ({})", self.target_dbfs),
            ));
        }
        Ok(())
    }
}

/// Loudness metadata returned from normalization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessMetadata {
    /// Level before gain
    pub input: LoudnessMeasurement,

    /// Level after gain
    pub output: LoudnessMeasurement,

    /// Gain applied in dB
    pub gain_db: f32,

    /// True if the RMS-driven gain would have pushed the peak past `max_peak`
    /// and the smaller clip-safe gain was used instead
    pub clip_limited: bool,
}

/// Normalize a buffer to the target RMS level in place
///
/// # Arguments
///
/// * `buffer` - Audio to normalize (modified in place)
/// * `config` - Target level, peak ceiling and silence floor
///
/// # Returns
///
/// `LoudnessMetadata` with the levels before and after and the applied gain
///
/// # Errors
///
/// - `InvalidParameter` if `target_dbfs` is outside [-30, -6] or another
///   parameter is out of range
/// - `SilentInput` if the buffer's RMS is below the silence floor
pub fn normalize(buffer: &mut SampleBuffer, config: &NormalizationConfig) -> Result<LoudnessMetadata, RefineError> {
    config.validate()?;

    let samples = buffer.samples_mut();
    let current_rms = rms(samples);
    let current_rms_db = amplitude_to_dbfs(current_rms);

    if samples.is_empty() || current_rms_db < config.silence_floor_dbfs {
        log::warn!(
            "Input RMS {:.1} dBFS below silence floor {:.1} dBFS, cannot normalize",
            current_rms_db,
            config.silence_floor_dbfs
        );
        return Err(RefineError::SilentInput {
            rms_dbfs: current_rms_db,
        });
    }

    let input = LoudnessMeasurement::from_samples(samples);
    let current_peak = peak(samples) as f64;

    let mut gain_linear = 10.0_f64.powf((config.target_dbfs as f64 - 20.0 * (current_rms as f64).log10()) / 20.0);
    let mut clip_limited = false;

    // Check if gain would push the peak past the ceiling
    let ceiling = config.max_peak as f64;
    if current_peak * gain_linear > ceiling {
        gain_linear = ceiling / current_peak;
        clip_limited = true;
    }

    for sample in samples.iter_mut() {
        let scaled = ((*sample as f64) * gain_linear) as f32;
        // f32 rounding must not nudge the peak over the ceiling
        *sample = scaled.clamp(-config.max_peak, config.max_peak);
    }

    let gain_db = (20.0 * gain_linear.log10()) as f32;
    let output = LoudnessMeasurement::from_samples(samples);

    if clip_limited {
        log::warn!(
            "RMS normalization would clip, limiting gain to {:.2} dB (reached {:.2} dBFS of {:.2} target)",
            gain_db,
            output.rms_dbfs,
            config.target_dbfs
        );
    } else {
        log::debug!(
            "RMS normalization: rms={:.2} dBFS, gain={:.2} dB, result={:.2} dBFS",
            input.rms_dbfs,
            gain_db,
            output.rms_dbfs
        );
    }

    Ok(LoudnessMetadata {
        input,
        output,
        gain_db,
        clip_limited,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Generate a test signal: sine wave at 440 Hz
    fn generate_test_signal(length: usize, amplitude: f32, sample_rate: f32) -> Vec<f32> {
        let freq = 440.0;
        (0..length)
            .map(|i| {
                let t = i as f32 / sample_rate;
                amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    fn config(target_dbfs: f32) -> NormalizationConfig {
        NormalizationConfig {
            target_dbfs,
            ..Default::default()
        }
    }

    #[test]
    fn test_rms_normalization_hits_target() {
        for (amplitude, target) in [(0.01, -18.0), (0.3, -24.0), (0.05, -6.0), (0.9, -30.0)] {
            let mut buffer = SampleBuffer::mono(generate_test_signal(22050, amplitude, 22050.0), 22050).unwrap();
            let metadata = normalize(&mut buffer, &config(target)).unwrap();

            assert!(!metadata.clip_limited);
            let rms_db = buffer.measure().rms_dbfs;
            assert!(
                (rms_db - target).abs() < 0.5,
                "RMS normalization failed: expected ~{:.1}, got {:.2}",
                target,
                rms_db
            );
        }
    }

    #[test]
    fn test_gain_reported() {
        // sine at 0.1 peak is about -23 dBFS RMS
        let mut buffer = SampleBuffer::mono(generate_test_signal(22050, 0.1, 22050.0), 22050).unwrap();
        let metadata = normalize(&mut buffer, &config(-18.0)).unwrap();
        let expected_gain = -18.0 - metadata.input.rms_dbfs;
        assert!((metadata.gain_db - expected_gain).abs() < 0.01);
        assert!((metadata.output.rms_dbfs - -18.0).abs() < 0.01);
    }

    #[test]
    fn test_clip_avoidance() {
        // a single spike over a quiet bed: reaching -6 dBFS RMS would clip
        let mut samples = generate_test_signal(22050, 0.01, 22050.0);
        samples[1000] = 0.5;
        let mut buffer = SampleBuffer::mono(samples, 22050).unwrap();
        let metadata = normalize(&mut buffer, &config(-6.0)).unwrap();

        assert!(metadata.clip_limited);
        let new_peak = peak(buffer.samples());
        assert!(new_peak <= 0.98, "peak {} over ceiling", new_peak);
        assert!((new_peak - 0.98).abs() < 1e-4);
        assert!(buffer.measure().rms_dbfs < -6.0);
    }

    #[test]
    fn test_silent_audio() {
        let mut buffer = SampleBuffer::mono(vec![0.0f32; 44100], 44100).unwrap();
        let result = normalize(&mut buffer, &config(-18.0));
        assert!(matches!(result, Err(RefineError::SilentInput { .. })));
    }

    #[test]
    fn test_ultra_quiet_audio() {
        // -70 dBFS peak is below the -60 dBFS silence floor
        let mut buffer = SampleBuffer::mono(generate_test_signal(44100, 3e-4, 44100.0), 44100).unwrap();
        let before = buffer.clone();
        let result = normalize(&mut buffer, &config(-18.0));
        assert!(matches!(result, Err(RefineError::SilentInput { .. })));
        assert_eq!(buffer, before, "failed normalization must not touch the buffer");
    }

    #[test]
    fn test_empty_samples() {
        let mut buffer = SampleBuffer::mono(vec![], 44100).unwrap();
        assert!(normalize(&mut buffer, &config(-18.0)).is_err());
    }

    #[test]
    fn test_target_out_of_range() {
        let mut buffer = SampleBuffer::mono(generate_test_signal(1000, 0.5, 44100.0), 44100).unwrap();
        for target in [-5.0, -31.0, f32::NAN] {
            let result = normalize(&mut buffer, &config(target));
            assert!(
                matches!(result, Err(RefineError::InvalidParameter { parameter: "target_dbfs", .. })),
                "target {} accepted",
                target
            );
        }
    }
}
