//! Level measurement in dBFS

use serde::{Deserialize, Serialize};

/// Lowest level reported, used for digital silence
pub const MIN_DBFS: f32 = -120.0;

/// Convert a linear amplitude to dBFS, floored at [`MIN_DBFS`]
pub fn amplitude_to_dbfs(amplitude: f32) -> f32 {
    if amplitude <= 0.0 {
        return MIN_DBFS;
    }
    (20.0 * amplitude.log10()).max(MIN_DBFS)
}

/// Convert dBFS to a linear amplitude
pub fn dbfs_to_amplitude(dbfs: f32) -> f32 {
    10.0_f32.powf(dbfs / 20.0)
}

/// Root-mean-square of a slice (0.0 for an empty slice)
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&x| (x as f64) * (x as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Largest absolute sample value
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|&x| x.abs()).fold(0.0f32, f32::max)
}

/// RMS and peak level of a buffer
///
/// `peak_dbfs >= rms_dbfs` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessMeasurement {
    /// RMS level in dBFS
    pub rms_dbfs: f32,
    /// Peak level in dBFS
    pub peak_dbfs: f32,
}

impl LoudnessMeasurement {
    /// Measure interleaved samples
    pub fn from_samples(samples: &[f32]) -> Self {
        let peak_dbfs = amplitude_to_dbfs(peak(samples));
        // rounding in the mean can push a constant signal's RMS a hair above its peak
        let rms_dbfs = amplitude_to_dbfs(rms(samples)).min(peak_dbfs);
        Self {
            rms_dbfs,
            peak_dbfs,
        }
    }

    /// Peak-to-RMS ratio in dB
    pub fn crest_factor_db(&self) -> f32 {
        self.peak_dbfs - self.rms_dbfs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, amplitude: f32, sample_rate: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_sine_levels() {
        let samples = sine(44100, 0.5, 44100.0);
        let m = LoudnessMeasurement::from_samples(&samples);

        // RMS of a sine is A / sqrt(2), 3.01 dB below its peak
        assert!((m.peak_dbfs - amplitude_to_dbfs(0.5)).abs() < 0.01);
        assert!((m.crest_factor_db() - 3.01).abs() < 0.05, "crest = {}", m.crest_factor_db());
    }

    #[test]
    fn test_silence_is_floored() {
        let m = LoudnessMeasurement::from_samples(&[0.0; 128]);
        assert_eq!(m.rms_dbfs, MIN_DBFS);
        assert_eq!(m.peak_dbfs, MIN_DBFS);
    }

    #[test]
    fn test_peak_never_below_rms() {
        let m = LoudnessMeasurement::from_samples(&[0.3; 1000]);
        assert!(m.peak_dbfs >= m.rms_dbfs);
    }

    #[test]
    fn test_db_conversions() {
        assert!((dbfs_to_amplitude(-6.0206) - 0.5).abs() < 1e-4);
        assert!((amplitude_to_dbfs(1.0)).abs() < 1e-6);
        assert_eq!(amplitude_to_dbfs(0.0), MIN_DBFS);
    }
}
