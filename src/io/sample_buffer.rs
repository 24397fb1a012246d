//! Canonical in-memory sample buffer
//!
//! Interleaved `f32` samples in [-1.0, 1.0] with a known sample rate and
//! channel count. Every stage consumes and produces this type.

use crate::analysis::loudness::LoudnessMeasurement;
use crate::error::RefineError;

/// Largest channel count the engine handles
pub const MAX_CHANNELS: u16 = 2;

/// Interleaved audio buffer
///
/// Invariant: `samples.len()` is always a multiple of `channels`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl SampleBuffer {
    /// Create a buffer from interleaved samples
    ///
    /// # Errors
    ///
    /// `InvalidTargetSpec` for a zero sample rate or a channel count outside 1..=2,
    /// `CorruptInput` if the sample count is not a whole number of frames.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self, RefineError> {
        validate_layout(sample_rate, channels)?;
        if samples.len() % channels as usize != 0 {
            return Err(RefineError::CorruptInput(format!(
                "{} samples is not a whole number of {}-channel frames",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Create a mono buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self, RefineError> {
        Self::new(samples, sample_rate, 1)
    }

    /// Create a buffer from planar channel data
    ///
    /// All channels must have the same length.
    pub fn from_channels(planes: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, RefineError> {
        let channels = u16::try_from(planes.len()).map_err(|_| {
            RefineError::InvalidTargetSpec(format!("{} channels", planes.len()))
        })?;
        validate_layout(sample_rate, channels)?;

        let frames = planes[0].len();
        if planes.iter().any(|p| p.len() != frames) {
            return Err(RefineError::CorruptInput(
                "channel planes have different lengths".to_string(),
            ));
        }

        let mut samples = Vec::with_capacity(frames * planes.len());
        for i in 0..frames {
            for plane in &planes {
                samples.push(plane[i]);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Mutable interleaved samples
    ///
    /// The length cannot change through this view, so the frame invariant holds.
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Consume the buffer, returning the interleaved samples
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// True if the buffer holds no frames
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Copy one channel out as a planar vector
    pub fn channel(&self, index: usize) -> Vec<f32> {
        self.samples
            .iter()
            .skip(index)
            .step_by(self.channels as usize)
            .copied()
            .collect()
    }

    /// Split into planar channel vectors
    pub fn to_channels(&self) -> Vec<Vec<f32>> {
        (0..self.channels as usize).map(|c| self.channel(c)).collect()
    }

    /// Overwrite one channel from planar data of the same length
    pub(crate) fn write_channel(&mut self, index: usize, plane: &[f32]) {
        let channels = self.channels as usize;
        for (frame, &value) in plane.iter().enumerate().take(self.frames()) {
            self.samples[frame * channels + index] = value;
        }
    }

    /// RMS and peak level of the whole buffer
    pub fn measure(&self) -> LoudnessMeasurement {
        LoudnessMeasurement::from_samples(&self.samples)
    }

    /// True if every sample is a finite number
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }
}

fn validate_layout(sample_rate: u32, channels: u16) -> Result<(), RefineError> {
    if sample_rate == 0 {
        return Err(RefineError::InvalidTargetSpec(
            "sample rate must be positive".to_string(),
        ));
    }
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(RefineError::InvalidTargetSpec(format!(
            "channel count {} not supported (expected 1 or 2)",
            channels
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_partial_frame() {
        let result = SampleBuffer::new(vec![0.0; 3], 44100, 2);
        assert!(matches!(result, Err(RefineError::CorruptInput(_))));
    }

    #[test]
    fn test_rejects_bad_layout() {
        assert!(matches!(
            SampleBuffer::new(vec![0.0; 4], 0, 1),
            Err(RefineError::InvalidTargetSpec(_))
        ));
        assert!(matches!(
            SampleBuffer::new(vec![0.0; 6], 44100, 3),
            Err(RefineError::InvalidTargetSpec(_))
        ));
    }

    #[test]
    fn test_planar_round_trip() {
        let left = vec![0.1, 0.2, 0.3];
        let right = vec![-0.1, -0.2, -0.3];
        let buffer = SampleBuffer::from_channels(vec![left.clone(), right.clone()], 48000).unwrap();

        assert_eq!(buffer.samples(), &[0.1, -0.1, 0.2, -0.2, 0.3, -0.3]);
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.channel(0), left);
        assert_eq!(buffer.channel(1), right);
    }

    #[test]
    fn test_write_channel() {
        let mut buffer = SampleBuffer::new(vec![0.0; 6], 8000, 2).unwrap();
        buffer.write_channel(1, &[1.0, 2.0, 3.0]);
        assert_eq!(buffer.samples(), &[0.0, 1.0, 0.0, 2.0, 0.0, 3.0]);
    }

    #[test]
    fn test_duration() {
        let buffer = SampleBuffer::new(vec![0.0; 44100 * 2], 44100, 2).unwrap();
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);
    }
}
