//! Channel layout conversion (stereo to mono and back)

use crate::error::RefineError;
use crate::io::sample_buffer::{SampleBuffer, MAX_CHANNELS};

/// Average interleaved frames down to one channel
///
/// Averaging keeps correlated content at its level instead of dropping a side.
pub fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Duplicate a mono signal into interleaved stereo
pub fn mono_to_stereo(samples: &[f32]) -> Vec<f32> {
    samples.iter().flat_map(|&s| [s, s]).collect()
}

/// Convert a buffer to the given channel count
///
/// Returns the input untouched when the count already matches.
///
/// # Errors
///
/// `InvalidTargetSpec` if `target_channels` is not 1 or 2.
pub fn convert_channels(buffer: SampleBuffer, target_channels: u16) -> Result<SampleBuffer, RefineError> {
    if target_channels == 0 || target_channels > MAX_CHANNELS {
        return Err(RefineError::InvalidTargetSpec(format!(
            "target channel count {} not supported (expected 1 or 2)",
            target_channels
        )));
    }

    let channels = buffer.channels();
    if channels == target_channels {
        return Ok(buffer);
    }

    log::debug!("Converting {} -> {} channels", channels, target_channels);

    let sample_rate = buffer.sample_rate();
    let samples = if target_channels < channels {
        mix_to_mono(buffer.samples(), channels as usize)
    } else {
        mono_to_stereo(buffer.samples())
    };

    SampleBuffer::new(samples, sample_rate, target_channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixdown_averages() {
        let stereo = SampleBuffer::new(vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 44100, 2).unwrap();
        let mono = convert_channels(stereo, 1).unwrap();
        assert_eq!(mono.channels(), 1);
        assert_eq!(mono.samples(), &[0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_mixdown_preserves_correlated_level() {
        let frames: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let stereo = SampleBuffer::from_channels(vec![frames.clone(), frames.clone()], 16000).unwrap();
        let mono = convert_channels(stereo, 1).unwrap();
        assert_eq!(mono.samples(), frames.as_slice());
    }

    #[test]
    fn test_upmix_duplicates() {
        let mono = SampleBuffer::mono(vec![0.1, 0.2], 8000).unwrap();
        let stereo = convert_channels(mono, 2).unwrap();
        assert_eq!(stereo.samples(), &[0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_same_layout_untouched() {
        let mono = SampleBuffer::mono(vec![0.1, 0.2, 0.3], 8000).unwrap();
        let out = convert_channels(mono.clone(), 1).unwrap();
        assert_eq!(out, mono);
    }

    #[test]
    fn test_invalid_target() {
        let mono = SampleBuffer::mono(vec![0.0; 4], 8000).unwrap();
        assert!(matches!(
            convert_channels(mono, 3),
            Err(RefineError::InvalidTargetSpec(_))
        ));
    }
}
