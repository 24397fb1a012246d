//! Sample rate conversion using rubato
//!
//! Band-limited sinc interpolation. When downsampling, the sinc cutoff is
//! scaled to the new Nyquist frequency so content above it is removed before
//! decimation instead of folding back into the audible band.

use super::channel_mixer::convert_channels;
use crate::error::{RefineError, Stage};
use crate::io::sample_buffer::{SampleBuffer, MAX_CHANNELS};
use rubato::{
    Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};

/// Sinc filter length in taps
const SINC_LEN: usize = 256;

/// Filter cutoff relative to the lower of the two Nyquist frequencies
const F_CUTOFF: f32 = 0.95;

/// Convert a buffer to a target sample rate and channel count
///
/// Channels are mixed down (by averaging) before rate conversion and mixed up
/// (by duplication) after it. When both already match, the input is returned
/// unchanged. Output length is `round(frames * target_rate / sample_rate)`.
///
/// # Errors
///
/// - `InvalidTargetSpec` if `target_rate` is zero or `target_channels` is not 1 or 2
/// - `CorruptInput` if a non-empty clip is too short to yield a single frame at
///   `target_rate`
///
/// # Example
///
/// ```no_run
/// use speech_refine::io::SampleBuffer;
/// use speech_refine::preprocessing::resample::resample;
///
/// let buffer = SampleBuffer::new(vec![0.0f32; 44100 * 2], 44100, 2)?;
/// let mono = resample(buffer, 22050, 1)?;
/// assert_eq!(mono.frames(), 22050);
/// # Ok::<(), speech_refine::RefineError>(())
/// ```
pub fn resample(buffer: SampleBuffer, target_rate: u32, target_channels: u16) -> Result<SampleBuffer, RefineError> {
    if target_rate == 0 {
        return Err(RefineError::InvalidTargetSpec(
            "target sample rate must be positive".to_string(),
        ));
    }
    if target_channels == 0 || target_channels > MAX_CHANNELS {
        return Err(RefineError::InvalidTargetSpec(format!(
            "target channel count {} not supported (expected 1 or 2)",
            target_channels
        )));
    }

    log::debug!(
        "Resampling {} Hz/{} ch -> {} Hz/{} ch ({} frames)",
        buffer.sample_rate(),
        buffer.channels(),
        target_rate,
        target_channels,
        buffer.frames()
    );

    let buffer = if target_channels < buffer.channels() {
        convert_channels(buffer, target_channels)?
    } else {
        buffer
    };

    let buffer = if buffer.sample_rate() != target_rate {
        change_rate(buffer, target_rate)?
    } else {
        buffer
    };

    convert_channels(buffer, target_channels)
}

fn change_rate(buffer: SampleBuffer, target_rate: u32) -> Result<SampleBuffer, RefineError> {
    let ratio = target_rate as f64 / buffer.sample_rate() as f64;
    let frames = buffer.frames();
    let channels = buffer.channels();
    let expected = (frames as f64 * ratio).round() as usize;

    if frames == 0 {
        return SampleBuffer::new(Vec::new(), target_rate, channels);
    }
    if expected == 0 {
        return Err(RefineError::CorruptInput(format!(
            "clip too short for target rate: {} frames at {} Hz leave nothing at {} Hz",
            frames,
            buffer.sample_rate(),
            target_rate
        )));
    }

    // Trailing zeros flush the filter tail so the delay-compensated output
    // still covers every input frame.
    let pad = SINC_LEN + (4.0 / ratio).ceil() as usize;
    let chunk_size = frames + pad;

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: F_CUTOFF,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, chunk_size, channels as usize)
        .map_err(|e| {
            RefineError::InvalidTargetSpec(format!(
                "cannot resample {} Hz -> {} Hz: {}",
                buffer.sample_rate(),
                target_rate,
                e
            ))
        })?;

    let input: Vec<Vec<f32>> = buffer
        .to_channels()
        .into_iter()
        .map(|mut plane| {
            plane.resize(chunk_size, 0.0);
            plane
        })
        .collect();

    let output = resampler
        .process(&input, None)
        .map_err(|e| RefineError::InternalInvariantViolation {
            stage: Stage::Resample,
            detail: format!("resampler rejected input: {}", e),
        })?;

    let delay = resampler.output_delay();
    let planes: Vec<Vec<f32>> = output
        .into_iter()
        .map(|plane| {
            let mut aligned: Vec<f32> = plane.into_iter().skip(delay).take(expected).collect();
            aligned.resize(expected, 0.0);
            aligned
        })
        .collect();

    SampleBuffer::from_channels(planes, target_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::loudness::rms;

    fn sine(freq: f32, len: usize, amplitude: f32, sample_rate: u32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_same_rate_same_channels_is_identity() {
        let samples = sine(440.0, 4410, 0.5, 44100);
        let buffer = SampleBuffer::mono(samples.clone(), 44100).unwrap();
        let result = resample(buffer.clone(), 44100, 1).unwrap();
        assert_eq!(result, buffer);
    }

    #[test]
    fn test_downsample_length_and_level() {
        let buffer = SampleBuffer::mono(sine(440.0, 44100, 0.5, 44100), 44100).unwrap();
        let result = resample(buffer, 22050, 1).unwrap();

        assert_eq!(result.sample_rate(), 22050);
        assert_eq!(result.frames(), 22050);

        // passband level preserved away from the edges
        let middle = &result.samples()[2000..20000];
        let expected = 0.5 / 2.0f32.sqrt();
        assert!(
            (rms(middle) - expected).abs() < 0.01,
            "passband RMS {} vs {}",
            rms(middle),
            expected
        );
    }

    #[test]
    fn test_downsample_removes_content_above_nyquist() {
        // 15 kHz is above the 11.025 kHz Nyquist limit of the target rate
        let buffer = SampleBuffer::mono(sine(15000.0, 44100, 0.5, 44100), 44100).unwrap();
        let result = resample(buffer, 22050, 1).unwrap();

        let residual = rms(&result.samples()[2000..20000]);
        assert!(residual < 0.01, "aliased energy leaked through: RMS {}", residual);
    }

    #[test]
    fn test_upsample_length() {
        let buffer = SampleBuffer::mono(sine(440.0, 16000, 0.5, 16000), 16000).unwrap();
        let result = resample(buffer, 22050, 1).unwrap();
        assert_eq!(result.frames(), 22050);
        let middle = &result.samples()[2000..20000];
        assert!((rms(middle) - 0.5 / 2.0f32.sqrt()).abs() < 0.01);
    }

    #[test]
    fn test_stereo_to_mono_with_rate_change() {
        let left = sine(440.0, 48000, 0.5, 48000);
        let right = left.clone();
        let buffer = SampleBuffer::from_channels(vec![left, right], 48000).unwrap();
        let result = resample(buffer, 22050, 1).unwrap();

        assert_eq!(result.channels(), 1);
        assert_eq!(result.frames(), 22050);
        assert!((rms(&result.samples()[2000..20000]) - 0.5 / 2.0f32.sqrt()).abs() < 0.01);
    }

    #[test]
    fn test_mono_to_stereo() {
        let buffer = SampleBuffer::mono(sine(440.0, 8000, 0.5, 8000), 8000).unwrap();
        let result = resample(buffer, 16000, 2).unwrap();
        assert_eq!(result.channels(), 2);
        assert_eq!(result.frames(), 16000);
        assert_eq!(result.channel(0), result.channel(1));
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = SampleBuffer::mono(vec![], 44100).unwrap();
        let result = resample(buffer, 22050, 1).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.sample_rate(), 22050);
    }

    #[test]
    fn test_clip_shorter_than_one_output_frame() {
        // one frame at 48 kHz rounds to zero frames at 16 kHz
        let buffer = SampleBuffer::mono(vec![0.5], 48000).unwrap();
        assert!(matches!(
            resample(buffer, 16000, 1),
            Err(RefineError::CorruptInput(_))
        ));
    }

    #[test]
    fn test_invalid_target_spec() {
        let buffer = SampleBuffer::mono(vec![0.0; 100], 44100).unwrap();
        assert!(matches!(
            resample(buffer.clone(), 0, 1),
            Err(RefineError::InvalidTargetSpec(_))
        ));
        assert!(matches!(
            resample(buffer, 22050, 3),
            Err(RefineError::InvalidTargetSpec(_))
        ));
    }
}
