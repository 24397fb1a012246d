//! Audio encoding to integer PCM WAV

use super::container::Container;
use super::sample_buffer::SampleBuffer;
use crate::error::RefineError;
use std::io::Cursor;

/// Bit depths the encoder can write
pub const SUPPORTED_BIT_DEPTHS: [u16; 3] = [16, 24, 32];

/// Encode a buffer into an in-memory container
///
/// Samples are clamped to [-1.0, 1.0] and quantized to signed integer PCM.
///
/// # Errors
///
/// `UnsupportedFormat` if the container is not WAV or the bit depth is not
/// 16, 24 or 32.
pub fn encode(buffer: &SampleBuffer, container: Container, bit_depth: u16) -> Result<Vec<u8>, RefineError> {
    if container != Container::Wav {
        return Err(RefineError::UnsupportedFormat(format!(
            "cannot encode to {} (only wav output is supported)",
            container
        )));
    }
    if !SUPPORTED_BIT_DEPTHS.contains(&bit_depth) {
        return Err(RefineError::UnsupportedFormat(format!(
            "{}-bit PCM is not supported (expected 16, 24 or 32)",
            bit_depth
        )));
    }

    let spec = hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: bit_depth,
        sample_format: hound::SampleFormat::Int,
    };

    log::debug!(
        "Encoding {} frames as {}-bit {} ({} ch, {} Hz)",
        buffer.frames(),
        bit_depth,
        container,
        spec.channels,
        spec.sample_rate
    );

    let mut cursor = Cursor::new(Vec::with_capacity(44 + buffer.samples().len() * bit_depth as usize / 8));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        let scale = ((1i64 << (bit_depth - 1)) - 1) as f64;
        for &sample in buffer.samples() {
            let value = quantize(sample, scale);
            if bit_depth == 16 {
                writer.write_sample(value as i16)?;
            } else {
                writer.write_sample(value as i32)?;
            }
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

fn quantize(sample: f32, scale: f64) -> i64 {
    let clamped = if sample.is_finite() { sample.clamp(-1.0, 1.0) } else { 0.0 };
    (clamped as f64 * scale).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::decoder::decode;

    #[test]
    fn test_encode_header() {
        let buffer = SampleBuffer::new(vec![0.0; 200], 22050, 2).unwrap();
        let bytes = encode(&buffer, Container::Wav, 16).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        // 100 stereo frames of 16-bit PCM after at least a canonical 44-byte header
        assert!(bytes.len() >= 44 + 400);
        assert_eq!(&bytes[bytes.len() - 400..], &[0u8; 400][..]);
    }

    #[test]
    fn test_encode_24_bit_precision() {
        let samples: Vec<f32> = (0..1000).map(|i| (i as f32 / 1000.0) - 0.5).collect();
        let buffer = SampleBuffer::mono(samples.clone(), 48000).unwrap();
        let bytes = encode(&buffer, Container::Wav, 24).unwrap();
        let decoded = decode(&bytes, Some(Container::Wav)).unwrap();

        let max_err = samples
            .iter()
            .zip(decoded.samples())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1e-6, "24-bit error too large: {}", max_err);
    }

    #[test]
    fn test_clamps_out_of_range() {
        let buffer = SampleBuffer::mono(vec![1.5, -1.5, f32::NAN], 8000).unwrap();
        let bytes = encode(&buffer, Container::Wav, 16).unwrap();
        let decoded = decode(&bytes, None).unwrap();
        assert!((decoded.samples()[0] - 1.0).abs() < 1e-3);
        assert!((decoded.samples()[1] + 1.0).abs() < 1e-3);
        assert_eq!(decoded.samples()[2], 0.0);
    }

    #[test]
    fn test_unsupported_targets() {
        let buffer = SampleBuffer::mono(vec![0.0; 10], 8000).unwrap();
        assert!(matches!(
            encode(&buffer, Container::Mp3, 16),
            Err(RefineError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            encode(&buffer, Container::Wav, 12),
            Err(RefineError::UnsupportedFormat(_))
        ));
    }
}
