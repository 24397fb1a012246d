//! Audio decoding
//!
//! WAV goes through `hound`; every other container through Symphonia.
//! Decoding only turns bytes into a [`SampleBuffer`]; reading files is the
//! caller's job.

use super::container::Container;
use super::sample_buffer::{SampleBuffer, MAX_CHANNELS};
use crate::error::RefineError;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer as InterleavedBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decode an encoded clip into a canonical buffer
///
/// # Arguments
///
/// * `bytes` - Complete encoded clip
/// * `expected` - Declared container, or `None` to detect it from the bytes
///
/// # Errors
///
/// - `UnsupportedFormat` if no container was declared and none can be recognized,
///   or the codec is not supported
/// - `CorruptInput` if the bytes cannot be parsed into frames (truncated data,
///   damaged headers, no decodable audio)
pub fn decode(bytes: &[u8], expected: Option<Container>) -> Result<SampleBuffer, RefineError> {
    if bytes.is_empty() {
        return Err(RefineError::CorruptInput("empty input".to_string()));
    }

    let container = expected.or_else(|| Container::sniff(bytes));
    log::debug!(
        "Decoding {} bytes (declared: {:?}, resolved: {:?})",
        bytes.len(),
        expected,
        container
    );

    let buffer = match container {
        Some(Container::Wav) => decode_wav(bytes)?,
        Some(other) => decode_symphonia(bytes, Some(other)).map_err(|e| match e {
            // the caller vouched for the container, so unparseable bytes are damage
            RefineError::UnsupportedFormat(msg) if expected.is_some() => {
                RefineError::CorruptInput(format!("not a valid {} stream: {}", other, msg))
            }
            e => e,
        })?,
        None => decode_symphonia(bytes, None)?,
    };

    if buffer.is_empty() {
        return Err(RefineError::CorruptInput(
            "stream contains no audio frames".to_string(),
        ));
    }

    log::debug!(
        "Decoded {} frames, {} ch at {} Hz ({:.3}s)",
        buffer.frames(),
        buffer.channels(),
        buffer.sample_rate(),
        buffer.duration_secs()
    );

    Ok(buffer)
}

fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, RefineError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
        return Err(RefineError::CorruptInput(format!(
            "WAV header declares {} channels at {} bits",
            spec.channels, spec.bits_per_sample
        )));
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_value))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    into_buffer(samples, spec.sample_rate, spec.channels as usize)
}

fn decode_symphonia(bytes: &[u8], hint_container: Option<Container>) -> Result<SampleBuffer, RefineError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(container) = hint_container {
        hint.with_extension(container.extension());
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
    let mut format = probed.format;

    let (track_id, codec_params) = {
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| RefineError::UnsupportedFormat("no supported audio track".to_string()))?;
        (track.id, track.codec_params.clone())
    };

    let mut decoder = symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let declared_frames = codec_params.n_frames;
    let mut interleaved: Vec<f32> = Vec::new();
    let mut decoded_frames = 0u64;
    let mut decode_errors = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if channels != 0 && spec.channels.count() != channels && !interleaved.is_empty() {
                    return Err(RefineError::CorruptInput(format!(
                        "channel count changed mid-stream ({} -> {})",
                        channels,
                        spec.channels.count()
                    )));
                }
                channels = spec.channels.count();
                sample_rate = Some(spec.rate);

                decoded_frames += decoded.frames() as u64;
                let mut buf = InterleavedBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                decode_errors += 1;
                log::debug!("Skipping undecodable packet: {}", msg);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if interleaved.is_empty() {
        return Err(RefineError::CorruptInput(format!(
            "no decodable audio frames ({} packet errors)",
            decode_errors
        )));
    }
    // the stream ran out before the length its header promised
    if let Some(declared) = declared_frames {
        if decoded_frames < declared {
            return Err(RefineError::CorruptInput(format!(
                "stream truncated: decoded {} of {} declared frames",
                decoded_frames, declared
            )));
        }
    }
    if decode_errors > 0 {
        log::warn!("{} packets could not be decoded and were skipped", decode_errors);
    }

    let sample_rate = sample_rate
        .ok_or_else(|| RefineError::CorruptInput("stream has no sample rate".to_string()))?;

    into_buffer(interleaved, sample_rate, channels)
}

/// Build the canonical buffer, averaging sources wider than stereo down to mono
fn into_buffer(samples: Vec<f32>, sample_rate: u32, channels: usize) -> Result<SampleBuffer, RefineError> {
    if channels == 0 || sample_rate == 0 {
        return Err(RefineError::CorruptInput(format!(
            "stream declares {} channels at {} Hz",
            channels, sample_rate
        )));
    }
    if samples.len() % channels != 0 {
        return Err(RefineError::CorruptInput(format!(
            "truncated frame: {} samples for {} channels",
            samples.len(),
            channels
        )));
    }

    if channels > MAX_CHANNELS as usize {
        log::warn!("Downmixing {}-channel source to mono", channels);
        let mono = samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        return SampleBuffer::mono(mono, sample_rate);
    }

    SampleBuffer::new(samples, sample_rate, channels as u16)
}
