//! Audio I/O modules
//!
//! Decoding with Symphonia and hound, WAV encoding with hound, and the
//! canonical sample buffer every stage works on.

pub mod container;
pub mod decoder;
pub mod encoder;
pub mod sample_buffer;

pub use container::Container;
pub use sample_buffer::SampleBuffer;

use crate::error::RefineError;

/// Byte-level codec adapter used by the pipeline
///
/// The DSP stages never depend on how bytes become samples; a host can swap
/// in its own implementation (for example one backed by a platform codec).
pub trait AudioCodec: Send + Sync {
    /// Decode a complete clip
    fn decode(&self, bytes: &[u8], expected: Option<Container>) -> Result<SampleBuffer, RefineError>;

    /// Encode a buffer into the target container at the given bit depth
    fn encode(&self, buffer: &SampleBuffer, container: Container, bit_depth: u16) -> Result<Vec<u8>, RefineError>;
}

/// Codec linked into the crate: hound for WAV, Symphonia for everything else
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

impl AudioCodec for NativeCodec {
    fn decode(&self, bytes: &[u8], expected: Option<Container>) -> Result<SampleBuffer, RefineError> {
        decoder::decode(bytes, expected)
    }

    fn encode(&self, buffer: &SampleBuffer, container: Container, bit_depth: u16) -> Result<Vec<u8>, RefineError> {
        encoder::encode(buffer, container, bit_depth)
    }
}
