//! Signal processing stages
//!
//! Each stage works on a [`SampleBuffer`](crate::io::SampleBuffer):
//! - Channel mixing (stereo to mono and back)
//! - Resampling (band-limited rate conversion)
//! - Noise reduction (STFT spectral subtraction)
//! - Normalization (RMS target with peak ceiling)
//! - Compression (soft-knee dynamics)

pub mod channel_mixer;
pub mod compressor;
pub mod noise_reduction;
pub mod normalization;
pub mod resample;
