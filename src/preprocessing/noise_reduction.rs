//! Stationary noise reduction by spectral subtraction
//!
//! Algorithm:
//! 1. Split each channel into overlapping Hann-windowed frames (STFT)
//! 2. Rank the frames lying fully inside the signal by RMS and take the
//!    quietest fraction as background-only audio
//! 3. Average their power spectra into a per-bin noise estimate
//! 4. Subtract `strength` × noise power from every frame's power spectrum,
//!    never going below zero
//! 5. Inverse FFT and weighted overlap-add, normalized by the summed squared
//!    window so unmodified frames reconstruct the input exactly
//!
//! # Reference
//!
//! Boll, S. F. (1979). Suppression of Acoustic Noise in Speech Using Spectral
//! Subtraction. *IEEE Transactions on Acoustics, Speech, and Signal Processing*, 27(2), 113-120.

use crate::analysis::loudness::{amplitude_to_dbfs, dbfs_to_amplitude, rms};
use crate::error::{RefineError, Stage};
use crate::io::sample_buffer::SampleBuffer;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Numerical stability epsilon
const EPSILON: f32 = 1e-10;

/// Noise reduction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseReductionConfig {
    /// Run the stage at all (default: true)
    pub enabled: bool,

    /// Fraction of the estimated noise power to subtract, in [0, 1] (default: 0.5)
    pub strength: f32,

    /// Analysis window length in samples (default: 1024)
    pub frame_size: usize,

    /// Hop between windows in samples, at most half a window (default: 256)
    pub hop_size: usize,

    /// Fraction of the quietest frames used as the noise profile, in (0, 1] (default: 0.15)
    ///
    /// Typical speech clips leave 10-20% of their frames as pauses. The fraction
    /// counts only frames that are not exact digital silence.
    pub noise_frame_fraction: f32,
}

impl Default for NoiseReductionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strength: 0.5,
            frame_size: 1024,
            hop_size: 256,
            noise_frame_fraction: 0.15,
        }
    }
}

impl NoiseReductionConfig {
    /// Check every parameter against its accepted range
    pub fn validate(&self) -> Result<(), RefineError> {
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(RefineError::invalid_parameter(
                Stage::NoiseReduction,
                "strength",
                self.strength,
                "[0.0, 1.0]",
            ));
        }
        if self.frame_size < 16 {
            return Err(RefineError::invalid_parameter(
                Stage::NoiseReduction,
                "frame_size",
                self.frame_size as f64,
                ">= 16",
            ));
        }
        if self.hop_size == 0 || self.hop_size > self.frame_size / 2 {
            return Err(RefineError::invalid_parameter(
                Stage::NoiseReduction,
                "hop_size",
                self.hop_size as f64,
                format!("[1, {}]", self.frame_size / 2),
            ));
        }
        if !(self.noise_frame_fraction > 0.0 && self.noise_frame_fraction <= 1.0) {
            return Err(RefineError::invalid_parameter(
                Stage::NoiseReduction,
                "noise_frame_fraction",
                self.noise_frame_fraction,
                "(0.0, 1.0]",
            ));
        }
        Ok(())
    }
}

/// Noise estimate for one channel
///
/// Computed once per invocation and dropped after use.
#[derive(Debug, Clone)]
pub struct NoiseProfile {
    /// Noise magnitude per FFT bin (`frame_size / 2 + 1` bins)
    pub bin_magnitudes: Vec<f32>,

    /// Start sample of every frame that went into the estimate
    pub frame_starts: Vec<usize>,

    /// Sample range `[start, end)` covering those frames, always within the channel
    pub region: (usize, usize),

    /// Time-domain RMS of the selected frames in dBFS
    pub noise_floor_dbfs: f32,
}

/// Outcome of a noise reduction pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoiseReductionMetadata {
    /// Estimated noise floor in dBFS (mean over channels), `None` when skipped
    pub noise_floor_dbfs: Option<f32>,

    /// Strength that was applied
    pub strength: f32,

    /// True if the buffer was shorter than one analysis window and passed through
    pub degraded: bool,
}

/// Reduce stationary background noise in place
///
/// # Arguments
///
/// * `buffer` - Audio to clean (modified in place; rate and channels unchanged)
/// * `config` - Window geometry, strength and noise-frame fraction
///
/// # Returns
///
/// Estimated noise floor and whether the stage ran in degraded mode
///
/// # Errors
///
/// `InvalidParameter` if `strength` (or any other parameter) is out of range.
/// A buffer shorter than one analysis window is not an error: it is returned
/// unchanged and flagged as degraded.
pub fn reduce_noise(
    buffer: &mut SampleBuffer,
    config: &NoiseReductionConfig,
) -> Result<NoiseReductionMetadata, RefineError> {
    config.validate()?;

    let frames = buffer.frames();
    if frames < config.frame_size {
        log::warn!(
            "Buffer shorter than one analysis window ({} < {} frames), skipping noise reduction",
            frames,
            config.frame_size
        );
        return Ok(NoiseReductionMetadata {
            noise_floor_dbfs: None,
            strength: config.strength,
            degraded: true,
        });
    }

    log::debug!(
        "Reducing noise: {} frames x {} ch, strength={:.2}, window={}, hop={}",
        frames,
        buffer.channels(),
        config.strength,
        config.frame_size,
        config.hop_size
    );

    let stft = Stft::new(config.frame_size, config.hop_size);
    let mut noise_power = 0.0f32;

    for ch in 0..buffer.channels() as usize {
        let plane = buffer.channel(ch);
        let profile = estimate_noise_profile(&plane, &stft, config.noise_frame_fraction).ok_or_else(|| {
            RefineError::InternalInvariantViolation {
                stage: Stage::NoiseReduction,
                detail: format!("channel {} shorter than its buffer", ch),
            }
        })?;
        noise_power += dbfs_to_amplitude(profile.noise_floor_dbfs).powi(2);

        log::debug!(
            "Channel {}: noise floor {:.1} dBFS from {} frames in samples {}..{}",
            ch,
            profile.noise_floor_dbfs,
            profile.frame_starts.len(),
            profile.region.0,
            profile.region.1
        );

        if config.strength > 0.0 {
            let cleaned = stft.subtract(&plane, &profile, config.strength);
            buffer.write_channel(ch, &cleaned);
        }
    }

    let noise_floor_dbfs = amplitude_to_dbfs((noise_power / buffer.channels() as f32).sqrt());

    Ok(NoiseReductionMetadata {
        noise_floor_dbfs: Some(noise_floor_dbfs),
        strength: config.strength,
        degraded: false,
    })
}

/// Estimate the noise spectrum of one channel from its quietest frames
///
/// Only frames lying entirely inside the signal are candidates, so zero padding
/// never passes for background noise. Frames of exact digital silence are
/// skipped too, unless the whole signal is silent. Returns `None` if `signal` is shorter
/// than one frame.
pub fn estimate_noise_profile(signal: &[f32], stft: &Stft, noise_frame_fraction: f32) -> Option<NoiseProfile> {
    let frame_size = stft.frame_size;
    let hop = stft.hop_size;
    if signal.len() < frame_size {
        return None;
    }
    let n_frames = (signal.len() - frame_size) / hop + 1;

    let all_frames: Vec<(usize, f32)> = (0..n_frames)
        .map(|k| {
            let start = k * hop;
            (start, rms(&signal[start..start + frame_size]))
        })
        .collect();

    // digital silence carries no background noise; rank it only if nothing else exists
    let mut ranked: Vec<(usize, f32)> = all_frames.iter().copied().filter(|&(_, level)| level > 0.0).collect();
    if ranked.is_empty() {
        ranked = all_frames;
    }
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let n_quiet = ((ranked.len() as f32 * noise_frame_fraction).ceil() as usize).clamp(1, ranked.len());
    let mut frame_starts: Vec<usize> = ranked[..n_quiet].iter().map(|&(start, _)| start).collect();
    frame_starts.sort_unstable();

    let n_bins = frame_size / 2 + 1;
    let mut power = vec![0.0f32; n_bins];
    let mut time_power = 0.0f32;
    let mut spectrum = vec![Complex::new(0.0f32, 0.0); frame_size];

    for &start in &frame_starts {
        let frame = &signal[start..start + frame_size];
        time_power += rms(frame).powi(2);

        stft.analyze(frame, &mut spectrum);
        for (p, bin) in power.iter_mut().zip(spectrum.iter()) {
            *p += bin.norm_sqr();
        }
    }

    let count = frame_starts.len() as f32;
    let bin_magnitudes = power.iter().map(|&p| (p / count).sqrt()).collect();
    let region = (
        frame_starts[0],
        frame_starts[frame_starts.len() - 1] + frame_size,
    );

    Some(NoiseProfile {
        bin_magnitudes,
        frame_starts,
        region,
        noise_floor_dbfs: amplitude_to_dbfs((time_power / count).sqrt()),
    })
}

/// Short-time Fourier transform with Hann windows and weighted overlap-add
pub struct Stft {
    frame_size: usize,
    hop_size: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl Stft {
    /// Plan forward and inverse transforms for the given geometry
    pub fn new(frame_size: usize, hop_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        // periodic Hann: squared copies sum to a constant at hop = frame / 4
        let window = (0..frame_size)
            .map(|n| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * n as f32 / frame_size as f32).cos())
            .collect();
        Self {
            frame_size,
            hop_size,
            window,
            forward: planner.plan_fft_forward(frame_size),
            inverse: planner.plan_fft_inverse(frame_size),
        }
    }

    /// Window a frame and transform it into `spectrum`
    fn analyze(&self, frame: &[f32], spectrum: &mut [Complex<f32>]) {
        for ((bin, &x), &w) in spectrum.iter_mut().zip(frame).zip(&self.window) {
            *bin = Complex::new(x * w, 0.0);
        }
        self.forward.process(spectrum);
    }

    /// Subtract the scaled noise power from every frame and resynthesize
    fn subtract(&self, signal: &[f32], profile: &NoiseProfile, strength: f32) -> Vec<f32> {
        let n = self.frame_size;
        let hop = self.hop_size;
        let lead = n - hop;
        let n_frames = (lead + signal.len()).div_ceil(hop);
        let padded_len = (n_frames - 1) * hop + n;

        let mut padded = vec![0.0f32; padded_len];
        padded[lead..lead + signal.len()].copy_from_slice(signal);

        let noise_power: Vec<f32> = profile
            .bin_magnitudes
            .iter()
            .map(|&m| strength * m * m)
            .collect();

        let mut output = vec![0.0f32; padded_len];
        let mut weight = vec![0.0f32; padded_len];
        let mut spectrum = vec![Complex::new(0.0f32, 0.0); n];
        let scale = 1.0 / n as f32;

        for k in 0..n_frames {
            let start = k * hop;
            self.analyze(&padded[start..start + n], &mut spectrum);

            for (i, bin) in spectrum.iter_mut().enumerate() {
                // real input: bin i mirrors bin n - i
                let mirrored = if i <= n / 2 { i } else { n - i };
                let power = bin.norm_sqr();
                let gain = if power > EPSILON {
                    ((power - noise_power[mirrored]).max(0.0) / power).sqrt()
                } else {
                    1.0
                };
                *bin *= gain;
            }

            self.inverse.process(&mut spectrum);

            for (j, (bin, &w)) in spectrum.iter().zip(&self.window).enumerate() {
                output[start + j] += bin.re * scale * w;
                weight[start + j] += w * w;
            }
        }

        output[lead..lead + signal.len()]
            .iter()
            .zip(&weight[lead..lead + signal.len()])
            .map(|(&y, &w)| if w > EPSILON { y / w } else { 0.0 })
            .collect()
    }
}
