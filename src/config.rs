//! Configuration for a refinement run

use crate::error::RefineError;
use crate::io::container::Container;
use crate::io::encoder::SUPPORTED_BIT_DEPTHS;
use crate::io::sample_buffer::MAX_CHANNELS;
use crate::preprocessing::compressor::CompressorConfig;
use crate::preprocessing::noise_reduction::NoiseReductionConfig;
use crate::preprocessing::normalization::NormalizationConfig;
use serde::{Deserialize, Serialize};

/// Output format of a refinement run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output sample rate in Hz (default: 22050)
    pub sample_rate: u32,

    /// Output channel count, 1 or 2 (default: 1)
    pub channels: u16,

    /// Output bit depth, 16, 24 or 32 (default: 16)
    pub bit_depth: u16,

    /// Output container (default: Wav)
    pub container: Container,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            channels: 1,
            bit_depth: 16,
            container: Container::Wav,
        }
    }
}

impl OutputConfig {
    /// Check the target format is representable
    pub fn validate(&self) -> Result<(), RefineError> {
        if self.sample_rate == 0 {
            return Err(RefineError::InvalidTargetSpec(
                "output sample rate must be positive".to_string(),
            ));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(RefineError::InvalidTargetSpec(format!(
                "output channel count {} not supported (expected 1 or 2)",
                self.channels
            )));
        }
        if self.container != Container::Wav {
            return Err(RefineError::UnsupportedFormat(format!(
                "cannot encode {} output (only wav is supported)",
                self.container
            )));
        }
        if !SUPPORTED_BIT_DEPTHS.contains(&self.bit_depth) {
            return Err(RefineError::UnsupportedFormat(format!(
                "cannot encode {}-bit PCM (supported: {:?})",
                self.bit_depth, SUPPORTED_BIT_DEPTHS
            )));
        }
        Ok(())
    }
}

/// Full configuration bundle for one refinement run
///
/// A plain value: clone it per run when refining clips in parallel.
///
/// # Example
///
/// ```
/// use speech_refine::RefineConfig;
///
/// let mut config = RefineConfig::default();
/// config.normalization.target_dbfs = -20.0;
/// config.compressor.enabled = false;
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Noise reduction stage
    pub noise_reduction: NoiseReductionConfig,

    /// Loudness normalization stage
    pub normalization: NormalizationConfig,

    /// Dynamics compression stage
    pub compressor: CompressorConfig,

    /// Output format (also the resampler target)
    pub output: OutputConfig,
}

impl RefineConfig {
    /// Validate every stage configuration
    ///
    /// Disabled stages are still validated so a config never silently carries
    /// values that would fail once the stage is switched on.
    pub fn validate(&self) -> Result<(), RefineError> {
        self.output.validate()?;
        self.noise_reduction.validate()?;
        self.normalization.validate()?;
        self.compressor.validate()?;
        Ok(())
    }
}
