//! Error types for the refinement engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage, used to attribute errors, timings and log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Container/codec decoding
    Decode,
    /// Sample rate and channel layout conversion
    Resample,
    /// Spectral noise reduction
    NoiseReduction,
    /// RMS loudness normalization
    Normalization,
    /// Dynamics compression
    Compression,
    /// Container encoding
    Encode,
}

impl Stage {
    /// Stable lowercase name of the stage
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Decode => "decode",
            Stage::Resample => "resample",
            Stage::NoiseReduction => "noise_reduction",
            Stage::Normalization => "normalization",
            Stage::Compression => "compression",
            Stage::Encode => "encode",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur during refinement
#[derive(Debug, Clone, PartialEq)]
pub enum RefineError {
    /// Container or codec not recognized, or output spec not representable
    UnsupportedFormat(String),

    /// Byte stream could not be parsed into valid audio frames
    CorruptInput(String),

    /// Requested sample rate or channel layout is invalid
    InvalidTargetSpec(String),

    /// A stage parameter is outside its accepted range
    InvalidParameter {
        /// Stage that rejected the parameter
        stage: Stage,
        /// Parameter name as it appears in the configuration
        parameter: &'static str,
        /// Offending value
        value: f64,
        /// Accepted range, human readable
        expected: String,
    },

    /// Input is too quiet for a stable gain computation
    SilentInput {
        /// Measured RMS level of the input
        rms_dbfs: f32,
    },

    /// A stage broke a buffer invariant; this is a bug in the pipeline
    InternalInvariantViolation {
        /// Stage after which the violation was detected
        stage: Stage,
        /// What was wrong
        detail: String,
    },
}

impl RefineError {
    pub(crate) fn invalid_parameter(
        stage: Stage,
        parameter: &'static str,
        value: impl Into<f64>,
        expected: impl Into<String>,
    ) -> Self {
        RefineError::InvalidParameter {
            stage,
            parameter,
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// True for errors caused by a defect in the engine rather than by the caller
    pub fn is_defect(&self) -> bool {
        matches!(self, RefineError::InternalInvariantViolation { .. })
    }
}

impl fmt::Display for RefineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefineError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            RefineError::CorruptInput(msg) => write!(f, "Corrupt input: {}", msg),
            RefineError::InvalidTargetSpec(msg) => write!(f, "Invalid target spec: {}", msg),
            RefineError::InvalidParameter {
                stage,
                parameter,
                value,
                expected,
            } => write!(
                f,
                "Invalid parameter in {} stage: {} = {} (expected {})",
                stage, parameter, value, expected
            ),
            RefineError::SilentInput { rms_dbfs } => {
                write!(f, "Silent input: RMS {:.1} dBFS is below the silence floor", rms_dbfs)
            }
            RefineError::InternalInvariantViolation { stage, detail } => {
                write!(f, "Internal invariant violation after {} stage: {}", stage, detail)
            }
        }
    }
}

impl std::error::Error for RefineError {}

impl From<hound::Error> for RefineError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::Unsupported => {
                RefineError::UnsupportedFormat("unsupported WAV encoding".to_string())
            }
            hound::Error::InvalidSampleFormat => {
                RefineError::UnsupportedFormat("invalid WAV sample format".to_string())
            }
            hound::Error::TooWide => {
                RefineError::UnsupportedFormat("WAV sample width too large".to_string())
            }
            other => RefineError::CorruptInput(format!("WAV: {}", other)),
        }
    }
}

impl From<symphonia::core::errors::Error> for RefineError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error as SymphoniaError;
        match err {
            SymphoniaError::Unsupported(what) => RefineError::UnsupportedFormat(what.to_string()),
            SymphoniaError::DecodeError(what) => RefineError::CorruptInput(what.to_string()),
            SymphoniaError::IoError(e) => RefineError::CorruptInput(e.to_string()),
            other => RefineError::CorruptInput(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_display_names_context() {
        let err = RefineError::invalid_parameter(
            Stage::Normalization,
            "target_dbfs",
            -5.0f32,
            "[-30, -6]",
        );
        let msg = err.to_string();
        assert!(msg.contains("normalization"));
        assert!(msg.contains("target_dbfs"));
        assert!(msg.contains("-5"));
        assert!(!err.is_defect());
    }

    #[test]
    fn test_invariant_violation_is_defect() {
        let err = RefineError::InternalInvariantViolation {
            stage: Stage::Resample,
            detail: "channel count changed".to_string(),
        };
        assert!(err.is_defect());
    }

    #[test]
    fn test_hound_error_mapping() {
        let err: RefineError = hound::Error::FormatError("no RIFF tag found").into();
        assert!(matches!(err, RefineError::CorruptInput(_)));
        let err: RefineError = hound::Error::Unsupported.into();
        assert!(matches!(err, RefineError::UnsupportedFormat(_)));
    }
}
