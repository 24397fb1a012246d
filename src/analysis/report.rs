//! Refinement report types

use crate::analysis::loudness::LoudnessMeasurement;
use crate::error::Stage;
use crate::io::container::Container;
use serde::{Deserialize, Serialize};

/// Wall-clock time spent in one pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    /// Stage measured
    pub stage: Stage,

    /// Elapsed time in milliseconds (0 when skipped)
    pub elapsed_ms: f32,

    /// True if the stage was disabled in the configuration
    pub skipped: bool,
}

/// Summary of one refinement run
///
/// Produced once by [`refine`](crate::refine) after the output bytes are
/// encoded; nothing in it changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementReport {
    /// Container the input was decoded as (`None` if only the probe recognized it)
    pub input_container: Option<Container>,

    /// Sample rate of the decoded input
    pub input_sample_rate: u32,

    /// Channel count of the decoded input (after any >2-channel downmix)
    pub input_channels: u16,

    /// Output container
    pub output_container: Container,

    /// Output sample rate
    pub output_sample_rate: u32,

    /// Output channel count
    pub output_channels: u16,

    /// Output bit depth
    pub output_bit_depth: u16,

    /// Duration of the decoded input in seconds
    pub original_duration_secs: f64,

    /// Duration of the encoded output in seconds
    pub final_duration_secs: f64,

    /// Gain applied by the normalizer in dB (0 when the stage was skipped)
    pub applied_gain_db: f32,

    /// True if the normalizer fell back to the clip-safe gain
    pub clip_limited: bool,

    /// Estimated noise floor in dBFS, if noise reduction ran on a long enough buffer
    pub noise_floor_dbfs: Option<f32>,

    /// True if noise reduction was skipped because the buffer was shorter than one window
    pub noise_reduction_degraded: bool,

    /// Largest gain reduction applied by the compressor in dB
    pub max_gain_reduction_db: f32,

    /// Level of the final buffer
    pub final_loudness: LoudnessMeasurement,

    /// Size of the encoded output in bytes
    pub output_bytes: usize,

    /// Per-stage timings in pipeline order
    pub stage_timings: Vec<StageTiming>,

    /// Total processing time in milliseconds
    pub processing_time_ms: f32,

    /// Engine version that produced the report
    pub engine_version: String,
}

impl RefinementReport {
    /// Final RMS level in dBFS
    pub fn final_rms_dbfs(&self) -> f32 {
        self.final_loudness.rms_dbfs
    }

    /// Timing recorded for a stage, if it ran
    pub fn stage_time_ms(&self, stage: Stage) -> Option<f32> {
        self.stage_timings
            .iter()
            .find(|t| t.stage == stage && !t.skipped)
            .map(|t| t.elapsed_ms)
    }

    /// Pretty-printed JSON form of the report
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
