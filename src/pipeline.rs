//! Stage bookkeeping for the orchestrator and batch refinement
//!
//! The orchestrator itself lives in [`refine_with`](crate::refine_with); this
//! module holds the pieces it leans on: timing each stage, checking buffer
//! invariants between stages, and running many clips in parallel.

use crate::analysis::loudness::peak;
use crate::analysis::report::{RefinementReport, StageTiming};
use crate::config::RefineConfig;
use crate::error::{RefineError, Stage};
use crate::io::container::Container;
use crate::io::sample_buffer::SampleBuffer;
use rayon::prelude::*;
use std::time::Instant;

/// Slack allowed on the peak ceiling after float rounding
const PEAK_TOLERANCE: f32 = 1e-6;

/// Records wall-clock time per stage in execution order
#[derive(Debug, Default)]
pub(crate) struct StageTimer {
    timings: Vec<StageTiming>,
}

impl StageTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run one stage and record how long it took, whether it succeeded or not
    pub(crate) fn run<T>(
        &mut self,
        stage: Stage,
        f: impl FnOnce() -> Result<T, RefineError>,
    ) -> Result<T, RefineError> {
        let start = Instant::now();
        let result = f();
        let elapsed_ms = start.elapsed().as_secs_f32() * 1000.0;
        log::debug!("Stage {} finished in {:.2} ms", stage, elapsed_ms);
        self.timings.push(StageTiming {
            stage,
            elapsed_ms,
            skipped: false,
        });
        result
    }

    pub(crate) fn skip(&mut self, stage: Stage) {
        log::debug!("Stage {} disabled, skipping", stage);
        self.timings.push(StageTiming {
            stage,
            elapsed_ms: 0.0,
            skipped: true,
        });
    }

    pub(crate) fn into_timings(self) -> Vec<StageTiming> {
        self.timings
    }
}

/// Shape a buffer must have when a stage hands it on
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BufferShape {
    pub(crate) sample_rate: u32,
    pub(crate) channels: u16,
    pub(crate) frames: usize,
}

impl BufferShape {
    pub(crate) fn of(buffer: &SampleBuffer) -> Self {
        Self {
            sample_rate: buffer.sample_rate(),
            channels: buffer.channels(),
            frames: buffer.frames(),
        }
    }

    /// Shape after converting `self` to a new rate and channel count
    pub(crate) fn resampled(&self, sample_rate: u32, channels: u16) -> Self {
        let ratio = sample_rate as f64 / self.sample_rate as f64;
        Self {
            sample_rate,
            channels,
            frames: (self.frames as f64 * ratio).round() as usize,
        }
    }
}

/// Verify a stage kept the buffer's rate, layout and length, and produced finite samples
pub(crate) fn check_stage_output(stage: Stage, buffer: &SampleBuffer, expected: BufferShape) -> Result<(), RefineError> {
    let actual = BufferShape::of(buffer);

    let detail = if actual.sample_rate != expected.sample_rate {
        Some(format!(
            "sample rate {} Hz, expected {} Hz",
            actual.sample_rate, expected.sample_rate
        ))
    } else if actual.channels != expected.channels {
        Some(format!(
            "channel count {}, expected {}",
            actual.channels, expected.channels
        ))
    } else if actual.frames != expected.frames {
        Some(format!("{} frames, expected {}", actual.frames, expected.frames))
    } else if !buffer.is_finite() {
        Some("non-finite samples in output".to_string())
    } else {
        None
    };

    match detail {
        Some(detail) => {
            log::error!("Invariant violated after {} stage: {}", stage, detail);
            Err(RefineError::InternalInvariantViolation { stage, detail })
        }
        None => Ok(()),
    }
}

/// Verify no sample exceeds the normalizer's ceiling
pub(crate) fn check_peak_ceiling(stage: Stage, buffer: &SampleBuffer, max_peak: f32) -> Result<(), RefineError> {
    let current = peak(buffer.samples());
    if current > max_peak + PEAK_TOLERANCE {
        let detail = format!("peak {:.6} above ceiling {:.6}", current, max_peak);
        log::error!("Invariant violated after {} stage: {}", stage, detail);
        return Err(RefineError::InternalInvariantViolation { stage, detail });
    }
    Ok(())
}

/// Default worker count: available CPU threads minus one, at least one
pub fn default_jobs() -> usize {
    let n = std::thread::available_parallelism().map(|v| v.get()).unwrap_or(1);
    std::cmp::max(1, n.saturating_sub(1))
}

/// One clip to refine in a batch
#[derive(Debug, Clone, Copy)]
pub struct Clip<'a> {
    /// Encoded input bytes
    pub bytes: &'a [u8],

    /// Declared container, or `None` to sniff it
    pub container: Option<Container>,
}

impl<'a> Clip<'a> {
    /// Clip with a declared container
    pub fn new(bytes: &'a [u8], container: Option<Container>) -> Self {
        Self { bytes, container }
    }
}

/// Refine many independent clips in parallel
///
/// Each run gets its own copy of `config` and its own buffers; nothing is
/// shared between runs. Results come back in input order, one per clip, so a
/// failing clip does not affect the others. `jobs == 0` picks
/// [`default_jobs`].
///
/// # Example
///
/// ```no_run
/// use speech_refine::pipeline::{refine_batch, Clip};
/// use speech_refine::RefineConfig;
///
/// let a = std::fs::read("a.wav")?;
/// let b = std::fs::read("b.mp3")?;
/// let clips = [Clip::new(&a, None), Clip::new(&b, None)];
/// for result in refine_batch(&clips, &RefineConfig::default(), 4) {
///     match result {
///         Ok((bytes, report)) => println!("{} bytes, {:.1} dBFS", bytes.len(), report.final_rms_dbfs()),
///         Err(e) => eprintln!("failed: {}", e),
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn refine_batch(
    clips: &[Clip<'_>],
    config: &RefineConfig,
    jobs: usize,
) -> Vec<Result<(Vec<u8>, RefinementReport), RefineError>> {
    let jobs = if jobs == 0 { default_jobs() } else { jobs };
    log::info!("Batch refinement: {} clips, jobs={}", clips.len(), jobs);

    let run = |clip: &Clip<'_>| {
        let config = config.clone();
        crate::refine(clip.bytes, clip.container, &config)
    };

    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(|| clips.par_iter().map(run).collect()),
        Err(e) => {
            log::warn!("Failed to build thread pool ({}), refining sequentially", e);
            clips.iter().map(run).collect()
        }
    }
}
