//! Level measurement and run reporting
//!
//! - Loudness (RMS, peak, dBFS conversions)
//! - Refinement report

pub mod loudness;
pub mod report;
