//! Core signal processing for the acoustic echo telemetry pipeline.
//!
//! The modules cover the sonar wire format and frame reassembly, adaptive
//! noise and blind-zone estimation, multi-target extraction, temporal
//! tracking, and depth smoothing, as well-defined per-frame stages with no
//! I/O of their own.

pub mod acoustics;
pub mod framing;
pub mod prelude;
pub mod signal;
pub mod telemetry;
pub mod tracking;

pub use prelude::{DetectorConfig, PipelineError, PipelineResult};
