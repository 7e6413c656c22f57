pub mod fusion;
pub mod state;

pub use fusion::{FusedRecord, FusionBuffer};
pub use state::{FrameOutcome, GpsOutcome, PipelineState};
