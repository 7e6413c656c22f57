pub mod extract;
pub mod noise;
pub mod smooth;

pub use extract::{Detection, SignalExtractor};
pub use noise::{FrameNoise, NoiseEstimator, NoiseStats};
pub use smooth::DepthSmoother;
