pub mod bridge;
pub mod events;

pub use bridge::TelemetryBridge;
pub use events::{BatchReading, RawRecord, TelemetryEvent};
