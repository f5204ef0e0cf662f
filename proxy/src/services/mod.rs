pub mod decode_queue;
pub mod telemetry_service;

pub use decode_queue::DecodeQueue;
pub use telemetry_service::{Disposition, TelemetryService};
