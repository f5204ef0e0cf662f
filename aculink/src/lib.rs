//! Decoder for the telemetry that AcuRite / AcuLink bridges upload to
//! `www.acu-link.com`.
//!
//! The bridge POSTs a form-encoded body per sensor report, either a generic
//! weather report (`mt=5N1x31`, `mt=tower`, ...) or a `mt=pressure` message
//! carrying the raw barometer coefficients of the bridge itself.
//!
//! ```
//! use aculink::SensorReading;
//!
//! let reading = SensorReading::from_payload("id=24C86E0449A0&mt=tower&sensor=00042&humidity=A455").unwrap();
//! assert_eq!(reading.humidity(), Some(45.5));
//! ```

pub mod calibration;
pub mod codec;
pub mod error;
pub mod reading;
pub mod wind;

pub use calibration::CoefficientSet;
pub use error::{CoefficientError, DecodeError};
pub use reading::SensorReading;
