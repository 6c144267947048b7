//! Acquisition, lift estimation and presentation core for the wing pressure
//! station.
//!
//! Two instruments feed a three-task pipeline: acquisition publishes merged
//! readings, calculation fits pressure splines and integrates lift, and
//! presentation renders the newest state at its own cadence. Configuration
//! reaches all three through a single broadcaster.

pub mod device;
pub mod math;
pub mod model;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod profile;
pub mod storage;
pub mod telemetry;

pub use prelude::{ProcessingStage, StageError, StageResult};
