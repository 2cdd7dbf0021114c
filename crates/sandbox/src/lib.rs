//! Headless driver for the rope and fluid simulations.
//!
//! Scenarios are JSON files (see `Scenario`); runners step one simulation per
//! frame, apply scripted interaction and return `FrameMetrics`.

pub mod error;
pub mod metrics;
pub mod runner;
pub mod scenario;

pub use error::SandboxError;
pub use metrics::{FrameMetrics, RunSummary};
pub use runner::{quadratic_in_out, FluidRunner, RopeRunner, WallAnimation};
pub use scenario::{FluidScenario, MovingWall, RopeAction, RopeScenario, Scenario, Threading};
