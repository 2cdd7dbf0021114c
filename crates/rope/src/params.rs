use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::RopeError;

/// Runtime-adjustable rope settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RopeParams {
    /// Lattice spacing and rest length of lattice edges. Changing it only
    /// takes effect on `Rope::rebuild`.
    pub node_distance: f32,
    /// Fixed step length in seconds.
    pub time_delta: f32,
    /// Relaxation passes per step.
    pub constraint_iterations: u32,
    pub gravity: Vec2,
    /// Optional cap on the length of a single edge correction.
    pub max_correction: Option<f32>,
}

impl Default for RopeParams {
    fn default() -> Self {
        Self {
            node_distance: 0.5,
            time_delta: 0.01,
            constraint_iterations: 2,
            gravity: Vec2::new(0.0, -9.89),
            max_correction: None,
        }
    }
}

impl RopeParams {
    pub fn validate(&self) -> Result<(), RopeError> {
        if !(self.node_distance.is_finite() && self.node_distance > 0.0) {
            return Err(RopeError::InvalidParameter {
                name: "node_distance",
                value: self.node_distance,
            });
        }
        if !(self.time_delta.is_finite() && self.time_delta >= 0.0) {
            return Err(RopeError::InvalidParameter {
                name: "time_delta",
                value: self.time_delta,
            });
        }
        if !self.gravity.is_finite() {
            return Err(RopeError::InvalidParameter {
                name: "gravity",
                value: self.gravity.y,
            });
        }
        if let Some(max) = self.max_correction {
            if !(max.is_finite() && max > 0.0) {
                return Err(RopeError::InvalidParameter {
                    name: "max_correction",
                    value: max,
                });
            }
        }
        Ok(())
    }
}
