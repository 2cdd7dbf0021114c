//! Scenario files: everything needed to set up and script a headless run.
//!
//! All sections fall back to their defaults, so a file only has to mention
//! what it changes.

use std::path::Path;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use pool::{Executor, ThreadPool};
use rope::RopeParams;
use serde::{Deserialize, Serialize};
use sph::SphParams;

use crate::error::SandboxError;

/// Which loop backend the simulations run on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threading {
    Sequential,
    /// The hand-rolled pool; `None` uses one worker per spare core.
    Pool { workers: Option<usize> },
    Rayon,
}

impl Default for Threading {
    fn default() -> Self {
        Threading::Pool { workers: None }
    }
}

impl Threading {
    pub fn executor(&self) -> Result<Executor, SandboxError> {
        Ok(match self {
            Threading::Sequential => Executor::Sequential,
            Threading::Pool { workers: None } => Executor::pool(Arc::new(ThreadPool::new()?)),
            Threading::Pool { workers: Some(n) } => Executor::pool(Arc::new(ThreadPool::with_workers(*n)?)),
            Threading::Rayon => Executor::Rayon,
        })
    }
}

/// Scripted interaction with the rope. Frame windows are half-open.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RopeAction {
    /// Free nodes accelerate toward `target` instead of falling.
    Attract {
        from_frame: u32,
        to_frame: u32,
        target: Vec2,
    },
    /// Pick the node closest to `pick` and hold it at `target`.
    Grab {
        from_frame: u32,
        to_frame: u32,
        pick: Vec2,
        target: Vec2,
    },
    /// Sever every edge crossing `from -> to` on one frame.
    Cut { frame: u32, from: Vec2, to: Vec2 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RopeScenario {
    /// Lattice rectangle; the top row is pinned.
    pub min: Vec2,
    pub max: Vec2,
    pub params: RopeParams,
    pub actions: Vec<RopeAction>,
}

impl Default for RopeScenario {
    fn default() -> Self {
        Self {
            min: Vec2::new(-8.0, -6.0),
            max: Vec2::new(8.0, 7.4),
            params: RopeParams::default(),
            actions: vec![
                RopeAction::Attract {
                    from_frame: 60,
                    to_frame: 120,
                    target: Vec2::new(4.0, -8.0),
                },
                RopeAction::Cut {
                    frame: 180,
                    from: Vec2::new(-9.0, 0.1),
                    to: Vec2::new(9.0, 0.3),
                },
                RopeAction::Grab {
                    from_frame: 240,
                    to_frame: 300,
                    pick: Vec2::new(-8.0, -6.0),
                    target: Vec2::new(-10.0, 2.0),
                },
            ],
        }
    }
}

/// Slides the domain's +x wall in and out.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovingWall {
    /// Animation progress per frame (the phase runs over `[0, 1]`).
    pub speed: f32,
    /// Deepest inward displacement of the wall.
    pub travel: f32,
}

impl Default for MovingWall {
    fn default() -> Self {
        Self {
            speed: 2.0e-3,
            travel: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidScenario {
    pub particle_radius: f32,
    /// Box size; the solver domain is inset by one particle radius.
    pub domain: Vec3,
    /// Far corner of the initial block, which starts at the domain origin.
    /// Both corners are inset by one particle diameter.
    pub block: Vec3,
    pub params: SphParams,
    pub moving_wall: Option<MovingWall>,
    /// Solver steps per frame.
    pub substeps: u32,
}

impl Default for FluidScenario {
    fn default() -> Self {
        Self {
            particle_radius: 0.02,
            domain: Vec3::new(3.0, 3.0, 1.0),
            block: Vec3::new(0.5, 2.0, 1.0),
            params: SphParams::default(),
            moving_wall: None,
            substeps: 1,
        }
    }
}

impl FluidScenario {
    pub fn lower_bound(&self) -> Vec3 {
        Vec3::splat(self.particle_radius)
    }

    pub fn upper_bound(&self) -> Vec3 {
        self.domain - Vec3::splat(self.particle_radius)
    }
}

/// A complete headless run description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    /// Frames to run when the command line doesn't say.
    pub frames: u32,
    /// Log a metrics line every this many frames (0 disables).
    pub log_interval: u32,
    pub threading: Threading,
    pub rope: RopeScenario,
    pub fluid: FluidScenario,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            description: String::new(),
            frames: 600,
            log_interval: 60,
            threading: Threading::default(),
            rope: RopeScenario::default(),
            fluid: FluidScenario::default(),
        }
    }
}

impl Scenario {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Save scenario to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<(), SandboxError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load scenario from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, SandboxError> {
        let json = std::fs::read_to_string(path)?;
        let scenario = serde_json::from_str(&json)?;
        Ok(scenario)
    }
}
