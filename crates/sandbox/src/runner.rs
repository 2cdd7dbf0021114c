//! Frame loops for the two simulations.
//!
//! A runner owns its simulation, applies the scenario's scripted input for
//! the current frame, steps, and reports `FrameMetrics`.

use std::time::Instant;

use glam::Vec3;
use pool::Executor;
use rope::{NodeId, Rope, StepInput};
use sph::{fluid_block, SphSolver};

use crate::error::SandboxError;
use crate::metrics::FrameMetrics;
use crate::scenario::{FluidScenario, MovingWall, RopeAction, RopeScenario};

/// Quadratic ease-in-out on `[0, 1]` (input is clamped).
pub fn quadratic_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        -2.0 * t * t + 4.0 * t - 1.0
    }
}

pub struct RopeRunner {
    rope: Rope,
    actions: Vec<RopeAction>,
    exec: Executor,
    frame: u32,
    /// Active grab action (by index) and the node it picked when it started.
    grabbed: Option<(usize, NodeId)>,
}

impl RopeRunner {
    pub fn new(scenario: &RopeScenario, exec: Executor) -> Result<Self, SandboxError> {
        let rope = Rope::rectangle(scenario.min, scenario.max, scenario.params)?;
        log::info!(
            "Rope: {}x{} lattice, {} edges, {} scripted actions",
            rope.points_x(),
            rope.points_y(),
            rope.edge_count(),
            scenario.actions.len()
        );
        Ok(Self {
            rope,
            actions: scenario.actions.clone(),
            exec,
            frame: 0,
            grabbed: None,
        })
    }

    pub fn rope(&self) -> &Rope {
        &self.rope
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Build this frame's input from the script.
    fn input(&mut self) -> StepInput {
        let frame = self.frame;
        let mut input = StepInput::default();
        let mut grabbing = false;

        for (index, action) in self.actions.iter().enumerate() {
            match *action {
                RopeAction::Attract {
                    from_frame,
                    to_frame,
                    target,
                } if (from_frame..to_frame).contains(&frame) => {
                    input.attract = Some(target);
                }
                RopeAction::Grab {
                    from_frame,
                    to_frame,
                    pick,
                    target,
                } if (from_frame..to_frame).contains(&frame) => {
                    let node = match self.grabbed {
                        Some((active, node)) if active == index => Some(node),
                        _ => {
                            let picked = self.rope.closest_node(pick);
                            if let Some(node) = picked {
                                log::debug!("Frame {}: action {} grabbed node {}", frame, index, node.0);
                            }
                            picked
                        }
                    };
                    if let Some(node) = node {
                        self.grabbed = Some((index, node));
                        input.grab = Some((node, target));
                        grabbing = true;
                    }
                }
                RopeAction::Cut { frame: at, from, to } if at == frame => {
                    input.cut = Some((from, to));
                }
                _ => {}
            }
        }

        if !grabbing {
            self.grabbed = None;
        }
        input
    }

    pub fn step(&mut self) -> Result<FrameMetrics, SandboxError> {
        let input = self.input();
        let start = Instant::now();
        let removed = self.rope.step(&input, &self.exec)?;
        let step_ms = start.elapsed().as_secs_f32() * 1000.0;
        if removed > 0 {
            log::info!("Frame {}: cut {} edges", self.frame, removed);
        }

        let dt = self.rope.params().time_delta;
        let nodes = self.rope.nodes();
        let mut metrics = FrameMetrics {
            frame: self.frame,
            step_ms,
            particle_count: nodes.len(),
            edge_count: Some(self.rope.edge_count()),
            ..Default::default()
        };
        let mut height_sum = 0.0;
        for node in nodes {
            if !(node.position.is_finite() && node.previous_position.is_finite()) {
                metrics.non_finite += 1;
                continue;
            }
            if dt > 0.0 {
                metrics.max_speed = metrics.max_speed.max(node.velocity().length() / dt);
            }
            height_sum += node.position.y;
        }
        metrics.mean_height = height_sum / nodes.len().max(1) as f32;

        self.frame += 1;
        Ok(metrics)
    }
}

/// Drives the +x wall back and forth with an eased profile.
#[derive(Clone, Copy, Debug)]
pub struct WallAnimation {
    config: MovingWall,
    phase: f32,
    direction: f32,
    rest_x: f32,
}

impl WallAnimation {
    pub fn new(config: MovingWall, rest_x: f32) -> Self {
        Self {
            config,
            phase: 0.0,
            direction: 1.0,
            rest_x,
        }
    }

    /// Advance one frame; returns the new wall position.
    pub fn advance(&mut self) -> f32 {
        if self.phase > 1.0 || self.phase < 0.0 {
            self.direction = -self.direction;
        }
        self.phase += self.direction * self.config.speed;
        self.wall_x()
    }

    pub fn wall_x(&self) -> f32 {
        self.rest_x - self.config.travel * quadratic_in_out(self.phase)
    }
}

pub struct FluidRunner {
    solver: SphSolver,
    wall: Option<WallAnimation>,
    substeps: u32,
    frame: u32,
}

impl FluidRunner {
    pub fn new(scenario: &FluidScenario, exec: Executor) -> Result<Self, SandboxError> {
        let r = scenario.particle_radius;
        let lower = scenario.lower_bound();
        let upper = scenario.upper_bound();
        let mut solver = SphSolver::new(r, lower, upper, exec)?;
        *solver.params_mut() = scenario.params;

        let inset = Vec3::splat(2.0 * r);
        solver.set_positions(fluid_block(inset, scenario.block - inset, 2.0 * r));

        let wall = scenario.moving_wall.map(|config| WallAnimation::new(config, upper.x));
        log::info!(
            "Fluid: {} particles, r={}, domain {:?}..{:?}, moving wall: {}",
            solver.particle_count(),
            solver.particle_radius(),
            lower,
            upper,
            wall.is_some()
        );

        Ok(Self {
            solver,
            wall,
            substeps: scenario.substeps.max(1),
            frame: 0,
        })
    }

    pub fn solver(&self) -> &SphSolver {
        &self.solver
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn step(&mut self) -> Result<FrameMetrics, SandboxError> {
        let start = Instant::now();
        for _ in 0..self.substeps {
            if let Some(wall) = self.wall.as_mut() {
                let mut upper = self.solver.grid().upper_bound();
                upper.x = wall.advance();
                self.solver.grid_mut().set_upper_bound(upper)?;
            }
            self.solver.advance();
        }
        let step_ms = start.elapsed().as_secs_f32() * 1000.0;

        let mut metrics = FrameMetrics {
            frame: self.frame,
            step_ms,
            particle_count: self.solver.particle_count(),
            out_of_bounds: Some(self.solver.last_report().out_of_bounds),
            wall_x: self.wall.map(|w| w.wall_x()),
            ..Default::default()
        };
        let mut height_sum = 0.0;
        for (p, v) in self.solver.positions().iter().zip(self.solver.velocities()) {
            if !(p.is_finite() && v.is_finite()) {
                metrics.non_finite += 1;
                continue;
            }
            metrics.max_speed = metrics.max_speed.max(v.length());
            height_sum += p.y;
        }
        metrics.mean_height = height_sum / self.solver.particle_count().max(1) as f32;

        self.frame += 1;
        Ok(metrics)
    }
}
