//! Weakly compressible SPH solver.
//!
//! Each `advance()` runs, in order:
//! 1. neighbor search on the uniform grid (+ ghost offsets near the walls)
//! 2. density summation with the Poly6 kernel
//! 3. pressure acceleration (Spiky gradient, stiff equation of state) + gravity
//! 4. viscosity as a velocity diffusion between neighbors
//! 5. explicit position update and wall reflection
//!
//! The timestep is fixed at `0.05 r`.

use glam::Vec3;
use pool::Executor;
use serde::{Deserialize, Serialize};

use crate::error::SphError;
use crate::ghost::GhostBoundary;
use crate::grid::{NeighborReport, Neighborhood, SpatialGrid};
use crate::kernels::SphKernels;

/// Rest density of water (kg/m³).
pub const REST_DENSITY: f32 = 1000.0;

/// Upper clamp for summed densities.
pub const MAX_DENSITY: f32 = 10000.0;

/// Seed for the ghost sample jitter.
const GHOST_SEED: u64 = 0x5eed;

/// Tunable solver parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SphParams {
    /// Pressure stiffness.
    pub stiffness: f32,
    /// Velocity diffusion strength.
    pub viscosity: f32,
    /// Fraction of normal velocity kept when bouncing off a wall.
    pub boundary_restitution: f32,
    /// Vertical acceleration (negative is down).
    pub gravity: f32,
}

impl Default for SphParams {
    fn default() -> Self {
        Self {
            stiffness: 20000.0,
            viscosity: 0.05,
            boundary_restitution: 0.5,
            gravity: -9.81,
        }
    }
}

/// `p / ρ²` for the equation of state `p = (ρ/ρ0)^7 - 1` (zero below rest).
#[inline]
fn pressure_over_density_sqr(density: f32) -> f32 {
    if density <= 0.0 {
        return 0.0;
    }
    let ratio = density / REST_DENSITY;
    if ratio < 1.0 {
        return 0.0;
    }
    (ratio.powi(7) - 1.0) / (density * density)
}

/// 3D particle fluid in an axis-aligned box.
pub struct SphSolver {
    particle_radius: f32,
    particle_mass: f32,
    timestep: f32,
    kernels: SphKernels<Vec3>,
    grid: SpatialGrid<Vec3>,
    ghosts: GhostBoundary,
    params: SphParams,
    exec: Executor,

    positions: Vec<Vec3>,
    initial_positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    densities: Vec<f32>,
    diffusions: Vec<Vec3>,
    neighbors: Vec<Neighborhood<Vec3>>,
    ghost_offsets: Vec<Vec<Vec3>>,
    last_report: NeighborReport,
}

impl SphSolver {
    /// Solver for particles of radius `particle_radius` inside `[lower, upper]`.
    ///
    /// Kernel support is `4r`; each particle carries 90% of the rest mass of
    /// a `2r` cube.
    pub fn new(
        particle_radius: f32,
        lower: Vec3,
        upper: Vec3,
        exec: Executor,
    ) -> Result<Self, SphError> {
        let kernel_radius = 4.0 * particle_radius;
        let grid = SpatialGrid::with_interaction_radius(particle_radius, kernel_radius, lower, upper)?;
        let spacing = 2.0 * particle_radius;

        log::debug!(
            "SPH solver: r={} h={} grid={:?} threads={}",
            particle_radius,
            kernel_radius,
            grid.grid_size(),
            exec.thread_count()
        );

        Ok(Self {
            particle_radius,
            particle_mass: spacing * spacing * spacing * REST_DENSITY * 0.9,
            timestep: 0.05 * particle_radius,
            kernels: SphKernels::new(kernel_radius),
            grid,
            ghosts: GhostBoundary::generate(particle_radius, kernel_radius, GHOST_SEED),
            params: SphParams::default(),
            exec,
            positions: Vec::new(),
            initial_positions: Vec::new(),
            velocities: Vec::new(),
            densities: Vec::new(),
            diffusions: Vec::new(),
            neighbors: Vec::new(),
            ghost_offsets: Vec::new(),
            last_report: NeighborReport::default(),
        })
    }

    /// Replace all particles. Velocities start at zero and the positions are
    /// remembered for `reset()`.
    pub fn set_positions(&mut self, positions: Vec<Vec3>) {
        let n = positions.len();
        self.initial_positions = positions.clone();
        self.positions = positions;
        self.velocities = vec![Vec3::ZERO; n];
        self.densities = vec![0.0; n];
        self.diffusions = vec![Vec3::ZERO; n];
        self.neighbors.clear();
        self.neighbors.resize_with(n, Neighborhood::default);
        self.ghost_offsets.clear();
        self.ghost_offsets.resize_with(n, Vec::new);
        log::info!("SPH solver loaded {} particles", n);
    }

    /// Restore the positions from the last `set_positions` and zero velocities.
    pub fn reset(&mut self) {
        self.positions.clone_from(&self.initial_positions);
        self.velocities.fill(Vec3::ZERO);
    }

    /// Advance one fixed timestep.
    pub fn advance(&mut self) {
        self.last_report = self
            .grid
            .find_neighbors(&self.positions, &mut self.neighbors, &self.exec);
        self.collect_ghosts();
        self.compute_densities();
        self.integrate_velocities();
        self.apply_viscosity();
        self.update_positions();
    }

    fn collect_ghosts(&mut self) {
        let positions = &self.positions;
        let ghosts = &self.ghosts;
        let lower = self.grid.lower_bound();
        let upper = self.grid.upper_bound();
        let radius = self.grid.interaction_radius();
        let max_dist_sqr = radius * radius;

        self.exec.for_each_mut(&mut self.ghost_offsets, |p, out| {
            out.clear();
            ghosts.collect(positions[p], lower, upper, max_dist_sqr, out);
        });
    }

    fn compute_densities(&mut self) {
        let neighbors = &self.neighbors;
        let ghost_offsets = &self.ghost_offsets;
        let kernels = self.kernels;
        let mass = self.particle_mass;

        self.exec.for_each_mut(&mut self.densities, |p, density| {
            let hood = &neighbors[p];
            let ghosts = &ghost_offsets[p];
            // No contributions at all: keep the previous value
            if hood.is_empty() && ghosts.is_empty() {
                return;
            }
            let mut sum = kernels.w0();
            for offset in hood.offsets.iter().chain(ghosts) {
                sum += kernels.w(offset.length_squared());
            }
            *density = (sum * mass).clamp(0.0, MAX_DENSITY);
        });
    }

    fn integrate_velocities(&mut self) {
        let neighbors = &self.neighbors;
        let ghost_offsets = &self.ghost_offsets;
        let densities = &self.densities;
        let kernels = self.kernels;
        let dt = self.timestep;
        let scale = self.params.stiffness * self.particle_mass;
        let gravity = self.params.gravity;

        self.exec.for_each_mut(&mut self.velocities, |p, velocity| {
            let hood = &neighbors[p];
            if hood.is_empty() {
                // Lonely particle: gravity only
                velocity.y += dt * gravity;
                return;
            }

            let kp = pressure_over_density_sqr(densities[p]);
            let mut accel = Vec3::ZERO;
            for (&q, &offset) in hood.indices.iter().zip(&hood.offsets) {
                let kq = pressure_over_density_sqr(densities[q as usize]);
                accel -= kernels.grad_w(-offset) * (kp + kq);
            }
            for &offset in &ghost_offsets[p] {
                accel -= kernels.grad_w(-offset) * kp;
            }

            accel *= scale;
            accel.y += gravity;
            *velocity += accel * dt;
        });
    }

    fn apply_viscosity(&mut self) {
        let neighbors = &self.neighbors;
        let densities = &self.densities;
        let velocities = &self.velocities;
        let kernels = self.kernels;
        let scale = self.params.viscosity * self.particle_mass;

        self.exec.for_each_mut(&mut self.diffusions, |p, diffusion| {
            let hood = &neighbors[p];
            let vp = velocities[p];
            let mut diffuse = Vec3::ZERO;
            for (&q, &offset) in hood.indices.iter().zip(&hood.offsets) {
                let q = q as usize;
                let rho = densities[q];
                if rho > 0.0 {
                    diffuse += (velocities[q] - vp) * (kernels.w(offset.length_squared()) / rho);
                }
            }
            *diffusion = diffuse * scale;
        });

        let diffusions = &self.diffusions;
        self.exec
            .for_each_mut(&mut self.velocities, |p, velocity| *velocity += diffusions[p]);
    }

    fn update_positions(&mut self) {
        let grid = &self.grid;
        let dt = self.timestep;
        let restitution = self.params.boundary_restitution;

        self.exec
            .zip_for_each_mut(&mut self.positions, &mut self.velocities, |_, position, velocity| {
                *position += *velocity * dt;
                grid.enforce_boundary(position, velocity, restitution);
            });
    }

    pub fn particle_radius(&self) -> f32 {
        self.particle_radius
    }

    pub fn particle_mass(&self) -> f32 {
        self.particle_mass
    }

    pub fn timestep(&self) -> f32 {
        self.timestep
    }

    pub fn particle_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    pub fn densities(&self) -> &[f32] {
        &self.densities
    }

    /// Neighbor statistics from the most recent step.
    pub fn last_report(&self) -> NeighborReport {
        self.last_report
    }

    pub fn grid(&self) -> &SpatialGrid<Vec3> {
        &self.grid
    }

    /// Mutable access to the domain, e.g. to slide a wall between steps.
    pub fn grid_mut(&mut self) -> &mut SpatialGrid<Vec3> {
        &mut self.grid
    }

    pub fn params(&self) -> &SphParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut SphParams {
        &mut self.params
    }
}

/// Particles on a regular lattice filling `[lower, upper)` with the given
/// spacing, starting at `lower`.
pub fn fluid_block(lower: Vec3, upper: Vec3, spacing: f32) -> Vec<Vec3> {
    if spacing.is_nan() || spacing <= 0.0 {
        return Vec::new();
    }
    let count = |axis: usize| {
        let resolution = (upper[axis] - lower[axis]) / spacing;
        // Absorb rounding so an exact multiple doesn't gain a layer
        (resolution - 1e-4).ceil().max(0.0) as usize
    };
    let (nx, ny, nz) = (count(0), count(1), count(2));

    let mut positions = Vec::with_capacity(nx * ny * nz);
    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                positions.push(lower + Vec3::new(i as f32, j as f32, k as f32) * spacing);
            }
        }
    }
    positions
}
