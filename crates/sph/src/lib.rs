//! Particle fluid building blocks.
//!
//! - `grid`: uniform-grid fixed-radius neighbor search over an axis-aligned
//!   domain, plus reflective wall handling
//! - `kernels`: Poly6 / Spiky smoothing kernels (2D and 3D)
//! - `ghost`: jittered ghost samples behind the domain walls
//! - `solver`: a weakly compressible SPH solver tying the above together
//!
//! Everything is generic over `GridPoint` where the dimension doesn't matter;
//! the solver itself is 3D.
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use pool::Executor;
//! use sph::{fluid_block, SphSolver};
//!
//! let radius = 0.05;
//! let mut solver = SphSolver::new(
//!     radius,
//!     Vec3::splat(radius),
//!     Vec3::new(1.0, 1.0, 0.5) - Vec3::splat(radius),
//!     Executor::Sequential,
//! )
//! .unwrap();
//! solver.set_positions(fluid_block(Vec3::splat(0.1), Vec3::new(0.4, 0.5, 0.3), 2.0 * radius));
//! solver.advance();
//! ```

pub mod error;
pub mod ghost;
pub mod grid;
pub mod kernels;
pub mod point;
pub mod solver;

pub use error::SphError;
pub use ghost::GhostBoundary;
pub use grid::{NeighborReport, Neighborhood, SpatialGrid};
pub use kernels::{Poly6Kernel, SphKernels, SpikyKernel};
pub use point::GridPoint;
pub use solver::{fluid_block, SphParams, SphSolver};
