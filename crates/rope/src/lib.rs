//! Rope and cloth simulation on a graph of point masses.
//!
//! Nodes integrate with Verlet (velocity is implicit in
//! `position - previous_position`), then every edge is relaxed toward its rest
//! length a fixed number of times, splitting each correction by inverse mass.
//! Nodes with zero mass are pinned.
//!
//! Interaction is index based: `grab` moves a node by id, `cut` removes every
//! edge crossing a segment and `closest_node` picks a node for grabbing.

pub mod error;
pub mod geometry;
pub mod node;
pub mod params;
pub mod rope;

pub use error::RopeError;
pub use node::{Edge, NodeId, RopeNode};
pub use params::RopeParams;
pub use rope::{solve_distance_constraint, Rope, StepInput};
