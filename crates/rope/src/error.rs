use thiserror::Error;

/// Errors raised while building or addressing a rope.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RopeError {
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },

    /// The rectangle is smaller than one node spacing on some axis
    #[error("rope lattice is empty ({points_x} x {points_y} nodes)")]
    EmptyLattice { points_x: usize, points_y: usize },

    #[error("node {node} does not exist (rope has {count} nodes)")]
    UnknownNode { node: usize, count: usize },

    #[error("edge {edge} references node {node}, but rope has {count} nodes")]
    EdgeOutOfRange { edge: usize, node: usize, count: usize },

    #[error("node {node} has negative or non-finite mass {mass}")]
    NegativeMass { node: usize, mass: f32 },
}
