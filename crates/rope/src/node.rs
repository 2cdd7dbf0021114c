use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Index of a node in its rope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A point mass with Verlet state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RopeNode {
    pub position: Vec2,
    pub previous_position: Vec2,
    /// Zero pins the node in place.
    pub mass: f32,
}

impl RopeNode {
    /// Node at rest with unit mass.
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            previous_position: position,
            mass: 1.0,
        }
    }

    pub fn pinned(position: Vec2) -> Self {
        Self {
            mass: 0.0,
            ..Self::new(position)
        }
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.mass == 0.0
    }

    /// Displacement over the last step.
    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.position - self.previous_position
    }
}

/// Distance constraint between two nodes, stored once per link.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub a: NodeId,
    pub b: NodeId,
    pub rest_length: f32,
}

impl Edge {
    pub fn new(a: NodeId, b: NodeId, rest_length: f32) -> Self {
        Self { a, b, rest_length }
    }

    /// The other endpoint, if `node` is one of them.
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if self.a == node {
            Some(self.b)
        } else if self.b == node {
            Some(self.a)
        } else {
            None
        }
    }
}
