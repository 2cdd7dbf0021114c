//! The point-mass network and its step.

use glam::Vec2;
use pool::Executor;

use crate::error::RopeError;
use crate::geometry::segments_intersect;
use crate::node::{Edge, NodeId, RopeNode};
use crate::params::RopeParams;

/// External inputs for one frame, applied by `Rope::step`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepInput {
    /// Pull every free node toward this point instead of gravity.
    pub attract: Option<Vec2>,
    /// Pin a node to a point for this frame.
    pub grab: Option<(NodeId, Vec2)>,
    /// Remove edges crossing this segment before integrating.
    pub cut: Option<(Vec2, Vec2)>,
}

/// Correction for one distance constraint.
///
/// Returns the displacements to add to `a` and `b`. The relative correction
/// is half the stretch, split by inverse mass (`0.0` mass = pinned). Zero
/// length and two pinned ends give no correction.
pub fn solve_distance_constraint(
    pa: Vec2,
    pb: Vec2,
    mass_a: f32,
    mass_b: f32,
    rest_length: f32,
    max_correction: Option<f32>,
) -> (Vec2, Vec2) {
    let ia = if mass_a == 0.0 { 0.0 } else { 1.0 / mass_a };
    let ib = if mass_b == 0.0 { 0.0 } else { 1.0 / mass_b };
    let total = ia + ib;
    if total == 0.0 {
        return (Vec2::ZERO, Vec2::ZERO);
    }

    let diff = pa - pb;
    let dist = diff.length();
    let fraction = if dist > 0.0 {
        (dist - rest_length) / dist
    } else {
        0.0
    };

    let mut correction = diff * (0.5 * fraction);
    if let Some(max) = max_correction {
        correction = correction.clamp_length_max(max);
    }

    (-correction * (ia / total), correction * (ib / total))
}

/// A rope or cloth: nodes plus the edges between them.
#[derive(Clone, Debug)]
pub struct Rope {
    nodes: Vec<RopeNode>,
    edges: Vec<Edge>,
    params: RopeParams,
    points_x: usize,
    points_y: usize,
    /// Rectangle the lattice was built from, for `rebuild`.
    bounds: Option<(Vec2, Vec2)>,
}

impl Rope {
    /// Regular lattice over `[min, max]` with the top row pinned.
    ///
    /// Node `(x, y)` sits at `min + (x, y) * node_distance` and has index
    /// `x * points_y + y`. Every node links to its right and upper neighbor.
    pub fn rectangle(min: Vec2, max: Vec2, params: RopeParams) -> Result<Self, RopeError> {
        params.validate()?;
        let d = params.node_distance;
        let points_x = ((max.x - min.x) / d).floor().max(0.0) as usize;
        let points_y = ((max.y - min.y) / d).floor().max(0.0) as usize;
        if points_x == 0 || points_y == 0 {
            return Err(RopeError::EmptyLattice { points_x, points_y });
        }

        let index = |x: usize, y: usize| NodeId(x * points_y + y);

        let mut nodes = Vec::with_capacity(points_x * points_y);
        for x in 0..points_x {
            for y in 0..points_y {
                let position = min + Vec2::new(x as f32, y as f32) * d;
                if y == points_y - 1 {
                    nodes.push(RopeNode::pinned(position));
                } else {
                    nodes.push(RopeNode::new(position));
                }
            }
        }

        let mut edges = Vec::with_capacity(2 * points_x * points_y);
        for x in 0..points_x {
            for y in 0..points_y {
                if x + 1 < points_x {
                    edges.push(Edge::new(index(x, y), index(x + 1, y), d));
                }
                if y + 1 < points_y {
                    edges.push(Edge::new(index(x, y), index(x, y + 1), d));
                }
            }
        }

        log::debug!(
            "Rope lattice {}x{}: {} nodes, {} edges",
            points_x,
            points_y,
            nodes.len(),
            edges.len()
        );

        Ok(Self {
            nodes,
            edges,
            params,
            points_x,
            points_y,
            bounds: Some((min, max)),
        })
    }

    /// Arbitrary graph. `points_x`/`points_y` are zero for these.
    pub fn from_parts(nodes: Vec<RopeNode>, edges: Vec<Edge>, params: RopeParams) -> Result<Self, RopeError> {
        params.validate()?;
        if nodes.is_empty() {
            return Err(RopeError::EmptyLattice {
                points_x: 0,
                points_y: 0,
            });
        }
        for (i, node) in nodes.iter().enumerate() {
            if !(node.mass.is_finite() && node.mass >= 0.0) {
                return Err(RopeError::NegativeMass { node: i, mass: node.mass });
            }
        }
        let count = nodes.len();
        for (i, edge) in edges.iter().enumerate() {
            for end in [edge.a, edge.b] {
                if end.index() >= count {
                    return Err(RopeError::EdgeOutOfRange {
                        edge: i,
                        node: end.index(),
                        count,
                    });
                }
            }
        }

        Ok(Self {
            nodes,
            edges,
            params,
            points_x: 0,
            points_y: 0,
            bounds: None,
        })
    }

    /// Rebuild the lattice from its original rectangle with the current
    /// `node_distance`. Ropes made with `from_parts` only get their state
    /// reset to rest.
    pub fn rebuild(&mut self) -> Result<(), RopeError> {
        match self.bounds {
            Some((min, max)) => {
                *self = Self::rectangle(min, max, self.params)?;
            }
            None => {
                for node in &mut self.nodes {
                    node.previous_position = node.position;
                }
            }
        }
        Ok(())
    }

    /// Advance one step: Verlet integration, then constraint relaxation.
    ///
    /// With `attract_toward` set, free nodes accelerate toward that point
    /// instead of falling.
    pub fn simulate(&mut self, attract_toward: Option<Vec2>, exec: &Executor) {
        let dt2 = self.params.time_delta * self.params.time_delta;
        let gravity = self.params.gravity;

        exec.for_each_mut(&mut self.nodes, |_, node| {
            if node.is_pinned() {
                return;
            }
            let velocity = node.velocity();
            let acceleration = match attract_toward {
                Some(target) => target - node.position,
                None => gravity,
            };
            node.previous_position = node.position;
            node.position += velocity + acceleration * dt2;
        });

        for _ in 0..self.params.constraint_iterations {
            self.relax();
        }
    }

    /// One sequential pass over the edge list.
    fn relax(&mut self) {
        let max_correction = self.params.max_correction;
        for edge in &self.edges {
            let (a, b) = (edge.a.index(), edge.b.index());
            let (da, db) = solve_distance_constraint(
                self.nodes[a].position,
                self.nodes[b].position,
                self.nodes[a].mass,
                self.nodes[b].mass,
                edge.rest_length,
                max_correction,
            );
            self.nodes[a].position += da;
            self.nodes[b].position += db;
        }
    }

    /// Put a node at `target` with zero velocity.
    pub fn grab(&mut self, node: NodeId, target: Vec2) -> Result<(), RopeError> {
        let count = self.nodes.len();
        let n = self
            .nodes
            .get_mut(node.index())
            .ok_or(RopeError::UnknownNode {
                node: node.index(),
                count,
            })?;
        n.position = target;
        n.previous_position = target;
        Ok(())
    }

    /// Remove every edge crossing the segment `from -> to`. Returns how many
    /// were removed.
    pub fn cut(&mut self, from: Vec2, to: Vec2) -> usize {
        let before = self.edges.len();
        let nodes = &self.nodes;
        self.edges
            .retain(|e| !segments_intersect(from, to, nodes[e.a.index()].position, nodes[e.b.index()].position));
        let removed = before - self.edges.len();
        if removed > 0 {
            log::debug!("Cut {} edges, {} left", removed, self.edges.len());
        }
        removed
    }

    /// Node nearest to `point`; ties go to the lowest index.
    pub fn closest_node(&self, point: Vec2) -> Option<NodeId> {
        let mut best: Option<(NodeId, f32)> = None;
        for (i, node) in self.nodes.iter().enumerate() {
            let dist = node.position.distance_squared(point);
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((NodeId(i), dist));
            }
        }
        best.map(|(id, _)| id)
    }

    /// One interactive frame: cut, then simulate, then grab.
    ///
    /// Returns the number of edges cut. An unknown grab node is rejected
    /// before anything changes.
    pub fn step(&mut self, input: &StepInput, exec: &Executor) -> Result<usize, RopeError> {
        if let Some((node, _)) = input.grab {
            if node.index() >= self.nodes.len() {
                return Err(RopeError::UnknownNode {
                    node: node.index(),
                    count: self.nodes.len(),
                });
            }
        }
        let removed = match input.cut {
            Some((from, to)) => self.cut(from, to),
            None => 0,
        };
        self.simulate(input.attract, exec);
        if let Some((node, target)) = input.grab {
            self.grab(node, target)?;
        }
        Ok(removed)
    }

    pub fn nodes(&self) -> &[RopeNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&RopeNode> {
        self.nodes.get(id.index())
    }

    pub fn positions(&self) -> Vec<Vec2> {
        self.nodes.iter().map(|n| n.position).collect()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Nodes sharing an edge with `node`.
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.edges.iter().filter_map(move |e| e.other(node))
    }

    /// Endpoint pairs of every edge, for drawing.
    pub fn line_segments(&self) -> Vec<(Vec2, Vec2)> {
        self.edges
            .iter()
            .map(|e| (self.nodes[e.a.index()].position, self.nodes[e.b.index()].position))
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn points_x(&self) -> usize {
        self.points_x
    }

    pub fn points_y(&self) -> usize {
        self.points_y
    }

    pub fn params(&self) -> &RopeParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut RopeParams {
        &mut self.params
    }
}
