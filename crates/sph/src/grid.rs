//! Uniform grid for fixed-radius neighbor search.
//!
//! The grid covers the domain box with cells whose edge equals the
//! interaction radius, so two particles in range always share a cell or sit
//! in adjacent ones. Buckets are head/next linked lists rebuilt from scratch
//! on every query.

use std::ops::RangeInclusive;

use pool::Executor;

use crate::error::SphError;
use crate::point::GridPoint;

/// Largest cell array a grid will allocate.
pub const MAX_CELLS: usize = 1 << 28;

/// Neighbors of one particle.
///
/// `offsets[k]` is `position[indices[k]] - position[self]`.
#[derive(Clone, Debug)]
pub struct Neighborhood<P> {
    pub indices: Vec<u32>,
    pub offsets: Vec<P>,
}

impl<P> Neighborhood<P> {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn clear(&mut self) {
        self.indices.clear();
        self.offsets.clear();
    }
}

impl<P> Default for Neighborhood<P> {
    fn default() -> Self {
        Self {
            indices: Vec::new(),
            offsets: Vec::new(),
        }
    }
}

/// Summary of one `find_neighbors` pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NeighborReport {
    /// Particles found outside the domain box (bucketed into the nearest
    /// boundary cell).
    pub out_of_bounds: usize,
    /// Total directed neighbor entries written.
    pub neighbor_entries: usize,
}

/// Uniform grid over an axis-aligned domain.
pub struct SpatialGrid<P: GridPoint> {
    particle_radius: f32,
    interaction_radius: f32,
    inv_cell_length: f32,
    lower: P,
    upper: P,
    grid_size: [usize; 3],

    // Spatial hash: cell -> first particle, particle -> next in same cell
    cell_heads: Vec<i32>,
    cell_next: Vec<i32>,
}

impl<P: GridPoint> SpatialGrid<P> {
    /// Grid whose interaction radius is twice the particle radius.
    pub fn new(particle_radius: f32, lower: P, upper: P) -> Result<Self, SphError> {
        Self::with_interaction_radius(particle_radius, 2.0 * particle_radius, lower, upper)
    }

    /// Grid with an explicit interaction radius (e.g. an SPH kernel support).
    pub fn with_interaction_radius(
        particle_radius: f32,
        interaction_radius: f32,
        lower: P,
        upper: P,
    ) -> Result<Self, SphError> {
        validate_radius(particle_radius)?;
        validate_radius(interaction_radius)?;
        validate_domain(lower, upper)?;

        let inv_cell_length = 1.0 / interaction_radius;
        let grid_size = cell_dims(lower, upper, inv_cell_length)?;

        Ok(Self {
            particle_radius,
            interaction_radius,
            inv_cell_length,
            lower,
            upper,
            grid_size,
            cell_heads: vec![-1; cell_count(grid_size)],
            cell_next: Vec::new(),
        })
    }

    pub fn particle_radius(&self) -> f32 {
        self.particle_radius
    }

    pub fn interaction_radius(&self) -> f32 {
        self.interaction_radius
    }

    /// Cell edge length (equal to the interaction radius).
    pub fn cell_length(&self) -> f32 {
        self.interaction_radius
    }

    pub fn lower_bound(&self) -> P {
        self.lower
    }

    pub fn upper_bound(&self) -> P {
        self.upper
    }

    /// Cells per axis; unused axes report 1.
    pub fn grid_size(&self) -> [usize; 3] {
        self.grid_size
    }

    /// Move the lower corner of the domain.
    pub fn set_lower_bound(&mut self, lower: P) -> Result<(), SphError> {
        validate_domain(lower, self.upper)?;
        let grid_size = cell_dims(lower, self.upper, self.inv_cell_length)?;
        self.lower = lower;
        self.resize_cells(grid_size);
        Ok(())
    }

    /// Move the upper corner of the domain (e.g. a sliding wall).
    pub fn set_upper_bound(&mut self, upper: P) -> Result<(), SphError> {
        validate_domain(self.lower, upper)?;
        let grid_size = cell_dims(self.lower, upper, self.inv_cell_length)?;
        self.upper = upper;
        self.resize_cells(grid_size);
        Ok(())
    }

    /// Find every particle within the interaction radius of every particle.
    ///
    /// `out` is resized to `positions.len()`; existing lists are reused.
    /// A particle is never its own neighbor, but coincident particles are
    /// reported (with a zero offset).
    pub fn find_neighbors(
        &mut self,
        positions: &[P],
        out: &mut Vec<Neighborhood<P>>,
        exec: &Executor,
    ) -> NeighborReport {
        debug_assert!(positions.len() < i32::MAX as usize);

        let out_of_bounds = self.collect_indices(positions);
        out.resize_with(positions.len(), Neighborhood::default);

        let grid = &*self;
        exec.for_each_mut(out.as_mut_slice(), |p, hood| {
            grid.gather(positions, p, hood);
        });

        if out_of_bounds > 0 {
            log::warn!(
                "{} of {} particles outside the domain box",
                out_of_bounds,
                positions.len()
            );
        }

        NeighborReport {
            out_of_bounds,
            neighbor_entries: out.iter().map(Neighborhood::len).sum(),
        }
    }

    /// Push a particle that left the domain back inside.
    ///
    /// On each crossed axis the penetration is reflected (scaled by
    /// `1 + restitution`) and the velocity component is multiplied by
    /// `-restitution`. Returns whether anything was changed.
    pub fn enforce_boundary(&self, position: &mut P, velocity: &mut P, restitution: f32) -> bool {
        let mut changed = false;
        for axis in 0..P::DIM {
            let lower = self.lower[axis];
            let upper = self.upper[axis];
            if position[axis] < lower {
                position[axis] += (lower - position[axis]) * (restitution + 1.0);
                velocity[axis] *= -restitution;
                changed = true;
            } else if position[axis] > upper {
                position[axis] -= (position[axis] - upper) * (restitution + 1.0);
                velocity[axis] *= -restitution;
                changed = true;
            }
            // Deep penetrations can reflect past the opposite wall
            if changed {
                position[axis] = position[axis].clamp(lower, upper);
            }
        }
        changed
    }

    /// Whether a position lies inside the closed domain box.
    pub fn contains(&self, position: P) -> bool {
        (0..P::DIM).all(|axis| position[axis] >= self.lower[axis] && position[axis] <= self.upper[axis])
    }

    fn resize_cells(&mut self, grid_size: [usize; 3]) {
        self.grid_size = grid_size;
        self.cell_heads.resize(cell_count(grid_size), -1);
    }

    /// Cell coordinates of a position, clamped into the grid.
    fn cell_coords(&self, position: P) -> [usize; 3] {
        let mut cell = [0usize; 3];
        for axis in 0..P::DIM {
            let raw = ((position[axis] - self.lower[axis]) * self.inv_cell_length).floor();
            let max = (self.grid_size[axis] - 1) as f32;
            // NaN casts to 0
            cell[axis] = raw.clamp(0.0, max) as usize;
        }
        cell
    }

    #[inline]
    fn flat_index(&self, i: usize, j: usize, k: usize) -> usize {
        (k * self.grid_size[1] + j) * self.grid_size[0] + i
    }

    fn axis_range(&self, cell: [usize; 3], axis: usize) -> RangeInclusive<usize> {
        if axis >= P::DIM {
            return 0..=0;
        }
        cell[axis].saturating_sub(1)..=(cell[axis] + 1).min(self.grid_size[axis] - 1)
    }

    /// Bucket particles into cells. Returns the number outside the domain.
    fn collect_indices(&mut self, positions: &[P]) -> usize {
        self.cell_heads.fill(-1);
        self.cell_next.clear();
        self.cell_next.resize(positions.len(), -1);

        let mut out_of_bounds = 0;
        for (i, &position) in positions.iter().enumerate() {
            if !self.contains(position) {
                out_of_bounds += 1;
            }
            let [cx, cy, cz] = self.cell_coords(position);
            let cell = self.flat_index(cx, cy, cz);
            self.cell_next[i] = self.cell_heads[cell];
            self.cell_heads[cell] = i as i32;
        }
        out_of_bounds
    }

    fn gather(&self, positions: &[P], p: usize, hood: &mut Neighborhood<P>) {
        hood.clear();
        let origin = positions[p];
        let max_dist_sqr = self.interaction_radius * self.interaction_radius;
        let cell = self.cell_coords(origin);

        for k in self.axis_range(cell, 2) {
            for j in self.axis_range(cell, 1) {
                for i in self.axis_range(cell, 0) {
                    let mut q = self.cell_heads[self.flat_index(i, j, k)];
                    while q != -1 {
                        let q_idx = q as usize;
                        if q_idx != p {
                            let offset = positions[q_idx] - origin;
                            if offset.norm_squared() <= max_dist_sqr {
                                hood.indices.push(q as u32);
                                hood.offsets.push(offset);
                            }
                        }
                        q = self.cell_next[q_idx];
                    }
                }
            }
        }
    }
}

/// Cells per axis for a domain, rejecting grids above `MAX_CELLS`.
fn cell_dims<P: GridPoint>(lower: P, upper: P, inv_cell_length: f32) -> Result<[usize; 3], SphError> {
    let mut size = [1usize; 3];
    for (axis, cells) in size.iter_mut().enumerate().take(P::DIM) {
        let extent = upper[axis] - lower[axis];
        // Saturating cast: an infinite ratio becomes usize::MAX
        *cells = ((extent * inv_cell_length).ceil() as usize).max(1);
    }
    let total = size.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n));
    match total {
        Some(total) if total <= MAX_CELLS => Ok(size),
        _ => Err(SphError::GridTooLarge { cells: size }),
    }
}

#[inline]
fn cell_count(grid_size: [usize; 3]) -> usize {
    grid_size[0] * grid_size[1] * grid_size[2]
}

fn validate_radius(radius: f32) -> Result<(), SphError> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        Err(SphError::InvalidRadius { radius })
    }
}

fn validate_domain<P: GridPoint>(lower: P, upper: P) -> Result<(), SphError> {
    for axis in 0..P::DIM {
        let (lo, hi) = (lower[axis], upper[axis]);
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(SphError::InvalidDomain {
                axis,
                lower: lo,
                upper: hi,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    fn unit_box() -> SpatialGrid<Vec3> {
        SpatialGrid::new(0.05, Vec3::ZERO, Vec3::ONE).unwrap()
    }

    #[test]
    fn test_grid_size_from_domain() {
        let grid = unit_box();
        // Interaction radius 0.1 over a unit box
        assert_eq!(grid.grid_size(), [10, 10, 10]);

        let grid2 = SpatialGrid::new(0.05, Vec2::ZERO, Vec2::new(1.0, 0.35)).unwrap();
        assert_eq!(grid2.grid_size(), [10, 4, 1]);
    }

    #[test]
    fn test_rejects_bad_construction() {
        assert_eq!(
            SpatialGrid::new(0.0, Vec3::ZERO, Vec3::ONE).err(),
            Some(SphError::InvalidRadius { radius: 0.0 })
        );
        assert!(matches!(
            SpatialGrid::new(0.1, Vec3::ONE, Vec3::new(2.0, 0.5, 2.0)),
            Err(SphError::InvalidDomain { axis: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_oversized_grid() {
        let result = SpatialGrid::new(1e-4, Vec3::splat(-1e6), Vec3::splat(1e6));
        assert!(matches!(result, Err(SphError::GridTooLarge { .. })));

        // Fits without overflowing but is above the cap
        let result = SpatialGrid::new(0.5e-3, Vec3::ZERO, Vec3::ONE);
        match result {
            Err(SphError::GridTooLarge { cells }) => assert!(cells.iter().product::<usize>() > MAX_CELLS),
            other => panic!("expected GridTooLarge, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_oversized_bound_change_keeps_grid() {
        let mut grid = unit_box();
        let result = grid.set_upper_bound(Vec3::splat(1e9));
        assert!(matches!(result, Err(SphError::GridTooLarge { .. })));
        assert_eq!(grid.upper_bound(), Vec3::ONE);
        assert_eq!(grid.grid_size(), [10, 10, 10]);

        let result = grid.set_lower_bound(Vec3::splat(-1e9));
        assert!(matches!(result, Err(SphError::GridTooLarge { .. })));
        assert_eq!(grid.lower_bound(), Vec3::ZERO);
    }

    #[test]
    fn test_boundary_positions_do_not_panic() {
        let mut grid = unit_box();
        let positions = vec![Vec3::ZERO, Vec3::ONE, Vec3::new(1.0, 0.0, 1.0)];
        let mut out = Vec::new();
        let report = grid.find_neighbors(&positions, &mut out, &Executor::Sequential);
        assert_eq!(report.out_of_bounds, 0);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_cell_coords_clamp() {
        let grid = unit_box();
        assert_eq!(grid.cell_coords(Vec3::splat(-5.0)), [0, 0, 0]);
        assert_eq!(grid.cell_coords(Vec3::splat(5.0)), [9, 9, 9]);
        assert_eq!(grid.cell_coords(Vec3::splat(f32::NAN)), [0, 0, 0]);
    }

    #[test]
    fn test_offsets_point_from_self_to_neighbor() {
        let mut grid = unit_box();
        let positions = vec![Vec3::splat(0.5), Vec3::new(0.55, 0.5, 0.5)];
        let mut out = Vec::new();
        grid.find_neighbors(&positions, &mut out, &Executor::Sequential);
        assert_eq!(out[0].indices, vec![1]);
        assert!((out[0].offsets[0] - Vec3::new(0.05, 0.0, 0.0)).length() < 1e-6);
        assert!((out[1].offsets[0] + Vec3::new(0.05, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_coincident_particles_are_neighbors() {
        let mut grid = unit_box();
        let positions = vec![Vec3::splat(0.3); 2];
        let mut out = Vec::new();
        grid.find_neighbors(&positions, &mut out, &Executor::Sequential);
        assert_eq!(out[0].indices, vec![1]);
        assert_eq!(out[0].offsets[0], Vec3::ZERO);
    }

    #[test]
    fn test_moving_wall_resizes_grid() {
        let mut grid = unit_box();
        grid.set_upper_bound(Vec3::new(0.5, 1.0, 1.0)).unwrap();
        assert_eq!(grid.grid_size(), [5, 10, 10]);
        assert!(grid.set_upper_bound(Vec3::new(-1.0, 1.0, 1.0)).is_err());
        // Failed update leaves the domain untouched
        assert_eq!(grid.upper_bound(), Vec3::new(0.5, 1.0, 1.0));
    }

    #[test]
    fn test_enforce_boundary_inside_is_noop() {
        let grid = unit_box();
        let mut pos = Vec3::splat(0.5);
        let mut vel = Vec3::new(1.0, -2.0, 3.0);
        assert!(!grid.enforce_boundary(&mut pos, &mut vel, 0.5));
        assert_eq!(pos, Vec3::splat(0.5));
        assert_eq!(vel, Vec3::new(1.0, -2.0, 3.0));
    }
}
