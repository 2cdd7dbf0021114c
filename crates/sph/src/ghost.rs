//! Ghost boundary particles.
//!
//! A single jittered patch of samples is generated once and translated to
//! whichever wall a fluid particle is close to. The samples only ever appear
//! as extra offsets in density and pressure sums, so they have no index and
//! no state of their own.

use glam::Vec3;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Samples per patch side.
const PATCH_RESOLUTION: usize = 8;

/// Fixed sample patch placed `2r` behind the floor and side walls.
///
/// Each sample stores its in-plane coordinates in `x`/`y` and a small
/// out-of-plane jitter in `z`.
#[derive(Clone, Debug)]
pub struct GhostBoundary {
    particle_radius: f32,
    cell_length: f32,
    samples: Vec<Vec3>,
}

impl GhostBoundary {
    /// Generate one 8x8 layer of samples covering 3x3 cells around the
    /// origin cell. The same seed always yields the same patch.
    pub fn generate(particle_radius: f32, cell_length: f32, seed: u64) -> Self {
        let spacing = 3.0 * cell_length / PATCH_RESOLUTION as f32;
        let corner = -cell_length + 0.5 * spacing;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut jitter = || (rng.gen::<f32>() * 2.0 - 1.0) * particle_radius;

        let mut samples = Vec::with_capacity(PATCH_RESOLUTION * PATCH_RESOLUTION);
        for l1 in 0..PATCH_RESOLUTION {
            for l2 in 0..PATCH_RESOLUTION {
                let u = corner + l1 as f32 * spacing + jitter() * 0.2;
                let v = corner + l2 as f32 * spacing + jitter() * 0.2;
                let depth = jitter() * 0.1;
                samples.push(Vec3::new(u, v, depth));
            }
        }

        Self {
            particle_radius,
            cell_length,
            samples,
        }
    }

    pub fn samples(&self) -> &[Vec3] {
        &self.samples
    }

    /// Distance behind each wall at which the patch sits.
    pub fn wall_distance(&self) -> f32 {
        2.0 * self.particle_radius
    }

    /// Append `ghost - position` for every sample within `max_dist_sqr` of
    /// a particle close to the floor or a side wall. The top face has no
    /// ghosts. Returns how many offsets were added.
    pub fn collect(
        &self,
        position: Vec3,
        lower: Vec3,
        upper: Vec3,
        max_dist_sqr: f32,
        out: &mut Vec<Vec3>,
    ) -> usize {
        let before = out.len();
        let wall = self.wall_distance();
        let overlap_sqr = self.particle_radius * self.particle_radius * 1.0e-8;
        let mut push = |local: Vec3, ghost: Vec3| {
            let offset = ghost - local;
            let dist_sqr = offset.length_squared();
            if dist_sqr <= max_dist_sqr && dist_sqr > overlap_sqr {
                out.push(offset);
            }
        };

        if position.y < lower.y + wall {
            let local = position - Vec3::new(self.snap(position.x), 0.0, self.snap(position.z));
            let y = lower.y - wall;
            for s in &self.samples {
                push(local, Vec3::new(s.x, y + s.z, s.y));
            }
        }

        if position.x < lower.x + wall || position.x > upper.x - wall {
            let local = position - Vec3::new(0.0, self.snap(position.y), self.snap(position.z));
            let x = if position.x < lower.x + wall {
                lower.x - wall
            } else {
                upper.x + wall
            };
            for s in &self.samples {
                push(local, Vec3::new(x + s.z, s.x, s.y));
            }
        }

        if position.z < lower.z + wall || position.z > upper.z - wall {
            let local = position - Vec3::new(self.snap(position.x), self.snap(position.y), 0.0);
            let z = if position.z < lower.z + wall {
                lower.z - wall
            } else {
                upper.z + wall
            };
            for s in &self.samples {
                push(local, Vec3::new(s.x, s.y, z + s.z));
            }
        }

        out.len() - before
    }

    /// Origin of the cell containing `coord` along one axis.
    #[inline]
    fn snap(&self, coord: f32) -> f32 {
        self.cell_length * (coord / self.cell_length).floor()
    }
}
