//! Dimension abstraction over `glam` vectors.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, Neg, Sub, SubAssign};

use glam::{Vec2, Vec3};

/// A 2D or 3D point usable by the grid and kernels.
pub trait GridPoint:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<f32, Output = Self>
    + AddAssign
    + SubAssign
    + Index<usize, Output = f32>
    + IndexMut<usize>
    + 'static
{
    /// Number of axes.
    const DIM: usize;
    /// The zero vector.
    const ZERO: Self;

    /// Squared Euclidean length.
    fn norm_squared(self) -> f32;
}

impl GridPoint for Vec2 {
    const DIM: usize = 2;
    const ZERO: Self = Vec2::ZERO;

    #[inline]
    fn norm_squared(self) -> f32 {
        self.length_squared()
    }
}

impl GridPoint for Vec3 {
    const DIM: usize = 3;
    const ZERO: Self = Vec3::ZERO;

    #[inline]
    fn norm_squared(self) -> f32 {
        self.length_squared()
    }
}
