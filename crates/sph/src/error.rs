use thiserror::Error;

/// Construction and configuration errors for the grid and solver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SphError {
    /// Particle or interaction radius is zero, negative or not finite
    #[error("invalid radius {radius}: must be positive and finite")]
    InvalidRadius {
        /// Offending value
        radius: f32,
    },

    /// Domain box is empty or inverted on an axis
    #[error("invalid domain on axis {axis}: lower {lower} must be below upper {upper}")]
    InvalidDomain {
        /// Axis index (0 = x)
        axis: usize,
        /// Lower bound on that axis
        lower: f32,
        /// Upper bound on that axis
        upper: f32,
    },

    /// Domain divided by the interaction radius needs too many cells
    #[error("grid of {cells:?} cells is too large")]
    GridTooLarge {
        /// Cells per axis (saturated on overflow)
        cells: [usize; 3],
    },
}
