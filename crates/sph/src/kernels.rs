//! Poly6 and Spiky smoothing kernels (Müller et al. 2003).
//!
//! Coefficients are precomputed once per support radius; the dimension comes
//! from the `GridPoint` type.

use std::f32::consts::PI;
use std::marker::PhantomData;

use crate::point::GridPoint;

/// Squared distances at or below this are treated as coincident.
pub const ZERO_DISTANCE_SQR: f32 = 1e-12;

/// Poly6 density kernel: `W(r) = k (h² - r²)³`.
#[derive(Clone, Copy, Debug)]
pub struct Poly6Kernel<P> {
    radius_sqr: f32,
    coeff: f32,
    _dim: PhantomData<P>,
}

impl<P: GridPoint> Poly6Kernel<P> {
    pub fn new(radius: f32) -> Self {
        let coeff = match P::DIM {
            2 => 4.0 / (PI * radius.powi(8)),
            _ => 315.0 / (64.0 * PI * radius.powi(9)),
        };
        Self {
            radius_sqr: radius * radius,
            coeff,
            _dim: PhantomData,
        }
    }

    /// Kernel value at a squared distance.
    #[inline]
    pub fn w(&self, r_sqr: f32) -> f32 {
        if r_sqr > self.radius_sqr {
            return 0.0;
        }
        let diff = self.radius_sqr - r_sqr;
        self.coeff * diff * diff * diff
    }

    /// `W(0)`, the self contribution.
    #[inline]
    pub fn w0(&self) -> f32 {
        self.coeff * self.radius_sqr * self.radius_sqr * self.radius_sqr
    }
}

/// Spiky pressure kernel gradient: `∇W(r) = l (h - |r|)² r / |r|`.
#[derive(Clone, Copy, Debug)]
pub struct SpikyKernel<P> {
    radius: f32,
    coeff: f32,
    _dim: PhantomData<P>,
}

impl<P: GridPoint> SpikyKernel<P> {
    pub fn new(radius: f32) -> Self {
        let coeff = match P::DIM {
            2 => -30.0 / (PI * radius.powi(5)),
            _ => -45.0 / (PI * radius.powi(6)),
        };
        Self {
            radius,
            coeff,
            _dim: PhantomData,
        }
    }

    #[inline]
    pub fn grad_w(&self, r: P) -> P {
        let r_sqr = r.norm_squared();
        if r_sqr <= ZERO_DISTANCE_SQR || r_sqr > self.radius * self.radius {
            return P::ZERO;
        }
        let len = r_sqr.sqrt();
        let diff = self.radius - len;
        r * (self.coeff * diff * diff / len)
    }
}

/// Both kernels sharing one support radius.
#[derive(Clone, Copy, Debug)]
pub struct SphKernels<P> {
    radius: f32,
    poly6: Poly6Kernel<P>,
    spiky: SpikyKernel<P>,
}

impl<P: GridPoint> SphKernels<P> {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            poly6: Poly6Kernel::new(radius),
            spiky: SpikyKernel::new(radius),
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn w(&self, r_sqr: f32) -> f32 {
        self.poly6.w(r_sqr)
    }

    #[inline]
    pub fn w0(&self) -> f32 {
        self.poly6.w0()
    }

    #[inline]
    pub fn grad_w(&self, r: P) -> P {
        self.spiky.grad_w(r)
    }
}
