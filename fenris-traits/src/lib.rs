use nalgebra::{ComplexField, RealField};

pub use nalgebra;

/// Real scalars, used for geometry and reference coordinates.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Scalars that can be stored as expansion coefficients of a finite element function.
///
/// Geometry is always represented in `f64`, so coefficient scalars must have `f64` as their
/// real field. This admits both `f64` and `num::Complex<f64>`.
pub trait FieldScalar: ComplexField<RealField = f64> + Copy {
    /// Scales the scalar by a real geometric factor, e.g. a basis function value.
    #[inline(always)]
    fn mul_real(self, factor: f64) -> Self {
        self.scale(factor)
    }
}

impl<T: ComplexField<RealField = f64> + Copy> FieldScalar for T {}
