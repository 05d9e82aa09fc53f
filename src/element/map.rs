use fenris_traits::FieldScalar;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// How reference values of a basis are mapped to physical values.
///
/// With $J$ the Jacobian of the cell map, $K$ its (pseudo-)inverse and $\det J$ its
/// determinant, the push-forward of a reference value $V$ is
///
/// - `Identity`: $V$,
/// - `ContravariantPiola`: $\frac{1}{\det J} J V$,
/// - `CovariantPiola`: $K^T V$,
/// - `DoubleContravariantPiola`: $\frac{1}{(\det J)^2} J V J^T$, with $V$ a row-major square matrix.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapType {
    Identity,
    ContravariantPiola,
    CovariantPiola,
    DoubleContravariantPiola,
}

impl MapType {
    /// The number of reference value components consumed by one application of the map on a
    /// cell of the given topological dimension.
    pub fn block_size(&self, tdim: usize) -> usize {
        match self {
            MapType::Identity => 1,
            MapType::ContravariantPiola | MapType::CovariantPiola => tdim,
            MapType::DoubleContravariantPiola => tdim * tdim,
        }
    }

    /// Maps the reference value `reference` to the physical value `physical`.
    ///
    /// `j` is the `gdim x tdim` Jacobian and `k` its `tdim x gdim` (pseudo-)inverse.
    pub fn push_forward<T: FieldScalar>(
        &self,
        reference: &[T],
        j: &DMatrix<f64>,
        k: &DMatrix<f64>,
        det_j: f64,
        physical: &mut [T],
    ) {
        match self {
            MapType::Identity => physical.copy_from_slice(reference),
            MapType::ContravariantPiola => {
                for (c, out) in physical.iter_mut().enumerate() {
                    *out = (0..j.ncols()).fold(T::zero(), |acc, d| acc + reference[d].mul_real(j[(c, d)] / det_j));
                }
            }
            MapType::CovariantPiola => {
                for (c, out) in physical.iter_mut().enumerate() {
                    *out = (0..k.nrows()).fold(T::zero(), |acc, d| acc + reference[d].mul_real(k[(d, c)]));
                }
            }
            MapType::DoubleContravariantPiola => {
                let (gdim, tdim) = j.shape();
                let scale = 1.0 / (det_j * det_j);
                for a in 0..gdim {
                    for b in 0..gdim {
                        let mut value = T::zero();
                        for p in 0..tdim {
                            for q in 0..tdim {
                                value += reference[p * tdim + q].mul_real(j[(a, p)] * j[(b, q)] * scale);
                            }
                        }
                        physical[a * gdim + b] = value;
                    }
                }
            }
        }
    }

    /// Inverse of [`push_forward`](Self::push_forward).
    pub fn pull_back<T: FieldScalar>(
        &self,
        physical: &[T],
        j: &DMatrix<f64>,
        k: &DMatrix<f64>,
        det_j: f64,
        reference: &mut [T],
    ) {
        match self {
            MapType::Identity => reference.copy_from_slice(physical),
            MapType::ContravariantPiola => {
                for (d, out) in reference.iter_mut().enumerate() {
                    *out = (0..k.ncols()).fold(T::zero(), |acc, c| acc + physical[c].mul_real(det_j * k[(d, c)]));
                }
            }
            MapType::CovariantPiola => {
                for (d, out) in reference.iter_mut().enumerate() {
                    *out = (0..j.nrows()).fold(T::zero(), |acc, c| acc + physical[c].mul_real(j[(c, d)]));
                }
            }
            MapType::DoubleContravariantPiola => {
                let (tdim, gdim) = k.shape();
                let scale = det_j * det_j;
                for p in 0..tdim {
                    for q in 0..tdim {
                        let mut value = T::zero();
                        for a in 0..gdim {
                            for b in 0..gdim {
                                value += physical[a * gdim + b].mul_real(k[(p, a)] * k[(q, b)] * scale);
                            }
                        }
                        reference[p * tdim + q] = value;
                    }
                }
            }
        }
    }
}

/// A contiguous range of reference value components sharing a single [`MapType`].
///
/// Elements assemble a table of blocks when they are constructed, so that mapping a value
/// never needs to inspect the element family.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MapBlock {
    pub map_type: MapType,
    pub offset: usize,
    pub size: usize,
}

impl MapBlock {
    pub(crate) fn push_forward<T: FieldScalar>(
        &self,
        reference: &[T],
        j: &DMatrix<f64>,
        k: &DMatrix<f64>,
        det_j: f64,
        physical: &mut [T],
    ) {
        let range = self.offset..self.offset + self.size;
        self.map_type
            .push_forward(&reference[range.clone()], j, k, det_j, &mut physical[range]);
    }

    pub(crate) fn pull_back<T: FieldScalar>(
        &self,
        physical: &[T],
        j: &DMatrix<f64>,
        k: &DMatrix<f64>,
        det_j: f64,
        reference: &mut [T],
    ) {
        let range = self.offset..self.offset + self.size;
        self.map_type
            .pull_back(&physical[range.clone()], j, k, det_j, &mut reference[range]);
    }
}
