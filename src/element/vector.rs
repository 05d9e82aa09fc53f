//! Lowest-order $H(\mathrm{div})$ and $H(\mathrm{curl})$ conforming elements on triangles.
//!
//! Both elements carry one dof per edge. The dof of edge $e = (a, b)$ is the normal
//! (Raviart–Thomas) or tangential (Nédélec) component at the edge midpoint, measured against
//! the unnormalized edge tangent $t = v_b - v_a$ or its rotation $n = (t_y, -t_x)$. The sign
//! of a dof therefore depends on the edge orientation, which the dofmap accounts for.
use crate::cell::CellType;
use crate::element::{ElementFamily, EntityDofLayout, MapType, ReferenceBasis};
use crate::error::{FunctionError, Result};
use nalgebra::DMatrix;

const BARYCENTRIC_GRADIENTS: [[f64; 2]; 3] = [[-1.0, -1.0], [1.0, 0.0], [0.0, 1.0]];

fn barycentric(xi: &[f64]) -> [f64; 3] {
    [1.0 - xi[0] - xi[1], xi[0], xi[1]]
}

fn edge_tangent(edge: usize) -> [f64; 2] {
    let [a, b] = CellType::Triangle.edges()[edge];
    let vertices = CellType::Triangle.reference_vertices();
    [vertices[b][0] - vertices[a][0], vertices[b][1] - vertices[a][1]]
}

fn edge_normal(edge: usize) -> [f64; 2] {
    let [tx, ty] = edge_tangent(edge);
    [ty, -tx]
}

fn require_triangle(cell_type: CellType, name: &str) -> Result<()> {
    if cell_type == CellType::Triangle {
        Ok(())
    } else {
        Err(FunctionError::UnsupportedElement(format!(
            "{} elements are only available on triangles, not {:?}",
            name, cell_type
        )))
    }
}

/// Interpolation matrix for edge-midpoint functionals `v(m_e) . w_e`.
fn edge_functionals(directions: impl Fn(usize) -> [f64; 2]) -> DMatrix<f64> {
    let num_points = 3;
    let mut matrix = DMatrix::zeros(3, 2 * num_points);
    for e in 0..3 {
        let w = directions(e);
        for c in 0..2 {
            matrix[(e, c * num_points + e)] = w[c];
        }
    }
    matrix
}

fn edge_midpoints() -> DMatrix<f64> {
    DMatrix::from_fn(3, 2, |e, d| CellType::Triangle.reference_edge_midpoint(e)[d])
}

/// Raviart–Thomas element of degree 1 on the reference triangle.
///
/// Basis function $i$ is $\sigma_i (\xi - p_i)$, where $p_i$ is the vertex opposite to edge
/// $i$ and $\sigma_i = \pm 1$ normalizes the flux through edge $i$ to one.
#[derive(Debug, Clone)]
pub struct RaviartThomas {
    signs: [f64; 3],
}

impl RaviartThomas {
    pub fn new(cell_type: CellType) -> Result<Self> {
        require_triangle(cell_type, "Raviart-Thomas")?;
        let vertices = CellType::Triangle.reference_vertices();
        let mut signs = [1.0; 3];
        for (e, sign) in signs.iter_mut().enumerate() {
            let m = CellType::Triangle.reference_edge_midpoint(e);
            let n = edge_normal(e);
            let flux = (m[0] - vertices[e][0]) * n[0] + (m[1] - vertices[e][1]) * n[1];
            *sign = flux.signum();
        }
        Ok(Self { signs })
    }
}

impl ReferenceBasis for RaviartThomas {
    fn cell_type(&self) -> CellType {
        CellType::Triangle
    }

    fn family(&self) -> ElementFamily {
        ElementFamily::RaviartThomas
    }

    fn degree(&self) -> usize {
        1
    }

    fn num_basis(&self) -> usize {
        3
    }

    fn reference_value_size(&self) -> usize {
        2
    }

    fn map_type(&self) -> MapType {
        MapType::ContravariantPiola
    }

    fn entity_dofs(&self) -> EntityDofLayout {
        EntityDofLayout {
            per_vertex: 0,
            per_edge: 1,
            per_cell: 0,
        }
    }

    fn has_oriented_edge_dofs(&self) -> bool {
        true
    }

    fn populate_basis(&self, basis_values: &mut [f64], xi: &[f64]) {
        assert_eq!(basis_values.len(), 6);
        let vertices = CellType::Triangle.reference_vertices();
        for i in 0..3 {
            for c in 0..2 {
                basis_values[2 * i + c] = self.signs[i] * (xi[c] - vertices[i][c]);
            }
        }
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [f64], _xi: &[f64]) {
        assert_eq!(basis_gradients.len(), 12);
        basis_gradients.fill(0.0);
        for i in 0..3 {
            for c in 0..2 {
                basis_gradients[(2 * i + c) * 2 + c] = self.signs[i];
            }
        }
    }

    fn interpolation_points(&self) -> DMatrix<f64> {
        edge_midpoints()
    }

    fn interpolation_matrix(&self) -> DMatrix<f64> {
        edge_functionals(edge_normal)
    }
}

/// Nédélec (first kind) element of degree 1 on the reference triangle.
///
/// The basis function of edge $(a, b)$ is the Whitney form
/// $\lambda_a \nabla\lambda_b - \lambda_b \nabla\lambda_a$.
#[derive(Debug, Clone)]
pub struct Nedelec;

impl Nedelec {
    pub fn new(cell_type: CellType) -> Result<Self> {
        require_triangle(cell_type, "Nedelec")?;
        Ok(Self)
    }
}

impl ReferenceBasis for Nedelec {
    fn cell_type(&self) -> CellType {
        CellType::Triangle
    }

    fn family(&self) -> ElementFamily {
        ElementFamily::Nedelec
    }

    fn degree(&self) -> usize {
        1
    }

    fn num_basis(&self) -> usize {
        3
    }

    fn reference_value_size(&self) -> usize {
        2
    }

    fn map_type(&self) -> MapType {
        MapType::CovariantPiola
    }

    fn entity_dofs(&self) -> EntityDofLayout {
        EntityDofLayout {
            per_vertex: 0,
            per_edge: 1,
            per_cell: 0,
        }
    }

    fn has_oriented_edge_dofs(&self) -> bool {
        true
    }

    fn populate_basis(&self, basis_values: &mut [f64], xi: &[f64]) {
        assert_eq!(basis_values.len(), 6);
        let lambda = barycentric(xi);
        for (i, [a, b]) in CellType::Triangle.edges().iter().copied().enumerate() {
            let (grad_a, grad_b) = (BARYCENTRIC_GRADIENTS[a], BARYCENTRIC_GRADIENTS[b]);
            for c in 0..2 {
                basis_values[2 * i + c] = lambda[a] * grad_b[c] - lambda[b] * grad_a[c];
            }
        }
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [f64], _xi: &[f64]) {
        assert_eq!(basis_gradients.len(), 12);
        for (i, [a, b]) in CellType::Triangle.edges().iter().copied().enumerate() {
            let (grad_a, grad_b) = (BARYCENTRIC_GRADIENTS[a], BARYCENTRIC_GRADIENTS[b]);
            for c in 0..2 {
                for d in 0..2 {
                    basis_gradients[(2 * i + c) * 2 + d] = grad_a[d] * grad_b[c] - grad_b[d] * grad_a[c];
                }
            }
        }
    }

    fn interpolation_points(&self) -> DMatrix<f64> {
        edge_midpoints()
    }

    fn interpolation_matrix(&self) -> DMatrix<f64> {
        edge_functionals(edge_tangent)
    }
}
