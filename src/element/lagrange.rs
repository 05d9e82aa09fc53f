use crate::cell::CellType;
use crate::element::{ElementFamily, EntityDofLayout, MapType, ReferenceBasis};
use crate::error::{FunctionError, Result};
use nalgebra::DMatrix;

/// Nodal Lagrange basis of degree 0, 1 or 2 on a reference cell.
///
/// The basis is expressed in monomials, with coefficients obtained by inverting the
/// Vandermonde matrix of the nodes, so that $\varphi_i(\xi_j) = \delta_{ij}$. Nodes are ordered
/// by entity: vertices, then edge midpoints, then interior nodes.
#[derive(Debug, Clone)]
pub struct LagrangeBasis {
    cell_type: CellType,
    degree: usize,
    discontinuous: bool,
    nodes: Vec<[f64; 3]>,
    exponents: Vec<[i32; 3]>,
    /// Column `i` holds the monomial coefficients of basis function `i`.
    coefficients: DMatrix<f64>,
}

impl LagrangeBasis {
    pub fn new(cell_type: CellType, degree: usize, discontinuous: bool) -> Result<Self> {
        let unsupported = || {
            FunctionError::UnsupportedElement(format!(
                "Lagrange elements of degree {} on {:?} cells are not available",
                degree, cell_type
            ))
        };

        if degree == 0 && !discontinuous {
            return Err(FunctionError::UnsupportedElement(
                "continuous Lagrange elements require degree >= 1".to_string(),
            ));
        }
        if degree > 2 || (degree == 2 && cell_type == CellType::Hexahedron) {
            return Err(unsupported());
        }

        let nodes = lagrange_nodes(cell_type, degree);
        let exponents = monomial_exponents(cell_type, degree);
        debug_assert_eq!(nodes.len(), exponents.len());

        let n = nodes.len();
        let vandermonde = DMatrix::from_fn(n, n, |p, m| monomial(&exponents[m], &nodes[p]));
        let coefficients = vandermonde.try_inverse().ok_or_else(unsupported)?;

        Ok(Self {
            cell_type,
            degree,
            discontinuous,
            nodes,
            exponents,
            coefficients,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Reference coordinates of the nodes, in local dof order.
    pub fn nodes(&self) -> &[[f64; 3]] {
        &self.nodes
    }
}

fn lagrange_nodes(cell_type: CellType, degree: usize) -> Vec<[f64; 3]> {
    if degree == 0 {
        return vec![cell_type.reference_centroid()];
    }

    let mut nodes = cell_type.reference_vertices().to_vec();
    if degree == 2 {
        nodes.extend((0..cell_type.num_edges()).map(|e| cell_type.reference_edge_midpoint(e)));
        match cell_type {
            CellType::Interval | CellType::Quadrilateral => nodes.push(cell_type.reference_centroid()),
            _ => {}
        }
    }
    nodes
}

fn monomial_exponents(cell_type: CellType, degree: usize) -> Vec<[i32; 3]> {
    let tdim = cell_type.topological_dimension();
    let degree = degree as i32;
    let range = |d: usize| if d < tdim { 0..=degree } else { 0..=0 };

    let mut exponents = Vec::new();
    for c in range(2) {
        for b in range(1) {
            for a in range(0) {
                let admissible = if cell_type.is_simplex() { a + b + c <= degree } else { true };
                if admissible {
                    exponents.push([a, b, c]);
                }
            }
        }
    }
    exponents
}

fn monomial(exponents: &[i32; 3], xi: &[f64]) -> f64 {
    exponents
        .iter()
        .zip(xi)
        .map(|(&e, &x)| x.powi(e))
        .product()
}

fn monomial_derivative(exponents: &[i32; 3], xi: &[f64], direction: usize) -> f64 {
    let e = exponents[direction];
    if e == 0 {
        return 0.0;
    }
    let mut value = e as f64 * xi[direction].powi(e - 1);
    for (k, (&e_k, &x_k)) in exponents.iter().zip(xi).enumerate() {
        if k != direction {
            value *= x_k.powi(e_k);
        }
    }
    value
}

impl ReferenceBasis for LagrangeBasis {
    fn cell_type(&self) -> CellType {
        self.cell_type
    }

    fn family(&self) -> ElementFamily {
        if self.discontinuous {
            ElementFamily::DiscontinuousLagrange
        } else {
            ElementFamily::Lagrange
        }
    }

    fn degree(&self) -> usize {
        self.degree
    }

    fn num_basis(&self) -> usize {
        self.nodes.len()
    }

    fn reference_value_size(&self) -> usize {
        1
    }

    fn map_type(&self) -> MapType {
        MapType::Identity
    }

    fn entity_dofs(&self) -> EntityDofLayout {
        if self.discontinuous {
            return EntityDofLayout {
                per_vertex: 0,
                per_edge: 0,
                per_cell: self.nodes.len(),
            };
        }
        let num_vertices = self.cell_type.num_vertices();
        let num_edges = self.cell_type.num_edges();
        let per_edge = if self.degree == 2 && num_edges > 0 { 1 } else { 0 };
        EntityDofLayout {
            per_vertex: 1,
            per_edge,
            per_cell: self.nodes.len() - num_vertices - per_edge * num_edges,
        }
    }

    fn populate_basis(&self, basis_values: &mut [f64], xi: &[f64]) {
        let n = self.num_basis();
        assert_eq!(basis_values.len(), n);
        let xi = &xi[..3.min(xi.len())];
        for (i, value) in basis_values.iter_mut().enumerate() {
            *value = self
                .exponents
                .iter()
                .enumerate()
                .map(|(m, e)| self.coefficients[(m, i)] * monomial(e, xi))
                .sum();
        }
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [f64], xi: &[f64]) {
        let n = self.num_basis();
        let tdim = self.cell_type.topological_dimension();
        assert_eq!(basis_gradients.len(), n * tdim);
        let xi = &xi[..3.min(xi.len())];
        for i in 0..n {
            for d in 0..tdim {
                basis_gradients[i * tdim + d] = self
                    .exponents
                    .iter()
                    .enumerate()
                    .map(|(m, e)| self.coefficients[(m, i)] * monomial_derivative(e, xi, d))
                    .sum();
            }
        }
    }

    fn interpolation_points(&self) -> DMatrix<f64> {
        let tdim = self.cell_type.topological_dimension();
        DMatrix::from_fn(self.nodes.len(), tdim, |p, d| self.nodes[p][d])
    }

    fn interpolation_matrix(&self) -> DMatrix<f64> {
        DMatrix::identity(self.nodes.len(), self.nodes.len())
    }
}
