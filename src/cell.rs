//! Reference cells.
//!
//! All reference cells live in the unit box $[0, 1]^d$. Vertices and edges are numbered as in
//! basix: simplex edges are ordered by the vertex they are opposite to (in 2D), and tensor
//! product cells order their vertices lexicographically with the first coordinate running
//! fastest.
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    Interval,
    Triangle,
    Quadrilateral,
    Tetrahedron,
    Hexahedron,
}

const INTERVAL_VERTICES: [[f64; 3]; 2] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
const TRIANGLE_VERTICES: [[f64; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
const QUADRILATERAL_VERTICES: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
];
const TETRAHEDRON_VERTICES: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];
const HEXAHEDRON_VERTICES: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
    [1.0, 1.0, 1.0],
];

const TRIANGLE_EDGES: [[usize; 2]; 3] = [[1, 2], [0, 2], [0, 1]];
const QUADRILATERAL_EDGES: [[usize; 2]; 4] = [[0, 1], [0, 2], [1, 3], [2, 3]];
const TETRAHEDRON_EDGES: [[usize; 2]; 6] = [[2, 3], [1, 3], [1, 2], [0, 3], [0, 2], [0, 1]];
const HEXAHEDRON_EDGES: [[usize; 2]; 12] = [
    [0, 1],
    [0, 2],
    [0, 4],
    [1, 3],
    [1, 5],
    [2, 3],
    [2, 6],
    [3, 7],
    [4, 5],
    [4, 6],
    [5, 7],
    [6, 7],
];

impl CellType {
    pub fn topological_dimension(&self) -> usize {
        match self {
            CellType::Interval => 1,
            CellType::Triangle | CellType::Quadrilateral => 2,
            CellType::Tetrahedron | CellType::Hexahedron => 3,
        }
    }

    pub fn is_simplex(&self) -> bool {
        matches!(self, CellType::Interval | CellType::Triangle | CellType::Tetrahedron)
    }

    pub fn num_vertices(&self) -> usize {
        self.reference_vertices().len()
    }

    /// Reference vertex coordinates, padded with zeros to three components.
    pub fn reference_vertices(&self) -> &'static [[f64; 3]] {
        match self {
            CellType::Interval => &INTERVAL_VERTICES,
            CellType::Triangle => &TRIANGLE_VERTICES,
            CellType::Quadrilateral => &QUADRILATERAL_VERTICES,
            CellType::Tetrahedron => &TETRAHEDRON_VERTICES,
            CellType::Hexahedron => &HEXAHEDRON_VERTICES,
        }
    }

    /// Local vertex pairs of the edges of the cell.
    ///
    /// An interval has no edges distinct from the cell itself, so the list is empty.
    pub fn edges(&self) -> &'static [[usize; 2]] {
        match self {
            CellType::Interval => &[],
            CellType::Triangle => &TRIANGLE_EDGES,
            CellType::Quadrilateral => &QUADRILATERAL_EDGES,
            CellType::Tetrahedron => &TETRAHEDRON_EDGES,
            CellType::Hexahedron => &HEXAHEDRON_EDGES,
        }
    }

    pub fn num_edges(&self) -> usize {
        self.edges().len()
    }

    pub fn reference_centroid(&self) -> [f64; 3] {
        let vertices = self.reference_vertices();
        let n = vertices.len() as f64;
        let mut centroid = [0.0; 3];
        for v in vertices {
            for k in 0..3 {
                centroid[k] += v[k] / n;
            }
        }
        centroid
    }

    /// Midpoint of the given local edge in reference coordinates.
    pub fn reference_edge_midpoint(&self, edge: usize) -> [f64; 3] {
        let [a, b] = self.edges()[edge];
        let vertices = self.reference_vertices();
        let mut midpoint = [0.0; 3];
        for k in 0..3 {
            midpoint[k] = 0.5 * (vertices[a][k] + vertices[b][k]);
        }
        midpoint
    }

    /// Tests whether the reference point `xi` (with at least `tdim` components) lies in the
    /// reference cell, allowing each defining inequality to be violated by `tolerance`.
    pub fn contains_reference_point(&self, xi: &[f64], tolerance: f64) -> bool {
        let tdim = self.topological_dimension();
        let xi = &xi[..tdim];
        let lower_bounds_hold = xi.iter().all(|&x| x >= -tolerance);
        if self.is_simplex() {
            lower_bounds_hold && xi.iter().sum::<f64>() <= 1.0 + tolerance
        } else {
            lower_bounds_hold && xi.iter().all(|&x| x <= 1.0 + tolerance)
        }
    }
}
