//! Unstructured meshes with a single cell type and a Lagrange coordinate element.
use crate::cell::CellType;
use crate::element::FiniteElement;
use crate::error::{FunctionError, Result};
use crate::geometry::BoundingBoxTree;
use crate::settings::PullbackSettings;
use log::warn;
use nalgebra::DMatrix;
use std::sync::OnceLock;

pub mod procedural;
mod pullback;
mod topology;

pub use topology::Topology;

/// Jacobian data of the cell map at a single reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct CellJacobian {
    /// `gdim x tdim` Jacobian $J = \partial x / \partial \xi$.
    pub j: DMatrix<f64>,
    /// `tdim x gdim` inverse of $J$, or its pseudo-inverse $(J^T J)^{-1} J^T$ on manifolds.
    pub k: DMatrix<f64>,
    /// $\det J$, or $\sqrt{\det(J^T J)}$ on manifolds.
    pub det_j: f64,
}

impl CellJacobian {
    pub fn from_jacobian(j: DMatrix<f64>) -> Self {
        let (gdim, tdim) = j.shape();
        let (k, det_j) = if gdim == tdim {
            let det_j = j.determinant();
            let k = j.clone().try_inverse();
            (k, det_j)
        } else {
            let jtj = j.transpose() * &j;
            let det_j = jtj.determinant().max(0.0).sqrt();
            let k = jtj.try_inverse().map(|inv| inv * j.transpose());
            (k, det_j)
        };
        let k = k.unwrap_or_else(|| DMatrix::from_element(tdim, gdim, f64::NAN));
        Self { j, k, det_j }
    }
}

#[derive(Debug, Clone)]
struct AffineCellMap {
    origin: [f64; 3],
    jacobian: CellJacobian,
}

/// A mesh of cells of a single type.
///
/// Cell geometry is given by a Lagrange coordinate element of degree 1 or 2: each cell lists
/// its geometry nodes in the local dof order of that element, so its corner nodes come first.
#[derive(Debug)]
pub struct Mesh {
    cell_type: CellType,
    gdim: usize,
    coordinate_element: FiniteElement,
    coordinates: Vec<f64>,
    cell_nodes: Vec<usize>,
    topology: Topology,
    affine_maps: Option<Vec<AffineCellMap>>,
    bounding_box_tree: OnceLock<BoundingBoxTree>,
    pullback_settings: PullbackSettings,
}

impl Mesh {
    /// Creates a mesh from node coordinates (`gdim` values per node) and cell nodes.
    pub fn new(
        cell_type: CellType,
        gdim: usize,
        degree: usize,
        coordinates: Vec<f64>,
        cell_nodes: Vec<usize>,
    ) -> Result<Self> {
        let tdim = cell_type.topological_dimension();
        if gdim < tdim || gdim > 3 {
            return Err(FunctionError::DimensionMismatch(format!(
                "geometric dimension {} is incompatible with {:?} cells",
                gdim, cell_type
            )));
        }
        if coordinates.len() % gdim != 0 {
            return Err(FunctionError::DimensionMismatch(format!(
                "{} coordinate values do not form points of dimension {}",
                coordinates.len(),
                gdim
            )));
        }
        let coordinate_element = FiniteElement::lagrange(cell_type, degree)?;
        let nodes_per_cell = coordinate_element.space_dimension();
        if cell_nodes.len() % nodes_per_cell != 0 {
            return Err(FunctionError::DimensionMismatch(format!(
                "cell node list of length {} is not a multiple of {} nodes per cell",
                cell_nodes.len(),
                nodes_per_cell
            )));
        }
        let num_nodes = coordinates.len() / gdim;
        if let Some(&node) = cell_nodes.iter().find(|&&node| node >= num_nodes) {
            return Err(FunctionError::DimensionMismatch(format!(
                "cell references node {} but the mesh has {} nodes",
                node, num_nodes
            )));
        }

        let topology = Topology::from_cell_nodes(cell_type, &cell_nodes, nodes_per_cell);
        let mut mesh = Self {
            cell_type,
            gdim,
            coordinate_element,
            coordinates,
            cell_nodes,
            topology,
            affine_maps: None,
            bounding_box_tree: OnceLock::new(),
            pullback_settings: PullbackSettings::default(),
        };
        if cell_type.is_simplex() && degree == 1 {
            mesh.affine_maps = Some((0..mesh.num_cells()).map(|c| mesh.compute_affine_map(c)).collect());
        }
        Ok(mesh)
    }

    pub fn with_pullback_settings(mut self, settings: PullbackSettings) -> Self {
        self.pullback_settings = settings;
        self
    }

    pub fn pullback_settings(&self) -> &PullbackSettings {
        &self.pullback_settings
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn geometric_dimension(&self) -> usize {
        self.gdim
    }

    pub fn topological_dimension(&self) -> usize {
        self.cell_type.topological_dimension()
    }

    /// Whether the cells are embedded in a space of higher dimension.
    pub fn is_manifold(&self) -> bool {
        self.gdim > self.topological_dimension()
    }

    /// Whether every cell map is affine, in which case pullbacks are computed directly.
    pub fn is_affine(&self) -> bool {
        self.affine_maps.is_some()
    }

    pub fn coordinate_element(&self) -> &FiniteElement {
        &self.coordinate_element
    }

    pub fn degree(&self) -> usize {
        self.coordinate_element
            .basis()
            .map(|basis| basis.degree())
            .unwrap_or(1)
    }

    pub fn num_cells(&self) -> usize {
        self.topology.num_cells()
    }

    pub fn num_nodes(&self) -> usize {
        self.coordinates.len() / self.gdim
    }

    pub fn nodes_per_cell(&self) -> usize {
        self.coordinate_element.space_dimension()
    }

    /// Flat node coordinates, `gdim` values per node.
    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    /// Coordinates of a node, padded with zeros to three components.
    pub fn node(&self, index: usize) -> [f64; 3] {
        let mut x = [0.0; 3];
        x[..self.gdim].copy_from_slice(&self.coordinates[index * self.gdim..(index + 1) * self.gdim]);
        x
    }

    pub fn cell_nodes(&self, cell: usize) -> &[usize] {
        let n = self.nodes_per_cell();
        &self.cell_nodes[cell * n..(cell + 1) * n]
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Copies the node coordinates of a cell into `geometry`, `gdim` values per node.
    pub fn populate_cell_geometry(&self, cell: usize, geometry: &mut [f64]) {
        let gdim = self.gdim;
        for (i, &node) in self.cell_nodes(cell).iter().enumerate() {
            geometry[i * gdim..(i + 1) * gdim].copy_from_slice(&self.coordinates[node * gdim..(node + 1) * gdim]);
        }
    }

    /// Maps the reference point `xi` on `cell` to physical coordinates (padded to three).
    pub fn push_forward_point(&self, cell: usize, xi: &[f64]) -> [f64; 3] {
        let tdim = self.topological_dimension();
        let mut x = [0.0; 3];
        if let Some(affine) = self.affine_map(cell) {
            x = affine.origin;
            for a in 0..self.gdim {
                for d in 0..tdim {
                    x[a] += affine.jacobian.j[(a, d)] * xi[d];
                }
            }
            return x;
        }

        let mut basis = vec![0.0; self.nodes_per_cell()];
        self.coordinate_element.populate_basis(&mut basis, &xi[..tdim]);
        for (&node, phi) in self.cell_nodes(cell).iter().zip(&basis) {
            for a in 0..self.gdim {
                x[a] += phi * self.coordinates[node * self.gdim + a];
            }
        }
        x
    }

    /// The `gdim x tdim` Jacobian of the cell map at `xi`.
    pub fn jacobian_matrix(&self, cell: usize, xi: &[f64]) -> DMatrix<f64> {
        if let Some(affine) = self.affine_map(cell) {
            return affine.jacobian.j.clone();
        }
        let tdim = self.topological_dimension();
        let mut gradients = vec![0.0; self.nodes_per_cell() * tdim];
        self.coordinate_element
            .populate_basis_gradients(&mut gradients, &xi[..tdim]);
        let mut j = DMatrix::zeros(self.gdim, tdim);
        for (n, &node) in self.cell_nodes(cell).iter().enumerate() {
            for a in 0..self.gdim {
                for d in 0..tdim {
                    j[(a, d)] += self.coordinates[node * self.gdim + a] * gradients[n * tdim + d];
                }
            }
        }
        j
    }

    /// Jacobian, (pseudo-)inverse and determinant of the cell map at `xi`.
    pub fn jacobian(&self, cell: usize, xi: &[f64]) -> CellJacobian {
        match self.affine_map(cell) {
            Some(affine) => affine.jacobian.clone(),
            None => CellJacobian::from_jacobian(self.jacobian_matrix(cell, xi)),
        }
    }

    /// The largest distance between two geometry nodes of the cell.
    pub fn cell_diameter(&self, cell: usize) -> f64 {
        let nodes = self.cell_nodes(cell);
        let mut diameter2: f64 = 0.0;
        for (i, &a) in nodes.iter().enumerate() {
            for &b in &nodes[i + 1..] {
                let (xa, xb) = (self.node(a), self.node(b));
                let d2 = (0..3).map(|k| (xa[k] - xb[k]).powi(2)).sum::<f64>();
                diameter2 = diameter2.max(d2);
            }
        }
        diameter2.sqrt()
    }

    /// Spatial index over the cells, built on first use.
    pub fn bounding_box_tree(&self) -> &BoundingBoxTree {
        self.bounding_box_tree
            .get_or_init(|| BoundingBoxTree::from_mesh(self))
    }

    fn affine_map(&self, cell: usize) -> Option<&AffineCellMap> {
        self.affine_maps.as_ref().map(|maps| &maps[cell])
    }

    fn compute_affine_map(&self, cell: usize) -> AffineCellMap {
        let tdim = self.topological_dimension();
        let nodes = self.cell_nodes(cell);
        let origin = self.node(nodes[0]);
        let j = DMatrix::from_fn(self.gdim, tdim, |a, d| self.node(nodes[d + 1])[a] - origin[a]);
        let jacobian = CellJacobian::from_jacobian(j);
        if jacobian.det_j == 0.0 {
            warn!("Cell {} is degenerate", cell);
        }
        AffineCellMap { origin, jacobian }
    }
}
