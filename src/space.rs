//! Finite element spaces.
use crate::dofmap::DofMap;
use crate::element::{FiniteElement, MapType};
use crate::error::{FunctionError, Result};
use crate::mesh::Mesh;
use nalgebra::DMatrix;
use std::sync::Arc;

/// A mesh, an element and a dofmap that together span a discrete function space.
///
/// Spaces are immutable and shared behind `Arc`. Two spaces are equal if and only if their
/// mesh, element and dofmap handles are identical. Sub-spaces are created along with the
/// space, so repeated calls to [`sub`](Self::sub) return equal spaces.
#[derive(Debug)]
pub struct FunctionSpace {
    mesh: Arc<Mesh>,
    element: Arc<FiniteElement>,
    dofmap: Arc<DofMap>,
    component: Vec<usize>,
    sub_spaces: Vec<Arc<FunctionSpace>>,
}

impl PartialEq for FunctionSpace {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.mesh, &other.mesh)
            && Arc::ptr_eq(&self.element, &other.element)
            && Arc::ptr_eq(&self.dofmap, &other.dofmap)
    }
}

impl FunctionSpace {
    /// Creates the space of `element` on `mesh`, numbering dofs from the mesh topology.
    pub fn new(mesh: Arc<Mesh>, element: FiniteElement) -> Result<Arc<Self>> {
        let element = Arc::new(element);
        let dofmap = DofMap::build(mesh.topology(), Arc::clone(&element))?;
        Self::from_dofmap(mesh, Arc::new(dofmap))
    }

    /// Creates a space from an existing dofmap, e.g. one with a distributed numbering.
    pub fn from_dofmap(mesh: Arc<Mesh>, dofmap: Arc<DofMap>) -> Result<Arc<Self>> {
        let element = Arc::clone(dofmap.element());
        if element.cell_type() != mesh.cell_type() {
            return Err(FunctionError::UnsupportedElement(format!(
                "{:?} element on a mesh of {:?} cells",
                element.cell_type(),
                mesh.cell_type()
            )));
        }
        if dofmap.num_cells() != mesh.num_cells() {
            return Err(FunctionError::DimensionMismatch(format!(
                "dofmap has {} cells, mesh has {}",
                dofmap.num_cells(),
                mesh.num_cells()
            )));
        }
        let piola = element
            .map_blocks()
            .iter()
            .any(|block| block.map_type != MapType::Identity);
        if piola && mesh.is_manifold() {
            return Err(FunctionError::UnsupportedElement(
                "Piola-mapped elements on manifold meshes are not supported".to_string(),
            ));
        }
        Self::assemble(mesh, element, dofmap, Vec::new())
    }

    fn assemble(
        mesh: Arc<Mesh>,
        element: Arc<FiniteElement>,
        dofmap: Arc<DofMap>,
        component: Vec<usize>,
    ) -> Result<Arc<Self>> {
        let sub_spaces = (0..dofmap.num_sub_dofmaps())
            .map(|i| {
                let sub_dofmap = Arc::new(dofmap.sub(i)?);
                let sub_element = Arc::clone(sub_dofmap.element());
                let mut sub_component = component.clone();
                sub_component.push(i);
                Self::assemble(Arc::clone(&mesh), sub_element, sub_dofmap, sub_component)
            })
            .collect::<Result<_>>()?;
        Ok(Arc::new(Self {
            mesh,
            element,
            dofmap,
            component,
            sub_spaces,
        }))
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn element(&self) -> &Arc<FiniteElement> {
        &self.element
    }

    pub fn dofmap(&self) -> &Arc<DofMap> {
        &self.dofmap
    }

    /// The path of sub-space indices leading from the root space to this space.
    pub fn component(&self) -> &[usize] {
        &self.component
    }

    pub fn is_sub_space(&self) -> bool {
        !self.component.is_empty()
    }

    pub fn num_sub_spaces(&self) -> usize {
        self.sub_spaces.len()
    }

    pub fn sub(&self, i: usize) -> Result<Arc<FunctionSpace>> {
        self.sub_spaces
            .get(i)
            .cloned()
            .ok_or(FunctionError::InvalidComponent {
                component: i,
                num_sub_spaces: self.sub_spaces.len(),
            })
    }

    /// A standalone space with contiguous dof numbering, and the map from its dofs to the dofs
    /// of this space.
    pub fn collapse(&self) -> Result<(Arc<FunctionSpace>, Vec<usize>)> {
        let (dofmap, permutation) = self.dofmap.collapse();
        let space = Self::assemble(
            Arc::clone(&self.mesh),
            Arc::clone(&self.element),
            Arc::new(dofmap),
            Vec::new(),
        )?;
        Ok((space, permutation))
    }

    /// Reference interpolation points of the element, `num_points x tdim`.
    pub fn interpolation_points(&self) -> &DMatrix<f64> {
        self.element.interpolation_points()
    }

    /// Physical coordinates of the interpolation points of every cell, as a `3 x (num_cells *
    /// num_points)` matrix. Column `cell * num_points + p` holds point `p` of `cell`.
    pub fn interpolation_coordinates(&self) -> DMatrix<f64> {
        let points = self.element.interpolation_points();
        let (num_points, tdim) = points.shape();
        let num_cells = self.mesh.num_cells();
        let mut coordinates = DMatrix::zeros(3, num_cells * num_points);
        let mut xi = vec![0.0; tdim];
        for cell in 0..num_cells {
            for p in 0..num_points {
                for d in 0..tdim {
                    xi[d] = points[(p, d)];
                }
                let x = self.mesh.push_forward_point(cell, &xi);
                coordinates
                    .column_mut(cell * num_points + p)
                    .copy_from_slice(&x);
            }
        }
        coordinates
    }

    /// The number of local coefficients, owned and ghost.
    pub fn num_local_dofs(&self) -> usize {
        let index_map = self.dofmap.index_map();
        index_map.size_local() + index_map.num_ghosts()
    }
}
