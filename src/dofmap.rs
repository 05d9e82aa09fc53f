//! Degree-of-freedom maps.
use crate::element::{ElementLayout, FiniteElement};
use crate::error::{FunctionError, Result};
use crate::mesh::Topology;
use std::ops::Range;
use std::sync::Arc;

/// Layout of a local coefficient array: `size_local` owned entries followed by ghosts.
///
/// Ghosts are entries owned by another process, identified by their global index and owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMap {
    local_range: Range<usize>,
    ghosts: Vec<usize>,
    ghost_owners: Vec<i32>,
}

impl IndexMap {
    /// Index map owning all indices `0..size_local`, without ghosts.
    pub fn new(size_local: usize) -> Self {
        Self {
            local_range: 0..size_local,
            ghosts: Vec::new(),
            ghost_owners: Vec::new(),
        }
    }

    pub fn with_ghosts(local_range: Range<usize>, ghosts: Vec<usize>, ghost_owners: Vec<i32>) -> Result<Self> {
        if ghosts.len() != ghost_owners.len() {
            return Err(FunctionError::DimensionMismatch(format!(
                "{} ghosts but {} ghost owners",
                ghosts.len(),
                ghost_owners.len()
            )));
        }
        if let Some(ghost) = ghosts.iter().find(|ghost| local_range.contains(ghost)) {
            return Err(FunctionError::DimensionMismatch(format!(
                "ghost index {} lies in the owned range {:?}",
                ghost, local_range
            )));
        }
        Ok(Self {
            local_range,
            ghosts,
            ghost_owners,
        })
    }

    pub fn size_local(&self) -> usize {
        self.local_range.len()
    }

    pub fn num_ghosts(&self) -> usize {
        self.ghosts.len()
    }

    /// Global indices owned by this process.
    pub fn local_range(&self) -> Range<usize> {
        self.local_range.clone()
    }

    /// Global indices of the ghost entries, in local order.
    pub fn ghosts(&self) -> &[usize] {
        &self.ghosts
    }

    pub fn ghost_owners(&self) -> &[i32] {
        &self.ghost_owners
    }
}

/// Map from cells to the local indices of their dofs.
///
/// Dof indices address a local coefficient array laid out by the [`IndexMap`]. A dofmap
/// obtained from [`sub`](Self::sub) keeps addressing the parent's array.
#[derive(Debug, Clone)]
pub struct DofMap {
    element: Arc<FiniteElement>,
    index_map: Arc<IndexMap>,
    cell_dofs: Vec<usize>,
    /// Per-dof orientation signs, present if any dof depends on edge orientation.
    cell_signs: Option<Vec<i8>>,
    num_cells: usize,
}

struct NumberedDofs {
    cell_dofs: Vec<usize>,
    cell_signs: Option<Vec<i8>>,
    num_dofs: usize,
}

fn number_dofs(topology: &Topology, element: &FiniteElement) -> Result<NumberedDofs> {
    let num_cells = topology.num_cells();
    match element.layout() {
        ElementLayout::Leaf(basis) => {
            let layout = basis.entity_dofs();
            if layout.per_edge > 1 {
                return Err(FunctionError::UnsupportedElement(
                    "elements with more than one dof per edge are not supported".to_string(),
                ));
            }
            let cell_type = topology.cell_type();
            let vertex_offset = 0;
            let edge_offset = vertex_offset + layout.per_vertex * topology.num_vertices();
            let cell_offset = edge_offset + layout.per_edge * topology.num_edges();
            let num_dofs = cell_offset + layout.per_cell * num_cells;
            let oriented = basis.has_oriented_edge_dofs();

            let mut cell_dofs = Vec::with_capacity(num_cells * element.space_dimension());
            let mut cell_signs = Vec::new();
            for cell in 0..num_cells {
                let vertices = topology.cell_vertices(cell);
                for &v in vertices {
                    cell_dofs.extend((0..layout.per_vertex).map(|k| vertex_offset + v * layout.per_vertex + k));
                }
                if oriented {
                    cell_signs.extend(std::iter::repeat(1).take(layout.per_vertex * vertices.len()));
                }
                for (local_edge, &e) in topology.cell_edges(cell).iter().enumerate() {
                    cell_dofs.extend((0..layout.per_edge).map(|k| edge_offset + e * layout.per_edge + k));
                    if oriented {
                        // Positive if the local edge runs from the lower to the higher vertex
                        let [a, b] = cell_type.edges()[local_edge];
                        let sign = if vertices[a] < vertices[b] { 1 } else { -1 };
                        cell_signs.extend(std::iter::repeat(sign).take(layout.per_edge));
                    }
                }
                cell_dofs.extend((0..layout.per_cell).map(|k| cell_offset + cell * layout.per_cell + k));
                if oriented {
                    cell_signs.extend(std::iter::repeat(1).take(layout.per_cell));
                }
            }
            let cell_signs = oriented.then_some(cell_signs);

            Ok(NumberedDofs {
                cell_dofs,
                cell_signs,
                num_dofs,
            })
        }
        ElementLayout::Blocked(sub, block_size) => {
            let scalar = number_dofs(topology, sub)?;
            let cell_dofs = scalar
                .cell_dofs
                .iter()
                .flat_map(|&node| (0..block_size).map(move |k| node * block_size + k))
                .collect();
            let cell_signs = scalar.cell_signs.map(|signs| {
                signs
                    .iter()
                    .flat_map(|&s| std::iter::repeat(s).take(block_size))
                    .collect()
            });
            Ok(NumberedDofs {
                cell_dofs,
                cell_signs,
                num_dofs: scalar.num_dofs * block_size,
            })
        }
        ElementLayout::Mixed(subs) => {
            let numbered: Vec<NumberedDofs> = subs
                .iter()
                .map(|sub| number_dofs(topology, sub))
                .collect::<Result<_>>()?;
            let any_signs = numbered.iter().any(|n| n.cell_signs.is_some());
            let mut cell_dofs = Vec::with_capacity(num_cells * element.space_dimension());
            let mut cell_signs = Vec::new();
            for cell in 0..num_cells {
                let mut offset = 0;
                for (sub, n) in subs.iter().zip(&numbered) {
                    let dim = sub.space_dimension();
                    let range = cell * dim..(cell + 1) * dim;
                    cell_dofs.extend(n.cell_dofs[range.clone()].iter().map(|dof| dof + offset));
                    if any_signs {
                        match &n.cell_signs {
                            Some(signs) => cell_signs.extend_from_slice(&signs[range]),
                            None => cell_signs.extend(std::iter::repeat(1).take(dim)),
                        }
                    }
                    offset += n.num_dofs;
                }
            }
            Ok(NumberedDofs {
                cell_dofs,
                cell_signs: any_signs.then_some(cell_signs),
                num_dofs: numbered.iter().map(|n| n.num_dofs).sum(),
            })
        }
    }
}

impl DofMap {
    /// Numbers the dofs of `element` on the mesh entities described by `topology`.
    ///
    /// Dofs are numbered by entity: vertex dofs first, then edge dofs and finally cell
    /// interior dofs. Blocked elements interleave components, so that component `k` of
    /// scalar dof `n` becomes dof `block_size * n + k`. Sub-elements of a mixed element are
    /// numbered one after the other.
    pub fn build(topology: &Topology, element: Arc<FiniteElement>) -> Result<Self> {
        if topology.cell_type() != element.cell_type() {
            return Err(FunctionError::UnsupportedElement(format!(
                "{:?} element on a mesh of {:?} cells",
                element.cell_type(),
                topology.cell_type()
            )));
        }
        let numbered = number_dofs(topology, &element)?;
        Ok(Self {
            index_map: Arc::new(IndexMap::new(numbered.num_dofs)),
            cell_dofs: numbered.cell_dofs,
            cell_signs: numbered.cell_signs,
            num_cells: topology.num_cells(),
            element,
        })
    }

    /// Assembles a dofmap from explicit data, e.g. from a distributed numbering.
    pub fn from_cell_dofs(
        element: Arc<FiniteElement>,
        index_map: Arc<IndexMap>,
        cell_dofs: Vec<usize>,
        cell_signs: Option<Vec<i8>>,
    ) -> Result<Self> {
        let dim = element.space_dimension();
        if dim == 0 || cell_dofs.len() % dim != 0 {
            return Err(FunctionError::DimensionMismatch(format!(
                "{} cell dofs do not match {} dofs per cell",
                cell_dofs.len(),
                dim
            )));
        }
        if let Some(signs) = &cell_signs {
            if signs.len() != cell_dofs.len() {
                return Err(FunctionError::DimensionMismatch(format!(
                    "{} dof signs for {} cell dofs",
                    signs.len(),
                    cell_dofs.len()
                )));
            }
        }
        let len = index_map.size_local() + index_map.num_ghosts();
        if let Some(dof) = cell_dofs.iter().find(|&&dof| dof >= len) {
            return Err(FunctionError::DimensionMismatch(format!(
                "dof {} is out of bounds for {} local entries",
                dof, len
            )));
        }
        Ok(Self {
            num_cells: cell_dofs.len() / dim,
            element,
            index_map,
            cell_dofs,
            cell_signs,
        })
    }

    pub fn element(&self) -> &Arc<FiniteElement> {
        &self.element
    }

    pub fn index_map(&self) -> &Arc<IndexMap> {
        &self.index_map
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    /// The number of dofs per cell.
    pub fn cell_dimension(&self) -> usize {
        self.element.space_dimension()
    }

    /// Dof indices of `cell`, ordered by element-local dof index.
    pub fn cell_dofs(&self, cell: usize) -> &[usize] {
        let dim = self.cell_dimension();
        &self.cell_dofs[cell * dim..(cell + 1) * dim]
    }

    /// Orientation signs of the dofs of `cell`, if the element has oriented dofs.
    ///
    /// The global basis function of local dof `i` is `sign[i]` times the reference basis
    /// function pushed forward.
    pub fn cell_signs(&self, cell: usize) -> Option<&[i8]> {
        let dim = self.cell_dimension();
        self.cell_signs
            .as_ref()
            .map(|signs| &signs[cell * dim..(cell + 1) * dim])
    }

    pub fn num_sub_dofmaps(&self) -> usize {
        self.element.num_sub_elements()
    }

    /// Restriction to sub-element `i`. The result addresses the same coefficient array.
    pub fn sub(&self, i: usize) -> Result<DofMap> {
        let sub_element = Arc::clone(self.element.sub_element(i)?);
        let local = self.element.sub_dof_indices(i)?;
        let cell_dofs = (0..self.num_cells)
            .flat_map(|cell| {
                let dofs = self.cell_dofs(cell);
                local.iter().map(move |&l| dofs[l])
            })
            .collect();
        let cell_signs = self.cell_signs.as_ref().map(|_| {
            (0..self.num_cells)
                .flat_map(|cell| {
                    let signs = self.cell_signs(cell).unwrap_or_default();
                    local.iter().map(move |&l| signs[l])
                })
                .collect()
        });
        Ok(Self {
            element: sub_element,
            index_map: Arc::clone(&self.index_map),
            cell_dofs,
            cell_signs,
            num_cells: self.num_cells,
        })
    }

    /// Builds a contiguous dofmap over the dofs referenced by this dofmap.
    ///
    /// Returns the new dofmap and a permutation `p` such that new dof `k` corresponds to dof
    /// `p[k]` of this dofmap. Owned dofs are numbered before ghosts, each in order of first
    /// appearance when traversing cells.
    pub fn collapse(&self) -> (DofMap, Vec<usize>) {
        const UNASSIGNED: usize = usize::MAX;
        let size_local = self.index_map.size_local();
        let len = size_local + self.index_map.num_ghosts();
        let mut new_index = vec![UNASSIGNED; len];
        let mut permutation = Vec::new();

        for owned in [true, false] {
            for &dof in &self.cell_dofs {
                if (dof < size_local) == owned && new_index[dof] == UNASSIGNED {
                    new_index[dof] = permutation.len();
                    permutation.push(dof);
                }
            }
        }

        let num_owned = permutation.iter().filter(|&&dof| dof < size_local).count();
        let (ghosts, ghost_owners) = permutation[num_owned..]
            .iter()
            .map(|&dof| {
                let g = dof - size_local;
                (self.index_map.ghosts[g], self.index_map.ghost_owners[g])
            })
            .unzip();
        let start = self.index_map.local_range.start;
        let index_map = IndexMap {
            local_range: start..start + num_owned,
            ghosts,
            ghost_owners,
        };

        let dofmap = DofMap {
            element: Arc::clone(&self.element),
            index_map: Arc::new(index_map),
            cell_dofs: self.cell_dofs.iter().map(|&dof| new_index[dof]).collect(),
            cell_signs: self.cell_signs.clone(),
            num_cells: self.num_cells,
        };
        (dofmap, permutation)
    }
}
