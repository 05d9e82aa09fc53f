use crate::cell::CellType;
use rustc_hash::FxHashMap;

/// Vertex and edge numbering of a mesh.
///
/// Vertices are the corner nodes of the cells, numbered in ascending order of their geometry
/// node index. Edges are numbered in order of first appearance when traversing cells in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    cell_type: CellType,
    num_cells: usize,
    cell_vertices: Vec<usize>,
    cell_edges: Vec<usize>,
    vertex_nodes: Vec<usize>,
    edge_vertices: Vec<[usize; 2]>,
}

impl Topology {
    /// Builds the topology from the geometry nodes of each cell, stored contiguously with
    /// `nodes_per_cell` entries per cell. The first `num_vertices` nodes of a cell are its
    /// corners.
    pub fn from_cell_nodes(cell_type: CellType, cell_nodes: &[usize], nodes_per_cell: usize) -> Self {
        let nv = cell_type.num_vertices();
        assert!(nodes_per_cell >= nv);
        let num_cells = if nodes_per_cell == 0 { 0 } else { cell_nodes.len() / nodes_per_cell };

        let mut vertex_nodes: Vec<usize> = cell_nodes
            .chunks_exact(nodes_per_cell)
            .flat_map(|nodes| nodes[..nv].iter().copied())
            .collect();
        vertex_nodes.sort_unstable();
        vertex_nodes.dedup();
        let node_to_vertex: FxHashMap<usize, usize> = vertex_nodes
            .iter()
            .enumerate()
            .map(|(vertex, &node)| (node, vertex))
            .collect();

        let cell_vertices: Vec<usize> = cell_nodes
            .chunks_exact(nodes_per_cell)
            .flat_map(|nodes| nodes[..nv].iter().map(|node| node_to_vertex[node]))
            .collect();

        let local_edges = cell_type.edges();
        let mut edge_lookup = FxHashMap::default();
        let mut edge_vertices = Vec::new();
        let mut cell_edges = Vec::with_capacity(num_cells * local_edges.len());
        for vertices in cell_vertices.chunks_exact(nv) {
            for &[a, b] in local_edges {
                let (va, vb) = (vertices[a], vertices[b]);
                let key = [va.min(vb), va.max(vb)];
                let edge = *edge_lookup.entry(key).or_insert_with(|| {
                    edge_vertices.push(key);
                    edge_vertices.len() - 1
                });
                cell_edges.push(edge);
            }
        }

        Self {
            cell_type,
            num_cells,
            cell_vertices,
            cell_edges,
            vertex_nodes,
            edge_vertices,
        }
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    pub fn num_vertices(&self) -> usize {
        self.vertex_nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_vertices.len()
    }

    pub fn cell_vertices(&self, cell: usize) -> &[usize] {
        let nv = self.cell_type.num_vertices();
        &self.cell_vertices[cell * nv..(cell + 1) * nv]
    }

    pub fn cell_edges(&self, cell: usize) -> &[usize] {
        let ne = self.cell_type.num_edges();
        &self.cell_edges[cell * ne..(cell + 1) * ne]
    }

    /// The geometry node of each vertex.
    pub fn vertex_nodes(&self) -> &[usize] {
        &self.vertex_nodes
    }

    /// The vertices of each edge, lowest index first.
    pub fn edge_vertices(&self) -> &[[usize; 2]] {
        &self.edge_vertices
    }
}
