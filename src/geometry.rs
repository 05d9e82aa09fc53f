//! Spatial queries on meshes.
use crate::mesh::Mesh;
use rayon::prelude::*;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned bounding box in three dimensions.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisAlignedBoundingBox {
    min: [f64; 3],
    max: [f64; 3],
}

impl AxisAlignedBoundingBox {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [f64; 3]>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        Some(points.fold(Self::new(first, first), |mut aabb, p| {
            for k in 0..3 {
                aabb.min[k] = aabb.min[k].min(p[k]);
                aabb.max[k] = aabb.max[k].max(p[k]);
            }
            aabb
        }))
    }

    pub fn min(&self) -> &[f64; 3] {
        &self.min
    }

    pub fn max(&self) -> &[f64; 3] {
        &self.max
    }

    pub fn extents(&self) -> [f64; 3] {
        [0, 1, 2].map(|k| self.max[k] - self.min[k])
    }

    pub fn max_extent(&self) -> f64 {
        self.extents().into_iter().fold(0.0, f64::max)
    }

    pub fn contains_point(&self, point: &[f64; 3]) -> bool {
        (0..3).all(|k| self.min[k] <= point[k] && point[k] <= self.max[k])
    }

    /// Grows the box by `margin` in every direction.
    pub fn padded(&self, margin: f64) -> Self {
        Self {
            min: self.min.map(|x| x - margin),
            max: self.max.map(|x| x + margin),
        }
    }
}

type IndexedBox = GeomWithData<Rectangle<[f64; 3]>, usize>;

/// R-tree over the bounding boxes of the cells of a mesh.
pub struct BoundingBoxTree {
    tree: RTree<IndexedBox>,
    num_cells: usize,
}

impl fmt::Debug for BoundingBoxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundingBoxTree")
            .field("num_cells", &self.num_cells)
            .finish()
    }
}

impl BoundingBoxTree {
    pub fn from_bounding_boxes(boxes: &[AxisAlignedBoundingBox]) -> Self {
        let geometries = boxes
            .iter()
            .enumerate()
            .map(|(i, aabb)| GeomWithData::new(Rectangle::from_corners(aabb.min, aabb.max), i))
            .collect();
        Self {
            tree: RTree::bulk_load(geometries),
            num_cells: boxes.len(),
        }
    }

    /// Builds the tree from the geometry nodes of each cell.
    ///
    /// Boxes are made slightly larger than necessary, to accommodate floating point errors and
    /// curved cells bulging out of the hull of their nodes.
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let boxes: Vec<_> = (0..mesh.num_cells())
            .map(|cell| {
                let nodes: Vec<[f64; 3]> = mesh
                    .cell_nodes(cell)
                    .iter()
                    .map(|&node| mesh.node(node))
                    .collect();
                let aabb = AxisAlignedBoundingBox::from_points(&nodes)
                    .expect("Cells always have nodes");
                aabb.padded(0.01 * aabb.max_extent() + 1e-12)
            })
            .collect();
        Self::from_bounding_boxes(&boxes)
    }

    pub fn num_boxes(&self) -> usize {
        self.num_cells
    }

    /// Indices of all cells whose bounding box contains `point`, in ascending order.
    pub fn compute_collisions(&self, point: &[f64; 3]) -> Vec<usize> {
        let mut candidates: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&AABB::from_point(*point))
            .map(|geom| geom.data)
            .collect();
        candidates.sort_unstable();
        candidates
    }
}

/// Finds the cell containing `point` and the reference coordinates of the point on it.
///
/// Candidate cells from the bounding box tree are tried in ascending order, and the first
/// whose pullback lies in the reference cell (up to the mesh's containment tolerance) is
/// accepted. Returns `None` if no cell accepts the point.
pub fn locate_point(mesh: &Mesh, point: &[f64; 3]) -> Option<(usize, [f64; 3])> {
    let tolerance = mesh.pullback_settings().containment_tolerance;
    let cell_type = mesh.cell_type();
    mesh.bounding_box_tree()
        .compute_collisions(point)
        .into_iter()
        .find_map(|cell| {
            mesh.pull_back(cell, point)
                .filter(|xi| cell_type.contains_reference_point(xi, tolerance))
                .map(|xi| (cell, xi))
        })
}

/// Locates every point with [`locate_point`], in parallel.
pub fn locate_points(mesh: &Mesh, points: &[[f64; 3]]) -> Vec<Option<(usize, [f64; 3])>> {
    // Initialize the tree outside of the parallel loop
    mesh.bounding_box_tree();
    points
        .par_iter()
        .map(|point| locate_point(mesh, point))
        .collect()
}
