//! Finite elements on reference cells.
//!
//! A [`FiniteElement`] is either a single family on a reference cell (a *leaf*, described by a
//! [`ReferenceBasis`]), a *blocked* element that repeats a scalar leaf for each component of
//! a vector or tensor value, or a *mixed* element that concatenates several elements.
//!
//! Basis values are laid out basis-major: entry `i * value_size + c` holds component `c` of
//! basis function `i`. Gradients append the reference direction as the fastest index.
use crate::cell::CellType;
use crate::error::{FunctionError, Result};
use fenris_traits::FieldScalar;
use nalgebra::DMatrix;
use std::fmt::Debug;
use std::sync::Arc;

mod lagrange;
mod map;
mod vector;

pub use lagrange::LagrangeBasis;
pub use map::{MapBlock, MapType};
pub use vector::{Nedelec, RaviartThomas};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ElementFamily {
    Lagrange,
    DiscontinuousLagrange,
    RaviartThomas,
    Nedelec,
}

impl ElementFamily {
    pub fn is_lagrange(&self) -> bool {
        matches!(self, ElementFamily::Lagrange | ElementFamily::DiscontinuousLagrange)
    }
}

/// Number of dofs attached to each vertex, each edge and the interior of a cell.
///
/// Local dofs are numbered in that order: all vertex dofs by local vertex, then edge dofs by
/// local edge, then interior dofs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EntityDofLayout {
    pub per_vertex: usize,
    pub per_edge: usize,
    pub per_cell: usize,
}

/// A basis on a reference cell.
pub trait ReferenceBasis: Debug + Send + Sync {
    fn cell_type(&self) -> CellType;

    fn family(&self) -> ElementFamily;

    fn degree(&self) -> usize;

    fn num_basis(&self) -> usize;

    fn reference_value_size(&self) -> usize;

    fn map_type(&self) -> MapType;

    fn entity_dofs(&self) -> EntityDofLayout;

    /// Whether the sign of edge dofs depends on the orientation of the edge.
    fn has_oriented_edge_dofs(&self) -> bool {
        false
    }

    /// Evaluates all basis functions at the reference point `xi`.
    ///
    /// # Panics
    /// Panics if `basis_values` does not have length `num_basis * reference_value_size`.
    fn populate_basis(&self, basis_values: &mut [f64], xi: &[f64]);

    /// Evaluates the reference gradients of all basis functions at `xi`.
    ///
    /// # Panics
    /// Panics if `basis_gradients` does not have length `num_basis * reference_value_size * tdim`.
    fn populate_basis_gradients(&self, basis_gradients: &mut [f64], xi: &[f64]);

    /// Reference points at which the dual basis evaluates functions, as a `num_points x tdim`
    /// matrix.
    fn interpolation_points(&self) -> DMatrix<f64>;

    /// Dual basis weights, a `num_basis x (reference_value_size * num_points)` matrix whose
    /// column `c * num_points + p` weighs component `c` at point `p`.
    fn interpolation_matrix(&self) -> DMatrix<f64>;
}

#[derive(Debug)]
enum ElementKind {
    Leaf(Box<dyn ReferenceBasis>),
    Blocked {
        sub: Arc<FiniteElement>,
        block_size: usize,
    },
    Mixed {
        subs: Vec<Arc<FiniteElement>>,
        dof_offsets: Vec<usize>,
        value_offsets: Vec<usize>,
    },
}

/// Basis tables at a set of reference points.
///
/// Table 0 holds basis values and table `1 + d` derivatives along reference direction `d`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tabulation {
    num_points: usize,
    num_basis: usize,
    value_size: usize,
    tables: Vec<Vec<f64>>,
}

impl Tabulation {
    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn num_basis(&self) -> usize {
        self.num_basis
    }

    pub fn value_size(&self) -> usize {
        self.value_size
    }

    /// Component `c` of basis function `i` at point `p` in the given table.
    pub fn value(&self, table: usize, point: usize, basis: usize, component: usize) -> f64 {
        self.tables[table][(point * self.num_basis + basis) * self.value_size + component]
    }

    /// All basis values of one table at one point, basis-major.
    pub fn point_values(&self, table: usize, point: usize) -> &[f64] {
        let stride = self.num_basis * self.value_size;
        &self.tables[table][point * stride..(point + 1) * stride]
    }
}

/// A finite element on a reference cell.
#[derive(Debug)]
pub struct FiniteElement {
    kind: ElementKind,
    cell_type: CellType,
    value_shape: Vec<usize>,
    reference_value_size: usize,
    space_dimension: usize,
    map_blocks: Vec<MapBlock>,
    interpolation_points: DMatrix<f64>,
    interpolation_matrix: DMatrix<f64>,
}

impl FiniteElement {
    pub fn from_basis(basis: Box<dyn ReferenceBasis>) -> Self {
        let cell_type = basis.cell_type();
        let tdim = cell_type.topological_dimension();
        let reference_value_size = basis.reference_value_size();
        let value_shape = match basis.map_type() {
            MapType::Identity if reference_value_size == 1 => vec![],
            MapType::Identity => vec![reference_value_size],
            MapType::ContravariantPiola | MapType::CovariantPiola => vec![tdim],
            MapType::DoubleContravariantPiola => vec![tdim, tdim],
        };
        let map_type = basis.map_type();
        let block = map_type.block_size(tdim);
        let map_blocks = (0..reference_value_size / block)
            .map(|b| MapBlock {
                map_type,
                offset: b * block,
                size: block,
            })
            .collect();

        Self {
            cell_type,
            value_shape,
            reference_value_size,
            space_dimension: basis.num_basis(),
            map_blocks,
            interpolation_points: basis.interpolation_points(),
            interpolation_matrix: basis.interpolation_matrix(),
            kind: ElementKind::Leaf(basis),
        }
    }

    pub fn lagrange(cell_type: CellType, degree: usize) -> Result<Self> {
        Ok(Self::from_basis(Box::new(LagrangeBasis::new(cell_type, degree, false)?)))
    }

    pub fn discontinuous_lagrange(cell_type: CellType, degree: usize) -> Result<Self> {
        Ok(Self::from_basis(Box::new(LagrangeBasis::new(cell_type, degree, true)?)))
    }

    pub fn raviart_thomas(cell_type: CellType) -> Result<Self> {
        Ok(Self::from_basis(Box::new(RaviartThomas::new(cell_type)?)))
    }

    pub fn nedelec(cell_type: CellType) -> Result<Self> {
        Ok(Self::from_basis(Box::new(Nedelec::new(cell_type)?)))
    }

    /// Vector-valued element with `num_components` copies of a scalar element.
    pub fn vector(sub: FiniteElement, num_components: usize) -> Result<Self> {
        Self::blocked(sub, vec![num_components])
    }

    /// Repeats the scalar element `sub` for every component of a value of the given shape.
    ///
    /// Local dofs are interleaved: dof `n * block_size + k` is component `k` of node `n`.
    pub fn blocked(sub: FiniteElement, value_shape: Vec<usize>) -> Result<Self> {
        if !matches!(sub.kind, ElementKind::Leaf(_)) || sub.reference_value_size != 1 {
            return Err(FunctionError::UnsupportedElement(
                "blocked elements must be built from a scalar element".to_string(),
            ));
        }
        let block_size: usize = value_shape.iter().product();
        if block_size == 0 {
            return Err(FunctionError::DimensionMismatch(
                "blocked element value shape must have positive extents".to_string(),
            ));
        }

        let num_points = sub.num_interpolation_points();
        let mut interpolation_matrix = DMatrix::zeros(sub.space_dimension * block_size, block_size * num_points);
        for n in 0..sub.space_dimension {
            for k in 0..block_size {
                for p in 0..num_points {
                    interpolation_matrix[(n * block_size + k, k * num_points + p)] = sub.interpolation_matrix[(n, p)];
                }
            }
        }
        let map_blocks = (0..block_size)
            .flat_map(|k| {
                sub.map_blocks.iter().map(move |block| MapBlock {
                    offset: k + block.offset,
                    ..*block
                })
            })
            .collect();

        Ok(Self {
            cell_type: sub.cell_type,
            value_shape,
            reference_value_size: block_size,
            space_dimension: sub.space_dimension * block_size,
            map_blocks,
            interpolation_points: sub.interpolation_points.clone(),
            interpolation_matrix,
            kind: ElementKind::Blocked {
                sub: Arc::new(sub),
                block_size,
            },
        })
    }

    /// Concatenation of elements on a common cell, e.g. a Taylor–Hood pair.
    ///
    /// The value of a mixed element is the flattened concatenation of the sub-element values.
    pub fn mixed(subs: Vec<FiniteElement>) -> Result<Self> {
        let cell_type = match subs.first() {
            Some(first) => first.cell_type,
            None => {
                return Err(FunctionError::UnsupportedElement(
                    "mixed element needs at least one sub-element".to_string(),
                ))
            }
        };
        if subs.iter().any(|sub| sub.cell_type != cell_type) {
            return Err(FunctionError::UnsupportedElement(
                "sub-elements of a mixed element must share the cell type".to_string(),
            ));
        }

        let mut dof_offsets = vec![0];
        let mut value_offsets = vec![0];
        let mut point_offsets = vec![0];
        for sub in &subs {
            dof_offsets.push(dof_offsets.last().unwrap() + sub.space_dimension);
            value_offsets.push(value_offsets.last().unwrap() + sub.reference_value_size);
            point_offsets.push(point_offsets.last().unwrap() + sub.num_interpolation_points());
        }
        let space_dimension = *dof_offsets.last().unwrap();
        let reference_value_size = *value_offsets.last().unwrap();
        let num_points = *point_offsets.last().unwrap();
        let tdim = cell_type.topological_dimension();

        let mut interpolation_points = DMatrix::zeros(num_points, tdim);
        let mut interpolation_matrix = DMatrix::zeros(space_dimension, reference_value_size * num_points);
        let mut map_blocks = Vec::new();
        for (s, sub) in subs.iter().enumerate() {
            let sub_points = sub.num_interpolation_points();
            interpolation_points
                .rows_mut(point_offsets[s], sub_points)
                .copy_from(&sub.interpolation_points);
            for i in 0..sub.space_dimension {
                for c in 0..sub.reference_value_size {
                    for p in 0..sub_points {
                        let column = (value_offsets[s] + c) * num_points + point_offsets[s] + p;
                        interpolation_matrix[(dof_offsets[s] + i, column)] =
                            sub.interpolation_matrix[(i, c * sub_points + p)];
                    }
                }
            }
            map_blocks.extend(sub.map_blocks.iter().map(|block| MapBlock {
                offset: value_offsets[s] + block.offset,
                ..*block
            }));
        }

        Ok(Self {
            cell_type,
            value_shape: vec![reference_value_size],
            reference_value_size,
            space_dimension,
            map_blocks,
            interpolation_points,
            interpolation_matrix,
            kind: ElementKind::Mixed {
                subs: subs.into_iter().map(Arc::new).collect(),
                dof_offsets,
                value_offsets,
            },
        })
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn topological_dimension(&self) -> usize {
        self.cell_type.topological_dimension()
    }

    pub fn value_shape(&self) -> &[usize] {
        &self.value_shape
    }

    pub fn value_rank(&self) -> usize {
        self.value_shape.len()
    }

    pub fn value_size(&self) -> usize {
        self.value_shape.iter().product()
    }

    pub fn reference_value_size(&self) -> usize {
        self.reference_value_size
    }

    /// The number of basis functions on a cell.
    pub fn space_dimension(&self) -> usize {
        self.space_dimension
    }

    pub fn block_size(&self) -> usize {
        match &self.kind {
            ElementKind::Blocked { block_size, .. } => *block_size,
            _ => 1,
        }
    }

    /// The underlying basis, if this is a leaf element.
    pub fn basis(&self) -> Option<&dyn ReferenceBasis> {
        match &self.kind {
            ElementKind::Leaf(basis) => Some(basis.as_ref()),
            _ => None,
        }
    }

    pub fn num_sub_elements(&self) -> usize {
        match &self.kind {
            ElementKind::Leaf(_) => 0,
            ElementKind::Blocked { block_size, .. } => *block_size,
            ElementKind::Mixed { subs, .. } => subs.len(),
        }
    }

    pub fn sub_element(&self, i: usize) -> Result<&Arc<FiniteElement>> {
        let num_sub_spaces = self.num_sub_elements();
        let invalid = FunctionError::InvalidComponent {
            component: i,
            num_sub_spaces,
        };
        match &self.kind {
            ElementKind::Blocked { sub, block_size } if i < *block_size => Ok(sub),
            ElementKind::Mixed { subs, .. } => subs.get(i).ok_or(invalid),
            _ => Err(invalid),
        }
    }

    /// Local dofs of this element that belong to sub-element `i`, in sub-element order.
    pub fn sub_dof_indices(&self, i: usize) -> Result<Vec<usize>> {
        let sub = self.sub_element(i)?;
        match &self.kind {
            ElementKind::Blocked { block_size, .. } => {
                Ok((0..sub.space_dimension).map(|n| n * block_size + i).collect())
            }
            ElementKind::Mixed { dof_offsets, .. } => Ok((dof_offsets[i]..dof_offsets[i + 1]).collect()),
            ElementKind::Leaf(_) => unreachable!("leaf elements have no sub-elements"),
        }
    }

    /// Whether every leaf of the element belongs to a Lagrange family.
    pub fn is_lagrange(&self) -> bool {
        match &self.kind {
            ElementKind::Leaf(basis) => basis.family().is_lagrange(),
            ElementKind::Blocked { sub, .. } => sub.is_lagrange(),
            ElementKind::Mixed { subs, .. } => subs.iter().all(|sub| sub.is_lagrange()),
        }
    }

    pub fn map_blocks(&self) -> &[MapBlock] {
        &self.map_blocks
    }

    /// Whether physical and reference values coincide for this element.
    pub fn has_identity_map(&self) -> bool {
        self.map_blocks.iter().all(|block| block.map_type == MapType::Identity)
    }

    pub fn num_interpolation_points(&self) -> usize {
        self.interpolation_points.nrows()
    }

    /// Reference interpolation points, `num_points x tdim`.
    pub fn interpolation_points(&self) -> &DMatrix<f64> {
        &self.interpolation_points
    }

    /// Dual basis weights, `space_dimension x (reference_value_size * num_points)`, with column
    /// `c * num_points + p` weighing reference component `c` at interpolation point `p`.
    pub fn interpolation_matrix(&self) -> &DMatrix<f64> {
        &self.interpolation_matrix
    }

    /// Applies the element's push-forward to a single reference value.
    pub fn push_forward<T: FieldScalar>(
        &self,
        reference: &[T],
        j: &DMatrix<f64>,
        k: &DMatrix<f64>,
        det_j: f64,
        physical: &mut [T],
    ) {
        for block in &self.map_blocks {
            block.push_forward(reference, j, k, det_j, physical);
        }
    }

    /// Applies the inverse of the push-forward to a single physical value.
    pub fn pull_back<T: FieldScalar>(
        &self,
        physical: &[T],
        j: &DMatrix<f64>,
        k: &DMatrix<f64>,
        det_j: f64,
        reference: &mut [T],
    ) {
        for block in &self.map_blocks {
            block.pull_back(physical, j, k, det_j, reference);
        }
    }

    /// Evaluates all basis functions at `xi`, basis-major.
    pub fn populate_basis(&self, basis_values: &mut [f64], xi: &[f64]) {
        assert_eq!(basis_values.len(), self.space_dimension * self.reference_value_size);
        match &self.kind {
            ElementKind::Leaf(basis) => basis.populate_basis(basis_values, xi),
            ElementKind::Blocked { sub, block_size } => {
                let bs = *block_size;
                let n = sub.space_dimension;
                sub.populate_basis(&mut basis_values[..n], xi);
                // Spread the scalar values out in place, back to front
                for node in (0..n).rev() {
                    let value = basis_values[node];
                    let block = &mut basis_values[node * bs * bs..(node + 1) * bs * bs];
                    block.fill(0.0);
                    for k in 0..bs {
                        block[k * bs + k] = value;
                    }
                }
            }
            ElementKind::Mixed {
                subs,
                dof_offsets,
                value_offsets,
            } => {
                basis_values.fill(0.0);
                let vs = self.reference_value_size;
                for (s, sub) in subs.iter().enumerate() {
                    let sub_vs = sub.reference_value_size;
                    let mut sub_values = vec![0.0; sub.space_dimension * sub_vs];
                    sub.populate_basis(&mut sub_values, xi);
                    for i in 0..sub.space_dimension {
                        for c in 0..sub_vs {
                            basis_values[(dof_offsets[s] + i) * vs + value_offsets[s] + c] = sub_values[i * sub_vs + c];
                        }
                    }
                }
            }
        }
    }

    /// Evaluates reference gradients of all basis functions at `xi`, with layout
    /// `(i * value_size + c) * tdim + d`.
    pub fn populate_basis_gradients(&self, basis_gradients: &mut [f64], xi: &[f64]) {
        let tdim = self.topological_dimension();
        let vs = self.reference_value_size;
        assert_eq!(basis_gradients.len(), self.space_dimension * vs * tdim);
        match &self.kind {
            ElementKind::Leaf(basis) => basis.populate_basis_gradients(basis_gradients, xi),
            ElementKind::Blocked { sub, block_size } => {
                let mut sub_gradients = vec![0.0; sub.space_dimension * tdim];
                sub.populate_basis_gradients(&mut sub_gradients, xi);
                basis_gradients.fill(0.0);
                for node in 0..sub.space_dimension {
                    for k in 0..*block_size {
                        let i = node * block_size + k;
                        for d in 0..tdim {
                            basis_gradients[(i * vs + k) * tdim + d] = sub_gradients[node * tdim + d];
                        }
                    }
                }
            }
            ElementKind::Mixed {
                subs,
                dof_offsets,
                value_offsets,
            } => {
                basis_gradients.fill(0.0);
                for (s, sub) in subs.iter().enumerate() {
                    let sub_vs = sub.reference_value_size;
                    let mut sub_gradients = vec![0.0; sub.space_dimension * sub_vs * tdim];
                    sub.populate_basis_gradients(&mut sub_gradients, xi);
                    for i in 0..sub.space_dimension {
                        for c in 0..sub_vs {
                            for d in 0..tdim {
                                basis_gradients[((dof_offsets[s] + i) * vs + value_offsets[s] + c) * tdim + d] =
                                    sub_gradients[(i * sub_vs + c) * tdim + d];
                            }
                        }
                    }
                }
            }
        }
    }

    /// Computes the reference value $\sum_i u_i \varphi_i(\xi)$ for local coefficients `u`.
    ///
    /// `scratch` is resized as needed and may be reused between calls.
    pub fn evaluate_reference_value<T: FieldScalar>(
        &self,
        coefficients: &[T],
        xi: &[f64],
        scratch: &mut Vec<f64>,
        value: &mut [T],
    ) {
        debug_assert_eq!(coefficients.len(), self.space_dimension);
        debug_assert_eq!(value.len(), self.reference_value_size);
        match &self.kind {
            ElementKind::Leaf(basis) => {
                let vs = self.reference_value_size;
                scratch.resize(self.space_dimension * vs, 0.0);
                basis.populate_basis(scratch, xi);
                for (c, v) in value.iter_mut().enumerate() {
                    *v = coefficients
                        .iter()
                        .enumerate()
                        .fold(T::zero(), |acc, (i, u_i)| acc + u_i.mul_real(scratch[i * vs + c]));
                }
            }
            ElementKind::Blocked { sub, block_size } => {
                scratch.resize(sub.space_dimension, 0.0);
                sub.populate_basis(scratch, xi);
                for (k, v) in value.iter_mut().enumerate() {
                    *v = scratch
                        .iter()
                        .enumerate()
                        .fold(T::zero(), |acc, (n, phi)| acc + coefficients[n * block_size + k].mul_real(*phi));
                }
            }
            ElementKind::Mixed {
                subs,
                dof_offsets,
                value_offsets,
            } => {
                for (s, sub) in subs.iter().enumerate() {
                    sub.evaluate_reference_value(
                        &coefficients[dof_offsets[s]..dof_offsets[s + 1]],
                        xi,
                        scratch,
                        &mut value[value_offsets[s]..value_offsets[s + 1]],
                    );
                }
            }
        }
    }

    /// Tabulates basis values (`order = 0`) and optionally first derivatives (`order = 1`) at
    /// the rows of `points`, which must have at least `tdim` columns.
    pub fn tabulate(&self, points: &DMatrix<f64>, order: usize) -> Result<Tabulation> {
        let tdim = self.topological_dimension();
        if order > 1 {
            return Err(FunctionError::UnsupportedElement(format!(
                "tabulation of derivatives of order {} is not supported",
                order
            )));
        }
        if points.ncols() < tdim {
            return Err(FunctionError::DimensionMismatch(format!(
                "reference points have {} coordinates, expected at least {}",
                points.ncols(),
                tdim
            )));
        }

        let num_points = points.nrows();
        let num_basis = self.space_dimension;
        let vs = self.reference_value_size;
        let stride = num_basis * vs;
        let mut tables = vec![vec![0.0; num_points * stride]; 1 + order * tdim];
        let mut gradients = vec![0.0; stride * tdim];
        let mut xi = vec![0.0; tdim];

        for p in 0..num_points {
            for d in 0..tdim {
                xi[d] = points[(p, d)];
            }
            self.populate_basis(&mut tables[0][p * stride..(p + 1) * stride], &xi);
            if order == 1 {
                self.populate_basis_gradients(&mut gradients, &xi);
                for d in 0..tdim {
                    let table = &mut tables[1 + d][p * stride..(p + 1) * stride];
                    for (entry, value) in table.iter_mut().enumerate() {
                        *value = gradients[entry * tdim + d];
                    }
                }
            }
        }

        Ok(Tabulation {
            num_points,
            num_basis,
            value_size: vs,
            tables,
        })
    }

    pub(crate) fn layout(&self) -> ElementLayout<'_> {
        match &self.kind {
            ElementKind::Leaf(basis) => ElementLayout::Leaf(basis.as_ref()),
            ElementKind::Blocked { sub, block_size } => ElementLayout::Blocked(sub, *block_size),
            ElementKind::Mixed { subs, .. } => ElementLayout::Mixed(subs),
        }
    }
}

/// Structural view of an element used when numbering dofs.
pub(crate) enum ElementLayout<'a> {
    Leaf(&'a dyn ReferenceBasis),
    Blocked(&'a Arc<FiniteElement>, usize),
    Mixed(&'a [Arc<FiniteElement>]),
}
