//! Discrete finite element functions.
use crate::dofmap::DofMap;
use crate::element::FiniteElement;
use crate::error::{check_len, FunctionError, Result};
use crate::geometry::locate_point;
use crate::space::FunctionSpace;
use crate::vector::CoefficientVector;
use davenport::{define_thread_local_workspace, with_thread_local_workspace};
use fenris_traits::FieldScalar;
use itertools::izip;
use log::debug;
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_FUNCTION_ID: AtomicUsize = AtomicUsize::new(0);

define_thread_local_workspace!(EVALUATION_WORKSPACE);

/// Counts of points processed by an evaluation or interpolation.
///
/// A point is *missed* if it could not be located in the mesh or could not be pulled back
/// to reference coordinates. Output associated with a missed point is left untouched.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PointStatistics {
    pub miss_count: usize,
    pub total_points: usize,
}

#[derive(Debug)]
struct EvaluationBuffer<T> {
    coefficients: Vec<T>,
    reference_value: Vec<T>,
    basis: Vec<f64>,
}

impl<T> Default for EvaluationBuffer<T> {
    fn default() -> Self {
        Self {
            coefficients: Vec::new(),
            reference_value: Vec::new(),
            basis: Vec::new(),
        }
    }
}

/// Copies the coefficients of the dofs of `cell`, with orientation signs applied.
pub(crate) fn gather_cell_coefficients<T: FieldScalar>(dofmap: &DofMap, values: &[T], cell: usize, coefficients: &mut Vec<T>) {
    coefficients.clear();
    coefficients.extend(dofmap.cell_dofs(cell).iter().map(|&dof| values[dof]));
    if let Some(signs) = dofmap.cell_signs(cell) {
        for (u, &sign) in coefficients.iter_mut().zip(signs) {
            if sign < 0 {
                *u = -*u;
            }
        }
    }
}

/// Evaluates the physical value of the field with coefficients `values` in `space` at the
/// reference point `xi` of `cell`.
fn evaluate_in_cell<T: FieldScalar>(
    space: &FunctionSpace,
    values: &[T],
    cell: usize,
    xi: &[f64],
    buffer: &mut EvaluationBuffer<T>,
    value: &mut [T],
) {
    let element = space.element();
    gather_cell_coefficients(space.dofmap(), values, cell, &mut buffer.coefficients);
    buffer
        .reference_value
        .resize(element.reference_value_size(), T::zero());
    element.evaluate_reference_value(&buffer.coefficients, xi, &mut buffer.basis, &mut buffer.reference_value);
    if element.has_identity_map() {
        value.copy_from_slice(&buffer.reference_value);
    } else {
        let jacobian = space.mesh().jacobian(cell, xi);
        element.push_forward(&buffer.reference_value, &jacobian.j, &jacobian.k, jacobian.det_j, value);
    }
}

/// Dual basis of an element, with the interpolation points each dof depends on.
struct DualBasis<'a> {
    matrix: &'a DMatrix<f64>,
    num_points: usize,
    value_size: usize,
    dof_points: Vec<Vec<usize>>,
}

impl<'a> DualBasis<'a> {
    fn new(element: &'a FiniteElement) -> Self {
        let matrix = element.interpolation_matrix();
        let num_points = element.num_interpolation_points();
        let value_size = element.reference_value_size();
        let dof_points = (0..element.space_dimension())
            .map(|i| {
                (0..num_points)
                    .filter(|&p| (0..value_size).any(|c| matrix[(i, c * num_points + p)] != 0.0))
                    .collect()
            })
            .collect();
        Self {
            matrix,
            num_points,
            value_size,
            dof_points,
        }
    }

    /// Applies functional `dof` to reference values given per interpolation point.
    ///
    /// Returns `None` if the value at any point the functional depends on is missing.
    fn apply<'v, T: FieldScalar>(&self, dof: usize, reference_value: impl Fn(usize) -> Option<&'v [T]>) -> Option<T> {
        let mut result = T::zero();
        for &p in &self.dof_points[dof] {
            let value = reference_value(p)?;
            for c in 0..self.value_size {
                result += value[c].mul_real(self.matrix[(dof, c * self.num_points + p)]);
            }
        }
        Some(result)
    }
}

/// Interpolation points of one cell whose dofs have not yet been assigned.
struct InterpolationTask {
    cell: usize,
    local_dofs: Vec<usize>,
    points: Vec<usize>,
}

/// Visits cells in ascending order and assigns each dof to the first cell containing it.
fn plan_interpolation(space: &FunctionSpace, dual: &DualBasis) -> Vec<InterpolationTask> {
    let dofmap = space.dofmap();
    let mut visited = vec![false; space.num_local_dofs()];
    let mut tasks = Vec::new();
    for cell in 0..dofmap.num_cells() {
        let dofs = dofmap.cell_dofs(cell);
        let local_dofs: Vec<usize> = (0..dofs.len()).filter(|&i| !visited[dofs[i]]).collect();
        if local_dofs.is_empty() {
            continue;
        }
        let mut needed = vec![false; dual.num_points];
        for &i in &local_dofs {
            visited[dofs[i]] = true;
            for &p in &dual.dof_points[i] {
                needed[p] = true;
            }
        }
        let points = (0..dual.num_points).filter(|&p| needed[p]).collect();
        tasks.push(InterpolationTask {
            cell,
            local_dofs,
            points,
        });
    }
    tasks
}

/// A discrete field $u_h = \sum_i U_i \varphi_i$ over a [`FunctionSpace`].
///
/// A function obtained from [`sub`](Function::sub) is a view: it shares the coefficient
/// storage of its parent, and its dofmap addresses the parent's coefficients.
#[derive(Debug)]
pub struct Function<T> {
    space: Arc<FunctionSpace>,
    vector: CoefficientVector<T>,
    id: usize,
    name: String,
}

impl<T: FieldScalar> Function<T> {
    /// Creates a function with zero coefficients.
    pub fn new(space: Arc<FunctionSpace>) -> Self {
        let vector = CoefficientVector::new(Arc::clone(space.dofmap().index_map()));
        Self::from_parts(space, vector, "u".to_string())
    }

    /// Creates a function over an existing coefficient vector.
    pub fn with_vector(space: Arc<FunctionSpace>, vector: CoefficientVector<T>) -> Result<Self> {
        check_len("coefficient vector", vector.len(), space.num_local_dofs())?;
        Ok(Self::from_parts(space, vector, "u".to_string()))
    }

    fn from_parts(space: Arc<FunctionSpace>, vector: CoefficientVector<T>, name: String) -> Self {
        Self {
            space,
            vector,
            id: NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed),
            name,
        }
    }

    /// Process-unique identifier, increasing in order of construction.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn function_space(&self) -> &Arc<FunctionSpace> {
        &self.space
    }

    pub fn vector(&self) -> &CoefficientVector<T> {
        &self.vector
    }

    pub fn value_shape(&self) -> &[usize] {
        self.space.element().value_shape()
    }

    pub fn value_rank(&self) -> usize {
        self.space.element().value_rank()
    }

    pub fn value_size(&self) -> usize {
        self.space.element().value_size()
    }

    /// Extent of the value along axis `i`.
    pub fn value_dimension(&self, i: usize) -> Result<usize> {
        self.value_shape().get(i).copied().ok_or_else(|| {
            FunctionError::DimensionMismatch(format!(
                "axis {} exceeds the value rank {}",
                i,
                self.value_rank()
            ))
        })
    }

    /// View of component `i`, sharing coefficients with `self`.
    pub fn sub(&self, i: usize) -> Result<Function<T>> {
        let space = self.space.sub(i)?;
        Ok(Self::from_parts(space, self.vector.clone(), format!("{}_{}", self.name, i)))
    }

    /// Standalone copy of this function over the collapsed space.
    pub fn collapse(&self) -> Result<Function<T>> {
        let (space, permutation) = self.space.collapse()?;
        let values = {
            let parent = self.vector.read();
            permutation.iter().map(|&dof| parent[dof]).collect()
        };
        let vector = CoefficientVector::from_values(Arc::clone(space.dofmap().index_map()), values)?;
        Ok(Self::from_parts(space, vector, self.name.clone()))
    }

    /// Interpolates `v` into this function.
    ///
    /// If both functions live on the same space, coefficients are copied. Otherwise the
    /// dual basis of this function's element is applied to `v`, evaluated at the
    /// interpolation points of each cell. When the meshes differ, each point is first located
    /// in the mesh of `v`; dofs depending on a point that cannot be located keep their value.
    ///
    /// Dofs shared between cells are evaluated once, on the cell of lowest index.
    pub fn interpolate(&self, v: &Function<T>) -> Result<PointStatistics> {
        if self.value_size() != v.value_size() {
            return Err(FunctionError::DimensionMismatch(format!(
                "cannot interpolate a function with value size {} into one with value size {}",
                v.value_size(),
                self.value_size()
            )));
        }

        let source = v.vector.to_vec();
        if *self.space == *v.space {
            let dofmap = self.space.dofmap();
            let mut target = self.vector.write();
            for cell in 0..dofmap.num_cells() {
                for &dof in dofmap.cell_dofs(cell) {
                    target[dof] = source[dof];
                }
            }
            return Ok(PointStatistics::default());
        }

        let mesh = self.space.mesh();
        let source_mesh = v.space.mesh();
        let same_mesh = Arc::ptr_eq(mesh, source_mesh);
        if !same_mesh {
            source_mesh.bounding_box_tree();
        }

        let element = self.space.element();
        let dual = DualBasis::new(element);
        let tasks = plan_interpolation(&self.space, &dual);
        let points = element.interpolation_points();
        let tdim = points.ncols();
        let value_size = element.reference_value_size();

        let reference_values: Vec<Vec<Option<Vec<T>>>> = tasks
            .par_iter()
            .map(|task| {
                task.points
                    .iter()
                    .map(|&p| {
                        let mut xi = [0.0; 3];
                        for d in 0..tdim {
                            xi[d] = points[(p, d)];
                        }
                        let (source_cell, source_xi) = if same_mesh {
                            (task.cell, xi)
                        } else {
                            let x = mesh.push_forward_point(task.cell, &xi[..tdim]);
                            locate_point(source_mesh, &x)?
                        };

                        let mut physical = vec![T::zero(); value_size];
                        with_thread_local_workspace(&EVALUATION_WORKSPACE, |buffer: &mut EvaluationBuffer<T>| {
                            evaluate_in_cell(&v.space, &source, source_cell, &source_xi, buffer, &mut physical)
                        });
                        if element.has_identity_map() {
                            return Some(physical);
                        }
                        let jacobian = mesh.jacobian(task.cell, &xi[..tdim]);
                        let mut reference = vec![T::zero(); value_size];
                        element.pull_back(&physical, &jacobian.j, &jacobian.k, jacobian.det_j, &mut reference);
                        Some(reference)
                    })
                    .collect()
            })
            .collect();

        let mut statistics = PointStatistics::default();
        let dofmap = self.space.dofmap();
        let mut target = self.vector.write();
        for (task, values) in izip!(&tasks, &reference_values) {
            statistics.total_points += task.points.len();
            statistics.miss_count += values.iter().filter(|value| value.is_none()).count();

            let dofs = dofmap.cell_dofs(task.cell);
            let signs = dofmap.cell_signs(task.cell);
            let value_at = |p: usize| {
                let k = task.points.binary_search(&p).ok()?;
                values[k].as_deref()
            };
            for &i in &task.local_dofs {
                if let Some(value) = dual.apply(i, value_at) {
                    let negate = signs.map(|s| s[i] < 0).unwrap_or(false);
                    target[dofs[i]] = if negate { -value } else { value };
                }
            }
        }

        if statistics.miss_count > 0 {
            debug!(
                "Interpolation into function {} missed {} of {} points",
                self.id, statistics.miss_count, statistics.total_points
            );
        }
        Ok(statistics)
    }

    /// Interpolates a function given by its values at points.
    ///
    /// `f` is called once with the physical interpolation points of all cells as a `3 x n`
    /// matrix (see [`FunctionSpace::interpolation_coordinates`]) and must return the values at
    /// these points as a `value_size x n` matrix.
    pub fn interpolate_fn<F>(&self, f: F) -> Result<PointStatistics>
    where
        F: FnOnce(&DMatrix<f64>) -> DMatrix<T>,
    {
        let coordinates = self.space.interpolation_coordinates();
        let values = f(&coordinates);
        let value_size = self.value_size();
        if values.shape() != (value_size, coordinates.ncols()) {
            return Err(FunctionError::DimensionMismatch(format!(
                "interpolated values have shape {:?}, expected {:?}",
                values.shape(),
                (value_size, coordinates.ncols())
            )));
        }

        let element = self.space.element();
        let mesh = self.space.mesh();
        let dofmap = self.space.dofmap();
        let dual = DualBasis::new(element);
        let points = element.interpolation_points();
        let (num_points, tdim) = points.shape();

        let mut reference = vec![vec![T::zero(); value_size]; num_points];
        let mut target = self.vector.write();
        for task in plan_interpolation(&self.space, &dual) {
            for &p in &task.points {
                let column = values.column(task.cell * num_points + p);
                let physical: Vec<T> = column.iter().copied().collect();
                if element.has_identity_map() {
                    reference[p].copy_from_slice(&physical);
                } else {
                    let xi: Vec<f64> = (0..tdim).map(|d| points[(p, d)]).collect();
                    let jacobian = mesh.jacobian(task.cell, &xi);
                    element.pull_back(&physical, &jacobian.j, &jacobian.k, jacobian.det_j, &mut reference[p]);
                }
            }

            let dofs = dofmap.cell_dofs(task.cell);
            let signs = dofmap.cell_signs(task.cell);
            for &i in &task.local_dofs {
                if let Some(value) = dual.apply(i, |p| Some(reference[p].as_slice())) {
                    let negate = signs.map(|s| s[i] < 0).unwrap_or(false);
                    target[dofs[i]] = if negate { -value } else { value };
                }
            }
        }

        Ok(PointStatistics {
            miss_count: 0,
            total_points: coordinates.ncols(),
        })
    }

    /// Evaluates the function at physical points `x` on the given cells.
    ///
    /// `out` is row-major with `value_size` entries per point. Rows of points with a negative
    /// cell index are left untouched, as are rows of points whose pullback to the given cell
    /// fails; the latter are counted as misses. Cells are trusted to contain their points.
    pub fn eval(&self, x: &[[f64; 3]], cells: &[i32], out: &mut [T]) -> Result<PointStatistics> {
        let value_size = self.value_size();
        check_len("cell array", cells.len(), x.len())?;
        check_len("output array", out.len(), x.len() * value_size)?;
        let mesh = self.space.mesh();
        let num_cells = mesh.num_cells();
        if let Some(&cell) = cells.iter().find(|&&c| c >= 0 && c as usize >= num_cells) {
            return Err(FunctionError::CellOutOfRange {
                cell: cell as usize,
                num_cells,
            });
        }

        let total_points = cells.iter().filter(|&&c| c >= 0).count();
        if total_points == 0 || value_size == 0 {
            return Ok(PointStatistics {
                miss_count: 0,
                total_points,
            });
        }

        let values = self.vector.read();
        let values: &[T] = &values;
        let miss_count = out
            .par_chunks_mut(value_size)
            .zip(x.par_iter())
            .zip(cells.par_iter())
            .filter(|(_, &cell)| cell >= 0)
            .map(|((row, point), &cell)| {
                let cell = cell as usize;
                match mesh.pull_back(cell, point) {
                    Some(xi) => {
                        with_thread_local_workspace(&EVALUATION_WORKSPACE, |buffer: &mut EvaluationBuffer<T>| {
                            evaluate_in_cell(&self.space, values, cell, &xi, buffer, row)
                        });
                        0
                    }
                    None => 1,
                }
            })
            .sum();

        if miss_count > 0 {
            debug!(
                "Evaluation of function {} failed to pull back {} of {} points",
                self.id, miss_count, total_points
            );
        }
        Ok(PointStatistics {
            miss_count,
            total_points,
        })
    }

    /// Evaluates the function at the same reference points `x` on every cell.
    ///
    /// `out` holds one row of `num_points * value_size` entries per cell. Only available for
    /// Lagrange elements on meshes that are not manifolds, for which reference and physical
    /// values coincide.
    pub fn eval_reference(&self, x: &[[f64; 3]], out: &mut [T]) -> Result<()> {
        let element = self.space.element();
        let mesh = self.space.mesh();
        if !element.is_lagrange() {
            return Err(FunctionError::UnsupportedElement(
                "reference evaluation requires a Lagrange element".to_string(),
            ));
        }
        if mesh.is_manifold() {
            return Err(FunctionError::UnsupportedElement(
                "reference evaluation is not available on manifold meshes".to_string(),
            ));
        }

        let value_size = self.value_size();
        let num_points = x.len();
        let row_size = num_points * value_size;
        check_len("output array", out.len(), mesh.num_cells() * row_size)?;
        if row_size == 0 {
            return Ok(());
        }

        let tdim = mesh.topological_dimension();
        let points = DMatrix::from_fn(num_points, tdim, |p, d| x[p][d]);
        let tabulation = element.tabulate(&points, 0)?;
        let dofmap = self.space.dofmap();
        let values = self.vector.read();
        let values: &[T] = &values;

        out.par_chunks_mut(row_size)
            .enumerate()
            .for_each(|(cell, row)| {
                with_thread_local_workspace(&EVALUATION_WORKSPACE, |buffer: &mut EvaluationBuffer<T>| {
                    gather_cell_coefficients(dofmap, values, cell, &mut buffer.coefficients);
                    for p in 0..num_points {
                        let basis = tabulation.point_values(0, p);
                        for c in 0..value_size {
                            row[p * value_size + c] = buffer
                                .coefficients
                                .iter()
                                .enumerate()
                                .fold(T::zero(), |acc, (i, u)| acc + u.mul_real(basis[i * value_size + c]));
                        }
                    }
                });
            });
        Ok(())
    }

    /// Values at the mesh vertices, one row per vertex in topology order.
    ///
    /// Where the function is discontinuous, the values from all cells sharing a vertex are
    /// averaged with equal weights.
    pub fn compute_point_values(&self) -> DMatrix<T> {
        let mesh = self.space.mesh();
        let topology = mesh.topology();
        let value_size = self.value_size();
        let reference_vertices = mesh.cell_type().reference_vertices();
        let tdim = mesh.topological_dimension();

        let mut point_values: DMatrix<T> = DMatrix::zeros(topology.num_vertices(), value_size);
        let mut counts = vec![0usize; topology.num_vertices()];
        let mut value = vec![T::zero(); value_size];
        let mut buffer = EvaluationBuffer::default();
        let values = self.vector.read();
        for cell in 0..mesh.num_cells() {
            for (&vertex, xi) in topology.cell_vertices(cell).iter().zip(reference_vertices) {
                evaluate_in_cell(&self.space, &values, cell, &xi[..tdim], &mut buffer, &mut value);
                for c in 0..value_size {
                    point_values[(vertex, c)] += value[c];
                }
                counts[vertex] += 1;
            }
        }

        for (vertex, &count) in counts.iter().enumerate() {
            if count > 1 {
                let scale = 1.0 / count as f64;
                for c in 0..value_size {
                    point_values[(vertex, c)] = point_values[(vertex, c)].mul_real(scale);
                }
            }
        }
        point_values
    }
}
