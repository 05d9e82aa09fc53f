//! Evaluation of precompiled kernels at reference points of cells.
use crate::error::{FunctionError, Result};
use crate::function::{gather_cell_coefficients, Function};
use crate::mesh::Mesh;
use fenris_traits::FieldScalar;
use log::trace;
use nalgebra::DMatrix;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

/// A constant, possibly tensor-valued, entering an expression.
#[derive(Debug)]
pub struct Constant<T> {
    values: RwLock<Vec<T>>,
    shape: Vec<usize>,
}

impl<T: FieldScalar> Constant<T> {
    pub fn scalar(value: T) -> Self {
        Self {
            values: RwLock::new(vec![value]),
            shape: Vec::new(),
        }
    }

    /// A constant with the given shape and row-major values.
    pub fn new(values: Vec<T>, shape: Vec<usize>) -> Result<Self> {
        let size: usize = shape.iter().product();
        if size != values.len() {
            return Err(FunctionError::DimensionMismatch(format!(
                "constant of shape {:?} needs {} values, got {}",
                shape,
                size,
                values.len()
            )));
        }
        Ok(Self {
            values: RwLock::new(values),
            shape,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> Vec<T> {
        self.values.read().clone()
    }

    pub fn set_values(&self, values: &[T]) -> Result<()> {
        let mut current = self.values.write();
        if current.len() != values.len() {
            return Err(FunctionError::DimensionMismatch(format!(
                "constant has {} values, got {}",
                current.len(),
                values.len()
            )));
        }
        current.copy_from_slice(values);
        Ok(())
    }
}

/// A kernel computing the values of an expression on one cell.
///
/// `values` receives `num_points x value_size` values in row-major order. `coefficients`
/// concatenates the cell coefficients of each bound function, in binding order and with
/// orientation signs applied. `constants` concatenates the values of all constants, and
/// `geometry` holds the coordinates of the geometry nodes of the cell, `gdim` per node.
pub trait TabulateExpression<T>: Send {
    fn tabulate(&self, values: &mut [T], coefficients: &[T], constants: &[T], geometry: &[f64]);
}

/// Signature of kernels produced by external code generators.
pub type TabulateFn<T> =
    unsafe extern "C" fn(values: *mut T, coefficients: *const T, constants: *const T, geometry: *const f64, context: *mut c_void);

/// An externally compiled kernel together with an opaque context pointer.
pub struct CompiledKernel<T> {
    function: TabulateFn<T>,
    context: *mut c_void,
}

impl<T> CompiledKernel<T> {
    /// Wraps a compiled kernel.
    ///
    /// # Safety
    /// `function` must only read and write within the extents described by
    /// [`TabulateExpression`], and must be safe to call with `context` from any thread for as
    /// long as the kernel exists.
    pub unsafe fn new(function: TabulateFn<T>, context: *mut c_void) -> Self {
        Self { function, context }
    }
}

// SAFETY: the caller of `CompiledKernel::new` guarantees that the kernel and its context may
// be used from any thread.
unsafe impl<T> Send for CompiledKernel<T> {}

impl<T> fmt::Debug for CompiledKernel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledKernel")
            .field("function", &(self.function as *const c_void))
            .field("context", &self.context)
            .finish()
    }
}

impl<T> TabulateExpression<T> for CompiledKernel<T> {
    fn tabulate(&self, values: &mut [T], coefficients: &[T], constants: &[T], geometry: &[f64]) {
        // SAFETY: the slices match the extents promised to the kernel in `CompiledKernel::new`
        unsafe {
            (self.function)(
                values.as_mut_ptr(),
                coefficients.as_ptr(),
                constants.as_ptr(),
                geometry.as_ptr(),
                self.context,
            )
        }
    }
}

/// A kernel evaluated at a fixed set of reference points on selected cells, given bound
/// coefficient functions and constants.
pub struct Expression<T> {
    coefficients: Vec<(String, Option<Arc<Function<T>>>)>,
    coefficient_indices: FxHashMap<String, usize>,
    constants: Vec<(String, Option<Arc<Constant<T>>>)>,
    kernel: Option<Box<dyn TabulateExpression<T>>>,
    reference_points: DMatrix<f64>,
    value_shape: Vec<usize>,
    mesh: Option<Arc<Mesh>>,
}

impl<T: fmt::Debug> fmt::Debug for Expression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coefficient_names: Vec<_> = self.coefficients.iter().map(|(name, _)| name).collect();
        let constant_names: Vec<_> = self.constants.iter().map(|(name, _)| name).collect();
        f.debug_struct("Expression")
            .field("coefficients", &coefficient_names)
            .field("constants", &constant_names)
            .field("has_kernel", &self.kernel.is_some())
            .field("reference_points", &self.reference_points)
            .field("value_shape", &self.value_shape)
            .finish()
    }
}

impl<T: FieldScalar> Expression<T> {
    /// Creates an expression with unbound coefficients and unset constants.
    ///
    /// `reference_points` is a `num_points x tdim` matrix; together with `value_shape` it
    /// determines the size of the output of each cell.
    pub fn new(
        coefficient_names: Vec<String>,
        constant_names: Vec<String>,
        reference_points: DMatrix<f64>,
        value_shape: Vec<usize>,
    ) -> Self {
        let coefficient_indices = coefficient_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            coefficients: coefficient_names.into_iter().map(|name| (name, None)).collect(),
            coefficient_indices,
            constants: constant_names.into_iter().map(|name| (name, None)).collect(),
            kernel: None,
            reference_points,
            value_shape,
            mesh: None,
        }
    }

    pub fn set_tabulate_expression(&mut self, kernel: Box<dyn TabulateExpression<T>>) {
        self.kernel = Some(kernel);
    }

    pub fn has_tabulate_expression(&self) -> bool {
        self.kernel.is_some()
    }

    pub fn coefficients(&self) -> &[(String, Option<Arc<Function<T>>>)] {
        &self.coefficients
    }

    pub fn constants(&self) -> &[(String, Option<Arc<Constant<T>>>)] {
        &self.constants
    }

    pub fn reference_points(&self) -> &DMatrix<f64> {
        &self.reference_points
    }

    pub fn num_points(&self) -> usize {
        self.reference_points.nrows()
    }

    pub fn value_shape(&self) -> &[usize] {
        &self.value_shape
    }

    pub fn value_size(&self) -> usize {
        self.value_shape.iter().product()
    }

    pub fn set_mesh(&mut self, mesh: Arc<Mesh>) {
        self.mesh = Some(mesh);
    }

    pub fn mesh(&self) -> Option<&Arc<Mesh>> {
        self.mesh.as_ref()
    }

    /// Binds coefficients by position. Nothing is bound if any index is unknown.
    pub fn set_coefficients(&mut self, coefficients: Vec<(usize, Arc<Function<T>>)>) -> Result<()> {
        if let Some((index, _)) = coefficients
            .iter()
            .find(|(index, _)| *index >= self.coefficients.len())
        {
            return Err(FunctionError::UnknownCoefficient(index.to_string()));
        }
        for (index, function) in coefficients {
            self.coefficients[index].1 = Some(function);
        }
        Ok(())
    }

    /// Binds coefficients by name. Nothing is bound if any name is unknown.
    pub fn set_coefficients_by_name<S: AsRef<str>>(&mut self, coefficients: Vec<(S, Arc<Function<T>>)>) -> Result<()> {
        let indexed = coefficients
            .into_iter()
            .map(|(name, function)| {
                let name = name.as_ref();
                self.coefficient_indices
                    .get(name)
                    .map(|&index| (index, function))
                    .ok_or_else(|| FunctionError::UnknownCoefficient(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        self.set_coefficients(indexed)
    }

    /// Updates constants by name, leaving the others untouched. Nothing is updated if any
    /// name is unknown.
    pub fn set_constants<S: AsRef<str>>(&mut self, constants: Vec<(S, Arc<Constant<T>>)>) -> Result<()> {
        if let Some((name, _)) = constants
            .iter()
            .find(|(name, _)| !self.constants.iter().any(|(n, _)| n == name.as_ref()))
        {
            return Err(FunctionError::UnknownConstant(name.as_ref().to_string()));
        }
        for (name, constant) in constants {
            for (n, slot) in self.constants.iter_mut() {
                if n == name.as_ref() {
                    *slot = Some(Arc::clone(&constant));
                }
            }
        }
        Ok(())
    }

    /// Replaces all constants by the given list.
    ///
    /// The number of constants becomes the length of the list and all names are cleared, so
    /// constants can no longer be updated by name.
    pub fn set_constants_list(&mut self, constants: Vec<Arc<Constant<T>>>) {
        self.constants = constants
            .into_iter()
            .map(|constant| (String::new(), Some(constant)))
            .collect();
    }

    pub fn all_constants_set(&self) -> bool {
        self.constants.iter().all(|(_, constant)| constant.is_some())
    }

    pub fn get_unset_constants(&self) -> BTreeSet<String> {
        self.constants
            .iter()
            .filter(|(_, constant)| constant.is_none())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn check_ready(&self) -> Result<(&dyn TabulateExpression<T>, Vec<&Arc<Function<T>>>)> {
        let not_ready = |reason: String| Err(FunctionError::ExpressionNotReady(reason));
        let kernel = match &self.kernel {
            Some(kernel) => kernel.as_ref(),
            None => return not_ready("no kernel is installed".to_string()),
        };
        if !self.all_constants_set() {
            return not_ready(format!("unset constants {:?}", self.get_unset_constants()));
        }
        let mut functions = Vec::with_capacity(self.coefficients.len());
        for (name, function) in &self.coefficients {
            match function {
                Some(function) => functions.push(function),
                None => return not_ready(format!("coefficient `{}` is not bound", name)),
            }
        }
        if !functions.is_empty() {
            let mesh = match &self.mesh {
                Some(mesh) => mesh,
                None => return not_ready("coefficients are bound but no mesh is set".to_string()),
            };
            if functions
                .iter()
                .any(|f| !Arc::ptr_eq(f.function_space().mesh(), mesh))
            {
                return not_ready("coefficients live on a different mesh".to_string());
            }
        }
        Ok((kernel, functions))
    }

    /// Evaluates the expression on each of `active_cells`.
    ///
    /// Row `k` of `out` (of length `num_points * value_size`) receives the values on cell
    /// `active_cells[k]`.
    pub fn eval(&self, active_cells: &[usize], out: &mut [T]) -> Result<()> {
        let (kernel, functions) = self.check_ready()?;
        let row_size = self.num_points() * self.value_size();
        if out.len() != active_cells.len() * row_size {
            return Err(FunctionError::DimensionMismatch(format!(
                "output has length {}, expected {} cells times {} values",
                out.len(),
                active_cells.len(),
                row_size
            )));
        }
        if let Some(mesh) = &self.mesh {
            if let Some(&cell) = active_cells.iter().find(|&&cell| cell >= mesh.num_cells()) {
                return Err(FunctionError::CellOutOfRange {
                    cell,
                    num_cells: mesh.num_cells(),
                });
            }
        }

        let constants: Vec<T> = self
            .constants
            .iter()
            .flat_map(|(_, constant)| constant.as_ref().map(|c| c.values()).unwrap_or_default())
            .collect();
        // Snapshots, so that no lock is held while the kernel runs or taken twice for a
        // function bound to several coefficients
        let coefficient_values: Vec<Vec<T>> = functions.iter().map(|f| f.vector().to_vec()).collect();
        let num_coefficients = functions
            .iter()
            .map(|f| f.function_space().dofmap().cell_dimension())
            .sum();
        let mut coefficients = Vec::with_capacity(num_coefficients);
        let mut cell_coefficients = Vec::new();
        let mut geometry = Vec::new();
        if let Some(mesh) = &self.mesh {
            geometry.resize(mesh.nodes_per_cell() * mesh.geometric_dimension(), 0.0);
        }

        trace!("Evaluating expression on {} cells", active_cells.len());
        for (&cell, row) in active_cells.iter().zip(out.chunks_exact_mut(row_size.max(1))) {
            coefficients.clear();
            for (function, values) in functions.iter().zip(&coefficient_values) {
                gather_cell_coefficients(function.function_space().dofmap(), values, cell, &mut cell_coefficients);
                coefficients.extend_from_slice(&cell_coefficients);
            }
            if let Some(mesh) = &self.mesh {
                mesh.populate_cell_geometry(cell, &mut geometry);
            }
            kernel.tabulate(row, &coefficients, &constants, &geometry);
        }
        Ok(())
    }
}
