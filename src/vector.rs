//! Coefficient storage.
use crate::dofmap::IndexMap;
use crate::error::{check_len, FunctionError, GhostUpdateError, Result};
use fenris_traits::FieldScalar;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Refreshes ghost entries of a coefficient array from their owners.
///
/// Implementations typically communicate with other processes. The local array holds
/// `size_local` owned entries followed by the ghost entries listed by the [`IndexMap`].
pub trait GhostExchange<T>: Send + Sync {
    fn update_ghosts(&self, index_map: &IndexMap, values: &mut [T]) -> std::result::Result<(), GhostUpdateError>;
}

/// Local coefficient array with a declared ghost extent.
///
/// Cloning a `CoefficientVector` produces another handle to the *same* storage: writes
/// through one handle are visible through all others. Use [`deep_clone`](Self::deep_clone)
/// for an independent copy.
pub struct CoefficientVector<T> {
    values: Arc<RwLock<Vec<T>>>,
    index_map: Arc<IndexMap>,
    ghost_exchange: Option<Arc<dyn GhostExchange<T>>>,
}

impl<T> Clone for CoefficientVector<T> {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
            index_map: Arc::clone(&self.index_map),
            ghost_exchange: self.ghost_exchange.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CoefficientVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoefficientVector")
            .field("values", &*self.values.read())
            .field("index_map", &self.index_map)
            .field("has_ghost_exchange", &self.ghost_exchange.is_some())
            .finish()
    }
}

impl<T: FieldScalar> CoefficientVector<T> {
    /// Zero-initialized vector with `size_local + num_ghosts` entries.
    pub fn new(index_map: Arc<IndexMap>) -> Self {
        let len = index_map.size_local() + index_map.num_ghosts();
        Self {
            values: Arc::new(RwLock::new(vec![T::zero(); len])),
            index_map,
            ghost_exchange: None,
        }
    }

    pub fn from_values(index_map: Arc<IndexMap>, values: Vec<T>) -> Result<Self> {
        check_len(
            "coefficient array",
            values.len(),
            index_map.size_local() + index_map.num_ghosts(),
        )?;
        Ok(Self {
            values: Arc::new(RwLock::new(values)),
            index_map,
            ghost_exchange: None,
        })
    }

    pub fn with_ghost_exchange(mut self, exchange: Arc<dyn GhostExchange<T>>) -> Self {
        self.ghost_exchange = Some(exchange);
        self
    }

    /// A fresh vector with the same index map, ghost exchange and values.
    pub fn deep_clone(&self) -> Self {
        Self {
            values: Arc::new(RwLock::new(self.values.read().clone())),
            index_map: Arc::clone(&self.index_map),
            ghost_exchange: self.ghost_exchange.clone(),
        }
    }

    pub fn index_map(&self) -> &Arc<IndexMap> {
        &self.index_map
    }

    pub fn size_local(&self) -> usize {
        self.index_map.size_local()
    }

    pub fn num_ghosts(&self) -> usize {
        self.index_map.num_ghosts()
    }

    /// The range of global indices owned by this process.
    pub fn local_range(&self) -> Range<usize> {
        self.index_map.local_range()
    }

    /// The number of local entries, owned and ghost.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether both handles refer to the same storage.
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }

    /// Values at the given local indices.
    pub fn get_local(&self, indices: &[usize]) -> Result<Vec<T>> {
        let values = self.values.read();
        indices
            .iter()
            .map(|&i| values.get(i).copied().ok_or_else(|| out_of_bounds(i, values.len())))
            .collect()
    }

    /// Writes `values[k]` to local index `indices[k]`. Nothing is written on error.
    pub fn set_local(&self, indices: &[usize], values: &[T]) -> Result<()> {
        check_len("value array", values.len(), indices.len())?;
        let mut data = self.values.write();
        if let Some(&i) = indices.iter().find(|&&i| i >= data.len()) {
            return Err(out_of_bounds(i, data.len()));
        }
        for (&i, &value) in indices.iter().zip(values) {
            data[i] = value;
        }
        Ok(())
    }

    /// Copies all local entries.
    pub fn to_vec(&self) -> Vec<T> {
        self.values.read().clone()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.values.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.values.write()
    }

    /// Refreshes ghost entries through the installed [`GhostExchange`].
    ///
    /// Does nothing if there are no ghosts. Exchange failures are returned unchanged.
    pub fn update_ghosts(&self) -> Result<()> {
        if self.num_ghosts() == 0 {
            return Ok(());
        }
        let exchange = self
            .ghost_exchange
            .as_ref()
            .ok_or_else(|| GhostUpdateError::new("no ghost exchange is installed"))?;
        let mut values = self.values.write();
        exchange.update_ghosts(&self.index_map, &mut values)?;
        Ok(())
    }
}

fn out_of_bounds(index: usize, len: usize) -> FunctionError {
    FunctionError::DimensionMismatch(format!(
        "local index {} is out of bounds for a vector of length {}",
        index, len
    ))
}
