use fenris_function::dofmap::IndexMap;
use fenris_function::error::GhostUpdateError;
use fenris_function::vector::{CoefficientVector, GhostExchange};
use fenris_function::FunctionError;
use num::Complex;
use std::sync::Arc;

/// Pretends that every ghost is owned elsewhere with a value equal to its global index.
struct GlobalIndexExchange;

impl GhostExchange<f64> for GlobalIndexExchange {
    fn update_ghosts(&self, index_map: &IndexMap, values: &mut [f64]) -> Result<(), GhostUpdateError> {
        let size_local = index_map.size_local();
        for (value, &ghost) in values[size_local..].iter_mut().zip(index_map.ghosts()) {
            *value = ghost as f64;
        }
        Ok(())
    }
}

struct FailingExchange;

impl GhostExchange<f64> for FailingExchange {
    fn update_ghosts(&self, _: &IndexMap, _: &mut [f64]) -> Result<(), GhostUpdateError> {
        Err(GhostUpdateError::new("peer unreachable"))
    }
}

fn ghosted_index_map() -> Arc<IndexMap> {
    Arc::new(IndexMap::with_ghosts(4..7, vec![0, 9], vec![0, 2]).unwrap())
}

#[test]
fn new_vectors_are_zero() {
    let vector = CoefficientVector::<f64>::new(ghosted_index_map());
    assert_eq!(vector.len(), 5);
    assert_eq!(vector.size_local(), 3);
    assert_eq!(vector.num_ghosts(), 2);
    assert_eq!(vector.local_range(), 4..7);
    assert_eq!(vector.to_vec(), vec![0.0; 5]);
}

#[test]
fn local_access_is_bounds_checked() {
    let vector = CoefficientVector::new(Arc::new(IndexMap::new(3)));
    vector.set_local(&[2, 0], &[5.0, 1.0]).unwrap();
    assert_eq!(vector.get_local(&[0, 1, 2]).unwrap(), vec![1.0, 0.0, 5.0]);

    assert!(matches!(
        vector.set_local(&[1, 3], &[7.0, 7.0]),
        Err(FunctionError::DimensionMismatch(_))
    ));
    assert_eq!(vector.to_vec(), vec![1.0, 0.0, 5.0]);
    assert!(vector.set_local(&[1], &[7.0, 7.0]).is_err());
    assert!(vector.get_local(&[3]).is_err());
}

#[test]
fn clones_share_storage_and_deep_clones_do_not() {
    let vector = CoefficientVector::from_values(Arc::new(IndexMap::new(2)), vec![1.0, 2.0]).unwrap();
    let shared = vector.clone();
    let copy = vector.deep_clone();
    assert!(shared.shares_storage_with(&vector));
    assert!(!copy.shares_storage_with(&vector));

    shared.set_local(&[0], &[10.0]).unwrap();
    assert_eq!(vector.to_vec(), vec![10.0, 2.0]);
    assert_eq!(copy.to_vec(), vec![1.0, 2.0]);

    assert!(CoefficientVector::from_values(Arc::new(IndexMap::new(2)), vec![1.0]).is_err());
}

#[test]
fn complex_coefficients() {
    let vector = CoefficientVector::new(Arc::new(IndexMap::new(2)));
    vector.set_local(&[1], &[Complex::new(1.0, -1.0)]).unwrap();
    assert_eq!(vector.to_vec(), vec![Complex::new(0.0, 0.0), Complex::new(1.0, -1.0)]);
}

#[test]
fn ghost_updates_go_through_the_installed_exchange() {
    let vector = CoefficientVector::<f64>::new(ghosted_index_map()).with_ghost_exchange(Arc::new(GlobalIndexExchange));
    vector.set_local(&[0, 1, 2], &[1.0, 2.0, 3.0]).unwrap();
    vector.update_ghosts().unwrap();
    assert_eq!(vector.to_vec(), vec![1.0, 2.0, 3.0, 0.0, 9.0]);
}

#[test]
fn ghost_update_failures_are_propagated() {
    let vector = CoefficientVector::<f64>::new(ghosted_index_map());
    assert!(matches!(vector.update_ghosts(), Err(FunctionError::GhostUpdate(_))));

    let vector = vector.with_ghost_exchange(Arc::new(FailingExchange));
    assert_eq!(
        vector.update_ghosts().unwrap_err(),
        FunctionError::GhostUpdate(GhostUpdateError::new("peer unreachable"))
    );

    // Without ghosts there is nothing to exchange
    let serial = CoefficientVector::<f64>::new(Arc::new(IndexMap::new(3))).with_ghost_exchange(Arc::new(FailingExchange));
    serial.update_ghosts().unwrap();
}
