//! Errors surfaced by functions, spaces and expressions.
use thiserror::Error;

/// Fault reported by a [`GhostExchange`](crate::vector::GhostExchange) implementation.
///
/// Ghost exchange is owned by the (possibly distributed) caller, so the crate treats its
/// failures as opaque and propagates them unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("ghost update failed: {message}")]
pub struct GhostUpdateError {
    pub message: String,
}

impl GhostUpdateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error kinds for function, space and expression operations.
///
/// All variants are fail-fast errors at the call site. Points that cannot be located or
/// pulled back are *not* errors: they are reported through
/// [`PointStatistics`](crate::function::PointStatistics).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FunctionError {
    #[error("invalid component {component}: the space has {num_sub_spaces} sub-spaces")]
    InvalidComponent { component: usize, num_sub_spaces: usize },
    #[error("unsupported element: {0}")]
    UnsupportedElement(String),
    #[error("cell index {cell} is out of range for a mesh with {num_cells} cells")]
    CellOutOfRange { cell: usize, num_cells: usize },
    #[error("unknown coefficient `{0}`")]
    UnknownCoefficient(String),
    #[error("unknown constant `{0}`")]
    UnknownConstant(String),
    #[error("expression is not ready for evaluation: {0}")]
    ExpressionNotReady(String),
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error(transparent)]
    GhostUpdate(#[from] GhostUpdateError),
}

pub type Result<T> = std::result::Result<T, FunctionError>;

/// Returns a [`FunctionError::DimensionMismatch`] unless `actual == expected`.
pub(crate) fn check_len(what: &str, actual: usize, expected: usize) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(FunctionError::DimensionMismatch(format!(
            "{what} has length {actual}, expected {expected}"
        )))
    }
}
