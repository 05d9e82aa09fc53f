//! Finite element functions and precompiled expressions on unstructured meshes.
//!
//! A [`Function`](function::Function) represents a discrete field
//! $u_h = \sum_i U_i \varphi_i$ over a [`FunctionSpace`](space::FunctionSpace), and
//! supports sub-field views, collapse, interpolation and point evaluation. An
//! [`Expression`](expression::Expression) evaluates an externally compiled kernel at a fixed
//! set of reference points on selected cells.
pub mod cell;
pub mod dofmap;
pub mod element;
pub mod error;
pub mod expression;
pub mod function;
pub mod geometry;
pub mod mesh;
pub mod settings;
pub mod space;
pub mod vector;

pub mod optimize {
    pub use fenris_optimize::*;
}

pub extern crate nalgebra;

pub use fenris_traits::{FieldScalar, Real};

pub use error::{FunctionError, Result};
