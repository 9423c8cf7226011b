//! Evaluation of definitions.
//!
//! - [`bulk`]: values for many entities of the mesh at once.
//! - [`cellwise`]: values in a single cell, read from its [`CellMesh`][crate::CellMesh].
//! - [`flux`]: normal fluxes through the faces of a cell.
//! - [`integrate`]: the integration kernels averages and fluxes are built on.

pub mod bulk;
pub mod cellwise;
pub mod flux;
pub mod integrate;
