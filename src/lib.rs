//! Evaluation of quantity definitions on polyhedral meshes.
//!
//! A [`Definition`] describes a physical quantity by a constant,
//! an analytic function, an array or an external field.
//! The evaluators compute its values at cells, vertices and faces,
//! its averages over cells and faces and its fluxes through faces,
//! for many entities at once ([`BulkEvaluator`])
//! or inside a single cell ([`cellwise`], [`flux`]).

#![warn(missing_docs)]

pub mod cell_mesh;
pub use cell_mesh::{CellFlag, CellFlags, CellMesh, CellType};

pub mod definition;
pub use definition::{
    AnalyticFunction, ArrayInput, Definition, DefinitionKind, FieldInput, Payload, Pointwise,
    Support, Value,
};

pub mod error;
pub use error::EvalError;

pub mod eval;
pub use eval::{bulk::BulkEvaluator, cellwise, flux, integrate};

pub mod mesh;
pub use mesh::{MeshQuantities, PolyMesh};

pub mod quadrature;
pub use quadrature::QuadratureType;

pub mod reco;

pub mod selection;
pub use selection::Selection;

pub mod settings;
pub use settings::EvalSettings;

pub mod toolbox;

pub use nalgebra as na;

/// A vector in 3D space.
pub type Vec3 = na::Vector3<f64>;
/// A 3×3 tensor.
pub type Mat3 = na::Matrix3<f64>;
