//! Errors raised when a definition cannot be evaluated the way it was asked to.
//!
//! Every variant describes a configuration or programming mistake
//! discovered when a scheme wires a definition to a query,
//! so callers are expected to propagate it with `?` and abort
//! rather than try to recover.
//! Precondition violations (missing cell cache capabilities,
//! undersized output buffers) are not represented here;
//! they are checked with assertions instead.

use crate::{definition::DefinitionKind, quadrature::QuadratureType, Support};

/// Error in evaluating a definition.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum EvalError {
    /// The values backing the definition live on a support
    /// that the requested query cannot handle.
    #[error("{operation}: invalid support {support:?} for the input")]
    UnsupportedSupport {
        /// Name of the evaluation routine that rejected the input.
        operation: &'static str,
        /// The offending support.
        support: Support,
    },
    /// The definition kind cannot serve the requested query
    /// (e.g. an array asked for a face flux).
    #[error("{operation}: cannot evaluate a definition by {kind:?}")]
    UnsupportedKind {
        /// Name of the evaluation routine that rejected the input.
        operation: &'static str,
        /// The offending kind.
        kind: DefinitionKind,
    },
    /// The requested quadrature has no implementation for this query.
    #[error("{operation}: quadrature {quadrature:?} is not implemented")]
    QuadratureNotImplemented {
        /// Name of the evaluation routine that rejected the input.
        operation: &'static str,
        /// The requested level.
        quadrature: QuadratureType,
    },
    /// The dimension (arity) of the quantity does not fit the query.
    #[error("{operation}: invalid dimension {dim} of the quantity")]
    InvalidDimension {
        /// Name of the evaluation routine that rejected the input.
        operation: &'static str,
        /// The offending dimension.
        dim: usize,
    },
    /// The selection of entities is not allowed for this query.
    #[error("{operation}: invalid selection ({reason})")]
    InvalidSelection {
        /// Name of the evaluation routine that rejected the input.
        operation: &'static str,
        /// What was wrong with it.
        reason: &'static str,
    },
}

/// Shorthand for results of evaluation routines.
pub type Result<T> = std::result::Result<T, EvalError>;
