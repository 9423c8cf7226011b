//! Tunable parameters of bulk evaluation.

use crate::quadrature::QuadratureType;

/// Settings shared by the evaluations of a [`BulkEvaluator`][crate::BulkEvaluator].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EvalSettings {
    /// Quadrature used by evaluations that integrate
    /// when the caller doesn't pick one explicitly.
    pub quadrature: QuadratureType,
    /// Selections with at least this many entities
    /// are processed in parallel.
    pub parallel_threshold: usize,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            quadrature: QuadratureType::Bary,
            parallel_threshold: 128,
        }
    }
}

impl EvalSettings {
    /// Replace the default quadrature.
    #[inline]
    pub fn with_quadrature(mut self, quadrature: QuadratureType) -> Self {
        self.quadrature = quadrature;
        self
    }

    /// Replace the parallelization threshold.
    /// `usize::MAX` disables parallel evaluation entirely.
    #[inline]
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }
}
