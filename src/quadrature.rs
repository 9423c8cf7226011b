//! Quadratures for integrating analytic functions over triangles and tetrahedra.
//!
//! Each [`QuadratureType`] maps to one fixed rule per simplex type.
//! Rules are stored as barycentric coordinates of their points
//! together with weights expressed as fractions of the simplex measure,
//! so that integrating over a physical simplex is
//! `measure * Σ wᵢ f(pᵢ)`.
//!
//! | level          | triangle              | tetrahedron           |
//! |----------------|-----------------------|-----------------------|
//! | `Bary`         | 1 point, degree 1     | 1 point, degree 1     |
//! | `BarySubdiv`   | 1 point, degree 1     | 1 point, degree 1     |
//! | `Higher`       | 3 points, degree 2    | 4 points, degree 2    |
//! | `Highest`      | 4 points, degree 3    | 5 points, degree 3    |
//!
//! `BarySubdiv` uses the same rules as `Bary`;
//! the difference lies in how callers subdivide cells and faces
//! before applying them.
//!
//! # Examples
//!
//! ```
//! # use meshdef::{quadrature::{self, QuadratureType}, Pointwise, Vec3};
//! # use nalgebra as na;
//! let f = Pointwise(|_t: f64, x: &Vec3| na::Vector1::new(x.x * x.x));
//! let rule = quadrature::triangle_rule(QuadratureType::Higher, 1).unwrap();
//! let mut integral = [0.];
//! rule.integrate(
//!     0.,
//!     [Vec3::zeros(), Vec3::x(), Vec3::y()],
//!     0.5,
//!     &f,
//!     &mut integral,
//! );
//! assert!((integral[0] - 1. / 12.).abs() < 1e-14);
//! ```

use crate::{
    definition::AnalyticFunction,
    error::{EvalError, Result},
    selection::Selection,
    Vec3,
};

/// Accuracy level of a quadrature, from least to most accurate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QuadratureType {
    /// One evaluation at the barycenter of the entity.
    #[default]
    Bary,
    /// One evaluation at the barycenter of each piece of a subdivision.
    BarySubdiv,
    /// Quadrature with a unique weight, exact for quadratic functions.
    Higher,
    /// Most accurate quadrature available, exact for cubic functions.
    Highest,
}

/// Kind of simplex a rule integrates over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimplexKind {
    /// 2-simplex.
    Triangle,
    /// 3-simplex.
    Tetrahedron,
}

/// Largest number of points in any rule.
const MAX_POINTS: usize = 5;
/// Largest number of components of an integrated quantity.
const MAX_DIM: usize = 9;

/// A quadrature rule over a simplex with `N` vertices.
#[derive(Clone, Copy, Debug)]
pub struct SimplexRule<const N: usize> {
    /// Barycentric coordinates of the quadrature points.
    pub points: &'static [[f64; N]],
    /// Weights as fractions of the simplex measure.
    pub weights: &'static [f64],
    /// Highest polynomial degree integrated exactly.
    pub degree: usize,
}

impl<const N: usize> SimplexRule<N> {
    /// Number of quadrature points.
    #[inline]
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// Physical coordinates of the quadrature points on the given simplex.
    pub fn physical_points(&self, vertices: &[Vec3; N]) -> impl '_ + Iterator<Item = Vec3> {
        let vertices = *vertices;
        self.points.iter().map(move |bary| {
            bary.iter()
                .zip(vertices.iter())
                .map(|(l, v)| *l * v)
                .sum::<Vec3>()
        })
    }

    /// Evaluate `func` at each quadrature point of the simplex
    /// and call `consume(weight, value)` with the weight (as a fraction of the measure)
    /// and the `func.dim()` components at that point.
    ///
    /// All points are evaluated in a single call to `func`.
    pub fn for_each_value(
        &self,
        time: f64,
        vertices: [Vec3; N],
        func: &dyn AnalyticFunction,
        mut consume: impl FnMut(f64, &[f64]),
    ) {
        let dim = func.dim();
        let n = self.n_points();
        assert!(
            n <= MAX_POINTS && dim <= MAX_DIM,
            "Mismatched quadrature dimension"
        );

        let mut coords = [Vec3::zeros(); MAX_POINTS];
        for (c, p) in coords.iter_mut().zip(self.physical_points(&vertices)) {
            *c = p;
        }
        let mut values = [0.; MAX_POINTS * MAX_DIM];
        func.evaluate(time, &coords[..n], Selection::All(n), &mut values[..n * dim]);

        for (w, val) in self.weights.iter().zip(values[..n * dim].chunks_exact(dim)) {
            consume(*w, val);
        }
    }

    /// Add the integral of `func` over the simplex to `out`.
    ///
    /// `measure` is the area (triangles) or volume (tetrahedra)
    /// the weights are scaled by.
    /// It is passed in rather than computed from the vertices
    /// so that callers can reuse precomputed geometry.
    pub fn integrate(
        &self,
        time: f64,
        vertices: [Vec3; N],
        measure: f64,
        func: &dyn AnalyticFunction,
        out: &mut [f64],
    ) {
        self.for_each_value(time, vertices, func, |w, val| {
            for (o, v) in out.iter_mut().zip(val) {
                *o += measure * w * v;
            }
        });
    }
}

const ONE_THIRD: f64 = 1. / 3.;
const ONE_SIXTH: f64 = 1. / 6.;

const TRIA_1PT: SimplexRule<3> = SimplexRule {
    points: &[[ONE_THIRD, ONE_THIRD, ONE_THIRD]],
    weights: &[1.],
    degree: 1,
};

const TRIA_3PTS: SimplexRule<3> = SimplexRule {
    points: &[
        [2. / 3., ONE_SIXTH, ONE_SIXTH],
        [ONE_SIXTH, 2. / 3., ONE_SIXTH],
        [ONE_SIXTH, ONE_SIXTH, 2. / 3.],
    ],
    weights: &[ONE_THIRD, ONE_THIRD, ONE_THIRD],
    degree: 2,
};

const TRIA_4PTS: SimplexRule<3> = SimplexRule {
    points: &[
        [ONE_THIRD, ONE_THIRD, ONE_THIRD],
        [0.6, 0.2, 0.2],
        [0.2, 0.6, 0.2],
        [0.2, 0.2, 0.6],
    ],
    weights: &[-27. / 48., 25. / 48., 25. / 48., 25. / 48.],
    degree: 3,
};

const TET_1PT: SimplexRule<4> = SimplexRule {
    points: &[[0.25, 0.25, 0.25, 0.25]],
    weights: &[1.],
    degree: 1,
};

// alpha = (5 + 3 sqrt(5)) / 20, beta = (5 - sqrt(5)) / 20
const TET_A: f64 = 0.5854101966249685;
const TET_B: f64 = 0.1381966011250105;

const TET_4PTS: SimplexRule<4> = SimplexRule {
    points: &[
        [TET_A, TET_B, TET_B, TET_B],
        [TET_B, TET_A, TET_B, TET_B],
        [TET_B, TET_B, TET_A, TET_B],
        [TET_B, TET_B, TET_B, TET_A],
    ],
    weights: &[0.25, 0.25, 0.25, 0.25],
    degree: 2,
};

const TET_5PTS: SimplexRule<4> = SimplexRule {
    points: &[
        [0.25, 0.25, 0.25, 0.25],
        [0.5, ONE_SIXTH, ONE_SIXTH, ONE_SIXTH],
        [ONE_SIXTH, 0.5, ONE_SIXTH, ONE_SIXTH],
        [ONE_SIXTH, ONE_SIXTH, 0.5, ONE_SIXTH],
        [ONE_SIXTH, ONE_SIXTH, ONE_SIXTH, 0.5],
    ],
    weights: &[-0.8, 0.45, 0.45, 0.45, 0.45],
    degree: 3,
};

// indexed by `QuadratureType as usize`
static TRIANGLE_RULES: [&SimplexRule<3>; 4] = [&TRIA_1PT, &TRIA_1PT, &TRIA_3PTS, &TRIA_4PTS];
static TETRA_RULES: [&SimplexRule<4>; 4] = [&TET_1PT, &TET_1PT, &TET_4PTS, &TET_5PTS];

/// Check that a quantity has one of the supported arities
/// (scalar, vector or tensor).
#[inline]
pub(crate) fn check_dim(operation: &'static str, dim: usize) -> Result<()> {
    match dim {
        1 | 3 | 9 => Ok(()),
        _ => Err(EvalError::InvalidDimension { operation, dim }),
    }
}

/// Look up the triangle rule for a level and an arity.
pub fn triangle_rule(quadrature: QuadratureType, dim: usize) -> Result<&'static SimplexRule<3>> {
    check_dim("triangle_rule", dim)?;
    Ok(TRIANGLE_RULES[quadrature as usize])
}

/// Look up the tetrahedron rule for a level and an arity.
pub fn tetra_rule(quadrature: QuadratureType, dim: usize) -> Result<&'static SimplexRule<4>> {
    check_dim("tetra_rule", dim)?;
    Ok(TETRA_RULES[quadrature as usize])
}

/// Number of points used by the rule of a level on a simplex type.
pub fn rule_size(quadrature: QuadratureType, simplex: SimplexKind) -> usize {
    match simplex {
        SimplexKind::Triangle => TRIANGLE_RULES[quadrature as usize].n_points(),
        SimplexKind::Tetrahedron => TETRA_RULES[quadrature as usize].n_points(),
    }
}
