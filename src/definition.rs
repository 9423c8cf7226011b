//! Definitions of physical quantities.
//!
//! A [`Definition`] pairs the mesh location a quantity applies to
//! (its [`Support`]) with the way its values are provided:
//! a constant [`Value`], an [`AnalyticFunction`] of time and position,
//! an [`ArrayInput`] referencing precomputed values,
//! or a [`FieldInput`] referencing an externally owned field.
//! Definitions never own the buffers they reference
//! and cannot be changed once built.
//!
//! # Examples
//!
//! ```
//! # use meshdef::{Definition, Pointwise, Support, Value, Vec3};
//! # use nalgebra as na;
//! let gravity = Definition::by_value(Support::Cell, Value::Vector(Vec3::new(0., 0., -9.81)));
//! assert_eq!(gravity.dim(), 3);
//!
//! let source = Pointwise(|t: f64, x: &Vec3| na::Vector1::new(t * x.x));
//! let source_def = Definition::by_analytic(Support::Cell, &source);
//! assert_eq!(source_def.dim(), 1);
//! ```

use nalgebra as na;

use crate::{selection::Selection, Mat3, Vec3};

/// A location on the mesh where values can be attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Support {
    /// Primal cells, values attached to cell centers.
    Cell,
    /// Primal vertices.
    Vertex,
    /// Every primal face, interior and boundary.
    Face,
    /// Faces on the mesh boundary only.
    BoundaryFace,
    /// Dual faces stored cell by cell:
    /// one value per (cell, edge) pair, ordered like the cell's edges.
    DualFaceByCell,
}

/// The way a definition provides its values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DefinitionKind {
    /// A constant.
    Value,
    /// A function of time and position.
    Analytic,
    /// An array of precomputed values.
    Array,
    /// An externally owned field.
    Field,
}

/// A constant scalar, vector or tensor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// One component.
    Scalar(f64),
    /// Three components.
    Vector(Vec3),
    /// Nine components, written out row by row.
    Tensor(Mat3),
}

impl Value {
    /// Number of components.
    #[inline]
    pub fn dim(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Vector(_) => 3,
            Value::Tensor(_) => 9,
        }
    }

    /// Write the components into the first `dim` entries of `out`.
    /// Tensors are written in row-major order.
    #[inline]
    pub fn write_to(&self, out: &mut [f64]) {
        match self {
            Value::Scalar(s) => out[0] = *s,
            Value::Vector(v) => out[..3].copy_from_slice(v.as_slice()),
            Value::Tensor(m) => {
                for i in 0..3 {
                    for j in 0..3 {
                        out[3 * i + j] = m[(i, j)];
                    }
                }
            }
        }
    }
}

/// A quantity computed on demand from time and position.
///
/// Implementors evaluate a batch of points at once.
/// The point of the `i`th evaluation is `coords[selection.source(i)]`
/// and its `dim()` components go to
/// `out[dim * selection.target(i)..dim * (selection.target(i) + 1)]`,
/// the same addressing contract as every bulk evaluation.
///
/// Any context the function needs is captured by the implementor itself.
/// For the common case of a closure evaluated point by point, use [`Pointwise`].
pub trait AnalyticFunction: Send + Sync {
    /// Number of components produced per point (1, 3 or 9).
    fn dim(&self) -> usize;

    /// Evaluate at the selected points.
    fn evaluate(&self, time: f64, coords: &[Vec3], selection: Selection<'_>, out: &mut [f64]);
}

/// An [`AnalyticFunction`] evaluating a closure at each point.
///
/// The closure takes the time and a position
/// and returns the `DIM` components of the quantity there
/// (tensors as 9-vectors in row-major order).
///
/// See the [module-level docs][self] for an example.
#[derive(Clone)]
pub struct Pointwise<const DIM: usize, F>(pub F)
where
    F: Fn(f64, &Vec3) -> na::SVector<f64, DIM> + Send + Sync;

impl<const DIM: usize, F> AnalyticFunction for Pointwise<DIM, F>
where
    F: Fn(f64, &Vec3) -> na::SVector<f64, DIM> + Send + Sync,
{
    #[inline]
    fn dim(&self) -> usize {
        DIM
    }

    fn evaluate(&self, time: f64, coords: &[Vec3], selection: Selection<'_>, out: &mut [f64]) {
        selection.for_each(DIM, out, |entity, slot| {
            slot.copy_from_slice(self.0(time, &coords[entity]).as_slice());
        });
    }
}

/// Values stored in a caller-owned array.
#[derive(Clone, Copy, Debug)]
pub struct ArrayInput<'a> {
    /// Interlaced values, `stride` per entity.
    pub values: &'a [f64],
    /// Number of values per entity.
    /// Arrays on dual faces hold one value (a flux) per dual face.
    pub stride: usize,
    /// Where the values live.
    pub location: Support,
    /// Start of each cell's block of values
    /// for supports with a variable number of entries per cell
    /// (`index[c]..index[c + 1]` for cell `c`).
    pub index: Option<&'a [usize]>,
}

impl<'a> ArrayInput<'a> {
    /// Reference an array of values with a fixed number of entries per entity.
    #[inline]
    pub fn new(values: &'a [f64], stride: usize, location: Support) -> Self {
        Self {
            values,
            stride,
            location,
            index: None,
        }
    }

    /// Reference an array of values stored in per-cell blocks.
    #[inline]
    pub fn with_index(mut self, index: &'a [usize]) -> Self {
        self.index = Some(index);
        self
    }

    /// Values of one entity.
    #[inline]
    pub(crate) fn entity(&self, id: usize) -> &'a [f64] {
        &self.values[self.stride * id..self.stride * (id + 1)]
    }

    /// The block of values belonging to cell `c`.
    #[inline]
    pub(crate) fn cell_block(&self, c: usize) -> &'a [f64] {
        let index = self
            .index
            .expect("array stored by cell blocks needs an index");
        &self.values[index[c]..index[c + 1]]
    }
}

/// Values of a field owned by someone else.
#[derive(Clone, Copy, Debug)]
pub struct FieldInput<'a> {
    /// Number of components per entity.
    pub dim: usize,
    /// Where the field lives (cells or vertices).
    pub location: Support,
    /// Interlaced values, `dim` per entity.
    pub values: &'a [f64],
}

impl<'a> FieldInput<'a> {
    /// Values of one entity.
    #[inline]
    pub(crate) fn entity(&self, id: usize) -> &'a [f64] {
        &self.values[self.dim * id..self.dim * (id + 1)]
    }
}

/// The data behind a definition.
#[derive(Clone, Copy)]
pub enum Payload<'a> {
    /// See [`Value`].
    Value(Value),
    /// See [`AnalyticFunction`].
    Analytic(&'a dyn AnalyticFunction),
    /// See [`ArrayInput`].
    Array(ArrayInput<'a>),
    /// See [`FieldInput`].
    Field(FieldInput<'a>),
}

/// How a quantity is provided and where it applies.
///
/// See the [module-level docs][self] for details.
#[derive(Clone, Copy)]
pub struct Definition<'a> {
    support: Support,
    payload: Payload<'a>,
}

impl<'a> Definition<'a> {
    /// Define a quantity by a constant.
    pub fn by_value(support: Support, value: Value) -> Self {
        Self {
            support,
            payload: Payload::Value(value),
        }
    }

    /// Define a quantity by an analytic function.
    pub fn by_analytic(support: Support, func: &'a dyn AnalyticFunction) -> Self {
        Self {
            support,
            payload: Payload::Analytic(func),
        }
    }

    /// Define a quantity by an array of values.
    pub fn by_array(support: Support, array: ArrayInput<'a>) -> Self {
        Self {
            support,
            payload: Payload::Array(array),
        }
    }

    /// Define a quantity by an external field.
    pub fn by_field(support: Support, field: FieldInput<'a>) -> Self {
        Self {
            support,
            payload: Payload::Field(field),
        }
    }

    /// Where the definition applies.
    #[inline]
    pub fn support(&self) -> Support {
        self.support
    }

    /// The data behind the definition.
    #[inline]
    pub fn payload(&self) -> &Payload<'a> {
        &self.payload
    }

    /// How the values are provided.
    #[inline]
    pub fn kind(&self) -> DefinitionKind {
        match self.payload {
            Payload::Value(_) => DefinitionKind::Value,
            Payload::Analytic(_) => DefinitionKind::Analytic,
            Payload::Array(_) => DefinitionKind::Array,
            Payload::Field(_) => DefinitionKind::Field,
        }
    }

    /// Number of components of the quantity.
    ///
    /// Arrays of dual face fluxes define a vector quantity.
    pub fn dim(&self) -> usize {
        match &self.payload {
            Payload::Value(v) => v.dim(),
            Payload::Analytic(f) => f.dim(),
            Payload::Array(a) if a.location == Support::DualFaceByCell => 3,
            Payload::Array(a) => a.stride,
            Payload::Field(f) => f.dim,
        }
    }
}

impl<'a> std::fmt::Debug for Definition<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "definition by {:?} on {:?}, dimension {}",
            self.kind(),
            self.support,
            self.dim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_values_are_row_major() {
        #[rustfmt::skip]
        let m = Mat3::new(
            1., 2., 3.,
            4., 5., 6.,
            7., 8., 9.,
        );
        let mut out = [0.; 9];
        Value::Tensor(m).write_to(&mut out);
        assert_eq!(out, [1., 2., 3., 4., 5., 6., 7., 8., 9.]);
    }

    #[test]
    fn kinds_and_dimensions() {
        let values = [0.; 12];
        let index = [0, 6, 12];
        let f = Pointwise(|_t: f64, x: &Vec3| *x);

        let defs = [
            Definition::by_value(Support::Cell, Value::Scalar(1.)),
            Definition::by_analytic(Support::Vertex, &f),
            Definition::by_array(Support::Cell, ArrayInput::new(&values, 3, Support::Vertex)),
            Definition::by_array(
                Support::Cell,
                ArrayInput::new(&values, 1, Support::DualFaceByCell).with_index(&index),
            ),
            Definition::by_field(
                Support::Cell,
                FieldInput {
                    dim: 9,
                    location: Support::Cell,
                    values: &values,
                },
            ),
        ];
        let kinds: Vec<_> = defs.iter().map(|d| d.kind()).collect();
        assert_eq!(
            kinds,
            [
                DefinitionKind::Value,
                DefinitionKind::Analytic,
                DefinitionKind::Array,
                DefinitionKind::Array,
                DefinitionKind::Field,
            ]
        );
        let dims: Vec<_> = defs.iter().map(|d| d.dim()).collect();
        assert_eq!(dims, [1, 3, 3, 3, 9]);
        assert_eq!(defs[1].support(), Support::Vertex);
    }

    #[test]
    fn pointwise_follows_selection() {
        let coords: Vec<Vec3> = (0..4).map(|i| Vec3::new(i as f64, 0., 0.)).collect();
        let f = Pointwise(|t: f64, x: &Vec3| na::Vector2::new(x.x, t));

        let mut compact = [0.; 4];
        f.evaluate(2., &coords, Selection::Compact(&[3, 1]), &mut compact);
        assert_eq!(compact, [3., 2., 1., 2.]);

        let mut scattered = [0.; 8];
        f.evaluate(2., &coords, Selection::Scattered(&[3, 1]), &mut scattered);
        assert_eq!(scattered, [0., 0., 1., 2., 0., 0., 3., 2.]);
    }
}
