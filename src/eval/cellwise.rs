//! Evaluation of definitions inside a single cell.
//!
//! Every routine reads the cell from a [`CellMesh`]
//! and asserts the [`CellFlag`]s it needs.
//! Results overwrite the first `dim` entries of the output
//! (`dim * n` for evaluations at `n` points or faces).

use crate::{
    cell_mesh::{CellFlag, CellMesh},
    definition::{AnalyticFunction, ArrayInput, Definition, FieldInput, Payload, Value},
    error::{EvalError, Result},
    quadrature::{self, QuadratureType},
    reco,
    selection::Selection,
    Support, Vec3,
};

use super::integrate;

/// Value of a definition for the cell, at its center.
pub fn cell_value(def: &Definition, cm: &CellMesh, time: f64, out: &mut [f64]) -> Result<()> {
    log::trace!("cell value of {def:?} in cell {}", cm.c_id);
    match def.payload() {
        Payload::Value(value) => {
            cell_by_value(value, out);
            Ok(())
        }
        Payload::Analytic(func) => {
            cell_by_analytic(*func, cm, time, out);
            Ok(())
        }
        Payload::Array(array) => cell_by_array(array, cm, out),
        Payload::Field(field) => cell_by_field(field, cm, out),
    }
}

/// Write a constant.
#[inline]
pub fn cell_by_value(value: &Value, out: &mut [f64]) {
    value.write_to(out);
}

/// Evaluate an analytic function at the cell center.
#[inline]
pub fn cell_by_analytic(func: &dyn AnalyticFunction, cm: &CellMesh, time: f64, out: &mut [f64]) {
    func.evaluate(time, &[cm.xc], Selection::All(1), out);
}

/// Cell value of an array.
///
/// Cell arrays are read directly.
/// Vertex arrays are interpolated with the vertex weights of the cell (`Pvq`)
/// and dual face arrays are reconstructed from the edges of the cell (`Peq`).
pub fn cell_by_array(array: &ArrayInput, cm: &CellMesh, out: &mut [f64]) -> Result<()> {
    match array.location {
        Support::Cell => {
            out[..array.stride].copy_from_slice(array.entity(cm.c_id));
        }
        Support::Vertex => reco::vertex_in_cell(cm, array.values, array.stride, out),
        Support::DualFaceByCell => reco::dual_faces_in_cell(cm, array.cell_block(cm.c_id), out),
        support => {
            return Err(EvalError::UnsupportedSupport {
                operation: "cell_by_array",
                support,
            })
        }
    }
    Ok(())
}

/// Cell value of a field on cells or vertices.
pub fn cell_by_field(field: &FieldInput, cm: &CellMesh, out: &mut [f64]) -> Result<()> {
    match field.location {
        Support::Cell => out[..field.dim].copy_from_slice(field.entity(cm.c_id)),
        Support::Vertex => reco::vertex_in_cell(cm, field.values, field.dim, out),
        support => {
            return Err(EvalError::UnsupportedSupport {
                operation: "cell_by_field",
                support,
            })
        }
    }
    Ok(())
}

//
// evaluation at points
//

/// Value of a definition at points inside the cell.
///
/// `out` receives `dim` values per point.
/// Analytic functions are evaluated at each point;
/// the other kinds give every point the same value,
/// the constant or the cell value of the array or field.
pub fn at_points(
    def: &Definition,
    cm: &CellMesh,
    points: &[Vec3],
    time: f64,
    out: &mut [f64],
) -> Result<()> {
    log::trace!("{def:?} at {} points in cell {}", points.len(), cm.c_id);
    match def.payload() {
        Payload::Analytic(func) => {
            at_points_by_analytic(*func, points, time, out);
            Ok(())
        }
        Payload::Value(value) => {
            at_points_by_value(value, points.len(), out);
            Ok(())
        }
        Payload::Array(array) => at_points_by_array(array, cm, points.len(), out),
        Payload::Field(field) => at_points_by_field(field, cm, points.len(), out),
    }
}

/// Evaluate an analytic function at each point.
#[inline]
pub fn at_points_by_analytic(
    func: &dyn AnalyticFunction,
    points: &[Vec3],
    time: f64,
    out: &mut [f64],
) {
    func.evaluate(time, points, Selection::All(points.len()), out);
}

/// Give a constant of any arity to `n_points` points.
pub fn at_points_by_value(value: &Value, n_points: usize, out: &mut [f64]) {
    let dim = value.dim();
    for point in out[..dim * n_points].chunks_exact_mut(dim) {
        value.write_to(point);
    }
}

/// Give the cell value of an array to `n_points` points.
///
/// Each point receives `stride` values,
/// or 3 for arrays of dual face fluxes.
pub fn at_points_by_array(
    array: &ArrayInput,
    cm: &CellMesh,
    n_points: usize,
    out: &mut [f64],
) -> Result<()> {
    let dim = match array.location {
        Support::DualFaceByCell => 3,
        _ => array.stride,
    };
    if n_points == 0 {
        return Ok(());
    }
    cell_by_array(array, cm, &mut out[..dim])?;
    repeat_first_point(dim, n_points, out);
    Ok(())
}

/// Give the cell value of a field to `n_points` points.
pub fn at_points_by_field(
    field: &FieldInput,
    cm: &CellMesh,
    n_points: usize,
    out: &mut [f64],
) -> Result<()> {
    if n_points == 0 {
        return Ok(());
    }
    cell_by_field(field, cm, &mut out[..field.dim])?;
    repeat_first_point(field.dim, n_points, out);
    Ok(())
}

/// Copy the `dim` values of the first point to the next `n_points - 1` points.
fn repeat_first_point(dim: usize, n_points: usize, out: &mut [f64]) {
    for i in 1..n_points {
        out.copy_within(0..dim, dim * i);
    }
}

/// Give a constant vector to `n_points` points.
pub fn vector_at_points_by_value(value: &Vec3, n_points: usize, out: &mut [f64]) {
    at_points_by_value(&Value::Vector(*value), n_points, out);
}

/// [`at_points_by_array`] restricted to vector-valued arrays.
pub fn vector_at_points_by_array(
    array: &ArrayInput,
    cm: &CellMesh,
    n_points: usize,
    out: &mut [f64],
) -> Result<()> {
    if array.location != Support::DualFaceByCell && array.stride != 3 {
        return Err(EvalError::InvalidDimension {
            operation: "vector_at_points_by_array",
            dim: array.stride,
        });
    }
    at_points_by_array(array, cm, n_points, out)
}

/// [`at_points_by_field`] restricted to vector-valued fields.
pub fn vector_at_points_by_field(
    field: &FieldInput,
    cm: &CellMesh,
    n_points: usize,
    out: &mut [f64],
) -> Result<()> {
    if field.dim != 3 {
        return Err(EvalError::InvalidDimension {
            operation: "vector_at_points_by_field",
            dim: field.dim,
        });
    }
    at_points_by_field(field, cm, n_points, out)
}

//
// averages
//

/// Mean value of a definition over face `f` of the cell.
///
/// Constants are returned as is;
/// analytic functions are integrated over the face with the given quadrature.
pub fn face_average(
    def: &Definition,
    cm: &CellMesh,
    f: usize,
    time: f64,
    quadrature: QuadratureType,
    out: &mut [f64],
) -> Result<()> {
    match def.payload() {
        Payload::Value(value) => {
            value.write_to(out);
            Ok(())
        }
        Payload::Analytic(func) => {
            let dim = func.dim();
            let q_tri = quadrature::triangle_rule(quadrature, dim)?;
            let out = &mut out[..dim];
            out.fill(0.);
            integrate::integrate_on_face(cm, f, time, *func, q_tri, out);
            let inv_area = 1. / cm.face[f].meas;
            out.iter_mut().for_each(|o| *o *= inv_area);
            Ok(())
        }
        _ => Err(EvalError::UnsupportedKind {
            operation: "face_average",
            kind: def.kind(),
        }),
    }
}

/// Mean value of a definition over the cell.
pub fn cell_average(
    def: &Definition,
    cm: &CellMesh,
    time: f64,
    quadrature: QuadratureType,
    out: &mut [f64],
) -> Result<()> {
    match def.payload() {
        Payload::Value(value) => {
            value.write_to(out);
            Ok(())
        }
        Payload::Analytic(func) => {
            let dim = func.dim();
            let q_tet = quadrature::tetra_rule(quadrature, dim)?;
            let out = &mut out[..dim];
            out.fill(0.);
            integrate::integrate_on_cell(cm, time, *func, q_tet, out);
            let inv_vol = 1. / cm.vol_c;
            out.iter_mut().for_each(|o| *o *= inv_vol);
            Ok(())
        }
        _ => Err(EvalError::UnsupportedKind {
            operation: "cell_average",
            kind: def.kind(),
        }),
    }
}

/// Mean values over every face of the cell and over the cell itself,
/// computed in a single pass.
///
/// `out` receives the `dim` components of each face average in face order,
/// followed by the `dim` components of the cell average.
pub fn average_reduction(
    def: &Definition,
    cm: &CellMesh,
    time: f64,
    quadrature: QuadratureType,
    out: &mut [f64],
) -> Result<()> {
    let n_fc = cm.n_fc();
    match def.payload() {
        Payload::Value(value) => {
            let dim = value.dim();
            for slot in out[..dim * (n_fc + 1)].chunks_exact_mut(dim) {
                value.write_to(slot);
            }
            Ok(())
        }
        Payload::Analytic(func) => {
            let dim = func.dim();
            let q_tet = quadrature::tetra_rule(quadrature, dim)?;
            let q_tri = quadrature::triangle_rule(quadrature, dim)?;
            cm.requires(&[CellFlag::Pfq]);

            let out = &mut out[..dim * (n_fc + 1)];
            out.fill(0.);
            let (f_int, c_int) = out.split_at_mut(dim * n_fc);
            integrate::integrate_on_cell_faces(cm, time, *func, q_tet, q_tri, c_int, f_int);

            for (face_avg, fq) in f_int.chunks_exact_mut(dim).zip(&cm.face) {
                let inv_area = 1. / fq.meas;
                face_avg.iter_mut().for_each(|o| *o *= inv_area);
            }
            let inv_vol = 1. / cm.vol_c;
            c_int.iter_mut().for_each(|o| *o *= inv_vol);
            Ok(())
        }
        _ => Err(EvalError::UnsupportedKind {
            operation: "average_reduction",
            kind: def.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cell_mesh::CellFlags,
        definition::DefinitionKind,
        mesh::{tiny_column, tiny_cube, tiny_prism, tiny_tetra, MeshQuantities},
        Mat3, Pointwise,
    };
    use approx::assert_relative_eq;
    use nalgebra as na;

    const LEVELS: [QuadratureType; 4] = [
        QuadratureType::Bary,
        QuadratureType::BarySubdiv,
        QuadratureType::Higher,
        QuadratureType::Highest,
    ];

    #[test]
    fn constants_are_exact_everywhere() {
        let mesh = tiny_prism();
        let cm = CellMesh::build(&mesh, 0, CellFlags::all());
        let u = Vec3::new(1., -2., 0.5);
        let by_value = Definition::by_value(Support::Cell, Value::Vector(u));
        let constant = Pointwise(move |_t: f64, _x: &Vec3| u);
        let by_analytic = Definition::by_analytic(Support::Cell, &constant);

        for def in [by_value, by_analytic] {
            for level in LEVELS {
                let mut avg = [0.; 3];
                cell_average(&def, &cm, 0., level, &mut avg).unwrap();
                assert_relative_eq!(Vec3::from(avg), u, epsilon = 1e-13);

                for f in 0..cm.n_fc() {
                    face_average(&def, &cm, f, 0., level, &mut avg).unwrap();
                    assert_relative_eq!(Vec3::from(avg), u, epsilon = 1e-13);
                }

                let mut reduction = vec![0.; 3 * (cm.n_fc() + 1)];
                average_reduction(&def, &cm, 0., level, &mut reduction).unwrap();
                for avg in reduction.chunks_exact(3) {
                    assert_relative_eq!(Vec3::from_column_slice(avg), u, epsilon = 1e-13);
                }
            }

            let points = [Vec3::zeros(), Vec3::new(0.2, 0.2, 0.5), Vec3::z()];
            let mut at = [0.; 9];
            at_points(&def, &cm, &points, 0., &mut at).unwrap();
            for p in at.chunks_exact(3) {
                assert_relative_eq!(Vec3::from_column_slice(p), u, epsilon = 1e-15);
            }
        }
    }

    /// Every component of every point is written
    /// with the same stride, including the third.
    #[test]
    fn vector_at_points_fills_every_triple() {
        let mut out = [f64::NAN; 9];
        vector_at_points_by_value(&Vec3::new(1., 2., 3.), 3, &mut out);
        assert_eq!(out, [1., 2., 3., 1., 2., 3., 1., 2., 3.]);

        let mesh = tiny_column(3);
        let cm = CellMesh::build(&mesh, 2, CellFlags::all());
        let cell_values: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let array = ArrayInput::new(&cell_values, 3, Support::Cell);
        let mut out = [f64::NAN; 12];
        vector_at_points_by_array(&array, &cm, 4, &mut out).unwrap();
        for p in out.chunks_exact(3) {
            assert_eq!(p, [6., 7., 8.]);
        }
    }

    #[test]
    fn averages_of_polynomials() {
        let mesh = tiny_cube();
        let cm = CellMesh::build(&mesh, 0, CellFlags::all());
        let square = Pointwise(|_t: f64, x: &Vec3| na::Vector1::new(x.y * x.y));
        let def = Definition::by_analytic(Support::Cell, &square);

        let mut avg = [0.];
        cell_average(&def, &cm, 0., QuadratureType::Higher, &mut avg).unwrap();
        assert_relative_eq!(avg[0], 1. / 3., epsilon = 1e-14);
        // the barycenter rule is only exact for linear functions
        cell_average(&def, &cm, 0., QuadratureType::Bary, &mut avg).unwrap();
        assert!((avg[0] - 1. / 3.).abs() > 1e-3);

        let mut reduction = [0.; 7];
        average_reduction(&def, &cm, 0., QuadratureType::Higher, &mut reduction).unwrap();
        assert_relative_eq!(reduction[6], 1. / 3., epsilon = 1e-14);
        for f in 0..6 {
            let mut face_avg = [0.];
            face_average(&def, &cm, f, 0., QuadratureType::Higher, &mut face_avg).unwrap();
            assert_relative_eq!(reduction[f], face_avg[0], epsilon = 1e-14);
            let fq = cm.face[f];
            let exact = if fq.unitv.y.abs() > 0.5 {
                fq.center.y * fq.center.y
            } else {
                1. / 3.
            };
            assert_relative_eq!(face_avg[0], exact, epsilon = 1e-14);
        }
    }

    #[test]
    fn tensor_averages() {
        let mesh = tiny_tetra();
        let cm = CellMesh::build(&mesh, 0, CellFlags::all());
        let func = Pointwise(|t: f64, x: &Vec3| {
            let m = Mat3::identity() * (t + x.x);
            na::SVector::<f64, 9>::from_column_slice(m.as_slice())
        });
        let def = Definition::by_analytic(Support::Cell, &func);
        let mut avg = [0.; 9];
        cell_average(&def, &cm, 1., QuadratureType::Highest, &mut avg).unwrap();
        // mean of x over the tetrahedron is 1/4
        assert_relative_eq!(avg[0], 1.25, epsilon = 1e-14);
        assert_relative_eq!(avg[4], 1.25, epsilon = 1e-14);
        assert_relative_eq!(avg[1], 0., epsilon = 1e-14);
    }

    #[test]
    fn cell_values_from_other_supports() {
        let mesh = tiny_column(2);
        let cm = CellMesh::build(&mesh, 1, CellFlags::all());

        let vertex_values: Vec<f64> = mesh.vertex_coords().iter().map(|x| x.z).collect();
        let array = ArrayInput::new(&vertex_values, 1, Support::Vertex);
        let mut out = [0.];
        cell_by_array(&array, &cm, &mut out).unwrap();
        assert_relative_eq!(out[0], 1.5, epsilon = 1e-14);

        let field = FieldInput {
            dim: 1,
            location: Support::Vertex,
            values: &vertex_values,
        };
        cell_by_field(&field, &cm, &mut out).unwrap();
        assert_relative_eq!(out[0], 1.5, epsilon = 1e-14);

        let bad = ArrayInput::new(&vertex_values, 1, Support::Face);
        assert_eq!(
            cell_by_array(&bad, &cm, &mut out),
            Err(EvalError::UnsupportedSupport {
                operation: "cell_by_array",
                support: Support::Face,
            })
        );
    }

    #[test]
    fn unsupported_kinds_and_dimensions() {
        let mesh = tiny_cube();
        let cm = CellMesh::build(&mesh, 0, CellFlags::all());
        let values = [0.; 8];
        let field = FieldInput {
            dim: 1,
            location: Support::Cell,
            values: &values,
        };
        let def = Definition::by_field(Support::Cell, field);
        let mut out = [0.; 8];
        assert_eq!(
            cell_average(&def, &cm, 0., QuadratureType::Bary, &mut out),
            Err(EvalError::UnsupportedKind {
                operation: "cell_average",
                kind: DefinitionKind::Field,
            })
        );
        assert!(matches!(
            vector_at_points_by_field(&field, &cm, 1, &mut out),
            Err(EvalError::InvalidDimension { dim: 1, .. })
        ));
    }

    #[test]
    fn constants_of_every_arity_at_points() {
        let mesh = tiny_cube();
        let cm = CellMesh::build(&mesh, 0, CellFlags::all());
        let points = [Vec3::new(0.1, 0.2, 0.3), Vec3::new(0.9, 0.5, 0.5)];
        let tensor = Mat3::new(1., 2., 3., 4., 5., 6., 7., 8., 9.);

        for value in [
            Value::Scalar(2.),
            Value::Vector(Vec3::new(1., -1., 0.5)),
            Value::Tensor(tensor),
        ] {
            let def = Definition::by_value(Support::Cell, value);
            let dim = value.dim();
            let mut expected = [0.; 9];
            value.write_to(&mut expected[..dim]);

            let mut out = vec![f64::NAN; dim * points.len()];
            at_points(&def, &cm, &points, 0., &mut out).unwrap();
            for p in out.chunks_exact(dim) {
                assert_eq!(p, &expected[..dim]);
            }
        }
    }

    #[test]
    fn arrays_and_fields_of_any_stride_at_points() {
        let mesh = tiny_column(2);
        let cm = CellMesh::build(&mesh, 1, CellFlags::all());
        let points = [Vec3::new(0.5, 0.5, 1.2), Vec3::new(0.5, 0.5, 1.8), Vec3::zeros()];

        // scalar vertex array, interpolated to the cell center
        let heights: Vec<f64> = mesh.vertex_coords().iter().map(|x| x.z).collect();
        let def = Definition::by_array(
            Support::Cell,
            ArrayInput::new(&heights, 1, Support::Vertex),
        );
        let mut out = [f64::NAN; 3];
        at_points(&def, &cm, &points, 0., &mut out).unwrap();
        for v in out {
            assert_relative_eq!(v, 1.5, epsilon = 1e-14);
        }

        // scalar cell field
        let per_cell = [10., 20.];
        let def = Definition::by_field(
            Support::Cell,
            FieldInput {
                dim: 1,
                location: Support::Cell,
                values: &per_cell,
            },
        );
        at_points(&def, &cm, &points, 0., &mut out).unwrap();
        assert_eq!(out, [20., 20., 20.]);

        // dual face fluxes give a vector per point
        let u = Vec3::new(0.5, -1., 2.);
        let mut fluxes = Vec::new();
        let mut index = vec![0];
        for c in 0..mesh.n_cells() {
            fluxes.extend(mesh.cell_dual_faces(c).iter().map(|df| df.dot(&u)));
            index.push(fluxes.len());
        }
        let def = Definition::by_array(
            Support::Cell,
            ArrayInput::new(&fluxes, 1, Support::DualFaceByCell).with_index(&index),
        );
        let mut out = [f64::NAN; 9];
        at_points(&def, &cm, &points, 0., &mut out).unwrap();
        for p in out.chunks_exact(3) {
            assert_relative_eq!(Vec3::from_column_slice(p), u, epsilon = 1e-12);
        }
    }
}
