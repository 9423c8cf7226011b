//! Normal fluxes of vector and tensor quantities through cell faces.
//!
//! Fluxes are taken along the unit normal stored for the face
//! (`cm.face[f].unitv`), independently of the face's orientation
//! relative to the cell. Multiply by `cm.f_sgn[f]` for outward fluxes.
//!
//! Analytic quantities are evaluated at quadrature points
//! and projected on the normal before being summed:
//! - `Bary`: one evaluation at the cell center.
//! - `BarySubdiv`: one evaluation at the centroid of each triangle
//!   of the face subdivision.
//! - `Higher`, `Highest`: the triangle rule of that level
//!   on each triangle of the subdivision.
//!
//! The subdivision of a face has one triangle per edge,
//! formed by the edge and the face center.
//! For fluxes split between vertices, each of these triangles is halved again
//! at the edge midpoint, the half touching a vertex going to that vertex.

use crate::{
    cell_mesh::{CellFlag, CellMesh},
    definition::{AnalyticFunction, Definition, Payload, Value},
    error::{EvalError, Result},
    quadrature::{self, QuadratureType},
    selection::Selection,
    Mat3, Vec3,
};

/// Flux of a vector quantity through face `f` of the cell.
pub fn face_flux(
    def: &Definition,
    cm: &CellMesh,
    f: usize,
    time: f64,
    quadrature: QuadratureType,
) -> Result<f64> {
    const OP: &str = "face_flux";
    log::trace!("flux of {def:?} through face {f} of cell {}", cm.c_id);
    match def.payload() {
        Payload::Value(Value::Vector(u)) => Ok(face_flux_by_value(cm, f, u)),
        Payload::Analytic(func) if func.dim() == 3 => {
            face_flux_by_analytic(cm, f, time, *func, quadrature)
        }
        Payload::Value(_) | Payload::Analytic(_) => Err(EvalError::InvalidDimension {
            operation: OP,
            dim: def.dim(),
        }),
        _ => Err(EvalError::UnsupportedKind {
            operation: OP,
            kind: def.kind(),
        }),
    }
}

/// Flux of a constant vector through face `f`.
pub fn face_flux_by_value(cm: &CellMesh, f: usize, u: &Vec3) -> f64 {
    cm.requires(&[CellFlag::Pfq]);
    let fq = cm.face[f];
    fq.meas * fq.unitv.dot(u)
}

/// Flux of an analytic vector function through face `f`.
pub fn face_flux_by_analytic(
    cm: &CellMesh,
    f: usize,
    time: f64,
    func: &dyn AnalyticFunction,
    quadrature: QuadratureType,
) -> Result<f64> {
    let mut flux = 0.;
    let mut accumulate = |val: &[f64], coef: f64| {
        flux += coef * cm.face[f].unitv.dot(&Vec3::from_column_slice(val));
    };
    integrate_normal(cm, f, time, func, quadrature, &mut accumulate)?;
    Ok(flux)
}

/// Flux of a tensor quantity through face `f` of the cell,
/// i.e. the integral of the tensor applied to the face normal.
pub fn tensor_face_flux(
    def: &Definition,
    cm: &CellMesh,
    f: usize,
    time: f64,
    quadrature: QuadratureType,
) -> Result<Vec3> {
    const OP: &str = "tensor_face_flux";
    match def.payload() {
        Payload::Value(Value::Tensor(m)) => {
            cm.requires(&[CellFlag::Pfq]);
            let fq = cm.face[f];
            Ok(fq.meas * (m * fq.unitv))
        }
        Payload::Analytic(func) if func.dim() == 9 => {
            let mut flux = Vec3::zeros();
            let mut accumulate = |val: &[f64], coef: f64| {
                // values are stored row by row
                let m = Mat3::from_row_slice(val);
                flux += coef * (m * cm.face[f].unitv);
            };
            integrate_normal(cm, f, time, *func, quadrature, &mut accumulate)?;
            Ok(flux)
        }
        Payload::Value(_) | Payload::Analytic(_) => Err(EvalError::InvalidDimension {
            operation: OP,
            dim: def.dim(),
        }),
        _ => Err(EvalError::UnsupportedKind {
            operation: OP,
            kind: def.kind(),
        }),
    }
}

/// Call `accumulate(value, coefficient)` for each quadrature point of face `f`,
/// the coefficient being the quadrature weight scaled by the measure it covers.
fn integrate_normal(
    cm: &CellMesh,
    f: usize,
    time: f64,
    func: &dyn AnalyticFunction,
    quadrature: QuadratureType,
    accumulate: &mut dyn FnMut(&[f64], f64),
) -> Result<()> {
    cm.requires(&[CellFlag::Pfq]);
    let dim = func.dim();
    let fq = cm.face[f];
    let mut val = [0.; 9];

    match quadrature {
        QuadratureType::Bary => {
            func.evaluate(time, &[cm.xc], Selection::All(1), &mut val[..dim]);
            accumulate(&val[..dim], fq.meas);
        }
        QuadratureType::BarySubdiv => {
            cm.requires(&[CellFlag::Ev, CellFlag::Fe, CellFlag::Feq]);
            for (&e, &tef) in cm.face_edges(f).iter().zip(cm.face_tef(f)) {
                let [x1, x2] = cm.edge_coords(e);
                let centroid = (fq.center + x1 + x2) / 3.;
                func.evaluate(time, &[centroid], Selection::All(1), &mut val[..dim]);
                accumulate(&val[..dim], tef);
            }
        }
        QuadratureType::Higher | QuadratureType::Highest => {
            cm.requires(&[CellFlag::Ev, CellFlag::Fe, CellFlag::Feq]);
            let rule = quadrature::triangle_rule(quadrature, dim)?;
            for (&e, &tef) in cm.face_edges(f).iter().zip(cm.face_tef(f)) {
                let [x1, x2] = cm.edge_coords(e);
                rule.for_each_value(time, [fq.center, x1, x2], func, |w, v| {
                    accumulate(v, w * tef)
                });
            }
        }
    }
    Ok(())
}

/// Flux of a vector quantity through face `f`, split between its vertices.
///
/// The part of the flux going to each vertex is added to
/// `out[local vertex index]`, so `out` needs one entry per cell vertex.
/// Summing these parts over the vertices of the face gives [`face_flux`].
pub fn vertex_flux(
    def: &Definition,
    cm: &CellMesh,
    f: usize,
    time: f64,
    quadrature: QuadratureType,
    out: &mut [f64],
) -> Result<()> {
    const OP: &str = "vertex_flux";
    log::trace!("vertex flux of {def:?} through face {f} of cell {}", cm.c_id);
    assert!(out.len() >= cm.n_vc(), "Output buffer too small for the cell vertices");
    match def.payload() {
        Payload::Value(Value::Vector(u)) => {
            vertex_flux_by_value(cm, f, u, out);
            Ok(())
        }
        Payload::Analytic(func) if func.dim() == 3 => {
            vertex_flux_by_analytic(cm, f, time, *func, quadrature, out)
        }
        Payload::Value(_) | Payload::Analytic(_) => Err(EvalError::InvalidDimension {
            operation: OP,
            dim: def.dim(),
        }),
        _ => Err(EvalError::UnsupportedKind {
            operation: OP,
            kind: def.kind(),
        }),
    }
}

/// Split the flux of a constant vector through face `f` between its vertices.
pub fn vertex_flux_by_value(cm: &CellMesh, f: usize, u: &Vec3, out: &mut [f64]) {
    cm.requires(&[CellFlag::Ev, CellFlag::Fe, CellFlag::Feq]);
    let normal_part = cm.face[f].unitv.dot(u);
    for (&e, &tef) in cm.face_edges(f).iter().zip(cm.face_tef(f)) {
        let half = 0.5 * tef * normal_part;
        let [v1, v2] = cm.e2v[e];
        out[v1] += half;
        out[v2] += half;
    }
}

/// Split the flux of an analytic vector function through face `f`
/// between its vertices.
///
/// The highest quadrature level is not available here.
pub fn vertex_flux_by_analytic(
    cm: &CellMesh,
    f: usize,
    time: f64,
    func: &dyn AnalyticFunction,
    quadrature: QuadratureType,
    out: &mut [f64],
) -> Result<()> {
    cm.requires(&[CellFlag::Ev, CellFlag::Fe, CellFlag::Feq]);
    let fq = cm.face[f];

    match quadrature {
        QuadratureType::Bary => {
            let mut u = [0.; 3];
            func.evaluate(time, &[cm.xc], Selection::All(1), &mut u);
            vertex_flux_by_value(cm, f, &Vec3::from(u), out);
        }
        QuadratureType::BarySubdiv => {
            let mut vals = [0.; 6];
            for (&e, &tef) in cm.face_edges(f).iter().zip(cm.face_tef(f)) {
                let [v1, v2] = cm.e2v[e];
                let [x1, x2] = cm.edge_coords(e);
                let xef = 0.5 * (x1 + x2) + fq.center;
                let centroids = [(xef + x1) / 3., (xef + x2) / 3.];
                func.evaluate(time, &centroids, Selection::All(2), &mut vals);

                let half = 0.5 * tef;
                out[v1] += half * fq.unitv.dot(&Vec3::from_column_slice(&vals[..3]));
                out[v2] += half * fq.unitv.dot(&Vec3::from_column_slice(&vals[3..]));
            }
        }
        QuadratureType::Higher => {
            let rule = quadrature::triangle_rule(quadrature, 3)?;
            for (&e, &tef) in cm.face_edges(f).iter().zip(cm.face_tef(f)) {
                let [v1, v2] = cm.e2v[e];
                let [x1, x2] = cm.edge_coords(e);
                let xe = 0.5 * (x1 + x2);
                let half = 0.5 * tef;
                for (v, xv) in [(v1, x1), (v2, x2)] {
                    rule.for_each_value(time, [xe, fq.center, xv], func, |w, val| {
                        out[v] += w * half * fq.unitv.dot(&Vec3::from_column_slice(val));
                    });
                }
            }
        }
        QuadratureType::Highest => {
            return Err(EvalError::QuadratureNotImplemented {
                operation: "vertex_flux",
                quadrature,
            })
        }
    }
    Ok(())
}
