//! Integration of analytic functions over a cell and its faces.
//!
//! Tetrahedra are integrated directly.
//! Other cells are split into cones from the cell center over each face,
//! and each cone into tetrahedra over a triangulation of the face:
//! triangular faces are used as is,
//! larger faces are split into one triangle per edge around the face center.
//! The same triangles give the face integrals,
//! so a cell and all of its faces are integrated in a single pass.
//!
//! All routines add to their output buffers rather than overwriting them.

use crate::{
    cell_mesh::{CellFlag, CellMesh, CellType},
    definition::AnalyticFunction,
    quadrature::SimplexRule,
};

const NEEDED: &[CellFlag] = &[
    CellFlag::Pvq,
    CellFlag::Pfq,
    CellFlag::Fe,
    CellFlag::Feq,
    CellFlag::Ev,
    CellFlag::Hfc,
];

/// Integrate `func` over the cell and over each of its faces.
///
/// The cell integral is added to `c_int` (`dim` values)
/// and the integral over face `f` to `f_int[dim * f..dim * (f + 1)]`.
pub fn integrate_on_cell_faces(
    cm: &CellMesh,
    time: f64,
    func: &dyn AnalyticFunction,
    q_tet: &SimplexRule<4>,
    q_tri: &SimplexRule<3>,
    c_int: &mut [f64],
    f_int: &mut [f64],
) {
    cm.requires(NEEDED);
    let dim = func.dim();
    assert!(
        c_int.len() >= dim && f_int.len() >= dim * cm.n_fc(),
        "Output buffers too small for the integrals"
    );

    if cm.cell_type == CellType::Tetra {
        let xv = [cm.xv[0], cm.xv[1], cm.xv[2], cm.xv[3]];
        q_tet.integrate(time, xv, cm.vol_c, func, c_int);
        for f in 0..cm.n_fc() {
            let tri = cm.triangle_vertices(f).map(|v| cm.xv[v]);
            q_tri.integrate(time, tri, cm.face[f].meas, func, &mut f_int[dim * f..dim * (f + 1)]);
        }
        return;
    }

    for f in 0..cm.n_fc() {
        let f_out = &mut f_int[dim * f..dim * (f + 1)];
        for_each_cone_piece(cm, f, |tet, tet_vol, tri, tri_area| {
            q_tet.integrate(time, tet, tet_vol, func, c_int);
            q_tri.integrate(time, tri, tri_area, func, f_out);
        });
    }
}

/// Integrate `func` over the cell and add the result to `c_int`.
pub fn integrate_on_cell(
    cm: &CellMesh,
    time: f64,
    func: &dyn AnalyticFunction,
    q_tet: &SimplexRule<4>,
    c_int: &mut [f64],
) {
    cm.requires(NEEDED);
    assert!(c_int.len() >= func.dim(), "Output buffer too small for the integral");

    if cm.cell_type == CellType::Tetra {
        let xv = [cm.xv[0], cm.xv[1], cm.xv[2], cm.xv[3]];
        q_tet.integrate(time, xv, cm.vol_c, func, c_int);
        return;
    }

    for f in 0..cm.n_fc() {
        for_each_cone_piece(cm, f, |tet, tet_vol, _, _| {
            q_tet.integrate(time, tet, tet_vol, func, c_int);
        });
    }
}

/// Integrate `func` over face `f` of the cell and add the result to `f_int`.
pub fn integrate_on_face(
    cm: &CellMesh,
    f: usize,
    time: f64,
    func: &dyn AnalyticFunction,
    q_tri: &SimplexRule<3>,
    f_int: &mut [f64],
) {
    cm.requires(&[CellFlag::Pvq, CellFlag::Pfq, CellFlag::Fe, CellFlag::Feq, CellFlag::Ev]);
    assert!(f_int.len() >= func.dim(), "Output buffer too small for the integral");

    let fq = cm.face[f];
    let edges = cm.face_edges(f);
    if edges.len() == 3 {
        let tri = cm.triangle_vertices(f).map(|v| cm.xv[v]);
        q_tri.integrate(time, tri, fq.meas, func, f_int);
        return;
    }
    for (&e, &tef) in edges.iter().zip(cm.face_tef(f)) {
        let [x1, x2] = cm.edge_coords(e);
        q_tri.integrate(time, [x1, x2, fq.center], tef, func, f_int);
    }
}

/// Call `piece(tet, tet_volume, triangle, triangle_area)`
/// for each triangle of face `f` and the tetrahedron it forms with the cell center.
fn for_each_cone_piece(
    cm: &CellMesh,
    f: usize,
    mut piece: impl FnMut([crate::Vec3; 4], f64, [crate::Vec3; 3], f64),
) {
    let fq = cm.face[f];
    let hf_coef = cm.hfc[f] / 3.;
    let edges = cm.face_edges(f);

    if edges.len() == 3 {
        let [x0, x1, x2] = cm.triangle_vertices(f).map(|v| cm.xv[v]);
        piece([x0, x1, x2, cm.xc], hf_coef * fq.meas, [x0, x1, x2], fq.meas);
        return;
    }
    for (&e, &tef) in edges.iter().zip(cm.face_tef(f)) {
        let [x1, x2] = cm.edge_coords(e);
        piece(
            [x1, x2, fq.center, cm.xc],
            hf_coef * tef,
            [x1, x2, fq.center],
            tef,
        );
    }
}
