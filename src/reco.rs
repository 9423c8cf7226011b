//! Reconstruction of cell values from values stored on other supports.
//!
//! Vertex values are averaged with the dual volumes as weights.
//! Dual face fluxes are turned into a cell vector with the identity
//! `Σ_e df_e ⊗ t_e = |c| I` relating the dual face vectors `df_e`
//! and edge vectors `t_e` of a cell,
//! so that the fluxes of a constant vector field reconstruct it exactly.

use crate::{
    cell_mesh::{CellFlag, CellMesh},
    mesh::MeshQuantities,
};

/// Average vertex values over cell `c`, weighting by dual volume.
///
/// `values` holds `stride` components per mesh vertex
/// and `stride` components are written to `out`.
pub fn vertex_to_cell_center<M>(mesh: &M, c: usize, values: &[f64], stride: usize, out: &mut [f64])
where
    M: MeshQuantities + ?Sized,
{
    let out = &mut out[..stride];
    out.fill(0.);
    for (&v, vol) in mesh.cell_vertices(c).iter().zip(mesh.cell_dual_volumes(c)) {
        for (o, val) in out.iter_mut().zip(&values[stride * v..stride * (v + 1)]) {
            *o += vol * val;
        }
    }
    let inv_vol = 1. / mesh.cell_volume(c);
    for o in out.iter_mut() {
        *o *= inv_vol;
    }
}

/// Reconstruct a vector at the center of cell `c`
/// from the fluxes through its dual faces.
///
/// `cell_values` holds one flux per cell edge,
/// in the order of [`MeshQuantities::cell_edges`].
pub fn dual_faces_to_cell_center<M>(mesh: &M, c: usize, cell_values: &[f64], out: &mut [f64])
where
    M: MeshQuantities + ?Sized,
{
    let coords = mesh.vertex_coords();
    let mut acc = crate::Vec3::zeros();
    for (&e, flux) in mesh.cell_edges(c).iter().zip(cell_values) {
        let [a, b] = mesh.edge_vertices(e);
        acc += *flux * (coords[b] - coords[a]);
    }
    acc /= mesh.cell_volume(c);
    out[..3].copy_from_slice(acc.as_slice());
}

/// Cellwise version of [`vertex_to_cell_center`]
/// using the interpolation weights of the cell cache.
pub fn vertex_in_cell(cm: &CellMesh, values: &[f64], stride: usize, out: &mut [f64]) {
    cm.requires(&[CellFlag::Pvq]);

    let out = &mut out[..stride];
    out.fill(0.);
    for (&v, w) in cm.v_ids.iter().zip(&cm.wvc) {
        for (o, val) in out.iter_mut().zip(&values[stride * v..stride * (v + 1)]) {
            *o += w * val;
        }
    }
}

/// Cellwise version of [`dual_faces_to_cell_center`]
/// using the edge quantities of the cell cache.
pub fn dual_faces_in_cell(cm: &CellMesh, cell_values: &[f64], out: &mut [f64]) {
    cm.requires(&[CellFlag::Peq]);

    let mut acc = crate::Vec3::zeros();
    for (eq, flux) in cm.edge.iter().zip(cell_values) {
        acc += (*flux * eq.meas) * eq.unitv;
    }
    acc /= cm.vol_c;
    out[..3].copy_from_slice(acc.as_slice());
}
