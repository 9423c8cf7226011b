use nalgebra_sparse as nas;

use fixedbitset as fb;
use itertools::Itertools;
use std::collections::HashMap;

use super::{csr_row_indices, CellQuantities, FaceQuantities, PolyMesh};
use crate::Vec3;

/// Construct a mesh from raw vertices and cells given as lists of face loops.
pub(super) fn build_mesh(vertices: Vec<Vec3>, cells: &[Vec<Vec<usize>>]) -> PolyMesh {
    //
    // deduplicate faces and edges
    //

    // faces are identified by their sorted vertex indices
    // and edges by their endpoints in ascending order,
    // the first loop seen for a face determines its normal direction
    let mut face_ids: HashMap<Vec<usize>, usize> = HashMap::new();
    let mut face_loops: Vec<&[usize]> = Vec::new();
    let mut edge_ids: HashMap<[usize; 2], usize> = HashMap::new();
    let mut edges: Vec<[usize; 2]> = Vec::new();
    let mut cell_face_lists: Vec<Vec<usize>> = Vec::with_capacity(cells.len());

    let mut sorted_loop: Vec<usize> = Vec::new();
    for cell in cells {
        assert!(cell.len() >= 4, "A cell needs at least four faces");
        let mut cell_faces = Vec::with_capacity(cell.len());
        for face in cell {
            assert!(face.len() >= 3, "A face needs at least three vertices");
            sorted_loop.clear();
            sorted_loop.extend_from_slice(face);
            sorted_loop.sort_unstable();

            let next_face = face_loops.len();
            let f = *face_ids.entry(sorted_loop.clone()).or_insert_with(|| {
                face_loops.push(face);
                next_face
            });
            if f == next_face {
                for (&a, &b) in face.iter().circular_tuple_windows() {
                    let key = edge_key(a, b);
                    let next_edge = edges.len();
                    edge_ids.entry(key).or_insert_with(|| {
                        edges.push(key);
                        next_edge
                    });
                }
            }
            cell_faces.push(f);
        }
        cell_face_lists.push(cell_faces);
    }

    let n_cells = cells.len();
    let n_faces = face_loops.len();

    //
    // face quantities and face-edge connectivity
    //

    let mut faces = FaceQuantities::default();
    let mut f2e_coo = nas::CooMatrix::new(n_faces, edges.len());
    for (f, face) in face_loops.iter().enumerate() {
        let (center, vector_area) = polygon_geometry(&vertices, face);
        let area = vector_area.norm();
        faces.centers.push(center);
        faces.unit_normals.push(vector_area / area);
        faces.areas.push(area);

        for (&a, &b) in face.iter().circular_tuple_windows() {
            let orientation: i8 = if a < b { 1 } else { -1 };
            f2e_coo.push(f, edge_ids[&edge_key(a, b)], orientation);
        }
    }
    let f2e = nas::CsrMatrix::from(&f2e_coo);

    //
    // cell quantities by cone decomposition
    //

    let mut cell_quantities = CellQuantities::default();
    let mut c2f_coo = nas::CooMatrix::new(n_cells, n_faces);
    let mut face_owner_counts = vec![0usize; n_faces];
    for (c, cell_faces) in cell_face_lists.iter().enumerate() {
        // any point inside the cell works as the apex of the cones,
        // the final center is the volume-weighted mean of cone centroids
        let apex = cell_faces.iter().map(|&f| faces.centers[f]).sum::<Vec3>()
            / cell_faces.len() as f64;

        let mut volume = 0.;
        let mut weighted_center = Vec3::zeros();
        for &f in cell_faces {
            let xf = faces.centers[f];
            let height = faces.unit_normals[f].dot(&(xf - apex));
            let cone_volume = height.abs() * faces.areas[f] / 3.;
            volume += cone_volume;
            weighted_center += cone_volume * (apex + 0.75 * (xf - apex));

            let orientation: i8 = if height >= 0. { 1 } else { -1 };
            c2f_coo.push(c, f, orientation);
            face_owner_counts[f] += 1;
        }
        cell_quantities.centers.push(weighted_center / volume);
        cell_quantities.volumes.push(volume);
    }
    let c2f = nas::CsrMatrix::from(&c2f_coo);

    //
    // dual quantities
    //

    // every (face, edge) pair of a cell spans the tetrahedron
    // (edge start, edge end, face center, cell center).
    // the edge midpoint splits it into two halves of equal volume,
    // one for each endpoint, which sum into the dual volumes
    // thanks to the duplicate-summing conversion from COO to CSR.
    // the triangle (edge midpoint, face center, cell center)
    // is the part of the edge's dual face inside this face's cone.
    let mut c2v_coo = nas::CooMatrix::new(n_cells, vertices.len());
    let mut c2e_coo = nas::CooMatrix::new(n_cells, edges.len());
    let mut dual_face_parts: Vec<(usize, usize, Vec3)> = Vec::new();
    for (c, cell_faces) in cell_face_lists.iter().enumerate() {
        let xc = cell_quantities.centers[c];
        for &f in cell_faces {
            let xf = faces.centers[f];
            for &e in csr_row_indices(&f2e, f) {
                let [a, b] = edges[e];
                let (xa, xb) = (vertices[a], vertices[b]);
                let xe = 0.5 * (xa + xb);

                let half_volume = tetra_volume(xa, xe, xf, xc);
                c2v_coo.push(c, a, half_volume);
                c2v_coo.push(c, b, half_volume);

                c2e_coo.push(c, e, 1i8);
                let mut part = 0.5 * (xf - xe).cross(&(xc - xe));
                if part.dot(&(xb - xa)) < 0. {
                    part = -part;
                }
                dual_face_parts.push((c, e, part));
            }
        }
    }
    let c2v = nas::CsrMatrix::from(&c2v_coo);
    let c2e = nas::CsrMatrix::from(&c2e_coo);

    let mut dual_faces = vec![Vec3::zeros(); c2e.nnz()];
    for (c, e, part) in dual_face_parts {
        let row_start = c2e.row_offsets()[c];
        let pos = csr_row_indices(&c2e, c)
            .binary_search(&e)
            .expect("Edge missing from its cell. This is a bug in meshdef");
        dual_faces[row_start + pos] += part;
    }

    //
    // identify mesh boundary
    //

    // a face owned by only one cell is on the boundary of the mesh
    let mut boundary_flags = fb::FixedBitSet::with_capacity(n_faces);
    for (f, count) in face_owner_counts.iter().enumerate() {
        if *count == 1 {
            boundary_flags.insert(f);
        }
    }
    let boundary_faces: Vec<usize> = boundary_flags.ones().collect();
    let boundary_face_centers = boundary_faces.iter().map(|&f| faces.centers[f]).collect();

    PolyMesh {
        vertices,
        edges,
        faces,
        cells: cell_quantities,
        c2v,
        c2e,
        dual_faces,
        c2f,
        f2e,
        boundary_faces,
        boundary_face_centers,
        boundary_flags,
    }
}

#[inline]
fn edge_key(a: usize, b: usize) -> [usize; 2] {
    [a.min(b), a.max(b)]
}

/// Barycenter and vector area of a planar polygon,
/// computed by splitting it into triangles around its vertex mean.
fn polygon_geometry(vertices: &[Vec3], face: &[usize]) -> (Vec3, Vec3) {
    let apex = face.iter().map(|&v| vertices[v]).sum::<Vec3>() / face.len() as f64;

    let mut vector_area = Vec3::zeros();
    let mut weighted_center = Vec3::zeros();
    let mut total_area = 0.;
    for (&a, &b) in face.iter().circular_tuple_windows() {
        let (xa, xb) = (vertices[a], vertices[b]);
        let tri = 0.5 * (xa - apex).cross(&(xb - apex));
        let tri_area = tri.norm();
        vector_area += tri;
        weighted_center += tri_area * (xa + xb + apex) / 3.;
        total_area += tri_area;
    }
    (weighted_center / total_area, vector_area)
}

/// Unsigned volume of a tetrahedron.
#[inline]
pub(crate) fn tetra_volume(x0: Vec3, x1: Vec3, x2: Vec3, x3: Vec3) -> f64 {
    (x1 - x0).dot(&(x2 - x0).cross(&(x3 - x0))).abs() / 6.
}

/// Face loops of a hexahedron given its bottom quad followed by its top quad.
fn hexahedron(v: [usize; 8]) -> Vec<Vec<usize>> {
    vec![
        vec![v[0], v[3], v[2], v[1]],
        vec![v[4], v[5], v[6], v[7]],
        vec![v[0], v[1], v[5], v[4]],
        vec![v[1], v[2], v[6], v[5]],
        vec![v[2], v[3], v[7], v[6]],
        vec![v[3], v[0], v[4], v[7]],
    ]
}

/// The unit cube `[0, 1]³` as a single hexahedral cell.
///
/// Vertices are ordered counterclockwise around the bottom face
/// starting from the origin, then the same way around the top face.
///
/// This is public for visibility in doctests, which frequently need an instance of a mesh.
/// It is not meant to be used by users and thus hidden from docs.
#[doc(hidden)]
pub fn tiny_cube() -> PolyMesh {
    tiny_column(1)
}

/// A single tetrahedron with vertices at the origin and the three unit points.
///
/// This is public for visibility in doctests, which frequently need an instance of a mesh.
/// It is not meant to be used by users and thus hidden from docs.
#[doc(hidden)]
pub fn tiny_tetra() -> PolyMesh {
    let vertices = vec![Vec3::zeros(), Vec3::x(), Vec3::y(), Vec3::z()];
    let cell = vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]];
    PolyMesh::new(vertices, &[cell])
}

/// A single right triangular prism:
/// the triangle with vertices at the origin, `x` and `y`
/// extruded by one unit along `z`.
///
/// This is public for visibility in doctests, which frequently need an instance of a mesh.
/// It is not meant to be used by users and thus hidden from docs.
#[doc(hidden)]
pub fn tiny_prism() -> PolyMesh {
    let vertices = vec![
        Vec3::new(0., 0., 0.),
        Vec3::new(1., 0., 0.),
        Vec3::new(0., 1., 0.),
        Vec3::new(0., 0., 1.),
        Vec3::new(1., 0., 1.),
        Vec3::new(0., 1., 1.),
    ];
    let cell = vec![
        vec![0, 2, 1],
        vec![3, 4, 5],
        vec![0, 1, 4, 3],
        vec![1, 2, 5, 4],
        vec![2, 0, 3, 5],
    ];
    PolyMesh::new(vertices, &[cell])
}

/// `n` unit cubes stacked along the z axis,
/// cell `k` occupying `[0, 1]² × [k, k + 1]`.
///
/// This is public for visibility in doctests, which frequently need an instance of a mesh.
/// It is not meant to be used by users and thus hidden from docs.
#[doc(hidden)]
pub fn tiny_column(n: usize) -> PolyMesh {
    let vertices = (0..=n)
        .flat_map(|k| {
            let z = k as f64;
            [
                Vec3::new(0., 0., z),
                Vec3::new(1., 0., z),
                Vec3::new(1., 1., z),
                Vec3::new(0., 1., z),
            ]
        })
        .collect();
    let cells: Vec<_> = (0..n)
        .map(|k| hexahedron(std::array::from_fn(|i| 4 * k + i)))
        .collect();
    PolyMesh::new(vertices, &cells)
}
