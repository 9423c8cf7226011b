//! Geometry and connectivity of the polyhedral meshes definitions are evaluated on.
//!
//! Evaluators only read meshes through the [`MeshQuantities`] trait,
//! so any mesh representation providing these quantities can be used.
//! [`PolyMesh`] is a self-contained implementation
//! building every quantity from vertex coordinates and face loops.

use nalgebra_sparse as nas;

use fixedbitset as fb;

use crate::Vec3;

mod mesh_construction;
#[doc(hidden)]
pub use mesh_construction::{tiny_column, tiny_cube, tiny_prism, tiny_tetra};

/// Read access to the quantities of a polyhedral mesh.
///
/// Entities are numbered from zero within each kind.
/// Every per-cell list (vertices, edges, faces) is in a fixed order
/// that the lists of other methods refer to by position:
/// `cell_dual_volumes(c)[i]` belongs to `cell_vertices(c)[i]`,
/// `cell_dual_faces(c)[j]` to `cell_edges(c)[j]`
/// and `cell_face_orientation(c, k)` to `cell_faces(c)[k]`.
///
/// Implementors must be shareable between threads
/// since bulk evaluations read them in parallel.
pub trait MeshQuantities: Send + Sync {
    /// Number of cells.
    fn n_cells(&self) -> usize;
    /// Number of vertices.
    fn n_vertices(&self) -> usize;
    /// Number of faces, interior and boundary.
    fn n_faces(&self) -> usize;
    /// Number of edges.
    fn n_edges(&self) -> usize;
    /// Number of faces on the mesh boundary.
    fn n_boundary_faces(&self) -> usize;

    /// Coordinates of every vertex.
    fn vertex_coords(&self) -> &[Vec3];
    /// Barycenters of every cell.
    fn cell_centers(&self) -> &[Vec3];
    /// Barycenters of every boundary face,
    /// indexed by boundary face number.
    fn boundary_face_centers(&self) -> &[Vec3];

    /// Volume of a cell.
    fn cell_volume(&self, c: usize) -> f64;
    /// Barycenter of a face.
    fn face_center(&self, f: usize) -> Vec3;
    /// Area of a face.
    fn face_area(&self, f: usize) -> f64;
    /// Unit normal of a face.
    /// Its direction is fixed per face;
    /// see [`cell_face_orientation`][Self::cell_face_orientation]
    /// for the direction relative to a cell.
    fn face_normal(&self, f: usize) -> Vec3;
    /// Endpoints of an edge. The edge is directed from the first to the second.
    fn edge_vertices(&self, e: usize) -> [usize; 2];

    /// Vertices of a cell.
    fn cell_vertices(&self, c: usize) -> &[usize];
    /// Edges of a cell.
    fn cell_edges(&self, c: usize) -> &[usize];
    /// Faces of a cell.
    fn cell_faces(&self, c: usize) -> &[usize];
    /// Edges bounding a face.
    fn face_edges(&self, f: usize) -> &[usize];
    /// Mesh face corresponding to a boundary face number.
    fn boundary_face(&self, bf: usize) -> usize;

    /// Volumes of the parts of a cell attached to each of its vertices,
    /// aligned with [`cell_vertices`][Self::cell_vertices].
    /// They sum up to the cell volume.
    fn cell_dual_volumes(&self, c: usize) -> &[f64];
    /// Vector areas of the dual faces of a cell,
    /// aligned with [`cell_edges`][Self::cell_edges]
    /// and oriented along their edge.
    fn cell_dual_faces(&self, c: usize) -> &[Vec3];
    /// Orientation (1 or -1) of the `k`th face of a cell:
    /// 1 if the face normal points out of the cell.
    fn cell_face_orientation(&self, c: usize, k: usize) -> i8;
}

/// A mesh of arbitrary convex polyhedra with planar faces.
///
/// Built with [`PolyMesh::new`] from vertex coordinates
/// and, for each cell, the vertex loops of its faces.
/// Faces and edges shared between cells are identified
/// by their vertex sets.
#[derive(Clone, Debug)]
pub struct PolyMesh {
    vertices: Vec<Vec3>,
    /// edge endpoints, lower vertex index first
    edges: Vec<[usize; 2]>,
    faces: FaceQuantities,
    cells: CellQuantities,
    /// cell to vertex map, values are the dual volumes
    c2v: nas::CsrMatrix<f64>,
    /// cell to edge map, values unused
    c2e: nas::CsrMatrix<i8>,
    /// dual face vectors aligned with the entries of `c2e`
    dual_faces: Vec<Vec3>,
    /// cell to face map, values are the orientations
    c2f: nas::CsrMatrix<i8>,
    /// face to edge map, values are the orientations
    /// of the edges relative to the face loop
    f2e: nas::CsrMatrix<i8>,
    /// faces on the mesh boundary in increasing order
    boundary_faces: Vec<usize>,
    boundary_face_centers: Vec<Vec3>,
    boundary_flags: fb::FixedBitSet,
}

#[derive(Clone, Debug, Default)]
struct FaceQuantities {
    centers: Vec<Vec3>,
    unit_normals: Vec<Vec3>,
    areas: Vec<f64>,
}

#[derive(Clone, Debug, Default)]
struct CellQuantities {
    centers: Vec<Vec3>,
    volumes: Vec<f64>,
}

impl PolyMesh {
    /// Build a mesh from vertex coordinates and cells.
    ///
    /// Each cell is a list of faces
    /// and each face a loop of at least three vertex indices.
    /// The direction of a loop doesn't matter.
    pub fn new(vertices: Vec<Vec3>, cells: &[Vec<Vec<usize>>]) -> Self {
        mesh_construction::build_mesh(vertices, cells)
    }

    /// Whether a face lies on the mesh boundary.
    #[inline]
    pub fn is_boundary_face(&self, f: usize) -> bool {
        self.boundary_flags.contains(f)
    }

    /// Orientation of an edge relative to the loop of a face
    /// for every edge of the face, aligned with `face_edges(f)`.
    #[inline]
    pub fn face_edge_orientations(&self, f: usize) -> &[i8] {
        csr_row_values(&self.f2e, f)
    }
}

#[inline]
fn csr_row_indices<T>(mat: &nas::CsrMatrix<T>, row: usize) -> &[usize] {
    let offsets = mat.row_offsets();
    &mat.col_indices()[offsets[row]..offsets[row + 1]]
}

#[inline]
fn csr_row_values<T>(mat: &nas::CsrMatrix<T>, row: usize) -> &[T] {
    let offsets = mat.row_offsets();
    &mat.values()[offsets[row]..offsets[row + 1]]
}

impl MeshQuantities for PolyMesh {
    #[inline]
    fn n_cells(&self) -> usize {
        self.cells.volumes.len()
    }

    #[inline]
    fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    fn n_faces(&self) -> usize {
        self.faces.areas.len()
    }

    #[inline]
    fn n_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    fn n_boundary_faces(&self) -> usize {
        self.boundary_faces.len()
    }

    #[inline]
    fn vertex_coords(&self) -> &[Vec3] {
        &self.vertices
    }

    #[inline]
    fn cell_centers(&self) -> &[Vec3] {
        &self.cells.centers
    }

    #[inline]
    fn boundary_face_centers(&self) -> &[Vec3] {
        &self.boundary_face_centers
    }

    #[inline]
    fn cell_volume(&self, c: usize) -> f64 {
        self.cells.volumes[c]
    }

    #[inline]
    fn face_center(&self, f: usize) -> Vec3 {
        self.faces.centers[f]
    }

    #[inline]
    fn face_area(&self, f: usize) -> f64 {
        self.faces.areas[f]
    }

    #[inline]
    fn face_normal(&self, f: usize) -> Vec3 {
        self.faces.unit_normals[f]
    }

    #[inline]
    fn edge_vertices(&self, e: usize) -> [usize; 2] {
        self.edges[e]
    }

    #[inline]
    fn cell_vertices(&self, c: usize) -> &[usize] {
        csr_row_indices(&self.c2v, c)
    }

    #[inline]
    fn cell_edges(&self, c: usize) -> &[usize] {
        csr_row_indices(&self.c2e, c)
    }

    #[inline]
    fn cell_faces(&self, c: usize) -> &[usize] {
        csr_row_indices(&self.c2f, c)
    }

    #[inline]
    fn face_edges(&self, f: usize) -> &[usize] {
        csr_row_indices(&self.f2e, f)
    }

    #[inline]
    fn boundary_face(&self, bf: usize) -> usize {
        self.boundary_faces[bf]
    }

    #[inline]
    fn cell_dual_volumes(&self, c: usize) -> &[f64] {
        csr_row_values(&self.c2v, c)
    }

    #[inline]
    fn cell_dual_faces(&self, c: usize) -> &[Vec3] {
        let offsets = self.c2e.row_offsets();
        &self.dual_faces[offsets[c]..offsets[c + 1]]
    }

    #[inline]
    fn cell_face_orientation(&self, c: usize, k: usize) -> i8 {
        csr_row_values(&self.c2f, c)[k]
    }
}
