//! Local geometry cache of a single cell.
//!
//! Cellwise evaluations read everything they need about a cell
//! from a [`CellMesh`] built once per cell and reused for the next one.
//! Only the quantities requested through [`CellFlag`]s are computed,
//! and every cellwise routine asserts the flags it relies on
//! instead of computing missing quantities itself.

use fixedbitset as fb;

use crate::{mesh::MeshQuantities, Vec3};

/// A group of quantities a [`CellMesh`] can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellFlag {
    /// Vertex ids.
    Pv,
    /// Vertex coordinates and interpolation weights.
    Pvq,
    /// Edge ids.
    Pe,
    /// Edge centers, unit tangents and lengths.
    Peq,
    /// Face ids and orientations.
    Pf,
    /// Face centers, unit normals and areas.
    Pfq,
    /// Face to edge connectivity.
    Fe,
    /// Areas of the triangles formed by each face edge and the face center.
    Feq,
    /// Edge to vertex connectivity.
    Ev,
    /// Distances from the cell center to the face planes.
    Hfc,
}

const N_FLAGS: usize = 10;

impl CellFlag {
    /// Flags that must be computed before this one.
    fn dependencies(self) -> &'static [CellFlag] {
        use CellFlag::*;
        match self {
            Pv | Pe | Pf => &[],
            Pvq => &[Pv],
            Peq => &[Pe],
            Pfq => &[Pf],
            Fe => &[Pf, Pe],
            Ev => &[Pe, Pv],
            Feq => &[Fe, Ev, Pfq, Pvq],
            Hfc => &[Pfq],
        }
    }
}

/// A set of [`CellFlag`]s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellFlags(fb::FixedBitSet);

impl CellFlags {
    /// Set containing the given flags and everything they depend on.
    pub fn new(flags: &[CellFlag]) -> Self {
        let mut set = Self(fb::FixedBitSet::with_capacity(N_FLAGS));
        for &flag in flags {
            set.insert(flag);
        }
        set
    }

    /// Set containing every flag.
    pub fn all() -> Self {
        use CellFlag::*;
        Self::new(&[Pv, Pvq, Pe, Peq, Pf, Pfq, Fe, Feq, Ev, Hfc])
    }

    /// Add a flag along with its dependencies.
    pub fn insert(&mut self, flag: CellFlag) {
        for &dep in flag.dependencies() {
            self.insert(dep);
        }
        self.0.insert(flag as usize);
    }

    /// Whether a flag is in the set.
    #[inline]
    pub fn contains(&self, flag: CellFlag) -> bool {
        self.0.contains(flag as usize)
    }
}

/// Topological type of a cell, inferred from its entity counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CellType {
    /// 4 vertices, 6 edges, 4 faces.
    Tetra,
    /// 5 vertices, 8 edges, 5 faces.
    Pyramid,
    /// 6 vertices, 9 edges, 5 faces.
    Prism,
    /// 8 vertices, 12 edges, 6 faces.
    Hexa,
    /// Anything else.
    #[default]
    Polyhedron,
}

impl CellType {
    fn from_counts(n_vertices: usize, n_edges: usize, n_faces: usize) -> Self {
        match (n_vertices, n_edges, n_faces) {
            (4, 6, 4) => CellType::Tetra,
            (5, 8, 5) => CellType::Pyramid,
            (6, 9, 5) => CellType::Prism,
            (8, 12, 6) => CellType::Hexa,
            _ => CellType::Polyhedron,
        }
    }
}

/// Center, unit direction and measure of an edge or a face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quant {
    /// Barycenter.
    pub center: Vec3,
    /// Unit tangent of an edge or unit normal of a face.
    pub unitv: Vec3,
    /// Length of an edge or area of a face.
    pub meas: f64,
}

/// Geometry and connectivity of one cell, in local numbering.
///
/// Fields are public for reading; which of them hold meaningful values
/// depends on the [`CellFlags`] the cache was built with.
/// Local indices (`e2v`, `f2e_ids`) refer to positions
/// in `v_ids` and `e_ids` respectively.
#[derive(Clone, Debug)]
pub struct CellMesh {
    flags: CellFlags,
    /// Mesh id of the cell.
    pub c_id: usize,
    /// Topological type.
    pub cell_type: CellType,
    /// Cell barycenter.
    pub xc: Vec3,
    /// Cell volume.
    pub vol_c: f64,

    /// Mesh ids of the vertices.
    pub v_ids: Vec<usize>,
    /// Vertex coordinates.
    pub xv: Vec<Vec3>,
    /// Interpolation weights of the vertices:
    /// dual volume over cell volume, summing up to one.
    pub wvc: Vec<f64>,

    /// Mesh ids of the edges.
    pub e_ids: Vec<usize>,
    /// Edge quantities.
    pub edge: Vec<Quant>,
    /// Local vertex indices of each edge's endpoints.
    pub e2v: Vec<[usize; 2]>,

    /// Mesh ids of the faces.
    pub f_ids: Vec<usize>,
    /// Orientation of each face relative to the cell (1 for outward normals).
    pub f_sgn: Vec<i8>,
    /// Face quantities.
    pub face: Vec<Quant>,
    /// Distance from the cell center to each face plane.
    pub hfc: Vec<f64>,
    /// Start of each face's entries in `f2e_ids` and `tef`,
    /// with one extra entry at the end.
    pub f2e_idx: Vec<usize>,
    /// Local edge indices of the edges of each face.
    pub f2e_ids: Vec<usize>,
    /// Area of the triangle formed by each face edge and the face center,
    /// aligned with `f2e_ids`.
    pub tef: Vec<f64>,
}

impl CellMesh {
    /// An empty cache that will hold the given quantities.
    pub fn new(flags: CellFlags) -> Self {
        Self {
            flags,
            c_id: 0,
            cell_type: CellType::default(),
            xc: Vec3::zeros(),
            vol_c: 0.,
            v_ids: Vec::new(),
            xv: Vec::new(),
            wvc: Vec::new(),
            e_ids: Vec::new(),
            edge: Vec::new(),
            e2v: Vec::new(),
            f_ids: Vec::new(),
            f_sgn: Vec::new(),
            face: Vec::new(),
            hfc: Vec::new(),
            f2e_idx: Vec::new(),
            f2e_ids: Vec::new(),
            tef: Vec::new(),
        }
    }

    /// Build the cache of cell `c`.
    pub fn build(mesh: &impl MeshQuantities, c: usize, flags: CellFlags) -> Self {
        let mut cm = Self::new(flags);
        cm.reset_for(mesh, c);
        cm
    }

    /// The quantities this cache holds.
    #[inline]
    pub fn flags(&self) -> &CellFlags {
        &self.flags
    }

    /// Panic unless every given flag was computed.
    #[inline]
    pub fn requires(&self, needed: &[CellFlag]) {
        for &flag in needed {
            assert!(
                self.flags.contains(flag),
                "Cell mesh was not built with {flag:?}"
            );
        }
    }

    /// Number of vertices.
    #[inline]
    pub fn n_vc(&self) -> usize {
        self.v_ids.len()
    }

    /// Number of edges.
    #[inline]
    pub fn n_ec(&self) -> usize {
        self.e_ids.len()
    }

    /// Number of faces.
    #[inline]
    pub fn n_fc(&self) -> usize {
        self.f_ids.len()
    }

    /// Local edge indices of face `f`.
    #[inline]
    pub fn face_edges(&self, f: usize) -> &[usize] {
        &self.f2e_ids[self.f2e_idx[f]..self.f2e_idx[f + 1]]
    }

    /// Areas of the edge triangles of face `f`, aligned with `face_edges(f)`.
    #[inline]
    pub fn face_tef(&self, f: usize) -> &[f64] {
        &self.tef[self.f2e_idx[f]..self.f2e_idx[f + 1]]
    }

    /// Coordinates of the endpoints of local edge `e`.
    #[inline]
    pub fn edge_coords(&self, e: usize) -> [Vec3; 2] {
        let [v1, v2] = self.e2v[e];
        [self.xv[v1], self.xv[v2]]
    }

    /// The three local vertices of a triangular face.
    pub fn triangle_vertices(&self, f: usize) -> [usize; 3] {
        let edges = self.face_edges(f);
        assert!(edges.len() == 3, "Face {f} is not a triangle");
        let [v0, v1] = self.e2v[edges[0]];
        let [a, b] = self.e2v[edges[1]];
        let v2 = if a == v0 || a == v1 { b } else { a };
        [v0, v1, v2]
    }

    /// Recompute the cache for cell `c`, reusing allocations.
    pub fn reset_for(&mut self, mesh: &impl MeshQuantities, c: usize) {
        use CellFlag::*;

        self.c_id = c;
        self.xc = mesh.cell_centers()[c];
        self.vol_c = mesh.cell_volume(c);
        self.cell_type = CellType::from_counts(
            mesh.cell_vertices(c).len(),
            mesh.cell_edges(c).len(),
            mesh.cell_faces(c).len(),
        );

        self.v_ids.clear();
        self.xv.clear();
        self.wvc.clear();
        self.e_ids.clear();
        self.edge.clear();
        self.e2v.clear();
        self.f_ids.clear();
        self.f_sgn.clear();
        self.face.clear();
        self.hfc.clear();
        self.f2e_idx.clear();
        self.f2e_ids.clear();
        self.tef.clear();

        if self.flags.contains(Pv) {
            self.v_ids.extend_from_slice(mesh.cell_vertices(c));
        }
        if self.flags.contains(Pvq) {
            let coords = mesh.vertex_coords();
            self.xv.extend(self.v_ids.iter().map(|&v| coords[v]));
            let inv_vol = 1. / self.vol_c;
            self.wvc
                .extend(mesh.cell_dual_volumes(c).iter().map(|vol| vol * inv_vol));
        }

        if self.flags.contains(Pe) {
            self.e_ids.extend_from_slice(mesh.cell_edges(c));
        }
        if self.flags.contains(Ev) {
            for &e in &self.e_ids {
                let [a, b] = mesh.edge_vertices(e);
                let local = [self.local_vertex(a), self.local_vertex(b)];
                self.e2v.push(local);
            }
        }
        if self.flags.contains(Peq) {
            let coords = mesh.vertex_coords();
            for &e in &self.e_ids {
                let [a, b] = mesh.edge_vertices(e);
                let tangent = coords[b] - coords[a];
                let meas = tangent.norm();
                self.edge.push(Quant {
                    center: 0.5 * (coords[a] + coords[b]),
                    unitv: tangent / meas,
                    meas,
                });
            }
        }

        if self.flags.contains(Pf) {
            self.f_ids.extend_from_slice(mesh.cell_faces(c));
            self.f_sgn
                .extend((0..self.f_ids.len()).map(|k| mesh.cell_face_orientation(c, k)));
        }
        if self.flags.contains(Pfq) {
            for &f in &self.f_ids {
                self.face.push(Quant {
                    center: mesh.face_center(f),
                    unitv: mesh.face_normal(f),
                    meas: mesh.face_area(f),
                });
            }
        }
        if self.flags.contains(Hfc) {
            let xc = self.xc;
            self.hfc
                .extend(self.face.iter().map(|fq| fq.unitv.dot(&(fq.center - xc)).abs()));
        }

        if self.flags.contains(Fe) {
            self.f2e_idx.push(0);
            for &f in &self.f_ids {
                for &e in mesh.face_edges(f) {
                    let local = self.local_edge(e);
                    self.f2e_ids.push(local);
                }
                self.f2e_idx.push(self.f2e_ids.len());
            }
        }
        if self.flags.contains(Feq) {
            for f in 0..self.f_ids.len() {
                let xf = self.face[f].center;
                for i in self.f2e_idx[f]..self.f2e_idx[f + 1] {
                    let [x1, x2] = self.edge_coords(self.f2e_ids[i]);
                    self.tef.push(triangle_area(x1, x2, xf));
                }
            }
        }
    }

    fn local_vertex(&self, v: usize) -> usize {
        self.v_ids
            .iter()
            .position(|&cv| cv == v)
            .expect("Edge vertex missing from its cell. The mesh is inconsistent")
    }

    fn local_edge(&self, e: usize) -> usize {
        self.e_ids
            .iter()
            .position(|&ce| ce == e)
            .expect("Face edge missing from its cell. The mesh is inconsistent")
    }
}

/// Area of a triangle.
#[inline]
pub(crate) fn triangle_area(x0: Vec3, x1: Vec3, x2: Vec3) -> f64 {
    0.5 * (x1 - x0).cross(&(x2 - x0)).norm()
}
