//! Evaluation of definitions for many mesh entities at once.
//!
//! Every routine follows the addressing contract of [`Selection`]:
//! entities are read from the selection and results written
//! `dim` values per entity at the position the selection assigns.
//! Loops over selections larger than
//! [`EvalSettings::parallel_threshold`] run in parallel.

use rayon::prelude::*;

use crate::{
    cell_mesh::triangle_area,
    definition::{AnalyticFunction, ArrayInput, Definition, FieldInput, Payload, Value},
    error::{EvalError, Result},
    mesh::MeshQuantities,
    quadrature::{self, QuadratureType},
    reco,
    selection::Selection,
    settings::EvalSettings,
    Support, Vec3,
};

/// Evaluates definitions over a mesh.
///
/// # Examples
///
/// ```
/// # use meshdef::{mesh, BulkEvaluator, Definition, Selection, Support, Value, Vec3};
/// let mesh = mesh::tiny_column(3);
/// let eval = BulkEvaluator::new(&mesh);
///
/// let def = Definition::by_value(Support::Cell, Value::Vector(Vec3::new(1., 2., 3.)));
/// let mut out = vec![0.; 3 * 2];
/// eval.evaluate(&def, Support::Cell, Selection::Compact(&[2, 0]), 0., &mut out)
///     .unwrap();
/// assert_eq!(out, [1., 2., 3., 1., 2., 3.]);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct BulkEvaluator<'m, M: ?Sized> {
    mesh: &'m M,
    settings: EvalSettings,
}

impl<'m, M> BulkEvaluator<'m, M>
where
    M: MeshQuantities + ?Sized,
{
    /// Evaluator with default settings.
    pub fn new(mesh: &'m M) -> Self {
        Self::with_settings(mesh, EvalSettings::default())
    }

    /// Evaluator with the given settings.
    pub fn with_settings(mesh: &'m M, settings: EvalSettings) -> Self {
        Self { mesh, settings }
    }

    /// The mesh evaluated on.
    #[inline]
    pub fn mesh(&self) -> &'m M {
        self.mesh
    }

    /// The settings in use.
    #[inline]
    pub fn settings(&self) -> &EvalSettings {
        &self.settings
    }

    /// Evaluate a definition at entities of the `target` support.
    ///
    /// Constants are written as is for any target.
    /// Analytic functions are evaluated at cell centers, vertices
    /// or boundary face centers.
    /// Arrays and fields are copied when their support matches the target
    /// and reconstructed at cell centers otherwise.
    /// Vector arrays on cells or dual faces asked for at vertices
    /// are interpolated to every vertex
    /// (see [`vector_at_all_vertices_by_array`][Self::vector_at_all_vertices_by_array]).
    pub fn evaluate(
        &self,
        def: &Definition,
        target: Support,
        selection: Selection,
        time: f64,
        out: &mut [f64],
    ) -> Result<()> {
        log::debug!(
            "evaluating {:?} definition at {} entities of {target:?}",
            def.kind(),
            selection.len()
        );
        match (def.payload(), target) {
            (Payload::Value(value), _) => {
                self.by_value(value, selection, out);
                Ok(())
            }
            (Payload::Analytic(func), Support::Cell) => {
                self.at_cells_by_analytic(*func, selection, time, out);
                Ok(())
            }
            (Payload::Analytic(func), Support::Vertex) => {
                self.at_vertices_by_analytic(*func, selection, time, out);
                Ok(())
            }
            (Payload::Analytic(func), Support::BoundaryFace) => {
                self.at_boundary_faces_by_analytic(*func, selection, time, out);
                Ok(())
            }
            (Payload::Array(array), Support::Cell) => self.at_cells_by_array(array, selection, out),
            (Payload::Array(array), Support::Vertex) => match array.location {
                Support::Cell | Support::DualFaceByCell => {
                    self.vector_at_all_vertices_by_array(array, selection, out)
                }
                _ => self.at_vertices_by_array(array, selection, out),
            },
            (Payload::Field(field), Support::Cell) => self.at_cells_by_field(field, selection, out),
            (Payload::Field(field), Support::Vertex) => {
                self.at_vertices_by_field(field, selection, out)
            }
            _ => Err(EvalError::UnsupportedSupport {
                operation: "evaluate",
                support: target,
            }),
        }
    }

    /// Write a constant for each selected entity.
    pub fn by_value(&self, value: &Value, selection: Selection, out: &mut [f64]) {
        selection.par_for_each(
            value.dim(),
            out,
            self.settings.parallel_threshold,
            |_, slot| value.write_to(slot),
        );
    }

    /// Evaluate an analytic function at the centers of the selected cells.
    pub fn at_cells_by_analytic(
        &self,
        func: &dyn AnalyticFunction,
        selection: Selection,
        time: f64,
        out: &mut [f64],
    ) {
        self.analytic_at(func, self.mesh.cell_centers(), selection, time, out);
    }

    /// Evaluate an analytic function at the selected vertices.
    pub fn at_vertices_by_analytic(
        &self,
        func: &dyn AnalyticFunction,
        selection: Selection,
        time: f64,
        out: &mut [f64],
    ) {
        self.analytic_at(func, self.mesh.vertex_coords(), selection, time, out);
    }

    /// Evaluate an analytic function at the centers of the selected boundary faces.
    pub fn at_boundary_faces_by_analytic(
        &self,
        func: &dyn AnalyticFunction,
        selection: Selection,
        time: f64,
        out: &mut [f64],
    ) {
        self.analytic_at(func, self.mesh.boundary_face_centers(), selection, time, out);
    }

    /// Split a batch evaluation into parallel sub-batches
    /// when the selection is large enough.
    fn analytic_at(
        &self,
        func: &dyn AnalyticFunction,
        coords: &[Vec3],
        selection: Selection,
        time: f64,
        out: &mut [f64],
    ) {
        let dim = func.dim();
        let threshold = self.settings.parallel_threshold;
        if selection.len() < threshold {
            func.evaluate(time, coords, selection, out);
            return;
        }
        // sub-batches of at least `threshold` entities
        let batch = threshold.max(1);
        match selection {
            Selection::All(n) => {
                out[..dim * n]
                    .par_chunks_mut(dim * batch)
                    .zip(coords[..n].par_chunks(batch))
                    .for_each(|(out_chunk, coord_chunk)| {
                        let sel = Selection::All(coord_chunk.len());
                        func.evaluate(time, coord_chunk, sel, out_chunk);
                    });
            }
            Selection::Compact(ids) => {
                out[..dim * ids.len()]
                    .par_chunks_mut(dim * batch)
                    .zip(ids.par_chunks(batch))
                    .for_each(|(out_chunk, id_chunk)| {
                        func.evaluate(time, coords, Selection::Compact(id_chunk), out_chunk);
                    });
            }
            Selection::Scattered(_) => func.evaluate(time, coords, selection, out),
        }
    }

    /// Mean value of a definition over each selected boundary face,
    /// integrating with the quadrature of the settings.
    pub fn avg_at_boundary_faces(
        &self,
        def: &Definition,
        selection: Selection,
        time: f64,
        out: &mut [f64],
    ) -> Result<()> {
        match def.payload() {
            Payload::Value(value) => {
                self.by_value(value, selection, out);
                Ok(())
            }
            Payload::Analytic(func) => self.avg_at_boundary_faces_by_analytic(
                *func,
                selection,
                time,
                self.settings.quadrature,
                out,
            ),
            _ => Err(EvalError::UnsupportedKind {
                operation: "avg_at_boundary_faces",
                kind: def.kind(),
            }),
        }
    }

    /// Mean value of an analytic function over each selected boundary face.
    ///
    /// Triangular faces are integrated directly
    /// and other faces split into one triangle per edge around the face center.
    pub fn avg_at_boundary_faces_by_analytic(
        &self,
        func: &dyn AnalyticFunction,
        selection: Selection,
        time: f64,
        quadrature: QuadratureType,
        out: &mut [f64],
    ) -> Result<()> {
        let dim = func.dim();
        let rule = quadrature::triangle_rule(quadrature, dim)?;
        log::debug!(
            "averaging an analytic function over {} boundary faces with {quadrature:?}",
            selection.len()
        );
        let mesh = self.mesh;
        selection.par_for_each(dim, out, self.settings.parallel_threshold, |bf, slot| {
            let f = mesh.boundary_face(bf);
            slot.fill(0.);
            for_each_face_triangle(mesh, f, |tri, area| {
                rule.integrate(time, tri, area, func, slot);
            });
            let inv_area = 1. / mesh.face_area(f);
            slot.iter_mut().for_each(|s| *s *= inv_area);
        });
        Ok(())
    }

    /// Values of an array at the selected cells.
    ///
    /// Cell arrays are copied, vertex arrays averaged over each cell
    /// and dual face arrays reconstructed into a vector per cell.
    pub fn at_cells_by_array(
        &self,
        array: &ArrayInput,
        selection: Selection,
        out: &mut [f64],
    ) -> Result<()> {
        assert_indexed(array);
        let mesh = self.mesh;
        let threshold = self.settings.parallel_threshold;
        match array.location {
            Support::Cell => selection.par_for_each(array.stride, out, threshold, |c, slot| {
                slot.copy_from_slice(array.entity(c))
            }),
            Support::Vertex => selection.par_for_each(array.stride, out, threshold, |c, slot| {
                reco::vertex_to_cell_center(mesh, c, array.values, array.stride, slot)
            }),
            Support::DualFaceByCell => selection.par_for_each(3, out, threshold, |c, slot| {
                reco::dual_faces_to_cell_center(mesh, c, array.cell_block(c), slot)
            }),
            support => {
                return Err(EvalError::UnsupportedSupport {
                    operation: "at_cells_by_array",
                    support,
                })
            }
        }
        Ok(())
    }

    /// Values of a vertex array at the selected vertices.
    pub fn at_vertices_by_array(
        &self,
        array: &ArrayInput,
        selection: Selection,
        out: &mut [f64],
    ) -> Result<()> {
        if array.location != Support::Vertex {
            return Err(EvalError::UnsupportedSupport {
                operation: "at_vertices_by_array",
                support: array.location,
            });
        }
        selection.par_for_each(
            array.stride,
            out,
            self.settings.parallel_threshold,
            |v, slot| slot.copy_from_slice(array.entity(v)),
        );
        Ok(())
    }

    /// Interpolate a vector array on cells or dual faces to every vertex.
    ///
    /// Each cell contributes its vector to its vertices
    /// weighted by the dual volume shared with each of them,
    /// and vertex values are then divided by their total weight.
    /// Only [`Selection::All`] over every vertex is accepted.
    pub fn vector_at_all_vertices_by_array(
        &self,
        array: &ArrayInput,
        selection: Selection,
        out: &mut [f64],
    ) -> Result<()> {
        const OP: &str = "vector_at_all_vertices_by_array";
        let mesh = self.mesh;
        let n_vertices = mesh.n_vertices();
        if selection != Selection::All(n_vertices) {
            return Err(EvalError::InvalidSelection {
                operation: OP,
                reason: "every vertex must be evaluated",
            });
        }
        match array.location {
            Support::Cell if array.stride != 3 => {
                return Err(EvalError::InvalidDimension {
                    operation: OP,
                    dim: array.stride,
                })
            }
            Support::Cell | Support::DualFaceByCell => (),
            support => return Err(EvalError::UnsupportedSupport { operation: OP, support }),
        }
        assert_indexed(array);
        log::debug!("interpolating {:?} array to {n_vertices} vertices", array.location);

        let cell_vector = |c: usize| -> Vec3 {
            match array.location {
                Support::Cell => Vec3::from_column_slice(array.entity(c)),
                _ => {
                    let mut v = [0.; 3];
                    reco::dual_faces_to_cell_center(mesh, c, array.cell_block(c), &mut v);
                    Vec3::from(v)
                }
            }
        };

        // several cells share each vertex, so every task accumulates
        // into its own buffers which are summed at the end
        let accumulate = |mut acc: VertexAccumulator, c: usize| {
            let u = cell_vector(c);
            for (&v, &vol) in mesh.cell_vertices(c).iter().zip(mesh.cell_dual_volumes(c)) {
                acc.weights[v] += vol;
                acc.values[v] += vol * u;
            }
            acc
        };
        let empty = || VertexAccumulator::new(n_vertices);
        let acc = if mesh.n_cells() < self.settings.parallel_threshold {
            (0..mesh.n_cells()).fold(empty(), accumulate)
        } else {
            (0..mesh.n_cells())
                .into_par_iter()
                .fold(empty, accumulate)
                .reduce(empty, VertexAccumulator::merge)
        };

        let n_isolated = acc.weights.iter().filter(|w| **w <= 0.).count();
        if n_isolated > 0 {
            log::warn!("{n_isolated} vertices belong to no cell and are set to zero");
        }
        selection.par_for_each(3, out, self.settings.parallel_threshold, |v, slot| {
            let w = acc.weights[v];
            if w > 0. {
                slot.copy_from_slice((acc.values[v] / w).as_slice());
            } else {
                slot.fill(0.);
            }
        });
        Ok(())
    }

    /// Values of a vertex field at the selected vertices.
    pub fn at_vertices_by_field(
        &self,
        field: &FieldInput,
        selection: Selection,
        out: &mut [f64],
    ) -> Result<()> {
        if field.location != Support::Vertex {
            return Err(EvalError::UnsupportedSupport {
                operation: "at_vertices_by_field",
                support: field.location,
            });
        }
        selection.par_for_each(
            field.dim,
            out,
            self.settings.parallel_threshold,
            |v, slot| slot.copy_from_slice(field.entity(v)),
        );
        Ok(())
    }

    /// Values of a field at the selected cells.
    ///
    /// Cell fields are copied and vertex fields averaged over each cell.
    pub fn at_cells_by_field(
        &self,
        field: &FieldInput,
        selection: Selection,
        out: &mut [f64],
    ) -> Result<()> {
        let mesh = self.mesh;
        let threshold = self.settings.parallel_threshold;
        match field.location {
            Support::Cell => selection.par_for_each(field.dim, out, threshold, |c, slot| {
                slot.copy_from_slice(field.entity(c))
            }),
            Support::Vertex => selection.par_for_each(field.dim, out, threshold, |c, slot| {
                reco::vertex_to_cell_center(mesh, c, field.values, field.dim, slot)
            }),
            support => {
                return Err(EvalError::UnsupportedSupport {
                    operation: "at_cells_by_field",
                    support,
                })
            }
        }
        Ok(())
    }
}

/// Panic unless an array stored by cell blocks has its block index.
fn assert_indexed(array: &ArrayInput) {
    assert!(
        array.location != Support::DualFaceByCell || array.index.is_some(),
        "Dual face arrays need a cell block index, set with ArrayInput::with_index"
    );
}

/// Weighted sums of cell vectors gathered at vertices.
struct VertexAccumulator {
    weights: Vec<f64>,
    values: Vec<Vec3>,
}

impl VertexAccumulator {
    fn new(n_vertices: usize) -> Self {
        Self {
            weights: vec![0.; n_vertices],
            values: vec![Vec3::zeros(); n_vertices],
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (w, ow) in self.weights.iter_mut().zip(&other.weights) {
            *w += ow;
        }
        for (v, ov) in self.values.iter_mut().zip(&other.values) {
            *v += ov;
        }
        self
    }
}

/// Call `piece(triangle, area)` for each triangle of a face:
/// the face itself if it has three vertices,
/// otherwise one triangle per edge closed by the face center.
fn for_each_face_triangle<M>(mesh: &M, f: usize, mut piece: impl FnMut([Vec3; 3], f64))
where
    M: MeshQuantities + ?Sized,
{
    let coords = mesh.vertex_coords();
    let edges = mesh.face_edges(f);
    if let [e0, e1, _] = edges {
        let [a, b] = mesh.edge_vertices(*e0);
        let [c, d] = mesh.edge_vertices(*e1);
        let third = if c == a || c == b { d } else { c };
        piece([coords[a], coords[b], coords[third]], mesh.face_area(f));
        return;
    }
    let xf = mesh.face_center(f);
    for &e in edges {
        let [a, b] = mesh.edge_vertices(e);
        let (xa, xb) = (coords[a], coords[b]);
        piece([xa, xb, xf], triangle_area(xa, xb, xf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cell_mesh::{CellFlags, CellMesh},
        eval::cellwise,
        mesh::{tiny_column, tiny_cube, tiny_prism, tiny_tetra, PolyMesh},
        Pointwise,
    };
    use approx::assert_relative_eq;
    use nalgebra as na;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Evaluator that always runs in parallel.
    fn parallel(mesh: &PolyMesh) -> BulkEvaluator<'_, PolyMesh> {
        BulkEvaluator::with_settings(mesh, EvalSettings::default().with_parallel_threshold(1))
    }

    /// Evaluator that never runs in parallel.
    fn sequential(mesh: &PolyMesh) -> BulkEvaluator<'_, PolyMesh> {
        BulkEvaluator::with_settings(
            mesh,
            EvalSettings::default().with_parallel_threshold(usize::MAX),
        )
    }

    /// Compact and scattered selections of the same cells
    /// give the same values in different layouts.
    #[test]
    fn compact_and_scattered_addressing() {
        init_logger();
        let mesh = tiny_column(10);
        let ids = [2, 5, 7];
        let func = Pointwise(|t: f64, x: &Vec3| Vec3::new(x.z, t, x.x + x.y));
        let cell_values: Vec<f64> = (0..10).map(|c| c as f64 * 10.).collect();
        let vertex_values: Vec<f64> = mesh.vertex_coords().iter().map(|x| x.z).collect();
        let defs = [
            Definition::by_value(Support::Cell, Value::Scalar(4.)),
            Definition::by_analytic(Support::Cell, &func),
            Definition::by_array(Support::Cell, ArrayInput::new(&cell_values, 1, Support::Cell)),
            Definition::by_field(
                Support::Cell,
                FieldInput {
                    dim: 1,
                    location: Support::Vertex,
                    values: &vertex_values,
                },
            ),
        ];

        for eval in [parallel(&mesh), sequential(&mesh)] {
            for def in &defs {
                let dim = def.dim();
                let mut full = vec![0.; 10 * dim];
                let mut scattered = vec![f64::NAN; 10 * dim];
                let mut compact = vec![f64::NAN; 3 * dim];
                eval.evaluate(def, Support::Cell, Selection::All(10), 1., &mut full)
                    .unwrap();
                eval.evaluate(def, Support::Cell, Selection::Scattered(&ids), 1., &mut scattered)
                    .unwrap();
                eval.evaluate(def, Support::Cell, Selection::Compact(&ids), 1., &mut compact)
                    .unwrap();

                for (i, &c) in ids.iter().enumerate() {
                    let expected = &full[dim * c..dim * (c + 1)];
                    assert_eq!(&scattered[dim * c..dim * (c + 1)], expected, "{:?}", def.kind());
                    assert_eq!(&compact[dim * i..dim * (i + 1)], expected, "{:?}", def.kind());
                }
                // entries outside the selection are left alone
                assert!(scattered[0].is_nan());
            }
            let mut out = [0.; 3];
            eval.evaluate(&defs[3], Support::Cell, Selection::Compact(&[4]), 0., &mut out)
                .unwrap();
            assert_relative_eq!(out[0], 4.5, epsilon = 1e-14);
        }
    }

    /// Bulk and cellwise evaluation agree for every kind of definition.
    #[test]
    fn bulk_matches_cellwise() {
        let mesh = tiny_column(4);
        let n_cells = mesh.n_cells();
        let func = Pointwise(|t: f64, x: &Vec3| Vec3::new(x.x * x.z, t * x.y, 1.));
        let cell_values: Vec<f64> = (0..3 * n_cells).map(|i| (i * i) as f64).collect();
        let vertex_values: Vec<f64> = mesh
            .vertex_coords()
            .iter()
            .flat_map(|x| [x.x, x.y, x.z * x.z])
            .collect();
        let mut dual_values = Vec::new();
        let mut dual_index = vec![0];
        for c in 0..n_cells {
            dual_values.extend(
                mesh.cell_dual_faces(c)
                    .iter()
                    .enumerate()
                    .map(|(j, df)| df.x + j as f64),
            );
            dual_index.push(dual_values.len());
        }

        let defs = [
            Definition::by_value(Support::Cell, Value::Vector(Vec3::new(1., 2., 3.))),
            Definition::by_analytic(Support::Cell, &func),
            Definition::by_array(Support::Cell, ArrayInput::new(&cell_values, 3, Support::Cell)),
            Definition::by_array(
                Support::Cell,
                ArrayInput::new(&vertex_values, 3, Support::Vertex),
            ),
            Definition::by_array(
                Support::Cell,
                ArrayInput::new(&dual_values, 1, Support::DualFaceByCell).with_index(&dual_index),
            ),
            Definition::by_field(
                Support::Cell,
                FieldInput {
                    dim: 3,
                    location: Support::Cell,
                    values: &cell_values,
                },
            ),
            Definition::by_field(
                Support::Cell,
                FieldInput {
                    dim: 3,
                    location: Support::Vertex,
                    values: &vertex_values,
                },
            ),
        ];

        let eval = BulkEvaluator::new(&mesh);
        let mut cm = CellMesh::new(CellFlags::all());
        for def in &defs {
            let mut bulk = vec![0.; 3 * n_cells];
            eval.evaluate(def, Support::Cell, Selection::All(n_cells), 2., &mut bulk)
                .unwrap();
            for c in 0..n_cells {
                cm.reset_for(&mesh, c);
                let mut cw = [0.; 3];
                cellwise::cell_value(def, &cm, 2., &mut cw).unwrap();
                assert_relative_eq!(bulk[3 * c..3 * c + 3], cw[..], epsilon = 1e-13);
            }
        }
    }

    /// A constant vector stored at cells is recovered exactly at every vertex.
    #[test]
    fn constant_vector_round_trip_to_vertices() {
        init_logger();
        let u = Value::Vector(Vec3::new(1., 2., 3.));
        for mesh in [tiny_column(5), tiny_prism(), tiny_tetra()] {
            let n_cells = mesh.n_cells();
            let n_vertices = mesh.n_vertices();
            for eval in [parallel(&mesh), sequential(&mesh)] {
                let mut cell_values = vec![0.; 3 * n_cells];
                eval.by_value(&u, Selection::All(n_cells), &mut cell_values);

                let array = ArrayInput::new(&cell_values, 3, Support::Cell);
                let mut at_vertices = vec![0.; 3 * n_vertices];
                eval.vector_at_all_vertices_by_array(
                    &array,
                    Selection::All(n_vertices),
                    &mut at_vertices,
                )
                .unwrap();
                for v in at_vertices.chunks_exact(3) {
                    assert_relative_eq!(v[0], 1., epsilon = 1e-12);
                    assert_relative_eq!(v[1], 2., epsilon = 1e-12);
                    assert_relative_eq!(v[2], 3., epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn vertex_targets_through_evaluate() {
        let mesh = tiny_column(2);
        let n_vertices = mesh.n_vertices();
        let eval = BulkEvaluator::new(&mesh);

        let cell_values = [1., 2., 3., 1., 2., 3.];
        let def = Definition::by_array(
            Support::Cell,
            ArrayInput::new(&cell_values, 3, Support::Cell),
        );
        let mut out = vec![0.; 3 * n_vertices];
        eval.evaluate(&def, Support::Vertex, Selection::All(n_vertices), 0., &mut out)
            .unwrap();
        for v in out.chunks_exact(3) {
            assert_relative_eq!(v[..], [1., 2., 3.][..], epsilon = 1e-12);
        }

        let heights: Vec<f64> = mesh.vertex_coords().iter().map(|x| x.z).collect();
        let def = Definition::by_field(
            Support::Vertex,
            FieldInput {
                dim: 1,
                location: Support::Vertex,
                values: &heights,
            },
        );
        let ids = [11, 0, 4];
        let mut compact = [f64::NAN; 3];
        eval.evaluate(&def, Support::Vertex, Selection::Compact(&ids), 0., &mut compact)
            .unwrap();
        assert_eq!(compact, [2., 0., 1.]);
    }

    /// A vertex outside every cell gets no weight and is set to zero.
    #[test]
    fn isolated_vertex_is_zero() {
        init_logger();
        let mut vertices: Vec<Vec3> = tiny_cube().vertex_coords().to_vec();
        vertices.push(Vec3::new(5., 5., 5.));
        let cube = vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![1, 2, 6, 5],
            vec![2, 3, 7, 6],
            vec![3, 0, 4, 7],
        ];
        let mesh = PolyMesh::new(vertices, &[cube]);
        assert_eq!(mesh.n_vertices(), 9);

        let cell_values = [1., 2., 3.];
        let array = ArrayInput::new(&cell_values, 3, Support::Cell);
        for eval in [parallel(&mesh), sequential(&mesh)] {
            let mut out = vec![f64::NAN; 27];
            eval.vector_at_all_vertices_by_array(&array, Selection::All(9), &mut out)
                .unwrap();
            for v in out[..24].chunks_exact(3) {
                assert_relative_eq!(v[..], [1., 2., 3.][..], epsilon = 1e-12);
            }
            assert_eq!(out[24..], [0., 0., 0.]);
        }
    }

    #[test]
    #[should_panic(expected = "Dual face arrays need a cell block index")]
    fn dual_face_array_without_index() {
        let mesh = tiny_column(2);
        let fluxes = vec![0.; 24];
        let array = ArrayInput::new(&fluxes, 1, Support::DualFaceByCell);
        let mut out = [0.; 6];
        let _ = BulkEvaluator::new(&mesh).at_cells_by_array(&array, Selection::All(2), &mut out);
    }

    #[test]
    fn dual_face_fluxes_round_trip_to_vertices() {
        let mesh = tiny_column(3);
        let u = Vec3::new(-1., 0.5, 2.);
        let mut values = Vec::new();
        let mut index = vec![0];
        for c in 0..mesh.n_cells() {
            values.extend(mesh.cell_dual_faces(c).iter().map(|df| df.dot(&u)));
            index.push(values.len());
        }
        let array = ArrayInput::new(&values, 1, Support::DualFaceByCell).with_index(&index);

        let eval = BulkEvaluator::new(&mesh);
        let mut at_cells = vec![0.; 3 * mesh.n_cells()];
        eval.at_cells_by_array(&array, Selection::All(mesh.n_cells()), &mut at_cells)
            .unwrap();
        for c in at_cells.chunks_exact(3) {
            assert_relative_eq!(Vec3::from_column_slice(c), u, epsilon = 1e-12);
        }

        let mut at_vertices = vec![0.; 3 * mesh.n_vertices()];
        eval.vector_at_all_vertices_by_array(
            &array,
            Selection::All(mesh.n_vertices()),
            &mut at_vertices,
        )
        .unwrap();
        for v in at_vertices.chunks_exact(3) {
            assert_relative_eq!(Vec3::from_column_slice(v), u, epsilon = 1e-12);
        }
    }

    #[test]
    fn boundary_faces() {
        let mesh = tiny_prism();
        let eval = parallel(&mesh);
        let n_bf = mesh.n_boundary_faces();
        assert_eq!(n_bf, 5);

        let square = Pointwise(|_t: f64, x: &Vec3| na::Vector1::new(x.z * x.z));
        let mut at_centers = vec![0.; n_bf];
        eval.at_boundary_faces_by_analytic(&square, Selection::All(n_bf), 0., &mut at_centers);
        for (bf, val) in at_centers.iter().enumerate() {
            let z = mesh.boundary_face_centers()[bf].z;
            assert_relative_eq!(*val, z * z, epsilon = 1e-14);
        }

        let mut avg = vec![0.; n_bf];
        eval.avg_at_boundary_faces_by_analytic(
            &square,
            Selection::All(n_bf),
            0.,
            QuadratureType::Higher,
            &mut avg,
        )
        .unwrap();
        for (bf, val) in avg.iter().enumerate() {
            let f = mesh.boundary_face(bf);
            // side faces span z in [0, 1], caps are at constant z
            let expected = if mesh.face_normal(f).z.abs() > 0.5 {
                at_centers[bf]
            } else {
                1. / 3.
            };
            assert_relative_eq!(*val, expected, epsilon = 1e-14);
        }

        // same through the definition, with the level taken from the settings
        let higher = BulkEvaluator::with_settings(
            &mesh,
            EvalSettings::default().with_quadrature(QuadratureType::Higher),
        );
        let def = Definition::by_analytic(Support::BoundaryFace, &square);
        let mut from_def = vec![0.; n_bf];
        higher
            .avg_at_boundary_faces(&def, Selection::All(n_bf), 0., &mut from_def)
            .unwrap();
        assert_relative_eq!(from_def[..], avg[..], epsilon = 1e-15);
    }

    #[test]
    fn invalid_requests() {
        let mesh = tiny_column(2);
        let eval = BulkEvaluator::new(&mesh);
        let values = vec![0.; 3 * mesh.n_cells()];
        let array = ArrayInput::new(&values, 3, Support::Cell);
        let mut out = vec![0.; 3 * mesh.n_vertices()];

        assert_eq!(
            eval.vector_at_all_vertices_by_array(&array, Selection::Compact(&[0, 1]), &mut out),
            Err(EvalError::InvalidSelection {
                operation: "vector_at_all_vertices_by_array",
                reason: "every vertex must be evaluated",
            })
        );
        assert_eq!(
            eval.at_vertices_by_array(&array, Selection::All(2), &mut out),
            Err(EvalError::UnsupportedSupport {
                operation: "at_vertices_by_array",
                support: Support::Cell,
            })
        );
        let field = FieldInput {
            dim: 3,
            location: Support::Cell,
            values: &values,
        };
        assert_eq!(
            eval.at_vertices_by_field(&field, Selection::All(2), &mut out),
            Err(EvalError::UnsupportedSupport {
                operation: "at_vertices_by_field",
                support: Support::Cell,
            })
        );
        let def = Definition::by_array(Support::Cell, array);
        assert_eq!(
            eval.evaluate(&def, Support::Vertex, Selection::Compact(&[0, 1]), 0., &mut out),
            Err(EvalError::InvalidSelection {
                operation: "vector_at_all_vertices_by_array",
                reason: "every vertex must be evaluated",
            })
        );
        assert_eq!(
            eval.evaluate(&def, Support::BoundaryFace, Selection::All(1), 0., &mut out),
            Err(EvalError::UnsupportedSupport {
                operation: "evaluate",
                support: Support::BoundaryFace,
            })
        );
    }

    #[test]
    fn large_analytic_batches_are_split() {
        let mesh = tiny_column(40);
        let func = Pointwise(|_t: f64, x: &Vec3| na::Vector1::new(x.z));
        let ids: Vec<usize> = (0..40).rev().collect();

        let split = BulkEvaluator::with_settings(
            &mesh,
            EvalSettings::default().with_parallel_threshold(7),
        );
        let mut all = vec![0.; 40];
        split.at_cells_by_analytic(&func, Selection::All(40), 0., &mut all);
        let mut compact = vec![0.; 40];
        split.at_cells_by_analytic(&func, Selection::Compact(&ids), 0., &mut compact);
        for c in 0..40 {
            assert_relative_eq!(all[c], c as f64 + 0.5, epsilon = 1e-13);
            assert_relative_eq!(compact[39 - c], all[c]);
        }
    }
}
