//! Geometry quantities over a half-edge mesh.
//!
//! `VertexPositionGeometry` owns the mesh and its embedding and memoizes
//! derived quantities on first access. Caches live as long as the geometry
//! object; the mesh connectivity and positions are immutable once built.
//!
//! Tangent-space conventions: every vertex carries a local angular basis in
//! which the outgoing halfedge fan is laid out by rescaled corner angles
//! (full wedge normalized to 2π at interior vertices, π on the boundary).
//! Tangent vectors are unit-magnitude-per-radian complex numbers in that
//! basis; transporting along a halfedge multiplies by a unit rotation.

use crate::mesh::{SurfaceMesh, INVALID_INDEX};
use anyhow::{bail, Result};
use nalgebra::Vector3;
use num_complex::Complex;
use std::cell::OnceCell;
use std::f64::consts::PI;

#[derive(Debug, Clone)]
pub struct VertexPositionGeometry {
    mesh: SurfaceMesh,
    positions: Vec<Vector3<f64>>,
    edge_lengths: OnceCell<Vec<f64>>,
    face_areas: OnceCell<Vec<f64>>,
    corner_angles: OnceCell<Vec<f64>>,
    vertex_angle_sums: OnceCell<Vec<f64>>,
    corner_scaled_angles: OnceCell<Vec<f64>>,
    halfedge_vectors_in_vertex: OnceCell<Vec<Complex<f64>>>,
    transport_vectors: OnceCell<Vec<Complex<f64>>>,
    halfedge_cotan_weights: OnceCell<Vec<f64>>,
    vertex_dual_areas: OnceCell<Vec<f64>>,
}

impl VertexPositionGeometry {
    pub fn new(mesh: SurfaceMesh, positions: Vec<Vector3<f64>>) -> Result<Self> {
        if positions.len() != mesh.n_vertices() {
            bail!(
                "got {} positions for a mesh with {} vertices",
                positions.len(),
                mesh.n_vertices()
            );
        }
        Ok(Self {
            mesh,
            positions,
            edge_lengths: OnceCell::new(),
            face_areas: OnceCell::new(),
            corner_angles: OnceCell::new(),
            vertex_angle_sums: OnceCell::new(),
            corner_scaled_angles: OnceCell::new(),
            halfedge_vectors_in_vertex: OnceCell::new(),
            transport_vectors: OnceCell::new(),
            halfedge_cotan_weights: OnceCell::new(),
            vertex_dual_areas: OnceCell::new(),
        })
    }

    pub fn mesh(&self) -> &SurfaceMesh {
        &self.mesh
    }

    pub fn position(&self, v: usize) -> Vector3<f64> {
        self.positions[v]
    }

    pub fn edge_lengths(&self) -> &[f64] {
        self.edge_lengths.get_or_init(|| {
            (0..self.mesh.n_edges())
                .map(|e| {
                    let (a, b) = self.mesh.edge_vertices(e);
                    (self.positions[b] - self.positions[a]).norm()
                })
                .collect()
        })
    }

    pub fn edge_length(&self, e: usize) -> f64 {
        self.edge_lengths()[e]
    }

    pub fn face_areas(&self) -> &[f64] {
        self.face_areas.get_or_init(|| {
            (0..self.mesh.n_faces())
                .map(|f| {
                    let [a, b, c] = self.face_vertices(f);
                    let u = self.positions[b] - self.positions[a];
                    let w = self.positions[c] - self.positions[a];
                    0.5 * u.cross(&w).norm()
                })
                .collect()
        })
    }

    pub fn face_area(&self, f: usize) -> f64 {
        self.face_areas()[f]
    }

    /// Interior angle at the tail corner of each halfedge.
    pub fn corner_angles(&self) -> &[f64] {
        self.corner_angles.get_or_init(|| {
            (0..self.mesh.n_halfedges())
                .map(|he| {
                    let v = self.mesh.tail_vertex(he);
                    let u = self.positions[self.mesh.tip_vertex(he)] - self.positions[v];
                    let w =
                        self.positions[self.mesh.tail_vertex(self.mesh.prev(he))] - self.positions[v];
                    u.cross(&w).norm().atan2(u.dot(&w))
                })
                .collect()
        })
    }

    pub fn vertex_angle_sums(&self) -> &[f64] {
        self.vertex_angle_sums.get_or_init(|| {
            let angles = self.corner_angles();
            let mut sums = vec![0.0; self.mesh.n_vertices()];
            for he in 0..self.mesh.n_halfedges() {
                sums[self.mesh.tail_vertex(he)] += angles[he];
            }
            sums
        })
    }

    /// Corner angles rescaled so each vertex wedge totals 2π (interior) or
    /// π (boundary).
    pub fn corner_scaled_angles(&self) -> &[f64] {
        self.corner_scaled_angles.get_or_init(|| {
            let angles = self.corner_angles();
            let sums = self.vertex_angle_sums();
            (0..self.mesh.n_halfedges())
                .map(|he| {
                    let v = self.mesh.tail_vertex(he);
                    let full = if self.mesh.is_boundary_vertex(v) { PI } else { 2.0 * PI };
                    angles[he] * full / sums[v]
                })
                .collect()
        })
    }

    /// Each outgoing halfedge expressed in its tail vertex's angular basis,
    /// with magnitude equal to the edge length.
    pub fn halfedge_vectors_in_vertex(&self) -> &[Complex<f64>] {
        self.halfedge_vectors_in_vertex.get_or_init(|| {
            let scaled = self.corner_scaled_angles();
            let mut vectors = vec![Complex::new(0.0, 0.0); self.mesh.n_halfedges()];
            for v in 0..self.mesh.n_vertices() {
                let mut coordinate = 0.0;
                for he in self.mesh.outgoing_halfedges(v) {
                    let length = self.edge_length(self.mesh.halfedge_edge(he));
                    vectors[he] = Complex::from_polar(length, coordinate);
                    coordinate += scaled[he];
                }
            }
            vectors
        })
    }

    pub fn halfedge_vector_in_vertex(&self, he: usize) -> Complex<f64> {
        self.halfedge_vectors_in_vertex()[he]
    }

    /// Unit rotation carrying tangent vectors from the tail vertex's basis
    /// to the tip vertex's basis along each halfedge. Across a boundary
    /// edge the missing exterior coordinate is the boundary wedge angle π.
    pub fn transport_vectors_along_halfedge(&self) -> &[Complex<f64>] {
        self.transport_vectors.get_or_init(|| {
            let vectors = self.halfedge_vectors_in_vertex();
            (0..self.mesh.n_halfedges())
                .map(|he| {
                    let twin = self.mesh.twin(he);
                    let in_tip = if twin == INVALID_INDEX {
                        Complex::from_polar(1.0, PI)
                    } else {
                        vectors[twin]
                    };
                    let rotation = -in_tip / vectors[he];
                    rotation / rotation.norm()
                })
                .collect()
        })
    }

    pub fn transport_along_halfedge(&self, he: usize) -> Complex<f64> {
        self.transport_vectors_along_halfedge()[he]
    }

    /// Half the cotangent of the corner angle opposite each halfedge.
    pub fn halfedge_cotan_weights(&self) -> &[f64] {
        self.halfedge_cotan_weights.get_or_init(|| {
            (0..self.mesh.n_halfedges())
                .map(|he| {
                    let apex = self.mesh.tail_vertex(self.mesh.prev(he));
                    let u = self.positions[self.mesh.tail_vertex(he)] - self.positions[apex];
                    let w = self.positions[self.mesh.tip_vertex(he)] - self.positions[apex];
                    let cross = u.cross(&w).norm();
                    if cross > 0.0 {
                        0.5 * u.dot(&w) / cross
                    } else {
                        0.0
                    }
                })
                .collect()
        })
    }

    pub fn halfedge_cotan_weight(&self, he: usize) -> f64 {
        self.halfedge_cotan_weights()[he]
    }

    /// Barycentric dual area: one third of the incident face areas.
    pub fn vertex_dual_areas(&self) -> &[f64] {
        self.vertex_dual_areas.get_or_init(|| {
            let areas = self.face_areas();
            let mut dual = vec![0.0; self.mesh.n_vertices()];
            for f in 0..self.mesh.n_faces() {
                let share = areas[f] / 3.0;
                for he in self.mesh.face_halfedges(f) {
                    dual[self.mesh.tail_vertex(he)] += share;
                }
            }
            dual
        })
    }

    pub fn vertex_dual_area(&self, v: usize) -> f64 {
        self.vertex_dual_areas()[v]
    }

    fn face_vertices(&self, f: usize) -> [usize; 3] {
        self.mesh.face_halfedges(f).map(|he| self.mesh.tail_vertex(he))
    }
}
