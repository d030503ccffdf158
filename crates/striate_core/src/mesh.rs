//! Half-edge mesh connectivity.
//!
//! The mesh is an arena of vertex/edge/face/halfedge records addressed by
//! plain integer indices. Connectivity is fixed at construction time; all
//! traversal queries are index-following loops.

use anyhow::{bail, Result};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Sentinel index marking a missing adjacency (e.g. the twin of a halfedge
/// on the mesh boundary).
pub const INVALID_INDEX: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
pub struct Halfedge {
    /// Next halfedge around the same face.
    pub next: usize,
    /// Oppositely oriented halfedge across the shared edge, `INVALID_INDEX`
    /// when the edge lies on the boundary.
    pub twin: usize,
    /// Tail vertex.
    pub vertex: usize,
    pub edge: usize,
    pub face: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    /// One outgoing halfedge; for boundary vertices this is the outgoing
    /// halfedge without a twin, so the vertex fan starts on the boundary.
    pub halfedge: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Edge {
    /// Canonical halfedge of the edge.
    pub halfedge: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Face {
    pub halfedge: usize,
}

/// Triangulated surface mesh with manifold, consistently oriented faces.
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    faces: Vec<Face>,
    halfedges: Vec<Halfedge>,
}

impl SurfaceMesh {
    /// Builds the connectivity arena from counterclockwise triangle index
    /// triples. Fails on out-of-range indices, degenerate triangles,
    /// inconsistent orientation, and edges bordering more than two faces.
    pub fn from_triangles(n_vertices: usize, triangles: &[[usize; 3]]) -> Result<Self> {
        let mut halfedges = Vec::with_capacity(3 * triangles.len());
        let mut faces = Vec::with_capacity(triangles.len());
        for (fi, tri) in triangles.iter().enumerate() {
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
                bail!("face {fi} repeats a vertex: {tri:?}");
            }
            for k in 0..3 {
                if tri[k] >= n_vertices {
                    bail!(
                        "face {fi} references vertex {} but the mesh has {n_vertices} vertices",
                        tri[k]
                    );
                }
                halfedges.push(Halfedge {
                    next: 3 * fi + (k + 1) % 3,
                    twin: INVALID_INDEX,
                    vertex: tri[k],
                    edge: INVALID_INDEX,
                    face: fi,
                });
            }
            faces.push(Face { halfedge: 3 * fi });
        }

        // Resolve twins through the unordered endpoint pair. An entry is
        // cleared to INVALID_INDEX once paired so a third halfedge on the
        // same pair is caught.
        let mut edges: Vec<Edge> = Vec::new();
        let mut open_pairs: HashMap<(usize, usize), usize> = HashMap::new();
        for he in 0..halfedges.len() {
            let tail = halfedges[he].vertex;
            let tip = halfedges[halfedges[he].next].vertex;
            let key = (tail.min(tip), tail.max(tip));
            match open_pairs.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(he);
                }
                Entry::Occupied(mut slot) => {
                    let other = *slot.get();
                    if other == INVALID_INDEX {
                        bail!("edge ({}, {}) borders more than two faces", key.0, key.1);
                    }
                    if halfedges[other].vertex == tail {
                        bail!(
                            "faces {} and {} disagree on orientation across edge ({}, {})",
                            halfedges[other].face,
                            halfedges[he].face,
                            key.0,
                            key.1
                        );
                    }
                    halfedges[other].twin = he;
                    halfedges[he].twin = other;
                    let edge = edges.len();
                    edges.push(Edge { halfedge: other });
                    halfedges[other].edge = edge;
                    halfedges[he].edge = edge;
                    slot.insert(INVALID_INDEX);
                }
            }
        }
        for he in 0..halfedges.len() {
            if halfedges[he].edge == INVALID_INDEX {
                let edge = edges.len();
                edges.push(Edge { halfedge: he });
                halfedges[he].edge = edge;
            }
        }

        let mut vertices = vec![Vertex { halfedge: INVALID_INDEX }; n_vertices];
        for (he, record) in halfedges.iter().enumerate() {
            if vertices[record.vertex].halfedge == INVALID_INDEX {
                vertices[record.vertex].halfedge = he;
            }
        }
        // Boundary vertices start their fan at the twin-less outgoing
        // halfedge so circulation covers the whole wedge.
        for (he, record) in halfedges.iter().enumerate() {
            if record.twin == INVALID_INDEX {
                vertices[record.vertex].halfedge = he;
            }
        }

        Ok(Self {
            vertices,
            edges,
            faces,
            halfedges,
        })
    }

    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn n_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    pub fn next(&self, he: usize) -> usize {
        self.halfedges[he].next
    }

    pub fn prev(&self, he: usize) -> usize {
        self.halfedges[self.halfedges[he].next].next
    }

    /// Twin of a halfedge, `INVALID_INDEX` across the boundary.
    pub fn twin(&self, he: usize) -> usize {
        self.halfedges[he].twin
    }

    pub fn tail_vertex(&self, he: usize) -> usize {
        self.halfedges[he].vertex
    }

    pub fn tip_vertex(&self, he: usize) -> usize {
        self.halfedges[self.halfedges[he].next].vertex
    }

    pub fn halfedge_edge(&self, he: usize) -> usize {
        self.halfedges[he].edge
    }

    pub fn halfedge_face(&self, he: usize) -> usize {
        self.halfedges[he].face
    }

    pub fn edge_halfedge(&self, e: usize) -> usize {
        self.edges[e].halfedge
    }

    /// Endpoints of an edge, tail and tip of its canonical halfedge.
    pub fn edge_vertices(&self, e: usize) -> (usize, usize) {
        let he = self.edges[e].halfedge;
        (self.tail_vertex(he), self.tip_vertex(he))
    }

    pub fn is_boundary_edge(&self, e: usize) -> bool {
        self.halfedges[self.edges[e].halfedge].twin == INVALID_INDEX
    }

    /// Face on the other side of a halfedge's edge, `None` across the
    /// boundary.
    pub fn opposite_face(&self, he: usize) -> Option<usize> {
        let twin = self.halfedges[he].twin;
        if twin == INVALID_INDEX {
            None
        } else {
            Some(self.halfedges[twin].face)
        }
    }

    pub fn face_halfedges(&self, f: usize) -> [usize; 3] {
        let first = self.faces[f].halfedge;
        let second = self.halfedges[first].next;
        [first, second, self.halfedges[second].next]
    }

    pub fn vertex_halfedge(&self, v: usize) -> usize {
        self.vertices[v].halfedge
    }

    pub fn is_boundary_vertex(&self, v: usize) -> bool {
        let he = self.vertices[v].halfedge;
        he == INVALID_INDEX || self.halfedges[he].twin == INVALID_INDEX
    }

    /// Outgoing halfedges around a vertex in counterclockwise order. For a
    /// boundary vertex the fan starts at the twin-less halfedge and stops
    /// at the boundary on the other side.
    pub fn outgoing_halfedges(&self, v: usize) -> Vec<usize> {
        let start = self.vertices[v].halfedge;
        if start == INVALID_INDEX {
            return Vec::new();
        }
        let mut fan = Vec::new();
        let mut he = start;
        loop {
            fan.push(he);
            let next = self.twin(self.prev(he));
            if next == INVALID_INDEX || next == start {
                break;
            }
            he = next;
        }
        fan
    }
}
