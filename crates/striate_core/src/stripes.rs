//! Stripe patterns on triangulated surfaces.
//!
//! Implementation of "Stripe Patterns on Surfaces" [Knoppel et al. 2015]:
//! given per-vertex target frequencies and a line field (power-2 symmetric,
//! so directions carry a ±180° ambiguity), compute a 2π-periodic function on
//! triangle corners whose 0 (mod 2π) isolines trace evenly spaced stripes
//! aligned with the field, then extract those isolines as polylines.
//!
//! The pipeline runs strictly forward: a discrete 1-form on edges feeds a
//! doubled-real energy/mass matrix pair, the smallest generalized
//! eigenvector becomes a per-vertex unit parameterization, per-face phase
//! integration turns it into corner values, and a face-walking tracer
//! stitches the modulo-2π crossings into curves.

use crate::direction_fields::compute_face_index;
use crate::geometry::VertexPositionGeometry;
use crate::mesh::INVALID_INDEX;
use crate::solvers::smallest_eigenvector_positive_definite;
use anyhow::{bail, Context, Result};
use log::debug;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

const EIGEN_ITERATIONS: usize = 50;
/// Uniform diagonal shift keeping the energy factorizable on degenerate
/// input.
const DIAGONAL_SHIFT: f64 = 1e-4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StripeError {
    /// A traced face produced more than two stripe crossings. Isolines stop
    /// at singularities, so a branch means the singularity indices do not
    /// match the corner values.
    #[error("isoline branches at face {face}; isolines may only branch at singularities")]
    IsolineBranching { face: usize },
}

/// Output of [`compute_stripe_pattern`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripePattern {
    /// 2π-periodic phase at each triangle corner, indexed by halfedge.
    pub texture_coordinates: Vec<f64>,
    /// Winding defect of the corner phases around each face.
    pub stripe_indices: Vec<i32>,
    /// Singularity index of the input direction field on each face.
    pub field_indices: Vec<i32>,
}

/// One stripe: an ordered list of (halfedge, barycentric parameter) pairs,
/// each locating a point on that halfedge's edge. Consecutive entries lie
/// on edges of face-adjacent triangles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Isoline {
    pub barycenters: Vec<(usize, f64)>,
    /// False when the trace returned to its seed face and closed a loop.
    pub open: bool,
}

/// Isolines realized in 3D: a flat xyz point list and segment index pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolylineGeometry {
    pub points: Vec<f64>,
    pub segments: Vec<[usize; 2]>,
}

fn dot(a: Complex<f64>, b: Complex<f64>) -> f64 {
    a.re * b.re + a.im * b.im
}

/// Discrete 1-form on an edge: the expected phase advance of the periodic
/// field along the edge (eq. 7 of [Knoppel et al. 2015]), plus whether the
/// endpoints' field roots point to different sheets of the double cover.
fn compute_omega(
    geometry: &VertexPositionGeometry,
    direction_field: &[Complex<f64>],
    frequencies: &[f64],
    edge: usize,
) -> (f64, bool) {
    let mesh = geometry.mesh();
    let he = mesh.edge_halfedge(edge);
    let (vi, vj) = mesh.edge_vertices(edge);

    // roots of the line field, halving the stored doubled angle
    let root_i = Complex::from_polar(1.0, direction_field[vi].arg() / 2.0);
    let root_j = Complex::from_polar(1.0, direction_field[vj].arg() / 2.0);

    // transported root of i against the root of j picks the sheet
    let transport = geometry.transport_along_halfedge(he);
    let sign = if dot(transport * root_i, root_j) > 0.0 { 1.0 } else { -1.0 };
    let crosses_sheets = sign < 0.0;

    let length = geometry.edge_length(edge);
    let phi_i = root_i.arg();
    let phi_j = (sign * root_j).arg();

    // angle of the edge in each endpoint's local basis
    let theta_i = geometry.halfedge_vector_in_vertex(he).arg();
    let theta_j = theta_i + transport.arg();

    let omega = (length / 2.0)
        * (frequencies[vi] * (phi_i - theta_i).cos() + frequencies[vj] * (phi_j - theta_j).cos());
    (omega, crosses_sheets)
}

/// Laplace-like energy with 2x2 real blocks per vertex pair. The doubled
/// entries encode multiplication by `w · exp(iω)`, with one quadrant
/// negated on sheet-crossing edges to encode complex conjugation.
fn build_vertex_energy_matrix(
    geometry: &VertexPositionGeometry,
    direction_field: &[Complex<f64>],
    branch_indices: &[i32],
    frequencies: &[f64],
) -> CscMatrix<f64> {
    let mesh = geometry.mesh();
    let n = 2 * mesh.n_vertices();
    let mut triplets = CooMatrix::new(n, n);

    for edge in 0..mesh.n_edges() {
        let (omega, crosses_sheets) = compute_omega(geometry, direction_field, frequencies, edge);

        // cotangent weight; triangles carrying a field singularity do not
        // participate in the smooth energy
        let he = mesh.edge_halfedge(edge);
        let mut weight = 0.0;
        if branch_indices[mesh.halfedge_face(he)] == 0 {
            weight += geometry.halfedge_cotan_weight(he);
        }
        let twin = mesh.twin(he);
        if twin != INVALID_INDEX && branch_indices[mesh.halfedge_face(twin)] == 0 {
            weight += geometry.halfedge_cotan_weight(twin);
        }

        let (vi, vj) = mesh.edge_vertices(edge);
        let i = 2 * vi;
        let j = 2 * vj;

        triplets.push(i, i, weight);
        triplets.push(i + 1, i + 1, weight);
        triplets.push(j, j, weight);
        triplets.push(j + 1, j + 1, weight);

        let mut rotation = weight * Complex::from_polar(1.0, omega);

        // these entries are the same whether or not the edge crosses sheets
        triplets.push(i, j, -rotation.re);
        triplets.push(i + 1, j, rotation.im);
        triplets.push(j, i, -rotation.re);
        triplets.push(j, i + 1, rotation.im);

        if crosses_sheets {
            rotation = -rotation;
        }
        triplets.push(i, j + 1, -rotation.im);
        triplets.push(i + 1, j + 1, -rotation.re);
        triplets.push(j + 1, i, -rotation.im);
        triplets.push(j + 1, i + 1, -rotation.re);
    }

    for d in 0..n {
        triplets.push(d, d, DIAGONAL_SHIFT);
    }
    CscMatrix::from(&triplets)
}

/// Lumped mass matrix: each vertex dual area, replicated into both real
/// coordinate slots.
fn build_vertex_mass_matrix(geometry: &VertexPositionGeometry) -> CscMatrix<f64> {
    let mesh = geometry.mesh();
    let n = 2 * mesh.n_vertices();
    let mut triplets = CooMatrix::new(n, n);
    for v in 0..mesh.n_vertices() {
        let area = geometry.vertex_dual_area(v);
        triplets.push(2 * v, 2 * v, area);
        triplets.push(2 * v + 1, 2 * v + 1, area);
    }
    CscMatrix::from(&triplets)
}

/// Smallest eigenvector of the (energy, mass) pair, reshaped to one unit
/// complex value per vertex.
fn compute_parameterization(
    geometry: &VertexPositionGeometry,
    direction_field: &[Complex<f64>],
    branch_indices: &[i32],
    frequencies: &[f64],
) -> Result<Vec<Complex<f64>>> {
    let energy = build_vertex_energy_matrix(geometry, direction_field, branch_indices, frequencies);
    let mass = build_vertex_mass_matrix(geometry);
    let solution = smallest_eigenvector_positive_definite(&energy, &mass, EIGEN_ITERATIONS)
        .context("failed to solve the stripe pattern eigenvalue problem")?;

    let n_vertices = geometry.mesh().n_vertices();
    let mut parameterization = Vec::with_capacity(n_vertices);
    for v in 0..n_vertices {
        let psi = Complex::new(solution[2 * v], solution[2 * v + 1]);
        if psi.is_zero() {
            bail!("parameterization vanishes at vertex {v}; check for zero-area or isolated vertices");
        }
        parameterization.push(psi / psi.norm());
    }
    Ok(parameterization)
}

/// Integrates the connection around each face to assign a phase to every
/// corner, and reports the rounded winding discrepancy as the face's stripe
/// singularity index.
///
/// The sheet-crossing sign rules below are the case table of
/// [Knoppel et al. 2015] and are applied as given.
fn compute_texture_coordinates(
    geometry: &VertexPositionGeometry,
    direction_field: &[Complex<f64>],
    frequencies: &[f64],
    parameterization: &[Complex<f64>],
) -> (Vec<f64>, Vec<i32>) {
    let mesh = geometry.mesh();
    let mut texture_coordinates = vec![0.0; mesh.n_halfedges()];
    let mut stripe_indices = vec![0i32; mesh.n_faces()];

    for f in 0..mesh.n_faces() {
        let [hij, hjk, hki] = mesh.face_halfedges(f);

        let psi_i = parameterization[mesh.tail_vertex(hij)];
        let mut psi_j = parameterization[mesh.tail_vertex(hjk)];
        let mut psi_k = parameterization[mesh.tail_vertex(hki)];

        // orientation of each halfedge against its edge's canonical one
        let c_ij = if mesh.edge_halfedge(mesh.halfedge_edge(hij)) != hij { -1.0 } else { 1.0 };
        let c_jk = if mesh.edge_halfedge(mesh.halfedge_edge(hjk)) != hjk { -1.0 } else { 1.0 };
        let c_ki = if mesh.edge_halfedge(mesh.halfedge_edge(hki)) != hki { -1.0 } else { 1.0 };

        let (omega, crosses_ij) =
            compute_omega(geometry, direction_field, frequencies, mesh.halfedge_edge(hij));
        let mut omega_ij = c_ij * omega;
        let (omega, _crosses_jk) =
            compute_omega(geometry, direction_field, frequencies, mesh.halfedge_edge(hjk));
        let mut omega_jk = c_jk * omega;
        let (omega, crosses_ki) =
            compute_omega(geometry, direction_field, frequencies, mesh.halfedge_edge(hki));
        let mut omega_ki = c_ki * omega;

        if crosses_ij {
            psi_j = psi_j.conj();
            omega_ij *= c_ij;
            omega_jk *= -c_jk;
        }
        if crosses_ki {
            psi_k = psi_k.conj();
            omega_ki *= -c_ki;
            omega_jk *= c_jk;
        }

        let r_ij = Complex::from_polar(1.0, omega_ij);
        let r_jk = Complex::from_polar(1.0, omega_jk);
        let r_ki = Complex::from_polar(1.0, omega_ki);

        // corner phases closest to the target 1-form, walked around the face
        let alpha_i = psi_i.arg();
        let alpha_j = alpha_i + omega_ij - (r_ij * psi_i / psi_j).arg();
        let alpha_k = alpha_j + omega_jk - (r_jk * psi_j / psi_k).arg();
        let alpha_l = alpha_k + omega_ki - (r_ki * psi_k / psi_i).arg();

        texture_coordinates[hij] = alpha_i;
        texture_coordinates[hjk] = alpha_j;
        texture_coordinates[hki] = alpha_k;
        stripe_indices[f] = ((alpha_l - alpha_i) / (2.0 * PI)).round() as i32;
    }
    (texture_coordinates, stripe_indices)
}

/// Computes the periodic stripe pattern for a target frequency field and a
/// line field given in the power representation.
///
/// Returns the corner phases together with the stripe and field singularity
/// indices per face. Frequencies are cycles per unit length; they are
/// rescaled by 2π internally.
pub fn compute_stripe_pattern(
    geometry: &VertexPositionGeometry,
    frequencies: &[f64],
    direction_field: &[Complex<f64>],
) -> Result<StripePattern> {
    let n_vertices = geometry.mesh().n_vertices();
    if frequencies.len() != n_vertices {
        bail!(
            "frequency field has {} entries for a mesh with {n_vertices} vertices",
            frequencies.len()
        );
    }
    if direction_field.len() != n_vertices {
        bail!(
            "direction field has {} entries for a mesh with {n_vertices} vertices",
            direction_field.len()
        );
    }

    // the line field's two-fold symmetry
    let field_indices = compute_face_index(geometry, direction_field, 2)?;

    let scaled: Vec<f64> = frequencies.iter().map(|f| 2.0 * PI * f).collect();
    let parameterization =
        compute_parameterization(geometry, direction_field, &field_indices, &scaled)?;
    let (texture_coordinates, stripe_indices) =
        compute_texture_coordinates(geometry, direction_field, &scaled, &parameterization);

    Ok(StripePattern {
        texture_coordinates,
        stripe_indices,
        field_indices,
    })
}

/// Whether some multiple of 2π lies strictly between the two values; on a
/// crossing, returns the barycentric parameter of the crossing point,
/// measured toward the first value.
fn crosses_modulo_2pi(val1: f64, val2: f64) -> Option<f64> {
    if val1 == val2 {
        return None;
    }
    let tau = 2.0 * PI;
    if val1 < val2 {
        let isoval = tau * (val1 / tau).ceil();
        if val2 > isoval {
            return Some((isoval - val2) / (val1 - val2));
        }
    } else {
        let isoval = tau * (val2 / tau).ceil();
        if val1 > isoval {
            return Some((isoval - val2) / (val1 - val2));
        }
    }
    None
}

/// Traces the 0 (mod 2π) level set of the corner values into isolines.
///
/// Faces carrying a stripe or field singularity never seed or continue a
/// trace; a trace ends at such a face or at the mesh boundary, or closes on
/// itself back at its seed face. A face producing more than two crossings
/// is reported as [`StripeError::IsolineBranching`].
pub fn extract_isolines_from_stripe_pattern(
    geometry: &VertexPositionGeometry,
    stripe_values: &[f64],
    stripe_indices: &[i32],
    field_indices: &[i32],
) -> Result<Vec<Isoline>> {
    let mesh = geometry.mesh();
    if stripe_values.len() != mesh.n_halfedges() {
        bail!(
            "corner value field has {} entries for a mesh with {} halfedges",
            stripe_values.len(),
            mesh.n_halfedges()
        );
    }
    if stripe_indices.len() != mesh.n_faces() || field_indices.len() != mesh.n_faces() {
        bail!(
            "singularity index fields have {} and {} entries for a mesh with {} faces",
            stripe_indices.len(),
            field_indices.len(),
            mesh.n_faces()
        );
    }

    let mut isolines = Vec::new();
    let mut visited = vec![false; mesh.n_faces()];

    for f in 0..mesh.n_faces() {
        if visited[f] || stripe_indices[f] != 0 || field_indices[f] != 0 {
            continue;
        }
        visited[f] = true;

        let mut barycenters: Vec<(usize, f64)> = Vec::new();
        let mut open = true;
        let mut pieces = 0usize;

        for h in mesh.face_halfedges(f) {
            let Some(seed_bary) = crosses_modulo_2pi(stripe_values[h], stripe_values[mesh.next(h)])
            else {
                continue;
            };
            pieces += 1;
            let mut trace = vec![(h, seed_bary)];

            let mut prev_face = f;
            let mut current = mesh.opposite_face(h);
            let mut done = false;
            while let Some(face) = current {
                if done || stripe_indices[face] != 0 || field_indices[face] != 0 {
                    break;
                }
                visited[face] = true;
                done = true;
                for he in mesh.face_halfedges(face) {
                    let opposite = mesh.opposite_face(he);
                    if opposite == Some(prev_face) {
                        // the shared edge was already consumed
                        continue;
                    }
                    let Some(bary) =
                        crosses_modulo_2pi(stripe_values[he], stripe_values[mesh.next(he)])
                    else {
                        continue;
                    };
                    match opposite {
                        Some(other) if visited[other] => {
                            done = true;
                            if other == f {
                                open = false; // back at the seed face: a loop
                            }
                        }
                        _ => {
                            done = match opposite {
                                None => true,
                                Some(other) => {
                                    stripe_indices[other] != 0 || field_indices[other] != 0
                                }
                            };
                            trace.push((he, bary));
                            prev_face = face;
                            current = opposite;
                        }
                    }
                    break;
                }
            }

            // the first partial trace is reversed so both pieces found from
            // the seed face run in one consistent direction
            if barycenters.is_empty() {
                barycenters.extend(trace.into_iter().rev());
            } else {
                barycenters.extend(trace);
            }
        }

        if pieces > 0 {
            isolines.push(Isoline { barycenters, open });
        }
        if pieces > 2 {
            return Err(StripeError::IsolineBranching { face: f }.into());
        }
    }
    debug!("traced {} isolines", isolines.len());
    Ok(isolines)
}

/// Materializes the traced isolines into 3D points and segment index pairs.
/// Closed isolines get one extra segment connecting their endpoints.
pub fn extract_polylines_from_stripe_pattern(
    geometry: &VertexPositionGeometry,
    stripe_values: &[f64],
    stripe_indices: &[i32],
    field_indices: &[i32],
) -> Result<PolylineGeometry> {
    let isolines =
        extract_isolines_from_stripe_pattern(geometry, stripe_values, stripe_indices, field_indices)?;
    let mesh = geometry.mesh();

    let mut points = Vec::new();
    let mut segments = Vec::new();
    let mut index = 0usize;
    for isoline in &isolines {
        let start = index;
        let count = isoline.barycenters.len();
        for (offset, &(he, bary)) in isoline.barycenters.iter().enumerate() {
            let point = bary * geometry.position(mesh.tail_vertex(he))
                + (1.0 - bary) * geometry.position(mesh.tip_vertex(he));
            points.extend_from_slice(point.as_slice());
            if offset + 1 < count {
                segments.push([index, index + 1]);
            }
            index += 1;
        }
        if !isoline.open {
            segments.push([index - 1, start]);
        }
    }
    Ok(PolylineGeometry { points, segments })
}
