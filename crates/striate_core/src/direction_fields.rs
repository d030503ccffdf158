//! Singularity analysis for vertex direction fields.
//!
//! Fields live in vertex tangent bases as complex numbers; a field with a
//! `power`-fold rotational symmetry stores the `power`-th power of its unit
//! direction, so a line field (power 2) is free of the ±180° ambiguity.

use crate::geometry::VertexPositionGeometry;
use anyhow::{bail, Result};
use num_complex::Complex;
use num_traits::Zero;
use std::f64::consts::PI;

/// Winding index of the field around each face.
///
/// For each face the principal-branch angle between every head value and
/// the transported tail value is accumulated around the boundary; the index
/// is that total divided by 2π, rounded. Nonzero entries mark the faces
/// where the field is singular.
pub fn compute_face_index(
    geometry: &VertexPositionGeometry,
    direction_field: &[Complex<f64>],
    power: i32,
) -> Result<Vec<i32>> {
    let mesh = geometry.mesh();
    if direction_field.len() != mesh.n_vertices() {
        bail!(
            "direction field has {} entries for a mesh with {} vertices",
            direction_field.len(),
            mesh.n_vertices()
        );
    }
    for (v, value) in direction_field.iter().enumerate() {
        if value.is_zero() || !value.re.is_finite() || !value.im.is_finite() {
            bail!("direction field value at vertex {v} is zero or not finite");
        }
    }

    let mut indices = vec![0i32; mesh.n_faces()];
    for (f, index) in indices.iter_mut().enumerate() {
        let mut total_rotation = 0.0;
        for he in mesh.face_halfedges(f) {
            let tail_value = direction_field[mesh.tail_vertex(he)];
            let tip_value = direction_field[mesh.tip_vertex(he)];
            let transport = geometry.transport_along_halfedge(he).powi(power);
            total_rotation += (tip_value / (transport * tail_value)).arg();
        }
        *index = (total_rotation / (2.0 * PI)).round() as i32;
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::compute_face_index;
    use crate::geometry::VertexPositionGeometry;
    use crate::mesh::SurfaceMesh;
    use nalgebra::Vector3;
    use num_complex::Complex;

    fn square_geometry() -> VertexPositionGeometry {
        let mesh = SurfaceMesh::from_triangles(4, &[[0, 1, 2], [0, 2, 3]]).expect("mesh");
        let positions = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        VertexPositionGeometry::new(mesh, positions).expect("geometry")
    }

    fn grid_geometry(n: usize) -> VertexPositionGeometry {
        let mut positions = Vec::new();
        for iy in 0..n {
            for ix in 0..n {
                positions.push(Vector3::new(ix as f64, iy as f64, 0.0));
            }
        }
        let mut triangles = Vec::new();
        for cy in 0..n - 1 {
            for cx in 0..n - 1 {
                let v00 = cy * n + cx;
                let v10 = v00 + 1;
                let v01 = v00 + n;
                let v11 = v01 + 1;
                triangles.push([v00, v10, v11]);
                triangles.push([v00, v11, v01]);
            }
        }
        let mesh = SurfaceMesh::from_triangles(n * n, &triangles).expect("mesh");
        VertexPositionGeometry::new(mesh, positions).expect("geometry")
    }

    #[test]
    fn constant_field_has_no_singularities() {
        let geometry = grid_geometry(4);
        let field = vec![Complex::new(1.0, 0.0); geometry.mesh().n_vertices()];
        let indices = compute_face_index(&geometry, &field, 2).expect("indices");
        assert!(indices.iter().all(|&i| i == 0));
    }

    #[test]
    fn concentrated_winding_is_detected() {
        let geometry = square_geometry();
        // Nearly a full doubled turn across face 0, unwinding across face 1.
        let field = vec![
            Complex::new(1.0, 0.0),
            Complex::from_polar(1.0, 2.8),
            Complex::from_polar(1.0, -2.8),
            Complex::new(1.0, 0.0),
        ];
        let indices = compute_face_index(&geometry, &field, 2).expect("indices");
        assert_eq!(indices, vec![1, 0]);
    }

    #[test]
    fn rejects_degenerate_field() {
        let geometry = square_geometry();
        let mut field = vec![Complex::new(1.0, 0.0); 4];
        field[2] = Complex::new(0.0, 0.0);
        let err = compute_face_index(&geometry, &field, 2).expect_err("zero value");
        assert!(err.to_string().contains("vertex 2"));

        let err = compute_face_index(&geometry, &field[..3], 2).expect_err("length");
        assert!(err.to_string().contains("entries"));
    }
}
