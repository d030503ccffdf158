//! The `striate_core` crate computes periodic stripe patterns on
//! triangulated surfaces and extracts their isolines as polylines.
//!
//! Key components:
//! - **Mesh**: half-edge connectivity arena with integer indices.
//! - **Geometry**: vertex-position geometry with memoized intrinsic
//!   quantities (lengths, cotan weights, tangent bases, transports).
//! - **Direction fields**: per-face singularity indices of symmetric
//!   vertex direction fields.
//! - **Solvers**: sparse generalized eigensolver (inverse power iteration).
//! - **Stripes**: the stripe-pattern pipeline — discrete connection,
//!   energy/mass assembly, eigen-parameterization, corner phase
//!   integration, isoline tracing and materialization.

pub mod direction_fields;
pub mod geometry;
pub mod mesh;
pub mod solvers;
pub mod stripes;
