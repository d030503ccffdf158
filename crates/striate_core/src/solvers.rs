//! Sparse numerical solvers backing the stripe computation.

use anyhow::{anyhow, bail, Result};
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::CscMatrix;

/// Start vector for the power iteration. A fixed-seed linear congruential
/// sequence keeps repeated solves bit-identical for identical inputs.
fn seed_vector(n: usize) -> DVector<f64> {
    let mut state: u64 = 0x5DEECE66D;
    DVector::from_fn(n, |_, _| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 11) as f64) / ((1u64 << 53) as f64) * 2.0 - 1.0
    })
}

/// Eigenvector of the smallest eigenvalue of the generalized problem
/// (energy, mass), for symmetric positive definite matrices.
///
/// Inverse power iteration: the energy matrix is factored once with a
/// sparse Cholesky decomposition, then each sweep solves
/// `energy · x = mass · u` and renormalizes `x` in the mass norm. The
/// iterate converges to the sought eigenvector with unit mass norm.
pub fn smallest_eigenvector_positive_definite(
    energy: &CscMatrix<f64>,
    mass: &CscMatrix<f64>,
    iterations: usize,
) -> Result<DVector<f64>> {
    let n = energy.nrows();
    if energy.ncols() != n {
        bail!("energy matrix must be square, got {}x{}", n, energy.ncols());
    }
    if mass.nrows() != n || mass.ncols() != n {
        bail!(
            "mass matrix is {}x{} but the energy matrix is {n}x{n}",
            mass.nrows(),
            mass.ncols()
        );
    }
    if n == 0 {
        bail!("cannot solve an empty eigenvalue problem");
    }

    let factorization = CscCholesky::factor(energy)
        .map_err(|err| anyhow!("sparse Cholesky factorization failed: {err:?}"))?;

    let mut u = seed_vector(n);
    let mut x = u.clone();
    for _ in 0..iterations {
        let rhs = mass * &u;
        let rhs = DMatrix::from_column_slice(n, 1, rhs.as_slice());
        x = factorization.solve(&rhs).column(0).into_owned();

        let norm_squared = x.dot(&(mass * &x));
        if !norm_squared.is_finite() || norm_squared <= 0.0 {
            bail!("mass norm vanished during inverse power iteration; the mass matrix is not positive definite");
        }
        x /= norm_squared.sqrt();
        u.copy_from(&x);
    }
    debug!("inverse power iteration finished after {iterations} sweeps on a {n}-dimensional problem");
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::smallest_eigenvector_positive_definite;
    use nalgebra_sparse::{CooMatrix, CscMatrix};

    fn csc_from_triplets(n: usize, entries: &[(usize, usize, f64)]) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for &(i, j, v) in entries {
            coo.push(i, j, v);
        }
        CscMatrix::from(&coo)
    }

    #[test]
    fn converges_to_generalized_smallest_eigenvector() {
        // A = diag(2, 1), B = diag(1, 2): eigenvalues 2 and 0.5, so the
        // smallest eigenvector is the second axis with B-norm 1.
        let energy = csc_from_triplets(2, &[(0, 0, 2.0), (1, 1, 1.0)]);
        let mass = csc_from_triplets(2, &[(0, 0, 1.0), (1, 1, 2.0)]);
        let x = smallest_eigenvector_positive_definite(&energy, &mass, 60).expect("solve");

        assert!(x[0].abs() < 1e-10, "first component should vanish: {}", x[0]);
        assert!(
            (x[1].abs() - 1.0 / 2.0_f64.sqrt()).abs() < 1e-10,
            "second component should carry unit mass norm: {}",
            x[1]
        );
    }

    #[test]
    fn repeated_solves_are_bit_identical() {
        let energy = csc_from_triplets(3, &[(0, 0, 3.0), (1, 1, 1.0), (2, 2, 2.0), (0, 1, 0.5), (1, 0, 0.5)]);
        let mass = csc_from_triplets(3, &[(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0)]);
        let first = smallest_eigenvector_positive_definite(&energy, &mass, 40).expect("solve");
        let second = smallest_eigenvector_positive_definite(&energy, &mass, 40).expect("solve");
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_indefinite_energy_matrix() {
        let energy = csc_from_triplets(2, &[(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 1.0)]);
        let mass = csc_from_triplets(2, &[(0, 0, 1.0), (1, 1, 1.0)]);
        let err = smallest_eigenvector_positive_definite(&energy, &mass, 10)
            .expect_err("indefinite matrix should fail to factor");
        assert!(err.to_string().contains("Cholesky"));
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let energy = csc_from_triplets(2, &[(0, 0, 1.0), (1, 1, 1.0)]);
        let mass = csc_from_triplets(3, &[(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0)]);
        let err = smallest_eigenvector_positive_definite(&energy, &mass, 10)
            .expect_err("mismatch should fail");
        assert!(err.to_string().contains("mass matrix"));
    }
}
