//! Penalized least squares on dense `faer` matrices.

use faer::prelude::SpSolver as _;
use faer::{FaerMat as _, Mat, MatRef, Side};

/// Number of factorization attempts before the system is declared singular.
const MAX_ATTEMPTS: usize = 6;

/// Builds an `n x cols` design matrix from equally sized rows.
pub fn design_matrix(rows: &[Vec<f64>], cols: usize) -> Mat<f64> {
    debug_assert!(rows.iter().all(|r| r.len() == cols));
    Mat::from_fn(rows.len(), cols, |i, j| rows[i][j])
}

fn column(values: &[f64]) -> Mat<f64> {
    Mat::from_fn(values.len(), 1, |i, _| values[i])
}

/// Minimizes `‖y − Xβ‖² + Σ penalty[j]·β[j]²` through the Cholesky factor of
/// the penalized Gram matrix.
///
/// When the factorization fails the diagonal is inflated and the solve is
/// retried a few times before giving up.
pub fn ridge(design: MatRef<'_, f64>, y: &[f64], penalty: &[f64]) -> Option<Vec<f64>> {
    let p = design.ncols();
    debug_assert_eq!(penalty.len(), p);
    debug_assert_eq!(y.len(), design.nrows());

    let gram = design.transpose() * design;
    let rhs = design.transpose() * column(y).as_ref();

    let scale = (0..p).map(|j| gram.read(j, j)).fold(1.0_f64, f64::max);
    let mut jitter = 0.0;

    for _ in 0..MAX_ATTEMPTS {
        let mut system = gram.clone();
        for j in 0..p {
            system.write(j, j, system.read(j, j) + penalty[j] + jitter);
        }

        if let Ok(llt) = system.cholesky(Side::Lower) {
            let solution = llt.solve(&rhs);
            let beta: Vec<f64> = (0..p).map(|j| solution.read(j, 0)).collect();
            if beta.iter().all(|b| b.is_finite()) {
                return Some(beta);
            }
        }

        jitter = if jitter == 0.0 { scale * 1e-10 } else { jitter * 100.0 };
        log::debug!("Normal equations not positive definite; retrying with jitter {jitter:e}");
    }

    None
}

/// `Xβ` as a plain vector.
pub fn fitted(design: MatRef<'_, f64>, beta: &[f64]) -> Vec<f64> {
    let product = design * column(beta).as_ref();
    (0..design.nrows()).map(|i| product.read(i, 0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_line() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![1.0, f64::from(i) / 19.0]).collect();
        let y: Vec<f64> = rows.iter().map(|r| 3.0f64.mul_add(r[1], 2.0)).collect();
        let design = design_matrix(&rows, 2);

        let beta = ridge(design.as_ref(), &y, &[1e-12, 1e-12]).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-6);
        assert!((beta[1] - 3.0).abs() < 1e-6);

        let fit = fitted(design.as_ref(), &beta);
        assert!(fit.iter().zip(&y).all(|(a, b)| (a - b).abs() < 1e-6));
    }

    #[test]
    fn penalty_shrinks_coefficient() {
        let design = design_matrix(&vec![vec![1.0]; 10], 1);
        let y = vec![1.0; 10];
        let free = ridge(design.as_ref(), &y, &[0.0]).unwrap()[0];
        let shrunk = ridge(design.as_ref(), &y, &[10.0]).unwrap()[0];
        assert!((free - 1.0).abs() < 1e-12);
        assert!((shrunk - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_column_is_solved_with_jitter() {
        // The second column is all zeros, so the unpenalized Gram matrix has
        // a zero pivot.
        let design = design_matrix(&vec![vec![1.0, 0.0]; 5], 2);
        let y = vec![2.0; 5];
        let beta = ridge(design.as_ref(), &y, &[0.0, 0.0]).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-6);
        assert!(beta[1].abs() < 1e-6);
    }
}
