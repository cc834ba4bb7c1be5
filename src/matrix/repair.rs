//! Positive-semidefinite repair by eigenvalue clamping.

use nalgebra::DMatrix;
use tracing::{debug, warn};

use super::{CorrelationMatrix, MAX_OFF_DIAGONAL};
use crate::error::{Result, RiskError};

/// Eigenvalue tolerance: the repaired matrix must not dip below this
pub const PSD_TOLERANCE: f64 = 1e-9;

/// What a repair pass did.
#[derive(Debug, Clone, Copy)]
pub struct RepairReport {
    /// Whether eigenvalue clamping was applied
    pub repaired: bool,
    /// Smallest eigenvalue before repair
    pub min_eigenvalue_before: f64,
    /// Smallest eigenvalue after repair
    pub min_eigenvalue_after: f64,
}

fn min_eigenvalue(matrix: &CorrelationMatrix) -> f64 {
    let n = matrix.dim();
    let dense = DMatrix::from_fn(n, n, |i, j| matrix.get(i, j));
    dense
        .symmetric_eigen()
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
}

/// Project the matrix onto the nearest symmetric PSD correlation matrix.
///
/// Eigendecompose, clamp eigenvalues to ≥ 0, reconstruct, rescale back to a
/// unit diagonal, then clamp off-diagonals into [−0.99, 0.99]. Runs only
/// when the input actually violates the tolerance.
pub fn ensure_psd(matrix: &mut CorrelationMatrix) -> Result<RepairReport> {
    let n = matrix.dim();
    let before = min_eigenvalue(matrix);
    if before >= -PSD_TOLERANCE {
        matrix.clamp_off_diagonal(MAX_OFF_DIAGONAL);
        return Ok(RepairReport {
            repaired: false,
            min_eigenvalue_before: before,
            min_eigenvalue_after: before,
        });
    }

    debug!(min_eigenvalue = before, dim = n, "Repairing non-PSD matrix");

    let dense = DMatrix::from_fn(n, n, |i, j| matrix.get(i, j));
    let eigen = dense.symmetric_eigen();
    let clamped = DMatrix::from_diagonal(&eigen.eigenvalues.map(|v| v.max(0.0)));
    let mut projected = &eigen.eigenvectors * clamped * eigen.eigenvectors.transpose();

    // Rescale to a unit diagonal so the result is again a correlation matrix
    let scale: Vec<f64> = (0..n)
        .map(|i| {
            let d = projected[(i, i)];
            if d > 0.0 { d.sqrt() } else { 1.0 }
        })
        .collect();
    for i in 0..n {
        for j in 0..n {
            projected[(i, j)] /= scale[i] * scale[j];
        }
    }

    for i in 0..n {
        for j in 0..n {
            let value = if i == j {
                1.0
            } else {
                // Average the symmetric pair to kill rounding asymmetry
                0.5 * (projected[(i, j)] + projected[(j, i)])
            };
            matrix.set_raw(i, j, value);
        }
    }
    matrix.clamp_off_diagonal(MAX_OFF_DIAGONAL);

    let after = min_eigenvalue(matrix);
    if after < -PSD_TOLERANCE {
        warn!(min_eigenvalue = after, "Repair left matrix below tolerance");
        return Err(RiskError::MatrixNotPsd {
            min_eigenvalue: after,
        });
    }

    Ok(RepairReport {
        repaired: true,
        min_eigenvalue_before: before,
        min_eigenvalue_after: after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psd_input_untouched() {
        let mut matrix =
            CorrelationMatrix::from_rows(&[vec![1.0, 0.5], vec![0.5, 1.0]]).unwrap();
        let report = ensure_psd(&mut matrix).unwrap();
        assert!(!report.repaired);
        assert!((matrix.get(0, 1) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_repair_overcorrelated_pair() {
        // [[1, 1.01], [1.01, 1]] is indefinite; repair must land the
        // off-diagonal in [-0.99, 0.99] with min eigenvalue >= 0
        let mut matrix =
            CorrelationMatrix::from_rows(&[vec![1.0, 1.01], vec![1.01, 1.0]]).unwrap();
        let report = ensure_psd(&mut matrix).unwrap();
        assert!(report.repaired);
        assert!(report.min_eigenvalue_before < 0.0);
        assert!(report.min_eigenvalue_after >= -PSD_TOLERANCE);
        let off = matrix.get(0, 1);
        assert!((-0.99..=0.99).contains(&off), "off-diagonal {off}");
        assert_eq!(matrix.get(0, 0), 1.0);
        assert_eq!(matrix.get(1, 1), 1.0);
        assert_eq!(matrix.get(0, 1), matrix.get(1, 0));
    }

    #[test]
    fn test_repair_three_way_inconsistency() {
        // Pairwise-feasible but jointly infeasible correlations
        let mut matrix = CorrelationMatrix::from_rows(&[
            vec![1.0, 0.9, -0.9],
            vec![0.9, 1.0, 0.9],
            vec![-0.9, 0.9, 1.0],
        ])
        .unwrap();
        let report = ensure_psd(&mut matrix).unwrap();
        assert!(report.repaired);
        assert!(report.min_eigenvalue_after >= -PSD_TOLERANCE);
        for i in 0..3 {
            assert_eq!(matrix.get(i, i), 1.0);
            for j in 0..3 {
                if i != j {
                    assert!(matrix.get(i, j).abs() <= 0.99);
                }
            }
        }
    }
}
