//! Cholesky factorisation over packed lower-triangular storage.

use serde::{Deserialize, Serialize};

use super::CorrelationMatrix;
use crate::error::{Result, RiskError};

/// Pivot tolerance: values above this magnitude below zero fail the
/// factorisation instead of being flattened to a zero pivot.
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Lower-triangular Cholesky factor `L` with `L·Lᵀ ≈ Σ`.
///
/// Only the lower triangle is stored (packed row-major) to halve memory
/// and cache pressure on the sampling hot path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CholeskyFactor {
    n: usize,
    /// Packed rows: `data[i·(i+1)/2 + j]` holds `L[i][j]` for `j ≤ i`
    data: Vec<f64>,
}

impl CholeskyFactor {
    /// Factor a repaired correlation matrix.
    ///
    /// Fails with [`RiskError::MatrixNotPsd`] when a pivot goes negative
    /// beyond tolerance, which only happens if repair was skipped. Zero
    /// pivots (semidefinite input) are tolerated.
    pub fn compute(matrix: &CorrelationMatrix) -> Result<Self> {
        let n = matrix.dim();
        let mut data = vec![0.0; n * (n + 1) / 2];

        for i in 0..n {
            for j in 0..=i {
                let mut sum = matrix.get(i, j);
                for k in 0..j {
                    sum -= data[Self::index(i, k)] * data[Self::index(j, k)];
                }
                if i == j {
                    if sum < -PIVOT_TOLERANCE {
                        return Err(RiskError::MatrixNotPsd {
                            min_eigenvalue: sum,
                        });
                    }
                    data[Self::index(i, j)] = sum.max(0.0).sqrt();
                } else {
                    let pivot = data[Self::index(j, j)];
                    data[Self::index(i, j)] = if pivot == 0.0 { 0.0 } else { sum / pivot };
                }
            }
        }

        Ok(Self { n, data })
    }

    #[inline]
    fn index(i: usize, j: usize) -> usize {
        debug_assert!(j <= i);
        i * (i + 1) / 2 + j
    }

    /// Matrix dimension
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Entry `L[i][j]`; zero above the diagonal
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if j > i { 0.0 } else { self.data[Self::index(i, j)] }
    }

    /// `out = L · z`, correlating a vector of independent draws
    pub fn mul_vector(&self, z: &[f64], out: &mut [f64]) {
        debug_assert_eq!(z.len(), self.n);
        debug_assert_eq!(out.len(), self.n);
        for i in 0..self.n {
            let row = &self.data[Self::index(i, 0)..=Self::index(i, i)];
            out[i] = row.iter().zip(z.iter()).map(|(l, z)| l * z).sum();
        }
    }

    /// Frobenius norm of `L·Lᵀ − Σ`
    pub fn reconstruction_error(&self, matrix: &CorrelationMatrix) -> f64 {
        let mut sum = 0.0;
        for i in 0..self.n {
            for j in 0..self.n {
                let mut reconstructed = 0.0;
                for k in 0..=i.min(j) {
                    reconstructed += self.get(i, k) * self.get(j, k);
                }
                sum += (reconstructed - matrix.get(i, j)).powi(2);
            }
        }
        sum.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_by_two_known_factor() {
        let matrix = CorrelationMatrix::from_rows(&[vec![1.0, 0.8], vec![0.8, 1.0]]).unwrap();
        let factor = CholeskyFactor::compute(&matrix).unwrap();
        assert!((factor.get(0, 0) - 1.0).abs() < 1e-9);
        assert!((factor.get(1, 0) - 0.8).abs() < 1e-9);
        assert!((factor.get(1, 1) - 0.6).abs() < 1e-9);
        assert_eq!(factor.get(0, 1), 0.0);
    }

    #[test]
    fn test_identity_factor() {
        let matrix = CorrelationMatrix::identity(4);
        let factor = CholeskyFactor::compute(&matrix).unwrap();
        for i in 0..4 {
            for j in 0..=i {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((factor.get(i, j) - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_reconstruction_tolerance() {
        let rows = vec![
            vec![1.0, 0.5, 0.3],
            vec![0.5, 1.0, 0.2],
            vec![0.3, 0.2, 1.0],
        ];
        let matrix = CorrelationMatrix::from_rows(&rows).unwrap();
        let factor = CholeskyFactor::compute(&matrix).unwrap();
        let err = factor.reconstruction_error(&matrix);
        assert!(err <= 1e-6 * 3.0, "frobenius error {err}");
    }

    #[test]
    fn test_non_psd_rejected() {
        // Off-diagonal beyond 1 makes the 2x2 indefinite
        let matrix = CorrelationMatrix::from_rows(&[vec![1.0, 1.2], vec![1.2, 1.0]]).unwrap();
        assert!(matches!(
            CholeskyFactor::compute(&matrix),
            Err(RiskError::MatrixNotPsd { .. })
        ));
    }

    #[test]
    fn test_semidefinite_zero_pivot_tolerated() {
        // Perfectly correlated pair is rank one: pivot hits zero exactly
        let matrix = CorrelationMatrix::from_rows(&[vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap();
        let factor = CholeskyFactor::compute(&matrix).unwrap();
        assert!((factor.get(1, 1)).abs() < 1e-9);
        assert!(factor.reconstruction_error(&matrix) < 1e-9);
    }

    #[test]
    fn test_mul_vector_correlates() {
        let matrix = CorrelationMatrix::from_rows(&[vec![1.0, 0.8], vec![0.8, 1.0]]).unwrap();
        let factor = CholeskyFactor::compute(&matrix).unwrap();
        let z = [1.0, 1.0];
        let mut out = [0.0; 2];
        factor.mul_vector(&z, &mut out);
        assert!((out[0] - 1.0).abs() < 1e-12);
        assert!((out[1] - 1.4).abs() < 1e-12);
    }
}
