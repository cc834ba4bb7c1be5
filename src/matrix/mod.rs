//! Correlation matrix engine.
//!
//! Builds an N×N Pearson matrix in portfolio-position order with pairwise
//! maximum overlap, supports Ledoit–Wolf-style shrinkage toward the
//! identity, accepts lower-triangle user edits, repairs to the nearest
//! positive-semidefinite matrix and hands out a packed Cholesky factor.

mod cholesky;
mod repair;

pub use cholesky::CholeskyFactor;
pub use repair::{PSD_TOLERANCE, RepairReport, ensure_psd};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::trading;
use crate::error::{Result, RiskError};
use crate::stats;

/// Off-diagonal clamp applied after repair
pub const MAX_OFF_DIAGONAL: f64 = 0.99;

/// Fixed shrinkage intensity when the Ledoit–Wolf estimate is not supplied
pub const DEFAULT_SHRINKAGE_ALPHA: f64 = 0.3;

/// Correlation estimator selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CorrelationMethod {
    /// Plain sample correlation
    #[default]
    Sample,
    /// Sample correlation shrunk toward the identity
    Shrinkage,
}

/// Symmetric correlation matrix in flat row-major storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    n: usize,
    /// Row-major entries, `data[i * n + j]`
    data: Vec<f64>,
    /// Smallest pairwise overlap used during the build, if built from returns
    pub min_overlap: Option<usize>,
    /// Set when the smallest overlap fell below the range's target
    pub below_target_overlap: bool,
}

impl CorrelationMatrix {
    /// Identity matrix of dimension `n`
    pub fn identity(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self {
            n,
            data,
            min_overlap: None,
            below_target_overlap: false,
        }
    }

    /// Build from explicit rows. Rows must be square and symmetric within
    /// rounding; the diagonal is forced to 1.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        if rows.iter().any(|row| row.len() != n) {
            return Err(RiskError::InvalidInput {
                param: "matrix".to_string(),
                reason: "rows are not square".to_string(),
            });
        }
        let mut matrix = Self::identity(n);
        for (i, row) in rows.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                if i != j {
                    matrix.data[i * n + j] = value;
                }
            }
        }
        Ok(matrix)
    }

    /// Build the pairwise matrix from per-asset daily return series in
    /// portfolio-position order.
    ///
    /// Each cell uses the longest common trailing window of the two series.
    /// Cells with fewer than 30 overlapping observations fall back to zero
    /// correlation. The smallest overlap across computed cells is recorded;
    /// falling below `target_overlap` only annotates the build. With
    /// `use_ewma` the per-cell estimator recency-weights observations.
    pub fn from_returns(
        returns: &[Vec<f64>],
        target_overlap: usize,
        method: CorrelationMethod,
        shrinkage_alpha: f64,
        use_ewma: bool,
    ) -> Self {
        let n = returns.len();
        let mut matrix = Self::identity(n);
        let mut min_overlap: Option<usize> = None;

        for i in 0..n {
            for j in (i + 1)..n {
                let overlap = returns[i].len().min(returns[j].len());
                let value = if overlap < trading::MIN_OBSERVATIONS {
                    0.0
                } else {
                    min_overlap = Some(min_overlap.map_or(overlap, |m| m.min(overlap)));
                    if use_ewma {
                        stats::pearson_ewma(&returns[i], &returns[j], stats::EWMA_LAMBDA)
                    } else {
                        stats::pearson(&returns[i], &returns[j])
                    }
                };
                matrix.data[i * n + j] = value;
                matrix.data[j * n + i] = value;
            }
        }

        matrix.min_overlap = min_overlap;
        matrix.below_target_overlap = min_overlap.is_some_and(|m| m < target_overlap);
        if matrix.below_target_overlap {
            debug!(
                min_overlap = ?matrix.min_overlap,
                target_overlap,
                "Pairwise overlap below target"
            );
        }

        if method == CorrelationMethod::Shrinkage {
            matrix.shrink(shrinkage_alpha);
        }
        matrix
    }

    /// Matrix dimension
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Entry at `(i, j)`
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    /// Raw entry write without symmetry bookkeeping; repair-internal
    pub(crate) fn set_raw(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.n + j] = value;
    }

    /// Apply a user edit to a strict-lower-triangle cell.
    ///
    /// The upper triangle mirrors the edit; the diagonal is not editable.
    /// The caller must re-repair before factoring.
    pub fn set_edited(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.n || col >= self.n {
            return Err(RiskError::InvalidInput {
                param: "cell".to_string(),
                reason: format!("({}, {}) outside {}x{}", row, col, self.n, self.n),
            });
        }
        if row <= col {
            return Err(RiskError::InvalidInput {
                param: "cell".to_string(),
                reason: "only the strict lower triangle is editable".to_string(),
            });
        }
        if !value.is_finite() || value.abs() > 1.0 {
            return Err(RiskError::InvalidInput {
                param: "value".to_string(),
                reason: format!("{} outside [-1, 1]", value),
            });
        }
        self.data[row * self.n + col] = value;
        self.data[col * self.n + row] = value;
        Ok(())
    }

    /// Shrink toward the identity: `Σ̂ = (1−α)·S + α·I`
    pub fn shrink(&mut self, alpha: f64) {
        let alpha = alpha.clamp(0.0, 1.0);
        for i in 0..self.n {
            for j in 0..self.n {
                if i != j {
                    self.data[i * self.n + j] *= 1.0 - alpha;
                }
            }
        }
    }

    /// Clamp off-diagonal entries into `[-limit, limit]`
    pub(crate) fn clamp_off_diagonal(&mut self, limit: f64) {
        for i in 0..self.n {
            for j in 0..self.n {
                if i != j {
                    let v = self.data[i * self.n + j];
                    self.data[i * self.n + j] = v.clamp(-limit, limit);
                }
            }
        }
    }

    /// Copy out as nested rows (wire format)
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n)
            .map(|i| self.data[i * self.n..(i + 1) * self.n].to_vec())
            .collect()
    }

    /// Repair if needed and factor.
    ///
    /// On a factorisation failure the matrix is re-repaired once; a second
    /// failure surfaces [`RiskError::MatrixIllConditioned`].
    pub fn factor(&mut self) -> Result<CholeskyFactor> {
        ensure_psd(self)?;
        match CholeskyFactor::compute(self) {
            Ok(factor) => Ok(factor),
            Err(first_failure) => {
                debug!(error = %first_failure, "Cholesky failed after repair, re-repairing");
                ensure_psd(self)?;
                CholeskyFactor::compute(self).map_err(|e| RiskError::MatrixIllConditioned {
                    context: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise_series(seed: u64, len: usize) -> Vec<f64> {
        let mut rng = crate::rng::SimRng::new(seed);
        (0..len).map(|_| rng.next_gaussian() * 0.01).collect()
    }

    #[test]
    fn test_identity() {
        let matrix = CorrelationMatrix::identity(3);
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(matrix.get(i, j), if i == j { 1.0 } else { 0.0 });
            }
        }
    }

    #[test]
    fn test_from_returns_symmetric_unit_diagonal() {
        let returns = vec![noise_series(1, 120), noise_series(2, 100), noise_series(3, 80)];
        let matrix = CorrelationMatrix::from_returns(
            &returns,
            252,
            CorrelationMethod::Sample,
            DEFAULT_SHRINKAGE_ALPHA,
            false,
        );
        assert_eq!(matrix.dim(), 3);
        for i in 0..3 {
            assert_eq!(matrix.get(i, i), 1.0);
            for j in 0..3 {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
                assert!(matrix.get(i, j).abs() <= 1.0);
            }
        }
        // Shortest series is 80 points; target 252 annotates the build
        assert_eq!(matrix.min_overlap, Some(80));
        assert!(matrix.below_target_overlap);
    }

    #[test]
    fn test_from_returns_short_series_zero_cell() {
        let returns = vec![noise_series(1, 100), noise_series(2, 10)];
        let matrix = CorrelationMatrix::from_returns(
            &returns,
            252,
            CorrelationMethod::Sample,
            DEFAULT_SHRINKAGE_ALPHA,
            false,
        );
        assert_eq!(matrix.get(0, 1), 0.0);
        assert_eq!(matrix.min_overlap, None);
    }

    #[test]
    fn test_shrinkage_pulls_toward_identity() {
        let mut matrix =
            CorrelationMatrix::from_rows(&[vec![1.0, 0.8], vec![0.8, 1.0]]).unwrap();
        matrix.shrink(0.3);
        assert!((matrix.get(0, 1) - 0.56).abs() < 1e-12);
        assert_eq!(matrix.get(0, 0), 1.0);
    }

    #[test]
    fn test_user_edit_mirrors_and_guards() {
        let mut matrix = CorrelationMatrix::identity(3);
        matrix.set_edited(2, 0, -0.4).unwrap();
        assert_eq!(matrix.get(2, 0), -0.4);
        assert_eq!(matrix.get(0, 2), -0.4);

        assert!(matrix.set_edited(0, 2, 0.5).is_err(), "upper triangle edit");
        assert!(matrix.set_edited(1, 1, 0.5).is_err(), "diagonal edit");
        assert!(matrix.set_edited(2, 1, 1.5).is_err(), "out of range value");
    }

    #[test]
    fn test_factor_after_edit_repairs() {
        let mut matrix = CorrelationMatrix::identity(2);
        // Push the pair to the boundary; repair clamps and factoring succeeds
        matrix.set_edited(1, 0, 1.0).unwrap();
        let factor = matrix.factor().unwrap();
        assert!(matrix.get(1, 0) <= MAX_OFF_DIAGONAL);
        assert!(factor.reconstruction_error(&matrix) <= 1e-6 * 2.0);
    }

    #[test]
    fn test_to_rows_round_trip() {
        let rows = vec![vec![1.0, 0.2], vec![0.2, 1.0]];
        let matrix = CorrelationMatrix::from_rows(&rows).unwrap();
        assert_eq!(matrix.to_rows(), rows);
    }
}
