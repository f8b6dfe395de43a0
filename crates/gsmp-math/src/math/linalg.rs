//! Dense LU decomposition with partial pivoting.
//!
//! The potato systems are small (tens to a few hundred states) and dense
//! after elimination, so a plain row-major LU is enough. Pivot choice is
//! deterministic: the largest magnitude, ties broken by smallest row index.

use serde::{Deserialize, Serialize};

use crate::error::{NumericError, NumericResult};

/// Pivots smaller than this fraction of the largest input entry count as zero.
const SINGULAR_RELATIVE_TOLERANCE: f64 = 1e-14;

/// `PA = LU`, stored packed: unit-lower `L` below the diagonal, `U` on and above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuDecomposition {
    n: usize,
    lu: Vec<f64>,
    /// `perm[i]` is the original row placed at position `i`.
    perm: Vec<usize>,
}

impl LuDecomposition {
    /// Factor a square matrix given as rows.
    pub fn new(rows: Vec<Vec<f64>>) -> NumericResult<Self> {
        let n = rows.len();
        let mut lu = Vec::with_capacity(n * n);
        for row in &rows {
            if row.len() != n {
                return Err(NumericError::Dimension {
                    expected: n,
                    actual: row.len(),
                });
            }
            lu.extend_from_slice(row);
        }
        if lu.iter().any(|v| !v.is_finite()) {
            return Err(NumericError::invalid("matrix", "entries must be finite"));
        }
        let scale = lu.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        let tolerance = scale * SINGULAR_RELATIVE_TOLERANCE;
        let mut perm: Vec<usize> = (0..n).collect();

        for col in 0..n {
            let pivot = select_pivot(&lu, n, col);
            let pivot_value = lu[pivot * n + col];
            if pivot_value.abs() <= tolerance || pivot_value == 0.0 {
                return Err(NumericError::Singular { column: col });
            }
            if pivot != col {
                for j in 0..n {
                    lu.swap(col * n + j, pivot * n + j);
                }
                perm.swap(col, pivot);
            }
            for row in (col + 1)..n {
                let factor = lu[row * n + col] / pivot_value;
                lu[row * n + col] = factor;
                if factor == 0.0 {
                    continue;
                }
                for j in (col + 1)..n {
                    lu[row * n + j] -= factor * lu[col * n + j];
                }
            }
        }

        Ok(Self { n, lu, perm })
    }

    pub fn dimension(&self) -> usize {
        self.n
    }

    /// Solve `A x = b`.
    pub fn solve(&self, b: &[f64]) -> NumericResult<Vec<f64>> {
        self.check_len(b)?;
        let n = self.n;
        let mut x: Vec<f64> = self.perm.iter().map(|&p| b[p]).collect();
        // L y = Pb
        for i in 0..n {
            let mut acc = x[i];
            for j in 0..i {
                acc -= self.lu[i * n + j] * x[j];
            }
            x[i] = acc;
        }
        // U x = y
        for i in (0..n).rev() {
            let mut acc = x[i];
            for j in (i + 1)..n {
                acc -= self.lu[i * n + j] * x[j];
            }
            x[i] = acc / self.lu[i * n + i];
        }
        Ok(x)
    }

    /// Solve the row-vector system `x A = b`, i.e. `Aᵀ xᵀ = bᵀ`.
    pub fn solve_transposed(&self, b: &[f64]) -> NumericResult<Vec<f64>> {
        self.check_len(b)?;
        let n = self.n;
        // Aᵀ = Uᵀ Lᵀ P, so first Uᵀ z = b, then Lᵀ w = z, then x = Pᵀ w.
        let mut z = b.to_vec();
        for i in 0..n {
            let mut acc = z[i];
            for j in 0..i {
                acc -= self.lu[j * n + i] * z[j];
            }
            z[i] = acc / self.lu[i * n + i];
        }
        for i in (0..n).rev() {
            let mut acc = z[i];
            for j in (i + 1)..n {
                acc -= self.lu[j * n + i] * z[j];
            }
            z[i] = acc;
        }
        let mut x = vec![0.0; n];
        for (pos, &orig) in self.perm.iter().enumerate() {
            x[orig] = z[pos];
        }
        Ok(x)
    }

    fn check_len(&self, b: &[f64]) -> NumericResult<()> {
        if b.len() != self.n {
            return Err(NumericError::Dimension {
                expected: self.n,
                actual: b.len(),
            });
        }
        Ok(())
    }
}

/// Row in `col..n` with the largest `|a[row][col]|`, smallest index on ties.
fn select_pivot(lu: &[f64], n: usize, col: usize) -> usize {
    let mut best = col;
    let mut best_abs = lu[col * n + col].abs();
    for row in (col + 1)..n {
        let v = lu[row * n + col].abs();
        if v > best_abs {
            best = row;
            best_abs = v;
        }
    }
    best
}
