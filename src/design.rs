//! Rater adjustment for two-way designs.
//!
//! Fitting raters after subjects in an unbalanced layout needs the reduced
//! normal equations for the rater effects. With the last rater dropped as the
//! reference level they form an `(r-1) x (r-1)` system:
//!
//! - `C[j][k] = m_.j * delta_jk - sum_i m_ij m_ik / m_i.` (information matrix)
//! - `c[j]    = y_.j. - sum_i m_ij y_i.. / m_i.` (adjusted rater totals)
//! - `F[j][k]`: covariance of `c` per unit of interaction variance.
//!
//! `c' C^-1 c` is the rater sum of squares adjusted for subjects and
//! `tr(C^-1 F)` is the interaction coefficient of its expectation. The same
//! assembly serves every `r >= 2`; two raters simply give a 1 x 1 system.

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector};

use crate::error::{IccError, Result};
use crate::stats::SufficientStatistics;

/// Smallest Cholesky pivot, relative to the largest diagonal entry of `C`,
/// accepted as non-singular.
const PIVOT_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct RaterAdjustment {
    c_matrix: DMatrix<f64>,
    f_matrix: DMatrix<f64>,
    c_inverse: DMatrix<f64>,
    adjusted_totals: DVector<f64>,
    rater_ss: f64,
    interaction_trace: f64,
}

impl RaterAdjustment {
    pub fn from_statistics(stats: &SufficientStatistics) -> Result<Self> {
        let n = stats.n_subjects();
        let dim = stats.n_raters() - 1;
        let m = stats.cell_counts();
        let m_i = stats.subject_counts();
        let y_i = stats.subject_sums();

        let mut c_matrix = DMatrix::<f64>::zeros(dim, dim);
        let mut f_matrix = DMatrix::<f64>::zeros(dim, dim);
        let mut adjusted_totals = DVector::<f64>::zeros(dim);

        for j in 0..dim {
            c_matrix[(j, j)] = stats.rater_counts()[j];
            adjusted_totals[j] = stats.rater_sums()[j];
        }

        for i in 0..n {
            let mi = m_i[i];
            let sq: f64 = m.row(i).iter().map(|v| v * v).sum();
            for j in 0..dim {
                let mij = m[(i, j)];
                if mij == 0.0 {
                    continue;
                }
                adjusted_totals[j] -= mij * y_i[i] / mi;
                f_matrix[(j, j)] += mij * mij;
                for k in 0..dim {
                    let mik = m[(i, k)];
                    if mik == 0.0 {
                        continue;
                    }
                    c_matrix[(j, k)] -= mij * mik / mi;
                    f_matrix[(j, k)] +=
                        mij * mik * sq / (mi * mi) - mij * mik * (mij + mik) / mi;
                }
            }
        }

        let chol = factor(&c_matrix).ok_or_else(|| {
            IccError::degenerate(
                "rater effects are not estimable: the subject x rater layout is disconnected",
            )
        })?;
        let c_inverse = chol.inverse();

        let rater_ss = adjusted_totals.dot(&(&c_inverse * &adjusted_totals)).max(0.0);
        let interaction_trace = (&c_inverse * &f_matrix).trace();

        Ok(Self {
            c_matrix,
            f_matrix,
            c_inverse,
            adjusted_totals,
            rater_ss,
            interaction_trace,
        })
    }

    /// `R(r | mu, s) = c' C^-1 c`.
    pub fn rater_ss(&self) -> f64 {
        self.rater_ss
    }

    /// `tr(C^-1 F)`.
    pub fn interaction_trace(&self) -> f64 {
        self.interaction_trace
    }

    pub fn c_matrix(&self) -> &DMatrix<f64> {
        &self.c_matrix
    }

    pub fn f_matrix(&self) -> &DMatrix<f64> {
        &self.f_matrix
    }

    pub fn c_inverse(&self) -> &DMatrix<f64> {
        &self.c_inverse
    }

    pub fn adjusted_totals(&self) -> &DVector<f64> {
        &self.adjusted_totals
    }
}

/// Cholesky factor of `C`, or `None` when a pivot collapses (disconnected
/// layout). A zero pivot would otherwise slip through as NaN entries.
fn factor(c: &DMatrix<f64>) -> Option<Cholesky<f64, nalgebra::Dyn>> {
    let scale = c.diagonal().max();
    if !(scale > 0.0) {
        return None;
    }
    let chol = Cholesky::new(c.clone())?;
    let floor = (scale * PIVOT_TOLERANCE).sqrt();
    let stable = chol.l().diagonal().iter().all(|d| d.is_finite() && *d > floor);
    stable.then_some(chol)
}
