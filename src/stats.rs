//! Sufficient statistics: every moment sum and incidence count the estimators
//! and inference need, derived in one pass over a [`RatingTable`].
//!
//! Notation follows the usual unbalanced-ANOVA conventions: `m_ij` is the
//! number of ratings rater `j` gave subject `i`, dots mark summed indices.

use nalgebra::DMatrix;
use serde::Serialize;

use crate::error::{IccError, Result};
use crate::table::RatingTable;

#[derive(Debug, Clone)]
pub struct SufficientStatistics {
    n: usize,
    r: usize,
    /// `m_ij`, n x r.
    cell_counts: DMatrix<f64>,
    /// `y_ij.`, n x r.
    cell_sums: DMatrix<f64>,
    subject_counts: Vec<f64>,
    subject_sums: Vec<f64>,
    rater_counts: Vec<f64>,
    rater_sums: Vec<f64>,
    total: f64,
    sum: f64,
    sum_squares: f64,
}

/// Counts reported next to the variance components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedCounts {
    pub n_subjects: usize,
    pub n_raters: usize,
    /// Non-missing ratings, `Mtot`.
    pub total_ratings: usize,
    /// Largest per-unit replication count (subjects, or raters for the rater-only model).
    pub max_replication: usize,
    pub min_replication: usize,
    pub grand_mean: f64,
    /// Some subject received more than one rating from the same rater.
    pub replicated: bool,
}

impl SufficientStatistics {
    pub fn from_table(table: &RatingTable) -> Result<Self> {
        let n = table.n_subjects();
        let r = table.n_raters();

        let mut cell_counts = DMatrix::<f64>::zeros(n, r);
        let mut cell_sums = DMatrix::<f64>::zeros(n, r);
        let mut sum_squares = 0.0;

        for (row, &i) in table.rows().iter().zip(table.row_subjects()) {
            for (j, value) in row.ratings.iter().enumerate() {
                if let Some(y) = value {
                    cell_counts[(i, j)] += 1.0;
                    cell_sums[(i, j)] += y;
                    sum_squares += y * y;
                }
            }
        }

        let subject_counts: Vec<f64> = (0..n).map(|i| cell_counts.row(i).sum()).collect();
        let subject_sums: Vec<f64> = (0..n).map(|i| cell_sums.row(i).sum()).collect();
        let rater_counts: Vec<f64> = (0..r).map(|j| cell_counts.column(j).sum()).collect();
        let rater_sums: Vec<f64> = (0..r).map(|j| cell_sums.column(j).sum()).collect();

        if let Some(i) = subject_counts.iter().position(|&m| m == 0.0) {
            return Err(IccError::degenerate(format!(
                "subject '{}' has no ratings",
                table.subjects()[i]
            )));
        }
        for j in 0..r {
            let rated = cell_counts.column(j).iter().filter(|&&m| m > 0.0).count();
            if rated < 2 {
                return Err(IccError::degenerate(format!(
                    "rater '{}' rated {rated} subject(s); at least 2 are required",
                    table.rater_names()[j]
                )));
            }
        }

        let total = subject_counts.iter().sum();
        let sum = subject_sums.iter().sum();

        Ok(Self {
            n,
            r,
            cell_counts,
            cell_sums,
            subject_counts,
            subject_sums,
            rater_counts,
            rater_sums,
            total,
            sum,
            sum_squares,
        })
    }

    pub fn n_subjects(&self) -> usize {
        self.n
    }

    pub fn n_raters(&self) -> usize {
        self.r
    }

    pub fn cell_counts(&self) -> &DMatrix<f64> {
        &self.cell_counts
    }

    pub fn cell_sums(&self) -> &DMatrix<f64> {
        &self.cell_sums
    }

    pub fn subject_counts(&self) -> &[f64] {
        &self.subject_counts
    }

    pub fn subject_sums(&self) -> &[f64] {
        &self.subject_sums
    }

    pub fn rater_counts(&self) -> &[f64] {
        &self.rater_counts
    }

    pub fn rater_sums(&self) -> &[f64] {
        &self.rater_sums
    }

    /// `Mtot`, the number of non-missing ratings.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// `T_y`.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// `T2_y`, raw sum of squared ratings.
    pub fn sum_squares(&self) -> f64 {
        self.sum_squares
    }

    pub fn grand_mean(&self) -> f64 {
        self.sum / self.total
    }

    /// `T_mu = T_y^2 / Mtot`.
    pub fn t_mean(&self) -> f64 {
        self.sum * self.sum / self.total
    }

    /// `T_S = sum_i y_i..^2 / m_i.`.
    pub fn t_subjects(&self) -> f64 {
        squared_over_counts(&self.subject_sums, &self.subject_counts)
    }

    /// `T_R = sum_j y_.j.^2 / m_.j`.
    pub fn t_raters(&self) -> f64 {
        squared_over_counts(&self.rater_sums, &self.rater_counts)
    }

    /// `T_SR = sum_ij y_ij.^2 / m_ij` over filled cells.
    pub fn t_cells(&self) -> f64 {
        squared_over_counts(self.cell_sums.as_slice(), self.cell_counts.as_slice())
    }

    /// `sum_i m_i.^2 / Mtot`.
    pub fn k_subjects(&self) -> f64 {
        self.subject_counts.iter().map(|m| m * m).sum::<f64>() / self.total
    }

    /// `sum_j m_.j^2 / Mtot`.
    pub fn k_raters(&self) -> f64 {
        self.rater_counts.iter().map(|m| m * m).sum::<f64>() / self.total
    }

    /// `k1 = sum_ij m_ij^2 / m_i.`.
    pub fn k1(&self) -> f64 {
        let mut acc = 0.0;
        for i in 0..self.n {
            let row: f64 = self.cell_counts.row(i).iter().map(|m| m * m).sum();
            acc += row / self.subject_counts[i];
        }
        acc
    }

    /// `k2 = sum_ij m_ij^2 / m_.j`.
    pub fn k2(&self) -> f64 {
        let mut acc = 0.0;
        for j in 0..self.r {
            let col: f64 = self.cell_counts.column(j).iter().map(|m| m * m).sum();
            acc += col / self.rater_counts[j];
        }
        acc
    }

    /// Number of subject x rater cells holding at least one rating.
    pub fn filled_cells(&self) -> usize {
        self.cell_counts.iter().filter(|&&m| m > 0.0).count()
    }

    pub fn max_cell_replication(&self) -> usize {
        self.cell_counts.iter().copied().fold(0.0, f64::max) as usize
    }

    /// Whether any subject was rated more than once by the same rater.
    pub fn replicated(&self) -> bool {
        self.max_cell_replication() > 1
    }

    /// Derived counts, replication measured over subjects, or over raters when
    /// `by_rater` is set.
    pub fn derived_counts(&self, by_rater: bool) -> DerivedCounts {
        let units = if by_rater {
            &self.rater_counts
        } else {
            &self.subject_counts
        };
        let max = units.iter().copied().fold(0.0, f64::max);
        let min = units.iter().copied().fold(f64::INFINITY, f64::min);
        DerivedCounts {
            n_subjects: self.n,
            n_raters: self.r,
            total_ratings: self.total as usize,
            max_replication: max as usize,
            min_replication: min as usize,
            grand_mean: self.grand_mean(),
            replicated: self.replicated(),
        }
    }
}

fn squared_over_counts(sums: &[f64], counts: &[f64]) -> f64 {
    sums.iter()
        .zip(counts)
        .filter(|(_, &m)| m > 0.0)
        .map(|(y, m)| y * y / m)
        .sum()
}
