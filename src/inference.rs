//! Confidence intervals and p-values for ICCs.
//!
//! A coefficient `rho = p'theta / q'theta` is tested at a candidate value by
//! the linear combination `c(t) = p + t (p - q)`, `t = rho / (1 - rho)`, whose
//! estimate is zero exactly at `rho`. Rewritten on the mean squares through
//! the expected mean square matrix `K` (`g = K^-T c`), the positive-weight
//! terms form a numerator and the negative-weight terms a denominator of an
//! approximate F ratio with Satterthwaite degrees of freedom. Balanced
//! one-way and mixed designs reduce to the exact F procedures.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use tracing::{debug, warn};

use crate::error::{IccError, Result};
use crate::icc::{ratio_weights, IccValue};
use crate::mean_squares::MeanSquares;
use crate::model::{Reliability, UNIT_NULL_TOLERANCE};

/// Weights smaller than this fraction of the largest are treated as zero.
const WEIGHT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub reliability: Reliability,
    pub level: f64,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
    pub df_numerator: f64,
    pub df_denominator: f64,
    /// The point estimate was undefined and zero was used in its place.
    pub estimate_substituted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PValue {
    pub null_value: f64,
    pub f_statistic: f64,
    pub df_numerator: f64,
    pub df_denominator: f64,
    pub p_value: f64,
}

/// A coefficient's weights pushed through `K^-T`, ready to be evaluated
/// at any candidate value.
struct RatioForm {
    /// `K^-T p`
    base: DVector<f64>,
    /// `K^-T (p - q)`
    slope: DVector<f64>,
    mean_squares: DVector<f64>,
    df: DVector<f64>,
}

/// Split of the mean squares into the two sides of an F ratio.
struct Partition {
    numerator: Vec<usize>,
    denominator: Vec<usize>,
}

impl RatioForm {
    fn new(ms: &MeanSquares, reliability: Reliability) -> Result<Self> {
        let (p, q) = ratio_weights(ms.unknowns(), ms.model(), reliability, ms.replicated())
            .ok_or_else(|| not_applicable(ms, reliability))?;

        let kt: DMatrix<f64> = ms.expected_matrix().transpose();
        let solve = |rhs: &DVector<f64>| {
            kt.solve_lower_triangular(rhs)
                .ok_or_else(|| IccError::degenerate("expected mean square equations are singular"))
        };
        let base = solve(&p)?;
        let slope = solve(&(&p - &q))?;

        Ok(Self {
            base,
            slope,
            mean_squares: ms.mean_square_vector(),
            df: ms.df_vector(),
        })
    }

    /// `g` at a candidate coefficient value; the limiting combination `p - q`
    /// is used as the value approaches 1.
    fn weights_at(&self, rho: f64) -> DVector<f64> {
        if (1.0 - rho).abs() < UNIT_NULL_TOLERANCE {
            return self.slope.clone();
        }
        let t = rho / (1.0 - rho);
        &self.base + &self.slope * t
    }

    fn partition(g: &DVector<f64>) -> Partition {
        let scale = g.amax();
        let threshold = WEIGHT_TOLERANCE * scale;
        let mut numerator = Vec::new();
        let mut denominator = Vec::new();
        for (idx, &w) in g.iter().enumerate() {
            if w > threshold {
                numerator.push(idx);
            } else if w < -threshold {
                denominator.push(idx);
            }
        }
        Partition {
            numerator,
            denominator,
        }
    }

    /// `sum |g_i| MS_i` over `terms`.
    fn side(&self, g: &DVector<f64>, terms: &[usize]) -> f64 {
        terms
            .iter()
            .map(|&idx| g[idx].abs() * self.mean_squares[idx])
            .sum()
    }

    fn signed(&self, g: &DVector<f64>, terms: &[usize]) -> f64 {
        terms.iter().map(|&idx| g[idx] * self.mean_squares[idx]).sum()
    }

    /// Satterthwaite degrees of freedom of `sum |g_i| MS_i` over `terms`.
    fn satterthwaite(&self, g: &DVector<f64>, terms: &[usize]) -> f64 {
        let nominal: f64 = if terms.is_empty() {
            self.df.sum()
        } else {
            terms.iter().map(|&idx| self.df[idx]).sum()
        };
        let total = self.side(g, terms);
        let spread: f64 = terms
            .iter()
            .map(|&idx| {
                let part = g[idx].abs() * self.mean_squares[idx];
                part * part / self.df[idx]
            })
            .sum();
        let v = if spread > 0.0 { total * total / spread } else { nominal };
        v.max(1.0)
    }

    /// Coefficient value at which `numerator = f * denominator`, holding the
    /// partition fixed.
    fn bound(&self, partition: &Partition, f: f64, fallback: f64) -> f64 {
        let alpha = self.signed(&self.base, &partition.numerator)
            + f * self.signed(&self.base, &partition.denominator);
        let beta = self.signed(&self.slope, &partition.numerator)
            + f * self.signed(&self.slope, &partition.denominator);

        let rho = if beta == 0.0 {
            if alpha > 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            let t = -alpha / beta;
            if t < 0.0 {
                0.0
            } else if t.is_infinite() {
                1.0
            } else {
                t / (1.0 + t)
            }
        };

        if rho.is_finite() {
            rho.clamp(0.0, 1.0)
        } else {
            fallback
        }
    }
}

fn not_applicable(ms: &MeanSquares, reliability: Reliability) -> IccError {
    let suffix = if ms.replicated() { "" } else { " without replicated ratings" };
    IccError::invalid_input(format!(
        "{reliability} coefficient is not defined for model {}{suffix}",
        ms.model()
    ))
}

fn f_distribution(df_numerator: f64, df_denominator: f64) -> Result<FisherSnedecor> {
    FisherSnedecor::new(df_numerator, df_denominator)
        .map_err(|e| IccError::distribution(e.to_string()))
}

/// Two-sided interval at `level` around `estimate`.
pub fn confidence_interval(
    ms: &MeanSquares,
    reliability: Reliability,
    estimate: IccValue,
    level: f64,
) -> Result<ConfidenceInterval> {
    if !(level > 0.0 && level < 1.0) {
        return Err(IccError::invalid_input(format!(
            "confidence level must lie in (0, 1), got {level}"
        )));
    }
    let form = RatioForm::new(ms, reliability)?;

    let (rho, substituted) = match estimate {
        IccValue::Estimate(v) => (v, false),
        IccValue::Undefined => {
            warn!(model = %ms.model(), %reliability, "undefined estimate, using 0 for the interval");
            (0.0, true)
        }
        IccValue::NotApplicable => return Err(not_applicable(ms, reliability)),
    };

    let g = form.weights_at(rho);
    let partition = RatioForm::partition(&g);
    let df_numerator = form.satterthwaite(&g, &partition.numerator);
    let df_denominator = form.satterthwaite(&g, &partition.denominator);

    let dist = f_distribution(df_numerator, df_denominator)?;
    let f_upper = dist.inverse_cdf((1.0 + level) / 2.0);
    let f_lower = dist.inverse_cdf((1.0 - level) / 2.0);

    // A floored component moves the estimate off the mean-square solution, so
    // it can fall outside the raw bounds; widen them just enough to cover it.
    let lower = form.bound(&partition, f_upper, 0.0).min(rho);
    let upper = form.bound(&partition, f_lower, 1.0).max(rho);

    debug!(
        model = %ms.model(),
        %reliability,
        level,
        lower,
        upper,
        df_numerator,
        df_denominator,
        "confidence interval"
    );

    Ok(ConfidenceInterval {
        reliability,
        level,
        estimate: rho,
        lower,
        upper,
        df_numerator,
        df_denominator,
        estimate_substituted: substituted,
    })
}

/// One-sided tests of `H0: rho <= null` for each value in `null_values`.
pub fn p_values(
    ms: &MeanSquares,
    reliability: Reliability,
    null_values: &[f64],
) -> Result<Vec<PValue>> {
    let form = RatioForm::new(ms, reliability)?;

    null_values
        .iter()
        .map(|&null| {
            if !(-UNIT_NULL_TOLERANCE..=1.0 + UNIT_NULL_TOLERANCE).contains(&null) {
                return Err(IccError::invalid_input(format!(
                    "null value must lie in [0, 1], got {null}"
                )));
            }
            let null = null.clamp(0.0, 1.0);

            let g = form.weights_at(null);
            let partition = RatioForm::partition(&g);
            let numerator = form.side(&g, &partition.numerator);
            let denominator = form.side(&g, &partition.denominator);
            let df_numerator = form.satterthwaite(&g, &partition.numerator);
            let df_denominator = form.satterthwaite(&g, &partition.denominator);

            let (f_statistic, p_value) = if numerator <= 0.0 {
                (0.0, 1.0)
            } else if denominator <= 0.0 {
                (f64::INFINITY, 0.0)
            } else {
                let f = numerator / denominator;
                let dist = f_distribution(df_numerator, df_denominator)?;
                (f, dist.sf(f).clamp(0.0, 1.0))
            };

            Ok(PValue {
                null_value: null,
                f_statistic,
                df_numerator,
                df_denominator,
                p_value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IccModel;
    use crate::stats::SufficientStatistics;
    use crate::table::RatingTable;

    fn mean_squares(model: IccModel) -> MeanSquares {
        let table = RatingTable::from_matrix(&[
            vec![9.0, 2.0, 5.0, 8.0],
            vec![6.0, 1.0, 3.0, 2.0],
            vec![8.0, 4.0, 6.0, 8.0],
            vec![7.0, 1.0, 2.0, 6.0],
            vec![10.0, 5.0, 6.0, 9.0],
            vec![6.0, 2.0, 4.0, 7.0],
        ])
        .unwrap();
        let stats = SufficientStatistics::from_table(&table).unwrap();
        MeanSquares::compute(&stats, model).unwrap()
    }

    #[test]
    fn mixed_model_reduces_to_exact_f_interval() {
        let ms = mean_squares(IccModel::TwoWayMixed);
        let estimate = IccValue::Estimate(0.714_840);
        let ci = confidence_interval(&ms, Reliability::InterRater, estimate, 0.95).unwrap();

        assert!((ci.df_numerator - 5.0).abs() < 1e-9);
        assert!((ci.df_denominator - 15.0).abs() < 1e-9);

        // closed form: (F/Fu - 1) / (F/Fu + k - 1)
        let f = ms.mss().unwrap() / ms.mse().unwrap();
        let dist = FisherSnedecor::new(5.0, 15.0).unwrap();
        let fu = dist.inverse_cdf(0.975);
        let expected = (f / fu - 1.0) / (f / fu + 3.0);
        assert!((ci.lower - expected).abs() < 1e-9);
    }

    #[test]
    fn zero_null_gives_classical_f_test() {
        let ms = mean_squares(IccModel::OneWaySubject);
        let p = p_values(&ms, Reliability::InterRater, &[0.0]).unwrap();
        let f = ms.mss().unwrap() / ms.mse().unwrap();
        assert!((p[0].f_statistic - f).abs() < 1e-9);
        assert!((p[0].df_numerator - 5.0).abs() < 1e-9);
        assert!((p[0].df_denominator - 18.0).abs() < 1e-9);
    }

    #[test]
    fn unit_null_uses_limiting_coefficients() {
        let ms = mean_squares(IccModel::OneWaySubject);
        let p = p_values(&ms, Reliability::InterRater, &[1.0]).unwrap();
        assert_eq!(p[0].p_value, 1.0);
    }

    #[test]
    fn rejects_out_of_range_inputs() {
        let ms = mean_squares(IccModel::TwoWayRandom);
        let est = IccValue::Estimate(0.3);
        for level in [0.0, 1.0, -0.2, f64::NAN] {
            let err = confidence_interval(&ms, Reliability::InterRater, est, level).unwrap_err();
            assert_eq!(err.code(), "invalid_input");
        }
        let err = p_values(&ms, Reliability::InterRater, &[0.2, 1.5]).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn intra_rater_without_replication_is_rejected() {
        let ms = mean_squares(IccModel::TwoWayRandom);
        let err = p_values(&ms, Reliability::IntraRater, &[0.0]).unwrap_err();
        assert!(err.to_string().contains("without replicated"), "{err}");
    }

    #[test]
    fn undefined_estimate_is_substituted() {
        let ms = mean_squares(IccModel::TwoWayMixed);
        let ci = confidence_interval(&ms, Reliability::InterRater, IccValue::Undefined, 0.9)
            .unwrap();
        assert!(ci.estimate_substituted);
        assert_eq!(ci.estimate, 0.0);
        assert!(ci.lower <= ci.upper);
    }
}
