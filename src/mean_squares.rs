//! Mean squares and their expectations.
//!
//! Each term is a sum of squares between nested fits (so it is never
//! negative), its degrees of freedom, and the row of coefficients expressing
//! `E[MS]` as a linear combination of the model's variance components. The
//! variance-component solve and the inference engine both read these rows,
//! which keeps a point estimate and its interval on the same footing.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::design::RaterAdjustment;
use crate::error::{IccError, Result};
use crate::model::IccModel;
use crate::stats::SufficientStatistics;

/// Source of variation: labels both sums of squares and variance components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Subject,
    Rater,
    Interaction,
    Error,
}

impl Effect {
    pub const ALL: [Effect; 4] = [Effect::Subject, Effect::Rater, Effect::Interaction, Effect::Error];

    fn column(self) -> usize {
        match self {
            Effect::Subject => 0,
            Effect::Rater => 1,
            Effect::Interaction => 2,
            Effect::Error => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MeanSquareTerm {
    pub effect: Effect,
    pub sum_of_squares: f64,
    pub df: f64,
    pub mean_square: f64,
    /// Coefficients of `E[MS]` on [`MeanSquares::unknowns`].
    pub expected: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeanSquares {
    model: IccModel,
    replicated: bool,
    unknowns: Vec<Effect>,
    terms: Vec<MeanSquareTerm>,
}

/// A sum of squares with its expectation over all four effects.
struct RawTerm {
    effect: Effect,
    ss: f64,
    df: f64,
    expected_ss: [f64; 4],
}

impl MeanSquares {
    pub fn compute(stats: &SufficientStatistics, model: IccModel) -> Result<Self> {
        let replicated = stats.replicated();
        let unknowns = unknowns_for(model, replicated);
        let raw = if model.is_two_way() {
            let adjustment = RaterAdjustment::from_statistics(stats)?;
            two_way_terms(stats, &adjustment, model)
        } else {
            one_way_terms(stats, model)
        };

        let mut terms = Vec::with_capacity(raw.len());
        for term in raw {
            if term.df <= 0.0 {
                return Err(IccError::degenerate(format!(
                    "{:?} sum of squares has {} degrees of freedom",
                    term.effect, term.df
                )));
            }
            let expected = unknowns
                .iter()
                .map(|e| term.expected_ss[e.column()] / term.df)
                .collect();
            let ss = term.ss.max(0.0);
            terms.push(MeanSquareTerm {
                effect: term.effect,
                sum_of_squares: ss,
                df: term.df,
                mean_square: ss / term.df,
                expected,
            });
        }

        Ok(Self {
            model,
            replicated,
            unknowns,
            terms,
        })
    }

    pub fn model(&self) -> IccModel {
        self.model
    }

    /// Some cell holds more than one rating.
    pub fn replicated(&self) -> bool {
        self.replicated
    }

    /// Variance components the expectations are expressed in, solve order.
    pub fn unknowns(&self) -> &[Effect] {
        &self.unknowns
    }

    pub fn terms(&self) -> &[MeanSquareTerm] {
        &self.terms
    }

    pub fn term(&self, effect: Effect) -> Option<&MeanSquareTerm> {
        self.terms.iter().find(|t| t.effect == effect)
    }

    /// Between-subject mean square.
    pub fn mss(&self) -> Option<f64> {
        self.term(Effect::Subject).map(|t| t.mean_square)
    }

    /// Between-rater mean square (raters modelled as random).
    pub fn msr(&self) -> Option<f64> {
        self.term(Effect::Rater).map(|t| t.mean_square)
    }

    /// Subject x rater interaction mean square (replicated interaction models).
    pub fn msi(&self) -> Option<f64> {
        self.term(Effect::Interaction).map(|t| t.mean_square)
    }

    /// Residual mean square.
    pub fn mse(&self) -> Option<f64> {
        self.term(Effect::Error).map(|t| t.mean_square)
    }

    pub fn mean_square_vector(&self) -> DVector<f64> {
        DVector::from_iterator(self.terms.len(), self.terms.iter().map(|t| t.mean_square))
    }

    pub fn df_vector(&self) -> DVector<f64> {
        DVector::from_iterator(self.terms.len(), self.terms.iter().map(|t| t.df))
    }

    /// `K` with `E[MS] = K * theta`; upper triangular in solve order.
    pub fn expected_matrix(&self) -> DMatrix<f64> {
        let k = self.unknowns.len();
        DMatrix::from_fn(k, k, |row, col| self.terms[row].expected[col])
    }
}

/// Unknown variance components of `model`. Without replicated cells the
/// interaction cannot be told apart from error and is folded into it.
pub fn unknowns_for(model: IccModel, replicated: bool) -> Vec<Effect> {
    use Effect::*;
    match model {
        IccModel::OneWaySubject => vec![Subject, Error],
        IccModel::OneWayRater => vec![Rater, Error],
        IccModel::TwoWayRandomInteraction if replicated => vec![Subject, Rater, Interaction, Error],
        IccModel::TwoWayRandom | IccModel::TwoWayRandomInteraction => vec![Subject, Rater, Error],
        IccModel::TwoWayMixedInteraction if replicated => vec![Subject, Interaction, Error],
        IccModel::TwoWayMixed | IccModel::TwoWayMixedInteraction => vec![Subject, Error],
    }
}

fn one_way_terms(stats: &SufficientStatistics, model: IccModel) -> Vec<RawTerm> {
    let total = stats.total();
    let t0 = stats.sum_squares();
    let t_mean = stats.t_mean();

    let (effect, t_group, groups, k_group) = if model == IccModel::OneWayRater {
        (Effect::Rater, stats.t_raters(), stats.n_raters() as f64, stats.k_raters())
    } else {
        (Effect::Subject, stats.t_subjects(), stats.n_subjects() as f64, stats.k_subjects())
    };

    let mut between = [0.0; 4];
    between[effect.column()] = total - k_group;
    between[Effect::Error.column()] = groups - 1.0;

    vec![
        RawTerm {
            effect,
            ss: t_group - t_mean,
            df: groups - 1.0,
            expected_ss: between,
        },
        RawTerm {
            effect: Effect::Error,
            ss: t0 - t_group,
            df: total - groups,
            expected_ss: [0.0, 0.0, 0.0, total - groups],
        },
    ]
}

fn two_way_terms(
    stats: &SufficientStatistics,
    adjustment: &RaterAdjustment,
    model: IccModel,
) -> Vec<RawTerm> {
    let n = stats.n_subjects() as f64;
    let r = stats.n_raters() as f64;
    let total = stats.total();
    let cells = stats.filled_cells() as f64;
    let k1 = stats.k1();
    let k2 = stats.k2();
    let tau = adjustment.interaction_trace();
    let rater_ss = adjustment.rater_ss();

    let t0 = stats.sum_squares();
    let t_s = stats.t_subjects();
    let t_r = stats.t_raters();
    let t_sr = stats.t_cells();

    let mut terms = vec![RawTerm {
        effect: Effect::Subject,
        ss: t_s + rater_ss - t_r,
        df: n - 1.0,
        expected_ss: [total - k2, 0.0, k1 + tau - k2, n - 1.0],
    }];

    if model.raters_random() {
        terms.push(RawTerm {
            effect: Effect::Rater,
            ss: rater_ss,
            df: r - 1.0,
            expected_ss: [0.0, total - k1, tau, r - 1.0],
        });
    }

    if model.has_interaction() && stats.replicated() {
        let df_i = cells - n - r + 1.0;
        terms.push(RawTerm {
            effect: Effect::Interaction,
            ss: t_sr - t_s - rater_ss,
            df: df_i,
            expected_ss: [0.0, 0.0, total - k1 - tau, df_i],
        });
        terms.push(RawTerm {
            effect: Effect::Error,
            ss: t0 - t_sr,
            df: total - cells,
            expected_ss: [0.0, 0.0, 0.0, total - cells],
        });
    } else {
        let df_e = total - n - r + 1.0;
        terms.push(RawTerm {
            effect: Effect::Error,
            ss: t0 - t_s - rater_ss,
            df: df_e,
            expected_ss: [0.0, 0.0, total - k1 - tau, df_e],
        });
    }

    terms
}
