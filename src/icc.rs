//! Intraclass correlation coefficients from variance components.

use nalgebra::DVector;
use serde::Serialize;

use crate::components::VarianceComponents;
use crate::mean_squares::Effect;
use crate::model::{IccModel, Reliability};

/// One coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum IccValue {
    /// Point estimate in `[0, 1]`.
    Estimate(f64),
    /// Every variance component collapsed to zero.
    Undefined,
    /// The model cannot measure this kind of reliability.
    NotApplicable,
}

impl IccValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            IccValue::Estimate(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_applicable(&self) -> bool {
        !matches!(self, IccValue::NotApplicable)
    }

    fn ratio(numerator: f64, total: f64) -> Self {
        if total > 0.0 {
            IccValue::Estimate((numerator / total).clamp(0.0, 1.0))
        } else {
            IccValue::Undefined
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IccEstimates {
    pub inter: IccValue,
    pub intra: IccValue,
}

impl IccEstimates {
    pub fn get(&self, reliability: Reliability) -> IccValue {
        match reliability {
            Reliability::InterRater => self.inter,
            Reliability::IntraRater => self.intra,
        }
    }
}

/// Inter- and intra-rater coefficients for `model`.
pub fn compute_icc(components: &VarianceComponents, model: IccModel) -> IccEstimates {
    let s = components.subject.unwrap_or(0.0);
    let r = components.rater.unwrap_or(0.0);
    let i = components.interaction.unwrap_or(0.0);
    let e = components.error;
    let replicated = components.replicated;

    match model {
        IccModel::OneWaySubject => IccEstimates {
            inter: IccValue::ratio(s, s + e),
            intra: IccValue::NotApplicable,
        },
        IccModel::OneWayRater => IccEstimates {
            inter: IccValue::NotApplicable,
            intra: IccValue::ratio(r, r + e),
        },
        IccModel::TwoWayRandom | IccModel::TwoWayRandomInteraction => {
            let total = s + r + i + e;
            IccEstimates {
                inter: IccValue::ratio(s, total),
                intra: if replicated {
                    IccValue::ratio(s + r + i, total)
                } else {
                    IccValue::NotApplicable
                },
            }
        }
        IccModel::TwoWayMixed | IccModel::TwoWayMixedInteraction => {
            let total = s + i + e;
            let fixed = (components.raters as f64 - 1.0).max(1.0);
            IccEstimates {
                inter: IccValue::ratio(s - i / fixed, total),
                intra: if replicated {
                    IccValue::ratio(s + i, total)
                } else {
                    IccValue::NotApplicable
                },
            }
        }
    }
}

/// Weights `(p, q)` over the solve-order unknowns such that the coefficient
/// equals `p'theta / q'theta`. `None` when the coefficient is not applicable.
pub(crate) fn ratio_weights(
    unknowns: &[Effect],
    model: IccModel,
    reliability: Reliability,
    replicated: bool,
) -> Option<(DVector<f64>, DVector<f64>)> {
    let numerator: &[Effect] = match (model, reliability) {
        (IccModel::OneWayRater, Reliability::InterRater) => return None,
        (IccModel::OneWaySubject, Reliability::IntraRater) => return None,
        (IccModel::OneWayRater, Reliability::IntraRater) => &[Effect::Rater],
        (_, Reliability::InterRater) => &[Effect::Subject],
        (_, Reliability::IntraRater) if !replicated => return None,
        (_, Reliability::IntraRater) => &[Effect::Subject, Effect::Rater, Effect::Interaction],
    };

    let p = DVector::from_iterator(
        unknowns.len(),
        unknowns
            .iter()
            .map(|e| if numerator.contains(e) { 1.0 } else { 0.0 }),
    );
    let q = DVector::from_element(unknowns.len(), 1.0);
    Some((p, q))
}
