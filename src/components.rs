//! Method III variance components.
//!
//! Equating each mean square to its expectation gives an upper-triangular
//! system in the model's unknown components, solved by back-substitution.
//! Negative solutions are floored at zero and listed in
//! [`VarianceComponents::clamped`].

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{IccError, Result};
use crate::mean_squares::{Effect, MeanSquares};
use crate::model::IccModel;

/// Variance components label their source the same way mean squares do.
pub type Component = Effect;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarianceComponents {
    pub model: IccModel,
    /// `None` for the rater-only one-way model.
    pub subject: Option<f64>,
    /// `None` unless raters are modelled as random.
    pub rater: Option<f64>,
    /// `None` unless an interaction model has replicated cells.
    pub interaction: Option<f64>,
    pub error: f64,
    /// Components whose moment solution was negative and was set to zero.
    pub clamped: Vec<Component>,
    pub replicated: bool,
    pub raters: usize,
    /// Floored components in the order of [`MeanSquares::unknowns`], before
    /// any change of parameterisation.
    #[serde(skip)]
    solved: Vec<f64>,
}

impl VarianceComponents {
    pub fn estimate(mean_squares: &MeanSquares, raters: usize) -> Result<Self> {
        let model = mean_squares.model();
        let k = mean_squares.expected_matrix();
        let ms = mean_squares.mean_square_vector();

        let theta = k.solve_upper_triangular(&ms).ok_or_else(|| {
            IccError::degenerate("expected mean square equations are singular")
        })?;

        let mut clamped = Vec::new();
        let mut solved = Vec::with_capacity(theta.len());
        for (&effect, &raw) in mean_squares.unknowns().iter().zip(theta.iter()) {
            if !raw.is_finite() {
                return Err(IccError::degenerate(format!(
                    "{effect:?} variance component is not finite"
                )));
            }
            if raw < 0.0 {
                warn!(model = %model, component = ?effect, raw, "negative variance component set to zero");
                clamped.push(effect);
            }
            solved.push(raw.max(0.0));
        }

        let value = |effect: Effect| {
            mean_squares
                .unknowns()
                .iter()
                .position(|&e| e == effect)
                .map(|idx| solved[idx])
        };

        let mut subject = value(Effect::Subject);
        let mut interaction = value(Effect::Interaction);
        if model == IccModel::TwoWayMixedInteraction {
            // Restricted form: interaction effects sum to zero over the fixed raters.
            if let (Some(su), Some(iu)) = (subject, interaction) {
                let r = raters as f64;
                subject = Some(su + iu / r);
                interaction = Some(iu * (r - 1.0) / r);
            }
        }

        let components = Self {
            model,
            subject,
            rater: value(Effect::Rater),
            interaction,
            error: value(Effect::Error).unwrap_or(0.0),
            clamped,
            replicated: mean_squares.replicated(),
            raters,
            solved,
        };
        debug!(
            model = %model,
            subject = ?components.subject,
            rater = ?components.rater,
            interaction = ?components.interaction,
            error = components.error,
            "variance components estimated"
        );
        Ok(components)
    }

    /// Sum of every reported component.
    pub fn total(&self) -> f64 {
        self.subject.unwrap_or(0.0)
            + self.rater.unwrap_or(0.0)
            + self.interaction.unwrap_or(0.0)
            + self.error
    }

    pub fn was_clamped(&self, component: Component) -> bool {
        self.clamped.contains(&component)
    }

    /// Components in solve order, as the expected mean squares see them.
    pub fn solved(&self) -> &[f64] {
        &self.solved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::SufficientStatistics;
    use crate::table::{RatingRow, RatingTable};

    fn estimate(table: &RatingTable, model: IccModel) -> VarianceComponents {
        let stats = SufficientStatistics::from_table(table).unwrap();
        let ms = MeanSquares::compute(&stats, model).unwrap();
        VarianceComponents::estimate(&ms, table.n_raters()).unwrap()
    }

    fn shrout_fleiss() -> RatingTable {
        RatingTable::from_matrix(&[
            vec![9.0, 2.0, 5.0, 8.0],
            vec![6.0, 1.0, 3.0, 2.0],
            vec![8.0, 4.0, 6.0, 8.0],
            vec![7.0, 1.0, 2.0, 6.0],
            vec![10.0, 5.0, 6.0, 9.0],
            vec![6.0, 2.0, 4.0, 7.0],
        ])
        .unwrap()
    }

    #[test]
    fn balanced_two_way_random_closed_forms() {
        let vc = estimate(&shrout_fleiss(), IccModel::TwoWayRandom);
        let (mss, msr, mse) = (11.241_666_7, 32.486_111_1, 1.019_444_4);
        assert!((vc.subject.unwrap() - (mss - mse) / 4.0).abs() < 1e-6);
        assert!((vc.rater.unwrap() - (msr - mse) / 6.0).abs() < 1e-6);
        assert!((vc.error - mse).abs() < 1e-6);
        assert_eq!(vc.interaction, None);
        assert!(vc.clamped.is_empty());
    }

    #[test]
    fn negative_solution_is_floored_and_flagged() {
        // subjects barely differ while raters disagree wildly
        let table = RatingTable::from_matrix(&[
            vec![1.0, 9.0, 5.0],
            vec![9.0, 1.0, 5.0],
            vec![5.0, 5.0, 5.0],
        ])
        .unwrap();
        let vc = estimate(&table, IccModel::OneWaySubject);
        assert_eq!(vc.subject, Some(0.0));
        assert!(vc.was_clamped(Component::Subject));
        assert!(vc.error > 0.0);
    }

    #[test]
    fn mixed_interaction_uses_restricted_parameterisation() {
        let mut rows = Vec::new();
        for (s, base) in [("a", 2.0), ("b", 5.0), ("c", 3.0), ("d", 7.0)] {
            rows.push(RatingRow::complete(s, &[base, base + 2.0, base - 1.0]));
            rows.push(RatingRow::complete(s, &[base + 1.0, base + 0.5, base]));
        }
        let table = RatingTable::from_rows(rows).unwrap();
        let vc = estimate(&table, IccModel::TwoWayMixedInteraction);

        let su = vc.solved()[0];
        let iu = vc.solved()[1];
        assert!((vc.subject.unwrap() - (su + iu / 3.0)).abs() < 1e-12);
        assert!((vc.interaction.unwrap() - iu * 2.0 / 3.0).abs() < 1e-12);
        assert!(vc.replicated);
        assert_eq!(vc.rater, None);
    }

    #[test]
    fn rater_model_reports_no_subject_component() {
        let vc = estimate(&shrout_fleiss(), IccModel::OneWayRater);
        assert_eq!(vc.subject, None);
        assert!(vc.rater.unwrap() > 0.0);
    }
}
