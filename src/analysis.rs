//! End-to-end analysis of one rating table under one model.
//!
//! [`IccAnalysis`] runs the pipeline once (statistics, mean squares,
//! components, coefficients) and answers interval and p-value queries from
//! the cached pieces. The free functions are thin wrappers for one-shot use.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::components::VarianceComponents;
use crate::config::AnalysisConfig;
use crate::error::{IccError, Result};
use crate::icc::{self, IccEstimates};
use crate::inference::{self, ConfidenceInterval, PValue};
use crate::mean_squares::{MeanSquareTerm, MeanSquares};
use crate::model::{IccModel, Reliability};
use crate::stats::{DerivedCounts, SufficientStatistics};
use crate::table::RatingTable;

#[derive(Debug, Clone)]
pub struct IccAnalysis {
    model: IccModel,
    stats: Arc<SufficientStatistics>,
    mean_squares: MeanSquares,
    components: VarianceComponents,
    icc: IccEstimates,
}

/// Everything one analysis produces, ready for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct IccReport {
    pub model: IccModel,
    pub description: &'static str,
    pub counts: DerivedCounts,
    pub mean_squares: Vec<MeanSquareTerm>,
    pub components: VarianceComponents,
    pub icc: IccEstimates,
    pub reliability: Reliability,
    pub confidence_interval: ConfidenceInterval,
    pub p_values: Vec<PValue>,
}

impl IccAnalysis {
    pub fn new(table: &RatingTable, model: IccModel) -> Result<Self> {
        let stats = table.statistics()?;
        debug!(
            model = %model,
            subjects = stats.n_subjects(),
            raters = stats.n_raters(),
            ratings = stats.total(),
            replicated = stats.replicated(),
            "analysing rating table"
        );

        let mean_squares = MeanSquares::compute(&stats, model)?;
        let components = VarianceComponents::estimate(&mean_squares, stats.n_raters())?;
        let icc = icc::compute_icc(&components, model);

        Ok(Self {
            model,
            stats,
            mean_squares,
            components,
            icc,
        })
    }

    pub fn model(&self) -> IccModel {
        self.model
    }

    pub fn statistics(&self) -> &SufficientStatistics {
        &self.stats
    }

    pub fn mean_squares(&self) -> &MeanSquares {
        &self.mean_squares
    }

    pub fn components(&self) -> &VarianceComponents {
        &self.components
    }

    pub fn icc(&self) -> IccEstimates {
        self.icc
    }

    pub fn derived_counts(&self) -> DerivedCounts {
        self.stats
            .derived_counts(self.model == IccModel::OneWayRater)
    }

    pub fn confidence_interval(
        &self,
        reliability: Reliability,
        level: f64,
    ) -> Result<ConfidenceInterval> {
        inference::confidence_interval(
            &self.mean_squares,
            reliability,
            self.icc.get(reliability),
            level,
        )
    }

    pub fn p_values(&self, reliability: Reliability, null_values: &[f64]) -> Result<Vec<PValue>> {
        inference::p_values(&self.mean_squares, reliability, null_values)
    }

    pub fn report(&self, config: &AnalysisConfig) -> Result<IccReport> {
        if config.model != self.model {
            return Err(IccError::invalid_input(format!(
                "config is for model {}, analysis ran {}",
                config.model, self.model
            )));
        }
        config.validate()?;
        let reliability = config.reliability();

        Ok(IccReport {
            model: self.model,
            description: self.model.describe(),
            counts: self.derived_counts(),
            mean_squares: self.mean_squares.terms().to_vec(),
            components: self.components.clone(),
            icc: self.icc,
            reliability,
            confidence_interval: self.confidence_interval(reliability, config.confidence_level)?,
            p_values: self.p_values(reliability, &config.null_values)?,
        })
    }
}

/// Variance components of `table` under `model`, with the counts they rest on.
pub fn estimate_variance_components(
    table: &RatingTable,
    model: IccModel,
) -> Result<(VarianceComponents, DerivedCounts)> {
    let analysis = IccAnalysis::new(table, model)?;
    let counts = analysis.derived_counts();
    Ok((analysis.components, counts))
}

/// Interval for the model's primary coefficient.
pub fn confidence_interval(
    table: &RatingTable,
    model: IccModel,
    level: f64,
) -> Result<ConfidenceInterval> {
    IccAnalysis::new(table, model)?.confidence_interval(model.primary_reliability(), level)
}

/// p-values for the model's primary coefficient.
pub fn p_values(table: &RatingTable, model: IccModel, null_values: &[f64]) -> Result<Vec<PValue>> {
    IccAnalysis::new(table, model)?.p_values(model.primary_reliability(), null_values)
}
