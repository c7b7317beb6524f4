#![forbid(unsafe_code)]

//! # icc-harness
//!
//! Intraclass correlation coefficients for rating tables that are rarely as
//! tidy as the textbook: raters skip subjects, subjects are rated several
//! times, some cells are empty.
//!
//! The engine fits the classical one-way and two-way random/mixed ANOVA
//! designs by the method of moments on sums of squares between nested fits
//! (Henderson's Method III), derives inter- and intra-rater ICCs from the
//! variance components, and attaches Satterthwaite-approximated F intervals
//! and p-values. On balanced complete data every quantity reduces to the
//! familiar closed forms.
//!
//! ```no_run
//! use icc_harness::{IccAnalysis, IccModel, RatingTable, Reliability};
//!
//! let table = RatingTable::from_csv_path("ratings.csv", true)?;
//! let analysis = IccAnalysis::new(&table, IccModel::TwoWayRandom)?;
//! let ci = analysis.confidence_interval(Reliability::InterRater, 0.95)?;
//! println!("{:?} in [{:.3}, {:.3}]", analysis.icc().inter, ci.lower, ci.upper);
//! # Ok::<(), icc_harness::IccError>(())
//! ```

pub mod analysis;
pub mod components;
pub mod config;
pub mod design;
pub mod error;
pub mod icc;
pub mod inference;
pub mod mean_squares;
pub mod model;
pub mod stats;
pub mod table;

pub use analysis::{
    confidence_interval, estimate_variance_components, p_values, IccAnalysis, IccReport,
};
pub use components::{Component, VarianceComponents};
pub use config::AnalysisConfig;
pub use error::{IccError, Result};
pub use icc::{compute_icc, IccEstimates, IccValue};
pub use inference::{ConfidenceInterval, PValue};
pub use mean_squares::{Effect, MeanSquareTerm, MeanSquares};
pub use model::{
    IccModel, Reliability, DEFAULT_CONFIDENCE_LEVEL, DEFAULT_NULL_VALUES, REPORTING_NULL_VALUES,
};
pub use stats::{DerivedCounts, SufficientStatistics};
pub use table::{RatingRow, RatingTable};
