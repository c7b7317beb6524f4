//! Catalogue of the supported ANOVA designs and named defaults.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IccError;

/// Default confidence level for intervals.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Null values tested when the caller does not supply any.
pub const DEFAULT_NULL_VALUES: [f64; 1] = [0.0];

/// Benchmark grid commonly reported alongside an ICC.
pub const REPORTING_NULL_VALUES: [f64; 6] = [0.0, 0.1, 0.3, 0.5, 0.7, 0.9];

/// Null values closer than this to 1 use the limiting-case coefficients.
pub const UNIT_NULL_TOLERANCE: f64 = 1e-15;

/// Experimental design the ratings are assumed to follow. The caller picks it;
/// nothing in the engine chooses between designs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IccModel {
    /// One-way model, subject effect only (raters are interchangeable).
    OneWaySubject,
    /// One-way model, rater effect only (each rater scores repeated sessions).
    OneWayRater,
    /// Subjects and raters both random, no interaction.
    TwoWayRandom,
    /// Subjects and raters both random, with subject x rater interaction.
    TwoWayRandomInteraction,
    /// Subjects random, raters fixed, no interaction.
    TwoWayMixed,
    /// Subjects random, raters fixed, with subject x rater interaction.
    TwoWayMixedInteraction,
}

impl IccModel {
    pub const ALL: [IccModel; 6] = [
        IccModel::OneWaySubject,
        IccModel::OneWayRater,
        IccModel::TwoWayRandom,
        IccModel::TwoWayRandomInteraction,
        IccModel::TwoWayMixed,
        IccModel::TwoWayMixedInteraction,
    ];

    /// Stable identifier used in configs and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            IccModel::OneWaySubject => "one_way_subject",
            IccModel::OneWayRater => "one_way_rater",
            IccModel::TwoWayRandom => "two_way_random",
            IccModel::TwoWayRandomInteraction => "two_way_random_interaction",
            IccModel::TwoWayMixed => "two_way_mixed",
            IccModel::TwoWayMixedInteraction => "two_way_mixed_interaction",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            IccModel::OneWaySubject => "one-way random, subject effect",
            IccModel::OneWayRater => "one-way random, rater effect with repeated sessions",
            IccModel::TwoWayRandom => "two-way random, no interaction",
            IccModel::TwoWayRandomInteraction => "two-way random with interaction",
            IccModel::TwoWayMixed => "two-way mixed (fixed raters), no interaction",
            IccModel::TwoWayMixedInteraction => "two-way mixed (fixed raters) with interaction",
        }
    }

    pub fn is_two_way(&self) -> bool {
        !matches!(self, IccModel::OneWaySubject | IccModel::OneWayRater)
    }

    pub fn has_interaction(&self) -> bool {
        matches!(
            self,
            IccModel::TwoWayRandomInteraction | IccModel::TwoWayMixedInteraction
        )
    }

    /// Raters carry a variance component (as opposed to fixed effects or no effect).
    pub fn raters_random(&self) -> bool {
        matches!(
            self,
            IccModel::OneWayRater | IccModel::TwoWayRandom | IccModel::TwoWayRandomInteraction
        )
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self, IccModel::TwoWayMixed | IccModel::TwoWayMixedInteraction)
    }

    /// Coefficient the design is primarily built to measure.
    pub fn primary_reliability(&self) -> Reliability {
        match self {
            IccModel::OneWayRater => Reliability::IntraRater,
            _ => Reliability::InterRater,
        }
    }
}

impl fmt::Display for IccModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IccModel {
    type Err = IccError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        IccModel::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == key)
            .ok_or_else(|| IccError::invalid_input(format!("unknown model '{s}'")))
    }
}

/// Which agreement coefficient a computation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    /// Agreement between different raters scoring the same subject.
    InterRater,
    /// Consistency of a rater with themselves across occasions.
    IntraRater,
}

impl fmt::Display for Reliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reliability::InterRater => f.write_str("inter_rater"),
            Reliability::IntraRater => f.write_str("intra_rater"),
        }
    }
}
