//! Validated, immutable subject x rater rating table.
//!
//! Column 1 of the input holds the subject identifier (repeats allowed: each
//! repeat is another rating occasion of the same subject), the remaining
//! columns hold one rater each. Missing cells stay `None`; they are never
//! coerced to zero.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::error::{IccError, Result};
use crate::stats::SufficientStatistics;

/// Cell markers read as "no rating".
const MISSING_MARKERS: [&str; 7] = ["", "NA", "na", "N/A", "NaN", "nan", "."];

/// One input row: a subject on one rating occasion.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRow {
    pub subject: String,
    pub ratings: Vec<Option<f64>>,
}

impl RatingRow {
    pub fn new(subject: impl Into<String>, ratings: Vec<Option<f64>>) -> Self {
        Self {
            subject: subject.into(),
            ratings,
        }
    }

    /// Row without missing cells.
    pub fn complete(subject: impl Into<String>, ratings: &[f64]) -> Self {
        Self::new(subject, ratings.iter().copied().map(Some).collect())
    }
}

#[derive(Debug, Clone)]
pub struct RatingTable {
    rater_names: Vec<String>,
    rows: Vec<RatingRow>,
    subjects: Vec<String>,
    row_subject: Vec<usize>,
    stats: OnceLock<Arc<SufficientStatistics>>,
}

impl RatingTable {
    /// Validate rows against the rater columns and index subjects in
    /// first-appearance order.
    pub fn new(rater_names: Vec<String>, rows: Vec<RatingRow>) -> Result<Self> {
        let r = rater_names.len();
        if r < 2 {
            return Err(IccError::invalid_input(format!(
                "at least 2 rater columns are required, got {r}"
            )));
        }

        let mut subjects: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut row_subject = Vec::with_capacity(rows.len());

        for (k, row) in rows.iter().enumerate() {
            if row.subject.trim().is_empty() {
                return Err(IccError::invalid_input(format!(
                    "row {} has an empty subject identifier",
                    k + 1
                )));
            }
            if row.ratings.len() != r {
                return Err(IccError::invalid_input(format!(
                    "row {} has {} ratings, expected {r}",
                    k + 1,
                    row.ratings.len()
                )));
            }
            if let Some((j, v)) = row
                .ratings
                .iter()
                .enumerate()
                .find_map(|(j, v)| v.filter(|x| !x.is_finite()).map(|x| (j, x)))
            {
                return Err(IccError::invalid_input(format!(
                    "row {} column '{}' holds non-finite rating {v}",
                    k + 1,
                    rater_names[j]
                )));
            }

            let next = subjects.len();
            let i = *index.entry(row.subject.clone()).or_insert_with(|| {
                subjects.push(row.subject.clone());
                next
            });
            row_subject.push(i);
        }

        if subjects.len() < 2 {
            return Err(IccError::invalid_input(format!(
                "at least 2 subjects are required, got {}",
                subjects.len()
            )));
        }

        Ok(Self {
            rater_names,
            rows,
            subjects,
            row_subject,
            stats: OnceLock::new(),
        })
    }

    /// Build a table with generated rater names `rater_1..rater_r`.
    pub fn from_rows(rows: Vec<RatingRow>) -> Result<Self> {
        let r = rows.first().map(|row| row.ratings.len()).unwrap_or(0);
        Self::new(default_rater_names(r), rows)
    }

    /// Complete table, one row per subject, subjects labelled `1..n`.
    pub fn from_matrix(ratings: &[Vec<f64>]) -> Result<Self> {
        let rows = ratings
            .iter()
            .enumerate()
            .map(|(i, row)| RatingRow::complete((i + 1).to_string(), row))
            .collect();
        Self::from_rows(rows)
    }

    /// Parse comma-separated ratings. The first column is the subject id.
    pub fn from_csv_str(content: &str, has_header: bool) -> Result<Self> {
        let mut rater_names: Option<Vec<String>> = None;
        let mut width: Option<usize> = None;
        let mut rows = Vec::new();

        for (line_num, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            let parts: Vec<&str> = line.split(',').map(unquote).collect();
            if parts.len() < 3 {
                return Err(IccError::parse(
                    line_num + 1,
                    format!("expected a subject column and at least 2 rating columns, got {} columns", parts.len()),
                ));
            }

            if has_header && rater_names.is_none() {
                rater_names = Some(parts[1..].iter().map(|s| s.to_string()).collect());
                width = Some(parts.len());
                continue;
            }

            let expected = *width.get_or_insert(parts.len());
            if parts.len() != expected {
                return Err(IccError::parse(
                    line_num + 1,
                    format!("expected {expected} columns, got {}", parts.len()),
                ));
            }

            let mut ratings = Vec::with_capacity(parts.len() - 1);
            for (j, cell) in parts[1..].iter().enumerate() {
                ratings.push(parse_cell(cell).ok_or_else(|| {
                    let column = rater_names
                        .as_ref()
                        .and_then(|names| names.get(j).cloned())
                        .unwrap_or_else(|| format!("column {}", j + 2));
                    IccError::invalid_input(format!(
                        "non-numeric rating '{cell}' at line {} in '{column}'",
                        line_num + 1
                    ))
                })?);
            }
            rows.push(RatingRow::new(parts[0], ratings));
        }

        let names = match rater_names {
            Some(names) => names,
            None => default_rater_names(width.map(|w| w - 1).unwrap_or(0)),
        };
        Self::new(names, rows)
    }

    pub fn from_csv_path(path: impl AsRef<Path>, has_header: bool) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_csv_str(&content, has_header)
    }

    pub fn n_subjects(&self) -> usize {
        self.subjects.len()
    }

    pub fn n_raters(&self) -> usize {
        self.rater_names.len()
    }

    pub fn rater_names(&self) -> &[String] {
        &self.rater_names
    }

    /// Distinct subject ids, first-appearance order.
    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn rows(&self) -> &[RatingRow] {
        &self.rows
    }

    /// Index into [`Self::subjects`] of every row, aligned with [`Self::rows`].
    pub fn row_subjects(&self) -> &[usize] {
        &self.row_subject
    }

    /// Moment sums for this table, computed on first use and shared afterwards.
    pub fn statistics(&self) -> Result<Arc<SufficientStatistics>> {
        if let Some(stats) = self.stats.get() {
            return Ok(Arc::clone(stats));
        }
        let stats = Arc::new(SufficientStatistics::from_table(self)?);
        Ok(Arc::clone(self.stats.get_or_init(|| stats)))
    }
}

fn default_rater_names(r: usize) -> Vec<String> {
    (1..=r).map(|j| format!("rater_{j}")).collect()
}

fn unquote(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
        .trim()
}

/// `Some(None)` for a missing marker, `Some(Some(x))` for a number, `None` otherwise.
fn parse_cell(cell: &str) -> Option<Option<f64>> {
    if MISSING_MARKERS.contains(&cell) {
        return Some(None);
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite()).map(Some)
}
