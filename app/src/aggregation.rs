// ==============================================================================
// aggregation.rs - Probe-to-Gene Aggregation Engine
// ==============================================================================
// Description: Joins a filtered probe annotation with a probe-level matrix and
//              collapses probe values to one value per gene and sample
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Join semantics:
//   Inner join on probe_id, many-to-many. A probe annotated to genes {A, B}
//   contributes its value to both; a gene annotated by probes {p1, p2}
//   receives both values. Each surviving annotation row is one edge.
//
// Missing values (NaN) are skipped, as pandas' groupby does by default:
//   Sum of nothing = 0.0; Mean/Median/Geometric mean of nothing = NaN
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::filter::{FeatureFilter, FeatureRequestError};
use crate::models::{AggregatedMatrix, MethylationMatrix, ProbeAnnotation};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    #[error(
        "Geometric mean is undefined for negative values: gene '{gene_id}', \
         sample '{sample}' has value {value}"
    )]
    NegativeGeometricMean {
        gene_id: String,
        sample: String,
        value: f64,
    },

    #[error("Unknown aggregation strategy '{0}'. Options are Sum, Mean, Median, Geometric mean.")]
    UnknownStrategy(String),
}

/// Failure of a full filter-join-aggregate request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    #[error(transparent)]
    Features(#[from] FeatureRequestError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

/// How multiple probe values for one gene are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationStrategy {
    Sum,
    Mean,
    Median,
    GeometricMean,
}

impl AggregationStrategy {
    pub const ALL: [AggregationStrategy; 4] = [
        AggregationStrategy::Sum,
        AggregationStrategy::Mean,
        AggregationStrategy::Median,
        AggregationStrategy::GeometricMean,
    ];

    /// Canonical name, as accepted on the command line and used in output file names
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationStrategy::Sum => "Sum",
            AggregationStrategy::Mean => "Mean",
            AggregationStrategy::Median => "Median",
            AggregationStrategy::GeometricMean => "Geometric mean",
        }
    }

    /// Combine one gene's values for one sample
    ///
    /// `values` is reordered in place (median sorts it). NaN entries are
    /// ignored. Returns `Err(value)` with the offending value when the
    /// geometric mean meets a negative input.
    pub fn apply(&self, values: &mut [f64]) -> Result<f64, f64> {
        match self {
            AggregationStrategy::Sum => Ok(sum(values)),
            AggregationStrategy::Mean => Ok(mean(values)),
            AggregationStrategy::Median => Ok(median(values)),
            AggregationStrategy::GeometricMean => geometric_mean(values),
        }
    }
}

impl fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationStrategy {
    type Err = AggregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(AggregationStrategy::Sum),
            "mean" => Ok(AggregationStrategy::Mean),
            "median" => Ok(AggregationStrategy::Median),
            "geometric mean" | "geometric-mean" | "geometric_mean" | "gmean" => {
                Ok(AggregationStrategy::GeometricMean)
            }
            _ => Err(AggregationError::UnknownStrategy(s.to_string())),
        }
    }
}

fn present(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| !v.is_nan())
}

fn sum(values: &[f64]) -> f64 {
    present(values).sum()
}

fn mean(values: &[f64]) -> f64 {
    let (total, n) = present(values).fold((0.0, 0usize), |(t, n), v| (t + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        total / n as f64
    }
}

fn median(values: &mut [f64]) -> f64 {
    // Move NaNs to the back, sort the present values
    values.sort_by(|a, b| match (a.is_nan(), b.is_nan()) {
        (false, false) => a.total_cmp(b),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    });
    let n = values.iter().take_while(|v| !v.is_nan()).count();

    match n {
        0 => f64::NAN,
        n if n % 2 == 1 => values[n / 2],
        n => (values[n / 2 - 1] + values[n / 2]) / 2.0,
    }
}

/// nth root of the product, computed in log space
fn geometric_mean(values: &[f64]) -> Result<f64, f64> {
    let mut log_sum = 0.0;
    let mut n = 0usize;
    let mut has_zero = false;

    for v in present(values) {
        if v < 0.0 {
            return Err(v);
        }
        if v == 0.0 {
            has_zero = true;
        } else {
            log_sum += v.ln();
        }
        n += 1;
    }

    if n == 0 {
        Ok(f64::NAN)
    } else if has_zero {
        // A zero factor zeroes the product, even next to +inf
        Ok(0.0)
    } else {
        Ok((log_sum / n as f64).exp())
    }
}

/// Diagnostics for a join that produced no rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyJoinReport {
    /// Annotation records left after feature/enhancer filtering
    pub annotation_records: usize,
    /// Probes in the input matrix
    pub matrix_probes: usize,
}

impl fmt::Display for EmptyJoinReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "After filtering, the resulting matrix was empty ({} annotation records, {} matrix probes, \
             none shared). This can happen if the probe identifiers are from a platform that is \
             not supported.",
            self.annotation_records, self.matrix_probes
        )
    }
}

/// Result of an aggregation request
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationOutcome {
    Aggregated(AggregatedMatrix),
    /// Filtered annotation and matrix share no probes; nothing to write
    Empty(EmptyJoinReport),
}

impl AggregationOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, AggregationOutcome::Empty(_))
    }
}

/// Validate `filter` against `annotation`, restrict the annotation to it,
/// then join with `matrix` and aggregate per gene
pub fn aggregate(
    annotation: &ProbeAnnotation,
    matrix: &MethylationMatrix,
    filter: &FeatureFilter,
    strategy: AggregationStrategy,
) -> Result<AggregationOutcome, AggregateError> {
    let filtered = filter.apply(annotation)?;
    Ok(aggregate_filtered(&filtered, matrix, strategy)?)
}

/// Join an already filtered `annotation` with `matrix` on probe id and
/// aggregate per gene
pub fn aggregate_filtered(
    annotation: &ProbeAnnotation,
    matrix: &MethylationMatrix,
    strategy: AggregationStrategy,
) -> Result<AggregationOutcome, AggregationError> {
    // gene -> matrix rows of every joined edge
    let mut groups: BTreeMap<&str, Vec<&[f64]>> = BTreeMap::new();
    let mut joined = 0usize;

    for record in annotation.iter() {
        if let Some(row) = matrix.row(&record.probe_id) {
            groups.entry(record.gene_id.as_str()).or_default().push(row);
            joined += 1;
        }
    }

    if joined == 0 {
        let report = EmptyJoinReport {
            annotation_records: annotation.len(),
            matrix_probes: matrix.len(),
        };
        warn!("{}", report);
        return Ok(AggregationOutcome::Empty(report));
    }

    debug!(
        "Joined {} annotation edges onto {} genes",
        joined,
        groups.len()
    );

    let samples = matrix.samples();
    let mut rows = Vec::with_capacity(groups.len());
    let mut column: Vec<f64> = Vec::new();

    for (gene_id, members) in groups {
        let mut aggregated = Vec::with_capacity(samples.len());

        for (col, sample) in samples.iter().enumerate() {
            column.clear();
            column.extend(members.iter().map(|row| row[col]));

            let value = strategy.apply(&mut column).map_err(|value| {
                AggregationError::NegativeGeometricMean {
                    gene_id: gene_id.to_string(),
                    sample: sample.clone(),
                    value,
                }
            })?;
            aggregated.push(value);
        }

        rows.push((gene_id.to_string(), aggregated));
    }

    info!(
        "Aggregated {} joined records into {} genes x {} samples ({})",
        joined,
        rows.len(),
        samples.len(),
        strategy
    );

    Ok(AggregationOutcome::Aggregated(AggregatedMatrix::new(
        samples.to_vec(),
        rows,
    )))
}
