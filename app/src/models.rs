// ==============================================================================
// models.rs - Probe Annotation and Matrix Data Models
// ==============================================================================
// Description: Typed records shared by the manifest normalizer and the
//              probe-to-gene aggregation engine
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// One probe row as distributed by the platform vendor
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawManifestRow {
    /// Probe identifier (e.g., "cg27416437")
    pub probe_id: String,

    /// Semicolon-delimited gene names, `None` when the cell is empty
    pub gene_list: Option<String>,

    /// Semicolon-delimited feature labels, positionally aligned with `gene_list`
    pub feature_list: Option<String>,

    /// Whether the vendor marked the probe as lying in an enhancer region
    pub enhancer: bool,
}

/// Normalized probe -> gene -> feature edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub probe_id: String,
    pub gene_id: String,
    /// Structural region label (e.g., "TSS200", "1stExon", "5'UTR")
    pub feature: String,
    pub is_enhancer: bool,
}

impl AnnotationRecord {
    pub fn new(
        probe_id: impl Into<String>,
        gene_id: impl Into<String>,
        feature: impl Into<String>,
        is_enhancer: bool,
    ) -> Self {
        Self {
            probe_id: probe_id.into(),
            gene_id: gene_id.into(),
            feature: feature.into(),
            is_enhancer,
        }
    }

    fn key(&self) -> (&str, &str, &str) {
        (&self.probe_id, &self.gene_id, &self.feature)
    }
}

/// Invariant violations when assembling a `ProbeAnnotation`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnotationError {
    #[error("Duplicate annotation for probe '{probe_id}', gene '{gene_id}', feature '{feature}'")]
    DuplicateRecord {
        probe_id: String,
        gene_id: String,
        feature: String,
    },

    #[error("Probe '{probe_id}' has conflicting enhancer flags across its annotation rows")]
    InconsistentEnhancer { probe_id: String },

    #[error("Empty {field} for probe '{probe_id}'")]
    EmptyField { probe_id: String, field: &'static str },
}

/// Long-format probe annotation table
///
/// Holds the invariants the aggregation engine relies on: no duplicate
/// `(probe_id, gene_id, feature)` tuple, a single enhancer flag per probe,
/// and non-empty gene and feature labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeAnnotation {
    records: Vec<AnnotationRecord>,
}

impl ProbeAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from untrusted records (e.g., a precomputed table on disk)
    pub fn from_records(
        records: impl IntoIterator<Item = AnnotationRecord>,
    ) -> Result<Self, AnnotationError> {
        let records: Vec<AnnotationRecord> = records.into_iter().collect();

        let mut seen: HashSet<(&str, &str, &str)> = HashSet::with_capacity(records.len());
        let mut enhancer_by_probe: HashMap<&str, bool> = HashMap::new();

        for record in &records {
            if record.probe_id.is_empty() {
                return Err(AnnotationError::EmptyField {
                    probe_id: String::new(),
                    field: "probe_id",
                });
            }
            if record.gene_id.is_empty() {
                return Err(AnnotationError::EmptyField {
                    probe_id: record.probe_id.clone(),
                    field: "gene_id",
                });
            }
            if record.feature.is_empty() {
                return Err(AnnotationError::EmptyField {
                    probe_id: record.probe_id.clone(),
                    field: "feature",
                });
            }

            if !seen.insert(record.key()) {
                return Err(AnnotationError::DuplicateRecord {
                    probe_id: record.probe_id.clone(),
                    gene_id: record.gene_id.clone(),
                    feature: record.feature.clone(),
                });
            }

            let flag = enhancer_by_probe
                .entry(record.probe_id.as_str())
                .or_insert(record.is_enhancer);
            if *flag != record.is_enhancer {
                return Err(AnnotationError::InconsistentEnhancer {
                    probe_id: record.probe_id.clone(),
                });
            }
        }

        Ok(Self { records })
    }

    /// Records that already satisfy the invariants (normalizer and filter output)
    pub(crate) fn from_trusted(records: Vec<AnnotationRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[AnnotationRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnnotationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct feature labels present in the table
    pub fn feature_universe(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.feature.as_str()).collect()
    }

    /// Number of distinct probes with at least one annotation row
    pub fn probe_count(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.probe_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Probe-level methylation matrix: probe id -> one value per sample
///
/// Missing cells are stored as `f64::NAN`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethylationMatrix {
    samples: Vec<String>,
    probes: Vec<String>,
    values: Vec<Vec<f64>>,
    index: HashMap<String, usize>,
}

impl MethylationMatrix {
    pub fn new(samples: Vec<String>) -> Self {
        Self {
            samples,
            ..Self::default()
        }
    }

    /// Append a probe row
    ///
    /// Fails if the probe is already present or the row width does not match
    /// the sample count.
    pub fn insert(&mut self, probe_id: String, row: Vec<f64>) -> Result<(), MatrixRowError> {
        if row.len() != self.samples.len() {
            return Err(MatrixRowError::WidthMismatch {
                probe_id,
                expected: self.samples.len(),
                found: row.len(),
            });
        }
        if self.index.contains_key(&probe_id) {
            return Err(MatrixRowError::DuplicateProbe { probe_id });
        }

        self.index.insert(probe_id.clone(), self.probes.len());
        self.probes.push(probe_id);
        self.values.push(row);
        Ok(())
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn row(&self, probe_id: &str) -> Option<&[f64]> {
        self.index.get(probe_id).map(|&i| self.values[i].as_slice())
    }

    pub fn contains(&self, probe_id: &str) -> bool {
        self.index.contains_key(probe_id)
    }

    pub fn probe_ids(&self) -> impl Iterator<Item = &str> {
        self.probes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixRowError {
    #[error("Duplicate probe '{probe_id}' in methylation matrix")]
    DuplicateProbe { probe_id: String },

    #[error("Probe '{probe_id}' has {found} values, expected {expected}")]
    WidthMismatch {
        probe_id: String,
        expected: usize,
        found: usize,
    },
}

/// Gene-level matrix produced by the aggregation engine
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedMatrix {
    pub samples: Vec<String>,
    /// Rows keyed by gene id, kept sorted ascending for `gene` lookups
    rows: Vec<(String, Vec<f64>)>,
}

impl AggregatedMatrix {
    /// Build from gene rows in any order
    pub fn new(samples: Vec<String>, mut rows: Vec<(String, Vec<f64>)>) -> Self {
        rows.sort_by(|(a, _), (b, _)| a.cmp(b));
        Self { samples, rows }
    }

    /// Rows in ascending gene order
    pub fn rows(&self) -> &[(String, Vec<f64>)] {
        &self.rows
    }

    pub fn gene(&self, gene_id: &str) -> Option<&[f64]> {
        self.rows
            .binary_search_by(|(g, _)| g.as_str().cmp(gene_id))
            .ok()
            .map(|i| self.rows[i].1.as_slice())
    }

    pub fn gene_count(&self) -> usize {
        self.rows.len()
    }
}
