// ==============================================================================
// manifest.rs - Vendor Probe Manifest Parser
// ==============================================================================
// Description: Reads Illumina-style methylation array manifests into raw rows
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format: CSV with a preamble and trailing control-probe section
// Example:
//   Illumina, Inc.,,,
//   [Heading],,,,
//   Descriptor File Name,HumanMethylation450_15017482_v1-2.bpm,,,
//   [Assay],,,,
//   IlmnID,Name,UCSC_RefGene_Name,UCSC_RefGene_Group,Enhancer
//   cg00035864,cg00035864,TTTY18,TSS1500,
//   cg00061679,cg00061679,DAZ1;DAZ4,Body;Body,TRUE
//   [Controls],,,,
//   ...
// ==============================================================================

use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::RawManifestRow;

pub const PROBE_COLUMN: &str = "IlmnID";
pub const GENE_COLUMN: &str = "UCSC_RefGene_Name";
pub const FEATURE_COLUMN: &str = "UCSC_RefGene_Group";
pub const ENHANCER_COLUMN: &str = "Enhancer";

#[derive(Error, Debug)]
pub enum ManifestParseError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Manifest header row (first column '{0}') not found")]
    MissingHeader(String),

    #[error("Manifest is missing required column '{0}'")]
    MissingColumn(String),

    #[error("Empty probe identifier at line {line}")]
    EmptyProbeId { line: u64 },

    #[error("Manifest contains no probe rows")]
    EmptyFile,
}

/// Column positions resolved from the manifest header
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    probe: usize,
    genes: usize,
    features: usize,
    enhancer: usize,
}

impl ColumnIndex {
    fn from_header(header: &StringRecord, parser: &ManifestParser) -> Result<Self, ManifestParseError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| ManifestParseError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            probe: find(parser.probe_column.as_str())?,
            genes: find(parser.gene_column.as_str())?,
            features: find(parser.feature_column.as_str())?,
            enhancer: find(parser.enhancer_column.as_str())?,
        })
    }
}

/// Parser for vendor manifests
#[derive(Debug, Clone)]
pub struct ManifestParser {
    pub probe_column: String,
    pub gene_column: String,
    pub feature_column: String,
    pub enhancer_column: String,
}

impl Default for ManifestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestParser {
    /// Parser for the standard Illumina column names
    pub fn new() -> Self {
        Self {
            probe_column: PROBE_COLUMN.to_string(),
            gene_column: GENE_COLUMN.to_string(),
            feature_column: FEATURE_COLUMN.to_string(),
            enhancer_column: ENHANCER_COLUMN.to_string(),
        }
    }

    /// Parse a manifest
    ///
    /// Lines before the header row (first field equal to the probe column
    /// name) are skipped. Reading stops at the next section marker, a line
    /// whose first field starts with '['.
    pub fn parse<R: Read>(&self, reader: R) -> Result<Vec<RawManifestRow>, ManifestParseError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut columns: Option<ColumnIndex> = None;
        let mut rows = Vec::new();
        let mut skipped = 0usize;

        for result in reader.records() {
            let record = result?;
            let first = record.get(0).map(str::trim).unwrap_or("");

            let Some(index) = columns else {
                if first == self.probe_column {
                    columns = Some(ColumnIndex::from_header(&record, self)?);
                } else {
                    skipped += 1;
                }
                continue;
            };

            if first.starts_with('[') {
                debug!("Stopping at manifest section {}", first);
                break;
            }
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }

            let probe_id = record.get(index.probe).map(str::trim).unwrap_or("");
            if probe_id.is_empty() {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                return Err(ManifestParseError::EmptyProbeId { line });
            }

            rows.push(RawManifestRow {
                probe_id: probe_id.to_string(),
                gene_list: non_blank(record.get(index.genes)),
                feature_list: non_blank(record.get(index.features)),
                enhancer: non_blank(record.get(index.enhancer)).is_some(),
            });
        }

        if columns.is_none() {
            return Err(ManifestParseError::MissingHeader(self.probe_column.clone()));
        }
        if rows.is_empty() {
            return Err(ManifestParseError::EmptyFile);
        }

        info!(
            "Parsed {} manifest rows ({} preamble lines skipped)",
            rows.len(),
            skipped
        );

        Ok(rows)
    }
}

fn non_blank(cell: Option<&str>) -> Option<String> {
    cell.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
