// ==============================================================================
// matrix.rs - Probe-Level Methylation Matrix Parser
// ==============================================================================
// Description: Reads a probe x sample methylation matrix (first column = probe)
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format: Tab-delimited with header naming each sample
// Example:
//   probe         TCGA-A1    TCGA-A2
//   cg00000029    0.4612     0.5021
//   cg00000108    NA         0.9311
// ==============================================================================

use csv::ReaderBuilder;
use std::io::Read;
use thiserror::Error;
use tracing::info;

use crate::models::{MatrixRowError, MethylationMatrix};

/// Cell spellings treated as a missing measurement
const MISSING_TOKENS: [&str; 4] = ["", "NA", "NaN", "nan"];

#[derive(Error, Debug)]
pub enum MatrixParseError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Matrix header must name at least one sample column")]
    NoSamples,

    #[error("Invalid line format at line {line}: expected {expected} fields, found {found}")]
    InvalidFormat {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Invalid value at line {line}, sample '{sample}': '{value}'")]
    InvalidValue {
        line: u64,
        sample: String,
        value: String,
    },

    #[error("Empty probe identifier at line {line}")]
    EmptyProbeId { line: u64 },

    #[error("Line {line}: {source}")]
    InvalidRow {
        line: u64,
        #[source]
        source: MatrixRowError,
    },
}

fn parse_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if MISSING_TOKENS.contains(&cell) {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

/// Read a tab-delimited probe-level matrix
///
/// The header either labels the probe column too, or (as R's
/// `write.table` writes it) names only the samples and is one field
/// shorter than the data rows.
pub fn read_matrix<R: Read>(reader: R) -> Result<MethylationMatrix, MatrixParseError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = reader.records().peekable();

    let header = match records.next() {
        Some(result) => result?,
        None => return Err(MatrixParseError::NoSamples),
    };

    let samples_only = match records.peek() {
        Some(Ok(first)) => first.len() == header.len() + 1,
        _ => false,
    };
    let skip = if samples_only { 0 } else { 1 };

    let samples: Vec<String> = header
        .iter()
        .skip(skip)
        .map(|h| h.trim().to_string())
        .collect();

    if samples.is_empty() {
        return Err(MatrixParseError::NoSamples);
    }

    let mut matrix = MethylationMatrix::new(samples.clone());
    let mut missing = 0usize;

    for result in records {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.len() != samples.len() + 1 {
            return Err(MatrixParseError::InvalidFormat {
                line,
                expected: samples.len() + 1,
                found: record.len(),
            });
        }

        let probe_id = record.get(0).unwrap_or("").trim();
        if probe_id.is_empty() {
            return Err(MatrixParseError::EmptyProbeId { line });
        }

        let mut row = Vec::with_capacity(samples.len());
        for (cell, sample) in record.iter().skip(1).zip(&samples) {
            let value = parse_cell(cell).ok_or_else(|| MatrixParseError::InvalidValue {
                line,
                sample: sample.clone(),
                value: cell.to_string(),
            })?;
            if value.is_nan() {
                missing += 1;
            }
            row.push(value);
        }

        matrix
            .insert(probe_id.to_string(), row)
            .map_err(|source| MatrixParseError::InvalidRow { line, source })?;
    }

    info!(
        "Loaded methylation matrix: {} probes x {} samples ({} missing cells)",
        matrix.len(),
        samples.len(),
        missing
    );

    Ok(matrix)
}
