// ==============================================================================
// output.rs - Gene-Level Matrix Output
// ==============================================================================
// Description: Writes aggregated gene-level matrices and the outputs record
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Files are written to a temporary file in the destination directory and
// renamed into place, so an interrupted run never leaves a complete-looking
// output behind.
// ==============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use crate::aggregation::AggregationStrategy;
use crate::filter::FeatureFilter;
use crate::models::AggregatedMatrix;
use crate::validator::compute_sha256;

pub const GENE_COLUMN: &str = "gene_id";
pub const OUTPUTS_RECORD: &str = "outputs.json";

/// Machine-readable record of produced files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputsRecord {
    pub filtered_matrix: PathBuf,
    pub sha256: String,
    pub generated_at: DateTime<Utc>,
}

/// Output file name encoding the request, e.g.
/// `filtered_matrix.1stExon+TSS200.Geometric mean.enhancers.tsv`
pub fn output_file_name(filter: &FeatureFilter, strategy: AggregationStrategy) -> String {
    format!(
        "filtered_matrix.{}.{}{}.tsv",
        filter.label(),
        strategy.as_str(),
        if filter.enhancer_only() { ".enhancers" } else { "" }
    )
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

/// Serialize an aggregated matrix as TSV (header: gene_id, samples...)
pub fn write_aggregated<W: Write>(matrix: &AggregatedMatrix, writer: W) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(writer);

    let mut header = Vec::with_capacity(matrix.samples.len() + 1);
    header.push(GENE_COLUMN);
    header.extend(matrix.samples.iter().map(String::as_str));
    writer.write_record(&header)?;

    for (gene_id, values) in matrix.rows() {
        let mut record = Vec::with_capacity(values.len() + 1);
        record.push(gene_id.clone());
        record.extend(values.iter().copied().map(format_value));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes pipeline outputs into a single directory
pub struct OutputGenerator {
    output_dir: PathBuf,
}

impl OutputGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `file_name` atomically through `write`
    fn write_atomic<F>(&self, file_name: &str, write: F) -> Result<PathBuf>
    where
        F: FnOnce(&mut NamedTempFile) -> Result<()>,
    {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.output_dir.display())
        })?;

        let target = self.output_dir.join(file_name);
        let mut temp = NamedTempFile::new_in(&self.output_dir)
            .context("Failed to create temporary output file")?;

        write(&mut temp)?;
        temp.as_file().sync_all()?;
        temp.persist(&target)
            .with_context(|| format!("Failed to move output into place at {}", target.display()))?;

        Ok(target)
    }

    /// Write the aggregated matrix and the outputs record
    pub fn write(
        &self,
        matrix: &AggregatedMatrix,
        filter: &FeatureFilter,
        strategy: AggregationStrategy,
    ) -> Result<OutputsRecord> {
        let file_name = output_file_name(filter, strategy);
        let path = self.write_atomic(&file_name, |file| write_aggregated(matrix, file))?;

        info!(
            "Wrote {} genes x {} samples to {}",
            matrix.gene_count(),
            matrix.samples.len(),
            path.display()
        );

        let record = OutputsRecord {
            sha256: compute_sha256(&path)?,
            filtered_matrix: path,
            generated_at: Utc::now(),
        };
        self.write_outputs_record(&record)?;

        Ok(record)
    }

    fn write_outputs_record(&self, record: &OutputsRecord) -> Result<PathBuf> {
        let path = self.write_atomic(OUTPUTS_RECORD, |file| {
            serde_json::to_writer_pretty(&mut *file, record)
                .context("Failed to serialize outputs record")?;
            Ok(())
        })?;

        info!("Wrote outputs record to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> AggregatedMatrix {
        AggregatedMatrix::new(
            vec!["S1".to_string(), "S2".to_string()],
            vec![
                ("ABCA1".to_string(), vec![0.25, f64::NAN]),
                ("MYC".to_string(), vec![1.0, 0.5]),
            ],
        )
    }

    #[test]
    fn test_output_file_name() {
        let filter = FeatureFilter::parse("TSS200,1stExon", true).unwrap();
        assert_eq!(
            output_file_name(&filter, AggregationStrategy::GeometricMean),
            "filtered_matrix.1stExon+TSS200.Geometric mean.enhancers.tsv"
        );

        let filter = FeatureFilter::parse("Body", false).unwrap();
        assert_eq!(
            output_file_name(&filter, AggregationStrategy::Sum),
            "filtered_matrix.Body.Sum.tsv"
        );
    }

    #[test]
    fn test_write_aggregated_tsv() {
        let mut buffer = Vec::new();
        write_aggregated(&matrix(), &mut buffer).unwrap();

        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "gene_id\tS1\tS2\nABCA1\t0.25\t\nMYC\t1\t0.5\n"
        );
    }

    #[test]
    fn test_generator_writes_matrix_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let generator = OutputGenerator::new(dir.path());
        let filter = FeatureFilter::parse("TSS200", false).unwrap();

        let record = generator
            .write(&matrix(), &filter, AggregationStrategy::Mean)
            .unwrap();

        assert_eq!(
            record.filtered_matrix,
            dir.path().join("filtered_matrix.TSS200.Mean.tsv")
        );
        assert!(record.filtered_matrix.exists());
        assert_eq!(record.sha256.len(), 64);

        let written = std::fs::read_to_string(dir.path().join(OUTPUTS_RECORD)).unwrap();
        let parsed: OutputsRecord = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, record);

        // No stray temporary files left behind
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 2);
    }
}
