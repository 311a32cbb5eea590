// ==============================================================================
// annotation.rs - Normalized Probe Annotation Table I/O
// ==============================================================================
// Description: Reads and writes the long-format probe annotation table
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format: Tab-delimited with header
// Example:
//   gene_id    feature    enhancer    probe_id
//   EWSR1      1stExon    False       cg27416437
//   RHBDD3     TSS200     False       cg27416437
// ==============================================================================

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use std::io::{Read, Write};
use thiserror::Error;
use tracing::info;

use crate::models::{AnnotationError, AnnotationRecord, ProbeAnnotation};

#[derive(Error, Debug)]
pub enum AnnotationParseError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid annotation table: {0}")]
    Invalid(#[from] AnnotationError),
}

/// On-disk row; column order matches the tables shipped with the pipeline
#[derive(Debug, Serialize, Deserialize)]
struct AnnotationRow {
    gene_id: String,
    feature: String,
    #[serde(
        serialize_with = "serialize_flag",
        deserialize_with = "deserialize_flag"
    )]
    enhancer: bool,
    probe_id: String,
}

fn serialize_flag<S: serde::Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *flag { "True" } else { "False" })
}

fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid enhancer flag '{}'",
            other
        ))),
    }
}

/// Read a normalized annotation table, re-checking its invariants
pub fn read_annotation<R: Read>(reader: R) -> Result<ProbeAnnotation, AnnotationParseError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for result in reader.deserialize() {
        let row: AnnotationRow = result?;
        records.push(AnnotationRecord {
            probe_id: row.probe_id.trim().to_string(),
            gene_id: row.gene_id.trim().to_string(),
            feature: row.feature.trim().to_string(),
            is_enhancer: row.enhancer,
        });
    }

    let annotation = ProbeAnnotation::from_records(records)?;
    info!(
        "Loaded {} annotation records for {} probes",
        annotation.len(),
        annotation.probe_count()
    );

    Ok(annotation)
}

/// Write a normalized annotation table
pub fn write_annotation<W: Write>(
    annotation: &ProbeAnnotation,
    writer: W,
) -> Result<(), AnnotationParseError> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(writer);

    for record in annotation.iter() {
        writer.serialize(AnnotationRow {
            gene_id: record.gene_id.clone(),
            feature: record.feature.clone(),
            enhancer: record.is_enhancer,
            probe_id: record.probe_id.clone(),
        })?;
    }

    writer.flush()?;
    Ok(())
}
