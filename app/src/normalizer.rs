// ==============================================================================
// normalizer.rs - Manifest Normalization
// ==============================================================================
// Description: Flattens multi-valued vendor manifest rows into a long-format
//              probe -> gene -> feature annotation table
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Algorithm (per manifest row):
//   UCSC_RefGene_Name   EWSR1;EWSR1;EWSR1;RHBDD3
//   UCSC_RefGene_Group  5'UTR;1stExon;5'UTR;TSS200
//   Enhancer            (blank)
// becomes
//   cg27416437  EWSR1   5'UTR    false
//   cg27416437  EWSR1   1stExon  false
//   cg27416437  RHBDD3  TSS200   false
// ==============================================================================

use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{AnnotationRecord, ProbeAnnotation, RawManifestRow};

/// Delimiter used by the vendor for multi-valued annotation cells
pub const LIST_DELIMITER: char = ';';

/// Errors that abort a normalization run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error(
        "Malformed manifest row for probe {probe_id}: {gene_count} genes ('{genes}') \
         but {feature_count} features ('{features}')"
    )]
    MalformedManifest {
        probe_id: String,
        genes: String,
        features: String,
        gene_count: usize,
        feature_count: usize,
    },

    #[error("Probe {probe_id} appears more than once in the manifest")]
    DuplicateProbe { probe_id: String },
}

/// Split a delimited annotation cell into trimmed elements
///
/// An absent or blank cell yields no entries rather than one empty string.
/// Empty elements inside a non-blank cell keep their position.
pub fn split_delimited(cell: Option<&str>) -> Vec<&str> {
    match cell {
        Some(s) if !s.trim().is_empty() => s.split(LIST_DELIMITER).map(str::trim).collect(),
        _ => Vec::new(),
    }
}

/// Explode one manifest row into its deduplicated annotation records
///
/// A probe without genes contributes nothing. Gene and feature lists of
/// unequal length are rejected.
pub fn explode_row(row: &RawManifestRow) -> Result<Vec<AnnotationRecord>, NormalizationError> {
    let genes = split_delimited(row.gene_list.as_deref());
    if genes.is_empty() {
        return Ok(Vec::new());
    }

    let features = split_delimited(row.feature_list.as_deref());
    if genes.len() != features.len() {
        return Err(NormalizationError::MalformedManifest {
            probe_id: row.probe_id.clone(),
            genes: row.gene_list.clone().unwrap_or_default(),
            features: row.feature_list.clone().unwrap_or_default(),
            gene_count: genes.len(),
            feature_count: features.len(),
        });
    }

    let mut seen: HashSet<(&str, &str)> = HashSet::with_capacity(genes.len());
    let mut records = Vec::with_capacity(genes.len());

    for (gene, feature) in genes.into_iter().zip(features) {
        if gene.is_empty() || feature.is_empty() {
            debug!(
                "Probe {}: dropping pair with empty element (gene '{}', feature '{}')",
                row.probe_id, gene, feature
            );
            continue;
        }
        // Overlapping transcripts repeat the same (gene, feature) pair
        if !seen.insert((gene, feature)) {
            continue;
        }
        records.push(AnnotationRecord::new(
            row.probe_id.as_str(),
            gene,
            feature,
            row.enhancer,
        ));
    }

    Ok(records)
}

/// Normalize a full manifest
///
/// Any malformed row fails the whole run; no partial table is returned.
pub fn normalize<I>(rows: I) -> Result<ProbeAnnotation, NormalizationError>
where
    I: IntoIterator<Item = RawManifestRow>,
{
    let mut seen_probes: HashSet<String> = HashSet::new();
    let mut records = Vec::new();
    let mut row_count = 0usize;
    let mut unannotated = 0usize;

    for row in rows {
        row_count += 1;

        if !seen_probes.insert(row.probe_id.clone()) {
            return Err(NormalizationError::DuplicateProbe {
                probe_id: row.probe_id,
            });
        }

        let exploded = explode_row(&row)?;
        if exploded.is_empty() {
            unannotated += 1;
        }
        records.extend(exploded);
    }

    info!(
        "Normalized {} manifest rows into {} annotation records ({} probes without gene annotation)",
        row_count,
        records.len(),
        unannotated
    );

    Ok(ProbeAnnotation::from_trusted(records))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(probe: &str, genes: Option<&str>, features: Option<&str>, enhancer: bool) -> RawManifestRow {
        RawManifestRow {
            probe_id: probe.to_string(),
            gene_list: genes.map(str::to_string),
            feature_list: features.map(str::to_string),
            enhancer,
        }
    }

    #[test]
    fn test_explosion_zips_positionally() {
        let annotation = normalize(vec![row("p", Some("G1;G2"), Some("F1;F2"), true)]).unwrap();

        assert_eq!(
            annotation.records(),
            &[
                AnnotationRecord::new("p", "G1", "F1", true),
                AnnotationRecord::new("p", "G2", "F2", true),
            ]
        );
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let annotation =
            normalize(vec![row("p", Some(" G1 ; G2"), Some("F1 ;F2 "), false)]).unwrap();

        assert_eq!(annotation.records()[0].gene_id, "G1");
        assert_eq!(annotation.records()[1].gene_id, "G2");
        assert_eq!(annotation.records()[0].feature, "F1");
        assert_eq!(annotation.records()[1].feature, "F2");
    }

    #[test]
    fn test_repeated_pairs_collapse() {
        let with_repeats = normalize(vec![row(
            "cg27416437",
            Some("EWSR1;EWSR1;EWSR1;EWSR1;RHBDD3"),
            Some("5'UTR;5'UTR;1stExon;1stExon;TSS200"),
            false,
        )])
        .unwrap();
        let deduplicated = normalize(vec![row(
            "cg27416437",
            Some("EWSR1;EWSR1;RHBDD3"),
            Some("5'UTR;1stExon;TSS200"),
            false,
        )])
        .unwrap();

        assert_eq!(with_repeats, deduplicated);
        assert_eq!(with_repeats.len(), 3);
    }

    #[test]
    fn test_probe_without_genes_is_dropped() {
        let annotation = normalize(vec![
            row("p1", None, Some("TSS200"), true),
            row("p2", Some("   "), Some("TSS200;Body"), false),
            row("p3", Some("A"), Some("Body"), false),
        ])
        .unwrap();

        assert_eq!(annotation.len(), 1);
        assert_eq!(annotation.records()[0].probe_id, "p3");
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let result = normalize(vec![
            row("ok", Some("A"), Some("Body"), false),
            row("bad", Some("A;B"), Some("F1;F2;F3"), false),
        ]);

        match result.unwrap_err() {
            NormalizationError::MalformedManifest {
                probe_id,
                gene_count,
                feature_count,
                features,
                ..
            } => {
                assert_eq!(probe_id, "bad");
                assert_eq!(gene_count, 2);
                assert_eq!(feature_count, 3);
                assert_eq!(features, "F1;F2;F3");
            }
            other => panic!("Expected MalformedManifest, got {:?}", other),
        }
    }

    #[test]
    fn test_genes_without_features_is_malformed() {
        let result = normalize(vec![row("p", Some("A"), None, false)]);
        assert!(matches!(result, Err(NormalizationError::MalformedManifest { .. })));
    }

    #[test]
    fn test_empty_elements_are_dropped_after_length_check() {
        let records = explode_row(&row("p", Some("A;;B"), Some("F1;F2;"), false)).unwrap();

        assert_eq!(records, vec![AnnotationRecord::new("p", "A", "F1", false)]);
    }

    #[test]
    fn test_duplicate_probe_is_rejected() {
        let result = normalize(vec![
            row("p", Some("A"), Some("Body"), false),
            row("p", Some("B"), Some("Body"), false),
        ]);

        assert_eq!(
            result.unwrap_err(),
            NormalizationError::DuplicateProbe {
                probe_id: "p".to_string()
            }
        );
    }

    #[test]
    fn test_split_delimited_absent() {
        assert!(split_delimited(None).is_empty());
        assert!(split_delimited(Some("")).is_empty());
        assert_eq!(split_delimited(Some("A")), vec!["A"]);
    }
}
