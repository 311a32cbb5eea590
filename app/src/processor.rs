// ==============================================================================
// processor.rs - Pipeline Orchestration
// ==============================================================================
// Description: Runs manifest normalization and gene-level aggregation from
//              files on disk to files on disk
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::aggregation::{aggregate, AggregationOutcome, AggregationStrategy, EmptyJoinReport};
use crate::config::PlatformRegistry;
use crate::filter::FeatureFilter;
use crate::models::ProbeAnnotation;
use crate::normalizer::normalize;
use crate::output::{OutputGenerator, OutputsRecord};
use crate::parsers::{read_annotation, read_matrix, write_annotation, ManifestParser};
use crate::validator::InputValidator;

/// Where the probe annotation for an aggregation run comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationSource {
    /// Resolve through the platform registry
    Platform(String),
    /// Explicit normalized annotation table
    File(PathBuf),
}

/// One aggregation request
#[derive(Debug, Clone)]
pub struct AggregationRequest {
    pub matrix_path: PathBuf,
    pub annotation: AnnotationSource,
    pub filter: FeatureFilter,
    pub strategy: AggregationStrategy,
    /// Defaults to the matrix's directory
    pub output_dir: Option<PathBuf>,
}

/// What an aggregation run produced
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Written(OutputsRecord),
    /// Nothing joined; no files were written
    Empty(EmptyJoinReport),
}

pub struct MethylationProcessor {
    registry: PlatformRegistry,
    validator: InputValidator,
}

impl MethylationProcessor {
    pub fn new(registry: PlatformRegistry) -> Self {
        Self {
            registry,
            validator: InputValidator::new(),
        }
    }

    /// Normalize a vendor manifest into an annotation table at `output`
    pub fn normalize_manifest(&self, manifest: &Path, output: &Path) -> Result<ProbeAnnotation> {
        info!("Normalizing manifest {}", manifest.display());

        // 1. Parse vendor rows
        let reader = self.validator.open(manifest)?;
        let rows = ManifestParser::new()
            .parse(reader)
            .with_context(|| format!("Failed to parse manifest {}", manifest.display()))?;

        // 2. Explode and deduplicate
        let annotation = normalize(rows).context("Manifest normalization failed")?;

        // 3. Write atomically next to the requested output
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        let mut temp = NamedTempFile::new_in(dir).context("Failed to create temporary file")?;
        write_annotation(&annotation, &mut temp).context("Failed to write annotation table")?;
        temp.as_file().sync_all()?;
        temp.persist(output)
            .with_context(|| format!("Failed to move annotation into place at {}", output.display()))?;

        info!(
            "Wrote {} annotation records for {} probes to {}",
            annotation.len(),
            annotation.probe_count(),
            output.display()
        );

        Ok(annotation)
    }

    pub fn load_annotation(&self, source: &AnnotationSource) -> Result<ProbeAnnotation> {
        let path = match source {
            AnnotationSource::Platform(name) => {
                let path = self.registry.resolve(name)?;
                debug!("Platform {} resolved to {}", name, path.display());
                path
            }
            AnnotationSource::File(path) => path.as_path(),
        };

        let reader = self.validator.open(path)?;
        read_annotation(reader)
            .with_context(|| format!("Failed to load annotation table {}", path.display()))
    }

    /// Filter, join and aggregate; write outputs unless the join is empty
    pub fn aggregate(&self, request: &AggregationRequest) -> Result<RunStatus> {
        info!(
            "Aggregating {} (features: {}, enhancer only: {}, strategy: {})",
            request.matrix_path.display(),
            request.filter.label(),
            request.filter.enhancer_only(),
            request.strategy
        );

        // 1. Validate the feature request before touching the matrix
        let annotation = self.load_annotation(&request.annotation)?;
        request.filter.validate(&annotation)?;

        // 2. Load the probe-level matrix
        let reader = self.validator.open(&request.matrix_path)?;
        let matrix = read_matrix(reader).with_context(|| {
            format!("Failed to read matrix {}", request.matrix_path.display())
        })?;

        // 3. Filter, join and aggregate
        let outcome = aggregate(&annotation, &matrix, &request.filter, request.strategy)?;
        let aggregated = match outcome {
            AggregationOutcome::Aggregated(aggregated) => aggregated,
            AggregationOutcome::Empty(report) => return Ok(RunStatus::Empty(report)),
        };

        // 4. Write outputs
        let output_dir = match &request.output_dir {
            Some(dir) => dir.clone(),
            None => default_output_dir(&request.matrix_path),
        };
        let record = OutputGenerator::new(output_dir).write(
            &aggregated,
            &request.filter,
            request.strategy,
        )?;

        Ok(RunStatus::Written(record))
    }
}

fn default_output_dir(matrix_path: &Path) -> PathBuf {
    match matrix_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{AggregateError, AggregationError};
    use crate::filter::FeatureRequestError;
    use crate::normalizer::NormalizationError;

    const MANIFEST: &str = "\
Illumina, Inc.,,,,
[Heading],,,,,
[Assay],,,,,
IlmnID,Name,UCSC_RefGene_Name,UCSC_RefGene_Group,Enhancer
cg01,cg01,A;B,TSS200;TSS200,TRUE
cg02,cg02,A,1stExon,
cg03,cg03,,,
cg04,cg04,C;C,Body;Body,
[Controls],,,,
";

    const MATRIX: &str = "\
\tS1\tS2
cg01\t0.2\t0.8
cg02\t0.6\t0.4
cg04\t0.5\t0.5
cg99\t0.9\t0.9
";

    fn setup(dir: &Path) -> (MethylationProcessor, PathBuf, PathBuf) {
        let manifest = dir.join("manifest.csv");
        let annotation = dir.join("annotation.tsv");
        let matrix = dir.join("matrix.tsv");
        std::fs::write(&manifest, MANIFEST).unwrap();
        std::fs::write(&matrix, MATRIX).unwrap();

        let processor = MethylationProcessor::new(
            PlatformRegistry::empty().with_platform("TEST", &annotation),
        );
        processor.normalize_manifest(&manifest, &annotation).unwrap();

        (processor, annotation, matrix)
    }

    fn request(
        matrix: &Path,
        features: &str,
        enhancer: bool,
        strategy: AggregationStrategy,
    ) -> AggregationRequest {
        AggregationRequest {
            matrix_path: matrix.to_path_buf(),
            annotation: AnnotationSource::Platform("TEST".to_string()),
            filter: FeatureFilter::parse(features, enhancer).unwrap(),
            strategy,
            output_dir: None,
        }
    }

    #[test]
    fn test_normalize_manifest_writes_table() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, annotation_path, _) = setup(dir.path());

        let annotation = processor
            .load_annotation(&AnnotationSource::File(annotation_path))
            .unwrap();
        // cg01 -> A, B; cg02 -> A; cg03 dropped; cg04 -> C once
        assert_eq!(annotation.len(), 4);
        assert_eq!(annotation.probe_count(), 3);
    }

    #[test]
    fn test_end_to_end_mean() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, _, matrix) = setup(dir.path());

        let status = processor
            .aggregate(&request(&matrix, "TSS200,1stExon", false, AggregationStrategy::Mean))
            .unwrap();

        let record = match status {
            RunStatus::Written(record) => record,
            RunStatus::Empty(report) => panic!("Unexpected empty result: {}", report),
        };
        assert_eq!(
            record.filtered_matrix,
            dir.path().join("filtered_matrix.1stExon+TSS200.Mean.tsv")
        );

        let written = std::fs::read_to_string(&record.filtered_matrix).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "gene_id\tS1\tS2");
        // A <- cg01, cg02; B <- cg01
        assert!(lines[1].starts_with("A\t0.4"));
        assert_eq!(lines[2], "B\t0.2\t0.8");
        assert_eq!(lines.len(), 3);
        assert!(dir.path().join("outputs.json").exists());
    }

    #[test]
    fn test_enhancer_only() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, _, matrix) = setup(dir.path());
        let out = dir.path().join("out");

        let mut req = request(&matrix, "TSS200,1stExon", true, AggregationStrategy::Sum);
        req.output_dir = Some(out.clone());

        let RunStatus::Written(record) = processor.aggregate(&req).unwrap() else {
            panic!("Expected written output");
        };
        assert_eq!(
            record.filtered_matrix,
            out.join("filtered_matrix.1stExon+TSS200.Sum.enhancers.tsv")
        );

        let written = std::fs::read_to_string(&record.filtered_matrix).unwrap();
        assert_eq!(written, "gene_id\tS1\tS2\nA\t0.2\t0.8\nB\t0.2\t0.8\n");
    }

    #[test]
    fn test_invalid_feature_fails_before_reading_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, _, _) = setup(dir.path());

        // Matrix path does not exist: the feature check must fail first
        let err = processor
            .aggregate(&request(
                &dir.path().join("missing.tsv"),
                "BadLabel",
                false,
                AggregationStrategy::Mean,
            ))
            .unwrap_err();

        let request_err = err.downcast_ref::<FeatureRequestError>().unwrap();
        assert!(matches!(request_err, FeatureRequestError::InvalidFeatures { .. }));
        assert!(err.to_string().contains("Options are 1stExon, Body, TSS200."));
    }

    #[test]
    fn test_empty_join_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, _, _) = setup(dir.path());
        let matrix = dir.path().join("other_platform.tsv");
        std::fs::write(&matrix, "\tS1\nch.1.1\t0.5\n").unwrap();

        let status = processor
            .aggregate(&request(&matrix, "Body", false, AggregationStrategy::Median))
            .unwrap();

        assert!(matches!(status, RunStatus::Empty(_)));
        assert!(!dir.path().join("outputs.json").exists());
        assert!(!dir.path().join("filtered_matrix.Body.Median.tsv").exists());
    }

    #[test]
    fn test_negative_geometric_mean_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, _, _) = setup(dir.path());
        let matrix = dir.path().join("mvalues.tsv");
        std::fs::write(&matrix, "\tS1\ncg04\t-1.5\n").unwrap();

        let err = processor
            .aggregate(&request(&matrix, "Body", false, AggregationStrategy::GeometricMean))
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AggregateError>(),
            Some(AggregateError::Aggregation(
                AggregationError::NegativeGeometricMean { .. }
            ))
        ));
    }

    #[test]
    fn test_malformed_manifest_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("manifest.csv");
        let output = dir.path().join("annotation.tsv");
        std::fs::write(
            &manifest,
            "IlmnID,UCSC_RefGene_Name,UCSC_RefGene_Group,Enhancer\ncg01,A;B,F1;F2;F3,\n",
        )
        .unwrap();

        let processor = MethylationProcessor::new(PlatformRegistry::empty());
        let err = processor.normalize_manifest(&manifest, &output).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<NormalizationError>(),
            Some(NormalizationError::MalformedManifest { .. })
        ));
        assert!(!output.exists());
    }
}
