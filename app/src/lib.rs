// ==============================================================================
// lib.rs - Methylation Processor Library
// ==============================================================================
// Description: Library interface for manifest normalization and probe-to-gene
//              methylation aggregation
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod aggregation;
pub mod config;
pub mod filter;
pub mod models;
pub mod normalizer;
pub mod output;
pub mod parsers;
pub mod processor;
pub mod validator;

pub use aggregation::{
    aggregate, aggregate_filtered, AggregateError, AggregationError, AggregationOutcome,
    AggregationStrategy,
};
pub use filter::{FeatureFilter, FeatureRequestError};
pub use models::{AggregatedMatrix, AnnotationRecord, MethylationMatrix, ProbeAnnotation, RawManifestRow};
pub use normalizer::{normalize, NormalizationError};
