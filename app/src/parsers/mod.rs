// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for manifest, annotation and methylation matrix files
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod annotation;
pub mod manifest;
pub mod matrix;

pub use annotation::{read_annotation, write_annotation, AnnotationParseError};
pub use manifest::{ManifestParseError, ManifestParser};
pub use matrix::{read_matrix, MatrixParseError};
