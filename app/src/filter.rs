// ==============================================================================
// filter.rs - Feature and Enhancer Filtering
// ==============================================================================
// Description: Validates a requested feature set against the annotation's
//              feature universe and restricts the annotation to it
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use std::collections::BTreeSet;
use thiserror::Error;
use tracing::info;

use crate::models::ProbeAnnotation;

/// Delimiter for the feature set as given on the command line
pub const FEATURE_REQUEST_DELIMITER: char = ',';

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureRequestError {
    #[error(
        "The following features are invalid: {}. Options are {}.",
        .invalid.join(", "),
        .valid.join(", ")
    )]
    InvalidFeatures {
        /// Requested labels absent from the annotation, sorted
        invalid: Vec<String>,
        /// Every label present in the annotation, sorted
        valid: Vec<String>,
    },

    #[error("No features requested")]
    NoFeaturesRequested,
}

/// Which annotation rows survive into the join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFilter {
    features: BTreeSet<String>,
    enhancer_only: bool,
}

impl FeatureFilter {
    pub fn new<I, S>(features: I, enhancer_only: bool) -> Result<Self, FeatureRequestError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let features: BTreeSet<String> = features
            .into_iter()
            .map(|f| {
                let f: String = f.into();
                f.trim().to_string()
            })
            .filter(|f| !f.is_empty())
            .collect();

        if features.is_empty() {
            return Err(FeatureRequestError::NoFeaturesRequested);
        }

        Ok(Self {
            features,
            enhancer_only,
        })
    }

    /// Parse a comma-separated request such as `"TSS200, 1stExon"`
    pub fn parse(request: &str, enhancer_only: bool) -> Result<Self, FeatureRequestError> {
        Self::new(request.split(FEATURE_REQUEST_DELIMITER), enhancer_only)
    }

    pub fn features(&self) -> &BTreeSet<String> {
        &self.features
    }

    pub fn enhancer_only(&self) -> bool {
        self.enhancer_only
    }

    /// Check every requested label exists in the annotation
    pub fn validate(&self, annotation: &ProbeAnnotation) -> Result<(), FeatureRequestError> {
        let universe = annotation.feature_universe();

        let invalid: Vec<String> = self
            .features
            .iter()
            .filter(|f| !universe.contains(f.as_str()))
            .cloned()
            .collect();

        if invalid.is_empty() {
            Ok(())
        } else {
            Err(FeatureRequestError::InvalidFeatures {
                invalid,
                valid: universe.into_iter().map(str::to_string).collect(),
            })
        }
    }

    /// Validate, then keep rows with a requested feature (and the enhancer
    /// flag set, when enhancer-only)
    pub fn apply(&self, annotation: &ProbeAnnotation) -> Result<ProbeAnnotation, FeatureRequestError> {
        self.validate(annotation)?;

        let kept: Vec<_> = annotation
            .iter()
            .filter(|r| self.features.contains(&r.feature))
            .filter(|r| !self.enhancer_only || r.is_enhancer)
            .cloned()
            .collect();

        info!(
            "Feature filter kept {} of {} annotation records (features: {}, enhancer only: {})",
            kept.len(),
            annotation.len(),
            self.label(),
            self.enhancer_only
        );

        Ok(ProbeAnnotation::from_trusted(kept))
    }

    /// Requested features joined by '+', in sorted order
    pub fn label(&self) -> String {
        self.features
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("+")
    }
}
