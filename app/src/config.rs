// ==============================================================================
// config.rs - Platform Registry
// ==============================================================================
// Description: Maps array platform names to their normalized annotation tables
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// File format (JSON):
//   {
//     "HM450": "/opt/software/resources/reformatted_probe_mapping.hm450.tsv",
//     "EPIC":  "/opt/software/resources/reformatted_probe_mapping.epic.tsv"
//   }
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_PLATFORM: &str = "HM450";
pub const DEFAULT_HM450_ANNOTATION: &str =
    "/opt/software/resources/reformatted_probe_mapping.hm450.tsv";

/// Platform name -> annotation table location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformRegistry {
    platforms: BTreeMap<String, PathBuf>,
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        let mut platforms = BTreeMap::new();
        platforms.insert(
            DEFAULT_PLATFORM.to_string(),
            PathBuf::from(DEFAULT_HM450_ANNOTATION),
        );
        Self { platforms }
    }
}

impl PlatformRegistry {
    pub fn empty() -> Self {
        Self {
            platforms: BTreeMap::new(),
        }
    }

    pub fn with_platform(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.platforms.insert(name.into(), path.into());
        self
    }

    /// Load a registry from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read platform config {}", path.display()))?;
        let registry: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid platform config {}", path.display()))?;

        if registry.platforms.is_empty() {
            anyhow::bail!("Platform config {} defines no platforms", path.display());
        }

        info!(
            "Loaded {} platform(s) from {}: {}",
            registry.platforms.len(),
            path.display(),
            registry.names().join(", ")
        );
        Ok(registry)
    }

    /// Registry from `path` if given, built-in defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.platforms.keys().map(String::as_str).collect()
    }

    /// Annotation table for `platform` (exact name match)
    pub fn resolve(&self, platform: &str) -> Result<&Path> {
        self.platforms
            .get(platform)
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown platform '{}'. Options are {}.",
                    platform,
                    self.names().join(", ")
                )
            })
    }
}
