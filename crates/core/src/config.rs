//! Configuration for the trellis core.
//!
//! Loaded from TOML with camelCase keys. Every field has a default, so an
//! empty file is a valid configuration:
//!
//! ```toml
//! [hierarchy]
//! maxDepth = 5
//! defaultTreeDepth = 5
//!
//! [dependencies]
//! terminalStatuses = ["DONE", "CANCELLED"]
//! impactDepthCap = 50
//! maxBulkSize = 100
//! ```

use crate::model::TaskStatus;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TrellisConfig {
    /// Parent/child hierarchy settings.
    pub hierarchy: HierarchyConfig,
    /// Dependency graph settings.
    pub dependencies: DependencyConfig,
}

/// Hierarchy settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HierarchyConfig {
    /// Deepest level a task may sit at; top-level tasks are at depth 0.
    pub max_depth: usize,
    /// Levels expanded by a task tree request that does not name a depth.
    pub default_tree_depth: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            default_tree_depth: 5,
        }
    }
}

/// Dependency graph settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DependencyConfig {
    /// Statuses after which a task no longer blocks its dependents.
    pub terminal_statuses: Vec<TaskStatus>,
    /// Maximum number of hops followed by impact analysis.
    pub impact_depth_cap: usize,
    /// Maximum number of entries in one bulk request.
    pub max_bulk_size: usize,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            terminal_statuses: vec![TaskStatus::Done, TaskStatus::Cancelled],
            impact_depth_cap: 50,
            max_bulk_size: 100,
        }
    }
}

impl TrellisConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the document does not parse or holds
    /// invalid values.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| Error::configuration(format!("Invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a configuration
    /// error if its content is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "Loaded trellis configuration");
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for zero depths or caps, or an empty
    /// terminal status set.
    pub fn validate(&self) -> Result<()> {
        if self.hierarchy.max_depth == 0 {
            return Err(Error::configuration("hierarchy.maxDepth must be at least 1"));
        }
        if self.hierarchy.default_tree_depth == 0 {
            return Err(Error::configuration(
                "hierarchy.defaultTreeDepth must be at least 1",
            ));
        }
        if self.dependencies.terminal_statuses.is_empty() {
            return Err(Error::configuration(
                "dependencies.terminalStatuses must name at least one status",
            ));
        }
        if self.dependencies.impact_depth_cap == 0 {
            return Err(Error::configuration(
                "dependencies.impactDepthCap must be at least 1",
            ));
        }
        if self.dependencies.max_bulk_size == 0 {
            return Err(Error::configuration(
                "dependencies.maxBulkSize must be at least 1",
            ));
        }
        Ok(())
    }

    /// Whether a task in `status` no longer blocks its dependents.
    #[must_use]
    pub fn is_terminal(&self, status: TaskStatus) -> bool {
        self.dependencies.terminal_statuses.contains(&status)
    }
}
