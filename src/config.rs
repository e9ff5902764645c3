use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::filter::{parse_descriptors, RegexFilter};

/// Configuration for raw text processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Largest span a filter may match, and the chunk size fed to the window
    pub block_size: usize,
    /// Whether text outside any INCLUDE/SKIP region is processed
    pub process_by_default: bool,
    /// Inserted between raw output segments landing on the same position
    pub output_divider: String,
    /// Inline filter descriptors, one per entry
    pub filters: Vec<String>,
    /// Files of filter descriptors, read in order after the inline ones
    pub filter_files: Vec<PathBuf>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            block_size: 1000, // WHY: matches are bounded by one block so a chunk boundary can never cut one
            process_by_default: true,
            output_divider: String::new(),
            filters: Vec::new(),
            filter_files: Vec::new(),
        }
    }
}

impl ProcessorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file; relative filter file paths resolve against the config's directory
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            for file in &mut config.filter_files {
                if file.is_relative() {
                    *file = base.join(&*file);
                }
            }
        }
        info!(path = %path.display(), "Loaded processor config");
        Ok(config)
    }

    /// Compile every configured filter. All configuration errors surface here,
    /// before any text is read.
    pub fn build_filters(&self) -> Result<Vec<RegexFilter>> {
        let mut filters = parse_descriptors(&self.filters.join("\n"), 0, self.block_size)?;
        for file in &self.filter_files {
            debug!(path = %file.display(), "Reading filter descriptors");
            let text = std::fs::read_to_string(file)?;
            let more = parse_descriptors(&text, filters.len(), self.block_size)?;
            filters.extend(more);
        }
        info!(count = filters.len(), "Built text filters");
        Ok(filters)
    }
}
