//! Sources of gem names for the index crawl.

use crate::error::{HarvestError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Produces the list of gem names to crawl
#[async_trait]
pub trait GemNameSource: Send + Sync {
    /// All names, in crawl order
    async fn list_names(&self) -> Result<Vec<String>>;
}

/// Lists every remote gem through `<tool> search '^(.*)$' --all`
#[derive(Debug, Clone)]
pub struct GemSearch {
    tool: String,
}

impl GemSearch {
    /// Searches with `tool`, normally `gem`
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }
}

#[async_trait]
impl GemNameSource for GemSearch {
    async fn list_names(&self) -> Result<Vec<String>> {
        info!("Listing remote gems with {} search", self.tool);
        let output = Command::new(&self.tool)
            .args(["search", "^(.*)$", "--all"])
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarvestError::Tool(format!(
                "{} search exited with {}: {}",
                self.tool,
                output.status,
                stderr.trim()
            )));
        }

        let names = parse_search_output(&String::from_utf8_lossy(&output.stdout))?;
        debug!("{} search listed {} gems", self.tool, names.len());
        Ok(names)
    }
}

/// Extracts names from `gem search` output lines shaped like `rake (13.0.6, 13.0.5)`
///
/// Header and blank lines are ignored.
pub fn parse_search_output(output: &str) -> Result<Vec<String>> {
    let line = Regex::new(r"^(.+) \(.*\)$")
        .map_err(|e| HarvestError::Parse(format!("search line pattern: {e}")))?;
    Ok(output
        .lines()
        .filter_map(|l| line.captures(l.trim()))
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

/// A fixed list of names, from memory or from a file with one name per line
#[derive(Debug, Clone, Default)]
pub struct NameList {
    names: Vec<String>,
    source: Option<PathBuf>,
}

impl NameList {
    /// Uses `names` as given
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            source: None,
        }
    }

    /// Names are read lazily from `path`; blank lines and `#` comments are skipped
    pub fn from_file(path: &Path) -> Self {
        Self {
            names: Vec::new(),
            source: Some(path.to_path_buf()),
        }
    }
}

#[async_trait]
impl GemNameSource for NameList {
    async fn list_names(&self) -> Result<Vec<String>> {
        let Some(path) = &self.source else {
            return Ok(self.names.clone());
        };
        let content = tokio::fs::read_to_string(path).await?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect())
    }
}
