use crate::config::FetchConfig;
use crate::error::{HarvestError, Result};
use crate::models::WorkItem;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Retrieves one `.gem` artifact into a directory
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Downloads `item` into `dir`, failing with the tool's own message
    async fn fetch(&self, item: &WorkItem, dir: &Path) -> Result<()>;
}

/// Runs `<tool> fetch <name> -v <version>` as a child process
#[derive(Debug, Clone)]
pub struct GemCommand {
    tool: String,
    timeout: Duration,
}

impl GemCommand {
    /// Runs `tool`, giving each invocation `timeout` to finish
    pub fn new(tool: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tool: tool.into(),
            timeout,
        }
    }

    /// Uses the configured tool and timeout
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.tool.clone(), config.tool_timeout())
    }
}

#[async_trait]
impl ArtifactFetcher for GemCommand {
    async fn fetch(&self, item: &WorkItem, dir: &Path) -> Result<()> {
        debug!("{} fetch {} -v {}", self.tool, item.name, item.version);

        let child = Command::new(&self.tool)
            .args(["fetch", &item.name, "-v", &item.version])
            .current_dir(dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                HarvestError::Timeout(format!(
                    "{} fetch {} after {:?}",
                    self.tool, item.full_name, self.timeout
                ))
            })??;

        // The tool reports some failures on stderr with a zero exit status
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.contains("Could not find a valid gem") {
            return Err(HarvestError::GemNotFound(stderr.to_string()));
        }
        if !stderr.is_empty() {
            return Err(HarvestError::Tool(stderr.to_string()));
        }
        if !output.status.success() {
            return Err(HarvestError::Tool(format!(
                "{} fetch {} exited with {}",
                self.tool, item.full_name, output.status
            )));
        }
        Ok(())
    }
}
