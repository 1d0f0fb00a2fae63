use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use taskweave_core::{TaskweaveError, TaskweaveResult};

/// Scheduler settings, usually read from the `[workflow]` table of
/// `taskweave.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Maximum number of tasks dispatched together in one round.
    #[serde(default = "default_max_parallel_width")]
    pub max_parallel_width: usize,
    /// Per-task invocation timeout. `None` waits indefinitely.
    #[serde(default)]
    pub task_timeout_ms: Option<u64>,
}

fn default_max_parallel_width() -> usize {
    4
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_parallel_width: default_max_parallel_width(),
            task_timeout_ms: None,
        }
    }
}

/// Top-level layout of `taskweave.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    workflow: WorkflowConfig,
}

impl WorkflowConfig {
    /// Parse the `[workflow]` table of a TOML document and validate it.
    /// A document without the table yields the defaults.
    pub fn from_toml_str(input: &str) -> TaskweaveResult<Self> {
        let file: ConfigFile = toml::from_str(input)
            .map_err(|e| TaskweaveError::Config(format!("Invalid config: {e}")))?;
        file.workflow.validate()?;
        Ok(file.workflow)
    }

    /// Read and parse a config file.
    pub fn from_file(path: &Path) -> TaskweaveResult<Self> {
        let input = std::fs::read_to_string(path).map_err(|e| {
            TaskweaveError::Config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&input)
    }

    /// Set the batch width.
    pub fn with_max_parallel_width(mut self, width: usize) -> Self {
        self.max_parallel_width = width;
        self
    }

    /// Set the per-task timeout.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// The per-task timeout as a [`Duration`].
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_ms.map(Duration::from_millis)
    }

    /// Reject a zero width or a zero timeout.
    pub fn validate(&self) -> TaskweaveResult<()> {
        if self.max_parallel_width == 0 {
            return Err(TaskweaveError::Config(
                "max_parallel_width must be at least 1".to_string(),
            ));
        }
        if self.task_timeout_ms == Some(0) {
            return Err(TaskweaveError::Config(
                "task_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.max_parallel_width, 4);
        assert!(config.task_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_workflow_table() {
        let config = WorkflowConfig::from_toml_str(
            r#"
            [workflow]
            max_parallel_width = 2
            task_timeout_ms = 1500
            "#,
        )
        .unwrap();
        assert_eq!(config.max_parallel_width, 2);
        assert_eq!(config.task_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_missing_table_uses_defaults() {
        let config = WorkflowConfig::from_toml_str("").unwrap();
        assert_eq!(config, WorkflowConfig::default());

        let config = WorkflowConfig::from_toml_str("[workflow]\ntask_timeout_ms = 10\n").unwrap();
        assert_eq!(config.max_parallel_width, 4);
    }

    #[test]
    fn test_zero_width_rejected() {
        let err = WorkflowConfig::from_toml_str("[workflow]\nmax_parallel_width = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_parallel_width"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = WorkflowConfig::default().with_task_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let err = WorkflowConfig::from_toml_str("[workflow\n").unwrap_err();
        assert!(matches!(err, TaskweaveError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workflow]\nmax_parallel_width = 8").unwrap();
        let config = WorkflowConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_parallel_width, 8);

        let missing = WorkflowConfig::from_file(Path::new("/no/such/taskweave.toml"));
        assert!(missing.is_err());
    }
}
