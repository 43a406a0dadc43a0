use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub(crate) const DEFAULT_LOG_FILTER: &str = "payday=warn";
const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Config {
    pub(crate) db_path: PathBuf,
    pub(crate) session_path: PathBuf,
    pub(crate) log_filter: String,
}

impl Config {
    /// Defaults under the platform data directory, overridden by
    /// `PAYDAY_DB`, `PAYDAY_SESSION` and `PAYDAY_LOG`.
    pub(crate) fn load() -> Result<Self> {
        let proj_dirs = directories::ProjectDirs::from("com", "payday", "PaydayPlanner")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        Ok(Self::resolve(data_dir, |key| std::env::var(key).ok()))
    }

    pub(crate) fn resolve(data_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        Self {
            db_path: var("PAYDAY_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("payday.db")),
            session_path: var("PAYDAY_SESSION")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("session.json")),
            log_filter: var("PAYDAY_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }

    /// `PAYDAY_DB=:memory:` runs without touching disk; nothing survives the process.
    pub(crate) fn is_in_memory(&self) -> bool {
        self.db_path.as_os_str() == IN_MEMORY
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
