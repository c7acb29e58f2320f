//! Faculty configuration loading
//!
//! Loads configuration from `~/.config/faculty/faculty.toml` (or the
//! `FACULTY_CONFIG` env var). Every field has a default, so an absent file
//! or an empty table is a valid configuration.

use crate::errors::{FacultyError, Result};
use crate::governor::ResourceBudget;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacultyConfig {
    /// Per-run resource budget
    #[serde(default)]
    pub budget: ResourceBudget,

    /// Advisor audit bounds and queuing policy
    #[serde(default)]
    pub advisor: AdvisorConfig,

    /// Oracle scenario bounds and ritual settings
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Where stores and reports live
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Advisor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Minimum items to report when that many findings exist
    #[serde(default = "default_min_items")]
    pub min_items: usize,

    /// Maximum items kept after critiquing
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Items with priority strictly above this are queued for the oracle
    #[serde(default = "default_queue_threshold")]
    pub oracle_queue_threshold: u8,

    /// Category/title keywords that always queue an item
    #[serde(default = "default_queue_keywords")]
    pub queue_keywords: Vec<String>,
}

fn default_min_items() -> usize {
    3
}

fn default_max_items() -> usize {
    12
}

fn default_queue_threshold() -> u8 {
    75
}

fn default_queue_keywords() -> Vec<String> {
    [
        "architecture",
        "transformation",
        "migration",
        "refactor",
        "integration",
        "modernization",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            min_items: default_min_items(),
            max_items: default_max_items(),
            oracle_queue_threshold: default_queue_threshold(),
            queue_keywords: default_queue_keywords(),
        }
    }
}

/// Oracle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_min_scenarios")]
    pub min_scenarios: usize,

    #[serde(default = "default_max_scenarios")]
    pub max_scenarios: usize,

    /// Default cap on visions processed by one ritual
    #[serde(default = "default_ritual_max_items")]
    pub ritual_max_items: usize,

    /// Claim lease after which a processing vision may be re-attempted
    #[serde(default = "default_lease_minutes")]
    pub lease_minutes: u32,
}

fn default_min_scenarios() -> usize {
    2
}

fn default_max_scenarios() -> usize {
    3
}

fn default_ritual_max_items() -> usize {
    5
}

fn default_lease_minutes() -> u32 {
    30
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            min_scenarios: default_min_scenarios(),
            max_scenarios: default_max_scenarios(),
            ritual_max_items: default_ritual_max_items(),
            lease_minutes: default_lease_minutes(),
        }
    }
}

impl OracleConfig {
    pub fn lease(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.lease_minutes))
    }
}

/// Storage locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for the cache, queue and archive
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Consultation reports; defaults to `<state_dir>/reports`
    #[serde(default)]
    pub output_dir: Option<String>,
}

fn default_state_dir() -> String {
    dirs::data_dir()
        .map(|d| d.join("faculty").to_string_lossy().into_owned())
        .unwrap_or_else(|| ".faculty".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            output_dir: None,
        }
    }
}

impl StorageConfig {
    /// State directory with `~/` expanded
    pub fn resolved_state_dir(&self) -> PathBuf {
        expand_home(&self.state_dir)
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.resolved_state_dir().join("cache.db")
    }

    pub fn queue_db_path(&self) -> PathBuf {
        self.resolved_state_dir().join("queue.db")
    }

    /// Generated queue rendering
    pub fn queue_markdown_path(&self) -> PathBuf {
        self.resolved_state_dir().join("QUEUE.md")
    }

    pub fn archive_root(&self) -> PathBuf {
        self.resolved_state_dir().join("archive")
    }

    pub fn resolved_output_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => expand_home(dir),
            None => self.resolved_state_dir().join("reports"),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}

impl FacultyConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "FACULTY_CONFIG";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "faculty.toml";

    /// Load configuration.
    ///
    /// Resolution order:
    /// 1. `explicit` (the CLI `--config` flag); must exist
    /// 2. `FACULTY_CONFIG` environment variable
    /// 3. `~/.config/faculty/faculty.toml`
    ///
    /// Falls back to defaults when the resolved file doesn't exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        let path = Self::resolve_config_path();
        if !path.exists() {
            tracing::info!(
                path = %path.display(),
                "Faculty config not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FacultyError::config_with_source(
                format!("failed to read config at {}", path.display()),
                e,
            )
        })?;

        tracing::debug!(path = %path.display(), "Loaded faculty config");
        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: FacultyConfig = toml::from_str(contents)
            .map_err(|e| FacultyError::config_with_source("failed to parse config", e))?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("faculty")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let mut problems = self.budget.problems();

        if self.advisor.min_items > self.advisor.max_items {
            problems.push(format!(
                "advisor.min_items ({}) exceeds advisor.max_items ({})",
                self.advisor.min_items, self.advisor.max_items
            ));
        }
        if self.advisor.oracle_queue_threshold > 100 {
            problems.push(format!(
                "advisor.oracle_queue_threshold must be at most 100, got {}",
                self.advisor.oracle_queue_threshold
            ));
        }
        if self.oracle.min_scenarios > self.oracle.max_scenarios {
            problems.push(format!(
                "oracle.min_scenarios ({}) exceeds oracle.max_scenarios ({})",
                self.oracle.min_scenarios, self.oracle.max_scenarios
            ));
        }
        if self.oracle.max_scenarios == 0 {
            problems.push("oracle.max_scenarios must be at least 1".to_string());
        }

        if !problems.is_empty() {
            return Err(FacultyError::config(problems.join("; ")));
        }

        if self.budget.soft_stop_fraction > self.budget.escalation_fraction {
            tracing::warn!(
                soft_stop_fraction = self.budget.soft_stop_fraction,
                escalation_fraction = self.budget.escalation_fraction,
                "Soft stop is later than escalation, escalation will never be observed before denial"
            );
        }

        Ok(())
    }
}
