//! Repository context data types
//!
//! The snapshot a collector produces for one repository. The engine only
//! reads it; every field defaults so partial snapshots still load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete repository snapshot consumed by a consultation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryContext {
    /// Snapshot metadata
    #[serde(default)]
    pub metadata: ContextMetadata,
    /// Files, lines and languages
    #[serde(default)]
    pub topology: Topology,
    /// Documentation inventory
    #[serde(default)]
    pub documentation: DocumentationInventory,
    /// CI/CD workflow inventory
    #[serde(default)]
    pub pipelines: PipelineInventory,
    /// Code health signals
    #[serde(default)]
    pub code_signals: CodeSignals,
}

impl RepositoryContext {
    /// Create an empty context for a named project
    pub fn new(name: &str) -> Self {
        Self {
            metadata: ContextMetadata {
                name: name.to_string(),
                ..ContextMetadata::default()
            },
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn workflow_count(&self) -> usize {
        self.pipelines.workflows.len()
    }

    /// Whether any workflow runs a job whose name contains one of `needles`
    pub fn has_job_matching(&self, needles: &[&str]) -> bool {
        self.pipelines.workflows.iter().any(|w| {
            w.jobs.iter().any(|job| {
                let job = job.to_ascii_lowercase();
                needles.iter().any(|n| job.contains(n))
            })
        })
    }

    /// Whether any workflow is triggered by one of `triggers`
    pub fn has_trigger(&self, triggers: &[&str]) -> bool {
        self.pipelines.workflows.iter().any(|w| {
            w.triggers
                .iter()
                .any(|t| triggers.iter().any(|n| t.eq_ignore_ascii_case(n)))
        })
    }

    /// Number of languages with at least one file
    pub fn language_count(&self) -> usize {
        self.topology.languages.values().filter(|c| **c > 0).count()
    }
}

/// Snapshot metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    /// Project name
    #[serde(default)]
    pub name: String,
    /// Repository root path
    #[serde(default)]
    pub root_path: String,
    /// Current git branch
    #[serde(default)]
    pub branch: String,
    /// Current commit hash (short)
    #[serde(default)]
    pub commit: String,
    /// When the collector ran; excluded from the fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
}

/// Repository shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub total_files: usize,
    #[serde(default)]
    pub total_loc: usize,
    /// File counts by language
    #[serde(default)]
    pub languages: BTreeMap<String, usize>,
    /// Top-level directories
    #[serde(default)]
    pub directories: Vec<String>,
}

/// Documentation inventory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentationInventory {
    #[serde(default)]
    pub has_readme: bool,
    #[serde(default)]
    pub has_contributing: bool,
    #[serde(default)]
    pub has_changelog: bool,
    #[serde(default)]
    pub has_license: bool,
    #[serde(default)]
    pub has_security_policy: bool,
    #[serde(default)]
    pub has_code_of_conduct: bool,
    /// Architecture / design documents
    #[serde(default)]
    pub architecture_docs: usize,
    /// Developer-log (TLDL) entries
    #[serde(default)]
    pub dev_log_entries: usize,
    /// All documentation files found
    #[serde(default)]
    pub doc_files: Vec<String>,
}

impl DocumentationInventory {
    /// Number of distinct documentation signals present
    pub fn signal_count(&self) -> usize {
        [
            self.has_readme,
            self.has_contributing,
            self.has_changelog,
            self.has_license,
            self.has_security_policy,
            self.has_code_of_conduct,
            self.architecture_docs > 0,
            self.dev_log_entries > 0,
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

/// CI/CD workflow inventory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineInventory {
    #[serde(default)]
    pub workflows: Vec<WorkflowInfo>,
}

/// One CI workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    pub name: String,
    #[serde(default)]
    pub path: String,
    /// Trigger events (push, pull_request, schedule, ...)
    #[serde(default)]
    pub triggers: Vec<String>,
    /// Job names
    #[serde(default)]
    pub jobs: Vec<String>,
}

/// Code health signals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeSignals {
    #[serde(default)]
    pub todo_count: usize,
    #[serde(default)]
    pub fixme_count: usize,
    #[serde(default)]
    pub hack_count: usize,
    #[serde(default)]
    pub source_files: usize,
    #[serde(default)]
    pub test_files: usize,
    /// Files above the collector's size threshold
    #[serde(default)]
    pub large_files: Vec<FileSignal>,
    #[serde(default)]
    pub dependency_manifests: Vec<String>,
    #[serde(default)]
    pub lockfiles: Vec<String>,
    #[serde(default)]
    pub has_gitignore: bool,
    #[serde(default)]
    pub has_editorconfig: bool,
    #[serde(default)]
    pub has_precommit: bool,
    #[serde(default)]
    pub has_dependabot: bool,
    #[serde(default)]
    pub has_devcontainer: bool,
    /// Makefile, justfile or similar
    #[serde(default)]
    pub has_task_runner: bool,
    /// Files that look like committed credentials
    #[serde(default)]
    pub suspected_secrets: usize,
}

impl CodeSignals {
    /// TODO + FIXME + HACK markers
    pub fn debt_markers(&self) -> usize {
        self.todo_count + self.fixme_count + self.hack_count
    }

    /// Test files per source file; 0.0 without sources
    pub fn test_ratio(&self) -> f64 {
        if self.source_files == 0 {
            0.0
        } else {
            self.test_files as f64 / self.source_files as f64
        }
    }

    /// Number of configuration hygiene signals present
    pub fn config_signal_count(&self) -> usize {
        [
            self.has_gitignore,
            self.has_editorconfig,
            self.has_precommit,
            self.has_dependabot,
            self.has_devcontainer,
            self.has_task_runner,
            !self.lockfiles.is_empty(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

/// A file called out by the collector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileSignal {
    pub path: String,
    #[serde(default)]
    pub loc: usize,
}
