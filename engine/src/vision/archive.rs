//! Vision archive: durable, indexed storage of completed visions.
//!
//! Layout under the archive root:
//!
//! ```text
//! index.json                  single source of truth for search and status
//! INDEX.md                    regenerated from index.json
//! .index.lock                 advisory lock for every index access
//! YYYY/MM/<archive-id>.json   immutable payload
//! YYYY/MM/<archive-id>.md     immutable narrative report
//! ```
//!
//! Payloads are never rewritten. The only post-hoc mutation is
//! `update_disposition`, which touches the index entry alone.

use super::render::render_vision_markdown;
use super::types::{
    ArchiveLocation, ArchiveMetadata, Disposition, EnrichedContext, SearchCriteria, VisionRecord,
    VisionRequest, VisionTrigger,
};
use crate::errors::{FacultyError, Result};
use crate::io::{write_atomic, write_new_atomic};
use crate::oracle::{ForecastReport, MaturityBucket, VisionSink};
use chrono::{DateTime, Datelike, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "index.json";
const INDEX_MARKDOWN_FILE: &str = "INDEX.md";
const LOCK_FILE: &str = ".index.lock";
const INDEX_VERSION: u32 = 1;

/// One archived record as listed in `index.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub vision_id: String,
    pub project: String,
    pub trigger: VisionTrigger,
    pub trigger_reason: String,
    #[serde(default)]
    pub context_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_intel: Option<String>,
    pub priority: u8,
    pub maturity_bucket: MaturityBucket,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_scenario: Option<String>,
    #[serde(flatten)]
    pub metadata: ArchiveMetadata,
}

impl IndexEntry {
    fn matches(&self, criteria: &SearchCriteria) -> bool {
        if let Some(trigger) = criteria.trigger
            && self.trigger != trigger
        {
            return false;
        }
        if let Some(disposition) = criteria.disposition
            && self.metadata.disposition != disposition
        {
            return false;
        }
        if let Some(min) = criteria.min_priority
            && self.priority < min
        {
            return false;
        }
        if let Some(project) = &criteria.project
            && !self.project.eq_ignore_ascii_case(project)
        {
            return false;
        }
        if let Some(since) = criteria.since
            && self.metadata.archived_at < since
        {
            return false;
        }
        if let Some(text) = &criteria.text {
            let needle = text.to_lowercase();
            let haystacks = [
                self.vision_id.as_str(),
                self.metadata.archive_id.as_str(),
                self.project.as_str(),
                self.trigger_reason.as_str(),
                self.context_notes.as_str(),
                self.top_scenario.as_deref().unwrap_or_default(),
            ];
            if !haystacks
                .iter()
                .any(|h| h.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        true
    }

    /// Same source intel, or the same trigger reason
    fn related_to(&self, request: &VisionRequest) -> bool {
        if self.vision_id == request.id {
            return false;
        }
        let same_source = matches!(
            (&self.source_intel, &request.source_intel),
            (Some(a), Some(b)) if a == b
        );
        let same_reason = !request.trigger_reason.trim().is_empty()
            && self
                .trigger_reason
                .trim()
                .eq_ignore_ascii_case(request.trigger_reason.trim());
        same_source || same_reason
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ArchiveIndex {
    #[serde(default)]
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    entries: Vec<IndexEntry>,
}

/// Held while the index is read or rewritten; released on drop
struct IndexLock {
    _file: File,
}

/// Filesystem-backed archive of completed visions
#[derive(Debug, Clone)]
pub struct VisionArchive {
    root: PathBuf,
}

impl VisionArchive {
    /// Open (creating if needed) the archive rooted at `root`
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| {
            FacultyError::archive_with_source(
                format!("failed to create archive root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn index_markdown_path(&self) -> PathBuf {
        self.root.join(INDEX_MARKDOWN_FILE)
    }

    /// Store a completed vision as a new record.
    ///
    /// Every call creates a new record, even for a vision archived before.
    /// Earlier visions with the same source intel or trigger reason are
    /// cross-linked from the new entry.
    pub fn archive_vision(
        &self,
        request: &VisionRequest,
        enriched: &EnrichedContext,
        report: &ForecastReport,
    ) -> Result<ArchiveLocation> {
        let archived_at = Utc::now();
        let archive_id = generate_archive_id(archived_at);
        let partition = format!("{:04}/{:02}", archived_at.year(), archived_at.month());
        let data_rel = format!("{partition}/{archive_id}.json");
        let report_rel = format!("{partition}/{archive_id}.md");

        let _lock = self.lock()?;
        let mut index = self.read_index()?;

        let mut related_visions: Vec<String> = Vec::new();
        for entry in index.entries.iter().filter(|e| e.related_to(request)) {
            if !related_visions.contains(&entry.vision_id) {
                related_visions.push(entry.vision_id.clone());
            }
        }

        let metadata = ArchiveMetadata {
            archive_id: archive_id.clone(),
            data_path: data_rel.clone(),
            report_path: report_rel.clone(),
            archived_at,
            disposition: Disposition::Pending,
            disposition_reason: None,
            resulting_changes: Vec::new(),
            disposition_updated_at: None,
            related_visions,
        };
        let record = VisionRecord {
            request: request.clone(),
            enriched: enriched.clone(),
            forecast: report.clone(),
            metadata: metadata.clone(),
        };

        let data_path = self.root.join(&data_rel);
        let report_path = self.root.join(&report_rel);
        let payload = serde_json::to_vec_pretty(&record)
            .map_err(|e| FacultyError::archive_with_source("failed to encode vision record", e))?;
        write_new_atomic(&data_path, &payload).map_err(|e| {
            FacultyError::archive_with_source(
                format!("failed to write payload {}", data_path.display()),
                e,
            )
        })?;
        write_new_atomic(&report_path, render_vision_markdown(&record).as_bytes()).map_err(
            |e| {
                FacultyError::archive_with_source(
                    format!("failed to write report {}", report_path.display()),
                    e,
                )
            },
        )?;

        index.entries.push(IndexEntry {
            vision_id: request.id.clone(),
            project: enriched.project.clone(),
            trigger: request.trigger,
            trigger_reason: request.trigger_reason.clone(),
            context_notes: request.context_notes.clone(),
            source_intel: request.source_intel.clone(),
            priority: request.priority,
            maturity_bucket: report.maturity.bucket,
            top_scenario: report.top_scenario().map(|s| s.name.clone()),
            metadata,
        });
        self.write_index(&mut index)?;

        tracing::info!(
            vision_id = %request.id,
            archive_id = %archive_id,
            path = %data_path.display(),
            "Vision archived"
        );
        Ok(ArchiveLocation {
            archive_id,
            data_path,
            report_path,
        })
    }

    /// Classify the newest archived record of `vision_id`.
    ///
    /// Idempotent: repeating the same disposition, reason and changes leaves
    /// the entry (including its update timestamp) untouched.
    pub fn update_disposition(
        &self,
        vision_id: &str,
        disposition: Disposition,
        reason: &str,
        resulting_changes: &[String],
    ) -> Result<IndexEntry> {
        let _lock = self.lock()?;
        let mut index = self.read_index()?;

        let Some(entry) = index
            .entries
            .iter_mut()
            .rev()
            .find(|e| e.vision_id == vision_id)
        else {
            return Err(FacultyError::archive(format!(
                "no archived record for vision {vision_id}"
            )));
        };

        let meta = &mut entry.metadata;
        let reason = Some(reason.to_string());
        if meta.disposition == disposition
            && meta.disposition_reason == reason
            && meta.resulting_changes == resulting_changes
        {
            tracing::debug!(vision_id, "Disposition unchanged");
            return Ok(entry.clone());
        }

        meta.disposition = disposition;
        meta.disposition_reason = reason;
        meta.resulting_changes = resulting_changes.to_vec();
        meta.disposition_updated_at = Some(Utc::now());
        let updated = entry.clone();

        self.write_index(&mut index)?;
        tracing::info!(
            vision_id,
            disposition = disposition.as_str(),
            "Vision disposition updated"
        );
        Ok(updated)
    }

    /// All index entries, oldest first
    pub fn entries(&self) -> Result<Vec<IndexEntry>> {
        let _lock = self.lock()?;
        Ok(self.read_index()?.entries)
    }

    /// Records matching `criteria`, newest first
    pub fn search_visions(&self, criteria: &SearchCriteria) -> Result<Vec<VisionRecord>> {
        let entries = self.entries()?;
        let limit = criteria.limit.unwrap_or(usize::MAX);
        let mut records = Vec::new();
        for entry in entries.iter().rev().filter(|e| e.matches(criteria)) {
            if records.len() >= limit {
                break;
            }
            match self.load_record(entry) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    archive_id = %entry.metadata.archive_id,
                    error = %e,
                    "Skipping unreadable archive payload"
                ),
            }
        }
        Ok(records)
    }

    /// Newest record for a vision id or archive id
    pub fn get_vision(&self, id: &str) -> Result<Option<VisionRecord>> {
        let entries = self.entries()?;
        match entries
            .iter()
            .rev()
            .find(|e| e.vision_id == id || e.metadata.archive_id == id)
        {
            Some(entry) => self.load_record(entry).map(Some),
            None => Ok(None),
        }
    }

    /// Markdown view of the index
    pub fn render_index_markdown(&self) -> Result<String> {
        let entries = self.entries()?;
        Ok(render_index(&entries))
    }

    fn load_record(&self, entry: &IndexEntry) -> Result<VisionRecord> {
        let path = self.root.join(&entry.metadata.data_path);
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            FacultyError::archive_with_source(
                format!("failed to read payload {}", path.display()),
                e,
            )
        })?;
        let mut record: VisionRecord = serde_json::from_str(&contents).map_err(|e| {
            FacultyError::archive_with_source(
                format!("malformed payload {}", path.display()),
                e,
            )
        })?;
        // The payload keeps the original classification; the index has the current one.
        record.metadata = entry.metadata.clone();
        Ok(record)
    }

    fn lock(&self) -> Result<IndexLock> {
        let path = self.root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| {
                FacultyError::archive_with_source(
                    format!("failed to open lock {}", path.display()),
                    e,
                )
            })?;

        // Blocks if another writer is active
        file.lock_exclusive().map_err(|e| {
            FacultyError::archive_with_source(format!("failed to lock {}", path.display()), e)
        })?;
        Ok(IndexLock { _file: file })
    }

    fn read_index(&self) -> Result<ArchiveIndex> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(ArchiveIndex {
                version: INDEX_VERSION,
                ..ArchiveIndex::default()
            });
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            FacultyError::archive_with_source(
                format!("failed to read index {}", path.display()),
                e,
            )
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            FacultyError::archive_with_source(format!("malformed index {}", path.display()), e)
        })
    }

    fn write_index(&self, index: &mut ArchiveIndex) -> Result<()> {
        index.version = INDEX_VERSION;
        index.updated_at = Some(Utc::now());
        let json = serde_json::to_vec_pretty(index)
            .map_err(|e| FacultyError::archive_with_source("failed to encode index", e))?;
        let path = self.index_path();
        write_atomic(&path, &json).map_err(|e| {
            FacultyError::archive_with_source(
                format!("failed to write index {}", path.display()),
                e,
            )
        })?;

        // index.json is authoritative; INDEX.md is rebuilt on the next write.
        let md_path = self.index_markdown_path();
        if let Err(e) = write_atomic(&md_path, render_index(&index.entries).as_bytes()) {
            tracing::warn!(
                path = %md_path.display(),
                error = %e,
                "Failed to refresh archive index rendering"
            );
        }
        Ok(())
    }
}

impl VisionSink for VisionArchive {
    fn archive(
        &mut self,
        request: &VisionRequest,
        enriched: &EnrichedContext,
        report: &ForecastReport,
    ) -> Result<ArchiveLocation> {
        self.archive_vision(request, enriched, report)
    }
}

/// `ARC-YYYYMMDD-HHMMSS-xxxxxx`
fn generate_archive_id(at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("ARC-{}-{}", at.format("%Y%m%d-%H%M%S"), &suffix[..6])
}

fn render_index(entries: &[IndexEntry]) -> String {
    let mut out = String::new();
    out.push_str("# Vision Archive\n\n");
    out.push_str("_Generated from index.json. Do not edit._\n\n");

    let count = |d: Disposition| {
        entries
            .iter()
            .filter(|e| e.metadata.disposition == d)
            .count()
    };
    out.push_str(&format!(
        "**Records:** {} | **Pending:** {} | **Validated:** {} | **Rejected:** {} | **Superseded:** {}\n\n",
        entries.len(),
        count(Disposition::Pending),
        count(Disposition::Validated),
        count(Disposition::Rejected),
        count(Disposition::Superseded),
    ));

    if entries.is_empty() {
        out.push_str("_No visions archived yet._\n");
        return out;
    }

    out.push_str("| Archived | Vision | Project | Trigger | Priority | Disposition | Top Scenario | Related |\n");
    out.push_str("|----------|--------|---------|---------|----------|-------------|--------------|---------|\n");
    for entry in entries.iter().rev() {
        out.push_str(&format!(
            "| {} | [{}]({}) | {} | {} | {} | {} | {} | {} |\n",
            entry.metadata.archived_at.format("%Y-%m-%d"),
            entry.vision_id,
            entry.metadata.report_path,
            entry.project,
            entry.trigger,
            entry.priority,
            entry.metadata.disposition,
            entry.top_scenario.as_deref().unwrap_or("-"),
            if entry.metadata.related_visions.is_empty() {
                "-".to_string()
            } else {
                entry.metadata.related_visions.join(", ")
            },
        ));
    }
    out
}
