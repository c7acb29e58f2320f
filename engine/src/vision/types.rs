//! Vision request and archive record types.

use crate::oracle::ForecastReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// What caused a vision to be requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisionTrigger {
    /// Queued by the advisor's queuing policy
    AdvisorIntel,
    /// Recurring pattern noticed by tooling
    SystemPattern,
    /// Requested by a person
    Manual,
    Intuition,
}

impl VisionTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdvisorIntel => "advisor-intel",
            Self::SystemPattern => "system-pattern",
            Self::Manual => "manual",
            Self::Intuition => "intuition",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "advisor-intel" => Some(Self::AdvisorIntel),
            "system-pattern" => Some(Self::SystemPattern),
            "manual" => Some(Self::Manual),
            "intuition" => Some(Self::Intuition),
            _ => None,
        }
    }
}

impl std::fmt::Display for VisionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisionTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(&s.trim().to_ascii_lowercase()).ok_or_else(|| {
            format!(
                "unknown trigger '{s}' (expected advisor-intel, system-pattern, manual or intuition)"
            )
        })
    }
}

/// Lifecycle of a queued request: pending -> processing -> completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionStatus {
    Pending,
    Processing,
    Completed,
}

impl VisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for VisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(&s.trim().to_ascii_lowercase()).ok_or_else(|| {
            format!("unknown status '{s}' (expected pending, processing or completed)")
        })
    }
}

/// Post-hoc classification of an archived vision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    #[default]
    Pending,
    Validated,
    Rejected,
    Superseded,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Rejected => "rejected",
            Self::Superseded => "superseded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "validated" => Some(Self::Validated),
            "rejected" => Some(Self::Rejected),
            "superseded" => Some(Self::Superseded),
            _ => None,
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Disposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(&s.trim().to_ascii_lowercase()).ok_or_else(|| {
            format!("unknown disposition '{s}' (expected pending, validated, rejected or superseded)")
        })
    }
}

/// A deferred request for oracle forecasting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionRequest {
    /// `VIS-YYYYMMDD-xxxxxxxx`; assigned by the queue when empty
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub trigger: VisionTrigger,
    pub trigger_reason: String,
    /// 0-100
    pub priority: u8,
    /// Action item or report that produced this request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_intel: Option<String>,
    #[serde(default)]
    pub context_notes: String,
    pub requester: String,
    pub status: VisionStatus,

    // Queue bookkeeping
    #[serde(default)]
    pub sequence: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<String>,
}

impl VisionRequest {
    /// New pending request with priority 50, requested by `faculty`
    pub fn new(trigger: VisionTrigger, reason: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            timestamp: Utc::now(),
            trigger,
            trigger_reason: reason.into(),
            priority: 50,
            source_intel: None,
            context_notes: String::new(),
            requester: "faculty".to_string(),
            status: VisionStatus::Pending,
            sequence: 0,
            claim_token: None,
            claimed_at: None,
            completed_at: None,
            archive_path: None,
        }
    }

    /// Priority clamped to 100
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(100);
        self
    }

    pub fn with_source_intel(mut self, source: impl Into<String>) -> Self {
        self.source_intel = Some(source.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.context_notes = notes.into();
        self
    }

    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = requester.into();
        self
    }
}

/// Generate a vision id: `VIS-YYYYMMDD-xxxxxxxx`
pub fn generate_vision_id(at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("VIS-{}-{}", at.format("%Y%m%d"), &suffix[..8])
}

/// Counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
}

/// Context as the ritual saw it: the repository snapshot plus the request's
/// reason for existing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedContext {
    pub project: String,
    pub context_fingerprint: String,
    pub vision_id: String,
    pub trigger: VisionTrigger,
    pub trigger_reason: String,
    #[serde(default)]
    pub context_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_intel: Option<String>,
    /// Areas named by the reason and notes (documentation, pipelines, ...)
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

/// Archive bookkeeping for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub archive_id: String,
    /// Payload path relative to the archive root
    pub data_path: String,
    /// Narrative path relative to the archive root
    pub report_path: String,
    pub archived_at: DateTime<Utc>,
    #[serde(default)]
    pub disposition: Disposition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition_reason: Option<String>,
    #[serde(default)]
    pub resulting_changes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition_updated_at: Option<DateTime<Utc>>,
    /// Earlier visions with the same source intel or trigger reason
    #[serde(default)]
    pub related_visions: Vec<String>,
}

/// A completed vision as stored in the archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionRecord {
    pub request: VisionRequest,
    pub enriched: EnrichedContext,
    pub forecast: ForecastReport,
    pub metadata: ArchiveMetadata,
}

/// Where an archived record landed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveLocation {
    pub archive_id: String,
    pub data_path: PathBuf,
    pub report_path: PathBuf,
}

/// Archive search filters; all set filters must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    /// Case-insensitive substring over reason, notes, project and vision id
    pub text: Option<String>,
    pub trigger: Option<VisionTrigger>,
    pub disposition: Option<Disposition>,
    pub min_priority: Option<u8>,
    pub project: Option<String>,
    pub since: Option<DateTime<Utc>>,
    /// Newest first, at most this many
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_id_format() {
        let at = DateTime::parse_from_rfc3339("2026-03-07T10:00:00Z")
            .expect("ts")
            .with_timezone(&Utc);
        let id = generate_vision_id(at);
        assert!(id.starts_with("VIS-20260307-"));
        assert_eq!(id.len(), "VIS-20260307-".len() + 8);
        assert_ne!(id, generate_vision_id(at));
    }

    #[test]
    fn test_priority_clamped() {
        let req = VisionRequest::new(VisionTrigger::Manual, "look ahead").with_priority(250);
        assert_eq!(req.priority, 100);
        assert_eq!(req.status, VisionStatus::Pending);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(
            "Advisor-Intel".parse::<VisionTrigger>().expect("trigger"),
            VisionTrigger::AdvisorIntel
        );
        assert_eq!(VisionStatus::parse("processing"), Some(VisionStatus::Processing));
        assert!("maybe".parse::<Disposition>().is_err());
        assert_eq!(
            serde_json::to_string(&VisionTrigger::SystemPattern).expect("json"),
            "\"system-pattern\""
        );
    }
}
