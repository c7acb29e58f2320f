//! Advisor consultant: audits present state.
//!
//! ```text
//! idle -> (cache check) -> learning -> critiquing -> done
//!                             |            |
//!                             +-> aborted <+   (governor denied)
//! ```
//!
//! Learning evaluates the rule table category by category, one governor
//! check and one `other` call per category. Critiquing ranks, bounds and
//! applies the oracle-queuing policy.

pub mod policy;
pub mod rules;

pub use policy::{QueuePolicy, QueueReason};
pub use rules::{AUDIT_RULES, AuditRule};

use crate::cache::ResultCache;
use crate::config::AdvisorConfig;
use crate::context::RepositoryContext;
use crate::errors::Result;
use crate::governor::{ResourceGovernor, ServiceClass};
use crate::types::{AnalysisDepth, ConsultantRole};
use crate::vision::{VisionQueue, VisionRequest, VisionTrigger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Audit categories, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Documentation,
    Pipelines,
    Automation,
    Security,
    DeveloperExperience,
    TechnicalDebt,
}

impl AuditCategory {
    pub fn all() -> [Self; 6] {
        [
            Self::Documentation,
            Self::Pipelines,
            Self::Automation,
            Self::Security,
            Self::DeveloperExperience,
            Self::TechnicalDebt,
        ]
    }

    /// Categories audited at a given depth
    pub fn for_depth(depth: AnalysisDepth) -> Vec<Self> {
        match depth {
            AnalysisDepth::Quick => vec![Self::Documentation, Self::Pipelines, Self::Security],
            AnalysisDepth::Standard | AnalysisDepth::Deep => Self::all().to_vec(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Documentation => "documentation",
            Self::Pipelines => "pipelines",
            Self::Automation => "automation",
            Self::Security => "security",
            Self::DeveloperExperience => "developer_experience",
            Self::TechnicalDebt => "technical_debt",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Documentation => "Documentation",
            Self::Pipelines => "Pipelines",
            Self::Automation => "Automation",
            Self::Security => "Security",
            Self::DeveloperExperience => "Developer Experience",
            Self::TechnicalDebt => "Technical Debt",
        }
    }
}

/// One recommended action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    /// Rule id that produced the item
    pub id: String,
    pub category: AuditCategory,
    pub title: String,
    pub description: String,
    pub evidence: String,
    pub impact: Impact,
    pub effort: Effort,
    /// 0-100
    pub priority: u8,
    #[serde(default)]
    pub oracle_queued: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_id: Option<String>,
}

impl ActionItem {
    pub fn from_rule(rule: &AuditRule, evidence: String) -> Self {
        Self {
            id: rule.id.to_string(),
            category: rule.category,
            title: rule.title.to_string(),
            description: rule.description.to_string(),
            evidence,
            impact: rule.impact,
            effort: rule.effort,
            priority: rule.priority.min(100),
            oracle_queued: false,
            vision_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorPhase {
    Idle,
    CacheCheck,
    Learning,
    Critiquing,
    Done,
    Aborted,
}

impl AdvisorPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CacheCheck => "cache_check",
            Self::Learning => "learning",
            Self::Critiquing => "critiquing",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }

    pub fn can_transition_to(&self, next: AdvisorPhase) -> bool {
        use AdvisorPhase::*;
        matches!(
            (self, next),
            (Idle, CacheCheck)
                | (CacheCheck, Learning)
                | (CacheCheck, Done)
                | (Learning, Critiquing)
                | (Learning, Aborted)
                | (Critiquing, Done)
                | (Critiquing, Aborted)
        )
    }
}

/// Advisor output for one context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryReport {
    pub project: String,
    pub context_fingerprint: String,
    pub generated_at: DateTime<Utc>,
    pub depth: AnalysisDepth,
    /// Sorted by priority, descending
    pub items: Vec<ActionItem>,
    pub categories_audited: Vec<AuditCategory>,
    /// Findings before truncation
    pub findings_total: usize,
    /// Final state-machine phase (done or aborted)
    pub phase: AdvisorPhase,
    pub constrained: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub from_cache: bool,
}

impl AdvisoryReport {
    pub fn queued_visions(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|i| i.vision_id.as_deref())
            .collect()
    }

    pub fn top_priority(&self) -> Option<u8> {
        self.items.iter().map(|i| i.priority).max()
    }
}

/// The auditing consultant
#[derive(Debug, Clone)]
pub struct Advisor {
    config: AdvisorConfig,
    depth: AnalysisDepth,
    policy: QueuePolicy,
}

impl Advisor {
    pub fn new(config: AdvisorConfig) -> Self {
        let policy = QueuePolicy::from_config(&config);
        Self {
            config,
            depth: AnalysisDepth::default(),
            policy,
        }
    }

    pub fn with_depth(mut self, depth: AnalysisDepth) -> Self {
        self.depth = depth;
        self
    }

    /// Maximum items kept after critiquing at the current depth
    pub fn item_cap(&self) -> usize {
        (self.config.max_items * self.depth.item_multiplier()).max(self.config.min_items)
    }

    /// Advisory cached under `fingerprint` at this advisor's depth
    pub fn cached(&self, fingerprint: &str, cache: &ResultCache) -> Result<Option<AdvisoryReport>> {
        match cache.get::<AdvisoryReport>(fingerprint, ConsultantRole::Advisor)? {
            Some(mut cached) if cached.depth == self.depth => {
                cached.from_cache = true;
                Ok(Some(cached))
            }
            Some(_) => {
                tracing::debug!(depth = self.depth.as_str(), "Cached advisory at other depth");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Audit `context`.
    ///
    /// A cache hit (at the same depth) returns without charging the
    /// governor or touching the queue. Budget denial yields a constrained
    /// report carrying whatever was collected; queue errors propagate.
    pub fn advise(
        &self,
        context: &RepositoryContext,
        governor: &mut ResourceGovernor,
        cache: &ResultCache,
        queue: &VisionQueue,
    ) -> Result<AdvisoryReport> {
        let mut phase = AdvisorPhase::Idle;
        transition(&mut phase, AdvisorPhase::CacheCheck);

        let fingerprint = context.fingerprint()?;
        if let Some(cached) = self.cached(&fingerprint, cache)? {
            governor.record_cache_hit(ConsultantRole::Advisor);
            transition(&mut phase, AdvisorPhase::Done);
            return Ok(cached);
        }
        governor.record_cache_miss(ConsultantRole::Advisor);

        let mut report = AdvisoryReport {
            project: context.name().to_string(),
            context_fingerprint: fingerprint.clone(),
            generated_at: Utc::now(),
            depth: self.depth,
            items: Vec::new(),
            categories_audited: Vec::new(),
            findings_total: 0,
            phase,
            constrained: false,
            stop_reason: None,
            from_cache: false,
        };

        // Learning
        transition(&mut phase, AdvisorPhase::Learning);
        let handle = governor.start_timing(ConsultantRole::Advisor, "learning");
        for category in AuditCategory::for_depth(self.depth) {
            let operation = format!("advisor.audit.{}", category.as_str());
            if !governor.should_proceed(&operation) {
                governor.end_timing(handle, ConsultantRole::Advisor);
                return Ok(abort(report, phase, governor));
            }
            governor.track_call(ServiceClass::Other);
            let found: Vec<ActionItem> = rules::rules_for(category)
                .filter_map(|rule| rule.evaluate(context))
                .collect();
            tracing::debug!(
                category = category.as_str(),
                findings = found.len(),
                "Audit category complete"
            );
            report.items.extend(found);
            report.categories_audited.push(category);
        }
        governor.end_timing(handle, ConsultantRole::Advisor);
        report.findings_total = report.items.len();

        // Critiquing
        transition(&mut phase, AdvisorPhase::Critiquing);
        if !governor.should_proceed("advisor.critiquing") {
            rank(&mut report.items);
            return Ok(abort(report, phase, governor));
        }
        let handle = governor.start_timing(ConsultantRole::Advisor, "critiquing");
        rank(&mut report.items);
        report.items.truncate(self.item_cap());

        for item in &mut report.items {
            let Some(reason) = self.policy.evaluate(item) else {
                continue;
            };
            let request = VisionRequest::new(VisionTrigger::AdvisorIntel, item.title.clone())
                .with_priority(item.priority)
                .with_source_intel(format!("{}:{}", report.project, item.id))
                .with_notes(format!("{}. Evidence: {}", reason.describe(), item.evidence))
                .with_requester("advisor");
            let vision_id = queue.enqueue(&request)?;
            item.oracle_queued = true;
            item.vision_id = Some(vision_id);
        }
        governor.end_timing(handle, ConsultantRole::Advisor);

        transition(&mut phase, AdvisorPhase::Done);
        report.phase = phase;

        tracing::info!(
            project = %report.project,
            items = report.items.len(),
            findings = report.findings_total,
            queued = report.queued_visions().len(),
            "Advisory complete"
        );
        cache.put(&fingerprint, ConsultantRole::Advisor, &report)?;
        Ok(report)
    }
}

/// Priority descending; stable, so ties keep rule-table order
fn rank(items: &mut [ActionItem]) {
    items.sort_by(|a, b| b.priority.cmp(&a.priority));
}

fn transition(phase: &mut AdvisorPhase, next: AdvisorPhase) {
    debug_assert!(
        phase.can_transition_to(next),
        "invalid advisor transition {} -> {}",
        phase.as_str(),
        next.as_str()
    );
    tracing::trace!(from = phase.as_str(), to = next.as_str(), "Advisor phase");
    *phase = next;
}

fn abort(
    mut report: AdvisoryReport,
    mut phase: AdvisorPhase,
    governor: &ResourceGovernor,
) -> AdvisoryReport {
    transition(&mut phase, AdvisorPhase::Aborted);
    report.phase = phase;
    report.constrained = true;
    report.findings_total = report.findings_total.max(report.items.len());
    report.stop_reason = governor.last_stop_reason().map(str::to_string);
    tracing::warn!(
        project = %report.project,
        items = report.items.len(),
        reason = report.stop_reason.as_deref().unwrap_or("unknown"),
        "Advisory constrained"
    );
    report
}
