//! The vision ritual: drain queued visions into the archive.
//!
//! Each request moves pending -> processing (claimed by `dequeue`), is
//! forecast against the context enriched with its reason, is handed to the
//! archive sink, and only then is marked completed. A failed archive write
//! leaves the request `processing`; once its lease expires the next ritual
//! re-attempts it.

use super::{ForecastReport, Oracle};
use crate::context::RepositoryContext;
use crate::errors::{ErrorCategory, FacultyError, Result};
use crate::governor::ResourceGovernor;
use crate::types::ConsultantRole;
use crate::vision::{ArchiveLocation, EnrichedContext, VisionQueue, VisionRequest};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Where completed visions are stored
pub trait VisionSink {
    /// Persist one completed vision. Must not return until the record is
    /// durable; an error keeps the request out of `completed`.
    fn archive(
        &mut self,
        request: &VisionRequest,
        enriched: &EnrichedContext,
        report: &ForecastReport,
    ) -> Result<ArchiveLocation>;
}

/// Why a ritual stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RitualStop {
    QueueEmpty,
    MaxItemsReached,
    BudgetDenied { reason: String },
}

impl RitualStop {
    pub fn describe(&self) -> String {
        match self {
            Self::QueueEmpty => "queue empty".to_string(),
            Self::MaxItemsReached => "max items reached".to_string(),
            Self::BudgetDenied { reason } => format!("budget denied: {reason}"),
        }
    }
}

/// A vision the ritual completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualItem {
    pub vision_id: String,
    pub priority: u8,
    pub trigger_reason: String,
    pub archive_id: String,
    pub report_path: String,
    /// Top scenario name, if any
    pub headline: Option<String>,
}

/// A vision the ritual claimed but could not complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualFailure {
    pub vision_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualResult {
    pub processed: Vec<RitualItem>,
    pub failed: Vec<RitualFailure>,
    /// Ids re-claimed after an expired lease
    pub reclaimed: Vec<String>,
    pub stop: RitualStop,
}

impl RitualResult {
    pub fn attempted(&self) -> usize {
        self.processed.len() + self.failed.len()
    }

    pub fn is_constrained(&self) -> bool {
        matches!(self.stop, RitualStop::BudgetDenied { .. }) || !self.failed.is_empty()
    }
}

const FOCUS_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "architecture",
        &[
            "architect",
            "monolith",
            "refactor",
            "migrat",
            "moderniz",
            "transform",
            "integrat",
            "redesign",
        ],
    ),
    ("pipelines", &["ci", "pipeline", "workflow", "build", "deploy", "release"]),
    (
        "documentation",
        &["doc", "readme", "guide", "tldl", "devlog", "changelog"],
    ),
    ("security", &["secur", "secret", "vulnerab", "credential", "cve"]),
    ("testing", &["test", "coverage"]),
    ("technical debt", &["debt", "todo", "fixme", "hack", "cleanup"]),
    ("community", &["contributor", "community", "onboard"]),
];

/// Focus areas named in free text, in table order
pub fn focus_areas(text: &str) -> Vec<String> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    FOCUS_KEYWORDS
        .iter()
        .filter(|(_, keywords)| {
            keywords.iter().any(|kw| {
                words.iter().any(|w| {
                    if kw.len() <= 2 {
                        w == kw
                    } else {
                        w.starts_with(kw)
                    }
                })
            })
        })
        .map(|(area, _)| (*area).to_string())
        .collect()
}

/// Context as seen by the ritual for one request
pub fn enrich_context(
    context: &RepositoryContext,
    fingerprint: &str,
    request: &VisionRequest,
) -> EnrichedContext {
    let text = format!("{} {}", request.trigger_reason, request.context_notes);
    EnrichedContext {
        project: context.name().to_string(),
        context_fingerprint: fingerprint.to_string(),
        vision_id: request.id.clone(),
        trigger: request.trigger,
        trigger_reason: request.trigger_reason.clone(),
        context_notes: request.context_notes.clone(),
        source_intel: request.source_intel.clone(),
        focus_areas: focus_areas(&text),
    }
}

impl Oracle {
    /// Drain up to `max_items` visions from the queue into `sink`.
    ///
    /// Requests with an expired claim lease are re-attempted first, at most
    /// `max_items` of them. A request whose claim was taken over by another
    /// ritual is reported as failed and left to that ritual. Stops
    /// when the queue is empty, `max_items` have been attempted, or the
    /// governor denies. Never waits for new items.
    pub fn process_vision_queue(
        &self,
        context: &RepositoryContext,
        max_items: usize,
        governor: &mut ResourceGovernor,
        queue: &mut VisionQueue,
        sink: &mut dyn VisionSink,
    ) -> Result<RitualResult> {
        let fingerprint = context.fingerprint()?;
        let mut reclaimed: VecDeque<VisionRequest> =
            queue.reclaim_expired(self.config.lease(), max_items)?.into();

        let mut result = RitualResult {
            processed: Vec::new(),
            failed: Vec::new(),
            reclaimed: reclaimed.iter().map(|r| r.id.clone()).collect(),
            stop: RitualStop::QueueEmpty,
        };

        tracing::info!(
            max_items,
            reclaimed = result.reclaimed.len(),
            "Vision ritual started"
        );

        loop {
            if result.attempted() >= max_items {
                result.stop = RitualStop::MaxItemsReached;
                break;
            }
            if !governor.should_proceed("oracle.ritual") {
                result.stop = RitualStop::BudgetDenied {
                    reason: governor.last_stop_reason().unwrap_or_default().to_string(),
                };
                break;
            }

            let request = match reclaimed.pop_front() {
                Some(request) => request,
                None => match queue.dequeue()? {
                    Some(request) => request,
                    None => {
                        result.stop = RitualStop::QueueEmpty;
                        break;
                    }
                },
            };

            let enriched = enrich_context(context, &fingerprint, &request);
            let handle = governor.start_timing(ConsultantRole::Oracle, "ritual");
            let report = self.forecast_uncached(context, &fingerprint, Some(&enriched), governor);
            governor.end_timing(handle, ConsultantRole::Oracle);

            if report.constrained {
                let reason = report.stop_reason.clone().unwrap_or_default();
                tracing::warn!(
                    vision_id = %request.id,
                    reason = %reason,
                    "Vision forecast constrained, leaving request processing"
                );
                result.failed.push(RitualFailure {
                    vision_id: request.id.clone(),
                    error: format!("forecast constrained: {reason}"),
                });
                result.stop = RitualStop::BudgetDenied { reason };
                break;
            }

            match sink.archive(&request, &enriched, &report) {
                Ok(location) => {
                    let data_path = location.data_path.to_string_lossy().into_owned();
                    let token = request.claim_token.as_deref().unwrap_or_default();
                    match queue.mark_completed(&request.id, token, &data_path) {
                        Ok(()) => {}
                        Err(e @ FacultyError::StaleClaim { .. }) => {
                            tracing::warn!(
                                vision_id = %request.id,
                                "Claim lost to another ritual, leaving completion to it"
                            );
                            result.failed.push(RitualFailure {
                                vision_id: request.id.clone(),
                                error: e.to_string(),
                            });
                            continue;
                        }
                        Err(e) => return Err(e),
                    }
                    result.processed.push(RitualItem {
                        vision_id: request.id.clone(),
                        priority: request.priority,
                        trigger_reason: request.trigger_reason.clone(),
                        archive_id: location.archive_id,
                        report_path: location.report_path.to_string_lossy().into_owned(),
                        headline: report.top_scenario().map(|s| s.name.clone()),
                    });
                }
                Err(e) if e.category() == ErrorCategory::ArchiveWriteFailure => {
                    tracing::error!(
                        vision_id = %request.id,
                        error = %e,
                        "Archive write failed, vision stays processing"
                    );
                    result.failed.push(RitualFailure {
                        vision_id: request.id.clone(),
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            processed = result.processed.len(),
            failed = result.failed.len(),
            stop = %result.stop.describe(),
            "Vision ritual finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::{ManualClock, ResourceBudget};
    use crate::vision::{VisionStatus, VisionTrigger};
    use std::path::PathBuf;

    #[derive(Default)]
    struct MemorySink {
        archived: Vec<(String, Vec<String>)>,
    }

    impl VisionSink for MemorySink {
        fn archive(
            &mut self,
            request: &VisionRequest,
            enriched: &EnrichedContext,
            _report: &ForecastReport,
        ) -> Result<ArchiveLocation> {
            self.archived
                .push((request.id.clone(), enriched.focus_areas.clone()));
            Ok(ArchiveLocation {
                archive_id: format!("ARC-{}", self.archived.len()),
                data_path: PathBuf::from(format!("mem/{}.json", request.id)),
                report_path: PathBuf::from(format!("mem/{}.md", request.id)),
            })
        }
    }

    struct FailingSink;

    impl VisionSink for FailingSink {
        fn archive(
            &mut self,
            _request: &VisionRequest,
            _enriched: &EnrichedContext,
            _report: &ForecastReport,
        ) -> Result<ArchiveLocation> {
            Err(FacultyError::archive("disk full"))
        }
    }

    fn governor() -> ResourceGovernor {
        ResourceGovernor::with_clock(ResourceBudget::default(), Box::new(ManualClock::new()))
    }

    fn enqueue(queue: &VisionQueue, priority: u8, reason: &str) -> String {
        queue
            .enqueue(&VisionRequest::new(VisionTrigger::Manual, reason).with_priority(priority))
            .expect("enqueue")
    }

    #[test]
    fn test_focus_areas() {
        assert_eq!(
            focus_areas("Refactor the CI pipeline; docs are stale"),
            vec!["architecture", "pipelines", "documentation"]
        );
        assert!(focus_areas("decision pending").is_empty());
        assert_eq!(focus_areas("TODO cleanup"), vec!["technical debt"]);
    }

    #[test]
    fn test_ritual_respects_max_items_and_priority() {
        let oracle = Oracle::default();
        let mut queue = VisionQueue::in_memory().expect("queue");
        let low = enqueue(&queue, 20, "low");
        let high = enqueue(&queue, 80, "high");
        let mid = enqueue(&queue, 50, "mid");
        let mut sink = MemorySink::default();
        let mut governor = governor();

        let result = oracle
            .process_vision_queue(
                &RepositoryContext::new("demo"),
                2,
                &mut governor,
                &mut queue,
                &mut sink,
            )
            .expect("ritual");

        let done: Vec<_> = result.processed.iter().map(|i| i.vision_id.clone()).collect();
        assert_eq!(done, vec![high.clone(), mid.clone()]);
        assert_eq!(result.stop, RitualStop::MaxItemsReached);
        assert_eq!(
            queue.get(&low).expect("get").expect("row").status,
            VisionStatus::Pending
        );
        assert_eq!(
            queue.get(&high).expect("get").expect("row").status,
            VisionStatus::Completed
        );
    }

    #[test]
    fn test_ritual_stops_on_empty_queue() {
        let oracle = Oracle::default();
        let mut queue = VisionQueue::in_memory().expect("queue");
        enqueue(&queue, 60, "Split the monolith");
        let mut sink = MemorySink::default();
        let mut governor = governor();

        let result = oracle
            .process_vision_queue(
                &RepositoryContext::new("demo"),
                5,
                &mut governor,
                &mut queue,
                &mut sink,
            )
            .expect("ritual");
        assert_eq!(result.processed.len(), 1);
        assert_eq!(result.stop, RitualStop::QueueEmpty);
        assert_eq!(sink.archived[0].1, vec!["architecture".to_string()]);
    }

    #[test]
    fn test_archive_failure_leaves_processing() {
        let oracle = Oracle::default();
        let mut queue = VisionQueue::in_memory().expect("queue");
        let id = enqueue(&queue, 90, "urgent");
        let mut governor = governor();

        let result = oracle
            .process_vision_queue(
                &RepositoryContext::new("demo"),
                1,
                &mut governor,
                &mut queue,
                &mut FailingSink,
            )
            .expect("ritual");
        assert!(result.processed.is_empty());
        assert_eq!(result.failed.len(), 1);
        assert!(result.failed[0].error.contains("disk full"));
        assert!(result.is_constrained());
        assert_eq!(
            queue.get(&id).expect("get").expect("row").status,
            VisionStatus::Processing
        );
    }

    #[test]
    fn test_ritual_budget_denied() {
        let oracle = Oracle::default();
        let mut queue = VisionQueue::in_memory().expect("queue");
        let id = enqueue(&queue, 90, "urgent");
        let clock = ManualClock::new();
        clock.set(std::time::Duration::from_secs(600));
        let mut governor =
            ResourceGovernor::with_clock(ResourceBudget::default(), Box::new(clock));

        let result = oracle
            .process_vision_queue(
                &RepositoryContext::new("demo"),
                3,
                &mut governor,
                &mut queue,
                &mut MemorySink::default(),
            )
            .expect("ritual");
        assert!(matches!(result.stop, RitualStop::BudgetDenied { .. }));
        assert_eq!(
            queue.get(&id).expect("get").expect("row").status,
            VisionStatus::Pending
        );
    }
}
