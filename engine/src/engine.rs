//! Orchestrator: owns the stores, runs one governed consultation at a time
//! and persists the consolidated report.

use crate::advisor::{Advisor, AdvisoryReport};
use crate::cache::ResultCache;
use crate::config::FacultyConfig;
use crate::context::{ContextDelta, RepositoryContext};
use crate::errors::{FacultyError, Result};
use crate::governor::{Clock, ResourceBudget, ResourceGovernor, SystemClock};
use crate::io::write_atomic;
use crate::oracle::{ForecastReport, Oracle, RitualResult, VisionSink};
use crate::report::{ConsultationMode, ConsultationReport, EarlyExit};
use crate::types::{AnalysisDepth, ConsultantRole, RoleSelection};
use crate::vision::{
    ArchiveLocation, ArchiveMetadata, Disposition, EnrichedContext, VisionArchive, VisionQueue,
    VisionRecord, VisionRequest,
};
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct ConsultOptions {
    pub roles: RoleSelection,
    pub depth: AnalysisDepth,
    /// Free-form label carried into the report
    pub scope: Option<String>,
    /// Overrides `budget.max_minutes`
    pub budget_minutes: Option<f64>,
    /// Previous snapshot for early exit
    pub baseline: Option<RepositoryContext>,
    /// Skip writing report files
    pub preview: bool,
    /// Overrides `storage.output_dir`
    pub output_dir: Option<PathBuf>,
    /// Ritual batch size; defaults to `oracle.ritual_max_items`
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsultationExit {
    Success,
    /// The governor stopped some work; the report is partial
    Constrained,
}

impl ConsultationExit {
    /// Process exit code for the CLI
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Constrained => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsultationOutcome {
    pub exit: ConsultationExit,
    pub report: ConsultationReport,
    /// Report files written (empty for previews)
    pub written: Vec<PathBuf>,
}

/// Ritual sink for preview engines: keeps records in memory only
#[derive(Debug, Default)]
pub struct ScratchArchive {
    records: Vec<VisionRecord>,
}

impl ScratchArchive {
    pub fn records(&self) -> &[VisionRecord] {
        &self.records
    }
}

impl VisionSink for ScratchArchive {
    fn archive(
        &mut self,
        request: &VisionRequest,
        enriched: &EnrichedContext,
        report: &ForecastReport,
    ) -> Result<ArchiveLocation> {
        let archive_id = format!("PREVIEW-{}", self.records.len() + 1);
        let data_path = format!("preview/{archive_id}.json");
        let report_path = format!("preview/{archive_id}.md");
        self.records.push(VisionRecord {
            request: request.clone(),
            enriched: enriched.clone(),
            forecast: report.clone(),
            metadata: ArchiveMetadata {
                archive_id: archive_id.clone(),
                data_path: data_path.clone(),
                report_path: report_path.clone(),
                archived_at: Utc::now(),
                disposition: Disposition::Pending,
                disposition_reason: None,
                resulting_changes: Vec::new(),
                disposition_updated_at: None,
                related_visions: Vec::new(),
            },
        });
        Ok(ArchiveLocation {
            archive_id,
            data_path: PathBuf::from(data_path),
            report_path: PathBuf::from(report_path),
        })
    }
}

/// The consultation engine
#[derive(Debug)]
pub struct FacultyEngine {
    config: FacultyConfig,
    cache: ResultCache,
    queue: VisionQueue,
    /// `None` for preview engines
    archive: Option<VisionArchive>,
    scratch: ScratchArchive,
    oracle: Oracle,
}

impl FacultyEngine {
    /// Open the persistent stores under `storage.state_dir`
    pub fn open(config: FacultyConfig) -> Result<Self> {
        config.validate()?;
        let storage = &config.storage;
        let cache = ResultCache::open(&storage.cache_db_path())?;
        let queue = VisionQueue::open(&storage.queue_db_path())?;
        let archive = VisionArchive::open(&storage.archive_root())?;
        tracing::info!(
            state_dir = %storage.resolved_state_dir().display(),
            "Faculty engine opened"
        );
        let oracle = Oracle::new(config.oracle.clone());
        Ok(Self {
            config,
            cache,
            queue,
            archive: Some(archive),
            scratch: ScratchArchive::default(),
            oracle,
        })
    }

    /// Engine over in-memory stores; nothing it does touches the disk
    pub fn preview(config: FacultyConfig) -> Result<Self> {
        config.validate()?;
        let oracle = Oracle::new(config.oracle.clone());
        Ok(Self {
            config,
            cache: ResultCache::in_memory()?,
            queue: VisionQueue::in_memory()?,
            archive: None,
            scratch: ScratchArchive::default(),
            oracle,
        })
    }

    pub fn config(&self) -> &FacultyConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn queue(&self) -> &VisionQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut VisionQueue {
        &mut self.queue
    }

    /// Persistent archive; `None` for preview engines
    pub fn archive(&self) -> Option<&VisionArchive> {
        self.archive.as_ref()
    }

    /// Records a preview ritual produced
    pub fn scratch_records(&self) -> &[VisionRecord] {
        self.scratch.records()
    }

    pub fn is_preview(&self) -> bool {
        self.archive.is_none()
    }

    /// Run the selected consultants on `context` under a fresh governor
    pub fn consult(
        &mut self,
        context: &RepositoryContext,
        options: &ConsultOptions,
    ) -> Result<ConsultationOutcome> {
        self.consult_with_clock(context, options, Box::new(SystemClock::start()))
    }

    /// [`Self::consult`] with a caller-supplied clock
    pub fn consult_with_clock(
        &mut self,
        context: &RepositoryContext,
        options: &ConsultOptions,
        clock: Box<dyn Clock>,
    ) -> Result<ConsultationOutcome> {
        let mut governor = ResourceGovernor::with_clock(self.budget_for(options)?, clock);
        let fingerprint = context.fingerprint()?;
        tracing::info!(
            project = %context.name(),
            roles = options.roles.as_str(),
            depth = options.depth.as_str(),
            fingerprint = %short(&fingerprint),
            "Consultation started"
        );

        let mut advisory: Option<AdvisoryReport> = None;
        let mut forecast: Option<ForecastReport> = None;
        let mut early_exit = None;
        let advisor = Advisor::new(self.config.advisor.clone()).with_depth(options.depth);
        let wants_advisor = options.roles.includes(ConsultantRole::Advisor);
        let wants_oracle = options.roles.includes(ConsultantRole::Oracle);

        if let Some(baseline) = &options.baseline {
            let delta = ContextDelta::between(baseline, context)?;
            if governor.should_exit_early(&delta) {
                let baseline_fp = baseline.fingerprint()?;
                let mut reused = Vec::new();
                if wants_advisor
                    && let Some(cached) = advisor.cached(&baseline_fp, &self.cache)?
                {
                    governor.record_cache_hit(ConsultantRole::Advisor);
                    advisory = Some(cached);
                    reused.push(ConsultantRole::Advisor);
                }
                if wants_oracle && let Some(cached) = Oracle::cached(&baseline_fp, &self.cache)? {
                    governor.record_cache_hit(ConsultantRole::Oracle);
                    forecast = Some(cached);
                    reused.push(ConsultantRole::Oracle);
                }
                early_exit = Some(EarlyExit {
                    baseline_fingerprint: baseline_fp,
                    changed_nodes: delta.changed_nodes,
                    total_nodes: delta.total_nodes,
                    change_ratio: delta.change_ratio(),
                    reused,
                });
            }
        }

        // Cached results for this exact context cost nothing, so they are
        // served even when the budget is already spent.
        if wants_advisor
            && advisory.is_none()
            && let Some(cached) = advisor.cached(&fingerprint, &self.cache)?
        {
            governor.record_cache_hit(ConsultantRole::Advisor);
            advisory = Some(cached);
        }
        if wants_oracle
            && forecast.is_none()
            && let Some(cached) = Oracle::cached(&fingerprint, &self.cache)?
        {
            governor.record_cache_hit(ConsultantRole::Oracle);
            forecast = Some(cached);
        }

        let needs_advisor = wants_advisor && advisory.is_none();
        let needs_oracle = wants_oracle && forecast.is_none();
        let mut enqueued = false;
        if needs_advisor || needs_oracle {
            if governor.should_proceed("faculty.consult") {
                if needs_advisor {
                    let report =
                        advisor.advise(context, &mut governor, &self.cache, &self.queue)?;
                    enqueued = !report.from_cache && !report.queued_visions().is_empty();
                    advisory = Some(report);
                }
                if needs_oracle {
                    forecast = Some(self.oracle.forecast(context, &mut governor, &self.cache)?);
                }
            } else {
                if needs_advisor {
                    governor.record_cache_miss(ConsultantRole::Advisor);
                }
                if needs_oracle {
                    governor.record_cache_miss(ConsultantRole::Oracle);
                }
            }
        }

        let telemetry = governor.generate_telemetry_report();
        let constrained = advisory.as_ref().is_some_and(|a| a.constrained)
            || forecast.as_ref().is_some_and(|f| f.constrained)
            || missing_role(options.roles, advisory.is_some(), forecast.is_some());

        let report = ConsultationReport {
            project: context.name().to_string(),
            context_fingerprint: fingerprint,
            mode: ConsultationMode::Consult,
            scope: options.scope.clone(),
            roles: options.roles,
            depth: options.depth,
            generated_at: Utc::now(),
            preview: self.is_preview() || options.preview,
            advisory,
            forecast,
            ritual: None,
            early_exit,
            constrained,
            stop_reasons: telemetry.stop_reasons.clone(),
            telemetry,
        };

        if enqueued {
            self.write_queue_markdown()?;
        }
        self.finish(report, options)
    }

    /// Drain queued visions into the archive under a fresh governor
    pub fn run_ritual(
        &mut self,
        context: &RepositoryContext,
        options: &ConsultOptions,
    ) -> Result<ConsultationOutcome> {
        self.run_ritual_with_clock(context, options, Box::new(SystemClock::start()))
    }

    /// [`Self::run_ritual`] with a caller-supplied clock
    pub fn run_ritual_with_clock(
        &mut self,
        context: &RepositoryContext,
        options: &ConsultOptions,
        clock: Box<dyn Clock>,
    ) -> Result<ConsultationOutcome> {
        let mut governor = ResourceGovernor::with_clock(self.budget_for(options)?, clock);
        let fingerprint = context.fingerprint()?;
        let max_items = options
            .max_items
            .unwrap_or(self.config.oracle.ritual_max_items);

        let sink: &mut dyn VisionSink = match self.archive.as_mut() {
            Some(archive) => archive,
            None => &mut self.scratch,
        };
        let ritual: RitualResult = self.oracle.process_vision_queue(
            context,
            max_items,
            &mut governor,
            &mut self.queue,
            sink,
        )?;

        let telemetry = governor.generate_telemetry_report();
        let report = ConsultationReport {
            project: context.name().to_string(),
            context_fingerprint: fingerprint,
            mode: ConsultationMode::Ritual,
            scope: options.scope.clone(),
            roles: RoleSelection::OracleOnly,
            depth: options.depth,
            generated_at: Utc::now(),
            preview: self.is_preview() || options.preview,
            advisory: None,
            forecast: None,
            constrained: ritual.is_constrained(),
            ritual: Some(ritual),
            early_exit: None,
            stop_reasons: telemetry.stop_reasons.clone(),
            telemetry,
        };

        self.write_queue_markdown()?;
        self.finish(report, options)
    }

    /// Regenerate `QUEUE.md` from the store (no-op for previews)
    pub fn write_queue_markdown(&self) -> Result<Option<PathBuf>> {
        if self.is_preview() {
            return Ok(None);
        }
        let path = self.config.storage.queue_markdown_path();
        let markdown = self.queue.render_markdown()?;
        write_atomic(&path, markdown.as_bytes()).map_err(|e| {
            FacultyError::queue_with_source(format!("failed to write {}", path.display()), e)
        })?;
        tracing::debug!(path = %path.display(), "Queue rendering written");
        Ok(Some(path))
    }

    fn budget_for(&self, options: &ConsultOptions) -> Result<ResourceBudget> {
        let mut budget = self.config.budget.clone();
        if let Some(minutes) = options.budget_minutes {
            budget = budget.with_max_minutes(minutes);
        }
        let problems = budget.problems();
        if !problems.is_empty() {
            return Err(FacultyError::config(format!(
                "invalid budget: {}",
                problems.join("; ")
            )));
        }
        Ok(budget)
    }

    fn finish(
        &self,
        report: ConsultationReport,
        options: &ConsultOptions,
    ) -> Result<ConsultationOutcome> {
        let exit = if report.constrained {
            ConsultationExit::Constrained
        } else {
            ConsultationExit::Success
        };

        let written = if report.preview {
            Vec::new()
        } else {
            let dir = options
                .output_dir
                .clone()
                .unwrap_or_else(|| self.config.storage.resolved_output_dir());
            write_report(&report, &dir)?
        };

        tracing::info!(
            project = %report.project,
            constrained = report.constrained,
            stop_reasons = report.stop_reasons.len(),
            files = written.len(),
            "Consultation finished"
        );
        Ok(ConsultationOutcome {
            exit,
            report,
            written,
        })
    }
}

/// A requested role produced nothing because the run was denied up front
fn missing_role(roles: RoleSelection, advisory: bool, forecast: bool) -> bool {
    (roles.includes(ConsultantRole::Advisor) && !advisory)
        || (roles.includes(ConsultantRole::Oracle) && !forecast)
}

fn write_report(report: &ConsultationReport, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| {
        FacultyError::internal_with_source(
            format!("failed to create output directory {}", dir.display()),
            e,
        )
    })?;
    let stem = report.file_stem();
    let md_path = dir.join(format!("{stem}.md"));
    let json_path = dir.join(format!("{stem}.json"));

    write_atomic(&md_path, report.to_markdown().as_bytes()).map_err(|e| {
        FacultyError::internal_with_source(format!("failed to write {}", md_path.display()), e)
    })?;
    write_atomic(&json_path, report.to_json()?.as_bytes()).map_err(|e| {
        FacultyError::internal_with_source(format!("failed to write {}", json_path.display()), e)
    })?;
    Ok(vec![md_path, json_path])
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::ManualClock;
    use crate::vision::VisionStatus;

    fn config(dir: &Path) -> FacultyConfig {
        let mut config = FacultyConfig::default();
        config.storage.state_dir = dir.to_string_lossy().into_owned();
        config
    }

    #[test]
    fn test_consult_writes_reports_and_queue() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut engine = FacultyEngine::open(config(dir.path())).expect("open");
        let outcome = engine
            .consult_with_clock(
                &RepositoryContext::new("demo"),
                &ConsultOptions::default(),
                Box::new(ManualClock::new()),
            )
            .expect("consult");

        assert_eq!(outcome.exit, ConsultationExit::Success);
        assert_eq!(outcome.written.len(), 2);
        for path in &outcome.written {
            assert!(path.starts_with(dir.path().join("reports")));
            assert!(path.exists());
        }
        assert!(outcome.report.advisory.is_some());
        assert!(outcome.report.forecast.is_some());
        assert!(dir.path().join("QUEUE.md").exists());
        assert!(engine.queue().status().expect("status").pending > 0);
    }

    #[test]
    fn test_preview_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut engine = FacultyEngine::preview(config(dir.path())).expect("preview");
        let outcome = engine
            .consult(&RepositoryContext::new("demo"), &ConsultOptions::default())
            .expect("consult");
        assert!(outcome.written.is_empty());
        assert!(outcome.report.preview);
        assert_eq!(std::fs::read_dir(dir.path()).expect("dir").count(), 0);
    }

    #[test]
    fn test_exhausted_budget_is_constrained() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut engine = FacultyEngine::preview(config(dir.path())).expect("preview");
        let clock = ManualClock::new();
        clock.set(std::time::Duration::from_secs(60));
        let options = ConsultOptions {
            budget_minutes: Some(1.0),
            ..ConsultOptions::default()
        };
        let outcome = engine
            .consult_with_clock(&RepositoryContext::new("demo"), &options, Box::new(clock))
            .expect("consult");
        assert_eq!(outcome.exit, ConsultationExit::Constrained);
        assert!(outcome.report.constrained);
        assert!(outcome.report.stop_reasons[0].contains("faculty.consult"));
    }

    #[test]
    fn test_cached_results_served_when_budget_spent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut engine = FacultyEngine::preview(config(dir.path())).expect("preview");
        let ctx = RepositoryContext::new("demo");
        let options = ConsultOptions {
            budget_minutes: Some(1.0),
            ..ConsultOptions::default()
        };
        let warm = engine
            .consult_with_clock(&ctx, &options, Box::new(ManualClock::new()))
            .expect("warm");
        assert_eq!(warm.exit, ConsultationExit::Success);

        let clock = ManualClock::new();
        clock.set(std::time::Duration::from_secs(60));
        let outcome = engine
            .consult_with_clock(&ctx, &options, Box::new(clock))
            .expect("consult");
        assert_eq!(outcome.exit, ConsultationExit::Success);
        assert!(outcome.report.advisory.as_ref().expect("advisory").from_cache);
        assert!(outcome.report.forecast.as_ref().expect("forecast").from_cache);
        assert_eq!(outcome.report.telemetry.cache_hits, 2);
        assert!(outcome.report.stop_reasons.is_empty());
    }

    #[test]
    fn test_budget_spent_without_cache_is_constrained_per_role() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut engine = FacultyEngine::preview(config(dir.path())).expect("preview");
        let ctx = RepositoryContext::new("demo");
        let warm = ConsultOptions {
            roles: RoleSelection::AdvisorOnly,
            ..ConsultOptions::default()
        };
        engine
            .consult_with_clock(&ctx, &warm, Box::new(ManualClock::new()))
            .expect("warm");

        let clock = ManualClock::new();
        clock.set(std::time::Duration::from_secs(600));
        let outcome = engine
            .consult_with_clock(&ctx, &ConsultOptions::default(), Box::new(clock))
            .expect("consult");
        assert_eq!(outcome.exit, ConsultationExit::Constrained);
        assert!(outcome.report.advisory.is_some());
        assert!(outcome.report.forecast.is_none());
        assert!(outcome.report.stop_reasons[0].contains("faculty.consult"));
    }

    #[test]
    fn test_invalid_budget_override() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut engine = FacultyEngine::preview(config(dir.path())).expect("preview");
        for minutes in [0.0, 1e300] {
            let options = ConsultOptions {
                budget_minutes: Some(minutes),
                ..ConsultOptions::default()
            };
            let err = engine
                .consult(&RepositoryContext::new("demo"), &options)
                .unwrap_err();
            assert_eq!(err.category(), crate::ErrorCategory::ConfigError);
        }
    }

    #[test]
    fn test_preview_ritual_uses_scratch_archive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut engine = FacultyEngine::preview(config(dir.path())).expect("preview");
        engine
            .queue()
            .enqueue(&VisionRequest::new(
                crate::vision::VisionTrigger::Manual,
                "Consider a plugin system",
            ))
            .expect("enqueue");

        let outcome = engine
            .run_ritual(&RepositoryContext::new("demo"), &ConsultOptions::default())
            .expect("ritual");
        let ritual = outcome.report.ritual.expect("ritual");
        assert_eq!(ritual.processed.len(), 1);
        assert_eq!(engine.scratch_records().len(), 1);
        let request = engine
            .queue()
            .list(Some(VisionStatus::Completed))
            .expect("list");
        assert_eq!(request.len(), 1);
        assert!(outcome.written.is_empty());
    }
}
