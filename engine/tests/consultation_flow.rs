//! End-to-end consultation runs over persistent stores.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;
use std::time::Duration;

use faculty_engine::context::WorkflowInfo;
use faculty_engine::governor::ManualClock;
use faculty_engine::{
    AnalysisDepth, ConsultOptions, ConsultantRole, ConsultationExit, FacultyConfig,
    FacultyEngine, RepositoryContext, ResourceBudget, ResourceGovernor, ResultCache,
    RoleSelection,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn config(state: &Path) -> FacultyConfig {
    let mut config = FacultyConfig::default();
    config.storage.state_dir = state.to_string_lossy().into_owned();
    config
}

fn established_context() -> RepositoryContext {
    let mut ctx = RepositoryContext::new("established");
    ctx.topology.total_files = 240;
    ctx.topology.total_loc = 36_000;
    for (lang, files) in [("rust", 180), ("toml", 20), ("yaml", 12), ("markdown", 28)] {
        ctx.topology.languages.insert(lang.to_string(), files);
    }
    ctx.documentation.has_readme = true;
    ctx.documentation.has_license = true;
    ctx.documentation.dev_log_entries = 4;
    ctx.pipelines.workflows.push(WorkflowInfo {
        name: "ci".to_string(),
        path: ".github/workflows/ci.yml".to_string(),
        triggers: vec!["push".to_string(), "pull_request".to_string()],
        jobs: vec!["test".to_string(), "clippy".to_string()],
    });
    ctx.code_signals.source_files = 150;
    ctx.code_signals.test_files = 30;
    ctx.code_signals.todo_count = 12;
    ctx
}

fn run(
    engine: &mut FacultyEngine,
    ctx: &RepositoryContext,
    options: &ConsultOptions,
) -> ConsultationExit {
    engine
        .consult_with_clock(ctx, options, Box::new(ManualClock::new()))
        .expect("consult")
        .exit
}

#[test]
fn zero_workflows_and_no_dev_log_yield_high_priority_item() {
    let dir = TempDir::new().expect("tempdir");
    let mut engine = FacultyEngine::open(config(dir.path())).expect("open");
    let mut ctx = RepositoryContext::new("fresh");
    ctx.documentation.has_readme = true;

    let outcome = engine
        .consult(&ctx, &ConsultOptions::default())
        .expect("consult");
    let advisory = outcome.report.advisory.expect("advisory");
    let top = &advisory.items[0];
    assert!(top.priority >= 80);
    assert_eq!(top.id, "CI-001");
    assert!(top.oracle_queued);
}

#[test]
fn second_run_is_served_from_cache() {
    let dir = TempDir::new().expect("tempdir");
    let mut engine = FacultyEngine::open(config(dir.path())).expect("open");
    let ctx = established_context();
    let options = ConsultOptions::default();

    let first = engine
        .consult_with_clock(&ctx, &options, Box::new(ManualClock::new()))
        .expect("first");
    let pending_after_first = engine.queue().status().expect("status").pending;

    let second = engine
        .consult_with_clock(&ctx, &options, Box::new(ManualClock::new()))
        .expect("second");
    let advisory = second.report.advisory.expect("advisory");
    let forecast = second.report.forecast.expect("forecast");
    assert!(advisory.from_cache);
    assert!(forecast.from_cache);
    assert_eq!(advisory.items, first.report.advisory.expect("advisory").items);
    assert_eq!(second.report.telemetry.cache_hits, 2);
    assert_eq!(
        engine.queue().status().expect("status").pending,
        pending_after_first
    );
}

#[test]
fn trivial_delta_reuses_baseline_results() {
    let dir = TempDir::new().expect("tempdir");
    let mut engine = FacultyEngine::open(config(dir.path())).expect("open");
    let baseline = established_context();
    assert_eq!(
        run(&mut engine, &baseline, &ConsultOptions::default()),
        ConsultationExit::Success
    );

    let mut current = baseline.clone();
    current.code_signals.todo_count += 1;
    let options = ConsultOptions {
        baseline: Some(baseline.clone()),
        ..ConsultOptions::default()
    };
    let outcome = engine
        .consult_with_clock(&current, &options, Box::new(ManualClock::new()))
        .expect("consult");

    let early = outcome.report.early_exit.as_ref().expect("early exit");
    assert_eq!(early.changed_nodes, 1);
    assert_eq!(
        early.reused,
        vec![ConsultantRole::Advisor, ConsultantRole::Oracle]
    );
    assert_eq!(early.baseline_fingerprint, baseline.fingerprint().expect("fp"));
    assert_eq!(outcome.report.telemetry.early_exits, 1);
    assert!(outcome.report.to_markdown().contains("Early exit"));
}

#[test]
fn material_delta_recomputes() {
    let dir = TempDir::new().expect("tempdir");
    let mut engine = FacultyEngine::open(config(dir.path())).expect("open");
    let baseline = established_context();
    run(&mut engine, &baseline, &ConsultOptions::default());

    let mut current = RepositoryContext::new("established");
    current.code_signals.suspected_secrets = 3;
    let options = ConsultOptions {
        baseline: Some(baseline),
        ..ConsultOptions::default()
    };
    let outcome = engine
        .consult_with_clock(&current, &options, Box::new(ManualClock::new()))
        .expect("consult");
    assert!(outcome.report.early_exit.is_none());
    let advisory = outcome.report.advisory.expect("advisory");
    assert!(!advisory.from_cache);
    assert!(advisory.items.iter().any(|i| i.id == "SEC-001"));
}

#[test]
fn role_selection_and_depth_are_honored() {
    let dir = TempDir::new().expect("tempdir");
    let mut engine = FacultyEngine::open(config(dir.path())).expect("open");
    let options = ConsultOptions {
        roles: RoleSelection::AdvisorOnly,
        depth: AnalysisDepth::Quick,
        scope: Some("docs sweep".to_string()),
        ..ConsultOptions::default()
    };
    let outcome = engine
        .consult(&RepositoryContext::new("quick"), &options)
        .expect("consult");
    assert!(outcome.report.forecast.is_none());
    let advisory = outcome.report.advisory.expect("advisory");
    assert_eq!(advisory.categories_audited.len(), 3);
    assert_eq!(outcome.report.scope.as_deref(), Some("docs sweep"));
}

#[test]
fn soft_stop_mid_run_produces_constrained_report_on_disk() {
    let dir = TempDir::new().expect("tempdir");
    let mut engine = FacultyEngine::open(config(dir.path())).expect("open");
    let clock = ManualClock::new();
    clock.set(Duration::from_secs(8 * 60));

    let outcome = engine
        .consult_with_clock(
            &established_context(),
            &ConsultOptions::default(),
            Box::new(clock),
        )
        .expect("constrained is not an error");
    assert_eq!(outcome.exit, ConsultationExit::Constrained);
    assert!(outcome.report.stop_reasons[0].contains("soft stop"));
    assert_eq!(outcome.written.len(), 2);
    let markdown = std::fs::read_to_string(&outcome.written[0]).expect("report");
    assert!(markdown.contains("Constrained"));
}

#[test]
fn different_contexts_never_share_cached_results() {
    let cache = ResultCache::in_memory().expect("cache");
    let a = established_context();
    let mut b = established_context();
    b.topology.total_loc += 1;
    let fa = ResultCache::fingerprint(&a).expect("fp");
    let fb = ResultCache::fingerprint(&b).expect("fp");
    assert_ne!(fa, fb);

    cache
        .put(&fa, ConsultantRole::Oracle, &"forecast for a".to_string())
        .expect("put");
    assert_eq!(
        cache.get::<String>(&fa, ConsultantRole::Oracle).expect("get"),
        Some("forecast for a".to_string())
    );
    assert_eq!(cache.get::<String>(&fb, ConsultantRole::Oracle).expect("get"), None);
    assert_eq!(cache.get::<String>(&fa, ConsultantRole::Advisor).expect("get"), None);
}

#[test]
fn governor_denies_exactly_at_soft_stop() {
    let budget = ResourceBudget::default().with_max_minutes(10.0);
    for (seconds, expected) in [(0, true), (479, true), (480, false), (600, false)] {
        let clock = ManualClock::new();
        clock.set(Duration::from_secs(seconds));
        let mut governor = ResourceGovernor::with_clock(budget.clone(), Box::new(clock));
        assert_eq!(governor.should_proceed("faculty.consult"), expected, "at {seconds}s");
    }
}
