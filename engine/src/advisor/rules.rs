//! Declarative audit rule table.
//!
//! Each rule is a predicate over the repository context that returns the
//! evidence when it fires. Rules run in table order; that order also breaks
//! priority ties during critiquing.

use super::{ActionItem, AuditCategory, Effort, Impact};
use crate::context::RepositoryContext;

/// Files above this size are flagged for refactoring
pub const LARGE_FILE_LOC: usize = 1_000;

/// One audit heuristic
#[derive(Clone, Copy)]
pub struct AuditRule {
    pub id: &'static str,
    pub category: AuditCategory,
    pub title: &'static str,
    pub description: &'static str,
    pub priority: u8,
    pub impact: Impact,
    pub effort: Effort,
    /// Evidence when the rule fires
    pub check: fn(&RepositoryContext) -> Option<String>,
}

impl std::fmt::Debug for AuditRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRule")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl AuditRule {
    pub fn evaluate(&self, context: &RepositoryContext) -> Option<ActionItem> {
        let evidence = (self.check)(context)?;
        Some(ActionItem::from_rule(self, evidence))
    }
}

/// Rules for one category, in table order
pub fn rules_for(category: AuditCategory) -> impl Iterator<Item = &'static AuditRule> {
    AUDIT_RULES.iter().filter(move |r| r.category == category)
}

pub fn rule(id: &str) -> Option<&'static AuditRule> {
    AUDIT_RULES.iter().find(|r| r.id == id)
}

pub static AUDIT_RULES: &[AuditRule] = &[
    // Documentation
    AuditRule {
        id: "DOC-001",
        category: AuditCategory::Documentation,
        title: "Add a README",
        description: "Without a README, newcomers cannot tell what the project does or how to run it.",
        priority: 95,
        impact: Impact::High,
        effort: Effort::Low,
        check: missing_readme,
    },
    AuditRule {
        id: "DOC-002",
        category: AuditCategory::Documentation,
        title: "Start a developer log",
        description: "TLDL entries record why changes were made; without them context is lost between contributors.",
        priority: 80,
        impact: Impact::Medium,
        effort: Effort::Low,
        check: missing_dev_log,
    },
    AuditRule {
        id: "DOC-003",
        category: AuditCategory::Documentation,
        title: "Document the system architecture",
        description: "A codebase of this size needs an overview of its components and how they fit together.",
        priority: 65,
        impact: Impact::Medium,
        effort: Effort::Medium,
        check: missing_architecture_docs,
    },
    AuditRule {
        id: "DOC-004",
        category: AuditCategory::Documentation,
        title: "Add a LICENSE",
        description: "Unlicensed code cannot be safely reused or contributed to.",
        priority: 70,
        impact: Impact::High,
        effort: Effort::Low,
        check: missing_license,
    },
    AuditRule {
        id: "DOC-005",
        category: AuditCategory::Documentation,
        title: "Add contribution guidelines",
        description: "A CONTRIBUTING guide sets expectations for issues, branches and reviews.",
        priority: 55,
        impact: Impact::Medium,
        effort: Effort::Low,
        check: missing_contributing,
    },
    AuditRule {
        id: "DOC-006",
        category: AuditCategory::Documentation,
        title: "Keep a changelog",
        description: "A CHANGELOG tells users what changed between releases.",
        priority: 40,
        impact: Impact::Low,
        effort: Effort::Low,
        check: missing_changelog,
    },
    // Pipelines
    AuditRule {
        id: "CI-001",
        category: AuditCategory::Pipelines,
        title: "Set up continuous integration",
        description: "No workflow builds or tests changes before they merge.",
        priority: 85,
        impact: Impact::High,
        effort: Effort::Medium,
        check: missing_ci,
    },
    AuditRule {
        id: "CI-002",
        category: AuditCategory::Pipelines,
        title: "Run tests in CI",
        description: "Workflows exist but none of their jobs runs the test suite.",
        priority: 70,
        impact: Impact::High,
        effort: Effort::Medium,
        check: missing_test_job,
    },
    AuditRule {
        id: "CI-003",
        category: AuditCategory::Pipelines,
        title: "Validate pull requests",
        description: "No workflow is triggered by pull requests, so problems surface only after merge.",
        priority: 50,
        impact: Impact::Medium,
        effort: Effort::Low,
        check: missing_pr_trigger,
    },
    AuditRule {
        id: "CI-004",
        category: AuditCategory::Pipelines,
        title: "Add lint and format checks to CI",
        description: "Style drift is caught by reviewers instead of tooling.",
        priority: 45,
        impact: Impact::Low,
        effort: Effort::Low,
        check: missing_lint_job,
    },
    // Automation
    AuditRule {
        id: "AUTO-001",
        category: AuditCategory::Automation,
        title: "Automate dependency updates",
        description: "Dependencies age silently without an update bot.",
        priority: 50,
        impact: Impact::Medium,
        effort: Effort::Low,
        check: missing_dependabot,
    },
    AuditRule {
        id: "AUTO-002",
        category: AuditCategory::Automation,
        title: "Add pre-commit hooks",
        description: "Local hooks catch formatting and obvious mistakes before they reach CI.",
        priority: 40,
        impact: Impact::Low,
        effort: Effort::Low,
        check: missing_precommit,
    },
    AuditRule {
        id: "AUTO-003",
        category: AuditCategory::Automation,
        title: "Add a task runner",
        description: "A Makefile or justfile gives every contributor the same build and test commands.",
        priority: 35,
        impact: Impact::Low,
        effort: Effort::Low,
        check: missing_task_runner,
    },
    AuditRule {
        id: "AUTO-004",
        category: AuditCategory::Automation,
        title: "Automate releases",
        description: "Releases are cut by hand; no workflow publishes on tag or release.",
        priority: 30,
        impact: Impact::Medium,
        effort: Effort::Medium,
        check: missing_release_workflow,
    },
    // Security
    AuditRule {
        id: "SEC-001",
        category: AuditCategory::Security,
        title: "Remove committed secrets",
        description: "Files that look like credentials are checked in; rotate them and purge history.",
        priority: 92,
        impact: Impact::High,
        effort: Effort::Medium,
        check: suspected_secrets,
    },
    AuditRule {
        id: "SEC-002",
        category: AuditCategory::Security,
        title: "Commit dependency lockfiles",
        description: "Without lockfiles, builds resolve different dependency versions over time.",
        priority: 60,
        impact: Impact::Medium,
        effort: Effort::Low,
        check: missing_lockfiles,
    },
    AuditRule {
        id: "SEC-003",
        category: AuditCategory::Security,
        title: "Publish a security policy",
        description: "A SECURITY file tells reporters how to disclose vulnerabilities privately.",
        priority: 50,
        impact: Impact::Medium,
        effort: Effort::Low,
        check: missing_security_policy,
    },
    // Developer experience
    AuditRule {
        id: "DX-001",
        category: AuditCategory::DeveloperExperience,
        title: "Add a .gitignore",
        description: "Build output and editor files end up in commits.",
        priority: 45,
        impact: Impact::Medium,
        effort: Effort::Low,
        check: missing_gitignore,
    },
    AuditRule {
        id: "DX-002",
        category: AuditCategory::DeveloperExperience,
        title: "Add an .editorconfig",
        description: "Indentation and line endings vary by contributor.",
        priority: 25,
        impact: Impact::Low,
        effort: Effort::Low,
        check: missing_editorconfig,
    },
    AuditRule {
        id: "DX-003",
        category: AuditCategory::DeveloperExperience,
        title: "Provide a dev container",
        description: "A reproducible environment shortens setup for new contributors.",
        priority: 20,
        impact: Impact::Low,
        effort: Effort::Medium,
        check: missing_devcontainer,
    },
    AuditRule {
        id: "DX-004",
        category: AuditCategory::DeveloperExperience,
        title: "Adopt a code of conduct",
        description: "Sets expectations for behavior in issues and reviews.",
        priority: 20,
        impact: Impact::Low,
        effort: Effort::Low,
        check: missing_code_of_conduct,
    },
    // Technical debt
    AuditRule {
        id: "DEBT-001",
        category: AuditCategory::TechnicalDebt,
        title: "Pay down accumulated technical debt",
        description: "Debt markers have piled up to the point where they slow every change.",
        priority: 78,
        impact: Impact::High,
        effort: Effort::High,
        check: heavy_debt_markers,
    },
    AuditRule {
        id: "DEBT-002",
        category: AuditCategory::TechnicalDebt,
        title: "Triage outstanding TODO and FIXME markers",
        description: "Markers are accumulating; decide which become issues and which get deleted.",
        priority: 50,
        impact: Impact::Medium,
        effort: Effort::Medium,
        check: moderate_debt_markers,
    },
    AuditRule {
        id: "DEBT-003",
        category: AuditCategory::TechnicalDebt,
        title: "Expand automated test coverage",
        description: "Few test files relative to sources; regressions go unnoticed.",
        priority: 72,
        impact: Impact::High,
        effort: Effort::Medium,
        check: sparse_tests,
    },
    AuditRule {
        id: "DEBT-004",
        category: AuditCategory::TechnicalDebt,
        title: "Refactor oversized modules",
        description: "Very large files concentrate complexity and merge conflicts.",
        priority: 62,
        impact: Impact::High,
        effort: Effort::High,
        check: oversized_files,
    },
];

fn missing_readme(ctx: &RepositoryContext) -> Option<String> {
    (!ctx.documentation.has_readme).then(|| "No README found at the repository root".to_string())
}

fn missing_dev_log(ctx: &RepositoryContext) -> Option<String> {
    (ctx.documentation.dev_log_entries == 0).then(|| "No TLDL / dev-log entries found".to_string())
}

fn missing_architecture_docs(ctx: &RepositoryContext) -> Option<String> {
    let big = ctx.topology.total_files > 50 || ctx.topology.total_loc > 5_000;
    (big && ctx.documentation.architecture_docs == 0).then(|| {
        format!(
            "{} files / {} lines with no architecture documents",
            ctx.topology.total_files, ctx.topology.total_loc
        )
    })
}

fn missing_license(ctx: &RepositoryContext) -> Option<String> {
    (!ctx.documentation.has_license).then(|| "No LICENSE file".to_string())
}

fn missing_contributing(ctx: &RepositoryContext) -> Option<String> {
    (!ctx.documentation.has_contributing).then(|| "No CONTRIBUTING guide".to_string())
}

fn missing_changelog(ctx: &RepositoryContext) -> Option<String> {
    (!ctx.documentation.has_changelog).then(|| "No CHANGELOG".to_string())
}

fn missing_ci(ctx: &RepositoryContext) -> Option<String> {
    (ctx.workflow_count() == 0).then(|| "No CI/CD workflows found".to_string())
}

fn missing_test_job(ctx: &RepositoryContext) -> Option<String> {
    let workflows = ctx.workflow_count();
    (workflows > 0 && !ctx.has_job_matching(&["test", "check"]))
        .then(|| format!("{workflows} workflow(s), none with a test job"))
}

fn missing_pr_trigger(ctx: &RepositoryContext) -> Option<String> {
    let workflows = ctx.workflow_count();
    (workflows > 0 && !ctx.has_trigger(&["pull_request", "pull_request_target", "merge_group"]))
        .then(|| format!("{workflows} workflow(s), none triggered by pull requests"))
}

fn missing_lint_job(ctx: &RepositoryContext) -> Option<String> {
    let workflows = ctx.workflow_count();
    (workflows > 0 && !ctx.has_job_matching(&["lint", "clippy", "fmt", "format", "style"]))
        .then(|| format!("{workflows} workflow(s), none with a lint job"))
}

fn missing_dependabot(ctx: &RepositoryContext) -> Option<String> {
    (!ctx.code_signals.has_dependabot && !ctx.code_signals.dependency_manifests.is_empty()).then(
        || {
            format!(
                "{} dependency manifest(s) with no update automation",
                ctx.code_signals.dependency_manifests.len()
            )
        },
    )
}

fn missing_precommit(ctx: &RepositoryContext) -> Option<String> {
    (!ctx.code_signals.has_precommit).then(|| "No pre-commit configuration".to_string())
}

fn missing_task_runner(ctx: &RepositoryContext) -> Option<String> {
    (!ctx.code_signals.has_task_runner).then(|| "No Makefile, justfile or similar".to_string())
}

fn missing_release_workflow(ctx: &RepositoryContext) -> Option<String> {
    let workflows = ctx.workflow_count();
    let automated =
        ctx.has_trigger(&["release", "tag"]) || ctx.has_job_matching(&["release", "publish"]);
    (workflows > 0 && !automated).then(|| "No workflow runs on release or tag".to_string())
}

fn suspected_secrets(ctx: &RepositoryContext) -> Option<String> {
    let count = ctx.code_signals.suspected_secrets;
    (count > 0).then(|| format!("{count} file(s) look like committed credentials"))
}

fn missing_lockfiles(ctx: &RepositoryContext) -> Option<String> {
    let signals = &ctx.code_signals;
    (!signals.dependency_manifests.is_empty() && signals.lockfiles.is_empty()).then(|| {
        format!(
            "Manifests without lockfiles: {}",
            signals.dependency_manifests.join(", ")
        )
    })
}

fn missing_security_policy(ctx: &RepositoryContext) -> Option<String> {
    (!ctx.documentation.has_security_policy).then(|| "No SECURITY policy".to_string())
}

fn missing_gitignore(ctx: &RepositoryContext) -> Option<String> {
    (!ctx.code_signals.has_gitignore).then(|| "No .gitignore".to_string())
}

fn missing_editorconfig(ctx: &RepositoryContext) -> Option<String> {
    (!ctx.code_signals.has_editorconfig).then(|| "No .editorconfig".to_string())
}

fn missing_devcontainer(ctx: &RepositoryContext) -> Option<String> {
    (!ctx.code_signals.has_devcontainer).then(|| "No devcontainer configuration".to_string())
}

fn missing_code_of_conduct(ctx: &RepositoryContext) -> Option<String> {
    (!ctx.documentation.has_code_of_conduct).then(|| "No CODE_OF_CONDUCT".to_string())
}

fn heavy_debt_markers(ctx: &RepositoryContext) -> Option<String> {
    let markers = ctx.code_signals.debt_markers();
    (markers > 100).then(|| debt_evidence(ctx))
}

fn moderate_debt_markers(ctx: &RepositoryContext) -> Option<String> {
    let markers = ctx.code_signals.debt_markers();
    (markers > 25 && markers <= 100).then(|| debt_evidence(ctx))
}

fn debt_evidence(ctx: &RepositoryContext) -> String {
    let s = &ctx.code_signals;
    format!(
        "{} TODO, {} FIXME, {} HACK markers",
        s.todo_count, s.fixme_count, s.hack_count
    )
}

fn sparse_tests(ctx: &RepositoryContext) -> Option<String> {
    let s = &ctx.code_signals;
    (s.source_files >= 10 && s.test_ratio() < 0.1).then(|| {
        format!(
            "{} test file(s) for {} source file(s)",
            s.test_files, s.source_files
        )
    })
}

fn oversized_files(ctx: &RepositoryContext) -> Option<String> {
    let large: Vec<String> = ctx
        .code_signals
        .large_files
        .iter()
        .filter(|f| f.loc > LARGE_FILE_LOC)
        .map(|f| format!("{} ({} lines)", f.path, f.loc))
        .collect();
    (!large.is_empty()).then(|| large.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FileSignal, WorkflowInfo};
    use std::collections::HashSet;

    fn fires(id: &str, ctx: &RepositoryContext) -> bool {
        rule(id).expect("rule exists").evaluate(ctx).is_some()
    }

    fn workflow(jobs: &[&str], triggers: &[&str]) -> WorkflowInfo {
        WorkflowInfo {
            name: "ci".to_string(),
            path: ".github/workflows/ci.yml".to_string(),
            triggers: triggers.iter().map(ToString::to_string).collect(),
            jobs: jobs.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_rule_ids_unique_and_priorities_in_range() {
        let mut seen = HashSet::new();
        for rule in AUDIT_RULES {
            assert!(seen.insert(rule.id), "duplicate rule id {}", rule.id);
            assert!(rule.priority <= 100);
        }
        for category in AuditCategory::all() {
            assert!(rules_for(category).count() > 0, "{category:?} has no rules");
        }
    }

    #[test]
    fn test_missing_top_level_docs() {
        let ctx = RepositoryContext::new("bare");
        assert!(fires("DOC-001", &ctx));
        assert!(fires("DOC-002", &ctx));
        let item = rule("DOC-001").expect("rule").evaluate(&ctx).expect("item");
        assert_eq!(item.priority, 95);

        let mut documented = ctx.clone();
        documented.documentation.has_readme = true;
        documented.documentation.dev_log_entries = 2;
        assert!(!fires("DOC-001", &documented));
        assert!(!fires("DOC-002", &documented));
    }

    #[test]
    fn test_architecture_docs_only_for_large_codebases() {
        let mut ctx = RepositoryContext::new("small");
        ctx.topology.total_files = 10;
        assert!(!fires("DOC-003", &ctx));
        ctx.topology.total_loc = 20_000;
        assert!(fires("DOC-003", &ctx));
        ctx.documentation.architecture_docs = 1;
        assert!(!fires("DOC-003", &ctx));
    }

    #[test]
    fn test_pipeline_rules() {
        let mut ctx = RepositoryContext::new("ci");
        assert!(fires("CI-001", &ctx));
        assert!(!fires("CI-002", &ctx));

        ctx.pipelines.workflows.push(workflow(&["build"], &["push"]));
        assert!(!fires("CI-001", &ctx));
        assert!(fires("CI-002", &ctx));
        assert!(fires("CI-003", &ctx));
        assert!(fires("CI-004", &ctx));

        ctx.pipelines.workflows[0] = workflow(&["Test", "clippy"], &["push", "pull_request"]);
        assert!(!fires("CI-002", &ctx));
        assert!(!fires("CI-003", &ctx));
        assert!(!fires("CI-004", &ctx));
    }

    #[test]
    fn test_automation_rules() {
        let mut ctx = RepositoryContext::new("auto");
        assert!(!fires("AUTO-001", &ctx));
        ctx.code_signals.dependency_manifests = vec!["Cargo.toml".to_string()];
        assert!(fires("AUTO-001", &ctx));
        ctx.code_signals.has_dependabot = true;
        assert!(!fires("AUTO-001", &ctx));

        assert!(!fires("AUTO-004", &ctx));
        ctx.pipelines.workflows.push(workflow(&["test"], &["push"]));
        assert!(fires("AUTO-004", &ctx));
        ctx.pipelines.workflows.push(workflow(&["publish"], &["release"]));
        assert!(!fires("AUTO-004", &ctx));
    }

    #[test]
    fn test_security_rules() {
        let mut ctx = RepositoryContext::new("sec");
        assert!(!fires("SEC-001", &ctx));
        ctx.code_signals.suspected_secrets = 2;
        let item = rule("SEC-001").expect("rule").evaluate(&ctx).expect("item");
        assert!(item.evidence.contains("2 file(s)"));

        ctx.code_signals.dependency_manifests = vec!["package.json".to_string()];
        assert!(fires("SEC-002", &ctx));
        ctx.code_signals.lockfiles = vec!["package-lock.json".to_string()];
        assert!(!fires("SEC-002", &ctx));
    }

    #[test]
    fn test_developer_experience_rules() {
        let mut ctx = RepositoryContext::new("dx");
        assert!(fires("DX-001", &ctx));
        assert!(fires("DX-002", &ctx));
        ctx.code_signals.has_gitignore = true;
        ctx.code_signals.has_editorconfig = true;
        assert!(!fires("DX-001", &ctx));
        assert!(!fires("DX-002", &ctx));
    }

    #[test]
    fn test_debt_rules_are_exclusive() {
        let mut ctx = RepositoryContext::new("debt");
        ctx.code_signals.todo_count = 30;
        assert!(!fires("DEBT-001", &ctx));
        assert!(fires("DEBT-002", &ctx));

        ctx.code_signals.fixme_count = 80;
        assert!(fires("DEBT-001", &ctx));
        assert!(!fires("DEBT-002", &ctx));
    }

    #[test]
    fn test_sparse_tests_and_oversized_files() {
        let mut ctx = RepositoryContext::new("tests");
        ctx.code_signals.source_files = 40;
        ctx.code_signals.test_files = 2;
        assert!(fires("DEBT-003", &ctx));
        ctx.code_signals.test_files = 8;
        assert!(!fires("DEBT-003", &ctx));

        ctx.code_signals.large_files = vec![
            FileSignal {
                path: "src/big.rs".to_string(),
                loc: 2_400,
            },
            FileSignal {
                path: "src/ok.rs".to_string(),
                loc: 600,
            },
        ];
        let item = rule("DEBT-004").expect("rule").evaluate(&ctx).expect("item");
        assert_eq!(item.evidence, "src/big.rs (2400 lines)");
    }
}
