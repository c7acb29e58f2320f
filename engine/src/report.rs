//! Report rendering: per-consultant sections and the consolidated
//! consultation report written at the end of a run.

use crate::advisor::AdvisoryReport;
use crate::errors::{FacultyError, Result};
use crate::governor::TelemetrySummary;
use crate::oracle::{ForecastReport, RitualResult};
use crate::types::{AnalysisDepth, ConsultantRole, RoleSelection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

impl AdvisoryReport {
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("## Advisory\n\n");
        out.push_str(&format!(
            "**Depth:** {} | **Categories:** {} | **Findings:** {} | **Shown:** {}",
            self.depth.as_str(),
            self.categories_audited.len(),
            self.findings_total,
            self.items.len()
        ));
        if self.from_cache {
            out.push_str(" | _cached_");
        }
        out.push_str("\n\n");

        if self.constrained {
            out.push_str(&format!(
                "> Constrained: {}\n\n",
                self.stop_reason.as_deref().unwrap_or("budget denied")
            ));
        }

        if self.items.is_empty() {
            out.push_str("_No findings._\n");
            return out;
        }

        out.push_str("| Priority | Id | Category | Action | Impact | Effort | Vision |\n");
        out.push_str("|----------|----|----------|--------|--------|--------|--------|\n");
        for item in &self.items {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} |\n",
                item.priority,
                item.id,
                item.category.display_name(),
                item.title,
                item.impact.as_str(),
                item.effort.as_str(),
                item.vision_id.as_deref().unwrap_or("-"),
            ));
        }

        out.push_str("\n### Evidence\n\n");
        for item in &self.items {
            out.push_str(&format!(
                "- **{}** {}: {}\n",
                item.id, item.description, item.evidence
            ));
        }
        out
    }
}

impl ForecastReport {
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("## Forecast\n\n");
        let b = &self.maturity.breakdown;
        out.push_str(&format!(
            "**Maturity:** {}/100 ({})",
            self.maturity.score, self.maturity.bucket
        ));
        if self.from_cache {
            out.push_str(" | _cached_");
        }
        out.push_str("\n\n");
        out.push_str(&format!(
            "Pipelines {} · Documentation {} · Configuration {} · Code volume {} · Languages {}\n\n",
            b.pipelines, b.documentation, b.configuration, b.code_volume, b.languages
        ));

        if self.constrained {
            out.push_str(&format!(
                "> Constrained: {}\n\n",
                self.stop_reason.as_deref().unwrap_or("budget denied")
            ));
        }

        if !self.profile.strengths.is_empty() {
            out.push_str(&format!(
                "**Strengths:** {}\n\n",
                self.profile.strengths.join(", ")
            ));
        }
        if !self.profile.gaps.is_empty() {
            out.push_str(&format!("**Gaps:** {}\n\n", self.profile.gaps.join(", ")));
        }

        for scenario in &self.scenarios {
            out.push_str(&format!(
                "### {} ({:.0}%, {})\n\n",
                scenario.name,
                scenario.probability * 100.0,
                scenario.timeframe
            ));
            if !scenario.trajectory.is_empty() {
                out.push_str("**Trajectory:**\n");
                for (step, milestone) in scenario.trajectory.iter().enumerate() {
                    out.push_str(&format!("{}. {milestone}\n", step + 1));
                }
                out.push('\n');
            }
            for (label, entries) in [
                ("Prerequisites", &scenario.prerequisites),
                ("Risks", &scenario.risks),
                ("Indicators", &scenario.indicators),
                ("Outcomes", &scenario.outcomes),
            ] {
                if entries.is_empty() {
                    continue;
                }
                out.push_str(&format!("**{label}:**\n"));
                for entry in entries {
                    out.push_str(&format!("- {entry}\n"));
                }
                out.push('\n');
            }
        }
        out
    }
}

impl RitualResult {
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("## Vision Ritual\n\n");
        out.push_str(&format!(
            "**Processed:** {} | **Failed:** {} | **Reclaimed:** {} | **Stopped:** {}\n\n",
            self.processed.len(),
            self.failed.len(),
            self.reclaimed.len(),
            self.stop.describe()
        ));

        if !self.processed.is_empty() {
            out.push_str("| Vision | Priority | Reason | Archive | Headline |\n");
            out.push_str("|--------|----------|--------|---------|----------|\n");
            for item in &self.processed {
                out.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    item.vision_id,
                    item.priority,
                    item.trigger_reason.replace('|', "\\|"),
                    item.archive_id,
                    item.headline.as_deref().unwrap_or("-"),
                ));
            }
            out.push('\n');
        }

        if !self.failed.is_empty() {
            out.push_str("### Failures\n\n");
            for failure in &self.failed {
                out.push_str(&format!("- {}: {}\n", failure.vision_id, failure.error));
            }
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationMode {
    Consult,
    Ritual,
}

/// Results reused because the context barely changed since the baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyExit {
    pub baseline_fingerprint: String,
    pub changed_nodes: usize,
    pub total_nodes: usize,
    pub change_ratio: f64,
    /// Roles whose baseline result was found in the cache
    pub reused: Vec<ConsultantRole>,
}

/// Everything one run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationReport {
    pub project: String,
    pub context_fingerprint: String,
    pub mode: ConsultationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub roles: RoleSelection,
    pub depth: AnalysisDepth,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub preview: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory: Option<AdvisoryReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<ForecastReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ritual: Option<RitualResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_exit: Option<EarlyExit>,
    pub constrained: bool,
    #[serde(default)]
    pub stop_reasons: Vec<String>,
    pub telemetry: TelemetrySummary,
}

impl ConsultationReport {
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let title = match self.mode {
            ConsultationMode::Consult => "Consultation",
            ConsultationMode::Ritual => "Vision Ritual",
        };
        out.push_str(&format!("# {title}: {}\n\n", self.project));
        out.push_str(&format!(
            "**Generated:** {} | **Roles:** {} | **Depth:** {}",
            self.generated_at.format("%Y-%m-%d %H:%M UTC"),
            self.roles.as_str(),
            self.depth.as_str()
        ));
        if let Some(scope) = &self.scope {
            out.push_str(&format!(" | **Scope:** {scope}"));
        }
        out.push_str("\n\n");
        out.push_str(&format!(
            "**Context:** `{}`\n\n",
            self.context_fingerprint
                .get(..12)
                .unwrap_or(&self.context_fingerprint)
        ));

        if self.preview {
            out.push_str("> Preview: nothing was persisted.\n\n");
        }
        if self.constrained {
            out.push_str("> **Constrained:** the run stopped before completing all work.\n\n");
        }

        if let Some(early) = &self.early_exit {
            out.push_str(&format!(
                "> Early exit: {} of {} context nodes changed ({:.1}%) since baseline `{}`; reused {}.\n\n",
                early.changed_nodes,
                early.total_nodes,
                early.change_ratio * 100.0,
                early.baseline_fingerprint.get(..12).unwrap_or(&early.baseline_fingerprint),
                if early.reused.is_empty() {
                    "nothing".to_string()
                } else {
                    early
                        .reused
                        .iter()
                        .map(ConsultantRole::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                }
            ));
        }

        if let Some(advisory) = &self.advisory {
            out.push_str(&advisory.to_markdown());
            out.push('\n');
        }
        if let Some(forecast) = &self.forecast {
            out.push_str(&forecast.to_markdown());
        }
        if let Some(ritual) = &self.ritual {
            out.push_str(&ritual.to_markdown());
        }

        out.push_str(&self.telemetry.to_markdown());
        out
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FacultyError::internal_with_source("failed to encode consultation report", e))
    }

    /// Base file name: `consultation-<timestamp>` or `ritual-<timestamp>`
    pub fn file_stem(&self) -> String {
        let prefix = match self.mode {
            ConsultationMode::Consult => "consultation",
            ConsultationMode::Ritual => "ritual",
        };
        format!("{prefix}-{}", self.generated_at.format("%Y%m%d-%H%M%S-%3f"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::Advisor;
    use crate::cache::ResultCache;
    use crate::config::AdvisorConfig;
    use crate::context::RepositoryContext;
    use crate::governor::{ManualClock, ResourceBudget, ResourceGovernor};
    use crate::oracle::Oracle;
    use crate::vision::VisionQueue;

    fn sample() -> ConsultationReport {
        let ctx = RepositoryContext::new("demo");
        let cache = ResultCache::in_memory().expect("cache");
        let queue = VisionQueue::in_memory().expect("queue");
        let mut governor =
            ResourceGovernor::with_clock(ResourceBudget::default(), Box::new(ManualClock::new()));
        let advisory = Advisor::new(AdvisorConfig::default())
            .advise(&ctx, &mut governor, &cache, &queue)
            .expect("advise");
        let forecast = Oracle::default()
            .forecast(&ctx, &mut governor, &cache)
            .expect("forecast");

        ConsultationReport {
            project: "demo".to_string(),
            context_fingerprint: advisory.context_fingerprint.clone(),
            mode: ConsultationMode::Consult,
            scope: Some("quarterly".to_string()),
            roles: RoleSelection::Both,
            depth: AnalysisDepth::Standard,
            generated_at: Utc::now(),
            preview: false,
            advisory: Some(advisory),
            forecast: Some(forecast),
            ritual: None,
            early_exit: None,
            constrained: false,
            stop_reasons: Vec::new(),
            telemetry: governor.generate_telemetry_report(),
        }
    }

    #[test]
    fn test_markdown_has_role_sections_and_telemetry() {
        let md = sample().to_markdown();
        assert!(md.starts_with("# Consultation: demo"));
        assert!(md.contains("**Scope:** quarterly"));
        assert!(md.contains("## Advisory"));
        assert!(md.contains("DOC-001"));
        assert!(md.contains("## Forecast"));
        assert!(md.contains("**Trajectory:**\n1. Stabilize the base: No CI/CD workflows"));
        assert!(md.contains("## Telemetry"));
        assert!(!md.contains("Constrained"));
    }

    #[test]
    fn test_json_round_trips() {
        let report = sample();
        let json = report.to_json().expect("json");
        let back: ConsultationReport = serde_json::from_str(&json).expect("decode");
        assert_eq!(back.advisory, report.advisory);
        assert_eq!(back.mode, ConsultationMode::Consult);
    }

    #[test]
    fn test_constrained_advisory_shows_reason() {
        let mut report = sample();
        if let Some(advisory) = report.advisory.as_mut() {
            advisory.constrained = true;
            advisory.stop_reason = Some("advisor.audit.security: soft stop reached".to_string());
        }
        let md = report.advisory.expect("advisory").to_markdown();
        assert!(md.contains("> Constrained: advisor.audit.security: soft stop reached"));
    }

    #[test]
    fn test_file_stem_prefix() {
        let mut report = sample();
        assert!(report.file_stem().starts_with("consultation-"));
        report.mode = ConsultationMode::Ritual;
        assert!(report.file_stem().starts_with("ritual-"));
    }
}
