//! Future scenario generation.
//!
//! Every forecast considers the same three archetypes. Probabilities come
//! from a base value per archetype plus a maturity modifier, clamped to
//! [0.1, 0.9]. Narrative fields are derived from the maturity bucket and the
//! context's gaps and strengths; nothing here is random.

use super::maturity::{MaturityAssessment, MaturityBucket};
use crate::context::RepositoryContext;
use crate::vision::EnrichedContext;
use serde::{Deserialize, Serialize};

pub const MIN_PROBABILITY: f64 = 0.1;
pub const MAX_PROBABILITY: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    Growth,
    Optimization,
    Transformation,
}

impl Archetype {
    pub fn all() -> [Self; 3] {
        [Self::Growth, Self::Optimization, Self::Transformation]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Growth => "growth",
            Self::Optimization => "optimization",
            Self::Transformation => "transformation",
        }
    }

    pub fn base_probability(&self) -> f64 {
        match self {
            Self::Growth => 0.7,
            Self::Optimization => 0.5,
            Self::Transformation => 0.3,
        }
    }

    pub fn timeframe(&self) -> &'static str {
        match self {
            Self::Growth => "6-12 months",
            Self::Optimization => "3-6 months",
            Self::Transformation => "12-24 months",
        }
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability adjustment by maturity.
///
/// Young projects grow; mature ones optimize or transform.
pub fn maturity_modifier(archetype: Archetype, bucket: MaturityBucket) -> f64 {
    use Archetype::*;
    use MaturityBucket::*;
    match (archetype, bucket) {
        (Growth, Early) => 0.1,
        (Growth, Developing) => 0.0,
        (Growth, Mature) => -0.1,
        (Optimization, Early) => -0.2,
        (Optimization, Developing) => 0.1,
        (Optimization, Mature) => 0.2,
        (Transformation, Early) => -0.1,
        (Transformation, Developing) => 0.0,
        (Transformation, Mature) => 0.1,
    }
}

/// Clamped probability, rounded to two decimals
pub fn scenario_probability(archetype: Archetype, bucket: MaturityBucket) -> f64 {
    let raw = archetype.base_probability() + maturity_modifier(archetype, bucket);
    let rounded = (raw * 100.0).round() / 100.0;
    rounded.clamp(MIN_PROBABILITY, MAX_PROBABILITY)
}

/// One weighted future
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub archetype: Archetype,
    pub name: String,
    /// In [0.1, 0.9]
    pub probability: f64,
    pub timeframe: String,
    /// Ordered milestones, first to last
    pub trajectory: Vec<String>,
    pub prerequisites: Vec<String>,
    pub risks: Vec<String>,
    pub indicators: Vec<String>,
    pub outcomes: Vec<String>,
}

/// Gaps and strengths read off a context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextProfile {
    pub gaps: Vec<String>,
    pub strengths: Vec<String>,
}

pub fn profile_context(context: &RepositoryContext) -> ContextProfile {
    let docs = &context.documentation;
    let signals = &context.code_signals;
    let workflows = context.workflow_count();
    let mut gaps = Vec::new();
    let mut strengths = Vec::new();

    if workflows == 0 {
        gaps.push("No CI/CD workflows".to_string());
    } else if workflows >= 4 {
        strengths.push(format!("Broad CI/CD coverage ({workflows} workflows)"));
    }
    if !docs.has_readme {
        gaps.push("No README".to_string());
    }
    if docs.signal_count() >= 5 {
        strengths.push("Well-documented project".to_string());
    }
    if docs.dev_log_entries == 0 {
        gaps.push("No developer log".to_string());
    } else {
        strengths.push(format!(
            "Active developer log ({} entries)",
            docs.dev_log_entries
        ));
    }
    if signals.source_files > 0 {
        let ratio = signals.test_ratio();
        if ratio < 0.1 {
            gaps.push("Sparse automated tests".to_string());
        } else if ratio >= 0.3 {
            strengths.push("Healthy test-to-source ratio".to_string());
        }
    }
    let debt = signals.debt_markers();
    if debt > 50 {
        gaps.push(format!("Heavy technical-debt markers ({debt})"));
    }
    if signals.suspected_secrets > 0 {
        gaps.push("Possible committed secrets".to_string());
    }
    if signals.has_dependabot {
        strengths.push("Automated dependency updates".to_string());
    }
    if context.language_count() >= 3 {
        strengths.push(format!(
            "Polyglot codebase ({} languages)",
            context.language_count()
        ));
    }

    ContextProfile { gaps, strengths }
}

/// Build all three scenarios for a context
pub fn generate_scenarios(
    context: &RepositoryContext,
    maturity: &MaturityAssessment,
    profile: &ContextProfile,
    focus: Option<&EnrichedContext>,
) -> Vec<Scenario> {
    let project = context.name();
    Archetype::all()
        .into_iter()
        .map(|archetype| {
            let mut scenario = build_scenario(project, archetype, maturity, profile);
            if let Some(focus) = focus {
                apply_focus(&mut scenario, focus);
            }
            scenario
        })
        .collect()
}

/// Sort by probability descending and keep at most `max` scenarios.
///
/// `min` is a floor on what is kept when that many exist; the effective cap
/// is `max(min, max)`.
pub fn synthesize(mut scenarios: Vec<Scenario>, min: usize, max: usize) -> Vec<Scenario> {
    scenarios.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    scenarios.truncate(max.max(min));
    scenarios
}

fn build_scenario(
    project: &str,
    archetype: Archetype,
    maturity: &MaturityAssessment,
    profile: &ContextProfile,
) -> Scenario {
    let bucket = maturity.bucket;
    let gap_lead: Vec<String> = profile.gaps.iter().take(2).cloned().collect();
    let strength_lead = profile
        .strengths
        .first()
        .cloned()
        .unwrap_or_else(|| "a small, focused codebase".to_string());

    let (name, arc) = match (archetype, bucket) {
        (Archetype::Growth, MaturityBucket::Early) => (
            "Foundation Build-out",
            format!("{project} establishes the basics and grows its contributor base on {strength_lead}."),
        ),
        (Archetype::Growth, MaturityBucket::Developing) => (
            "Scaling Adoption",
            format!("{project} widens its audience while keeping delivery steady, building on {strength_lead}."),
        ),
        (Archetype::Growth, MaturityBucket::Mature) => (
            "Ecosystem Expansion",
            format!("{project} extends outward through integrations and plugins, anchored by {strength_lead}."),
        ),
        (Archetype::Optimization, MaturityBucket::Early) => (
            "Premature Polish",
            format!("{project} spends effort tuning what exists before its foundations settle."),
        ),
        (Archetype::Optimization, MaturityBucket::Developing) => (
            "Stabilize and Streamline",
            format!("{project} trims friction in build, test and release paths to speed up iteration."),
        ),
        (Archetype::Optimization, MaturityBucket::Mature) => (
            "Operational Excellence",
            format!("{project} converts its established practices into measurable efficiency gains."),
        ),
        (Archetype::Transformation, MaturityBucket::Early) => (
            "Early Pivot",
            format!("{project} changes direction before its current shape hardens."),
        ),
        (Archetype::Transformation, MaturityBucket::Developing) => (
            "Structural Rework",
            format!("{project} reorganizes its architecture to remove limits on the next stage."),
        ),
        (Archetype::Transformation, MaturityBucket::Mature) => (
            "Architectural Reinvention",
            format!("{project} replaces core subsystems to meet demands the current design cannot."),
        ),
    };

    let opening = if gap_lead.is_empty() {
        format!("Consolidate {strength_lead}")
    } else {
        format!("Stabilize the base: {}", gap_lead.join("; "))
    };
    let landing = match archetype {
        Archetype::Growth => "Contributor base sustains itself without core maintainers",
        Archetype::Optimization => "Delivery cost per change measurably lower than today",
        Archetype::Transformation => "Target architecture carries all production traffic",
    };
    let trajectory = vec![opening, arc, landing.to_string()];

    let mut prerequisites: Vec<String> = gap_lead
        .iter()
        .map(|gap| format!("Close gap: {gap}"))
        .collect();
    let (extra_prereq, risks, indicators, outcomes) = match archetype {
        Archetype::Growth => (
            "Clear onboarding path for new contributors",
            vec![
                "Growth outpaces review capacity".to_string(),
                "Documentation drifts from behavior".to_string(),
            ],
            vec![
                "New contributors per month".to_string(),
                "Issue response time".to_string(),
            ],
            vec![
                "Larger, self-sustaining contributor base".to_string(),
                "Wider adoption of the project".to_string(),
            ],
        ),
        Archetype::Optimization => (
            "Baseline measurements for build and test time",
            vec![
                "Local optimizations hide structural problems".to_string(),
                "Automation maintenance becomes its own burden".to_string(),
            ],
            vec![
                "CI duration trend".to_string(),
                "Debt marker count trend".to_string(),
            ],
            vec![
                "Faster feedback loops".to_string(),
                "Lower cost per change".to_string(),
            ],
        ),
        Archetype::Transformation => (
            "Architecture decision records for the target design",
            vec![
                "Parallel old and new systems for too long".to_string(),
                "Migration stalls halfway".to_string(),
            ],
            vec![
                "Share of code on the target architecture".to_string(),
                "Incidents attributed to migration".to_string(),
            ],
            vec![
                "Architecture aligned with current demands".to_string(),
                "Removal of long-standing structural limits".to_string(),
            ],
        ),
    };
    prerequisites.push(extra_prereq.to_string());

    let mut risks = risks;
    if bucket == MaturityBucket::Early && archetype != Archetype::Growth {
        risks.push("Foundations too thin to support the change".to_string());
    }

    Scenario {
        archetype,
        name: name.to_string(),
        probability: scenario_probability(archetype, bucket),
        timeframe: archetype.timeframe().to_string(),
        trajectory,
        prerequisites,
        risks,
        indicators,
        outcomes,
    }
}

/// Archetype a focus area speaks to most directly
fn focus_archetype(area: &str) -> Archetype {
    match area {
        "architecture" => Archetype::Transformation,
        "documentation" | "community" => Archetype::Growth,
        _ => Archetype::Optimization,
    }
}

fn apply_focus(scenario: &mut Scenario, focus: &EnrichedContext) {
    scenario
        .indicators
        .push(format!("Progress on {}: {}", focus.vision_id, focus.trigger_reason));
    let targeted = focus
        .focus_areas
        .iter()
        .any(|area| focus_archetype(area) == scenario.archetype);
    if targeted {
        scenario
            .prerequisites
            .insert(0, format!("Resolve vision focus: {}", focus.trigger_reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::maturity::assess_maturity;
    use crate::vision::VisionTrigger;

    #[test]
    fn test_probability_bounds_for_every_bucket() {
        for bucket in MaturityBucket::all() {
            for archetype in Archetype::all() {
                let p = scenario_probability(archetype, bucket);
                assert!(
                    (MIN_PROBABILITY..=MAX_PROBABILITY).contains(&p),
                    "{archetype} in {bucket} gave {p}"
                );
            }
        }
    }

    #[test]
    fn test_probability_table() {
        assert_eq!(scenario_probability(Archetype::Growth, MaturityBucket::Early), 0.8);
        assert_eq!(
            scenario_probability(Archetype::Optimization, MaturityBucket::Mature),
            0.7
        );
        assert_eq!(
            scenario_probability(Archetype::Transformation, MaturityBucket::Early),
            0.2
        );
    }

    #[test]
    fn test_three_archetypes_always_generated() {
        let ctx = RepositoryContext::new("demo");
        let maturity = assess_maturity(&ctx);
        let profile = profile_context(&ctx);
        let scenarios = generate_scenarios(&ctx, &maturity, &profile, None);
        let archetypes: Vec<_> = scenarios.iter().map(|s| s.archetype).collect();
        assert_eq!(archetypes, Archetype::all().to_vec());
        assert!(scenarios[0].prerequisites[0].contains("No CI/CD workflows"));
    }

    #[test]
    fn test_trajectory_is_ordered_milestones() {
        let ctx = RepositoryContext::new("demo");
        let maturity = assess_maturity(&ctx);
        let profile = profile_context(&ctx);
        for scenario in generate_scenarios(&ctx, &maturity, &profile, None) {
            assert_eq!(scenario.trajectory.len(), 3);
            assert_eq!(
                scenario.trajectory[0],
                "Stabilize the base: No CI/CD workflows; No README"
            );
            assert!(scenario.trajectory[1].starts_with("demo "));
        }

        let mut healthy = RepositoryContext::new("healthy");
        healthy.documentation.has_readme = true;
        healthy.documentation.dev_log_entries = 3;
        let profile = ContextProfile {
            gaps: Vec::new(),
            strengths: vec!["Active developer log (3 entries)".to_string()],
        };
        let scenarios = generate_scenarios(&healthy, &assess_maturity(&healthy), &profile, None);
        let growth = scenarios
            .iter()
            .find(|s| s.archetype == Archetype::Growth)
            .expect("growth");
        assert_eq!(
            growth.trajectory[0],
            "Consolidate Active developer log (3 entries)"
        );
        assert!(growth.trajectory[2].contains("Contributor base"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let ctx = RepositoryContext::new("demo");
        let maturity = assess_maturity(&ctx);
        let profile = profile_context(&ctx);
        assert_eq!(
            generate_scenarios(&ctx, &maturity, &profile, None),
            generate_scenarios(&ctx, &maturity, &profile, None)
        );
    }

    #[test]
    fn test_synthesize_sorts_and_bounds() {
        let ctx = RepositoryContext::new("demo");
        let maturity = assess_maturity(&ctx);
        let profile = profile_context(&ctx);
        let scenarios = generate_scenarios(&ctx, &maturity, &profile, None);

        let top = synthesize(scenarios.clone(), 2, 2);
        assert_eq!(top.len(), 2);
        assert!(top[0].probability >= top[1].probability);
        assert_eq!(top[0].archetype, Archetype::Growth);

        assert_eq!(synthesize(scenarios.clone(), 2, 3).len(), 3);
        assert_eq!(synthesize(scenarios, 3, 1).len(), 3);
    }

    #[test]
    fn test_focus_targets_matching_archetype() {
        let ctx = RepositoryContext::new("demo");
        let maturity = assess_maturity(&ctx);
        let profile = profile_context(&ctx);
        let focus = EnrichedContext {
            project: "demo".to_string(),
            context_fingerprint: "fp".to_string(),
            vision_id: "VIS-20260101-00000001".to_string(),
            trigger: VisionTrigger::Manual,
            trigger_reason: "Split the monolith".to_string(),
            context_notes: String::new(),
            source_intel: None,
            focus_areas: vec!["architecture".to_string()],
        };
        let scenarios = generate_scenarios(&ctx, &maturity, &profile, Some(&focus));
        let transformation = scenarios
            .iter()
            .find(|s| s.archetype == Archetype::Transformation)
            .expect("transformation");
        assert_eq!(
            transformation.prerequisites[0],
            "Resolve vision focus: Split the monolith"
        );
        let growth = scenarios
            .iter()
            .find(|s| s.archetype == Archetype::Growth)
            .expect("growth");
        assert!(!growth.prerequisites[0].starts_with("Resolve vision focus"));
        assert!(growth.indicators.iter().any(|i| i.contains("VIS-20260101-00000001")));
    }

    #[test]
    fn test_profile_gaps_and_strengths() {
        let mut ctx = RepositoryContext::new("demo");
        ctx.documentation.has_readme = true;
        ctx.documentation.dev_log_entries = 3;
        ctx.code_signals.source_files = 10;
        ctx.code_signals.test_files = 5;
        ctx.code_signals.todo_count = 60;
        let profile = profile_context(&ctx);
        assert!(profile.gaps.contains(&"No CI/CD workflows".to_string()));
        assert!(profile.gaps.iter().any(|g| g.starts_with("Heavy technical-debt")));
        assert!(profile.strengths.contains(&"Healthy test-to-source ratio".to_string()));
        assert!(!profile.gaps.contains(&"No README".to_string()));
    }
}
