//! Oracle consultant: maturity, scenarios and the vision ritual.

pub mod maturity;
pub mod ritual;
pub mod scenarios;

pub use maturity::{MaturityAssessment, MaturityBreakdown, MaturityBucket, assess_maturity};
pub use ritual::{RitualFailure, RitualItem, RitualResult, RitualStop, VisionSink, enrich_context};
pub use scenarios::{Archetype, ContextProfile, Scenario, profile_context};

use crate::cache::ResultCache;
use crate::config::OracleConfig;
use crate::context::RepositoryContext;
use crate::errors::Result;
use crate::governor::{ResourceGovernor, ServiceClass};
use crate::types::ConsultantRole;
use crate::vision::{EnrichedContext, VisionQueue, VisionRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Oracle output for one context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub project: String,
    pub context_fingerprint: String,
    pub generated_at: DateTime<Utc>,
    pub maturity: MaturityAssessment,
    pub profile: ContextProfile,
    /// Sorted by probability, descending
    pub scenarios: Vec<Scenario>,
    /// Set when produced by the ritual for a queued vision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_id: Option<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    /// True when the governor stopped the forecast early
    #[serde(default)]
    pub constrained: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub from_cache: bool,
}

impl ForecastReport {
    pub fn top_scenario(&self) -> Option<&Scenario> {
        self.scenarios.first()
    }
}

/// The forecasting consultant
#[derive(Debug, Clone, Default)]
pub struct Oracle {
    config: OracleConfig,
}

impl Oracle {
    pub fn new(config: OracleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Forecast cached under `fingerprint`, marked as served from cache
    pub fn cached(fingerprint: &str, cache: &ResultCache) -> Result<Option<ForecastReport>> {
        Ok(cache
            .get::<ForecastReport>(fingerprint, ConsultantRole::Oracle)?
            .map(|mut report| {
                report.from_cache = true;
                report
            }))
    }

    /// Forecast futures for `context`, consulting the cache first.
    ///
    /// A cache hit returns without charging the governor. A denied phase
    /// yields a constrained report; constrained reports are not cached.
    pub fn forecast(
        &self,
        context: &RepositoryContext,
        governor: &mut ResourceGovernor,
        cache: &ResultCache,
    ) -> Result<ForecastReport> {
        let fingerprint = context.fingerprint()?;

        if let Some(cached) = Self::cached(&fingerprint, cache)? {
            governor.record_cache_hit(ConsultantRole::Oracle);
            return Ok(cached);
        }
        governor.record_cache_miss(ConsultantRole::Oracle);

        let report = self.forecast_uncached(context, &fingerprint, None, governor);
        if !report.constrained {
            cache.put(&fingerprint, ConsultantRole::Oracle, &report)?;
        }
        Ok(report)
    }

    /// Run the forecast algorithm without touching the cache
    pub fn forecast_uncached(
        &self,
        context: &RepositoryContext,
        fingerprint: &str,
        focus: Option<&EnrichedContext>,
        governor: &mut ResourceGovernor,
    ) -> ForecastReport {
        let mut report = ForecastReport {
            project: context.name().to_string(),
            context_fingerprint: fingerprint.to_string(),
            generated_at: Utc::now(),
            maturity: MaturityAssessment {
                score: 0,
                bucket: MaturityBucket::Early,
                breakdown: MaturityBreakdown::default(),
            },
            profile: ContextProfile::default(),
            scenarios: Vec::new(),
            vision_id: focus.map(|f| f.vision_id.clone()),
            focus_areas: focus.map(|f| f.focus_areas.clone()).unwrap_or_default(),
            constrained: false,
            stop_reason: None,
            from_cache: false,
        };

        if !governor.should_proceed("oracle.maturity") {
            return constrain(report, governor);
        }
        let handle = governor.start_timing(ConsultantRole::Oracle, "maturity");
        governor.track_call(ServiceClass::Other);
        report.maturity = assess_maturity(context);
        report.profile = profile_context(context);
        governor.end_timing(handle, ConsultantRole::Oracle);

        if !governor.should_proceed("oracle.scenarios") {
            return constrain(report, governor);
        }
        let handle = governor.start_timing(ConsultantRole::Oracle, "scenarios");
        governor.track_call(ServiceClass::Other);
        let generated =
            scenarios::generate_scenarios(context, &report.maturity, &report.profile, focus);
        report.scenarios = scenarios::synthesize(
            generated,
            self.config.min_scenarios,
            self.config.max_scenarios,
        );
        governor.end_timing(handle, ConsultantRole::Oracle);

        tracing::info!(
            project = %report.project,
            maturity = report.maturity.score,
            bucket = report.maturity.bucket.as_str(),
            scenarios = report.scenarios.len(),
            "Forecast complete"
        );
        report
    }

    /// Append a vision request to the queue
    pub fn queue_vision(&self, queue: &VisionQueue, request: &VisionRequest) -> Result<String> {
        queue.enqueue(request)
    }
}

fn constrain(mut report: ForecastReport, governor: &ResourceGovernor) -> ForecastReport {
    report.constrained = true;
    report.stop_reason = governor.last_stop_reason().map(str::to_string);
    tracing::warn!(
        project = %report.project,
        reason = report.stop_reason.as_deref().unwrap_or("unknown"),
        "Forecast constrained"
    );
    report
}
