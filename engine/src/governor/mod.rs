//! Resource governor for consultation runs.
//!
//! One governor is created per run and passed by `&mut` into each
//! consultant. It answers "may the next phase start?", counts calls against
//! per-service ceilings, accumulates per-phase timings and records why work
//! stopped. It never fails and never touches the filesystem: callers decide
//! whether to emit a constrained report.
//!
//! ```rust,ignore
//! let mut governor = ResourceGovernor::new(budget);
//! if governor.should_proceed("advisor.learning") {
//!     let handle = governor.start_timing(ConsultantRole::Advisor, "learning");
//!     governor.track_call(ServiceClass::Other);
//!     // ... audit work ...
//!     governor.end_timing(handle, ConsultantRole::Advisor);
//! }
//! let telemetry = governor.generate_telemetry_report();
//! ```

pub mod budget;
pub mod clock;

pub use budget::{BudgetPressure, CallCeilings, ResourceBudget, ServiceClass};
pub use clock::{Clock, ManualClock, SystemClock};

use crate::context::ContextDelta;
use crate::types::ConsultantRole;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Opaque handle returned by [`ResourceGovernor::start_timing`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingHandle {
    role: ConsultantRole,
    phase: String,
    started: Duration,
}

impl TimingHandle {
    pub fn phase(&self) -> &str {
        &self.phase
    }
}

/// Mutable usage state, owned by the governor for one run
#[derive(Debug, Clone, Default)]
struct UsageState {
    calls: BTreeMap<ServiceClass, u32>,
    phase_elapsed: BTreeMap<(ConsultantRole, String), Duration>,
    cache_hits: BTreeMap<ConsultantRole, u32>,
    cache_misses: BTreeMap<ConsultantRole, u32>,
    stop_reasons: Vec<String>,
    early_exits: u32,
    escalation_logged: bool,
}

/// Calls made against one service class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallUsage {
    pub service: ServiceClass,
    pub used: u32,
    pub ceiling: u32,
}

/// Accumulated time in one phase of one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub role: ConsultantRole,
    pub phase: String,
    pub seconds: f64,
}

/// End-of-run summary of resource usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    pub elapsed_seconds: f64,
    pub budget_minutes: f64,
    /// elapsed / budget
    pub budget_used_fraction: f64,
    pub pressure: BudgetPressure,
    pub calls: Vec<CallUsage>,
    pub phase_timings: Vec<PhaseTiming>,
    pub cache_hits: u32,
    pub cache_misses: u32,
    pub early_exits: u32,
    pub stop_reasons: Vec<String>,
}

impl TelemetrySummary {
    /// Markdown footer appended to consultation reports
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("## Telemetry\n\n");
        out.push_str(&format!(
            "- Elapsed: {:.1}s of {:.1} min budget ({:.0}%)\n",
            self.elapsed_seconds,
            self.budget_minutes,
            self.budget_used_fraction * 100.0
        ));
        out.push_str(&format!("- Pressure: {}\n", self.pressure.as_str()));
        for call in &self.calls {
            out.push_str(&format!(
                "- Calls ({}): {}/{}\n",
                call.service, call.used, call.ceiling
            ));
        }
        out.push_str(&format!(
            "- Cache: {} hit(s), {} miss(es)\n",
            self.cache_hits, self.cache_misses
        ));
        out.push_str(&format!("- Early exits: {}\n", self.early_exits));

        if !self.phase_timings.is_empty() {
            out.push_str("\n| Role | Phase | Seconds |\n|------|-------|---------|\n");
            for timing in &self.phase_timings {
                out.push_str(&format!(
                    "| {} | {} | {:.3} |\n",
                    timing.role.display_name(),
                    timing.phase,
                    timing.seconds
                ));
            }
        }

        if !self.stop_reasons.is_empty() {
            out.push_str("\n### Stop Reasons\n\n");
            for reason in &self.stop_reasons {
                out.push_str(&format!("- {reason}\n"));
            }
        }
        out
    }
}

/// Budget authority for a single consultation run
pub struct ResourceGovernor {
    budget: ResourceBudget,
    clock: Box<dyn Clock>,
    usage: UsageState,
}

impl std::fmt::Debug for ResourceGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGovernor")
            .field("budget", &self.budget)
            .field("elapsed", &self.clock.elapsed())
            .field("usage", &self.usage)
            .finish()
    }
}

impl ResourceGovernor {
    /// Start a governor on the wall clock
    pub fn new(budget: ResourceBudget) -> Self {
        Self::with_clock(budget, Box::new(SystemClock::start()))
    }

    /// Start a governor on a caller-supplied clock (tests, replays)
    pub fn with_clock(budget: ResourceBudget, clock: Box<dyn Clock>) -> Self {
        tracing::debug!(
            max_minutes = budget.max_minutes,
            soft_stop_fraction = budget.soft_stop_fraction,
            "Resource governor started"
        );
        Self {
            budget,
            clock,
            usage: UsageState::default(),
        }
    }

    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn calls(&self, service: ServiceClass) -> u32 {
        self.usage.calls.get(&service).copied().unwrap_or(0)
    }

    pub fn stop_reasons(&self) -> &[String] {
        &self.usage.stop_reasons
    }

    /// Most recent stop reason, if any phase was denied
    pub fn last_stop_reason(&self) -> Option<&str> {
        self.usage.stop_reasons.last().map(String::as_str)
    }

    pub fn early_exits(&self) -> u32 {
        self.usage.early_exits
    }

    /// Decide whether `operation` may start.
    ///
    /// Denies when elapsed time has reached the budget or the soft-stop
    /// fraction of it, or when any service has reached its call ceiling.
    /// Every denial is recorded as a plain-language stop reason.
    pub fn should_proceed(&mut self, operation: &str) -> bool {
        let elapsed = self.elapsed();
        let max = self.budget.max_duration();
        let soft = self.budget.soft_stop_duration();

        if elapsed >= max {
            self.push_stop_reason(format!(
                "{operation}: time budget exhausted ({:.1}s elapsed of {:.1}s budget)",
                elapsed.as_secs_f64(),
                max.as_secs_f64()
            ));
            return false;
        }

        if elapsed >= soft {
            self.push_stop_reason(format!(
                "{operation}: soft stop reached ({:.1}s elapsed, soft stop at {:.0}% of {:.1}s budget)",
                elapsed.as_secs_f64(),
                self.budget.soft_stop_fraction * 100.0,
                max.as_secs_f64()
            ));
            return false;
        }

        for service in ServiceClass::all() {
            let ceiling = self.budget.call_ceilings.ceiling(service);
            let used = self.calls(service);
            if used >= ceiling {
                self.push_stop_reason(format!(
                    "{operation}: {service} call ceiling reached ({used}/{ceiling})"
                ));
                return false;
            }
        }

        self.maybe_log_escalation(elapsed);
        true
    }

    /// Charge one call to `service`
    pub fn track_call(&mut self, service: ServiceClass) {
        let count = self.usage.calls.entry(service).or_insert(0);
        *count += 1;
        tracing::trace!(service = %service, count = *count, "Tracked call");
    }

    /// Begin timing `phase` of `role`
    pub fn start_timing(&mut self, role: ConsultantRole, phase: &str) -> TimingHandle {
        tracing::debug!(role = %role, phase, "Phase started");
        TimingHandle {
            role,
            phase: phase.to_string(),
            started: self.elapsed(),
        }
    }

    /// Finish timing and return the phase duration in seconds.
    ///
    /// The duration is added to the (role, phase) accumulator. A handle
    /// issued for another role is still accumulated under its own role.
    pub fn end_timing(&mut self, handle: TimingHandle, role: ConsultantRole) -> f64 {
        if handle.role != role {
            tracing::warn!(
                handle_role = %handle.role,
                role = %role,
                phase = %handle.phase,
                "Timing handle ended by a different role"
            );
        }
        let duration = self.elapsed().saturating_sub(handle.started);
        let seconds = duration.as_secs_f64();
        *self
            .usage
            .phase_elapsed
            .entry((handle.role, handle.phase.clone()))
            .or_insert(Duration::ZERO) += duration;
        tracing::info!(
            role = %handle.role,
            phase = %handle.phase,
            elapsed_ms = duration.as_millis() as u64,
            "Phase completed"
        );
        seconds
    }

    pub fn record_cache_hit(&mut self, role: ConsultantRole) {
        *self.usage.cache_hits.entry(role).or_insert(0) += 1;
    }

    pub fn record_cache_miss(&mut self, role: ConsultantRole) {
        *self.usage.cache_misses.entry(role).or_insert(0) += 1;
    }

    /// Whether a context change is small enough to skip a full recompute
    pub fn should_exit_early(&mut self, delta: &ContextDelta) -> bool {
        let ratio = delta.change_ratio();
        let trivial = ratio < self.budget.early_exit_change_ratio;
        if trivial {
            self.usage.early_exits += 1;
            tracing::info!(
                changed = delta.changed_nodes,
                total = delta.total_nodes,
                ratio,
                "Context delta below threshold, early exit"
            );
        }
        trivial
    }

    /// Current usage level
    pub fn pressure(&self) -> BudgetPressure {
        let elapsed = self.elapsed();
        let ceiling_hit = ServiceClass::all()
            .into_iter()
            .any(|s| self.calls(s) >= self.budget.call_ceilings.ceiling(s));
        if elapsed >= self.budget.max_duration() || ceiling_hit {
            BudgetPressure::Exhausted
        } else if elapsed >= self.budget.escalation_duration() {
            BudgetPressure::Escalated
        } else if elapsed >= self.budget.soft_stop_duration() {
            BudgetPressure::SoftStop
        } else {
            BudgetPressure::Nominal
        }
    }

    /// Snapshot of usage for reports and logs
    pub fn generate_telemetry_report(&self) -> TelemetrySummary {
        let elapsed = self.elapsed();
        let max = self.budget.max_duration().as_secs_f64();
        let used_fraction = if max > 0.0 {
            elapsed.as_secs_f64() / max
        } else {
            1.0
        };

        let summary = TelemetrySummary {
            elapsed_seconds: elapsed.as_secs_f64(),
            budget_minutes: self.budget.max_minutes,
            budget_used_fraction: used_fraction,
            pressure: self.pressure(),
            calls: ServiceClass::all()
                .into_iter()
                .map(|service| CallUsage {
                    service,
                    used: self.calls(service),
                    ceiling: self.budget.call_ceilings.ceiling(service),
                })
                .collect(),
            phase_timings: self
                .usage
                .phase_elapsed
                .iter()
                .map(|((role, phase), duration)| PhaseTiming {
                    role: *role,
                    phase: phase.clone(),
                    seconds: duration.as_secs_f64(),
                })
                .collect(),
            cache_hits: self.usage.cache_hits.values().sum(),
            cache_misses: self.usage.cache_misses.values().sum(),
            early_exits: self.usage.early_exits,
            stop_reasons: self.usage.stop_reasons.clone(),
        };

        tracing::info!(
            elapsed_s = summary.elapsed_seconds,
            pressure = summary.pressure.as_str(),
            cache_hits = summary.cache_hits,
            cache_misses = summary.cache_misses,
            stop_reasons = summary.stop_reasons.len(),
            "Consultation telemetry"
        );
        summary
    }

    fn push_stop_reason(&mut self, reason: String) {
        if self.usage.stop_reasons.last() != Some(&reason) {
            tracing::warn!(reason = %reason, "Governor denied phase");
            self.usage.stop_reasons.push(reason);
        }
    }

    fn maybe_log_escalation(&mut self, elapsed: Duration) {
        if !self.usage.escalation_logged && elapsed >= self.budget.escalation_duration() {
            self.usage.escalation_logged = true;
            tracing::warn!(
                elapsed_s = elapsed.as_secs_f64(),
                escalation_fraction = self.budget.escalation_fraction,
                "Budget escalation threshold crossed"
            );
        }
    }
}
