//! Resource budget configuration.
//!
//! A budget is fixed for the lifetime of one consultation run. It is read
//! from the `[budget]` table of `faculty.toml`; the CLI may override
//! `max_minutes` per run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest wall-clock budget a run may ask for
pub const MAX_BUDGET_MINUTES: f64 = 7.0 * 24.0 * 60.0;

/// Class of service a tracked call is charged against.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceClass {
    /// Calls that leave the process (model providers, hosted services)
    Remote,
    /// Local analysis steps (audits, scenario generation)
    Other,
}

impl ServiceClass {
    pub fn all() -> [Self; 2] {
        [Self::Remote, Self::Other]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-service call ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallCeilings {
    #[serde(default = "default_remote_ceiling")]
    pub remote: u32,
    #[serde(default = "default_other_ceiling")]
    pub other: u32,
}

fn default_remote_ceiling() -> u32 {
    20
}

fn default_other_ceiling() -> u32 {
    200
}

impl Default for CallCeilings {
    fn default() -> Self {
        Self {
            remote: default_remote_ceiling(),
            other: default_other_ceiling(),
        }
    }
}

impl CallCeilings {
    pub fn ceiling(&self, service: ServiceClass) -> u32 {
        match service {
            ServiceClass::Remote => self.remote,
            ServiceClass::Other => self.other,
        }
    }
}

/// Budget limits for one consultation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBudget {
    /// Wall-clock budget in minutes
    #[serde(default = "default_max_minutes")]
    pub max_minutes: f64,

    /// Fraction of the budget after which new phases are refused
    #[serde(default = "default_soft_stop_fraction")]
    pub soft_stop_fraction: f64,

    /// Fraction of the budget after which usage is reported as escalated
    #[serde(default = "default_escalation_fraction")]
    pub escalation_fraction: f64,

    /// Change ratio below which a context delta is considered trivial
    #[serde(default = "default_early_exit_change_ratio")]
    pub early_exit_change_ratio: f64,

    /// Per-service call ceilings
    #[serde(default)]
    pub call_ceilings: CallCeilings,
}

fn default_max_minutes() -> f64 {
    10.0
}

fn default_soft_stop_fraction() -> f64 {
    0.8
}

fn default_escalation_fraction() -> f64 {
    0.9
}

fn default_early_exit_change_ratio() -> f64 {
    0.05
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            max_minutes: default_max_minutes(),
            soft_stop_fraction: default_soft_stop_fraction(),
            escalation_fraction: default_escalation_fraction(),
            early_exit_change_ratio: default_early_exit_change_ratio(),
            call_ceilings: CallCeilings::default(),
        }
    }
}

impl ResourceBudget {
    /// Same budget with a different wall-clock limit
    pub fn with_max_minutes(mut self, minutes: f64) -> Self {
        self.max_minutes = minutes;
        self
    }

    pub fn max_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_minutes.max(0.0) * 60.0).unwrap_or(Duration::MAX)
    }

    pub fn soft_stop_duration(&self) -> Duration {
        self.max_duration().mul_f64(self.soft_stop_fraction)
    }

    pub fn escalation_duration(&self) -> Duration {
        self.max_duration().mul_f64(self.escalation_fraction)
    }

    /// Check the invariants the governor relies on.
    ///
    /// Returns a list of human-readable problems; empty when valid.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !(self.max_minutes.is_finite() && self.max_minutes > 0.0) {
            problems.push(format!(
                "budget.max_minutes must be positive, got {}",
                self.max_minutes
            ));
        } else if self.max_minutes > MAX_BUDGET_MINUTES {
            problems.push(format!(
                "budget.max_minutes must be at most {MAX_BUDGET_MINUTES} (one week), got {}",
                self.max_minutes
            ));
        }
        for (name, value) in [
            ("soft_stop_fraction", self.soft_stop_fraction),
            ("escalation_fraction", self.escalation_fraction),
            ("early_exit_change_ratio", self.early_exit_change_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                problems.push(format!("budget.{name} must be in (0, 1], got {value}"));
            }
        }
        for service in ServiceClass::all() {
            if self.call_ceilings.ceiling(service) == 0 {
                problems.push(format!("budget.call_ceilings.{service} must be at least 1"));
            }
        }
        problems
    }
}

/// Coarse usage level derived from elapsed time and call counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPressure {
    Nominal,
    SoftStop,
    Escalated,
    Exhausted,
}

impl BudgetPressure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nominal => "nominal",
            Self::SoftStop => "soft_stop",
            Self::Escalated => "escalated",
            Self::Exhausted => "exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget_is_valid() {
        let budget = ResourceBudget::default();
        assert!(budget.problems().is_empty());
        assert_eq!(budget.max_duration(), Duration::from_secs(600));
        assert_eq!(budget.soft_stop_duration(), Duration::from_secs(480));
        assert_eq!(budget.call_ceilings.ceiling(ServiceClass::Remote), 20);
    }

    #[test]
    fn test_problems_reported() {
        let budget = ResourceBudget {
            max_minutes: 0.0,
            soft_stop_fraction: 1.5,
            call_ceilings: CallCeilings {
                remote: 0,
                other: 10,
            },
            ..ResourceBudget::default()
        };
        let problems = budget.problems();
        assert_eq!(problems.len(), 3);
        assert!(problems.iter().any(|p| p.contains("soft_stop_fraction")));
        assert!(problems.iter().any(|p| p.contains("call_ceilings.remote")));
    }

    #[test]
    fn test_max_minutes_upper_bound() {
        let week = ResourceBudget::default().with_max_minutes(MAX_BUDGET_MINUTES);
        assert!(week.problems().is_empty());
        assert_eq!(week.max_duration(), Duration::from_secs(7 * 24 * 3600));

        for minutes in [MAX_BUDGET_MINUTES + 1.0, 1e300, f64::INFINITY] {
            let budget = ResourceBudget::default().with_max_minutes(minutes);
            let problems = budget.problems();
            assert_eq!(problems.len(), 1, "minutes={minutes}");
            assert_eq!(budget.max_duration(), Duration::MAX);
        }
        assert!(
            ResourceBudget::default()
                .with_max_minutes(1e300)
                .problems()[0]
                .contains("at most")
        );
    }

    #[test]
    fn test_parse_budget_table() {
        let budget: ResourceBudget = toml::from_str(
            r#"
            max_minutes = 2.5
            [call_ceilings]
            remote = 3
            "#,
        )
        .expect("parse");
        assert_eq!(budget.max_minutes, 2.5);
        assert_eq!(budget.call_ceilings.remote, 3);
        assert_eq!(budget.call_ceilings.other, 200);
        assert_eq!(budget.soft_stop_fraction, 0.8);
    }
}
