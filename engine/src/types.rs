//! Shared vocabulary for consultation runs.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Fixed-width RFC 3339 (UTC, microseconds) so stored timestamps sort
/// lexicographically in SQLite.
pub(crate) fn db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_db_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Consultant roles that can be run, cached and timed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultantRole {
    /// Audits present state
    Advisor,
    /// Forecasts futures and runs the vision ritual
    Oracle,
}

impl ConsultantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Advisor => "advisor",
            Self::Oracle => "oracle",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Advisor => "Advisor",
            Self::Oracle => "Oracle",
        }
    }
}

impl std::fmt::Display for ConsultantRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which consultants a run should invoke
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSelection {
    AdvisorOnly,
    OracleOnly,
    #[default]
    Both,
}

impl RoleSelection {
    pub fn includes(&self, role: ConsultantRole) -> bool {
        match (self, role) {
            (Self::Both, _) => true,
            (Self::AdvisorOnly, ConsultantRole::Advisor) => true,
            (Self::OracleOnly, ConsultantRole::Oracle) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdvisorOnly => "advisor",
            Self::OracleOnly => "oracle",
            Self::Both => "both",
        }
    }
}

impl FromStr for RoleSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advisor" | "advisor-only" => Ok(Self::AdvisorOnly),
            "oracle" | "oracle-only" => Ok(Self::OracleOnly),
            "both" | "all" => Ok(Self::Both),
            other => Err(format!(
                "unknown role selection '{other}' (expected advisor, oracle or both)"
            )),
        }
    }
}

/// How thorough a consultation should be
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    Quick,
    #[default]
    Standard,
    Deep,
}

impl AnalysisDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Deep => "deep",
        }
    }

    /// Multiplier applied to the advisor's item ceiling
    pub fn item_multiplier(&self) -> usize {
        match self {
            Self::Quick | Self::Standard => 1,
            Self::Deep => 2,
        }
    }
}

impl FromStr for AnalysisDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "standard" => Ok(Self::Standard),
            "deep" => Ok(Self::Deep),
            other => Err(format!(
                "unknown depth '{other}' (expected quick, standard or deep)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_timestamp_sorts() {
        let early = Utc::now();
        let late = early + chrono::Duration::milliseconds(1500);
        let (a, b) = (db_timestamp(early), db_timestamp(late));
        assert!(a < b);
        assert_eq!(a.len(), b.len());
        let parsed = parse_db_timestamp(&a).expect("parse");
        assert_eq!(db_timestamp(parsed), a);
    }

    #[test]
    fn test_role_selection_includes() {
        assert!(RoleSelection::Both.includes(ConsultantRole::Oracle));
        assert!(RoleSelection::AdvisorOnly.includes(ConsultantRole::Advisor));
        assert!(!RoleSelection::AdvisorOnly.includes(ConsultantRole::Oracle));
        assert!(!RoleSelection::OracleOnly.includes(ConsultantRole::Advisor));
    }

    #[test]
    fn test_parse_selection_and_depth() {
        assert_eq!(
            "Oracle".parse::<RoleSelection>().expect("parse"),
            RoleSelection::OracleOnly
        );
        assert_eq!("deep".parse::<AnalysisDepth>().expect("parse"), AnalysisDepth::Deep);
        assert!("thorough".parse::<AnalysisDepth>().is_err());
    }
}
