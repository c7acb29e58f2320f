//! Project maturity scoring.
//!
//! Five weighted dimensions, each scored by tier:
//!
//! | Dimension      | Max | Tiers                                   |
//! |----------------|-----|-----------------------------------------|
//! | Pipelines      | 25  | 0 / 1 / 2-3 / 4+ workflows              |
//! | Documentation  | 25  | 0 / 1-2 / 3-4 / 5+ doc signals          |
//! | Configuration  | 20  | 0 / 1-2 / 3-4 / 5+ hygiene signals      |
//! | Code volume    | 15  | 0 / <1k / <10k / <50k / 50k+ lines      |
//! | Languages      | 15  | 0 / 1 / 2-3 / 4+ languages              |

use crate::context::RepositoryContext;
use serde::{Deserialize, Serialize};

/// Coarse maturity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaturityBucket {
    /// Score below 40
    Early,
    /// Score 40-69
    Developing,
    /// Score 70+
    Mature,
}

impl MaturityBucket {
    pub fn all() -> [Self; 3] {
        [Self::Early, Self::Developing, Self::Mature]
    }

    pub fn from_score(score: u8) -> Self {
        if score < 40 {
            Self::Early
        } else if score < 70 {
            Self::Developing
        } else {
            Self::Mature
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Early => "early",
            Self::Developing => "developing",
            Self::Mature => "mature",
        }
    }
}

impl std::fmt::Display for MaturityBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-dimension points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaturityBreakdown {
    pub pipelines: u8,
    pub documentation: u8,
    pub configuration: u8,
    pub code_volume: u8,
    pub languages: u8,
}

impl MaturityBreakdown {
    pub fn total(&self) -> u8 {
        self.pipelines + self.documentation + self.configuration + self.code_volume + self.languages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaturityAssessment {
    /// 0-100
    pub score: u8,
    pub bucket: MaturityBucket,
    pub breakdown: MaturityBreakdown,
}

pub fn assess_maturity(context: &RepositoryContext) -> MaturityAssessment {
    let breakdown = MaturityBreakdown {
        pipelines: pipeline_points(context.workflow_count()),
        documentation: documentation_points(context.documentation.signal_count()),
        configuration: configuration_points(context.code_signals.config_signal_count()),
        code_volume: code_volume_points(context.topology.total_loc),
        languages: language_points(context.language_count()),
    };
    let score = breakdown.total().min(100);
    MaturityAssessment {
        score,
        bucket: MaturityBucket::from_score(score),
        breakdown,
    }
}

fn pipeline_points(workflows: usize) -> u8 {
    match workflows {
        0 => 0,
        1 => 10,
        2..=3 => 18,
        _ => 25,
    }
}

fn documentation_points(signals: usize) -> u8 {
    match signals {
        0 => 0,
        1..=2 => 8,
        3..=4 => 16,
        _ => 25,
    }
}

fn configuration_points(signals: usize) -> u8 {
    match signals {
        0 => 0,
        1..=2 => 6,
        3..=4 => 13,
        _ => 20,
    }
}

fn code_volume_points(loc: usize) -> u8 {
    match loc {
        0 => 0,
        1..1_000 => 3,
        1_000..10_000 => 8,
        10_000..50_000 => 12,
        _ => 15,
    }
}

fn language_points(languages: usize) -> u8 {
    match languages {
        0 => 0,
        1 => 5,
        2..=3 => 10,
        _ => 15,
    }
}
