//! Oracle-queuing policy: which advisor findings deserve a deferred vision.

use super::{ActionItem, AuditCategory, Impact};
use crate::config::AdvisorConfig;
use serde::{Deserialize, Serialize};

/// Why an item was queued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum QueueReason {
    PriorityAboveThreshold(u8),
    Keyword(String),
    HighImpactDebt,
}

impl QueueReason {
    pub fn describe(&self) -> String {
        match self {
            Self::PriorityAboveThreshold(threshold) => {
                format!("priority above queue threshold {threshold}")
            }
            Self::Keyword(keyword) => format!("matches strategic keyword '{keyword}'"),
            Self::HighImpactDebt => "high-impact technical debt".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuePolicy {
    threshold: u8,
    keywords: Vec<String>,
}

impl QueuePolicy {
    pub fn new(threshold: u8, keywords: &[String]) -> Self {
        Self {
            threshold,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &AdvisorConfig) -> Self {
        Self::new(config.oracle_queue_threshold, &config.queue_keywords)
    }

    /// First matching reason, checked in order: priority, keyword, debt
    pub fn evaluate(&self, item: &ActionItem) -> Option<QueueReason> {
        if item.priority > self.threshold {
            return Some(QueueReason::PriorityAboveThreshold(self.threshold));
        }

        let haystack = format!("{} {}", item.category.as_str(), item.title).to_lowercase();
        if let Some(keyword) = self
            .keywords
            .iter()
            .find(|k| !k.is_empty() && haystack.contains(k.as_str()))
        {
            return Some(QueueReason::Keyword(keyword.clone()));
        }

        if item.category == AuditCategory::TechnicalDebt && item.impact == Impact::High {
            return Some(QueueReason::HighImpactDebt);
        }
        None
    }
}
