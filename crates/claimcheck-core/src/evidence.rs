//! Evidence gathered by the no-citation fallback checks.

use serde::{Deserialize, Serialize};

use crate::rating::FactCheckRating;

/// One review returned by a fact-check index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckEntry {
    /// Rating text as published
    pub rating: String,
    pub publisher: String,
    pub url: String,
}

/// Outcome of a fact-check lookup for one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckFinding {
    pub found: bool,
    pub confidence: f64,
    pub explanation: String,

    /// Review URLs backing the finding
    pub sources: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<FactCheckRating>,
}

impl FactCheckFinding {
    pub fn not_found(explanation: impl Into<String>) -> Self {
        Self {
            found: false,
            confidence: 0.0,
            explanation: explanation.into(),
            sources: Vec::new(),
            rating: None,
        }
    }

    /// True when a review rated the claim true.
    pub fn supports(&self) -> bool {
        self.found && self.rating == Some(FactCheckRating::True)
    }
}

/// Evidence-less judgment of a claim's plausibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlausibilityAssessment {
    pub plausible: bool,
    pub confidence: f64,
    pub reasoning: String,
}

impl PlausibilityAssessment {
    /// Assessment used when the judgment itself could not be obtained.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            plausible: false,
            confidence: 0.0,
            reasoning: reason.into(),
        }
    }
}
