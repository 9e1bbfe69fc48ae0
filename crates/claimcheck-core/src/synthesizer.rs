//! Combines fact-check and plausibility evidence into a verdict.
//!
//! Used by both uncited lanes. The combination is lenient: a claim passes
//! when either check supports it, and the confidence is the larger of the
//! two. With no citable source, a false negative is treated as worse than
//! accepting a weakly supported claim.

use crate::claim::Claim;
use crate::evidence::{FactCheckFinding, PlausibilityAssessment};
use crate::verdict::{ValidationMethod, ValidationVerdict};

#[derive(Debug, Clone, Copy)]
pub struct Synthesizer {
    /// Confidence a fallback check must strictly exceed for an uncited
    /// quantitative claim to be settled without a dataset
    high_confidence: f64,
}

impl Synthesizer {
    pub fn new(high_confidence: f64) -> Self {
        Self { high_confidence }
    }

    pub fn high_confidence(&self) -> f64 {
        self.high_confidence
    }

    pub fn combine(
        &self,
        claim: &Claim,
        fact_check: &FactCheckFinding,
        plausibility: &PlausibilityAssessment,
    ) -> ValidationVerdict {
        let passed = fact_check.supports() || plausibility.plausible;
        let confidence = fact_check.confidence.max(plausibility.confidence);

        let mut parts = Vec::new();
        if fact_check.found {
            parts.push(format!("Fact-check: {}", fact_check.explanation));
        }
        parts.push(format!("Plausibility: {}", plausibility.reasoning));

        ValidationVerdict::completed(
            claim,
            ValidationMethod::FactCheckAndPlausibility,
            passed,
            confidence,
            parts.join(" | "),
            fact_check.sources.clone(),
        )
    }

    /// Whether the fallback evidence is strong enough to settle an uncited
    /// quantitative claim without looking for a dataset.
    pub fn clears_threshold(
        &self,
        fact_check: &FactCheckFinding,
        plausibility: &PlausibilityAssessment,
    ) -> bool {
        (fact_check.supports() && fact_check.confidence > self.high_confidence)
            || (plausibility.plausible && plausibility.confidence > self.high_confidence)
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new(0.8)
    }
}
