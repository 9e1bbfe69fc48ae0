//! Terminal validation records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::claim::{Claim, ClaimType};

/// How a verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMethod {
    /// Fact-check index lookup combined with a plausibility judgment
    FactCheckAndPlausibility,

    /// Generated analysis script executed against a dataset
    GeneratedScript,

    /// Retrieved passages adjudicated by the generation capability
    RetrievalAdjudication,
}

impl ValidationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationMethod::FactCheckAndPlausibility => "fact_check_and_plausibility",
            ValidationMethod::GeneratedScript => "generated_script",
            ValidationMethod::RetrievalAdjudication => "retrieval_adjudication",
        }
    }
}

impl std::fmt::Display for ValidationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The terminal validation record for one claim.
///
/// Fields are private so the invariants hold for every value:
/// `confidence` is within `[0, 1]` and `validated == false` implies
/// `passed == false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationVerdict {
    claim_id: String,
    claim_type: ClaimType,
    originally_uncited: bool,
    validated: bool,
    method: ValidationMethod,
    confidence: f64,
    passed: bool,
    explanation: String,
    evidence: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<String>,
    timestamp: DateTime<Utc>,
}

impl ValidationVerdict {
    /// A validation that executed to completion.
    pub fn completed(
        claim: &Claim,
        method: ValidationMethod,
        passed: bool,
        confidence: f64,
        explanation: impl Into<String>,
        evidence: Vec<String>,
    ) -> Self {
        Self {
            claim_id: claim.id.clone(),
            claim_type: claim.claim_type,
            originally_uncited: claim.is_originally_uncited(),
            validated: true,
            method,
            confidence: clamp_confidence(confidence),
            passed,
            explanation: explanation.into(),
            evidence,
            errors: None,
            timestamp: Utc::now(),
        }
    }

    /// A validation that could not execute, or found nothing to judge.
    /// Always `validated=false`, `passed=false`, `confidence=0`.
    pub fn failed(
        claim: &Claim,
        method: ValidationMethod,
        explanation: impl Into<String>,
        error: Option<String>,
    ) -> Self {
        Self {
            claim_id: claim.id.clone(),
            claim_type: claim.claim_type,
            originally_uncited: claim.is_originally_uncited(),
            validated: false,
            method,
            confidence: 0.0,
            passed: false,
            explanation: explanation.into(),
            evidence: Vec::new(),
            errors: error,
            timestamp: Utc::now(),
        }
    }

    /// Append a sentence to the explanation.
    pub fn with_note(mut self, note: &str) -> Self {
        if self.explanation.is_empty() {
            self.explanation = note.to_string();
        } else {
            self.explanation = format!("{} {}", self.explanation.trim_end(), note);
        }
        self
    }

    pub fn claim_id(&self) -> &str {
        &self.claim_id
    }

    pub fn claim_type(&self) -> ClaimType {
        self.claim_type
    }

    pub fn originally_uncited(&self) -> bool {
        self.originally_uncited
    }

    pub fn validated(&self) -> bool {
        self.validated
    }

    pub fn method(&self) -> ValidationMethod {
        self.method
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn evidence(&self) -> &[String] {
        &self.evidence
    }

    pub fn errors(&self) -> Option<&str> {
        self.errors.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Clamp into `[0, 1]`; NaN becomes 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_failed_verdict_shape() {
        let claim = Claim::quantitative("c1", "x");
        let verdict = ValidationVerdict::failed(
            &claim,
            ValidationMethod::GeneratedScript,
            "Script execution timed out",
            Some("timeout".to_string()),
        );
        assert!(!verdict.validated());
        assert!(!verdict.passed());
        assert_eq!(verdict.confidence(), 0.0);
        assert_eq!(verdict.errors(), Some("timeout"));
    }

    #[test]
    fn test_serializes_method_snake_case() {
        let claim = Claim::qualitative("c1", "x");
        let verdict = ValidationVerdict::completed(
            &claim,
            ValidationMethod::RetrievalAdjudication,
            false,
            0.7,
            "contradicted",
            vec![],
        );
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["method"], "retrieval_adjudication");
        assert_eq!(json["validated"], true);
        assert!(json.get("errors").is_none());
    }

    #[test]
    fn test_with_note() {
        let claim = Claim::qualitative("c1", "x");
        let verdict = ValidationVerdict::completed(
            &claim,
            ValidationMethod::RetrievalAdjudication,
            true,
            0.9,
            "Supported.",
            vec![],
        )
        .with_note("1 quote dropped.");
        assert_eq!(verdict.explanation(), "Supported. 1 quote dropped.");
    }

    proptest! {
        #[test]
        fn prop_confidence_in_unit_interval(raw in proptest::num::f64::ANY, passed in any::<bool>()) {
            let claim = Claim::qualitative("c", "t");
            let verdict = ValidationVerdict::completed(
                &claim, ValidationMethod::FactCheckAndPlausibility, passed, raw, "", vec![]);
            prop_assert!((0.0..=1.0).contains(&verdict.confidence()));
        }

        #[test]
        fn prop_unvalidated_never_passes(explanation in ".*") {
            let claim = Claim::quantitative("c", "t");
            let verdict = ValidationVerdict::failed(
                &claim, ValidationMethod::GeneratedScript, explanation, None);
            prop_assert!(!verdict.validated());
            prop_assert!(!verdict.passed());
        }
    }
}
