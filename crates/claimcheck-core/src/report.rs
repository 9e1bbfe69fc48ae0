//! Per-lane result records.

use serde::Serialize;

use crate::claim::Claim;
use crate::verdict::ValidationVerdict;

/// Result of validating one citation batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub citation_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_marker: Option<String>,

    pub fetch_successful: bool,

    /// Local path of the fetched resource; already released when the batch
    /// result is produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_format: Option<String>,

    pub claim_results: Vec<ValidationVerdict>,

    /// Non-fatal issues, such as a failed release
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Terminal outcome of an uncited quantitative claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UncitedQuantitativeOutcome {
    /// Fact-check or plausibility evidence cleared the high-confidence bar
    ResolvedByFallback {
        claim: Claim,
        verdict: ValidationVerdict,
    },

    /// A dataset was found; the enriched claim was validated in the cited
    /// quantitative lane
    SourceDiscovered { claim: Claim },

    /// Neither fallback evidence nor a dataset was available
    Unvalidated { claim: Claim, explanation: String },
}

impl UncitedQuantitativeOutcome {
    pub fn claim(&self) -> &Claim {
        match self {
            UncitedQuantitativeOutcome::ResolvedByFallback { claim, .. }
            | UncitedQuantitativeOutcome::SourceDiscovered { claim }
            | UncitedQuantitativeOutcome::Unvalidated { claim, .. } => claim,
        }
    }

    pub fn verdict(&self) -> Option<&ValidationVerdict> {
        match self {
            UncitedQuantitativeOutcome::ResolvedByFallback { verdict, .. } => Some(verdict),
            _ => None,
        }
    }
}

/// Aggregate counts over a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total_claims: usize,
    pub validated: usize,
    pub passed: usize,
    pub failed: usize,
    pub unvalidated: usize,
    pub sources_discovered: usize,
    pub batches: usize,
    pub failed_fetches: usize,
}

impl ReportSummary {
    pub fn tally(
        uncited_qualitative: &[ValidationVerdict],
        uncited_quantitative: &[UncitedQuantitativeOutcome],
        batches: &[&BatchResult],
    ) -> Self {
        let mut summary = Self::default();

        let mut count = |verdict: &ValidationVerdict| {
            summary.total_claims += 1;
            if !verdict.validated() {
                summary.unvalidated += 1;
            } else {
                summary.validated += 1;
                if verdict.passed() {
                    summary.passed += 1;
                } else {
                    summary.failed += 1;
                }
            }
        };

        uncited_qualitative.iter().for_each(&mut count);
        batches
            .iter()
            .flat_map(|b| b.claim_results.iter())
            .for_each(&mut count);

        let mut unresolved = 0;
        for outcome in uncited_quantitative {
            match outcome {
                UncitedQuantitativeOutcome::ResolvedByFallback { verdict, .. } => count(verdict),
                // counted through its batch result
                UncitedQuantitativeOutcome::SourceDiscovered { .. } => {}
                UncitedQuantitativeOutcome::Unvalidated { .. } => unresolved += 1,
            }
        }

        summary.total_claims += unresolved;
        summary.unvalidated += unresolved;
        summary.sources_discovered = uncited_quantitative
            .iter()
            .filter(|o| matches!(o, UncitedQuantitativeOutcome::SourceDiscovered { .. }))
            .count();
        summary.batches = batches.len();
        summary.failed_fetches = batches.iter().filter(|b| !b.fetch_successful).count();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::ValidationMethod;

    #[test]
    fn test_tally_counts_each_claim_once() {
        let qual = Claim::qualitative("q1", "a");
        let quant = Claim::quantitative("n1", "b");
        let discovered = Claim::quantitative("n2", "c");

        let uncited_qualitative = vec![ValidationVerdict::completed(
            &qual,
            ValidationMethod::FactCheckAndPlausibility,
            true,
            0.9,
            "",
            vec![],
        )];
        let uncited_quantitative = vec![
            UncitedQuantitativeOutcome::Unvalidated {
                claim: quant,
                explanation: "no dataset".to_string(),
            },
            UncitedQuantitativeOutcome::SourceDiscovered {
                claim: discovered.clone(),
            },
        ];
        let batch = BatchResult {
            citation_id: "found_n2".to_string(),
            citation_marker: None,
            fetch_successful: false,
            source_path: None,
            source_format: None,
            claim_results: vec![ValidationVerdict::failed(
                &discovered,
                ValidationMethod::GeneratedScript,
                "Batch failed",
                None,
            )],
            notes: vec![],
        };

        let summary = ReportSummary::tally(&uncited_qualitative, &uncited_quantitative, &[&batch]);
        assert_eq!(summary.total_claims, 3);
        assert_eq!(summary.validated, 1);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.unvalidated, 2);
        assert_eq!(summary.sources_discovered, 1);
        assert_eq!(summary.failed_fetches, 1);
    }
}
