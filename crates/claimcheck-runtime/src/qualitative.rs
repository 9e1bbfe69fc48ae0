//! Qualitative validation by retrieval then adjudication.

use std::sync::Arc;

use claimcheck_core::structured::Adjudication;
use claimcheck_core::{Claim, EvidenceRetriever, ValidationMethod, ValidationVerdict};

use crate::evidence::QuoteVerifier;
use crate::generation::{generate_structured, Capability, GenerationRequest, TextGenerationService};
use crate::prompts;

const METHOD: ValidationMethod = ValidationMethod::RetrievalAdjudication;

pub struct QualitativeValidator {
    generator: Arc<dyn TextGenerationService>,
    retriever: EvidenceRetriever,
}

impl QualitativeValidator {
    pub fn new(generator: Arc<dyn TextGenerationService>, retriever: EvidenceRetriever) -> Self {
        Self {
            generator,
            retriever,
        }
    }

    /// Retrieve the passages closest to the claim and have them adjudicated.
    ///
    /// No passage above the similarity floor ends validation without a
    /// generation call. A completed adjudication is `validated` whether it
    /// accepts or rejects the claim.
    pub async fn validate(&self, claim: &Claim, source_text: &str) -> ValidationVerdict {
        let chunks = self.retriever.chunk(source_text);
        if chunks.is_empty() {
            return ValidationVerdict::failed(
                claim,
                METHOD,
                "Source text is empty or could not be chunked",
                None,
            );
        }

        let retrieved = self.retriever.rank(&claim.text, &chunks);
        if retrieved.is_empty() {
            tracing::info!(claim_id = %claim.id, chunks = chunks.len(), "No relevant evidence found");
            return ValidationVerdict::failed(claim, METHOD, "No relevant evidence found", None);
        }

        tracing::debug!(
            claim_id = %claim.id,
            retrieved = retrieved.len(),
            top_score = retrieved[0].score,
            "Adjudicating against retrieved passages"
        );

        let request = GenerationRequest::structured(
            Capability::Adjudication,
            prompts::ADJUDICATION_SYSTEM_PROMPT,
            prompts::adjudication_prompt(&claim.text, &retrieved),
        );

        let adjudication: Adjudication =
            match generate_structured(self.generator.as_ref(), request).await {
                Ok(adjudication) => adjudication,
                Err(e) => {
                    tracing::warn!(claim_id = %claim.id, error = %e, "Adjudication failed");
                    return ValidationVerdict::failed(
                        claim,
                        METHOD,
                        "Adjudication failed",
                        Some(e.to_string()),
                    );
                }
            };

        let check = QuoteVerifier::new(&retrieved).check_all(&adjudication.supporting_quotes);
        if !check.all_verified() {
            tracing::warn!(
                claim_id = %claim.id,
                dropped = check.rejected.len(),
                "Dropped unverifiable quotes"
            );
        }

        let verdict = ValidationVerdict::completed(
            claim,
            METHOD,
            adjudication.passed,
            adjudication.confidence,
            adjudication.explanation,
            check.verified.clone(),
        );

        match check.note() {
            Some(note) => verdict.with_note(&note),
            None => verdict,
        }
    }
}
