//! Evidence-less plausibility judgment.

use std::sync::Arc;

use claimcheck_core::structured::PlausibilityReply;
use claimcheck_core::verdict::clamp_confidence;
use claimcheck_core::PlausibilityAssessment;

use crate::generation::{generate_structured, Capability, GenerationRequest, TextGenerationService};
use crate::prompts;

pub struct PlausibilityChecker {
    generator: Arc<dyn TextGenerationService>,
}

impl PlausibilityChecker {
    pub fn new(generator: Arc<dyn TextGenerationService>) -> Self {
        Self { generator }
    }

    /// Ask for a critical judgment of the claim. A failed or malformed
    /// generation is an implausible, zero-confidence assessment.
    pub async fn verify(&self, text: &str) -> PlausibilityAssessment {
        let request = GenerationRequest::structured(
            Capability::Plausibility,
            prompts::PLAUSIBILITY_SYSTEM_PROMPT,
            prompts::plausibility_prompt(text),
        );

        match generate_structured::<PlausibilityReply>(self.generator.as_ref(), request).await {
            Ok(reply) => PlausibilityAssessment {
                plausible: reply.plausible,
                confidence: clamp_confidence(reply.confidence),
                reasoning: reply.reasoning,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Plausibility check failed");
                PlausibilityAssessment::failed(format!("Verification error: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{Generation, GenerationError};
    use async_trait::async_trait;

    struct Reply(&'static str);

    #[async_trait]
    impl TextGenerationService for Reply {
        async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError> {
            assert_eq!(request.capability, Capability::Plausibility);
            if self.0.is_empty() {
                return Err(GenerationError::Empty);
            }
            Ok(Generation {
                text: self.0.to_string(),
                usage: Default::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_plausible_reply() {
        let checker = PlausibilityChecker::new(Arc::new(Reply(
            r#"{"plausible": true, "confidence": 0.9, "reasoning": "Rayleigh scattering"}"#,
        )));
        let assessment = checker.verify("The sky is blue").await;
        assert!(assessment.plausible);
        assert_eq!(assessment.confidence, 0.9);
        assert_eq!(assessment.reasoning, "Rayleigh scattering");
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_rejected() {
        let checker = PlausibilityChecker::new(Arc::new(Reply(
            r#"{"plausible": true, "confidence": 7, "reasoning": "sure"}"#,
        )));
        let assessment = checker.verify("x").await;
        assert!(!assessment.plausible);
        assert_eq!(assessment.confidence, 0.0);
        assert!(assessment.reasoning.starts_with("Verification error"));
    }

    #[tokio::test]
    async fn test_generation_failure() {
        let checker = PlausibilityChecker::new(Arc::new(Reply("")));
        let assessment = checker.verify("x").await;
        assert!(!assessment.plausible);
        assert_eq!(assessment.confidence, 0.0);
    }
}
