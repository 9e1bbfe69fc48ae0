//! The text-generation capability.
//!
//! Validators never talk to a provider directly. They describe what they
//! need as a [`GenerationRequest`] and go through [`TextGenerationService`],
//! which is where the circuit breaker, token budget and reply repair live.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use claimcheck_core::structured::{self, extract_code, extract_json_object, StructuredReply};
use claimcheck_core::ShapeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError, TokenUsage};
use crate::resilience::{BudgetTracker, CircuitBreaker, LlmUsage};

/// What a generation call is for. Breakers, budgets and usage are kept
/// per capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Plausibility,
    ScriptGeneration,
    Adjudication,
    DatasetReuse,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Plausibility => "plausibility",
            Capability::ScriptGeneration => "script_generation",
            Capability::Adjudication => "adjudication",
            Capability::DatasetReuse => "dataset_reuse",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected form of the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// A single JSON object
    Structured,
    /// Anything, e.g. source code
    FreeText,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub capability: Capability,
    pub system: String,
    pub prompt: String,
    pub shape: ResponseShape,
}

impl GenerationRequest {
    pub fn structured(
        capability: Capability,
        system: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            capability,
            system: system.into(),
            prompt: prompt.into(),
            shape: ResponseShape::Structured,
        }
    }

    pub fn free_text(
        capability: Capability,
        system: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            capability,
            system: system.into(),
            prompt: prompt.into(),
            shape: ResponseShape::FreeText,
        }
    }
}

/// Text returned by a generation call. Structured replies have already been
/// narrowed to the JSON object.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Circuit open for {0}")]
    CircuitOpen(Capability),

    #[error("Token budget exceeded for {0}")]
    BudgetExceeded(Capability),

    #[error("Generation returned an empty reply")]
    Empty,

    #[error("Malformed structured reply: {0}")]
    Malformed(#[from] ShapeError),
}

/// Single entry point for text generation.
#[async_trait]
pub trait TextGenerationService: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError>;

    /// Usage accumulated so far.
    fn usage(&self) -> LlmUsage {
        LlmUsage::default()
    }

    /// Start a new run: clear usage and restore budgets.
    fn reset_usage(&self) {}
}

/// Generate and decode a structured reply in one step.
pub async fn generate_structured<T: StructuredReply>(
    service: &dyn TextGenerationService,
    request: GenerationRequest,
) -> Result<T, GenerationError> {
    let generation = service.generate(request).await?;
    Ok(structured::parse_reply(&generation.text)?)
}

/// [`TextGenerationService`] backed by an [`LlmProvider`].
pub struct LlmTextGenerator {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
    breaker: CircuitBreaker,
    budget: BudgetTracker,
}

impl LlmTextGenerator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: CompletionConfig,
        breaker: CircuitBreaker,
        budget: BudgetTracker,
    ) -> Self {
        Self {
            provider,
            config,
            breaker,
            budget,
        }
    }

    fn estimate(&self, request: &GenerationRequest) -> u32 {
        self.provider.estimate_tokens(&request.system)
            + self.provider.estimate_tokens(&request.prompt)
            + self.config.max_tokens
    }
}

/// Narrow a structured reply to its JSON object. Providers without a JSON
/// mode wrap objects in prose or fences.
fn repair_structured(text: &str) -> Option<String> {
    let cleaned = extract_code(text);
    extract_json_object(&cleaned).map(str::to_string)
}

#[async_trait]
impl TextGenerationService for LlmTextGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError> {
        let capability = request.capability;

        if !self.breaker.admits(capability) {
            tracing::warn!(capability = %capability, "Circuit open, skipping generation");
            return Err(GenerationError::CircuitOpen(capability));
        }

        let estimated = self.estimate(&request);
        if !self.budget.can_afford(capability, estimated) {
            tracing::warn!(
                capability = %capability,
                estimated,
                remaining = self.budget.remaining_for(capability),
                "Token budget exhausted"
            );
            return Err(GenerationError::BudgetExceeded(capability));
        }

        let config = CompletionConfig {
            json_mode: request.shape == ResponseShape::Structured,
            ..self.config.clone()
        };
        let messages = vec![
            ChatMessage::system(request.system),
            ChatMessage::user(request.prompt),
        ];

        let response = match self.provider.complete(messages, &config).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(capability = %capability, error = %e, "Generation failed");
                self.breaker.record_failure(capability);
                return Err(e.into());
            }
        };

        self.budget
            .record_usage(capability, &response.usage, &response.model);
        self.breaker.record_success(capability);

        tracing::debug!(
            capability = %capability,
            model = %response.model,
            tokens = response.usage.total(),
            "Generation complete"
        );

        if response.content.trim().is_empty() {
            return Err(GenerationError::Empty);
        }

        let text = match request.shape {
            ResponseShape::FreeText => response.content,
            ResponseShape::Structured => {
                repair_structured(&response.content).ok_or(ShapeError::NoJson)?
            }
        };

        Ok(Generation {
            text,
            usage: response.usage,
        })
    }

    fn usage(&self) -> LlmUsage {
        self.budget.get_usage()
    }

    fn reset_usage(&self) {
        self.budget.reset();
    }
}
