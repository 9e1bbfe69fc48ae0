//! # claimcheck-runtime
//!
//! Async validation of extracted claims.
//!
//! `claimcheck-core` decides how each claim is validated. This crate does the
//! IO: it fetches cited datasets and documents, runs generated analysis
//! scripts in a sandbox, queries a fact-check index and calls text
//! generation providers.
//!
//! ## Failure model
//!
//! Nothing fails past [`ValidationOrchestrator::process`]. Fetch, generation,
//! execution and parse errors all become unvalidated verdicts with the error
//! attached. Only construction returns a [`RuntimeError`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use claimcheck_runtime::{RuntimeConfig, ValidationOrchestratorBuilder};
//!
//! let config = RuntimeConfig::from_yaml_file("claimcheck.yaml")?;
//! let orchestrator = ValidationOrchestratorBuilder::from_config(config)?.build()?;
//!
//! let report = orchestrator.process(claims).await;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

pub mod cache;
pub mod config;
pub mod evidence;
pub mod factcheck;
pub mod fetch;
pub mod finder;
pub mod generation;
pub mod orchestrator;
pub mod plausibility;
pub mod prompts;
pub mod providers;
pub mod qualitative;
pub mod resilience;
pub mod sandbox;
pub mod script;

pub use config::{ConfigError, RuntimeConfig};
pub use factcheck::{FactCheckError, FactCheckIndex, FactCheckLookup, GoogleFactCheckIndex};
pub use fetch::{FetchError, FetchedResource, HttpDatasetFetcher, HttpTextFetcher, ResourceFetcher};
pub use finder::{
    CatalogEntry, CatalogSearch, DatasetFinder, DatasetSearch, DiscoveredSourceRegistry,
    NoDatasetFinder, ReusingDatasetFinder, SearchError,
};
pub use generation::{
    Capability, Generation, GenerationError, GenerationRequest, LlmTextGenerator,
    TextGenerationService,
};
pub use orchestrator::{ValidationOrchestrator, ValidationOrchestratorBuilder, ValidationReport};
pub use plausibility::PlausibilityChecker;
pub use providers::{LlmProvider, ProviderError, ProviderRegistry};
pub use qualitative::QualitativeValidator;
pub use resilience::{BudgetTracker, CircuitBreaker, LlmUsage};
pub use sandbox::{ExecutionOutcome, GeneratedScript, ProcessSandbox, Sandbox, SandboxError};
pub use script::ScriptValidator;

use thiserror::Error;

/// Errors from building the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Fetcher setup failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Fact-check client setup failed: {0}")]
    FactCheck(#[from] FactCheckError),

    #[error(transparent)]
    Search(#[from] SearchError),
}
