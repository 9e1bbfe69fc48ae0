//! Runtime orchestrator for claim validation.
//!
//! The orchestrator routes claims into four lanes and runs each lane:
//! - Uncited qualitative: fact-check and plausibility fan-out via `tokio::join!`
//! - Uncited quantitative: the same fallback, then dataset discovery
//! - Cited quantitative: one dataset fetch per citation, a script per claim
//! - Cited qualitative: one text fetch per citation, retrieval per claim
//!
//! Nothing fails past this boundary. Every component error ends up in a
//! verdict or an outcome.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;

use claimcheck_core::{
    BatchResult, CitationBatch, Claim, EvidenceRetriever, Lane, LanePartition, ReportSummary,
    Synthesizer, UncitedQuantitativeOutcome, ValidationMethod, ValidationVerdict,
};

use crate::config::RuntimeConfig;
use crate::factcheck::{FactCheckIndex, FactCheckLookup, GoogleFactCheckIndex};
use crate::fetch::{
    with_fetched_resource, Acquisition, FetchedResource, HttpDatasetFetcher, HttpTextFetcher,
    ResourceFetcher,
};
use crate::finder::{
    CatalogSearch, DatasetFinder, DiscoveredSourceRegistry, NoDatasetFinder, ReusingDatasetFinder,
};
use crate::generation::{LlmTextGenerator, TextGenerationService};
use crate::plausibility::PlausibilityChecker;
use crate::providers::{LlmProvider, ProviderRegistry};
use crate::qualitative::QualitativeValidator;
use crate::resilience::{BudgetTracker, CircuitBreaker, LlmUsage};
use crate::sandbox::{ProcessSandbox, Sandbox};
use crate::script::ScriptValidator;
use crate::RuntimeError;

/// Everything one `process` call produced.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub uncited_qualitative: Vec<ValidationVerdict>,
    pub uncited_quantitative: Vec<UncitedQuantitativeOutcome>,
    pub cited_quantitative: Vec<BatchResult>,
    pub cited_qualitative: Vec<BatchResult>,

    /// Generation usage for this run
    pub usage: LlmUsage,

    pub summary: ReportSummary,
}

/// Which fetched resource a batch needs.
/// Runs one claim's validation step; a panic degrades that claim only.
async fn contain_panic<Fut>(claim: &Claim, method: ValidationMethod, step: Fut) -> ValidationVerdict
where
    Fut: Future<Output = ValidationVerdict>,
{
    match AssertUnwindSafe(step).catch_unwind().await {
        Ok(verdict) => verdict,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(claim_id = %claim.id, panic = %message, "Validation step panicked");
            ValidationVerdict::failed(claim, method, "Validation step panicked", Some(message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[derive(Debug, Clone, Copy)]
enum BatchKind {
    Dataset,
    Text,
}

impl BatchKind {
    fn method(self) -> ValidationMethod {
        match self {
            BatchKind::Dataset => ValidationMethod::GeneratedScript,
            BatchKind::Text => ValidationMethod::RetrievalAdjudication,
        }
    }

    fn resource(self) -> &'static str {
        match self {
            BatchKind::Dataset => "dataset",
            BatchKind::Text => "text source",
        }
    }
}

/// Routes claims to their lane and assembles the report.
pub struct ValidationOrchestrator {
    config: RuntimeConfig,
    generator: Arc<dyn TextGenerationService>,
    fact_check: FactCheckLookup,
    plausibility: PlausibilityChecker,
    script_validator: ScriptValidator,
    qualitative_validator: QualitativeValidator,
    dataset_fetcher: Arc<dyn ResourceFetcher>,
    text_fetcher: Arc<dyn ResourceFetcher>,
    finder: Arc<dyn DatasetFinder>,
    registry: DiscoveredSourceRegistry,
    synthesizer: Synthesizer,
}

impl ValidationOrchestrator {
    pub fn builder() -> ValidationOrchestratorBuilder {
        ValidationOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Sources discovered so far, shared across runs of this orchestrator.
    pub fn registry(&self) -> &DiscoveredSourceRegistry {
        &self.registry
    }

    /// Validate every claim.
    ///
    /// # Execution Flow
    /// 1. Partition claims into lanes (deterministic)
    /// 2. Uncited qualitative: fallback evidence, synthesized
    /// 3. Uncited quantitative: fallback, else discovery, else unvalidated
    /// 4. Discovered claims join the cited quantitative batches
    /// 5. Cited batches: fetch once, validate each claim, release
    pub async fn process(&self, claims: Vec<Claim>) -> ValidationReport {
        self.generator.reset_usage();

        let partition = LanePartition::from_claims(claims);
        tracing::info!(
            uncited_qualitative = partition.claim_count(Lane::UncitedQualitative),
            uncited_quantitative = partition.claim_count(Lane::UncitedQuantitative),
            cited_quantitative = partition.claim_count(Lane::CitedQuantitative),
            cited_qualitative = partition.claim_count(Lane::CitedQualitative),
            "Claims routed"
        );

        let LanePartition {
            uncited_qualitative,
            uncited_quantitative,
            mut cited_quantitative,
            cited_qualitative,
        } = partition;

        let uncited_qualitative: Vec<ValidationVerdict> = stream::iter(&uncited_qualitative)
            .map(|claim| self.fallback_verdict(claim))
            .buffered(self.config.concurrency.uncited_claims.max(1))
            .collect()
            .await;

        // Sequential: each discovery may append to the shared registry that
        // the next claim's reuse decision reads.
        let mut outcomes = Vec::with_capacity(uncited_quantitative.len());
        for claim in uncited_quantitative {
            outcomes.push(self.resolve_uncited_quantitative(claim).await);
        }

        let discovered: Vec<Claim> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                UncitedQuantitativeOutcome::SourceDiscovered { claim } => Some(claim.clone()),
                _ => None,
            })
            .collect();
        if !discovered.is_empty() {
            tracing::info!(count = discovered.len(), "Forwarding claims with discovered sources");
            cited_quantitative.extend(LanePartition::from_claims(discovered).cited_quantitative);
        }

        let cited_quantitative = self.run_batches(cited_quantitative, BatchKind::Dataset).await;
        let cited_qualitative = self.run_batches(cited_qualitative, BatchKind::Text).await;

        let batches: Vec<&BatchResult> = cited_quantitative
            .iter()
            .chain(cited_qualitative.iter())
            .collect();
        let summary = ReportSummary::tally(&uncited_qualitative, &outcomes, &batches);

        tracing::info!(
            total = summary.total_claims,
            validated = summary.validated,
            passed = summary.passed,
            unvalidated = summary.unvalidated,
            failed_fetches = summary.failed_fetches,
            "Validation complete"
        );

        ValidationReport {
            uncited_qualitative,
            uncited_quantitative: outcomes,
            cited_quantitative,
            cited_qualitative,
            usage: self.generator.usage(),
            summary,
        }
    }

    /// Fact-check and plausibility in parallel, then synthesis.
    async fn fallback_verdict(&self, claim: &Claim) -> ValidationVerdict {
        let (fact_check, plausibility) = tokio::join!(
            self.fact_check.check(&claim.text),
            self.plausibility.verify(&claim.text),
        );
        let verdict = self.synthesizer.combine(claim, &fact_check, &plausibility);
        tracing::debug!(
            claim_id = %claim.id,
            passed = verdict.passed(),
            confidence = verdict.confidence(),
            "Fallback verdict"
        );
        verdict
    }

    async fn resolve_uncited_quantitative(&self, claim: Claim) -> UncitedQuantitativeOutcome {
        let (fact_check, plausibility) = tokio::join!(
            self.fact_check.check(&claim.text),
            self.plausibility.verify(&claim.text),
        );

        if self.synthesizer.clears_threshold(&fact_check, &plausibility) {
            let verdict = self.synthesizer.combine(&claim, &fact_check, &plausibility);
            tracing::info!(
                claim_id = %claim.id,
                confidence = verdict.confidence(),
                "Resolved without a dataset"
            );
            return UncitedQuantitativeOutcome::ResolvedByFallback { claim, verdict };
        }

        let Some(source) = self.finder.find(&claim, &self.registry).await else {
            tracing::info!(claim_id = %claim.id, "No dataset found");
            return UncitedQuantitativeOutcome::Unvalidated {
                explanation: format!(
                    "No fact-check or plausibility evidence above {:.2} and no dataset found",
                    self.synthesizer.high_confidence()
                ),
                claim,
            };
        };

        match claim.enrich_with_discovered_source(source) {
            Ok(enriched) => {
                tracing::info!(
                    claim_id = %claim.id,
                    citation_id = ?enriched.citation_id(),
                    "Dataset discovered"
                );
                UncitedQuantitativeOutcome::SourceDiscovered { claim: enriched }
            }
            Err(e) => {
                tracing::warn!(claim_id = %claim.id, error = %e, "Discovered source rejected");
                UncitedQuantitativeOutcome::Unvalidated {
                    explanation: e.to_string(),
                    claim,
                }
            }
        }
    }

    async fn run_batches(&self, batches: Vec<CitationBatch>, kind: BatchKind) -> Vec<BatchResult> {
        stream::iter(batches)
            .map(|batch| self.run_batch(batch, kind))
            .buffered(self.config.concurrency.batches.max(1))
            .collect()
            .await
    }

    async fn run_batch(&self, batch: CitationBatch, kind: BatchKind) -> BatchResult {
        tracing::info!(
            citation_id = batch.citation_id(),
            claims = batch.len(),
            resource = kind.resource(),
            "Processing batch"
        );

        let fetcher = match kind {
            BatchKind::Dataset => self.dataset_fetcher.as_ref(),
            BatchKind::Text => self.text_fetcher.as_ref(),
        };
        let claims = batch.claims();

        let acquisition = with_fetched_resource(
            fetcher,
            batch.locator(),
            batch.scope_id(),
            |resource| async move {
                match kind {
                    BatchKind::Dataset => self.validate_against_dataset(claims, &resource).await,
                    BatchKind::Text => self.validate_against_text(claims, resource).await,
                }
            },
        )
        .await;

        self.batch_result(&batch, kind, acquisition)
    }

    async fn validate_against_dataset(
        &self,
        claims: &[Claim],
        resource: &FetchedResource,
    ) -> Vec<ValidationVerdict> {
        let mut results = Vec::with_capacity(claims.len());
        for claim in claims {
            let step = self.script_validator.validate(claim, &resource.local_path);
            results.push(contain_panic(claim, ValidationMethod::GeneratedScript, step).await);
        }
        results
    }

    async fn validate_against_text(
        &self,
        claims: &[Claim],
        resource: FetchedResource,
    ) -> Vec<ValidationVerdict> {
        let text = match resource.text_content {
            Some(text) => text,
            None => tokio::fs::read_to_string(&resource.local_path)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(path = %resource.local_path.display(), error = %e, "Unreadable text source");
                    String::new()
                }),
        };

        let mut results = Vec::with_capacity(claims.len());
        for claim in claims {
            let step = self.qualitative_validator.validate(claim, &text);
            results.push(contain_panic(claim, ValidationMethod::RetrievalAdjudication, step).await);
        }
        results
    }

    fn batch_result(
        &self,
        batch: &CitationBatch,
        kind: BatchKind,
        acquisition: Acquisition<Vec<ValidationVerdict>>,
    ) -> BatchResult {
        match acquisition {
            Acquisition::FetchFailed(error) => {
                tracing::warn!(
                    citation_id = batch.citation_id(),
                    error = %error,
                    "Batch failed: {} fetch failed",
                    kind.resource()
                );
                let explanation = format!("Batch failed: could not fetch {}: {error}", kind.resource());
                let error = error.to_string();

                BatchResult {
                    citation_id: batch.citation_id().to_string(),
                    citation_marker: batch.marker().map(str::to_string),
                    fetch_successful: false,
                    source_path: None,
                    source_format: None,
                    claim_results: batch
                        .claims()
                        .iter()
                        .map(|claim| {
                            ValidationVerdict::failed(
                                claim,
                                kind.method(),
                                explanation.as_str(),
                                Some(error.clone()),
                            )
                        })
                        .collect(),
                    notes: Vec::new(),
                }
            }
            Acquisition::Completed {
                path,
                format,
                value,
                release_error,
            } => {
                let notes = release_error
                    .map(|e| format!("Failed to release {}: {e}", path.display()))
                    .into_iter()
                    .collect();

                BatchResult {
                    citation_id: batch.citation_id().to_string(),
                    citation_marker: batch.marker().map(str::to_string),
                    fetch_successful: true,
                    source_path: Some(path.display().to_string()),
                    source_format: Some(format),
                    claim_results: value,
                    notes,
                }
            }
        }
    }
}

/// Builder for [`ValidationOrchestrator`].
///
/// Only the generator is required. Everything else defaults to the real
/// network, filesystem and subprocess components described by the config.
pub struct ValidationOrchestratorBuilder {
    config: RuntimeConfig,
    generator: Option<Arc<dyn TextGenerationService>>,
    fact_check_index: Option<Arc<dyn FactCheckIndex>>,
    dataset_fetcher: Option<Arc<dyn ResourceFetcher>>,
    text_fetcher: Option<Arc<dyn ResourceFetcher>>,
    sandbox: Option<Arc<dyn Sandbox>>,
    finder: Option<Arc<dyn DatasetFinder>>,
    catalog: Option<CatalogSearch>,
    registry: Option<DiscoveredSourceRegistry>,
}

impl ValidationOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            generator: None,
            fact_check_index: None,
            dataset_fetcher: None,
            text_fetcher: None,
            sandbox: None,
            finder: None,
            catalog: None,
            registry: None,
        }
    }

    /// Builder with the configured provider already created.
    pub fn from_config(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let registry = ProviderRegistry::with_defaults();
        let provider = registry.create(&config.provider)?;
        Ok(Self::new().config(config).provider(provider))
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Wrap a provider with the breaker and budget from the config. The
    /// config must be set first.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        let generator = LlmTextGenerator::new(
            provider,
            self.config.completion.clone(),
            CircuitBreaker::new(self.config.circuit_breaker.clone()),
            BudgetTracker::from_config(&self.config.budgets),
        );
        self.generator = Some(Arc::new(generator));
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerationService>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn fact_check_index(mut self, index: Arc<dyn FactCheckIndex>) -> Self {
        self.fact_check_index = Some(index);
        self
    }

    pub fn dataset_fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.dataset_fetcher = Some(fetcher);
        self
    }

    pub fn text_fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.text_fetcher = Some(fetcher);
        self
    }

    pub fn sandbox(mut self, sandbox: Arc<dyn Sandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    pub fn finder(mut self, finder: Arc<dyn DatasetFinder>) -> Self {
        self.finder = Some(finder);
        self
    }

    /// Search this catalog for uncited quantitative claims, reusing
    /// registered datasets first. Ignored when a finder is set.
    pub fn catalog(mut self, catalog: CatalogSearch) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Share a registry with another orchestrator.
    pub fn registry(mut self, registry: DiscoveredSourceRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<ValidationOrchestrator, RuntimeError> {
        self.config.validate()?;
        let config = self.config;

        let generator = self.generator.ok_or_else(|| {
            RuntimeError::NotConfigured("No text generation service set".to_string())
        })?;

        let fact_check_index: Arc<dyn FactCheckIndex> = match self.fact_check_index {
            Some(index) => index,
            None => Arc::new(GoogleFactCheckIndex::new(config.fact_check.clone())?),
        };
        let dataset_fetcher: Arc<dyn ResourceFetcher> = match self.dataset_fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpDatasetFetcher::new(config.fetch.clone())?),
        };
        let text_fetcher: Arc<dyn ResourceFetcher> = match self.text_fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpTextFetcher::new(config.fetch.clone())?),
        };
        let sandbox: Arc<dyn Sandbox> = self
            .sandbox
            .unwrap_or_else(|| Arc::new(ProcessSandbox::new(config.sandbox.clone())));

        let finder: Arc<dyn DatasetFinder> = match (self.finder, self.catalog) {
            (Some(finder), _) => finder,
            (None, Some(catalog)) => Arc::new(ReusingDatasetFinder::new(
                catalog,
                generator.clone(),
                config.thresholds.dataset_reuse,
            )),
            (None, None) => Arc::new(NoDatasetFinder),
        };

        let archive_dir: Option<PathBuf> = config.sandbox.script_archive_dir.clone();

        Ok(ValidationOrchestrator {
            fact_check: FactCheckLookup::new(fact_check_index),
            plausibility: PlausibilityChecker::new(generator.clone()),
            script_validator: ScriptValidator::new(generator.clone(), sandbox, archive_dir),
            qualitative_validator: QualitativeValidator::new(
                generator.clone(),
                EvidenceRetriever::new(config.retrieval.clone()),
            ),
            synthesizer: Synthesizer::new(config.thresholds.high_confidence),
            registry: self.registry.unwrap_or_default(),
            generator,
            dataset_fetcher,
            text_fetcher,
            finder,
            config,
        })
    }
}

impl Default for ValidationOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
