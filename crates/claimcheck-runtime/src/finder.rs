//! Dataset discovery for uncited quantitative claims.
//!
//! The finder is an external boundary. Sources it discovers are kept in a
//! [`DiscoveredSourceRegistry`] so later claims can reuse a dataset instead
//! of searching again.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use claimcheck_core::retrieval::TfIdfIndex;
use claimcheck_core::structured::ReuseDecision;
use claimcheck_core::{Claim, DiscoveredSource};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generation::{generate_structured, Capability, GenerationRequest, TextGenerationService};
use crate::prompts;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Dataset search failed: {0}")]
    Failed(String),

    #[error("Failed to load dataset catalog {path}: {message}")]
    Catalog { path: String, message: String },
}

/// Discovered sources shared across one run.
///
/// Reads take a snapshot; appends and reuse counts go through the write
/// lock, so concurrent discoverers never lose an entry.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredSourceRegistry {
    sources: Arc<RwLock<Vec<DiscoveredSource>>>,
}

impl DiscoveredSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<DiscoveredSource> {
        self.sources.read().clone()
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }

    /// Add a newly found source. A source whose URL is already registered
    /// counts as a reuse of the existing entry instead.
    pub fn append(&self, source: DiscoveredSource) -> DiscoveredSource {
        let mut sources = self.sources.write();
        if let Some(existing) = sources.iter_mut().find(|s| s.url == source.url) {
            existing.reuse_count += 1;
            return existing.clone();
        }
        sources.push(source.clone());
        source
    }

    /// Count a reuse of the entry at `index` (0-based).
    pub fn record_reuse(&self, index: usize) -> Option<DiscoveredSource> {
        let mut sources = self.sources.write();
        let source = sources.get_mut(index)?;
        source.reuse_count += 1;
        Some(source.clone())
    }
}

/// Locates a dataset able to validate an uncited quantitative claim.
#[async_trait]
pub trait DatasetFinder: Send + Sync {
    async fn find(
        &self,
        claim: &Claim,
        registry: &DiscoveredSourceRegistry,
    ) -> Option<DiscoveredSource>;
}

/// Finder used when no dataset search is wired in.
pub struct NoDatasetFinder;

#[async_trait]
impl DatasetFinder for NoDatasetFinder {
    async fn find(
        &self,
        _claim: &Claim,
        _registry: &DiscoveredSourceRegistry,
    ) -> Option<DiscoveredSource> {
        None
    }
}

/// A dataset search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetCandidate {
    pub url: String,
    pub repository: String,
    pub relevance_score: f64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

/// Searches data repositories for candidate datasets.
#[async_trait]
pub trait DatasetSearch: Send + Sync {
    async fn search(&self, claim_text: &str) -> Result<Vec<DatasetCandidate>, SearchError>;
}

/// Finder that prefers reusing a registered dataset, then searches.
pub struct ReusingDatasetFinder<S> {
    search: S,
    generator: Arc<dyn TextGenerationService>,
    reuse_threshold: f64,
}

impl<S: DatasetSearch> ReusingDatasetFinder<S> {
    pub fn new(search: S, generator: Arc<dyn TextGenerationService>, reuse_threshold: f64) -> Self {
        Self {
            search,
            generator,
            reuse_threshold,
        }
    }

    async fn reusable(
        &self,
        claim: &Claim,
        registry: &DiscoveredSourceRegistry,
    ) -> Option<DiscoveredSource> {
        let existing = registry.snapshot();
        if existing.is_empty() {
            return None;
        }

        let request = GenerationRequest::structured(
            Capability::DatasetReuse,
            prompts::DATASET_REUSE_SYSTEM_PROMPT,
            prompts::dataset_reuse_prompt(&claim.text, &existing),
        );

        let decision: ReuseDecision =
            match generate_structured(self.generator.as_ref(), request).await {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::warn!(claim_id = %claim.id, error = %e, "Reuse decision failed");
                    return None;
                }
            };

        if !decision.can_reuse || decision.confidence <= self.reuse_threshold {
            return None;
        }

        let index = decision
            .dataset_index
            .filter(|i| (1..=existing.len()).contains(i))?;
        let reused = registry.record_reuse(index - 1)?;

        tracing::info!(
            claim_id = %claim.id,
            url = %reused.url,
            reuse_count = reused.reuse_count,
            "Reusing discovered dataset"
        );
        Some(reused)
    }
}

#[async_trait]
impl<S: DatasetSearch> DatasetFinder for ReusingDatasetFinder<S> {
    async fn find(
        &self,
        claim: &Claim,
        registry: &DiscoveredSourceRegistry,
    ) -> Option<DiscoveredSource> {
        if let Some(reused) = self.reusable(claim, registry).await {
            return Some(reused);
        }

        let candidates = match self.search.search(&claim.text).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(claim_id = %claim.id, error = %e, "Dataset search failed");
                return None;
            }
        };

        // Highest relevance wins; the first of equals is kept.
        let best = candidates.into_iter().fold(None, |best: Option<DatasetCandidate>, c| match best {
            Some(b) if b.relevance_score >= c.relevance_score => Some(b),
            _ => Some(c),
        })?;

        let source = registry.append(DiscoveredSource {
            url: best.url,
            repository: best.repository,
            relevance_score: best.relevance_score,
            found_by_claim_id: claim.id.clone(),
            search_query: Some(best.query.unwrap_or_else(|| claim.text.clone())),
            reuse_count: 0,
        });

        tracing::info!(claim_id = %claim.id, url = %source.url, "Discovered dataset");
        Some(source)
    }
}

/// One dataset in a local catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub url: String,
    pub repository: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// [`DatasetSearch`] over a fixed catalog, ranked by lexical similarity of
/// the claim to each entry's title and description.
pub struct CatalogSearch {
    entries: Vec<CatalogEntry>,
    min_score: f64,
    max_features: usize,
}

impl CatalogSearch {
    pub fn new(entries: Vec<CatalogEntry>, min_score: f64) -> Self {
        Self {
            entries,
            min_score,
            max_features: 1000,
        }
    }

    /// Load a JSON array of [`CatalogEntry`].
    pub fn from_json_file(path: &Path, min_score: f64) -> Result<Self, SearchError> {
        let catalog_error = |message: String| SearchError::Catalog {
            path: path.display().to_string(),
            message,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| catalog_error(e.to_string()))?;
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(&raw).map_err(|e| catalog_error(e.to_string()))?;
        Ok(Self::new(entries, min_score))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DatasetSearch for CatalogSearch {
    async fn search(&self, claim_text: &str) -> Result<Vec<DatasetCandidate>, SearchError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let descriptions: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("{} {}", e.title, e.description))
            .collect();
        let mut corpus: Vec<&str> = vec![claim_text];
        corpus.extend(descriptions.iter().map(String::as_str));
        let index = TfIdfIndex::fit(&corpus, self.max_features);
        tracing::trace!(
            entries = self.entries.len(),
            vocabulary = index.vocabulary_size(),
            "Catalog index fitted"
        );

        let mut candidates: Vec<DatasetCandidate> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry, index.similarity(0, i + 1)))
            .filter(|(_, score)| *score > 0.0 && *score >= self.min_score)
            .map(|(entry, score)| DatasetCandidate {
                url: entry.url.clone(),
                repository: entry.repository.clone(),
                relevance_score: score,
                title: Some(entry.title.clone()),
                query: Some(claim_text.to_string()),
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{Generation, GenerationError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ReuseJudge {
        reply: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerationService for ReuseJudge {
        async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError> {
            assert_eq!(request.capability, Capability::DatasetReuse);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Generation {
                text: self.reply.to_string(),
                usage: Default::default(),
            })
        }
    }

    fn judge(reply: &'static str) -> Arc<ReuseJudge> {
        Arc::new(ReuseJudge {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    fn catalog() -> CatalogSearch {
        CatalogSearch::new(
            vec![
                CatalogEntry {
                    url: "https://data.gov/unemployment.csv".to_string(),
                    repository: "data.gov".to_string(),
                    title: "Monthly unemployment rate".to_string(),
                    description: "National unemployment rate by month since 1948".to_string(),
                },
                CatalogEntry {
                    url: "https://kaggle.com/wheat.csv".to_string(),
                    repository: "kaggle".to_string(),
                    title: "Wheat harvest yields".to_string(),
                    description: "Crop yields per hectare".to_string(),
                },
            ],
            0.0,
        )
    }

    fn source(url: &str) -> DiscoveredSource {
        DiscoveredSource {
            url: url.to_string(),
            repository: "data.gov".to_string(),
            relevance_score: 0.8,
            found_by_claim_id: "q0".to_string(),
            search_query: None,
            reuse_count: 0,
        }
    }

    #[test]
    fn test_registry_append_dedupes_by_url() {
        let registry = DiscoveredSourceRegistry::new();
        registry.append(source("https://a"));
        let again = registry.append(source("https://a"));
        assert_eq!(registry.len(), 1);
        assert_eq!(again.reuse_count, 1);

        assert_eq!(registry.record_reuse(0).unwrap().reuse_count, 2);
        assert!(registry.record_reuse(5).is_none());
    }

    #[tokio::test]
    async fn test_catalog_ranks_by_similarity() {
        let hits = catalog()
            .search("The unemployment rate fell to 3.5% in 2019")
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].repository, "data.gov");
        assert!(hits[0].relevance_score > 0.0);
    }

    #[tokio::test]
    async fn test_search_appends_to_registry() {
        let judge = judge("{}");
        let finder = ReusingDatasetFinder::new(catalog(), judge.clone(), 0.75);
        let registry = DiscoveredSourceRegistry::new();
        let claim = Claim::quantitative("q1", "The unemployment rate fell to 3.5% in 2019");

        let found = finder.find(&claim, &registry).await.unwrap();
        assert_eq!(found.url, "https://data.gov/unemployment.csv");
        assert_eq!(found.found_by_claim_id, "q1");
        assert_eq!(registry.len(), 1);
        // empty registry: no reuse question asked
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_confident_reuse_skips_search() {
        let finder = ReusingDatasetFinder::new(
            CatalogSearch::new(vec![], 0.0),
            judge(r#"{"can_reuse": true, "dataset_index": 1, "confidence": 0.9, "reasoning": "same series"}"#),
            0.75,
        );
        let registry = DiscoveredSourceRegistry::new();
        registry.append(source("https://data.gov/unemployment.csv"));

        let claim = Claim::quantitative("q2", "Unemployment peaked in 2020");
        let reused = finder.find(&claim, &registry).await.unwrap();
        assert_eq!(reused.reuse_count, 1);
        assert_eq!(reused.found_by_claim_id, "q0");
    }

    #[tokio::test]
    async fn test_reuse_threshold_is_strict() {
        let finder = ReusingDatasetFinder::new(
            CatalogSearch::new(vec![], 0.0),
            judge(r#"{"can_reuse": true, "dataset_index": 1, "confidence": 0.75}"#),
            0.75,
        );
        let registry = DiscoveredSourceRegistry::new();
        registry.append(source("https://a"));

        let claim = Claim::quantitative("q2", "x");
        assert!(finder.find(&claim, &registry).await.is_none());
        assert_eq!(registry.snapshot()[0].reuse_count, 0);
    }

    #[tokio::test]
    async fn test_out_of_range_index_ignored() {
        let finder = ReusingDatasetFinder::new(
            CatalogSearch::new(vec![], 0.0),
            judge(r#"{"can_reuse": true, "dataset_index": 3, "confidence": 0.95}"#),
            0.75,
        );
        let registry = DiscoveredSourceRegistry::new();
        registry.append(source("https://a"));

        let claim = Claim::quantitative("q2", "x");
        assert!(finder.find(&claim, &registry).await.is_none());
    }

    #[tokio::test]
    async fn test_no_finder() {
        let registry = DiscoveredSourceRegistry::new();
        let claim = Claim::quantitative("q", "x");
        assert!(NoDatasetFinder.find(&claim, &registry).await.is_none());
    }

    #[test]
    fn test_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"url": "https://x/a.csv", "repository": "data.gov", "title": "GDP"}]"#,
        )
        .unwrap();
        assert_eq!(CatalogSearch::from_json_file(&path, 0.1).unwrap().len(), 1);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            CatalogSearch::from_json_file(&path, 0.1),
            Err(SearchError::Catalog { .. })
        ));
    }
}
