//! Lexical evidence retrieval.
//!
//! A source text is split into overlapping sentence-bounded chunks, the claim
//! and all chunks are vectorized together with TF-IDF, and the chunks most
//! similar to the claim are returned.

mod chunker;
mod tfidf;

pub use chunker::{chunk_text, split_sentences};
pub use tfidf::TfIdfIndex;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Retrieval tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,

    /// Maximum number of chunks returned
    pub top_k: usize,

    /// Minimum cosine similarity a chunk needs to be returned (inclusive)
    pub similarity_floor: f64,

    /// Vocabulary cap
    pub max_features: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            top_k: 5,
            similarity_floor: 0.1,
            max_features: 1000,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.chunk_size == 0 {
            return Err(CoreError::InvalidConfig("retrieval.chunk_size must be positive".into()));
        }
        if self.top_k == 0 {
            return Err(CoreError::InvalidConfig("retrieval.top_k must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.similarity_floor) {
            return Err(CoreError::InvalidConfig(
                "retrieval.similarity_floor must be within [0, 1]".into(),
            ));
        }
        if self.max_features == 0 {
            return Err(CoreError::InvalidConfig("retrieval.max_features must be positive".into()));
        }
        Ok(())
    }
}

/// A passage of source text and its similarity to the claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct EvidenceRetriever {
    config: RetrievalConfig,
}

impl EvidenceRetriever {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn chunk(&self, source_text: &str) -> Vec<String> {
        chunk_text(source_text, self.config.chunk_size)
    }

    /// Chunks at or above the similarity floor, best first, at most `top_k`.
    pub fn rank(&self, claim: &str, chunks: &[String]) -> Vec<RetrievedChunk> {
        if chunks.is_empty() {
            return Vec::new();
        }

        let mut corpus: Vec<&str> = Vec::with_capacity(chunks.len() + 1);
        corpus.push(claim);
        corpus.extend(chunks.iter().map(String::as_str));
        let index = TfIdfIndex::fit(&corpus, self.config.max_features);

        let mut ranked: Vec<RetrievedChunk> = chunks
            .iter()
            .enumerate()
            .map(|(i, text)| RetrievedChunk {
                text: text.clone(),
                score: index.similarity(0, i + 1),
            })
            .filter(|chunk| chunk.score > 0.0 && chunk.score >= self.config.similarity_floor)
            .collect();

        // Stable sort keeps document order among equal scores.
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(self.config.top_k);
        ranked
    }

    pub fn retrieve(&self, claim: &str, source_text: &str) -> Vec<RetrievedChunk> {
        self.rank(claim, &self.chunk(source_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "Measles vaccination coverage among kindergarten children reached 93 percent. \
        The survey covered all fifty states. \
        Coverage for the MMR vaccine declined slightly compared with the previous school year. \
        Separately, the committee discussed budget allocations for road maintenance.";

    #[test]
    fn test_retrieves_relevant_chunks_best_first() {
        let retriever = EvidenceRetriever::new(RetrievalConfig {
            chunk_size: 120,
            ..Default::default()
        });
        let chunks = retriever.retrieve("Measles vaccination coverage among children declined", SOURCE);

        assert!(!chunks.is_empty());
        assert!(chunks[0].text.contains("Measles vaccination"));
        assert!(chunks.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(chunks.len() <= 5);
    }

    #[test]
    fn test_unrelated_claim_returns_nothing() {
        let retriever = EvidenceRetriever::default();
        let chunks = retriever.retrieve("Quantum entanglement enables teleportation", SOURCE);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_empty_source_returns_nothing() {
        assert!(EvidenceRetriever::default().retrieve("anything", "").is_empty());
    }

    #[test]
    fn test_top_k_limits_results() {
        let retriever = EvidenceRetriever::new(RetrievalConfig {
            chunk_size: 10,
            top_k: 1,
            similarity_floor: 0.0,
            ..Default::default()
        });
        let chunks = retriever.retrieve("vaccination coverage", SOURCE);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_floor() {
        let config = RetrievalConfig {
            similarity_floor: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(RetrievalConfig::default().validate().is_ok());
    }
}
