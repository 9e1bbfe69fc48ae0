//! Fact-check index lookup.
//!
//! [`FactCheckIndex`] is the raw search boundary; [`FactCheckLookup`] turns
//! search hits into a [`FactCheckFinding`]. Lookup never fails: a missing
//! key, a network error or an empty result all become "not found".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use claimcheck_core::text::truncate_chars;
use claimcheck_core::verdict::clamp_confidence;
use claimcheck_core::{FactCheckEntry, FactCheckFinding, FactCheckRating};
use serde::Deserialize;
use thiserror::Error;

use crate::cache::{LookupCache, QueryKey};
use crate::config::FactCheckConfig;
use crate::providers::ApiCredential;

/// Environment variable name for the fact-check index key.
pub const FACT_CHECK_API_KEY_ENV: &str = "GOOGLE_FACT_CHECK_API_KEY";

/// Similarity assigned to the first hit, which is taken as the best match.
const BEST_MATCH_SIMILARITY: f64 = 0.8;

#[derive(Error, Debug)]
pub enum FactCheckError {
    #[error("No API key configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Index returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Parse(String),
}

impl FactCheckError {
    /// Worth retrying: network trouble, throttling, server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            FactCheckError::Http(_) | FactCheckError::Timeout(_) => true,
            FactCheckError::Status { status, .. } => *status == 429 || *status >= 500,
            FactCheckError::NotConfigured | FactCheckError::Parse(_) => false,
        }
    }
}

/// A searchable index of published fact checks.
#[async_trait]
pub trait FactCheckIndex: Send + Sync {
    /// Reviews matching the query, best match first.
    async fn search(&self, query: &str) -> Result<Vec<FactCheckEntry>, FactCheckError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    claims: Vec<ClaimHit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimHit {
    #[serde(default)]
    claim_review: Vec<ClaimReview>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimReview {
    #[serde(default)]
    publisher: Option<Publisher>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    textual_rating: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Publisher {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    site: Option<String>,
}

fn entries_from_response(response: SearchResponse) -> Vec<FactCheckEntry> {
    response
        .claims
        .into_iter()
        .flat_map(|hit| hit.claim_review)
        .map(|review| {
            let publisher = review
                .publisher
                .and_then(|p| p.name.or(p.site))
                .unwrap_or_else(|| "Unknown".to_string());
            FactCheckEntry {
                rating: review
                    .textual_rating
                    .unwrap_or_else(|| "Unknown".to_string()),
                publisher,
                url: review.url.unwrap_or_default(),
            }
        })
        .collect()
}

/// Google Fact Check Tools `claims:search` client.
pub struct GoogleFactCheckIndex {
    client: reqwest::Client,
    config: FactCheckConfig,
    credential: Option<ApiCredential>,
    cache: LookupCache,
}

impl GoogleFactCheckIndex {
    /// Key taken from `config.api_key`, else `GOOGLE_FACT_CHECK_API_KEY`.
    /// A missing key is not an error here; searches report it instead.
    pub fn new(config: FactCheckConfig) -> Result<Self, FactCheckError> {
        let credential = ApiCredential::lookup(
            config.api_key.as_deref(),
            FACT_CHECK_API_KEY_ENV,
            "Fact-check API key",
        );
        if credential.is_none() {
            tracing::warn!("No fact-check API key configured; lookups will report not found");
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| FactCheckError::Http(e.to_string()))?;

        Ok(Self {
            client,
            cache: LookupCache::new(config.cache_capacity, config.cache_ttl),
            config,
            credential,
        })
    }

    async fn request(
        &self,
        query: &str,
        credential: &ApiCredential,
    ) -> Result<Vec<FactCheckEntry>, FactCheckError> {
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("query", query),
                ("key", credential.expose()),
                ("languageCode", self.config.language.as_str()),
            ])
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FactCheckError::Timeout(self.config.timeout)
                } else {
                    // without_url keeps the key out of the message
                    FactCheckError::Http(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FactCheckError::Status {
                status: status.as_u16(),
                message: truncate_chars(&message, 200).to_string(),
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| FactCheckError::Parse(e.without_url().to_string()))?;

        Ok(entries_from_response(body))
    }
}

#[async_trait]
impl FactCheckIndex for GoogleFactCheckIndex {
    async fn search(&self, query: &str) -> Result<Vec<FactCheckEntry>, FactCheckError> {
        let credential = self
            .credential
            .as_ref()
            .ok_or(FactCheckError::NotConfigured)?;

        let query = truncate_chars(query, self.config.max_query_chars);
        let key = QueryKey::new(query);

        if let Some(entries) = self.cache.get(&key).await {
            tracing::debug!(hits = entries.len(), "Fact-check cache hit");
            return Ok(entries);
        }

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_times(self.config.retries);

        let entries = (|| self.request(query, credential))
            .retry(backoff)
            .when(FactCheckError::is_transient)
            .notify(|err, delay| {
                tracing::debug!(error = %err, ?delay, "Retrying fact-check search");
            })
            .await?;

        self.cache.insert(key, entries.clone()).await;
        Ok(entries)
    }
}

/// Turns index hits into a finding for one claim.
pub struct FactCheckLookup {
    index: Arc<dyn FactCheckIndex>,
}

impl FactCheckLookup {
    pub fn new(index: Arc<dyn FactCheckIndex>) -> Self {
        Self { index }
    }

    pub async fn check(&self, text: &str) -> FactCheckFinding {
        let entries = match self.index.search(text).await {
            Ok(entries) => entries,
            Err(FactCheckError::NotConfigured) => {
                return FactCheckFinding::not_found("No API key configured")
            }
            Err(e) => {
                tracing::warn!(error = %e, "Fact-check lookup failed");
                return FactCheckFinding::not_found(format!("API error: {e}"));
            }
        };

        let Some(best) = entries.into_iter().next() else {
            return FactCheckFinding::not_found("No matching fact checks found");
        };

        let rating = FactCheckRating::normalize(&best.rating);
        let confidence = clamp_confidence(rating.base_confidence() * BEST_MATCH_SIMILARITY);

        FactCheckFinding {
            found: true,
            confidence,
            explanation: format!("Fact check found: '{}' by {}", best.rating, best.publisher),
            sources: if best.url.is_empty() {
                Vec::new()
            } else {
                vec![best.url]
            },
            rating: Some(rating),
        }
    }
}
