//! Claim records produced by the upstream extraction pipeline.
//!
//! A claim carries exactly one citation state. A citation that was present in
//! the source document and a citation synthesized later by a dataset finder are
//! different variants of [`CitationState`], so a claim can never be both an
//! original first-party citation and a discovered one.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Kind of claim, as classified upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    /// Involves numbers, rates, statistics or measurements
    Quantitative,

    /// Descriptive, non-numerical
    Qualitative,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Quantitative => "quantitative",
            ClaimType::Qualitative => "qualitative",
        }
    }
}

impl std::fmt::Display for ClaimType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bibliographic details of a citation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    /// Reference text as it appeared in the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl CitationDetails {
    /// Where the cited resource can be fetched from: the URL if present,
    /// otherwise the DOI.
    pub fn locator(&self) -> Option<&str> {
        non_blank(self.url.as_deref()).or_else(|| non_blank(self.doi.as_deref()))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A citation attached to a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Key shared by every claim citing the same reference
    pub id: String,

    /// Marker as written in the text, e.g. "[1]" or "(Smith, 2020)"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<CitationDetails>,
}

impl Citation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            marker: None,
            details: None,
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    pub fn with_details(mut self, details: CitationDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// Shortcut for a citation whose details only carry a URL.
    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.with_details(CitationDetails {
            url: Some(url.into()),
            ..Default::default()
        })
    }

    pub fn locator(&self) -> Option<&str> {
        self.details.as_ref().and_then(CitationDetails::locator)
    }
}

/// A dataset located by the external finder for an uncited claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredSource {
    pub url: String,

    /// Repository the dataset was found in (e.g. "data.gov", "kaggle")
    pub repository: String,

    pub relevance_score: f64,

    /// Claim whose search first discovered this source
    pub found_by_claim_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,

    /// How many later claims reused this source
    #[serde(default)]
    pub reuse_count: u32,
}

/// Citation provenance of a claim.
#[derive(Debug, Clone, PartialEq)]
pub enum CitationState {
    /// No citation in the document and none discovered
    Uncited,

    /// Citation present in the source document
    Original(Citation),

    /// Citation synthesized after the fact from a discovered dataset
    Discovered {
        citation: Citation,
        source: DiscoveredSource,
    },
}

/// An extracted statement requiring verification.
///
/// Serialized in the flat record layout used by the extraction pipeline
/// (`claim_id`, `citation_id`, `citation_details`, `found_source`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ClaimRecord", into = "ClaimRecord")]
pub struct Claim {
    pub id: String,
    pub text: String,
    pub claim_type: ClaimType,
    pub citation: CitationState,

    /// Upstream labels such as "objective" or "subjective"
    pub classification: Vec<String>,
}

impl Claim {
    /// Create an uncited claim.
    pub fn new(id: impl Into<String>, text: impl Into<String>, claim_type: ClaimType) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            claim_type,
            citation: CitationState::Uncited,
            classification: Vec::new(),
        }
    }

    pub fn quantitative(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, text, ClaimType::Quantitative)
    }

    pub fn qualitative(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, text, ClaimType::Qualitative)
    }

    /// Attach a citation found in the source document.
    pub fn with_citation(mut self, citation: Citation) -> Self {
        self.citation = CitationState::Original(citation);
        self
    }

    pub fn citation(&self) -> Option<&Citation> {
        match &self.citation {
            CitationState::Uncited => None,
            CitationState::Original(citation) => Some(citation),
            CitationState::Discovered { citation, .. } => Some(citation),
        }
    }

    pub fn citation_id(&self) -> Option<&str> {
        self.citation().map(|c| c.id.as_str())
    }

    pub fn has_citation(&self) -> bool {
        self.citation().is_some()
    }

    /// True when the claim had no citation in the document and one was
    /// attached later by a finder.
    pub fn is_originally_uncited(&self) -> bool {
        matches!(self.citation, CitationState::Discovered { .. })
    }

    pub fn discovered_source(&self) -> Option<&DiscoveredSource> {
        match &self.citation {
            CitationState::Discovered { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Return a copy of this claim cited by a discovered dataset.
    ///
    /// Only uncited quantitative claims can be enriched. The synthetic
    /// citation id is `found_<claim id>`, so every enriched claim forms its own
    /// batch even when several claims reuse the same dataset.
    pub fn enrich_with_discovered_source(&self, source: DiscoveredSource) -> Result<Claim, CoreError> {
        if self.claim_type != ClaimType::Quantitative {
            return Err(CoreError::InvalidEnrichment {
                claim_id: self.id.clone(),
                reason: "only quantitative claims take discovered datasets".to_string(),
            });
        }
        if self.has_citation() {
            return Err(CoreError::InvalidEnrichment {
                claim_id: self.id.clone(),
                reason: "claim already carries a citation".to_string(),
            });
        }

        let citation = Citation {
            id: format!("found_{}", self.id),
            marker: Some(format!("[Found: {}]", source.repository)),
            details: Some(CitationDetails {
                title: Some(format!("Dataset from {}", source.repository)),
                url: Some(source.url.clone()),
                raw_text: Some(format!("Found dataset: {}", source.url)),
                ..Default::default()
            }),
        };

        Ok(Claim {
            citation: CitationState::Discovered { citation, source },
            ..self.clone()
        })
    }
}

/// Flat wire layout of a claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClaimRecord {
    claim_id: String,
    text: String,
    claim_type: ClaimType,

    #[serde(default)]
    citation_found: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    citation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    citation_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    citation_details: Option<CitationDetails>,

    #[serde(default)]
    originally_uncited: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    found_source: Option<DiscoveredSource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    classification: Vec<String>,
}

impl TryFrom<ClaimRecord> for Claim {
    type Error = CoreError;

    fn try_from(record: ClaimRecord) -> Result<Self, Self::Error> {
        if record.claim_id.trim().is_empty() {
            return Err(CoreError::InvalidClaim {
                claim_id: record.claim_id,
                reason: "claim_id is empty".to_string(),
            });
        }

        // The marker doubles as the batch key when no explicit id was assigned.
        let citation_id = non_blank(record.citation_id.as_deref())
            .or_else(|| {
                if record.citation_found {
                    non_blank(record.citation_text.as_deref())
                } else {
                    None
                }
            })
            .map(str::to_string);

        if record.citation_found && citation_id.is_none() {
            return Err(CoreError::InvalidClaim {
                claim_id: record.claim_id,
                reason: "citation_found is set but neither citation_id nor citation_text is present"
                    .to_string(),
            });
        }

        let citation = citation_id.map(|id| Citation {
            id,
            marker: record.citation_text.clone(),
            details: record.citation_details.clone(),
        });

        let state = match (citation, record.found_source, record.originally_uncited) {
            (None, None, false) => CitationState::Uncited,
            (Some(citation), None, false) => CitationState::Original(citation),
            (Some(citation), Some(source), true) => CitationState::Discovered { citation, source },
            (_, Some(_), false) => {
                return Err(CoreError::InvalidClaim {
                    claim_id: record.claim_id,
                    reason: "found_source present on a claim not marked originally_uncited".to_string(),
                })
            }
            (_, None, true) => {
                return Err(CoreError::InvalidClaim {
                    claim_id: record.claim_id,
                    reason: "originally_uncited is set but no found_source is present".to_string(),
                })
            }
            (None, Some(_), true) => {
                return Err(CoreError::InvalidClaim {
                    claim_id: record.claim_id,
                    reason: "found_source present without a citation_id".to_string(),
                })
            }
        };

        Ok(Claim {
            id: record.claim_id,
            text: record.text,
            claim_type: record.claim_type,
            citation: state,
            classification: record.classification,
        })
    }
}

impl From<Claim> for ClaimRecord {
    fn from(claim: Claim) -> Self {
        let (citation, found_source) = match claim.citation {
            CitationState::Uncited => (None, None),
            CitationState::Original(citation) => (Some(citation), None),
            CitationState::Discovered { citation, source } => (Some(citation), Some(source)),
        };
        let originally_uncited = found_source.is_some();

        ClaimRecord {
            claim_id: claim.id,
            text: claim.text,
            claim_type: claim.claim_type,
            citation_found: citation.is_some(),
            citation_id: citation.as_ref().map(|c| c.id.clone()),
            citation_text: citation.as_ref().and_then(|c| c.marker.clone()),
            citation_details: citation.and_then(|c| c.details),
            originally_uncited,
            found_source,
            classification: claim.classification,
        }
    }
}
