//! # claimcheck-core
//!
//! Deterministic core of claim validation.
//!
//! This crate decides how each extracted claim is validated, without
//! performing any of the validation IO itself:
//! - Which lane does a claim belong to?
//! - Which claims share a fetched resource?
//! - What does a well-formed verdict look like?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: routing is a pure function of claim type and citation state
//! 2. **No IO**: no network, subprocesses or text generation
//! 3. **Total**: every claim lands in exactly one lane
//! 4. **Bounded verdicts**: confidence in `[0, 1]`, unvalidated never passes
//!
//! ## Example
//!
//! ```rust,ignore
//! use claimcheck_core::{Claim, LanePartition};
//!
//! let claims: Vec<Claim> = serde_json::from_str(&input)?;
//! let partition = LanePartition::from_claims(claims);
//!
//! for batch in &partition.cited_quantitative {
//!     println!("{} -> {} claims", batch.citation_id(), batch.len());
//! }
//! ```

pub mod batch;
pub mod claim;
pub mod evidence;
pub mod rating;
pub mod report;
pub mod retrieval;
pub mod routing;
pub mod structured;
pub mod synthesizer;
pub mod text;
pub mod verdict;

// Re-export main types at crate root
pub use batch::{BatchPlanner, CitationBatch};
pub use claim::{Citation, CitationDetails, CitationState, Claim, ClaimType, DiscoveredSource};
pub use evidence::{FactCheckEntry, FactCheckFinding, PlausibilityAssessment};
pub use rating::FactCheckRating;
pub use report::{BatchResult, ReportSummary, UncitedQuantitativeOutcome};
pub use retrieval::{EvidenceRetriever, RetrievalConfig, RetrievedChunk};
pub use routing::{route, Lane, LanePartition, Route};
pub use structured::{Shape, ShapeError};
pub use synthesizer::Synthesizer;
pub use verdict::{ValidationMethod, ValidationVerdict};

use thiserror::Error;

/// Errors raised by the deterministic core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid claim '{claim_id}': {reason}")]
    InvalidClaim { claim_id: String, reason: String },

    #[error("Cannot enrich claim '{claim_id}': {reason}")]
    InvalidEnrichment { claim_id: String, reason: String },

    #[error("Claim '{0}' has no citation to batch on")]
    MissingCitation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
