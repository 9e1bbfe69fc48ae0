//! Lane routing.
//!
//! Routing is a pure function of the claim's type and its citation state.
//! Every claim lands in exactly one of four lanes:
//!
//! | type         | citation              | lane                  |
//! |--------------|-----------------------|-----------------------|
//! | qualitative  | none                  | `UncitedQualitative`  |
//! | quantitative | none                  | `UncitedQuantitative` |
//! | quantitative | original / discovered | `CitedQuantitative`   |
//! | qualitative  | original / discovered | `CitedQualitative`    |
//!
//! An enriched claim (discovered citation) is cited, so re-running the
//! pipeline on it never sends it back to the dataset finder.

use serde::{Deserialize, Serialize};

use crate::batch::{BatchPlanner, CitationBatch};
use crate::claim::{Citation, CitationState, Claim, ClaimType};

/// The four processing lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    UncitedQualitative,
    UncitedQuantitative,
    CitedQuantitative,
    CitedQualitative,
}

impl Lane {
    pub const ALL: [Lane; 4] = [
        Lane::UncitedQualitative,
        Lane::UncitedQuantitative,
        Lane::CitedQuantitative,
        Lane::CitedQualitative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::UncitedQualitative => "uncited_qualitative",
            Lane::UncitedQuantitative => "uncited_quantitative",
            Lane::CitedQuantitative => "cited_quantitative",
            Lane::CitedQualitative => "cited_qualitative",
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A routing decision, borrowing the citation for cited lanes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Route<'a> {
    UncitedQualitative,
    UncitedQuantitative,
    CitedQuantitative(&'a Citation),
    CitedQualitative(&'a Citation),
}

impl Route<'_> {
    pub fn lane(&self) -> Lane {
        match self {
            Route::UncitedQualitative => Lane::UncitedQualitative,
            Route::UncitedQuantitative => Lane::UncitedQuantitative,
            Route::CitedQuantitative(_) => Lane::CitedQuantitative,
            Route::CitedQualitative(_) => Lane::CitedQualitative,
        }
    }
}

/// Route a claim. Exhaustive over `(ClaimType, CitationState)`; adding a
/// variant to either enum is a compile error here until it is routed.
#[deny(clippy::wildcard_enum_match_arm)]
pub fn route(claim: &Claim) -> Route<'_> {
    match (claim.claim_type, &claim.citation) {
        (ClaimType::Qualitative, CitationState::Uncited) => Route::UncitedQualitative,
        (ClaimType::Quantitative, CitationState::Uncited) => Route::UncitedQuantitative,
        (ClaimType::Quantitative, CitationState::Original(citation))
        | (ClaimType::Quantitative, CitationState::Discovered { citation, .. }) => {
            Route::CitedQuantitative(citation)
        }
        (ClaimType::Qualitative, CitationState::Original(citation))
        | (ClaimType::Qualitative, CitationState::Discovered { citation, .. }) => {
            Route::CitedQualitative(citation)
        }
    }
}

/// Claims split into lanes, with the cited lanes already grouped into
/// citation batches. Input order is preserved within every lane and batches
/// appear in order of their first claim.
#[derive(Debug, Clone, Default)]
pub struct LanePartition {
    pub uncited_qualitative: Vec<Claim>,
    pub uncited_quantitative: Vec<Claim>,
    pub cited_quantitative: Vec<CitationBatch>,
    pub cited_qualitative: Vec<CitationBatch>,
}

impl LanePartition {
    pub fn from_claims(claims: impl IntoIterator<Item = Claim>) -> Self {
        let mut uncited_qualitative = Vec::new();
        let mut uncited_quantitative = Vec::new();
        let mut quantitative = BatchPlanner::new();
        let mut qualitative = BatchPlanner::new();

        for claim in claims {
            match route(&claim) {
                Route::UncitedQualitative => uncited_qualitative.push(claim),
                Route::UncitedQuantitative => uncited_quantitative.push(claim),
                Route::CitedQuantitative(citation) => {
                    let citation = citation.clone();
                    quantitative.push_keyed(&citation, claim);
                }
                Route::CitedQualitative(citation) => {
                    let citation = citation.clone();
                    qualitative.push_keyed(&citation, claim);
                }
            }
        }

        Self {
            uncited_qualitative,
            uncited_quantitative,
            cited_quantitative: quantitative.into_batches(),
            cited_qualitative: qualitative.into_batches(),
        }
    }

    /// Number of claims in a lane.
    pub fn claim_count(&self, lane: Lane) -> usize {
        match lane {
            Lane::UncitedQualitative => self.uncited_qualitative.len(),
            Lane::UncitedQuantitative => self.uncited_quantitative.len(),
            Lane::CitedQuantitative => self.cited_quantitative.iter().map(CitationBatch::len).sum(),
            Lane::CitedQualitative => self.cited_qualitative.iter().map(CitationBatch::len).sum(),
        }
    }

    pub fn total_claims(&self) -> usize {
        Lane::ALL.iter().map(|lane| self.claim_count(*lane)).sum()
    }
}
