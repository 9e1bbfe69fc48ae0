//! Citation-scoped batching.
//!
//! Claims sharing a citation id form one [`CitationBatch`], the unit of
//! resource fetch and release. Claims whose citation came from dataset
//! discovery are keyed under a separate `discovered:` namespace, so they
//! never share a batch or a local file with a native citation of the same id.

use std::collections::HashMap;

use serde::Serialize;

use crate::claim::{Citation, Claim};
use crate::CoreError;

/// Claims sharing one citation, validated against one fetched resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitationBatch {
    citation_id: String,

    #[serde(skip)]
    scope_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    marker: Option<String>,

    /// URL or DOI of the cited resource, taken from the first claim that
    /// carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    locator: Option<String>,

    claims: Vec<Claim>,
}

impl CitationBatch {
    fn new(citation: &Citation, scope_id: String) -> Self {
        Self {
            citation_id: citation.id.clone(),
            scope_id,
            marker: citation.marker.clone(),
            locator: citation.locator().map(str::to_string),
            claims: Vec::new(),
        }
    }

    pub fn citation_id(&self) -> &str {
        &self.citation_id
    }

    /// Key of the fetched resource; unique across all batches of a run.
    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Groups claims into batches by citation id, keeping first-seen order.
#[derive(Debug, Default)]
pub struct BatchPlanner {
    batches: Vec<CitationBatch>,
    index: HashMap<String, usize>,
}

impl BatchPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a claim that carries a citation.
    pub fn push(&mut self, claim: Claim) -> Result<(), CoreError> {
        let citation = claim
            .citation()
            .cloned()
            .ok_or_else(|| CoreError::MissingCitation(claim.id.clone()))?;
        self.push_keyed(&citation, claim);
        Ok(())
    }

    pub(crate) fn push_keyed(&mut self, citation: &Citation, claim: Claim) {
        let scope_id = if claim.is_originally_uncited() {
            format!("discovered:{}", citation.id)
        } else {
            citation.id.clone()
        };

        let slot = match self.index.get(&scope_id) {
            Some(slot) => *slot,
            None => {
                self.index.insert(scope_id.clone(), self.batches.len());
                self.batches.push(CitationBatch::new(citation, scope_id));
                self.batches.len() - 1
            }
        };

        let batch = &mut self.batches[slot];
        if batch.locator.is_none() {
            batch.locator = citation.locator().map(str::to_string);
        }
        if batch.marker.is_none() {
            batch.marker = citation.marker.clone();
        }
        batch.claims.push(claim);
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn into_batches(self) -> Vec<CitationBatch> {
        self.batches
    }
}
