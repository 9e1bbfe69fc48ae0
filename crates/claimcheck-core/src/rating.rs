//! Fact-check rating normalization.
//!
//! Publishers use free-form ratings ("Pants on Fire", "Mostly True",
//! "Half True", "Misleading"). These are folded into four buckets by keyword
//! matching; a "mostly"/"partially" qualifier on a clear rating downgrades it
//! to [`FactCheckRating::Mixed`].

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactCheckRating {
    True,
    False,
    Mixed,
    Unverified,
}

lazy_static! {
    static ref TRUE_WORDS: Regex =
        Regex::new(r"\b(true|correct|accurate|verified)\b").expect("valid regex");
    static ref FALSE_WORDS: Regex =
        Regex::new(r"\b(false|incorrect|inaccurate|pants on fire|debunked|fake)\b")
            .expect("valid regex");
    static ref QUALIFIERS: Regex =
        Regex::new(r"\b(mostly|partially|partly|mixture)\b").expect("valid regex");
    static ref MIXED_WORDS: Regex =
        Regex::new(r"\b(mixed|mixture|half|partially|partly|mostly|misleading)\b")
            .expect("valid regex");
}

impl FactCheckRating {
    /// Fold a publisher's textual rating into a bucket.
    pub fn normalize(rating: &str) -> Self {
        let rating = rating.trim().to_lowercase();
        if rating.is_empty() {
            return FactCheckRating::Unverified;
        }

        // "inaccurate"/"incorrect" contain true-ish stems, so check false first.
        if FALSE_WORDS.is_match(&rating) {
            if QUALIFIERS.is_match(&rating) {
                return FactCheckRating::Mixed;
            }
            return FactCheckRating::False;
        }

        if TRUE_WORDS.is_match(&rating) {
            if QUALIFIERS.is_match(&rating) {
                return FactCheckRating::Mixed;
            }
            return FactCheckRating::True;
        }

        if MIXED_WORDS.is_match(&rating) {
            return FactCheckRating::Mixed;
        }

        FactCheckRating::Unverified
    }

    /// Confidence attached to a rating before similarity weighting.
    pub fn base_confidence(&self) -> f64 {
        match self {
            FactCheckRating::True | FactCheckRating::False => 0.9,
            FactCheckRating::Mixed => 0.6,
            FactCheckRating::Unverified => 0.4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FactCheckRating::True => "true",
            FactCheckRating::False => "false",
            FactCheckRating::Mixed => "mixed",
            FactCheckRating::Unverified => "unverified",
        }
    }
}

impl std::fmt::Display for FactCheckRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
