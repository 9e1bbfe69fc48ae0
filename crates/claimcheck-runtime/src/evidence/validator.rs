//! Quote verification against retrieved passages.

use claimcheck_core::text::{contains_normalized, normalize_whitespace};
use claimcheck_core::RetrievedChunk;
use regex::Regex;
use thiserror::Error;

/// Why a quote was not accepted as evidence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteRejection {
    #[error("Empty quote")]
    Empty,

    #[error("Quote not found in retrieved passages: '{quote}'")]
    NotInEvidence { quote: String },
}

/// Result of checking a set of quotes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteCheck {
    /// Quotes found in the passages, normalized, in reply order
    pub verified: Vec<String>,
    pub rejected: Vec<QuoteRejection>,
}

impl QuoteCheck {
    pub fn all_verified(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Sentence appended to a verdict explanation when quotes were dropped.
    pub fn note(&self) -> Option<String> {
        match self.rejected.len() {
            0 => None,
            1 => Some("(1 unverifiable quote dropped)".to_string()),
            n => Some(format!("({n} unverifiable quotes dropped)")),
        }
    }
}

/// Checks adjudication quotes against the passages shown to the model.
///
/// Matching is case-insensitive and whitespace-normalized. Surrounding
/// quotation marks are ignored, and a quote elided with `...` matches when
/// every fragment appears in the same passage.
pub struct QuoteVerifier<'a> {
    chunks: &'a [RetrievedChunk],
    ellipsis: Regex,
}

impl<'a> QuoteVerifier<'a> {
    pub fn new(chunks: &'a [RetrievedChunk]) -> Self {
        let ellipsis = Regex::new(r"\s*(?:\[\.\.\.\]|\.\.\.|…)\s*").expect("valid regex");
        Self { chunks, ellipsis }
    }

    pub fn check_all(&self, quotes: &[String]) -> QuoteCheck {
        let mut check = QuoteCheck::default();
        for quote in quotes {
            match self.check(quote) {
                Ok(verified) => check.verified.push(verified),
                Err(rejection) => check.rejected.push(rejection),
            }
        }
        check
    }

    /// The normalized quote when it is present in some passage.
    pub fn check(&self, quote: &str) -> Result<String, QuoteRejection> {
        let unwrapped = quote
            .trim()
            .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’'))
            .trim();

        let fragments: Vec<&str> = self
            .ellipsis
            .split(unwrapped)
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();
        if fragments.is_empty() {
            return Err(QuoteRejection::Empty);
        }

        let found = self.chunks.iter().any(|chunk| {
            fragments
                .iter()
                .all(|fragment| contains_normalized(&chunk.text, fragment))
        });

        if found {
            Ok(normalize_whitespace(unwrapped))
        } else {
            Err(QuoteRejection::NotInEvidence {
                quote: quote.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks() -> Vec<RetrievedChunk> {
        vec![
            RetrievedChunk {
                text: "Unemployment fell to 3.5 percent in\n2019, the lowest in fifty years.".to_string(),
                score: 0.6,
            },
            RetrievedChunk {
                text: "Wages rose modestly over the same period.".to_string(),
                score: 0.3,
            },
        ]
    }

    #[test]
    fn test_exact_and_normalized_quotes() {
        let chunks = chunks();
        let verifier = QuoteVerifier::new(&chunks);

        assert_eq!(
            verifier.check("unemployment fell to 3.5 percent in 2019").unwrap(),
            "unemployment fell to 3.5 percent in 2019"
        );
        assert!(verifier.check("\"Wages rose modestly\"").is_ok());
        assert!(verifier.check("“Wages rose modestly”").is_ok());
    }

    #[test]
    fn test_elided_quote_must_match_one_passage() {
        let chunks = chunks();
        let verifier = QuoteVerifier::new(&chunks);

        assert!(verifier.check("Unemployment fell ... lowest in fifty years").is_ok());
        // fragments from different passages do not combine
        assert!(verifier.check("Unemployment fell ... Wages rose").is_err());
    }

    #[test]
    fn test_fabricated_quote_rejected() {
        let chunks = chunks();
        let verifier = QuoteVerifier::new(&chunks);

        assert_eq!(
            verifier.check("Unemployment doubled"),
            Err(QuoteRejection::NotInEvidence {
                quote: "Unemployment doubled".to_string()
            })
        );
        assert_eq!(verifier.check("  \"\" "), Err(QuoteRejection::Empty));
        assert_eq!(verifier.check("..."), Err(QuoteRejection::Empty));
    }

    #[test]
    fn test_check_all_counts_drops() {
        let chunks = chunks();
        let verifier = QuoteVerifier::new(&chunks);

        let check = verifier.check_all(&[
            "Wages rose modestly".to_string(),
            "Inflation spiked".to_string(),
            "Prices collapsed".to_string(),
        ]);
        assert_eq!(check.verified, vec!["Wages rose modestly"]);
        assert!(!check.all_verified());
        assert_eq!(check.note().unwrap(), "(2 unverifiable quotes dropped)");

        let clean = verifier.check_all(&["Wages rose modestly".to_string()]);
        assert!(clean.note().is_none());
    }
}
