//! TF-IDF vectors over unigrams and bigrams, compared by cosine similarity.
//!
//! Weighting: raw term counts times smoothed idf `ln((1 + n) / (1 + df)) + 1`,
//! rows L2-normalized. The vocabulary is capped to the `max_features` terms
//! with the highest corpus frequency.

use std::collections::{HashMap, HashSet};

/// Sparse L2-normalized document vector, sorted by term index.
#[derive(Debug, Clone, Default, PartialEq)]
struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    /// Dot product; equal to cosine similarity for normalized vectors.
    fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j, mut sum) = (0, 0, 0.0);
        while i < self.entries.len() && j < other.entries.len() {
            let (a, wa) = self.entries[i];
            let (b, wb) = other.entries[j];
            match a.cmp(&b) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += wa * wb;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// A fitted TF-IDF model over a small corpus.
#[derive(Debug, Clone)]
pub struct TfIdfIndex {
    vectors: Vec<SparseVector>,
    vocabulary_size: usize,
}

impl TfIdfIndex {
    /// Fit on `documents` and vectorize each of them.
    pub fn fit(documents: &[&str], max_features: usize) -> Self {
        let terms: Vec<Vec<String>> = documents.iter().map(|d| terms(d)).collect();

        let mut corpus_freq: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &terms {
            let mut seen = HashSet::new();
            for term in doc {
                *corpus_freq.entry(term.as_str()).or_insert(0) += 1;
                if seen.insert(term.as_str()) {
                    *doc_freq.entry(term.as_str()).or_insert(0) += 1;
                }
            }
        }

        // Highest frequency first, alphabetical on ties.
        let mut ranked: Vec<(&str, usize)> = corpus_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_features);
        ranked.sort_by(|a, b| a.0.cmp(b.0));

        let vocabulary: HashMap<&str, usize> = ranked
            .iter()
            .enumerate()
            .map(|(index, (term, _))| (*term, index))
            .collect();

        let n = documents.len() as f64;
        let idf: Vec<f64> = ranked
            .iter()
            .map(|(term, _)| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let vectors = terms
            .iter()
            .map(|doc| {
                let mut counts: HashMap<usize, f64> = HashMap::new();
                for term in doc {
                    if let Some(index) = vocabulary.get(term.as_str()) {
                        *counts.entry(*index).or_insert(0.0) += 1.0;
                    }
                }
                let mut entries: Vec<(usize, f64)> = counts
                    .into_iter()
                    .map(|(index, tf)| (index, tf * idf[index]))
                    .collect();
                entries.sort_by_key(|(index, _)| *index);

                let norm = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for (_, w) in &mut entries {
                        *w /= norm;
                    }
                }
                SparseVector { entries }
            })
            .collect();

        Self {
            vectors,
            vocabulary_size: ranked.len(),
        }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary_size
    }

    /// Cosine similarity between two fitted documents; 0 if either is out of
    /// range or has no terms.
    pub fn similarity(&self, a: usize, b: usize) -> f64 {
        match (self.vectors.get(a), self.vectors.get(b)) {
            (Some(a), Some(b)) => a.dot(b),
            _ => 0.0,
        }
    }
}

/// Unigrams and adjacent bigrams after stop word removal.
fn terms(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut terms = tokens.clone();
    terms.extend(tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

/// Lowercased alphanumeric runs of two or more characters, minus stop words.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_lowercase)
        .filter(|w| !is_stop_word(w))
        .collect()
}

fn is_stop_word(word: &str) -> bool {
    matches!(
        word,
        "a" | "about"
            | "above"
            | "after"
            | "again"
            | "against"
            | "all"
            | "also"
            | "am"
            | "an"
            | "and"
            | "any"
            | "are"
            | "as"
            | "at"
            | "be"
            | "because"
            | "been"
            | "before"
            | "being"
            | "below"
            | "between"
            | "both"
            | "but"
            | "by"
            | "can"
            | "could"
            | "did"
            | "do"
            | "does"
            | "doing"
            | "down"
            | "during"
            | "each"
            | "few"
            | "for"
            | "from"
            | "further"
            | "had"
            | "has"
            | "have"
            | "having"
            | "he"
            | "her"
            | "here"
            | "hers"
            | "him"
            | "his"
            | "how"
            | "if"
            | "in"
            | "into"
            | "is"
            | "it"
            | "its"
            | "itself"
            | "me"
            | "more"
            | "most"
            | "my"
            | "no"
            | "nor"
            | "not"
            | "of"
            | "off"
            | "on"
            | "once"
            | "only"
            | "or"
            | "other"
            | "our"
            | "ours"
            | "out"
            | "over"
            | "own"
            | "same"
            | "she"
            | "should"
            | "so"
            | "some"
            | "such"
            | "than"
            | "that"
            | "the"
            | "their"
            | "theirs"
            | "them"
            | "then"
            | "there"
            | "these"
            | "they"
            | "this"
            | "those"
            | "through"
            | "to"
            | "too"
            | "under"
            | "until"
            | "up"
            | "very"
            | "was"
            | "we"
            | "were"
            | "what"
            | "when"
            | "where"
            | "which"
            | "while"
            | "who"
            | "whom"
            | "why"
            | "will"
            | "with"
            | "would"
            | "you"
            | "your"
            | "yours"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        assert_eq!(
            tokenize("The rate of CO2 is a 5% rise"),
            vec!["rate", "co2", "rise"]
        );
    }

    #[test]
    fn test_bigrams_follow_stop_word_removal() {
        let t = terms("rate of inflation");
        assert!(t.contains(&"rate inflation".to_string()));
    }

    #[test]
    fn test_identical_documents_have_unit_similarity() {
        let index = TfIdfIndex::fit(&["solar panel output", "solar panel output"], 1000);
        assert!((index.similarity(0, 1) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_documents_have_zero_similarity() {
        let index = TfIdfIndex::fit(&["solar panel output", "wheat harvest yields"], 1000);
        assert_eq!(index.similarity(0, 1), 0.0);
    }

    #[test]
    fn test_related_document_ranks_higher() {
        let index = TfIdfIndex::fit(
            &[
                "vaccination rates among children",
                "childhood vaccination rates rose sharply",
                "the stock market closed higher",
            ],
            1000,
        );
        assert!(index.similarity(0, 1) > index.similarity(0, 2));
    }

    #[test]
    fn test_max_features_caps_vocabulary() {
        let index = TfIdfIndex::fit(&["alpha beta gamma delta epsilon"], 3);
        assert_eq!(index.vocabulary_size(), 3);
    }

    #[test]
    fn test_stop_word_only_document_is_zero_vector() {
        let index = TfIdfIndex::fit(&["the and of", "anything"], 1000);
        assert!(index.vectors[0].entries.is_empty());
        assert_eq!(index.similarity(0, 0), 0.0);
        assert_eq!(index.similarity(0, 1), 0.0);
    }
}
