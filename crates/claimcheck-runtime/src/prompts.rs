//! Prompts for the generation capabilities.
//!
//! Each capability has a static system prompt (cacheable, identical for
//! every claim) and a builder for the dynamic user prompt.

use claimcheck_core::{DiscoveredSource, RetrievedChunk};

/// Environment variable a generated script reads its dataset path from.
pub const DATASET_ENV: &str = "CLAIMCHECK_DATASET";

pub const PLAUSIBILITY_SYSTEM_PROMPT: &str = r#"
You are a fact-checking assistant. You evaluate whether a claim is plausible
using only general knowledge. You have no sources for this claim.

Judge the claim on:
1. Scientific accuracy
2. Logical consistency
3. Common sense reasoning
4. Known facts and relationships

## Output Format (JSON)
{
  "plausible": true | false,
  "confidence": 0.0-1.0,
  "reasoning": "brief explanation of your assessment"
}

## Rules
- plausible=true only if the claim is consistent with well-established facts
- plausible=false if the claim contradicts known facts or is highly implausible
- confidence reflects certainty: high for well-known facts, low for uncertain areas
- Do NOT mark claims plausible by default. Be critical and evidence-based.
"#;

pub const SCRIPT_SYSTEM_PROMPT: &str = r#"
You are a Python code generator for data validation. You write one complete,
executable Python 3 script that checks a quantitative claim against a dataset.

## Script Contract
1. Read the dataset path from the CLAIMCHECK_DATASET environment variable,
   falling back to the path given in the request
2. Detect the format from the file extension (CSV, JSON, Excel) and load it
   with pandas (pd.read_csv, pd.read_json, pd.read_excel)
3. Extract the values the claim depends on; handle missing values
4. Compute the aggregate or comparison the claim requires, with a sensible
   numeric tolerance for rounding
5. Print EXACTLY ONE line of JSON as the last line of output:
   {"passed": true/false, "confidence": 0.0-1.0, "explanation": "brief explanation"}

## Rules
- Wrap the analysis in try/except; on error print the JSON line with
  passed=false, confidence=0.0 and the error in explanation
- Use json.dumps for the output line
- confidence reflects data quality and how precisely the data matches the claim
- The script has no network access; do not download anything
- Reply with ONLY the Python code, no explanations or markdown
"#;

pub const ADJUDICATION_SYSTEM_PROMPT: &str = r#"
You are a fact-checking assistant. You decide whether a claim is supported by
excerpts retrieved from its cited source. You use nothing but the excerpts.

## Output Format (JSON)
{
  "passed": true | false,
  "confidence": 0.0-1.0,
  "explanation": "brief explanation of your assessment",
  "supporting_quotes": ["exact sentence from an excerpt", "..."]
}

## Rules
- passed=true ONLY if the excerpts clearly support or confirm the claim
- passed=false if the excerpts contradict the claim or the evidence is insufficient
- Partial matches or tangential evidence MUST result in passed=false
- supporting_quotes are copied verbatim from the excerpts (supporting or contradicting)
- confidence reflects how strongly the evidence backs your decision
"#;

pub const DATASET_REUSE_SYSTEM_PROMPT: &str = r#"
You are a data analyst deciding whether a dataset that was already found for
another claim can validate a new claim.

Consider:
- Does the dataset contain the relevant variables or metrics?
- Is the time period appropriate?
- Is the geographic scope appropriate?

## Output Format (JSON)
{
  "can_reuse": true | false,
  "dataset_index": 1-based index of the dataset or null,
  "confidence": 0.0-1.0,
  "reasoning": "brief explanation"
}
"#;

pub fn plausibility_prompt(claim_text: &str) -> String {
    format!("Claim: \"{claim_text}\"\n\nAssess the plausibility of this claim.")
}

pub fn script_prompt(claim_text: &str, dataset_path: &str) -> String {
    format!(
        "Claim: \"{claim_text}\"\nDataset path: \"{dataset_path}\"\n\n\
         Write the validation script."
    )
}

pub fn adjudication_prompt(claim_text: &str, chunks: &[RetrievedChunk]) -> String {
    let excerpts = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[Excerpt {}, similarity={:.2}]:\n{}",
                i + 1,
                chunk.score,
                chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Claim to verify: \"{claim_text}\"\n\n\
         Retrieved excerpts from the cited source:\n{excerpts}\n\n\
         Is the claim supported by the excerpts above?"
    )
}

pub fn dataset_reuse_prompt(claim_text: &str, datasets: &[DiscoveredSource]) -> String {
    let listing = datasets
        .iter()
        .enumerate()
        .map(|(i, d)| {
            format!(
                "{}. [{}] {} (relevance: {:.2}, used by {} claims)",
                i + 1,
                d.repository,
                d.url,
                d.relevance_score,
                d.reuse_count
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Claim to validate: {claim_text}\n\nAvailable datasets:\n{listing}\n\n\
         Can any of these datasets validate this claim? Answer with dataset_index \
         between 1 and {}, or null.",
        datasets.len()
    )
}
