//! Typed structured replies.
//!
//! Generated text is untrusted: every reply is located inside the raw text,
//! validated against its JSON schema, and only then decoded.

mod extract;
mod schema;

pub use extract::{extract_code, extract_json_object, last_json_object};
pub use schema::{is_valid_shape, validate_shape, Shape, ShapeError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A reply type bound to its schema.
pub trait StructuredReply: DeserializeOwned {
    const SHAPE: Shape;
}

/// Verdict line printed by a generated validation script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptVerdict {
    pub passed: bool,
    pub confidence: f64,
    #[serde(default)]
    pub explanation: String,
}

impl StructuredReply for ScriptVerdict {
    const SHAPE: Shape = Shape::ScriptVerdict;
}

/// Judgment of a claim against retrieved passages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjudication {
    pub passed: bool,
    pub confidence: f64,
    pub explanation: String,
    #[serde(default)]
    pub supporting_quotes: Vec<String>,
}

impl StructuredReply for Adjudication {
    const SHAPE: Shape = Shape::Adjudication;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlausibilityReply {
    pub plausible: bool,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl StructuredReply for PlausibilityReply {
    const SHAPE: Shape = Shape::Plausibility;
}

/// Whether an already discovered dataset can validate a new claim.
/// `dataset_index` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReuseDecision {
    pub can_reuse: bool,
    #[serde(default)]
    pub dataset_index: Option<usize>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl StructuredReply for ReuseDecision {
    const SHAPE: Shape = Shape::DatasetReuse;
}

/// Validate and decode a JSON value.
pub fn decode<T: StructuredReply>(value: serde_json::Value) -> Result<T, ShapeError> {
    validate_shape(T::SHAPE, &value)?;
    serde_json::from_value(value).map_err(|e| ShapeError::Decode {
        shape: T::SHAPE,
        message: e.to_string(),
    })
}

/// Parse a generated reply: fences stripped, first balanced object taken.
pub fn parse_reply<T: StructuredReply>(text: &str) -> Result<T, ShapeError> {
    let cleaned = extract_code(text);
    let object = extract_json_object(&cleaned).ok_or(ShapeError::NoJson)?;
    let value: serde_json::Value =
        serde_json::from_str(object).map_err(|e| ShapeError::InvalidJson(e.to_string()))?;
    decode(value)
}

/// Parse process output: the last well-formed object wins.
pub fn parse_output<T: StructuredReply>(output: &str) -> Result<T, ShapeError> {
    let value = last_json_object(output).ok_or(ShapeError::NoJson)?;
    decode(value)
}
