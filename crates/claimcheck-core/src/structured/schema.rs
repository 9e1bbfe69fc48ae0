//! JSON Schema validation for structured replies.
//!
//! Each reply shape has a schema under `schemas/`, embedded at compile time
//! and compiled once on first use.

use std::sync::OnceLock;

use serde::Serialize;
use thiserror::Error;

const SCRIPT_VERDICT_SCHEMA: &str = include_str!("../../schemas/script_verdict.schema.json");
const ADJUDICATION_SCHEMA: &str = include_str!("../../schemas/adjudication.schema.json");
const PLAUSIBILITY_SCHEMA: &str = include_str!("../../schemas/plausibility.schema.json");
const DATASET_REUSE_SCHEMA: &str = include_str!("../../schemas/dataset_reuse.schema.json");

type Compiled = OnceLock<Result<jsonschema::Validator, String>>;

static SCRIPT_VERDICT: Compiled = OnceLock::new();
static ADJUDICATION: Compiled = OnceLock::new();
static PLAUSIBILITY: Compiled = OnceLock::new();
static DATASET_REUSE: Compiled = OnceLock::new();

/// The structured reply shapes this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    ScriptVerdict,
    Adjudication,
    Plausibility,
    DatasetReuse,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::ScriptVerdict => "script_verdict",
            Shape::Adjudication => "adjudication",
            Shape::Plausibility => "plausibility",
            Shape::DatasetReuse => "dataset_reuse",
        }
    }

    /// The raw schema document.
    pub fn schema_json(&self) -> &'static str {
        match self {
            Shape::ScriptVerdict => SCRIPT_VERDICT_SCHEMA,
            Shape::Adjudication => ADJUDICATION_SCHEMA,
            Shape::Plausibility => PLAUSIBILITY_SCHEMA,
            Shape::DatasetReuse => DATASET_REUSE_SCHEMA,
        }
    }

    fn cell(&self) -> &'static Compiled {
        match self {
            Shape::ScriptVerdict => &SCRIPT_VERDICT,
            Shape::Adjudication => &ADJUDICATION,
            Shape::Plausibility => &PLAUSIBILITY,
            Shape::DatasetReuse => &DATASET_REUSE,
        }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors turning generated text into a typed reply.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("no JSON object found in output")]
    NoJson,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("{shape} reply does not match schema: {}", .errors.join("; "))]
    SchemaViolation { shape: Shape, errors: Vec<String> },

    #[error("failed to load {shape} schema: {message}")]
    SchemaLoad { shape: Shape, message: String },

    #[error("failed to decode {shape} reply: {message}")]
    Decode { shape: Shape, message: String },
}

fn validator(shape: Shape) -> Result<&'static jsonschema::Validator, ShapeError> {
    let compiled = shape.cell().get_or_init(|| {
        let schema: serde_json::Value = serde_json::from_str(shape.schema_json())
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;
        jsonschema::options()
            .build(&schema)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    compiled.as_ref().map_err(|message| ShapeError::SchemaLoad {
        shape,
        message: message.clone(),
    })
}

/// Validate a JSON value against a shape's schema.
pub fn validate_shape(shape: Shape, value: &serde_json::Value) -> Result<(), ShapeError> {
    let validator = validator(shape)?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ShapeError::SchemaViolation { shape, errors })
    }
}

pub fn is_valid_shape(shape: Shape, value: &serde_json::Value) -> bool {
    validator(shape).map(|v| v.is_valid(value)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_schemas_compile() {
        for shape in [
            Shape::ScriptVerdict,
            Shape::Adjudication,
            Shape::Plausibility,
            Shape::DatasetReuse,
        ] {
            assert!(validator(shape).is_ok(), "{shape} schema failed to compile");
        }
    }

    #[test]
    fn test_script_verdict_bounds() {
        assert!(is_valid_shape(
            Shape::ScriptVerdict,
            &json!({"passed": true, "confidence": 0.85, "explanation": "mean 3.4"})
        ));
        assert!(!is_valid_shape(
            Shape::ScriptVerdict,
            &json!({"passed": true, "confidence": 1.7})
        ));
        assert!(!is_valid_shape(Shape::ScriptVerdict, &json!({"confidence": 0.5})));
    }

    #[test]
    fn test_violation_lists_errors() {
        let err = validate_shape(Shape::Adjudication, &json!({"passed": "yes"})).unwrap_err();
        match err {
            ShapeError::SchemaViolation { shape, errors } => {
                assert_eq!(shape, Shape::Adjudication);
                assert!(!errors.is_empty());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
