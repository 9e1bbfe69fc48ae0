//! Quantitative validation by generated analysis script.
//!
//! The generated script is responsible for the statistics; this module owns
//! the envelope around it: generate, archive, execute under the sandbox,
//! parse the verdict line. Every failure along the way degrades this one
//! claim to an unvalidated verdict.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use claimcheck_core::structured::{extract_code, parse_output, ScriptVerdict};
use claimcheck_core::{Claim, ValidationMethod, ValidationVerdict};

use crate::fetch::scope_file_stem;
use crate::generation::{Capability, GenerationRequest, TextGenerationService};
use crate::prompts;
use crate::sandbox::{GeneratedScript, Sandbox};

const METHOD: ValidationMethod = ValidationMethod::GeneratedScript;

pub struct ScriptValidator {
    generator: Arc<dyn TextGenerationService>,
    sandbox: Arc<dyn Sandbox>,
    archive_dir: Option<PathBuf>,
}

impl ScriptValidator {
    pub fn new(
        generator: Arc<dyn TextGenerationService>,
        sandbox: Arc<dyn Sandbox>,
        archive_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            generator,
            sandbox,
            archive_dir,
        }
    }

    pub async fn validate(&self, claim: &Claim, dataset_path: &Path) -> ValidationVerdict {
        let script = match self.generate(claim, dataset_path).await {
            Ok(script) => script,
            Err(reason) => {
                tracing::warn!(claim_id = %claim.id, error = %reason, "Script generation failed");
                return ValidationVerdict::failed(
                    claim,
                    METHOD,
                    "Failed to generate validation script",
                    Some(reason),
                );
            }
        };

        let archived = self.archive(claim, &script).await;

        let outcome = match self.sandbox.execute(&script, dataset_path).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(claim_id = %claim.id, error = %e, "Sandbox failed");
                return ValidationVerdict::failed(
                    claim,
                    METHOD,
                    "Script execution failed",
                    Some(e.to_string()),
                );
            }
        };

        if outcome.timed_out {
            tracing::warn!(claim_id = %claim.id, "Validation script timed out");
            return ValidationVerdict::failed(
                claim,
                METHOD,
                "Script execution timed out",
                Some(outcome.stderr),
            );
        }

        if !outcome.success {
            let error = if outcome.stderr.trim().is_empty() {
                match outcome.exit_code {
                    Some(code) => format!("Exited with status {code}"),
                    None => "Terminated by signal".to_string(),
                }
            } else {
                outcome.stderr
            };
            tracing::warn!(claim_id = %claim.id, exit_code = ?outcome.exit_code, "Validation script failed");
            return ValidationVerdict::failed(claim, METHOD, "Script execution failed", Some(error));
        }

        let verdict: ScriptVerdict = match parse_output(&outcome.stdout) {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(claim_id = %claim.id, error = %e, "Unparsable script output");
                return ValidationVerdict::failed(
                    claim,
                    METHOD,
                    "Failed to parse script output",
                    Some(format!("{e}\nRaw output:\n{}", outcome.stdout)),
                );
            }
        };

        tracing::info!(
            claim_id = %claim.id,
            passed = verdict.passed,
            confidence = verdict.confidence,
            "Script validation complete"
        );

        let mut evidence = vec![format!("dataset: {}", dataset_path.display())];
        if let Some(path) = archived {
            evidence.push(format!("script: {}", path.display()));
        }

        ValidationVerdict::completed(
            claim,
            METHOD,
            verdict.passed,
            verdict.confidence,
            verdict.explanation,
            evidence,
        )
    }

    async fn generate(&self, claim: &Claim, dataset_path: &Path) -> Result<GeneratedScript, String> {
        let request = GenerationRequest::free_text(
            Capability::ScriptGeneration,
            prompts::SCRIPT_SYSTEM_PROMPT,
            prompts::script_prompt(&claim.text, &dataset_path.display().to_string()),
        );

        let generation = self
            .generator
            .generate(request)
            .await
            .map_err(|e| e.to_string())?;

        let script = GeneratedScript::new(extract_code(&generation.text));
        if script.is_blank() {
            return Err("Generated script is empty".to_string());
        }
        Ok(script)
    }

    /// Keep the script for audit. Failure to archive is logged only.
    async fn archive(&self, claim: &Claim, script: &GeneratedScript) -> Option<PathBuf> {
        let dir = self.archive_dir.as_ref()?;
        let path = dir.join(format!("validate_{}.py", scope_file_stem(&claim.id)));

        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, &script.source).await
        }
        .await;

        match written {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(claim_id = %claim.id, path = %path.display(), error = %e, "Failed to archive script");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{Generation, GenerationError};
    use crate::sandbox::{ExecutionOutcome, SandboxError};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct CodeReply(Option<&'static str>);

    #[async_trait]
    impl TextGenerationService for CodeReply {
        async fn generate(&self, _request: GenerationRequest) -> Result<Generation, GenerationError> {
            match self.0 {
                Some(text) => Ok(Generation {
                    text: text.to_string(),
                    usage: Default::default(),
                }),
                None => Err(GenerationError::Empty),
            }
        }
    }

    struct CannedSandbox {
        outcome: ExecutionOutcome,
        seen: Mutex<Vec<String>>,
    }

    impl CannedSandbox {
        fn new(outcome: ExecutionOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Sandbox for CannedSandbox {
        async fn execute(
            &self,
            script: &GeneratedScript,
            _dataset_path: &Path,
        ) -> Result<ExecutionOutcome, SandboxError> {
            self.seen.lock().push(script.source.clone());
            Ok(self.outcome.clone())
        }
    }

    fn ok_run(stdout: &str) -> ExecutionOutcome {
        ExecutionOutcome {
            success: true,
            stdout: stdout.to_string(),
            exit_code: Some(0),
            ..Default::default()
        }
    }

    fn claim() -> Claim {
        Claim::quantitative("q1", "Unemployment fell to 3.5% in 2019")
    }

    #[tokio::test]
    async fn test_clean_run_validates() {
        let sandbox = CannedSandbox::new(ok_run(
            "loading...\n{\"passed\": true, \"confidence\": 0.95, \"explanation\": \"3.5% in 2019\"}\n",
        ));
        let validator = ScriptValidator::new(
            Arc::new(CodeReply(Some("```python\nimport json\nprint(1)\n```"))),
            sandbox.clone(),
            None,
        );

        let verdict = validator.validate(&claim(), Path::new("d.csv")).await;
        assert!(verdict.validated());
        assert!(verdict.passed());
        assert_eq!(verdict.confidence(), 0.95);
        assert_eq!(verdict.method(), ValidationMethod::GeneratedScript);
        assert_eq!(sandbox.seen.lock().as_slice(), &["import json\nprint(1)".to_string()]);
    }

    #[tokio::test]
    async fn test_generation_failure() {
        let sandbox = CannedSandbox::new(ok_run("{}"));
        let validator = ScriptValidator::new(Arc::new(CodeReply(None)), sandbox.clone(), None);

        let verdict = validator.validate(&claim(), Path::new("d.csv")).await;
        assert!(!verdict.validated());
        assert_eq!(verdict.confidence(), 0.0);
        assert_eq!(verdict.explanation(), "Failed to generate validation script");
        assert!(sandbox.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_blank_code_is_generation_failure() {
        let sandbox = CannedSandbox::new(ok_run("{}"));
        let validator =
            ScriptValidator::new(Arc::new(CodeReply(Some("```python\n```"))), sandbox.clone(), None);

        let verdict = validator.validate(&claim(), Path::new("d.csv")).await;
        assert_eq!(verdict.explanation(), "Failed to generate validation script");
        assert_eq!(verdict.errors(), Some("Generated script is empty"));
        assert!(sandbox.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_timeout() {
        let sandbox = CannedSandbox::new(ExecutionOutcome {
            timed_out: true,
            stderr: "Script execution timed out (30s limit)".to_string(),
            ..Default::default()
        });
        let validator = ScriptValidator::new(Arc::new(CodeReply(Some("x"))), sandbox, None);

        let verdict = validator.validate(&claim(), Path::new("d.csv")).await;
        assert!(!verdict.validated());
        assert!(verdict.explanation().contains("timed out"));
        assert_eq!(verdict.errors(), Some("Script execution timed out (30s limit)"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_keeps_stderr() {
        let sandbox = CannedSandbox::new(ExecutionOutcome {
            success: false,
            stderr: "KeyError: 'year'".to_string(),
            exit_code: Some(1),
            ..Default::default()
        });
        let validator = ScriptValidator::new(Arc::new(CodeReply(Some("x"))), sandbox, None);

        let verdict = validator.validate(&claim(), Path::new("d.csv")).await;
        assert_eq!(verdict.explanation(), "Script execution failed");
        assert_eq!(verdict.errors(), Some("KeyError: 'year'"));
    }

    #[tokio::test]
    async fn test_unparsable_output_keeps_raw() {
        let sandbox = CannedSandbox::new(ok_run("The claim looks right to me"));
        let validator = ScriptValidator::new(Arc::new(CodeReply(Some("x"))), sandbox, None);

        let verdict = validator.validate(&claim(), Path::new("d.csv")).await;
        assert!(!verdict.validated());
        assert_eq!(verdict.explanation(), "Failed to parse script output");
        assert!(verdict
            .errors()
            .unwrap()
            .contains("The claim looks right to me"));
    }

    #[tokio::test]
    async fn test_script_archived() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("generated_scripts");
        let validator = ScriptValidator::new(
            Arc::new(CodeReply(Some("print('hi')"))),
            CannedSandbox::new(ok_run(r#"{"passed": false, "confidence": 0.8}"#)),
            Some(archive.clone()),
        );

        let verdict = validator.validate(&claim(), Path::new("d.csv")).await;
        assert!(verdict.validated());
        assert!(!verdict.passed());

        let files: Vec<_> = std::fs::read_dir(&archive).unwrap().collect();
        assert_eq!(files.len(), 1);
        let path = files[0].as_ref().unwrap().path();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("validate_q1_"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "print('hi')");
        assert!(verdict.evidence().iter().any(|e| e.starts_with("script: ")));
    }
}
