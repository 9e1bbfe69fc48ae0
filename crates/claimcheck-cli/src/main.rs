use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use claimcheck_core::{CitationBatch, Claim, LanePartition};
use claimcheck_runtime::{CatalogSearch, RuntimeConfig, ValidationOrchestratorBuilder};

#[derive(Parser, Debug)]
#[command(name = "claimcheck")]
#[command(about = "Validate extracted claims against cited datasets, documents and fact-checks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate every claim and emit the report as JSON
    Validate {
        /// Claims JSON: an array, or an object with a `claims` array
        #[arg(long)]
        claims: PathBuf,

        /// Runtime configuration YAML
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured provider
        #[arg(long, value_enum)]
        provider: Option<ProviderKind>,

        /// Write the report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Dataset catalog JSON used to find sources for uncited quantitative claims
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Minimum catalog similarity for a dataset candidate
        #[arg(long, default_value_t = 0.1)]
        catalog_min_score: f64,
    },

    /// Show lane assignment and citation batches without any external call
    Plan {
        #[arg(long)]
        claims: PathBuf,
    },

    /// Configuration helpers
    Config {
        /// Emit the default configuration as YAML
        #[arg(long)]
        print_default: bool,

        /// Load and validate a configuration file, then emit it normalized
        #[arg(long, conflicts_with = "print_default")]
        check: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProviderKind {
    Anthropic,
    Openai,
}

impl ProviderKind {
    fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Openai => "openai",
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClaimsFile {
    List(Vec<Claim>),
    Wrapped { claims: Vec<Claim> },
}

#[derive(Serialize)]
struct BatchPlan {
    citation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    locator: Option<String>,
    claim_ids: Vec<String>,
}

impl From<&CitationBatch> for BatchPlan {
    fn from(batch: &CitationBatch) -> Self {
        Self {
            citation_id: batch.citation_id().to_string(),
            locator: batch.locator().map(str::to_string),
            claim_ids: batch.claims().iter().map(|c| c.id.clone()).collect(),
        }
    }
}

#[derive(Serialize)]
struct Plan {
    uncited_qualitative: Vec<String>,
    uncited_quantitative: Vec<String>,
    cited_quantitative: Vec<BatchPlan>,
    cited_qualitative: Vec<BatchPlan>,
}

impl From<&LanePartition> for Plan {
    fn from(partition: &LanePartition) -> Self {
        let ids = |claims: &[Claim]| -> Vec<String> { claims.iter().map(|c| c.id.clone()).collect() };
        Self {
            uncited_qualitative: ids(&partition.uncited_qualitative),
            uncited_quantitative: ids(&partition.uncited_quantitative),
            cited_quantitative: partition.cited_quantitative.iter().map(BatchPlan::from).collect(),
            cited_qualitative: partition.cited_qualitative.iter().map(BatchPlan::from).collect(),
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_claims(path: &Path) -> Result<Vec<Claim>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read claims file {}", path.display()))?;
    let file: ClaimsFile = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse claims file {}", path.display()))?;
    Ok(match file {
        ClaimsFile::List(claims) | ClaimsFile::Wrapped { claims } => claims,
    })
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

fn emit(json: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

async fn validate(
    claims: &Path,
    config: Option<&Path>,
    provider: Option<ProviderKind>,
    output: Option<&Path>,
    catalog: Option<&Path>,
    catalog_min_score: f64,
) -> Result<()> {
    let claims = load_claims(claims)?;
    let mut config = load_config(config)?;
    if let Some(provider) = provider {
        if config.provider.provider_type != provider.as_str() {
            config.provider.provider_type = provider.as_str().to_string();
            // options belong to the configured provider
            config.provider.options = serde_json::json!({});
        }
    }

    let mut builder = ValidationOrchestratorBuilder::from_config(config)
        .context("Failed to set up text generation")?;
    if let Some(path) = catalog {
        let search = CatalogSearch::from_json_file(path, catalog_min_score)?;
        tracing::info!(entries = search.len(), "Loaded dataset catalog");
        builder = builder.catalog(search);
    }
    let orchestrator = builder.build().context("Failed to build orchestrator")?;

    tracing::info!(claims = claims.len(), "Validating claims");
    let report = orchestrator.process(claims).await;

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    emit(&json, output)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Validate {
            claims,
            config,
            provider,
            output,
            catalog,
            catalog_min_score,
        } => {
            if !(0.0..=1.0).contains(&catalog_min_score) {
                bail!("--catalog-min-score must be within [0, 1]");
            }
            validate(
                &claims,
                config.as_deref(),
                provider,
                output.as_deref(),
                catalog.as_deref(),
                catalog_min_score,
            )
            .await
        }
        Command::Plan { claims } => {
            let partition = LanePartition::from_claims(load_claims(&claims)?);
            let json = serde_json::to_string_pretty(&Plan::from(&partition))?;
            emit(&json, None)
        }
        Command::Config {
            print_default: _,
            check: Some(path),
        } => {
            let config = load_config(Some(&path))?;
            print!("{}", config.to_yaml()?);
            Ok(())
        }
        Command::Config { .. } => {
            print!("{}", RuntimeConfig::default().to_yaml()?);
            Ok(())
        }
    }
}
