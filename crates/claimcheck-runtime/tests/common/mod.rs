//! In-memory stand-ins for the external boundaries.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use claimcheck_core::{Claim, DiscoveredSource, FactCheckEntry};
use claimcheck_runtime::fetch::FetchedResource;
use claimcheck_runtime::{
    Capability, DatasetFinder, DiscoveredSourceRegistry, ExecutionOutcome, FactCheckError,
    FactCheckIndex, FetchError, GeneratedScript, Generation, GenerationError, GenerationRequest,
    ResourceFetcher, RuntimeConfig, Sandbox, SandboxError, TextGenerationService,
};

type Responder = dyn Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync;

/// Generator answering from a closure and counting calls per capability.
pub struct MockGenerator {
    responder: Box<Responder>,
    calls: Mutex<Vec<Capability>>,
}

impl MockGenerator {
    pub fn new(
        responder: impl Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Fails every call.
    pub fn unavailable() -> Arc<Self> {
        Self::new(|_| Err(GenerationError::Empty))
    }

    pub fn calls(&self, capability: Capability) -> usize {
        self.calls.lock().iter().filter(|c| **c == capability).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl TextGenerationService for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError> {
        self.calls.lock().push(request.capability);
        let text = (self.responder)(&request)?;
        Ok(Generation {
            text,
            usage: Default::default(),
        })
    }
}

pub fn plausibility_reply(plausible: bool, confidence: f64) -> String {
    format!(r#"{{"plausible": {plausible}, "confidence": {confidence}, "reasoning": "Consistent with known data"}}"#)
}

/// Shell one-liner printing a verdict line.
pub fn verdict_script(passed: bool, confidence: f64) -> String {
    format!(
        r#"echo '{{"passed": {passed}, "confidence": {confidence}, "explanation": "checked"}}'"#
    )
}

/// Fetcher serving a fixed resource and recording every call.
pub struct MockFetcher {
    format: &'static str,
    text: Option<String>,
    fail_status: Option<u16>,
    pub fetches: Mutex<Vec<(String, String)>>,
    pub releases: Mutex<Vec<PathBuf>>,
}

impl MockFetcher {
    pub fn dataset() -> Self {
        Self {
            format: "csv",
            text: None,
            fail_status: None,
            fetches: Mutex::new(Vec::new()),
            releases: Mutex::new(Vec::new()),
        }
    }

    pub fn text(content: &str) -> Self {
        Self {
            format: "txt",
            text: Some(content.to_string()),
            ..Self::dataset()
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::dataset()
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().len()
    }

    pub fn release_count(&self) -> usize {
        self.releases.lock().len()
    }

    pub fn path_for(&self, scope_id: &str) -> PathBuf {
        PathBuf::from(format!("/mock/{scope_id}.{}", self.format))
    }
}

#[async_trait]
impl ResourceFetcher for MockFetcher {
    async fn fetch(&self, locator: &str, scope_id: &str) -> Result<FetchedResource, FetchError> {
        self.fetches
            .lock()
            .push((locator.to_string(), scope_id.to_string()));

        if let Some(status) = self.fail_status {
            return Err(FetchError::Status {
                status,
                url: locator.to_string(),
            });
        }

        Ok(FetchedResource {
            format: self.format.to_string(),
            local_path: self.path_for(scope_id),
            text_content: self.text.clone(),
        })
    }

    async fn release(&self, path: &Path) -> Result<(), FetchError> {
        self.releases.lock().push(path.to_path_buf());
        Ok(())
    }
}

type Runner = dyn Fn(&str) -> ExecutionOutcome + Send + Sync;

/// Sandbox deciding the outcome from the script source.
pub struct MockSandbox {
    runner: Box<Runner>,
    pub runs: Mutex<Vec<(String, PathBuf)>>,
}

impl MockSandbox {
    pub fn new(runner: impl Fn(&str) -> ExecutionOutcome + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            runner: Box::new(runner),
            runs: Mutex::new(Vec::new()),
        })
    }

    /// Every script passes.
    pub fn passing() -> Arc<Self> {
        Self::new(|_| succeeded(r#"{"passed": true, "confidence": 0.9, "explanation": "checked"}"#))
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().len()
    }
}

#[async_trait]
impl Sandbox for MockSandbox {
    async fn execute(
        &self,
        script: &GeneratedScript,
        dataset_path: &Path,
    ) -> Result<ExecutionOutcome, SandboxError> {
        self.runs
            .lock()
            .push((script.source.clone(), dataset_path.to_path_buf()));
        Ok((self.runner)(&script.source))
    }
}

pub fn succeeded(stdout: &str) -> ExecutionOutcome {
    ExecutionOutcome {
        success: true,
        stdout: stdout.to_string(),
        exit_code: Some(0),
        ..Default::default()
    }
}

pub fn crashed(stderr: &str) -> ExecutionOutcome {
    ExecutionOutcome {
        success: false,
        stderr: stderr.to_string(),
        exit_code: Some(1),
        ..Default::default()
    }
}

/// Fact-check index returning the same entries for every query.
#[derive(Default)]
pub struct MockIndex {
    entries: Vec<FactCheckEntry>,
    pub searches: AtomicUsize,
}

impl MockIndex {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_entry(rating: &str, publisher: &str) -> Arc<Self> {
        Arc::new(Self {
            entries: vec![FactCheckEntry {
                rating: rating.to_string(),
                publisher: publisher.to_string(),
                url: "https://factcheck.example/review".to_string(),
            }],
            searches: AtomicUsize::new(0),
        })
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FactCheckIndex for MockIndex {
    async fn search(&self, _query: &str) -> Result<Vec<FactCheckEntry>, FactCheckError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.clone())
    }
}

/// Finder returning a fixed source and counting calls.
pub struct FixedFinder {
    source: Option<DiscoveredSource>,
    pub calls: AtomicUsize,
}

impl FixedFinder {
    pub fn returning(url: &str) -> Arc<Self> {
        Arc::new(Self {
            source: Some(DiscoveredSource {
                url: url.to_string(),
                repository: "data.gov".to_string(),
                relevance_score: 0.7,
                found_by_claim_id: String::new(),
                search_query: None,
                reuse_count: 0,
            }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatasetFinder for FixedFinder {
    async fn find(
        &self,
        claim: &Claim,
        registry: &DiscoveredSourceRegistry,
    ) -> Option<DiscoveredSource> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let source = self.source.clone()?;
        Some(registry.append(DiscoveredSource {
            found_by_claim_id: claim.id.clone(),
            ..source
        }))
    }
}

/// Configuration that never touches the working directory.
pub fn test_config(dir: &Path) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.sandbox.script_archive_dir = None;
    config.fetch.dataset_dir = dir.join("datasets");
    config.fetch.text_dir = dir.join("text_sources");
    config
}

/// Loopback HTTP server answering every request with `status` and no body.
/// Returns the base URL and a request counter.
pub async fn serve_status(status: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = requests.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response =
                format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    (format!("http://{addr}"), requests)
}
