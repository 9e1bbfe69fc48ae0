//! Resource fetchers.
//!
//! A citation batch fetches its resource once, validates every claim
//! against the local copy, and releases it. Fetchers only move bytes; the
//! scoped fetch-then-release discipline lives in [`with_fetched_resource`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

mod detect;
mod http;
mod scope;

pub use detect::{DatasetFormat, TextFormat};
pub use http::{HttpDatasetFetcher, HttpTextFetcher};
pub use scope::{with_fetched_resource, Acquisition};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("No URL or DOI found")]
    MissingLocator,

    #[error("Not a URL or DOI: {0}")]
    InvalidLocator(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Response exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Unsupported format: {0}")]
    Unsupported(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Not a file: {0}")]
    NotAFile(PathBuf),
}

/// A resource persisted locally for the lifetime of one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchedResource {
    /// `csv`, `json`, `xlsx`, `xls`, `html` or `txt`
    pub format: String,
    pub local_path: PathBuf,

    /// Extracted text, for text resources only
    #[serde(skip)]
    pub text_content: Option<String>,
}

/// Fetches a cited resource to local storage and deletes it again.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// `scope_id` names the batch; distinct scopes never share a path.
    async fn fetch(&self, locator: &str, scope_id: &str) -> Result<FetchedResource, FetchError>;

    async fn release(&self, path: &Path) -> Result<(), FetchError>;
}

/// Turn a citation locator into a fetchable URL. URLs pass through, DOIs
/// (bare `10.x/...` or `doi:`-prefixed) resolve via doi.org.
pub fn resolve_locator(locator: &str) -> Result<String, FetchError> {
    let trimmed = locator.trim();
    if trimmed.is_empty() {
        return Err(FetchError::MissingLocator);
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(trimmed.to_string());
    }

    let doi = if lower.starts_with("doi:") {
        trimmed[4..].trim()
    } else {
        trimmed
    };
    if doi.starts_with("10.") && doi.contains('/') {
        return Ok(format!("https://doi.org/{doi}"));
    }

    Err(FetchError::InvalidLocator(trimmed.to_string()))
}

/// File-system-safe stem for a scope id, suffixed with a hash of the raw id
/// so that ids differing only in unsafe characters stay distinct.
pub fn scope_file_stem(scope_id: &str) -> String {
    let sanitized: String = scope_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();

    format!("{}_{:016x}", sanitized, fnv1a(scope_id.as_bytes()))
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Delete a fetched file. Missing files and directories are errors.
pub(crate) async fn release_file(path: &Path) -> Result<(), FetchError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FetchError::NotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(FetchError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if !metadata.is_file() {
        return Err(FetchError::NotAFile(path.to_path_buf()));
    }

    tokio::fs::remove_file(path)
        .await
        .map_err(|source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::debug!(path = %path.display(), "Released fetched resource");
    Ok(())
}
