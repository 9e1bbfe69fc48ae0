//! HTTP fetchers for datasets and raw text.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use claimcheck_core::text::html_to_text;

use super::{
    release_file, resolve_locator, scope_file_stem, DatasetFormat, FetchError, FetchedResource,
    ResourceFetcher, TextFormat,
};
use crate::config::FetchConfig;

/// Shared download path: one GET, capped body, nothing on disk until the
/// whole body has arrived with a success status.
struct Downloader {
    client: reqwest::Client,
    config: FetchConfig,
}

struct Download {
    url: String,
    content_type: String,
    body: Vec<u8>,
}

impl Downloader {
    fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn get(&self, locator: &str) -> Result<Download, FetchError> {
        let url = resolve_locator(locator)?;
        tracing::info!(url = %url, "Fetching resource");

        let mut response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.config.timeout)
            } else {
                FetchError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let limit = self.config.max_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(FetchError::TooLarge { limit });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.config.timeout)
            } else {
                FetchError::Http(e.to_string())
            }
        })? {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(Download {
            url: response.url().to_string(),
            content_type,
            body,
        })
    }
}

async fn persist(dir: &Path, file_name: String, bytes: &[u8]) -> Result<PathBuf, FetchError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| FetchError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let path = dir.join(file_name);
    if let Err(source) = tokio::fs::write(&path, bytes).await {
        // A failed write may leave a partial file behind.
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::debug!(path = %path.display(), error = %e, "Nothing to clean up");
        }
        return Err(FetchError::Io { path, source });
    }
    Ok(path)
}

/// PDF parsing is CPU-bound and can panic on malformed input, so it runs on
/// the blocking pool and both failure modes become a fetch error.
async fn extract_pdf_text(body: Vec<u8>) -> Result<String, FetchError> {
    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&body))
        .await
        .map_err(|e| FetchError::Unsupported(format!("PDF text extraction aborted: {e}")))?;
    extracted.map_err(|e| FetchError::Unsupported(format!("Unreadable PDF: {e}")))
}

/// Fetches datasets and stores the bytes verbatim.
pub struct HttpDatasetFetcher {
    downloader: Downloader,
}

impl HttpDatasetFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        Ok(Self {
            downloader: Downloader::new(config)?,
        })
    }
}

#[async_trait]
impl ResourceFetcher for HttpDatasetFetcher {
    async fn fetch(&self, locator: &str, scope_id: &str) -> Result<FetchedResource, FetchError> {
        let download = self.downloader.get(locator).await?;
        let format = DatasetFormat::detect(&download.url, &download.content_type);

        let file_name = format!(
            "citation_{}_dataset.{}",
            scope_file_stem(scope_id),
            format.as_str()
        );
        let local_path = persist(&self.downloader.config.dataset_dir, file_name, &download.body).await?;

        tracing::info!(
            path = %local_path.display(),
            format = format.as_str(),
            bytes = download.body.len(),
            "Dataset fetched"
        );

        Ok(FetchedResource {
            format: format.as_str().to_string(),
            local_path,
            text_content: None,
        })
    }

    async fn release(&self, path: &Path) -> Result<(), FetchError> {
        release_file(path).await
    }
}

/// Fetches text sources and extracts their text.
pub struct HttpTextFetcher {
    downloader: Downloader,
}

impl HttpTextFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        Ok(Self {
            downloader: Downloader::new(config)?,
        })
    }
}

#[async_trait]
impl ResourceFetcher for HttpTextFetcher {
    async fn fetch(&self, locator: &str, scope_id: &str) -> Result<FetchedResource, FetchError> {
        let download = self.downloader.get(locator).await?;
        let format = TextFormat::detect(&download.url, &download.content_type);

        let text = match format {
            TextFormat::Pdf => extract_pdf_text(download.body.clone()).await?,
            TextFormat::Html => html_to_text(&String::from_utf8_lossy(&download.body)),
            TextFormat::Txt => String::from_utf8_lossy(&download.body).into_owned(),
        };

        let file_name = format!(
            "citation_{}_text.{}",
            scope_file_stem(scope_id),
            format.as_str()
        );
        let local_path = persist(&self.downloader.config.text_dir, file_name, &download.body).await?;

        tracing::info!(
            path = %local_path.display(),
            format = format.as_str(),
            chars = text.chars().count(),
            "Text source fetched"
        );

        Ok(FetchedResource {
            format: format.as_str().to_string(),
            local_path,
            text_content: Some(text),
        })
    }

    async fn release(&self, path: &Path) -> Result<(), FetchError> {
        release_file(path).await
    }
}
