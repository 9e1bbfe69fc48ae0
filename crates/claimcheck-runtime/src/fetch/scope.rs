//! Scoped acquisition of a fetched resource.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use futures::FutureExt;

use super::{FetchError, FetchedResource, ResourceFetcher};

/// Outcome of one fetch-use-release cycle.
#[derive(Debug)]
pub enum Acquisition<T> {
    /// The resource never reached local storage; `work` did not run.
    FetchFailed(FetchError),

    /// `work` ran and the release step was attempted.
    Completed {
        path: PathBuf,
        format: String,
        value: T,
        release_error: Option<FetchError>,
    },
}

/// Fetch `locator` once, run `work` against the local copy, release it.
///
/// Release runs after `work` finishes, including when `work` panics; the
/// panic is resumed once the resource is gone. A missing locator is a fetch
/// failure and the fetcher is not called.
pub async fn with_fetched_resource<F, Fut, T>(
    fetcher: &dyn ResourceFetcher,
    locator: Option<&str>,
    scope_id: &str,
    work: F,
) -> Acquisition<T>
where
    F: FnOnce(FetchedResource) -> Fut,
    Fut: Future<Output = T>,
{
    let Some(locator) = locator else {
        return Acquisition::FetchFailed(FetchError::MissingLocator);
    };

    let resource = match fetcher.fetch(locator, scope_id).await {
        Ok(resource) => resource,
        Err(e) => return Acquisition::FetchFailed(e),
    };

    let path = resource.local_path.clone();
    let format = resource.format.clone();

    let outcome = AssertUnwindSafe(work(resource)).catch_unwind().await;

    let release_error = fetcher.release(&path).await.err();
    if let Some(e) = &release_error {
        tracing::warn!(scope = scope_id, path = %path.display(), error = %e, "Failed to release resource");
    }

    match outcome {
        Ok(value) => Acquisition::Completed {
            path,
            format,
            value,
            release_error,
        },
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::Path;

    #[derive(Default)]
    struct Recorder {
        fetches: Mutex<Vec<String>>,
        releases: Mutex<Vec<PathBuf>>,
        fail_fetch: bool,
        fail_release: bool,
    }

    #[async_trait]
    impl ResourceFetcher for Recorder {
        async fn fetch(&self, locator: &str, scope_id: &str) -> Result<FetchedResource, FetchError> {
            self.fetches.lock().push(locator.to_string());
            if self.fail_fetch {
                return Err(FetchError::Status {
                    status: 404,
                    url: locator.to_string(),
                });
            }
            Ok(FetchedResource {
                format: "csv".to_string(),
                local_path: PathBuf::from(format!("/tmp/{scope_id}.csv")),
                text_content: None,
            })
        }

        async fn release(&self, path: &Path) -> Result<(), FetchError> {
            self.releases.lock().push(path.to_path_buf());
            if self.fail_release {
                return Err(FetchError::NotFound(path.to_path_buf()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_completed_releases_once() {
        let fetcher = Recorder::default();
        let acquisition =
            with_fetched_resource(&fetcher, Some("https://x/d.csv"), "c1", |r| async move {
                r.format.len()
            })
            .await;

        match acquisition {
            Acquisition::Completed {
                value,
                release_error,
                ..
            } => {
                assert_eq!(value, 3);
                assert!(release_error.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(fetcher.fetches.lock().len(), 1);
        assert_eq!(fetcher.releases.lock().as_slice(), &[PathBuf::from("/tmp/c1.csv")]);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_work_and_release() {
        let fetcher = Recorder {
            fail_fetch: true,
            ..Default::default()
        };
        let acquisition =
            with_fetched_resource(&fetcher, Some("https://x/d.csv"), "c1", |_| async {
                panic!("work must not run")
            })
            .await;

        assert!(matches!(
            acquisition,
            Acquisition::<()>::FetchFailed(FetchError::Status { status: 404, .. })
        ));
        assert!(fetcher.releases.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_locator_never_fetches() {
        let fetcher = Recorder::default();
        let acquisition = with_fetched_resource(&fetcher, None, "c1", |_| async { 1 }).await;
        assert!(matches!(
            acquisition,
            Acquisition::FetchFailed(FetchError::MissingLocator)
        ));
        assert!(fetcher.fetches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_release_error_is_reported() {
        let fetcher = Recorder {
            fail_release: true,
            ..Default::default()
        };
        let acquisition = with_fetched_resource(&fetcher, Some("u"), "c1", |_| async { 1 }).await;
        assert!(matches!(
            acquisition,
            Acquisition::Completed {
                release_error: Some(FetchError::NotFound(_)),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_release_runs_when_work_panics() {
        let fetcher = std::sync::Arc::new(Recorder::default());
        let inner = fetcher.clone();

        let result = tokio::spawn(async move {
            with_fetched_resource(inner.as_ref(), Some("u"), "c1", |_| async {
                panic!("script step blew up")
            })
            .await;
        })
        .await;

        assert!(result.unwrap_err().is_panic());
        assert_eq!(fetcher.releases.lock().len(), 1);
    }
}
