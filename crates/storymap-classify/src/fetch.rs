// Page fetching with an on-disk cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        source: reqwest::Error,
    },
}

// --- PageFetcher trait ---

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the HTML (or XML) body at `url`.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        (**self).fetch(url).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// --- HTTP fetcher ---

pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

// --- Caching wrapper ---

/// Serves pages from `<dir>/<sha256(url)>.html` when present and stores
/// successful fetches there. Failures are not cached, so a later run retries.
pub struct CachedFetcher<F> {
    inner: F,
    dir: PathBuf,
    name: String,
}

impl<F: PageFetcher> CachedFetcher<F> {
    pub fn new(inner: F, dir: impl Into<PathBuf>) -> Self {
        let name = format!("cached {}", inner.name());
        Self {
            inner,
            dir: dir.into(),
            name,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.html", cache_key(url)))
    }
}

pub fn cache_key(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for CachedFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let path = self.cache_path(url);
        if let Ok(body) = tokio::fs::read_to_string(&path).await {
            debug!(url, fetcher = self.inner.name(), "page cache hit");
            return Ok(body);
        }

        let body = self.inner.fetch(url).await?;

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!("failed to create page cache {}: {}", self.dir.display(), e);
        } else if let Err(e) = tokio::fs::write(&path, &body).await {
            warn!("failed to cache {} at {}: {}", url, path.display(), e);
        }
        Ok(body)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves canned pages and counts calls; unknown URLs return 404.
    struct CountingFetcher {
        pages: HashMap<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn cache_key_is_stable_hex() {
        let key = cache_key("https://www.publicsource.org/a/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, cache_key("https://www.publicsource.org/a/"));
        assert_ne!(key, cache_key("https://www.publicsource.org/b/"));
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_cache() {
        let dir = temp_dir("storymap_fetch_cache_hit");
        let inner = CountingFetcher {
            pages: HashMap::from([("https://a.org/1".to_string(), "<html>one</html>".to_string())]),
            calls: AtomicUsize::new(0),
        };
        let cached = CachedFetcher::new(inner, &dir);

        assert_eq!(cached.fetch("https://a.org/1").await.unwrap(), "<html>one</html>");
        assert_eq!(cached.fetch("https://a.org/1").await.unwrap(), "<html>one</html>");
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
        assert!(cached.cache_path("https://a.org/1").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let dir = temp_dir("storymap_fetch_cache_miss");
        let inner = CountingFetcher {
            pages: HashMap::new(),
            calls: AtomicUsize::new(0),
        };
        let cached = CachedFetcher::new(inner, &dir);

        assert!(matches!(
            cached.fetch("https://a.org/missing").await,
            Err(FetchError::Status { status: 404, .. })
        ));
        assert!(cached.fetch("https://a.org/missing").await.is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        assert!(!cached.cache_path("https://a.org/missing").exists());
        assert_eq!(cached.name(), "cached counting");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn arc_fetcher_delegates() {
        let inner: Arc<dyn PageFetcher> = Arc::new(CountingFetcher {
            pages: HashMap::from([("u".to_string(), "body".to_string())]),
            calls: AtomicUsize::new(0),
        });
        assert_eq!(inner.fetch("u").await.unwrap(), "body");
        assert_eq!(inner.name(), "counting");
    }
}
