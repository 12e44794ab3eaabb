// Dashboard data client.
//
// Loads `{stories, filters}` from the API and falls back to the bundled
// static file when the API cannot be reached. Uploads surface a message
// suitable for showing to the user.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use storymap_classify::ImportReport;
use storymap_core::snapshot::Snapshot;
use thiserror::Error;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Where a loaded snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Api,
    StaticFallback,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadSummary {
    pub processed_count: usize,
    pub new_count: usize,
    pub duplicate_count: usize,
    #[serde(default)]
    pub total_stories: usize,
}

impl UploadSummary {
    pub fn message(&self) -> String {
        format!(
            "Processed {} stories: {} new, {} duplicates skipped",
            self.processed_count, self.new_count, self.duplicate_count
        )
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    /// The server rejected the upload with an `{error}` body.
    #[error("{0}")]
    Rejected(String),

    #[error("Upload failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upload failed: server returned status {0}")]
    Status(u16),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct DashboardClient {
    http: reqwest::Client,
    base_url: String,
    fallback_path: PathBuf,
}

impl DashboardClient {
    pub fn new(base_url: impl Into<String>, fallback_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            fallback_path: fallback_path.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Latest stories and filters. Any API failure falls back to the static
    /// file; only a missing or unreadable fallback is an error.
    pub async fn load(&self) -> anyhow::Result<(Snapshot, DataSource)> {
        match self.fetch_snapshot().await {
            Ok(snapshot) => Ok((snapshot, DataSource::Api)),
            Err(e) => {
                warn!("API unavailable ({:#}), using static data", e);
                let snapshot = Snapshot::load(&self.fallback_path)?;
                Ok((snapshot, DataSource::StaticFallback))
            }
        }
    }

    async fn fetch_snapshot(&self) -> anyhow::Result<Snapshot> {
        let response = self
            .http
            .get(self.url("/api/refresh-data"))
            .send()
            .await?
            .error_for_status()?;
        let snapshot = response.json::<Snapshot>().await?;
        debug!(stories = snapshot.stories.len(), "loaded stories from API");
        Ok(snapshot)
    }

    /// Upload a story list as multipart field `file`.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadSummary, UploadError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(self.url("/api/upload-excel"))
            .multipart(form)
            .send()
            .await?;
        read_result(response).await
    }

    pub async fn import_sitemap(&self, max_articles: Option<usize>) -> Result<ImportReport, UploadError> {
        let response = self
            .http
            .post(self.url("/api/import-sitemap-sync"))
            .json(&serde_json::json!({ "max_articles": max_articles }))
            .send()
            .await?;
        read_result(response).await
    }
}

async fn read_result<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, UploadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    match response.json::<ErrorBody>().await {
        Ok(body) => Err(UploadError::Rejected(body.error)),
        Err(_) => Err(UploadError::Status(status.as_u16())),
    }
}
