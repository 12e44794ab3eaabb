// HTTP API, dashboard data client, and maintenance tasks for the story
// catalogue.

pub mod client;
pub mod maintenance;
pub mod routes;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use storymap_classify::{HttpFetcher, Pipeline, SitemapImporter};
use storymap_core::config::Config;
use storymap_core::db::Database;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state behind every handler.
pub struct AppState {
    pub db: Database,
    pub pipeline: Arc<Pipeline>,
    pub importer: SitemapImporter,
}

impl AppState {
    pub fn new(db: Database, pipeline: Arc<Pipeline>, importer: SitemapImporter) -> Self {
        Self {
            db,
            pipeline,
            importer,
        }
    }

    /// Open the store (seeding it from the static snapshot when empty) and
    /// build the classification pipeline and sitemap importer.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let db_path = config.db_path();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let db = Database::open(&db_path.to_string_lossy()).context("failed to open database")?;
        info!("Database opened at {}", db_path.display());

        let fallback = fallback_path(config);
        match maintenance::seed_from_snapshot(&db, &fallback)? {
            0 => {}
            n => info!("Seeded {} stories from {}", n, fallback.display()),
        }

        let pipeline = Arc::new(Pipeline::from_config(config)?);
        let sitemap_fetcher = HttpFetcher::new(
            Duration::from_secs(config.classification.fetch_timeout_secs),
            &config.classification.user_agent,
        )
        .context("failed to build sitemap fetcher")?;
        let importer = SitemapImporter::new(
            pipeline.clone(),
            Arc::new(sitemap_fetcher),
            config.sitemap.clone(),
        );

        Ok(Self::new(db, pipeline, importer))
    }
}

/// The static `{stories, filters}` file.
pub fn fallback_path(config: &Config) -> PathBuf {
    config.resolve(&config.data_paths.stories_fallback)
}

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/upload-excel", post(routes::upload_excel))
        .route("/api/refresh-data", get(routes::refresh_data))
        .route("/api/import-sitemap-sync", post(routes::import_sitemap_sync))
        .route("/api/stories", get(routes::list_stories))
        .route("/api/analytics", get(routes::analytics))
        .route("/api/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}
