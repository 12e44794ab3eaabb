// JSON API handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use storymap_classify::sheet::{allowed_extension, read_rows};
use storymap_core::analytics::Summary;
use storymap_core::filter::{sort_newest_first, StoryQuery};
use storymap_core::snapshot::Snapshot;
use storymap_core::Story;
use tracing::{error, info, warn};

use crate::AppState;

pub const NO_FILE: &str = "No file selected";
pub const UNSUPPORTED_FORMAT: &str = "Unsupported file format, please upload Excel or CSV files";

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

// --- Upload ---

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub processed_count: usize,
    pub new_count: usize,
    pub duplicate_count: usize,
    pub total_stories: usize,
}

pub async fn upload_excel(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut upload: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let file_name = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((file_name, bytes.to_vec())),
                    Err(e) => {
                        return error_response(StatusCode::BAD_REQUEST, format!("Upload failed: {e}"))
                    }
                }
                break;
            }
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Upload failed: {e}")),
        }
    }

    let Some((file_name, bytes)) = upload.filter(|(name, _)| !name.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, NO_FILE);
    };
    if allowed_extension(&file_name).is_none() {
        return error_response(StatusCode::BAD_REQUEST, UNSUPPORTED_FORMAT);
    }

    let rows = match read_rows(&file_name, &bytes) {
        Ok(rows) => rows,
        Err(e) => {
            error!("Classification pipeline error: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error processing file: {e}"),
            );
        }
    };
    info!(file = %file_name, rows = rows.len(), "story list uploaded");

    let output = state.pipeline.run(rows).await;
    let merged = match state.db.insert_new(&output.stories) {
        Ok(merged) => merged,
        Err(e) => {
            error!("failed to merge uploaded stories: {:#}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error processing file: {e}"),
            );
        }
    };
    let total_stories = match state.db.story_count() {
        Ok(n) => n,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error processing file: {e}"),
            )
        }
    };

    Json(UploadResponse {
        success: true,
        processed_count: output.stories.len(),
        new_count: merged.new_count,
        duplicate_count: merged.duplicate_count,
        total_stories,
    })
    .into_response()
}

// --- Refresh ---

pub async fn refresh_data(State(state): State<Arc<AppState>>) -> Response {
    match state.db.all_stories() {
        Ok(stories) => Json(Snapshot::from_stories(stories)).into_response(),
        Err(e) => {
            error!("Refresh data error: {:#}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get data: {e}"),
            )
        }
    }
}

// --- Sitemap import ---

#[derive(Debug, Default, Deserialize)]
pub struct ImportRequest {
    pub max_articles: Option<usize>,
}

/// The body is optional; an empty body imports everything new.
pub async fn import_sitemap_sync(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ImportRequest::default()
    } else {
        match serde_json::from_slice::<ImportRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, format!("Invalid request body: {e}"))
            }
        }
    };
    let limit = request.max_articles;
    match state.importer.run(&state.db, limit).await {
        Ok(report) => {
            let mut value = serde_json::to_value(&report).unwrap_or_default();
            if let Some(obj) = value.as_object_mut() {
                obj.insert("success".to_string(), serde_json::Value::Bool(true));
            }
            Json(value).into_response()
        }
        Err(e) => {
            error!("Sitemap import error: {:#}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Sitemap import failed: {e}"),
            )
        }
    }
}

// --- Story queries ---

/// Raw query string; empty values mean "not set".
#[derive(Debug, Default, Deserialize)]
pub struct StoriesParams {
    umbrella: Option<String>,
    geographic_area: Option<String>,
    neighborhood: Option<String>,
    q: Option<String>,
    from: Option<String>,
    to: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StoriesResponse {
    pub total: usize,
    pub stories: Vec<Story>,
}

fn parse_bound(name: &str, value: Option<String>) -> Result<Option<NaiveDate>, String> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("Invalid {name} date: {text} (expected YYYY-MM-DD)")),
    }
}

fn parse_count(name: &str, value: Option<String>) -> Result<Option<usize>, String> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text
            .parse::<usize>()
            .map(Some)
            .map_err(|_| format!("Invalid {name}: {text} (expected a non-negative integer)")),
    }
}

pub async fn list_stories(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StoriesParams>,
) -> Response {
    let (from, to) = match (parse_bound("from", params.from), parse_bound("to", params.to)) {
        (Ok(from), Ok(to)) => (from, to),
        (Err(e), _) | (_, Err(e)) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    let (limit, offset) = match (parse_count("limit", params.limit), parse_count("offset", params.offset)) {
        (Ok(limit), Ok(offset)) => (limit, offset),
        (Err(e), _) | (_, Err(e)) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    let query = StoryQuery {
        umbrella: params.umbrella,
        geographic_area: params.geographic_area,
        neighborhood: params.neighborhood,
        q: params.q,
        from,
        to,
    };

    let stories = match state.db.all_stories() {
        Ok(stories) => stories,
        Err(e) => {
            error!("Story query error: {:#}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get data: {e}"),
            );
        }
    };

    let mut matched: Vec<Story> = query.apply(&stories).into_iter().cloned().collect();
    sort_newest_first(&mut matched);
    let total = matched.len();
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let page: Vec<Story> = matched
        .into_iter()
        .skip(offset.unwrap_or(0))
        .take(limit)
        .collect();

    Json(StoriesResponse {
        total,
        stories: page,
    })
    .into_response()
}

// --- Analytics ---

pub async fn analytics(State(state): State<Arc<AppState>>) -> Response {
    match state.db.all_stories() {
        Ok(stories) => Json(Summary::compute(&stories)).into_response(),
        Err(e) => {
            warn!("Analytics error: {:#}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get data: {e}"),
            )
        }
    }
}
