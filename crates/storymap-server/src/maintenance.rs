// Store maintenance: seeding from the static snapshot, export, non-news
// cleaning, and reprocessing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use storymap_classify::Pipeline;
use storymap_core::cleaning::non_news_reasons;
use storymap_core::db::Database;
use storymap_core::export::write_review_tables;
use storymap_core::snapshot::Snapshot;
use tracing::{info, warn};

/// Load the snapshot at `path` into an empty store. Returns the number of
/// stories imported; a non-empty store or a missing file imports nothing.
pub fn seed_from_snapshot(db: &Database, path: &Path) -> anyhow::Result<usize> {
    if db.story_count()? > 0 {
        return Ok(0);
    }
    if !path.exists() {
        warn!("No static stories file at {}, starting empty", path.display());
        return Ok(0);
    }
    let snapshot = Snapshot::load(path)?;
    let merged = db
        .import_snapshot(&snapshot.stories)
        .context("failed to seed store from snapshot")?;
    Ok(merged.new_count)
}

/// Write every stored story, with derived filter lists, to `path`.
pub fn export_snapshot(db: &Database, path: &Path) -> anyhow::Result<usize> {
    let snapshot = Snapshot::from_stories(db.all_stories()?);
    snapshot.save(path)?;
    info!("Exported {} stories to {}", snapshot.stories.len(), path.display());
    Ok(snapshot.stories.len())
}

/// Write the review tables for every stored story into `dir`. Returns the
/// files written.
pub fn export_review(db: &Database, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let stories = db.all_stories()?;
    let written = write_review_tables(&stories, dir)?;
    info!(
        "Exported review tables for {} stories to {}",
        stories.len(),
        dir.display()
    );
    Ok(written)
}

// ---------------------------------------------------------------------------
// Cleaning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RemovedStory {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanReport {
    pub original_count: usize,
    pub kept_count: usize,
    pub removed_count: usize,
    pub dry_run: bool,
    /// Reason → number of stories flagged with it.
    pub reason_counts: BTreeMap<String, usize>,
    pub removed: Vec<RemovedStory>,
}

/// Remove non-news stories from the store. With `dry_run` the store is
/// left untouched and the report lists what would be removed.
pub fn clean_non_news(db: &Database, dry_run: bool) -> anyhow::Result<CleanReport> {
    let stories = db.all_stories()?;
    let mut report = CleanReport {
        original_count: stories.len(),
        dry_run,
        ..Default::default()
    };

    for story in &stories {
        let reasons = non_news_reasons(story);
        if reasons.is_empty() {
            continue;
        }
        for reason in &reasons {
            *report.reason_counts.entry(reason.to_string()).or_default() += 1;
        }
        report.removed.push(RemovedStory {
            id: story.id,
            url: story.url.clone(),
            title: story.title.clone(),
            reasons: reasons.iter().map(|r| r.to_string()).collect(),
        });
    }

    report.removed_count = report.removed.len();
    report.kept_count = report.original_count - report.removed_count;

    if !dry_run && !report.removed.is_empty() {
        let ids: Vec<i64> = report.removed.iter().map(|r| r.id).collect();
        let deleted = db.delete_stories(&ids).context("failed to delete non-news stories")?;
        info!("Removed {} non-news stories", deleted);
    }
    Ok(report)
}

pub fn write_clean_report(report: &CleanReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

// ---------------------------------------------------------------------------
// Reprocessing
// ---------------------------------------------------------------------------

/// Re-run stories missing geography or metadata through the pipeline and
/// save the ones that changed. Returns the number updated.
pub async fn reprocess_stories(db: &Database, pipeline: &Pipeline) -> anyhow::Result<usize> {
    let stories = db.all_stories()?;
    let changed = pipeline.reprocess(&stories).await;
    let mut updated = 0;
    for story in &changed {
        if db.update_story(story)? {
            updated += 1;
        }
    }
    info!("Reprocessed {} stories, {} updated", stories.len(), updated);
    Ok(updated)
}
