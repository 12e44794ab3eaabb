// Sitemap import: collect article URLs from the site's sitemaps and run the
// ones the store has not seen through the pipeline.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use storymap_core::config::SitemapConfig;
use storymap_core::db::Database;
use tracing::{info, warn};

use crate::fetch::PageFetcher;
use crate::pipeline::Pipeline;
use crate::sheet::StoryRow;

/// `app_state` key holding the most recent `ImportReport`.
pub const LAST_IMPORT_KEY: &str = "last_sitemap_import";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub total_urls: usize,
    pub existing_count: usize,
    pub new_url_count: usize,
    pub processed_count: usize,
    pub new_count: usize,
    pub duplicate_count: usize,
    pub failed_batches: usize,
    pub total_stories: usize,
}

// ---------------------------------------------------------------------------
// XML
// ---------------------------------------------------------------------------

/// Every `<loc>` value in a sitemap or sitemap index, in document order.
pub fn extract_locs(xml: &str) -> Vec<String> {
    static LOC: OnceLock<Regex> = OnceLock::new();
    let loc = LOC.get_or_init(|| {
        Regex::new(r"(?s)<loc>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</loc>")
            .expect("valid regex")
    });
    loc.captures_iter(xml)
        .map(|c| unescape_xml(c[1].trim()))
        .filter(|u| !u.is_empty())
        .collect()
}

pub fn is_sitemap_index(xml: &str) -> bool {
    xml.contains("<sitemapindex")
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Fetch each sitemap and gather article URLs, first occurrence wins.
/// Index documents are expanded one level. A sitemap that fails to load is
/// logged and skipped.
pub async fn collect_urls(
    fetcher: &dyn PageFetcher,
    sitemaps: &[String],
    polite_delay: Duration,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for (i, sitemap) in sitemaps.iter().enumerate() {
        if i > 0 && !polite_delay.is_zero() {
            tokio::time::sleep(polite_delay).await;
        }
        let Some(xml) = fetch_sitemap(fetcher, sitemap).await else {
            continue;
        };

        let locs = if is_sitemap_index(&xml) {
            let mut nested = Vec::new();
            for child in extract_locs(&xml) {
                if !polite_delay.is_zero() {
                    tokio::time::sleep(polite_delay).await;
                }
                if let Some(child_xml) = fetch_sitemap(fetcher, &child).await {
                    nested.extend(extract_locs(&child_xml));
                }
            }
            nested
        } else {
            extract_locs(&xml)
        };

        info!(sitemap = %sitemap, urls = locs.len(), "sitemap loaded");
        for url in locs {
            if seen.insert(url.clone()) {
                urls.push(url);
            }
        }
    }
    urls
}

async fn fetch_sitemap(fetcher: &dyn PageFetcher, url: &str) -> Option<String> {
    match fetcher.fetch(url).await {
        Ok(xml) => Some(xml),
        Err(e) => {
            warn!(fetcher = fetcher.name(), "skipping sitemap {}: {}", url, e);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Importer
// ---------------------------------------------------------------------------

pub struct SitemapImporter {
    pipeline: Arc<Pipeline>,
    fetcher: Arc<dyn PageFetcher>,
    config: SitemapConfig,
}

impl SitemapImporter {
    /// `fetcher` loads the sitemaps themselves and should not be cached, so
    /// each import sees newly published articles.
    pub fn new(pipeline: Arc<Pipeline>, fetcher: Arc<dyn PageFetcher>, config: SitemapConfig) -> Self {
        Self {
            pipeline,
            fetcher,
            config,
        }
    }

    pub async fn run(&self, db: &Database, limit: Option<usize>) -> anyhow::Result<ImportReport> {
        let all_urls = collect_urls(
            self.fetcher.as_ref(),
            &self.config.urls,
            Duration::from_millis(self.config.polite_delay_ms),
        )
        .await;

        let existing = db.existing_urls().context("failed to read existing story URLs")?;
        let mut new_urls: Vec<String> = all_urls
            .iter()
            .filter(|u| !existing.contains(u.as_str()))
            .cloned()
            .collect();

        let mut report = ImportReport {
            total_urls: all_urls.len(),
            existing_count: all_urls.len() - new_urls.len(),
            new_url_count: new_urls.len(),
            ..Default::default()
        };
        if let Some(limit) = limit {
            new_urls.truncate(limit);
        }
        info!(
            total = report.total_urls,
            existing = report.existing_count,
            to_process = new_urls.len(),
            "sitemap import starting"
        );

        let batch_size = self.config.batch_size.max(1);
        let batch_count = new_urls.len().div_ceil(batch_size);
        for (i, batch) in new_urls.chunks(batch_size).enumerate() {
            if i > 0 && self.config.batch_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
            info!(batch = i + 1, of = batch_count, urls = batch.len(), "processing batch");

            let rows = batch.iter().map(StoryRow::new).collect();
            let output = self.pipeline.run(rows).await;
            report.processed_count += output.stories.len();

            match db.insert_new(&output.stories) {
                Ok(merged) => {
                    report.new_count += merged.new_count;
                    report.duplicate_count += merged.duplicate_count;
                }
                Err(e) => {
                    warn!("batch {} failed to merge: {:#}", i + 1, e);
                    report.failed_batches += 1;
                }
            }
        }

        report.total_stories = db.story_count().context("failed to count stories")?;
        let state = serde_json::json!({
            "finished_at": chrono::Utc::now().to_rfc3339(),
            "report": &report,
        });
        if let Err(e) = db.save_state(LAST_IMPORT_KEY, &state) {
            warn!("failed to record sitemap import: {:#}", e);
        }

        info!(
            new = report.new_count,
            duplicates = report.duplicate_count,
            failed_batches = report.failed_batches,
            "sitemap import finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_page_locs_only() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://www.publicsource.org/a/</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc>
    https://www.publicsource.org/b/?x=1&amp;y=2
  </loc></url>
  <url><loc><![CDATA[https://www.publicsource.org/c/]]></loc></url>
  <url><image:loc>https://www.publicsource.org/img.jpg</image:loc></url>
  <url><loc></loc></url>
</urlset>"#;
        assert_eq!(
            extract_locs(xml),
            vec![
                "https://www.publicsource.org/a/",
                "https://www.publicsource.org/b/?x=1&y=2",
                "https://www.publicsource.org/c/",
            ]
        );
        assert!(!is_sitemap_index(xml));
    }

    #[test]
    fn detects_sitemap_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <sitemap><loc>https://x.org/sitemap-1.xml</loc></sitemap>
        </sitemapindex>"#;
        assert!(is_sitemap_index(xml));
        assert_eq!(extract_locs(xml), vec!["https://x.org/sitemap-1.xml"]);
    }

    #[test]
    fn report_serializes_flat() {
        let report = ImportReport {
            total_urls: 3,
            new_count: 1,
            ..Default::default()
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["total_urls"], 3);
        assert_eq!(value["new_count"], 1);
        assert_eq!(value["failed_batches"], 0);
    }
}
