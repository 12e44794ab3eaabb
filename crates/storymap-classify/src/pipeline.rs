// Story classification pipeline: rows in, classified stories out.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use storymap_core::config::Config;
use storymap_core::{split_tags, NewStory, Story};
use tracing::{debug, info, warn};

use crate::article::{extract_article, Article};
use crate::assign::assign_geography;
use crate::classifier::Classifier;
use crate::fetch::{CachedFetcher, HttpFetcher, PageFetcher};
use crate::gazetteer::Gazetteer;
use crate::normalize::is_blank;
use crate::sheet::StoryRow;
use crate::teaser::TeaserWriter;

/// Place scores for one processed story.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryScores {
    pub url: String,
    pub scores: BTreeMap<String, f64>,
}

/// Classification confidence across one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfidenceReport {
    pub story_scores: Vec<StoryScores>,
    pub total_stories: usize,
    pub stories_with_places: usize,
    /// Mean of every candidate place score in the run, accepted or not.
    pub average_confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub stories: Vec<NewStory>,
    pub report: ConfidenceReport,
}

struct Processed {
    story: NewStory,
    scores: BTreeMap<String, f64>,
    has_places: bool,
}

pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    classifier: Arc<Classifier>,
    teaser: Arc<TeaserWriter>,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        classifier: Arc<Classifier>,
        teaser: Arc<TeaserWriter>,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            classifier,
            teaser,
            concurrency: concurrency.max(1),
        }
    }

    /// Gazetteer from `data_paths.geography`, HTTP fetcher behind the page
    /// cache, and the teaser writer when enabled.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings = &config.classification;
        let gazetteer = Gazetteer::load(&config.resolve(&config.data_paths.geography))
            .context("failed to load geographic data")?;
        let http = HttpFetcher::new(
            Duration::from_secs(settings.fetch_timeout_secs),
            &settings.user_agent,
        )
        .context("failed to build page fetcher")?;
        let fetcher = CachedFetcher::new(http, config.cache_dir());
        let classifier = Classifier::new(gazetteer, settings.min_confidence, settings.fuzzy_threshold);
        let teaser = TeaserWriter::from_config(config);
        info!(
            fetcher = fetcher.name(),
            cache = %config.cache_dir().display(),
            teasers = teaser.is_enabled(),
            "classification pipeline ready"
        );

        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(classifier),
            Arc::new(teaser),
            settings.fetch_concurrency,
        ))
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn fetcher_name(&self) -> &str {
        self.fetcher.name()
    }

    /// Process rows in input order. Rows repeating an earlier URL are
    /// dropped before any fetching.
    pub async fn run(&self, rows: Vec<StoryRow>) -> PipelineOutput {
        let mut seen = HashSet::new();
        let rows: Vec<StoryRow> = rows
            .into_iter()
            .filter_map(|mut row| {
                row.url = row.url.trim().to_string();
                (!row.url.is_empty() && seen.insert(row.url.clone())).then_some(row)
            })
            .collect();
        let total = rows.len();
        info!(
            rows = total,
            concurrency = self.concurrency,
            fetcher = self.fetcher.name(),
            "pipeline run starting"
        );

        let processed: Vec<Processed> = stream::iter(rows)
            .map(|row| self.process(row))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = ConfidenceReport {
            total_stories: total,
            ..Default::default()
        };
        let mut score_sum = 0.0;
        let mut score_count = 0usize;
        let mut stories = Vec::with_capacity(processed.len());
        for p in processed {
            if p.has_places {
                report.stories_with_places += 1;
            }
            score_sum += p.scores.values().sum::<f64>();
            score_count += p.scores.len();
            report.story_scores.push(StoryScores {
                url: p.story.url.clone(),
                scores: p.scores,
            });
            stories.push(p.story);
        }
        if score_count > 0 {
            report.average_confidence = score_sum / score_count as f64;
        }

        info!(
            stories = stories.len(),
            with_places = report.stories_with_places,
            "pipeline run finished"
        );
        PipelineOutput { stories, report }
    }

    /// Re-run stored stories that lack geography or metadata. Returns only
    /// the stories that changed, ids preserved.
    pub async fn reprocess(&self, stories: &[Story]) -> Vec<Story> {
        let candidates: Vec<&Story> = stories
            .iter()
            .filter(|s| s.is_unclassified() || s.title.trim().is_empty() || s.date.trim().is_empty())
            .collect();
        info!(candidates = candidates.len(), "reprocessing stories");

        let processed: Vec<(&Story, Processed)> = stream::iter(candidates)
            .map(|story| async move { (story, self.process(StoryRow::from_story(story)).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        processed
            .into_iter()
            .filter_map(|(original, p)| {
                let updated = merge_into(original, p.story);
                (updated != *original).then_some(updated)
            })
            .collect()
    }

    async fn process(&self, mut row: StoryRow) -> Processed {
        let needs_geography = is_blank(row.neighborhoods.as_deref());
        let needs_metadata = row.title.is_none() || row.author.is_none() || row.date.is_none();
        let needs_teaser = row.social_abstract.is_none() && self.teaser.is_enabled();

        let article = if needs_geography || needs_metadata || needs_teaser {
            self.fetch_article(&row.url).await
        } else {
            debug!(url = %row.url, "row complete, skipping fetch");
            None
        };

        let mut scores = BTreeMap::new();
        let mut places = Vec::new();

        if let Some(article) = &article {
            if needs_geography && !article.text.is_empty() {
                let classification = self.classifier.classify(&article.text);
                places = classification.places;
                scores = classification.scores;
            }
            fill_blank(&mut row.title, &article.title);
            fill_blank(&mut row.author, &article.author);
            fill_blank(&mut row.date, &article.date);
        }

        assign_geography(&mut row, &places, self.classifier.gazetteer());
        let has_places = !places.is_empty();

        if row.social_abstract.is_none() {
            if let Some(text) = article.as_ref().map(|a| a.text.as_str()) {
                row.social_abstract = self.teaser.generate(text).await;
            }
        }

        Processed {
            story: row_into_story(row),
            has_places,
            scores,
        }
    }

    async fn fetch_article(&self, url: &str) -> Option<Article> {
        match self.fetcher.fetch(url).await {
            Ok(html) => {
                let article = extract_article(&html);
                if article.text.is_empty() {
                    warn!(url, "no article text found");
                }
                Some(article)
            }
            Err(e) => {
                warn!(fetcher = self.fetcher.name(), "fetch failed for {}: {}", url, e);
                None
            }
        }
    }
}

fn fill_blank(field: &mut Option<String>, found: &Option<String>) {
    if field.is_none() {
        field.clone_from(found);
    }
}

fn row_into_story(row: StoryRow) -> NewStory {
    NewStory {
        neighborhoods: row.neighborhoods.as_deref().map(split_tags).unwrap_or_default(),
        url: row.url,
        title: row.title.unwrap_or_default(),
        author: row.author.unwrap_or_default(),
        date: row.date.unwrap_or_default(),
        social_abstract: row.social_abstract.unwrap_or_default(),
        umbrella: row.umbrella.unwrap_or_default(),
        geographic_area: row.geographic_area.unwrap_or_default(),
    }
}

/// Apply reprocessed values onto a stored story. Only empty fields are
/// filled; neighborhoods are replaced when the story had none.
fn merge_into(original: &Story, fresh: NewStory) -> Story {
    let mut story = original.clone();
    let fill = |old: &mut String, new: String| {
        if old.trim().is_empty() && !new.is_empty() {
            *old = new;
        }
    };
    fill(&mut story.title, fresh.title);
    fill(&mut story.author, fresh.author);
    fill(&mut story.date, fresh.date);
    fill(&mut story.social_abstract, fresh.social_abstract);
    fill(&mut story.umbrella, fresh.umbrella);
    fill(&mut story.geographic_area, fresh.geographic_area);
    if story.neighborhoods.is_empty() && !fresh.neighborhoods.is_empty() {
        story.neighborhoods = storymap_core::Neighborhoods::List(fresh.neighborhoods);
    }
    story
}
