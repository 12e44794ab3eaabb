// Catalogue summary statistics for the analytics endpoint and export report.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::dates::parse_story_date;
use crate::story::Story;

/// How many neighborhoods the summary lists.
pub const TOP_NEIGHBORHOODS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

/// Stories published in one calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    pub year: i32,
    pub total_stories: usize,
    pub unique_umbrellas: usize,
    pub stories_with_neighborhoods: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_stories: usize,
    pub unique_umbrellas: usize,
    pub unique_geographic_areas: usize,
    pub unique_neighborhoods: usize,
    pub date_range: Option<DateRange>,
    pub undated_stories: usize,
    pub stories_with_abstract: usize,
    pub average_abstract_length: usize,
    pub unclassified_stories: usize,
    /// Stories missing any of umbrella, geographic area, or neighborhoods.
    pub missing_geography: usize,
    pub by_umbrella: Vec<TagCount>,
    pub by_geographic_area: Vec<TagCount>,
    pub top_neighborhoods: Vec<TagCount>,
    /// Dated stories per year, oldest first.
    pub by_year: Vec<YearCount>,
}

impl Summary {
    pub fn compute(stories: &[Story]) -> Self {
        let mut umbrellas = TagCounter::default();
        let mut areas = TagCounter::default();
        let mut neighborhoods = TagCounter::default();

        let mut earliest: Option<NaiveDate> = None;
        let mut latest: Option<NaiveDate> = None;
        let mut undated = 0;
        let mut with_abstract = 0;
        let mut abstract_chars = 0;
        let mut unclassified = 0;
        let mut missing = 0;
        let mut years: BTreeMap<i32, (usize, BTreeSet<String>, usize)> = BTreeMap::new();

        for story in stories {
            umbrellas.add(story.umbrella_tags());
            areas.add(story.area_tags());
            neighborhoods.add(story.neighborhood_tags());

            match parse_story_date(&story.date) {
                Some(date) => {
                    earliest = Some(earliest.map_or(date, |e| e.min(date)));
                    latest = Some(latest.map_or(date, |l| l.max(date)));
                    let year = years.entry(date.year()).or_default();
                    year.0 += 1;
                    year.1.extend(story.umbrella_tags());
                    if !story.neighborhoods.is_empty() {
                        year.2 += 1;
                    }
                }
                None => undated += 1,
            }

            let abstract_text = story.social_abstract.trim();
            if !abstract_text.is_empty() {
                with_abstract += 1;
                abstract_chars += abstract_text.chars().count();
            }

            if story.is_unclassified() {
                unclassified += 1;
            }
            if lacks_geography(story) {
                missing += 1;
            }
        }

        let date_range = earliest.zip(latest).map(|(earliest, latest)| DateRange { earliest, latest });

        Summary {
            total_stories: stories.len(),
            unique_umbrellas: umbrellas.distinct(),
            unique_geographic_areas: areas.distinct(),
            unique_neighborhoods: neighborhoods.distinct(),
            date_range,
            undated_stories: undated,
            stories_with_abstract: with_abstract,
            average_abstract_length: if with_abstract == 0 { 0 } else { abstract_chars / with_abstract },
            unclassified_stories: unclassified,
            missing_geography: missing,
            by_umbrella: umbrellas.ranked(usize::MAX),
            by_geographic_area: areas.ranked(usize::MAX),
            top_neighborhoods: neighborhoods.ranked(TOP_NEIGHBORHOODS),
            by_year: years
                .into_iter()
                .map(|(year, (total, umbrellas, with_neighborhoods))| YearCount {
                    year,
                    total_stories: total,
                    unique_umbrellas: umbrellas.len(),
                    stories_with_neighborhoods: with_neighborhoods,
                })
                .collect(),
        }
    }
}

/// True when any of umbrella, geographic area, or neighborhoods is blank.
pub fn lacks_geography(story: &Story) -> bool {
    story.umbrella.trim().is_empty()
        || story.geographic_area.trim().is_empty()
        || story.neighborhoods.is_empty()
}

/// Stories that need a geography review, in input order.
pub fn missing_geography(stories: &[Story]) -> Vec<&Story> {
    stories.iter().filter(|s| lacks_geography(s)).collect()
}

/// Neighborhoods by story count (count desc, name asc), at most `limit`.
pub fn neighborhood_ranking(stories: &[Story], limit: usize) -> Vec<TagCount> {
    let mut counter = TagCounter::default();
    for story in stories {
        counter.add(story.neighborhood_tags());
    }
    counter.ranked(limit)
}

/// Counts stories per tag. A story carrying the same tag twice counts once.
#[derive(Default)]
struct TagCounter {
    counts: HashMap<String, usize>,
}

impl TagCounter {
    fn add(&mut self, tags: Vec<String>) {
        let unique: BTreeSet<String> = tags.into_iter().collect();
        for tag in unique {
            *self.counts.entry(tag).or_default() += 1;
        }
    }

    fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Count descending, then name ascending.
    fn ranked(&self, limit: usize) -> Vec<TagCount> {
        let mut out: Vec<TagCount> = self
            .counts
            .iter()
            .map(|(name, &count)| TagCount { name: name.clone(), count })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        out.truncate(limit);
        out
    }
}
