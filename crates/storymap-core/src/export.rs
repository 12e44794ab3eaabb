// Review export: the catalogue as a set of CSV tables for newsroom review
// in a spreadsheet. One file per table, written into a directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::analytics::{missing_geography, neighborhood_ranking, Summary, TagCount};
use crate::story::Story;

/// How many neighborhoods the review export ranks.
pub const REVIEW_NEIGHBORHOODS: usize = 100;

pub const ALL_STORIES: &str = "all_stories.csv";
pub const SUMMARY: &str = "summary.csv";
pub const UMBRELLAS: &str = "umbrellas.csv";
pub const GEOGRAPHIC_AREAS: &str = "geographic_areas.csv";
pub const TOP_NEIGHBORHOODS: &str = "top_neighborhoods.csv";
pub const YEARLY_BREAKDOWN: &str = "yearly_breakdown.csv";
pub const MISSING_GEOGRAPHY: &str = "missing_geography.csv";

#[derive(Serialize)]
struct StoryRecord<'a> {
    id: i64,
    title: &'a str,
    author: &'a str,
    date: &'a str,
    url: &'a str,
    umbrella: &'a str,
    geographic_area: &'a str,
    neighborhoods: String,
    social_abstract: &'a str,
}

impl<'a> From<&'a Story> for StoryRecord<'a> {
    fn from(story: &'a Story) -> Self {
        StoryRecord {
            id: story.id,
            title: &story.title,
            author: &story.author,
            date: &story.date,
            url: &story.url,
            umbrella: &story.umbrella,
            geographic_area: &story.geographic_area,
            neighborhoods: story.neighborhood_tags().join(", "),
            social_abstract: &story.social_abstract,
        }
    }
}

/// Write every review table into `dir` (created if missing). Returns the
/// files written, in table order.
pub fn write_review_tables(stories: &[Story], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let summary = Summary::compute(stories);
    let mut written = Vec::new();

    let mut out = table(dir, ALL_STORIES, &mut written)?;
    write_stories(&mut out, stories.iter())?;
    finish(out)?;

    let mut out = table(dir, SUMMARY, &mut written)?;
    out.write_record(["Metric", "Value"])?;
    for (metric, value) in summary_rows(&summary) {
        out.write_record([metric, value.as_str()])?;
    }
    finish(out)?;

    let mut out = table(dir, UMBRELLAS, &mut written)?;
    write_counts(&mut out, "Umbrella Category", &by_name(&summary.by_umbrella))?;
    finish(out)?;

    let mut out = table(dir, GEOGRAPHIC_AREAS, &mut written)?;
    write_counts(&mut out, "Geographic Area", &by_name(&summary.by_geographic_area))?;
    finish(out)?;

    let mut out = table(dir, TOP_NEIGHBORHOODS, &mut written)?;
    write_counts(
        &mut out,
        "Neighborhood",
        &neighborhood_ranking(stories, REVIEW_NEIGHBORHOODS),
    )?;
    finish(out)?;

    let mut out = table(dir, YEARLY_BREAKDOWN, &mut written)?;
    out.write_record(["Year", "Total Stories", "Unique Umbrellas", "Stories with Neighborhoods"])?;
    for year in &summary.by_year {
        out.write_record([
            year.year.to_string(),
            year.total_stories.to_string(),
            year.unique_umbrellas.to_string(),
            year.stories_with_neighborhoods.to_string(),
        ])?;
    }
    finish(out)?;

    let mut out = table(dir, MISSING_GEOGRAPHY, &mut written)?;
    write_stories(&mut out, missing_geography(stories).into_iter())?;
    finish(out)?;

    Ok(written)
}

fn table(dir: &Path, name: &str, written: &mut Vec<PathBuf>) -> Result<csv::Writer<std::fs::File>> {
    let path = dir.join(name);
    let writer =
        csv::Writer::from_path(&path).with_context(|| format!("failed to create {}", path.display()))?;
    written.push(path);
    Ok(writer)
}

fn finish(mut out: csv::Writer<std::fs::File>) -> Result<()> {
    out.flush().context("failed to flush export table")
}

fn write_stories<'a, W: std::io::Write>(
    out: &mut csv::Writer<W>,
    stories: impl Iterator<Item = &'a Story>,
) -> Result<()> {
    let mut any = false;
    for story in stories {
        out.serialize(StoryRecord::from(story))?;
        any = true;
    }
    if !any {
        // serde writes headers with the first record; keep empty tables readable.
        out.write_record([
            "id",
            "title",
            "author",
            "date",
            "url",
            "umbrella",
            "geographic_area",
            "neighborhoods",
            "social_abstract",
        ])?;
    }
    Ok(())
}

fn write_counts<W: std::io::Write>(out: &mut csv::Writer<W>, label: &str, counts: &[TagCount]) -> Result<()> {
    out.write_record([label, "Story Count"])?;
    for tag in counts {
        out.write_record([tag.name.clone(), tag.count.to_string()])?;
    }
    Ok(())
}

fn by_name(counts: &[TagCount]) -> Vec<TagCount> {
    let mut sorted = counts.to_vec();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
}

fn summary_rows(summary: &Summary) -> Vec<(&'static str, String)> {
    let date_range = summary
        .date_range
        .as_ref()
        .map(|r| format!("{} to {}", r.earliest, r.latest))
        .unwrap_or_else(|| "N/A".to_string());
    vec![
        ("Total Stories", summary.total_stories.to_string()),
        ("Unique Umbrellas", summary.unique_umbrellas.to_string()),
        ("Unique Geographic Areas", summary.unique_geographic_areas.to_string()),
        ("Unique Neighborhoods", summary.unique_neighborhoods.to_string()),
        ("Date Range", date_range),
        ("Stories with Social Abstract", summary.stories_with_abstract.to_string()),
        ("Average Abstract Length", summary.average_abstract_length.to_string()),
        ("Undated Stories", summary.undated_stories.to_string()),
        ("Missing Geographic Data", summary.missing_geography.to_string()),
    ]
}
