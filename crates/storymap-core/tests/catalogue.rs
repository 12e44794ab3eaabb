// End-to-end checks over the bundled story snapshot: load, store, query,
// summarize, and export again.

use std::path::PathBuf;

use chrono::NaiveDate;
use storymap_core::analytics::Summary;
use storymap_core::db::Database;
use storymap_core::filter::{sort_newest_first, FilterOptions, StoryQuery};
use storymap_core::snapshot::Snapshot;
use storymap_core::{NewStory, Story};

fn bundled_snapshot() -> Snapshot {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/stories.json");
    Snapshot::load(&path).unwrap()
}

fn store() -> Database {
    let db = Database::open(":memory:").unwrap();
    let merged = db.import_snapshot(&bundled_snapshot().stories).unwrap();
    assert_eq!(merged.new_count, 5);
    db
}

fn ids(stories: &[&Story]) -> Vec<i64> {
    stories.iter().map(|s| s.id).collect()
}

#[test]
fn bundled_filters_match_stories() {
    let snapshot = bundled_snapshot();
    assert_eq!(snapshot.filters, FilterOptions::from_stories(&snapshot.stories));
    assert_eq!(snapshot.filters.umbrellas, vec!["Allegheny County", "Pittsburgh"]);
}

#[test]
fn store_round_trips_both_neighborhood_shapes() {
    let db = store();
    let braddock = db
        .story_by_url("https://www.publicsource.org/braddock-council-budget/")
        .unwrap()
        .unwrap();
    assert_eq!(braddock.id, 2);
    assert_eq!(braddock.neighborhood_tags(), vec!["Braddock"]);

    let transit = db
        .story_by_url("https://www.publicsource.org/transit-cuts-riders/")
        .unwrap()
        .unwrap();
    assert_eq!(transit.neighborhood_tags(), vec!["Carrick", "McKeesport"]);
    assert_eq!(transit.umbrella_tags(), vec!["Pittsburgh", "Allegheny County"]);
}

#[test]
fn new_stories_get_fresh_ids_and_duplicates_are_skipped() {
    let db = store();
    let merged = db
        .insert_new(&[
            NewStory {
                url: "https://www.publicsource.org/new-bridge/".into(),
                title: "A new bridge for Sharpsburg".into(),
                umbrella: "Allegheny County".into(),
                neighborhoods: vec!["Sharpsburg".into()],
                ..Default::default()
            },
            NewStory {
                url: "https://www.publicsource.org/hill-district-grocery/".into(),
                ..Default::default()
            },
        ])
        .unwrap();
    assert_eq!(merged.new_count, 1);
    assert_eq!(merged.duplicate_count, 1);
    assert_eq!(db.story_count().unwrap(), 6);

    let bridge = db
        .story_by_url("https://www.publicsource.org/new-bridge/")
        .unwrap()
        .unwrap();
    assert!(bridge.id > 5);
}

#[test]
fn dashboard_queries_over_the_store() {
    let stories = store().all_stories().unwrap();

    let county = StoryQuery {
        umbrella: Some("Allegheny County".into()),
        ..Default::default()
    };
    assert_eq!(ids(&county.apply(&stories)), vec![2, 4]);

    let spring = StoryQuery {
        from: NaiveDate::from_ymd_opt(2024, 3, 1),
        to: NaiveDate::from_ymd_opt(2024, 4, 30),
        ..Default::default()
    };
    assert_eq!(ids(&spring.apply(&stories)), vec![2, 3]);

    let search = StoryQuery {
        q: Some("GROCERY".into()),
        neighborhood: Some("All".into()),
        ..Default::default()
    };
    assert_eq!(ids(&search.apply(&stories)), vec![3]);

    let mut sorted = stories.clone();
    sort_newest_first(&mut sorted);
    let order: Vec<i64> = sorted.iter().map(|s| s.id).collect();
    assert_eq!(order, vec![1, 2, 3, 4, 5]);
}

#[test]
fn summary_over_bundled_data() {
    let summary = Summary::compute(&store().all_stories().unwrap());
    assert_eq!(summary.total_stories, 5);
    assert_eq!(summary.unique_umbrellas, 2);
    assert_eq!(summary.undated_stories, 1);
    assert_eq!(summary.unclassified_stories, 1);
    assert_eq!(summary.stories_with_abstract, 3);
    let range = summary.date_range.unwrap();
    assert_eq!(range.earliest, NaiveDate::from_ymd_opt(2024, 2, 27).unwrap());
    assert_eq!(range.latest, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
    assert_eq!(summary.by_umbrella[0].name, "Pittsburgh");
    assert_eq!(summary.by_umbrella[0].count, 3);
}

#[test]
fn export_matches_import() {
    let db = store();
    let dir = std::env::temp_dir().join("storymap_catalogue_export");
    let _ = std::fs::remove_dir_all(&dir);
    let path = dir.join("stories.json");

    Snapshot::from_stories(db.all_stories().unwrap()).save(&path).unwrap();
    let reloaded = Snapshot::load(&path).unwrap();
    assert_eq!(reloaded, bundled_snapshot());

    let _ = std::fs::remove_dir_all(&dir);
}
