// Dashboard filtering: the facet/search/date predicate and the option lists
// that populate the filter dropdowns.

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::parse_story_date;
use crate::story::Story;

/// Value the dashboard sends for an unconstrained dropdown.
const ALL: &str = "all";

/// A dashboard query. Every field is optional; an absent, empty, or `All`
/// facet places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryQuery {
    #[serde(default)]
    pub umbrella: Option<String>,
    #[serde(default)]
    pub geographic_area: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    /// Free-text search over title, abstract, and author.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl StoryQuery {
    pub fn matches(&self, story: &Story) -> bool {
        facet_matches(self.umbrella.as_deref(), &story.umbrella_tags())
            && facet_matches(self.geographic_area.as_deref(), &story.area_tags())
            && facet_matches(self.neighborhood.as_deref(), &story.neighborhood_tags())
            && self.search_matches(story)
            && self.date_matches(story)
    }

    /// Stories matching this query, in input order.
    pub fn apply<'a>(&self, stories: &'a [Story]) -> Vec<&'a Story> {
        stories.iter().filter(|s| self.matches(s)).collect()
    }

    fn search_matches(&self, story: &Story) -> bool {
        let Some(needle) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
            return true;
        };
        let needle = needle.to_lowercase();
        [&story.title, &story.social_abstract, &story.author]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    fn date_matches(&self, story: &Story) -> bool {
        if self.from.is_none() && self.to.is_none() {
            return true;
        }
        let Some(date) = parse_story_date(&story.date) else {
            return false;
        };
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

fn facet_matches(selected: Option<&str>, tags: &[String]) -> bool {
    let Some(selected) = selected.map(str::trim) else {
        return true;
    };
    if selected.is_empty() || selected.eq_ignore_ascii_case(ALL) {
        return true;
    }
    tags.iter().any(|tag| tag.eq_ignore_ascii_case(selected))
}

/// Distinct, sorted values for each filter dropdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub umbrellas: Vec<String>,
    pub geographic_areas: Vec<String>,
    pub neighborhoods: Vec<String>,
}

impl FilterOptions {
    pub fn from_stories(stories: &[Story]) -> Self {
        let mut umbrellas = BTreeSet::new();
        let mut areas = BTreeSet::new();
        let mut neighborhoods = BTreeSet::new();

        for story in stories {
            umbrellas.extend(story.umbrella_tags());
            areas.extend(story.area_tags());
            neighborhoods.extend(story.neighborhood_tags());
        }

        FilterOptions {
            umbrellas: umbrellas.into_iter().collect(),
            geographic_areas: areas.into_iter().collect(),
            neighborhoods: neighborhoods.into_iter().collect(),
        }
    }
}

/// Sort stories by publication date, newest first. Stories whose date does
/// not parse go last; ties fall back to descending id.
pub fn sort_newest_first(stories: &mut [Story]) {
    // `Reverse(None)` orders after every `Reverse(Some(_))`.
    stories.sort_by_cached_key(|s| (Reverse(parse_story_date(&s.date)), Reverse(s.id)));
}

/// The same ordering as a comparator, for sorting borrowed slices.
pub fn newest_first(a: &Story, b: &Story) -> Ordering {
    match (parse_story_date(&a.date), parse_story_date(&b.date)) {
        (Some(x), Some(y)) => y.cmp(&x).then(b.id.cmp(&a.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.id.cmp(&a.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::Neighborhoods;

    fn story(id: i64, umbrella: &str, area: &str, neighborhoods: &str, date: &str) -> Story {
        Story {
            id,
            url: format!("https://example.org/{id}"),
            title: format!("Story {id}"),
            author: "Staff Writer".into(),
            date: date.into(),
            social_abstract: String::new(),
            umbrella: umbrella.into(),
            geographic_area: area.into(),
            neighborhoods: Neighborhoods::Text(neighborhoods.into()),
        }
    }

    fn sample() -> Vec<Story> {
        vec![
            story(1, "Pittsburgh, Allegheny County", "East End", "Oakland, Shadyside", "2023-05-01"),
            story(2, "Allegheny County", "Mon Valley", "McKeesport", "2023-06-15"),
            story(3, "Pittsburgh", "South", "Knoxville", "not a date"),
        ]
    }

    fn ids(stories: &[&Story]) -> Vec<i64> {
        stories.iter().map(|s| s.id).collect()
    }

    #[test]
    fn empty_query_matches_everything() {
        let stories = sample();
        assert_eq!(ids(&StoryQuery::default().apply(&stories)), vec![1, 2, 3]);
    }

    #[test]
    fn facet_filters_narrow_the_list() {
        let stories = sample();

        let q = StoryQuery { umbrella: Some("Allegheny County".into()), ..Default::default() };
        assert_eq!(ids(&q.apply(&stories)), vec![1, 2]);

        let q = StoryQuery { neighborhood: Some("shadyside".into()), ..Default::default() };
        assert_eq!(ids(&q.apply(&stories)), vec![1]);

        let q = StoryQuery {
            umbrella: Some("Pittsburgh".into()),
            geographic_area: Some("South".into()),
            ..Default::default()
        };
        assert_eq!(ids(&q.apply(&stories)), vec![3]);
    }

    #[test]
    fn all_and_blank_are_no_ops() {
        let stories = sample();
        let q = StoryQuery {
            umbrella: Some("All".into()),
            neighborhood: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(q.apply(&stories).len(), 3);
    }

    #[test]
    fn tag_match_is_exact_not_substring() {
        let stories = sample();
        let q = StoryQuery { neighborhood: Some("Oak".into()), ..Default::default() };
        assert!(q.apply(&stories).is_empty());
    }

    #[test]
    fn search_is_case_insensitive() {
        let stories = sample();
        let q = StoryQuery { q: Some("story 2".into()), ..Default::default() };
        assert_eq!(ids(&q.apply(&stories)), vec![2]);

        let q = StoryQuery { q: Some("STAFF".into()), ..Default::default() };
        assert_eq!(q.apply(&stories).len(), 3);
    }

    #[test]
    fn date_bounds_are_inclusive_and_skip_undated() {
        let stories = sample();
        let q = StoryQuery {
            from: NaiveDate::from_ymd_opt(2023, 5, 1),
            to: NaiveDate::from_ymd_opt(2023, 6, 1),
            ..Default::default()
        };
        assert_eq!(ids(&q.apply(&stories)), vec![1]);

        let q = StoryQuery { from: NaiveDate::from_ymd_opt(2020, 1, 1), ..Default::default() };
        assert_eq!(ids(&q.apply(&stories)), vec![1, 2]);
    }

    #[test]
    fn filter_options_are_sorted_and_unique() {
        let mut stories = sample();
        stories.push(story(4, "Pittsburgh", "East End", "Oakland", ""));
        let opts = FilterOptions::from_stories(&stories);
        assert_eq!(opts.umbrellas, vec!["Allegheny County", "Pittsburgh"]);
        assert_eq!(opts.geographic_areas, vec!["East End", "Mon Valley", "South"]);
        assert_eq!(
            opts.neighborhoods,
            vec!["Knoxville", "McKeesport", "Oakland", "Shadyside"]
        );
    }

    #[test]
    fn newest_first_puts_undated_last() {
        let mut stories = sample();
        stories.push(story(4, "", "", "", "2023-06-15"));
        stories.push(story(5, "", "", "", ""));
        sort_newest_first(&mut stories);
        let order: Vec<i64> = stories.iter().map(|s| s.id).collect();
        assert_eq!(order, vec![4, 2, 1, 5, 3]);

        let mut again = sample();
        again.push(story(4, "", "", "", "2023-06-15"));
        again.push(story(5, "", "", "", ""));
        again.sort_by(newest_first);
        let order: Vec<i64> = again.iter().map(|s| s.id).collect();
        assert_eq!(order, vec![4, 2, 1, 5, 3]);
    }
}
