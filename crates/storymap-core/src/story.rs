// Story record and multi-valued tag handling.

use serde::{Deserialize, Deserializer, Serialize};

/// Characters that separate multiple values inside one tag field
/// (e.g. `"Pittsburgh, Allegheny County"` or `"Oakland / Shadyside"`).
pub const TAG_DELIMITERS: [char; 4] = [',', ';', '/', '|'];

/// Split a delimiter-separated tag field into trimmed, non-empty tags.
///
/// Text without any delimiter yields itself (trimmed) as a single tag.
pub fn split_tags(text: &str) -> Vec<String> {
    text.split(&TAG_DELIMITERS[..])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Neighborhoods
// ---------------------------------------------------------------------------

/// The `neighborhoods` field arrives either as one delimited string (older
/// exports, spreadsheet imports) or as an array (pipeline output). Both
/// shapes round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Neighborhoods {
    List(Vec<String>),
    Text(String),
}

impl Default for Neighborhoods {
    fn default() -> Self {
        Neighborhoods::List(Vec::new())
    }
}

impl Neighborhoods {
    /// Every neighborhood tag. Array elements are split again, since some
    /// exports stored `["Oakland, Shadyside"]`.
    pub fn tags(&self) -> Vec<String> {
        match self {
            Neighborhoods::List(items) => items.iter().flat_map(|item| split_tags(item)).collect(),
            Neighborhoods::Text(text) => split_tags(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tags().is_empty()
    }
}

impl From<Vec<String>> for Neighborhoods {
    fn from(items: Vec<String>) -> Self {
        Neighborhoods::List(items)
    }
}

// ---------------------------------------------------------------------------
// Story
// ---------------------------------------------------------------------------

/// A classified news story as stored and served to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable_string")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub author: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub date: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub social_abstract: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub umbrella: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub geographic_area: String,
    #[serde(default, deserialize_with = "nullable_neighborhoods")]
    pub neighborhoods: Neighborhoods,
}

impl Story {
    pub fn umbrella_tags(&self) -> Vec<String> {
        split_tags(&self.umbrella)
    }

    pub fn area_tags(&self) -> Vec<String> {
        split_tags(&self.geographic_area)
    }

    pub fn neighborhood_tags(&self) -> Vec<String> {
        self.neighborhoods.tags()
    }

    /// True when the story carries no geographic classification at all.
    pub fn is_unclassified(&self) -> bool {
        self.umbrella.trim().is_empty()
            && self.geographic_area.trim().is_empty()
            && self.neighborhoods.is_empty()
    }
}

/// A story produced by the classification pipeline that has not yet been
/// assigned an id by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewStory {
    pub url: String,
    pub title: String,
    pub author: String,
    pub date: String,
    pub social_abstract: String,
    pub umbrella: String,
    pub geographic_area: String,
    pub neighborhoods: Vec<String>,
}

impl NewStory {
    pub fn into_story(self, id: i64) -> Story {
        Story {
            id,
            url: self.url,
            title: self.title,
            author: self.author,
            date: self.date,
            social_abstract: self.social_abstract,
            umbrella: self.umbrella,
            geographic_area: self.geographic_area,
            neighborhoods: Neighborhoods::List(self.neighborhoods),
        }
    }
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_neighborhoods<'de, D>(deserializer: D) -> Result<Neighborhoods, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Neighborhoods>::deserialize(deserializer)?.unwrap_or_default())
}
