// The `{stories, filters}` JSON document: refresh-data response body, static
// fallback file, and export format.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::filter::FilterOptions;
use crate::story::Story;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub stories: Vec<Story>,
    #[serde(default)]
    pub filters: FilterOptions,
}

impl Snapshot {
    /// Build a snapshot whose filter lists are derived from `stories`.
    pub fn from_stories(stories: Vec<Story>) -> Self {
        let filters = FilterOptions::from_stories(&stories);
        Snapshot { stories, filters }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse stories snapshot")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid snapshot {}", path.display()))
    }

    /// Write pretty-printed JSON, creating parent directories as needed.
    /// The file is written to a sibling temp file first and renamed over the
    /// target.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to serialize snapshot")?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::Neighborhoods;

    #[test]
    fn from_stories_derives_filters() {
        let story = Story {
            id: 1,
            url: "https://a.org/1".into(),
            title: "T".into(),
            author: String::new(),
            date: String::new(),
            social_abstract: String::new(),
            umbrella: "Pittsburgh".into(),
            geographic_area: "East End".into(),
            neighborhoods: Neighborhoods::Text("Oakland".into()),
        };
        let snap = Snapshot::from_stories(vec![story]);
        assert_eq!(snap.filters.umbrellas, vec!["Pittsburgh"]);
        assert_eq!(snap.filters.geographic_areas, vec!["East End"]);
        assert_eq!(snap.filters.neighborhoods, vec!["Oakland"]);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let snap = Snapshot::from_json("{}").unwrap();
        assert!(snap.stories.is_empty());
        assert!(snap.filters.umbrellas.is_empty());
        assert!(Snapshot::from_json("[1, 2]").is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join("storymap_snapshot_save");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("nested/stories.json");

        let snap = Snapshot::from_json(
            r#"{"stories": [{"id": 3, "url": "https://a.org/3", "neighborhoods": ["Hazelwood"]}]}"#,
        )
        .unwrap();
        snap.save(&path).unwrap();

        let loaded = Snapshot::load(&path).unwrap();
        assert_eq!(loaded, snap);
        assert!(!path.with_extension("json.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Snapshot::load(Path::new("/nonexistent/storymap/stories.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read snapshot"));
    }
}
