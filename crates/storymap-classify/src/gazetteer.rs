// Place-name lookup tables built from the enhanced geographic data file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("failed to read geography file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse geography file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct GeographyFile {
    #[serde(default)]
    pittsburgh_neighborhoods: BTreeMap<String, NeighborhoodEntry>,
    #[serde(default)]
    allegheny_county_municipalities: BTreeMap<String, MunicipalityEntry>,
    #[serde(default)]
    context_validation: ContextFile,
}

#[derive(Debug, Deserialize)]
struct NeighborhoodEntry {
    official_name: String,
    region: String,
    #[serde(default)]
    aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MunicipalityEntry {
    official_name: String,
    #[serde(default)]
    full_name: Option<String>,
    sub_region: String,
    #[serde(default)]
    aliases: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContextFile {
    #[serde(default)]
    positive_keywords: Vec<String>,
    #[serde(default)]
    negative_keywords: Vec<String>,
    #[serde(default)]
    ambiguous_places: BTreeMap<String, AmbiguousEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct AmbiguousEntry {
    #[serde(default)]
    exclude_markers: Vec<String>,
}

// ---------------------------------------------------------------------------
// Context rules
// ---------------------------------------------------------------------------

const DEFAULT_POSITIVE: &[&str] = &[
    "pennsylvania",
    "pa",
    "pittsburgh",
    "allegheny county",
    "near pittsburgh",
    "pittsburgh area",
    "western pennsylvania",
    "southwestern pa",
    "greater pittsburgh",
    "neighborhood",
    "community",
    "local",
    "area residents",
];

const DEFAULT_NEGATIVE: &[&str] = &[
    "tennessee",
    "tn",
    "university of tennessee",
    "knoxville tn",
    "texas",
    "tx",
    "california",
    "ca",
    "new york",
    "ny",
    "florida",
    "fl",
    "ohio",
    "oh",
    "university of",
];

const DEFAULT_EXCLUDE_MARKERS: &[&str] = &["tennessee", "tn", "university of"];

/// Keyword lists used to confirm or reject a match by its surroundings.
/// All entries are lowercase.
#[derive(Debug, Clone)]
pub struct ContextRules {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    /// Lowercase place name → markers that mean "not the local place".
    pub ambiguous: HashMap<String, Vec<String>>,
}

impl Default for ContextRules {
    fn default() -> Self {
        ContextRules::from_file(ContextFile::default())
    }
}

impl ContextRules {
    fn from_file(file: ContextFile) -> Self {
        let lower = |items: Vec<String>, fallback: &[&str]| -> Vec<String> {
            if items.is_empty() {
                fallback.iter().map(|s| s.to_string()).collect()
            } else {
                items.into_iter().map(|s| s.to_lowercase()).collect()
            }
        };

        let mut ambiguous: HashMap<String, Vec<String>> = file
            .ambiguous_places
            .into_iter()
            .map(|(name, entry)| {
                (name.to_lowercase(), lower(entry.exclude_markers, DEFAULT_EXCLUDE_MARKERS))
            })
            .collect();
        if ambiguous.is_empty() {
            ambiguous.insert(
                "knoxville".into(),
                DEFAULT_EXCLUDE_MARKERS.iter().map(|s| s.to_string()).collect(),
            );
        }

        ContextRules {
            positive: lower(file.positive_keywords, DEFAULT_POSITIVE),
            negative: lower(file.negative_keywords, DEFAULT_NEGATIVE),
            ambiguous,
        }
    }
}

// ---------------------------------------------------------------------------
// Gazetteer
// ---------------------------------------------------------------------------

/// Words too generic to stand in for a multi-word place on their own.
const GENERIC_PARTS: &[&str] = &[
    "central", "district", "east", "heights", "hill", "hills", "lower", "north", "park",
    "point", "side", "south", "square", "upper", "valley", "view", "village", "west",
];

#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    alias_to_official: HashMap<String, String>,
    official_to_region: HashMap<String, String>,
    neighborhoods: HashSet<String>,
    municipalities: HashSet<String>,
    /// `(alias, official)`, longest alias first.
    alias_list: Vec<(String, String)>,
    context: ContextRules,
}

impl Gazetteer {
    /// Load from disk. A missing file yields an empty gazetteer (nothing will
    /// be classified) rather than an error.
    pub fn load(path: &Path) -> Result<Self, ClassifyError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "{} not found; geographic classification is disabled",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ClassifyError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let gazetteer = Self::from_json(&text).map_err(|source| ClassifyError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            neighborhoods = gazetteer.neighborhoods.len(),
            municipalities = gazetteer.municipalities.len(),
            aliases = gazetteer.alias_list.len(),
            "loaded gazetteer from {}",
            path.display()
        );
        Ok(gazetteer)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let file: GeographyFile = serde_json::from_str(text)?;
        Ok(Self::build(file))
    }

    fn build(file: GeographyFile) -> Self {
        let mut g = Gazetteer {
            context: ContextRules::from_file(file.context_validation),
            ..Default::default()
        };

        // Part words of multi-word neighborhood names, counted across places so
        // that shared words ("Squirrel" in two Squirrel Hills) are not aliases.
        let mut part_counts: HashMap<String, usize> = HashMap::new();
        for entry in file.pittsburgh_neighborhoods.values() {
            let parts: HashSet<String> = significant_parts(&entry.official_name).collect();
            for part in parts {
                *part_counts.entry(part).or_default() += 1;
            }
        }

        for (key, entry) in &file.pittsburgh_neighborhoods {
            let official = entry.official_name.trim().to_string();
            g.add_alias(key, &official);
            g.add_alias(&official, &official);
            for alias in &entry.aliases {
                g.add_alias(alias, &official);
            }
            for part in significant_parts(&official) {
                if part_counts.get(&part) == Some(&1) {
                    g.alias_to_official.entry(part).or_insert_with(|| official.clone());
                }
            }
            g.official_to_region
                .insert(official.clone(), entry.region.trim().to_string());
            g.neighborhoods.insert(official);
        }

        for (key, entry) in &file.allegheny_county_municipalities {
            let official = entry.official_name.trim().to_string();
            g.add_alias(key, &official);
            g.add_alias(&official, &official);
            if let Some(full) = &entry.full_name {
                g.add_alias(full, &official);
            }
            for alias in &entry.aliases {
                g.add_alias(alias, &official);
            }
            g.official_to_region
                .insert(official.clone(), entry.sub_region.trim().to_string());
            g.municipalities.insert(official);
        }

        let mut alias_list: Vec<(String, String)> = g
            .alias_to_official
            .iter()
            .map(|(a, o)| (a.clone(), o.clone()))
            .collect();
        alias_list.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        g.alias_list = alias_list;
        g
    }

    fn add_alias(&mut self, alias: &str, official: &str) {
        let alias = alias.trim().to_lowercase();
        if !alias.is_empty() {
            self.alias_to_official.insert(alias, official.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.alias_list.is_empty()
    }

    /// `(alias, official)` pairs, longest alias first.
    pub fn aliases(&self) -> &[(String, String)] {
        &self.alias_list
    }

    pub fn official_for(&self, alias: &str) -> Option<&str> {
        self.alias_to_official
            .get(&alias.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn region_of(&self, official: &str) -> Option<&str> {
        self.official_to_region.get(official).map(String::as_str)
    }

    pub fn is_neighborhood(&self, official: &str) -> bool {
        self.neighborhoods.contains(official)
    }

    pub fn is_municipality(&self, official: &str) -> bool {
        self.municipalities.contains(official)
    }

    pub fn context(&self) -> &ContextRules {
        &self.context
    }
}

/// Lowercase words of a multi-word name longer than three characters,
/// excluding generic geography words. Single-word names have no parts.
fn significant_parts(name: &str) -> impl Iterator<Item = String> + '_ {
    let words: Vec<&str> = name.split_whitespace().collect();
    let multi = words.len() > 1;
    words
        .into_iter()
        .filter(move |_| multi)
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.chars().count() > 3 && !GENERIC_PARTS.contains(&w.as_str()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A small slice of the real data: enough Pittsburgh neighborhoods and
    /// county municipalities to exercise every rule.
    pub(crate) const SAMPLE: &str = r#"{
        "pittsburgh_neighborhoods": {
            "Oakland": {"official_name": "Oakland", "region": "East End"},
            "Shadyside": {"official_name": "Shadyside", "region": "East End"},
            "Squirrel Hill North": {"official_name": "Squirrel Hill North", "region": "East End"},
            "Squirrel Hill South": {"official_name": "Squirrel Hill South", "region": "East End"},
            "Lawrenceville": {"official_name": "Lawrenceville", "region": "East End",
                              "aliases": ["Lower Lawrenceville", "Upper Lawrenceville"]},
            "Hill District": {"official_name": "Hill District", "region": "Hill District"},
            "Knoxville": {"official_name": "Knoxville", "region": "South Hills"},
            "Manchester": {"official_name": "Manchester", "region": "North Side"},
            "Brighton Heights": {"official_name": "Brighton Heights", "region": "North Side"}
        },
        "allegheny_county_municipalities": {
            "McKeesport": {"official_name": "McKeesport", "full_name": "McKeesport City",
                           "type": "City", "sub_region": "Mon Valley",
                           "aliases": ["McKeesport", "McKeesport City"]},
            "Sewickley": {"official_name": "Sewickley", "full_name": "Sewickley Borough",
                          "type": "Borough", "sub_region": "North Allegheny County"},
            "Moon": {"official_name": "Moon", "full_name": "Moon Township",
                     "type": "Township", "sub_region": "Airport Corridor"}
        },
        "context_validation": {
            "ambiguous_places": {
                "Knoxville": {"pennsylvania": "Knoxville, Pittsburgh neighborhood",
                              "validation_required": true}
            }
        }
    }"#;

    pub(crate) fn sample() -> Gazetteer {
        Gazetteer::from_json(SAMPLE).unwrap()
    }

    #[test]
    fn aliases_resolve_to_official_names() {
        let g = sample();
        assert_eq!(g.official_for("oakland"), Some("Oakland"));
        assert_eq!(g.official_for("Upper Lawrenceville"), Some("Lawrenceville"));
        assert_eq!(g.official_for("mckeesport city"), Some("McKeesport"));
        assert_eq!(g.official_for("Moon Township"), Some("Moon"));
        assert_eq!(g.official_for("nowhere"), None);
    }

    #[test]
    fn unique_parts_of_multiword_names_become_aliases() {
        let g = sample();
        assert_eq!(g.official_for("brighton"), Some("Brighton Heights"));
        // Shared by both Squirrel Hills.
        assert_eq!(g.official_for("squirrel"), None);
        // Generic words never stand alone.
        assert_eq!(g.official_for("district"), None);
        assert_eq!(g.official_for("heights"), None);
    }

    #[test]
    fn regions_and_kinds() {
        let g = sample();
        assert_eq!(g.region_of("Oakland"), Some("East End"));
        assert_eq!(g.region_of("Sewickley"), Some("North Allegheny County"));
        assert!(g.is_neighborhood("Knoxville"));
        assert!(!g.is_municipality("Knoxville"));
        assert!(g.is_municipality("Moon"));
    }

    #[test]
    fn alias_list_is_longest_first() {
        let g = sample();
        let lens: Vec<usize> = g.aliases().iter().map(|(a, _)| a.len()).collect();
        assert!(lens.windows(2).all(|w| w[0] >= w[1]));
        assert!(!g.is_empty());
    }

    #[test]
    fn context_rules_fall_back_to_defaults() {
        let g = sample();
        let ctx = g.context();
        assert!(ctx.positive.contains(&"pittsburgh".to_string()));
        assert!(ctx.negative.contains(&"tennessee".to_string()));
        assert_eq!(
            ctx.ambiguous.get("knoxville"),
            Some(&vec!["tennessee".to_string(), "tn".to_string(), "university of".to_string()])
        );
    }

    #[test]
    fn missing_file_gives_empty_gazetteer() {
        let g = Gazetteer::load(Path::new("/nonexistent/enhanced_geographic_data.json")).unwrap();
        assert!(g.is_empty());
        assert!(g.context().ambiguous.contains_key("knoxville"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let path = std::env::temp_dir().join("storymap_gazetteer_bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Gazetteer::load(&path).unwrap_err();
        assert!(matches!(err, ClassifyError::Parse { .. }));
        let _ = std::fs::remove_file(&path);
    }
}
