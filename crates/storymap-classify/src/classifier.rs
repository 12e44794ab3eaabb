// Geographic classification of article text against the gazetteer.
//
// Matching runs in three passes: exact alias matches on word boundaries, a
// fuzzy fallback when nothing matched exactly, and context validation that
// scores each candidate by the keywords around it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::gazetteer::Gazetteer;

const BASE_SCORE: f64 = 0.6;
const POSITIVE_BOOST: f64 = 0.3;
const NEGATIVE_PENALTY: f64 = 0.7;

const AMBIGUOUS_EXCLUDED: f64 = 0.0;
const AMBIGUOUS_CONFIRMED: f64 = 0.9;
const AMBIGUOUS_UNCERTAIN: f64 = 0.5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Places that cleared the confidence threshold, best first.
    pub places: Vec<String>,
    /// Score for every candidate, including the rejected ones.
    pub scores: BTreeMap<String, f64>,
}

pub struct Classifier {
    gazetteer: Gazetteer,
    min_confidence: f64,
    fuzzy_threshold: f64,
}

impl Classifier {
    pub fn new(gazetteer: Gazetteer, min_confidence: f64, fuzzy_threshold: f64) -> Self {
        Self {
            gazetteer,
            min_confidence,
            fuzzy_threshold,
        }
    }

    pub fn gazetteer(&self) -> &Gazetteer {
        &self.gazetteer
    }

    pub fn classify(&self, text: &str) -> Classification {
        let lower = text.to_lowercase();

        let mut candidates = self.exact_matches(&lower);
        if candidates.is_empty() {
            candidates.extend(self.fuzzy_match(&lower));
        }

        let scores: BTreeMap<String, f64> = candidates
            .into_iter()
            .map(|place| {
                let score = self.context_score(&lower, &place);
                (place, score)
            })
            .collect();

        let mut places: Vec<(&String, f64)> = scores
            .iter()
            .filter(|(_, &s)| s >= self.min_confidence)
            .map(|(p, &s)| (p, s))
            .collect();
        places.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let places = places.into_iter().map(|(p, _)| p.clone()).collect();

        Classification { places, scores }
    }

    /// Every alias that occurs as a whole phrase. Aliases are tried longest
    /// first, and a match inside a span already claimed by a longer alias is
    /// ignored, so "squirrel hill north" does not also yield "squirrel hill".
    fn exact_matches(&self, lower: &str) -> Vec<String> {
        let mut claimed: Vec<(usize, usize)> = Vec::new();
        let mut found: Vec<String> = Vec::new();

        for (alias, official) in self.gazetteer.aliases() {
            for span in word_spans(lower, alias) {
                let inside = claimed.iter().any(|&(s, e)| span.0 >= s && span.1 <= e);
                if inside {
                    continue;
                }
                claimed.push(span);
                if !found.contains(official) {
                    found.push(official.clone());
                }
            }
        }
        found
    }

    /// First alias whose similarity to some word of four or more letters
    /// reaches the fuzzy threshold.
    fn fuzzy_match(&self, lower: &str) -> Option<String> {
        let words: BTreeSet<&str> = fuzzy_word_re().find_iter(lower).map(|m| m.as_str()).collect();
        if words.is_empty() {
            return None;
        }
        self.gazetteer
            .aliases()
            .iter()
            .find(|(alias, _)| {
                words
                    .iter()
                    .any(|w| strsim::normalized_levenshtein(w, alias) >= self.fuzzy_threshold)
            })
            .map(|(_, official)| official.clone())
    }

    fn context_score(&self, lower: &str, place: &str) -> f64 {
        let ctx = self.gazetteer.context();
        let positive = ctx.positive.iter().any(|k| contains_word(lower, k));

        if let Some(markers) = ctx.ambiguous.get(&place.to_lowercase()) {
            return if markers.iter().any(|m| contains_word(lower, m)) {
                AMBIGUOUS_EXCLUDED
            } else if positive || contains_word(lower, "pittsburgh") {
                AMBIGUOUS_CONFIRMED
            } else {
                AMBIGUOUS_UNCERTAIN
            };
        }

        let negative = ctx.negative.iter().any(|k| contains_word(lower, k));
        let mut score = BASE_SCORE;
        if positive {
            score = (score + POSITIVE_BOOST).min(1.0);
        }
        if negative {
            score = (score - NEGATIVE_PENALTY).max(0.0);
        }
        score
    }
}

fn fuzzy_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z']{4,}").expect("valid regex"))
}

/// Byte spans where `needle` occurs in `haystack` bounded by non-alphanumeric
/// characters (or the ends of the string).
pub(crate) fn word_spans<'a>(
    haystack: &'a str,
    needle: &'a str,
) -> impl Iterator<Item = (usize, usize)> + 'a {
    haystack
        .match_indices(needle)
        .map(|(start, m)| (start, start + m.len()))
        .filter(move |&(start, end)| {
            let before = haystack[..start].chars().next_back();
            let after = haystack[end..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
}

pub(crate) fn contains_word(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && word_spans(haystack, needle).next().is_some()
}
