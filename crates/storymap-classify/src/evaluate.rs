// Scoring predicted classifications against a hand-labelled story list.
//
// Rows are joined on story URL. For each geography field, stories whose
// manual value is blank are skipped; the rest are compared as whole labels
// after tag normalization, so "Oakland, Shadyside" and "Shadyside; Oakland"
// agree.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use serde::Serialize;
use storymap_core::split_tags;

use crate::sheet::StoryRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Field {
    Neighborhoods,
    GeographicArea,
    Umbrella,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Neighborhoods, Field::GeographicArea, Field::Umbrella];

    fn value(self, row: &StoryRow) -> Option<&str> {
        match self {
            Field::Neighborhoods => row.neighborhoods.as_deref(),
            Field::GeographicArea => row.geographic_area.as_deref(),
            Field::Umbrella => row.umbrella.as_deref(),
        }
    }
}

/// Accuracy plus support-weighted precision, recall, and F1 over labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMetrics {
    pub field: Field,
    /// Stories with a manual label for this field.
    pub compared: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    #[serde(rename = "Story")]
    pub url: String,
    #[serde(rename = "Field")]
    pub field: Field,
    #[serde(rename = "Manual")]
    pub manual: String,
    #[serde(rename = "Predicted")]
    pub predicted: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    /// Predicted rows that found a manual row with the same URL.
    pub matched_stories: usize,
    pub fields: Vec<FieldMetrics>,
    #[serde(skip)]
    pub mismatches: Vec<Mismatch>,
}

/// Compare `predicted` against `manual`. When the manual list holds a URL
/// twice the first row wins.
pub fn evaluate(predicted: &[StoryRow], manual: &[StoryRow]) -> Evaluation {
    let mut labelled: HashMap<&str, &StoryRow> = HashMap::new();
    for row in manual {
        labelled.entry(row.url.trim()).or_insert(row);
    }

    let pairs: Vec<(&StoryRow, &StoryRow)> = predicted
        .iter()
        .filter_map(|p| labelled.get(p.url.trim()).map(|m| (p, *m)))
        .collect();

    let mut mismatches = Vec::new();
    let mut labels: BTreeMap<usize, Vec<(String, String)>> = BTreeMap::new();
    for (pred, man) in &pairs {
        for (idx, field) in Field::ALL.iter().enumerate() {
            let Some(manual_value) = field.value(man) else {
                continue;
            };
            let predicted_value = field.value(pred).unwrap_or_default();
            let truth = canonical_label(manual_value);
            let guess = canonical_label(predicted_value);
            if truth != guess {
                mismatches.push(Mismatch {
                    url: pred.url.clone(),
                    field: *field,
                    manual: manual_value.to_string(),
                    predicted: predicted_value.to_string(),
                });
            }
            labels.entry(idx).or_default().push((truth, guess));
        }
    }

    let fields = Field::ALL
        .iter()
        .enumerate()
        .map(|(idx, field)| score(*field, labels.get(&idx).map(Vec::as_slice).unwrap_or_default()))
        .collect();

    Evaluation {
        matched_stories: pairs.len(),
        fields,
        mismatches,
    }
}

/// Tags sorted and joined, so order and delimiter do not matter.
fn canonical_label(value: &str) -> String {
    let mut tags = split_tags(value);
    tags.sort();
    tags.dedup();
    tags.join(", ")
}

fn score(field: Field, pairs: &[(String, String)]) -> FieldMetrics {
    let total = pairs.len();
    if total == 0 {
        return FieldMetrics {
            field,
            compared: 0,
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }

    // label -> (support, predicted, true positives)
    let mut classes: HashMap<&str, (usize, usize, usize)> = HashMap::new();
    let mut correct = 0;
    for (truth, guess) in pairs {
        classes.entry(truth.as_str()).or_default().0 += 1;
        classes.entry(guess.as_str()).or_default().1 += 1;
        if truth == guess {
            correct += 1;
            classes.entry(truth.as_str()).or_default().2 += 1;
        }
    }

    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for (support, predicted, hits) in classes.values() {
        if *support == 0 {
            continue;
        }
        let weight = *support as f64 / total as f64;
        let p = if *predicted == 0 { 0.0 } else { *hits as f64 / *predicted as f64 };
        let r = *hits as f64 / *support as f64;
        let f = if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) };
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }

    FieldMetrics {
        field,
        compared: total,
        accuracy: correct as f64 / total as f64,
        precision,
        recall,
        f1,
    }
}

/// Write mismatches as CSV with a `Story,Field,Manual,Predicted` header.
pub fn write_mismatches<W: Write>(mismatches: &[Mismatch], out: W) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    writer.write_record(["Story", "Field", "Manual", "Predicted"])?;
    for mismatch in mismatches {
        writer.serialize(mismatch)?;
    }
    writer.flush()?;
    Ok(())
}
