// Story list ingestion from CSV and Excel uploads.
//
// A story list is a table with a URL column and optional classification
// columns. Headers are matched loosely (see `canonical_header`); columns we
// do not know are ignored and missing ones read as blank.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use calamine::{Data, Reader};
use storymap_core::Story;
use thiserror::Error;
use tracing::warn;

use crate::normalize::{canonical_header, is_blank, Column};

/// Extensions accepted for upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &["xlsx", "xls", "csv"];

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("unsupported file format: {file_name}")]
    UnsupportedFormat { file_name: String },

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read workbook: {0}")]
    Excel(#[from] calamine::Error),

    #[error("workbook has no worksheets")]
    EmptyWorkbook,
}

/// One input row. `None` means the cell was blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryRow {
    pub url: String,
    pub umbrella: Option<String>,
    pub geographic_area: Option<String>,
    pub neighborhoods: Option<String>,
    pub social_abstract: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
}

impl StoryRow {
    pub fn new(url: impl Into<String>) -> Self {
        StoryRow {
            url: url.into(),
            ..Default::default()
        }
    }

    /// A stored story as pipeline input, for reprocessing.
    pub fn from_story(story: &Story) -> Self {
        let neighborhoods = story.neighborhood_tags().join(", ");
        StoryRow {
            url: story.url.clone(),
            umbrella: non_blank(&story.umbrella),
            geographic_area: non_blank(&story.geographic_area),
            neighborhoods: non_blank(&neighborhoods),
            social_abstract: non_blank(&story.social_abstract),
            title: non_blank(&story.title),
            author: non_blank(&story.author),
            date: non_blank(&story.date),
        }
    }

    fn set(&mut self, column: Column, value: String) {
        let value = non_blank(&value);
        match column {
            Column::Story => self.url = value.unwrap_or_default(),
            Column::Umbrella => self.umbrella = value,
            Column::GeographicArea => self.geographic_area = value,
            Column::Neighborhoods => self.neighborhoods = value,
            Column::SocialAbstract => self.social_abstract = value,
            Column::Title => self.title = value,
            Column::Author => self.author = value,
            Column::Date => self.date = value,
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    if is_blank(Some(value)) {
        None
    } else {
        Some(value.trim().to_string())
    }
}

/// The lowercase extension of `file_name` if it is one we accept.
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Parse an uploaded story list. The format is chosen by extension.
/// Rows without a story URL are dropped.
pub fn read_rows(file_name: &str, bytes: &[u8]) -> Result<Vec<StoryRow>, SheetError> {
    let ext = allowed_extension(file_name).ok_or_else(|| SheetError::UnsupportedFormat {
        file_name: file_name.to_string(),
    })?;
    match ext.as_str() {
        "csv" => read_csv(bytes),
        _ => read_workbook(bytes),
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

pub fn read_csv<R: Read>(rdr: R) -> Result<Vec<StoryRow>, SheetError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let columns = map_columns(&headers);

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        match result {
            Ok(record) => {
                if let Some(row) = build_row(&columns, record.iter().map(str::to_string)) {
                    rows.push(row);
                }
            }
            Err(e) => {
                warn!("skipping malformed CSV row {}: {}", line + 2, e);
            }
        }
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Excel
// ---------------------------------------------------------------------------

/// Read the first worksheet of an `.xlsx` or `.xls` workbook.
pub fn read_workbook(bytes: &[u8]) -> Result<Vec<StoryRow>, SheetError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::EmptyWorkbook)??;

    let mut cells = range.rows();
    let Some(header_row) = cells.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row.iter().map(cell_text).collect();
    let columns = map_columns(&headers);

    Ok(cells
        .filter_map(|row| build_row(&columns, row.iter().map(cell_text)))
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => value.format("%Y-%m-%d").to_string(),
            None => dt.as_f64().to_string(),
        },
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// Column index → story column, first occurrence of each column wins.
fn map_columns(headers: &[String]) -> HashMap<usize, Column> {
    let mut seen = Vec::new();
    let mut columns = HashMap::new();
    for (idx, header) in headers.iter().enumerate() {
        if let Some(column) = canonical_header(header) {
            if !seen.contains(&column) {
                seen.push(column);
                columns.insert(idx, column);
            }
        }
    }
    if !seen.contains(&Column::Story) {
        warn!("story list has no Story/URL column; headers were {:?}", headers);
    }
    columns
}

fn build_row(
    columns: &HashMap<usize, Column>,
    values: impl Iterator<Item = String>,
) -> Option<StoryRow> {
    let mut row = StoryRow::default();
    for (idx, value) in values.enumerate() {
        if let Some(&column) = columns.get(&idx) {
            row.set(column, value);
        }
    }
    (!row.url.is_empty()).then_some(row)
}
