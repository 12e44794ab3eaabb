// Cell and tag normalization shared by the spreadsheet reader and assignment.

/// Placeholder values that spreadsheet editors use for "nothing here yet".
const BLANK_MARKERS: &[&str] = &["", "…", "..."];

pub fn is_blank(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => BLANK_MARKERS.contains(&v.trim()),
    }
}

/// Tidy a tag value for display: trim, capitalize words typed entirely in
/// lowercase (splitting on whitespace, `-` and `/`), and normalize comma
/// spacing. Mixed-case words such as `McKees` are left alone.
///
/// Returns `None` for blank input.
pub fn norm_text(value: &str) -> Option<String> {
    if is_blank(Some(value)) {
        return None;
    }
    let trimmed = value.trim();

    let mut out = String::with_capacity(trimmed.len());
    let mut word = String::new();
    for c in trimmed.chars() {
        if c.is_whitespace() || c == '-' || c == '/' {
            out.push_str(&capitalize_lowercase(&word));
            word.clear();
            out.push(c);
        } else {
            word.push(c);
        }
    }
    out.push_str(&capitalize_lowercase(&word));

    Some(normalize_commas(&out))
}

/// Uppercase the first letter of a word whose letters are all lowercase.
/// Leading punctuation (`,shadyside`) is skipped over.
fn capitalize_lowercase(word: &str) -> String {
    if !word.chars().any(char::is_lowercase) || word.chars().any(char::is_uppercase) {
        return word.to_string();
    }
    let mut out = String::with_capacity(word.len());
    let mut done = false;
    for c in word.chars() {
        if !done && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            done = true;
        } else {
            out.push(c);
        }
    }
    out
}

/// Replace every comma and its surrounding whitespace with `", "`.
fn normalize_commas(text: &str) -> String {
    text.split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The story fields a spreadsheet column can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Story,
    Umbrella,
    GeographicArea,
    Neighborhoods,
    SocialAbstract,
    Title,
    Author,
    Date,
}

/// Map a spreadsheet header onto a story column. Case, spaces, underscores,
/// and hyphens are ignored, so `Geographic Area`, `geographic_area`, and
/// `GeographicArea` are the same column.
pub fn canonical_header(name: &str) -> Option<Column> {
    let key: String = name
        .chars()
        .filter(|c| !(c.is_whitespace() || *c == '_' || *c == '-'))
        .flat_map(char::to_lowercase)
        .collect();

    let column = match key.as_str() {
        "story" | "storyurl" | "url" | "link" => Column::Story,
        "umbrella" => Column::Umbrella,
        "geographicarea" => Column::GeographicArea,
        "neighborhoods" | "neighborhood" => Column::Neighborhoods,
        "socialabstract" => Column::SocialAbstract,
        "title" => Column::Title,
        "author" => Column::Author,
        "date" => Column::Date,
        _ => return None,
    };
    Some(column)
}
