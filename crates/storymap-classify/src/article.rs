// Article text and metadata extraction from fetched HTML.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

const CONTENT_SELECTOR: &str = "article, .entry-content, .c-entry-content, main";

const TITLE_SELECTORS: &[&str] = &[
    "h1.entry-title",
    "h1.post-title",
    "h1.article-title",
    "h1.story-title",
    ".entry-header h1",
    ".article-header h1",
    ".post-header h1",
    ".story-header h1",
    ".post-content h1",
    ".article-content h1",
    ".story-content h1",
    r#"h1[class*="title"]"#,
    r#"h1[id*="title"]"#,
    r#"h1[class*="headline"]"#,
    ".wp-block-post-title",
    ".entry-title",
    ".post-title",
    ".page-title",
    ".article-title",
    ".story-title",
    ".news-title",
    ".headline",
    ".post-headline",
    ".article-headline",
    ".story-headline",
    ".headline h1",
    ".title h1",
    ".article-head h1",
    ".story-head h1",
    r#"[class*="headline"] h1"#,
    r#"[class*="heading"] h1"#,
    ".news-article h1",
    ".article-wrapper h1",
    ".content-wrapper h1",
    ".single-post h1",
    ".single-article h1",
    "article h1",
    "main h1",
    r#"[role="main"] h1"#,
    r#"[role="article"] h1"#,
    "header h1",
    ".content h1",
    ".main-content h1",
    ".primary-content h1",
    ".site-content h1",
    ".page-content h1",
    r#"[itemprop="headline"]"#,
    r#"[itemprop="name"]"#,
    r#"[property="headline"]"#,
    r#"meta[property="og:title"]"#,
    r#"meta[name="twitter:title"]"#,
    r#"meta[property="article:title"]"#,
    r#"meta[name="title"]"#,
    r#"meta[property="DC.title"]"#,
    r#"meta[name="DC.Title"]"#,
    "h1",
    "title",
];

const AUTHOR_SELECTORS: &[&str] = &[
    r#"[rel="author"]"#,
    r#"[property="author"]"#,
    r#"[itemprop="author"]"#,
    r#"meta[name="author"]"#,
    r#"meta[property="article:author"]"#,
    ".author",
    ".byline",
    ".by-author",
    ".post-author",
    ".entry-author",
    ".article-author",
    ".writer",
    ".journalist",
    r#"[class*="author"]"#,
    r#"[class*="byline"]"#,
    r#"[class*="writer"]"#,
    ".entry-meta .author",
    ".post-meta .author",
    ".article-meta .author",
    ".author-name",
    ".author-link",
    ".by-line",
    ".meta .author",
    ".info .author",
    ".details .author",
];

const DATE_SELECTORS: &[&str] = &[
    "time[datetime]",
    "time[pubdate]",
    "[datetime]",
    r#"meta[property="article:published_time"]"#,
    r#"meta[property="article:modified_time"]"#,
    r#"meta[name="publication_date"]"#,
    r#"meta[name="DC.date"]"#,
    r#"[itemprop="datePublished"]"#,
    r#"[itemprop="dateCreated"]"#,
    ".date",
    ".published",
    ".publish-date",
    ".post-date",
    ".entry-date",
    ".publication-date",
    ".article-date",
    ".story-date",
    ".news-date",
    r#"[class*="date"]"#,
    r#"[class*="publish"]"#,
    r#"[class*="time"]"#,
    ".entry-meta .date",
    ".post-meta .date",
    ".article-meta .date",
    ".wp-block-post-date",
    ".post-published",
    ".meta .date",
    ".info .date",
    ".details .date",
    ".timestamp",
];

const INVALID_TITLES: &[&str] = &[
    "home", "news", "article", "post", "page", "blog", "index", "loading", "error", "404",
    "not found", "untitled", "default", "welcome", "main", "content", "title", "headline",
    "story",
];

const PLACEHOLDER_AUTHORS: &[&str] = &["admin", "administrator", "staff", "editor"];

/// What we pull out of one article page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Article {
    /// Visible body text, whitespace collapsed.
    pub text: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
}

pub fn extract_article(html: &str) -> Article {
    let doc = Html::parse_document(html);
    Article {
        text: content_text(&doc),
        title: extract_title(&doc),
        author: extract_author(&doc),
        date: extract_date(&doc),
    }
}

fn content_text(doc: &Html) -> String {
    let root = compiled(&CONTENT, &[CONTENT_SELECTOR])
        .first()
        .and_then(|sel| doc.select(sel).next())
        .unwrap_or_else(|| doc.root_element());
    visible_text(root)
}

/// Text nodes under `el`, skipping script and style, joined by single spaces.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
        });
        if !hidden {
            parts.extend(text.split_whitespace());
        }
    }
    parts.join(" ")
}

// ---------------------------------------------------------------------------
// Selector lists
// ---------------------------------------------------------------------------

static CONTENT: OnceLock<Vec<Selector>> = OnceLock::new();
static TITLE: OnceLock<Vec<Selector>> = OnceLock::new();
static AUTHOR: OnceLock<Vec<Selector>> = OnceLock::new();
static DATE: OnceLock<Vec<Selector>> = OnceLock::new();

fn compiled<'a>(cell: &'a OnceLock<Vec<Selector>>, sources: &[&str]) -> &'a [Selector] {
    cell.get_or_init(|| sources.iter().filter_map(|s| Selector::parse(s).ok()).collect())
}

/// `content` for meta tags, stripped text otherwise.
fn element_value(el: ElementRef<'_>) -> String {
    if el.value().name() == "meta" {
        el.value().attr("content").unwrap_or_default().trim().to_string()
    } else {
        el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

// ---------------------------------------------------------------------------
// Title
// ---------------------------------------------------------------------------

fn extract_title(doc: &Html) -> Option<String> {
    compiled(&TITLE, TITLE_SELECTORS).iter().find_map(|sel| {
        let el = doc.select(sel).next()?;
        let title = clean_title(&element_value(el));
        is_valid_title(&title).then_some(title)
    })
}

/// Drop "Breaking:"-style prefixes and a trailing " - Site Name",
/// " – Site Name" or " | Site Name".
pub fn clean_title(raw: &str) -> String {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| {
        Regex::new(r"(?i)^(breaking|news|update):\s*").expect("valid regex")
    });
    let suffix = SUFFIX.get_or_init(|| Regex::new(r"\s+[-–|]\s+[^-–|]*$").expect("valid regex"));

    let title = prefix.replace(raw.trim(), "");
    let title = suffix.replace(&title, "");
    title.trim().to_string()
}

pub fn is_valid_title(title: &str) -> bool {
    static WORD: OnceLock<Regex> = OnceLock::new();
    let word = WORD.get_or_init(|| Regex::new(r"[A-Za-z]{3,}").expect("valid regex"));

    let len = title.chars().count();
    if !(10..=300).contains(&len) {
        return false;
    }
    if INVALID_TITLES.contains(&title.to_lowercase().as_str()) {
        return false;
    }
    if word.find_iter(title).count() < 2 {
        return false;
    }
    let alpha = title.chars().filter(|c| c.is_alphabetic()).count();
    alpha as f64 / len as f64 >= 0.3
}

// ---------------------------------------------------------------------------
// Author
// ---------------------------------------------------------------------------

fn extract_author(doc: &Html) -> Option<String> {
    compiled(&AUTHOR, AUTHOR_SELECTORS).iter().find_map(|sel| {
        let el = doc.select(sel).next()?;
        clean_author(&element_value(el))
    })
}

pub fn clean_author(raw: &str) -> Option<String> {
    static BY: OnceLock<Regex> = OnceLock::new();
    let by = BY.get_or_init(|| Regex::new(r"(?i)^(?:by\b:?|author:)\s*").expect("valid regex"));

    let raw = raw.trim();
    let len = raw.chars().count();
    if !(3..100).contains(&len) {
        return None;
    }
    let author = by.replace(raw, "").trim().to_string();
    if author.is_empty() || PLACEHOLDER_AUTHORS.contains(&author.to_lowercase().as_str()) {
        return None;
    }
    Some(author)
}

// ---------------------------------------------------------------------------
// Date
// ---------------------------------------------------------------------------

fn extract_date(doc: &Html) -> Option<String> {
    compiled(&DATE, DATE_SELECTORS).iter().find_map(|sel| {
        let el = doc.select(sel).next()?;
        let attrs = el.value();
        let value = ["datetime", "content", "title"]
            .iter()
            .filter_map(|a| attrs.attr(a))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| element_value(el));
        looks_like_date(&value).then_some(value)
    })
}

pub fn looks_like_date(value: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"\d{4}|\d{1,2}[/\-]\d{1,2}|\w{3,9}\s+\d{1,2}").expect("valid regex")
    });
    let len = value.chars().count();
    (5..50).contains(&len) && re.is_match(value)
}
