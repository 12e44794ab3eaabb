// Classification pipeline: spreadsheet ingestion, page fetching, article
// extraction, gazetteer matching, teaser writing, and sitemap import.

pub mod article;
pub mod assign;
pub mod classifier;
pub mod evaluate;
pub mod fetch;
pub mod gazetteer;
pub mod normalize;
pub mod pipeline;
pub mod sheet;
pub mod sitemap;
pub mod teaser;

pub use classifier::{Classification, Classifier};
pub use fetch::{CachedFetcher, FetchError, HttpFetcher, PageFetcher};
pub use gazetteer::Gazetteer;
pub use pipeline::{ConfidenceReport, Pipeline, PipelineOutput};
pub use sheet::{read_rows, SheetError, StoryRow};
pub use sitemap::{ImportReport, SitemapImporter};
