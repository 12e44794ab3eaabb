// Story catalogue: the record model, tag filtering, dates, analytics,
// configuration, and the SQLite store shared by the pipeline and the API.

pub mod analytics;
pub mod cleaning;
pub mod config;
pub mod dates;
pub mod db;
pub mod export;
pub mod filter;
pub mod snapshot;
pub mod story;

pub use story::{split_tags, Neighborhoods, NewStory, Story};
