//! Frame metadata and image cache backed by a remote index.
//!
//! The data directory holds `images/input/metadata.json`, a JSON array of
//! [`FrameRecord`]s ordered newest first, alongside the cached input images.
//! [`FrameStore::update_metadata`] walks the remote index pages until it
//! reaches a record that is already cached; [`FrameStore::ensure_local`]
//! downloads an individual image on demand.
//!
//! All network access goes through a [`PageSource`], so the store can be
//! driven by [`HttpSource`] in production and [`MemorySource`] in tests.

pub mod index_page;
pub mod record;
pub mod source;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use index_page::{fetch_page, parse_status_line, IndexConfig};
pub use record::{
    filter_records, format_timestamp, utc_datetime, FrameRecord, TimeRange, INPUT_IMAGE_FORMAT,
    OUTPUT_IMAGE_FORMAT,
};
pub use source::{FetchConfig, HttpSource, MemorySource, PageSource, RequestBudget};
pub use store::{FrameStore, MetadataStore, METADATA_FILE};

#[derive(Error, Debug)]
pub enum FrameStoreError {
    #[error("no metadata file at {path}; run an update first")]
    NoMetadataFile { path: PathBuf },

    #[error("image not cached locally: {path}")]
    MissingImage { path: PathBuf },

    #[error("request budget of {max_requests} exhausted")]
    BudgetExhausted { max_requests: usize },

    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("request to {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("malformed index page: {0}")]
    MalformedPage(String),

    #[error("metadata image path {path} is not inside the data directory")]
    UnsafeImagePath { path: PathBuf },

    #[error("{field} = {value} is not a valid duration in seconds")]
    InvalidDuration { field: &'static str, value: f64 },

    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metadata JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
