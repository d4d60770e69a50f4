//! Local metadata and image cache.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use regex::Regex;

use super::index_page::{fetch_page, IndexConfig};
use super::record::{filter_records, FrameRecord, TimeRange};
use super::source::PageSource;
use super::FrameStoreError;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> FrameStoreError {
    let path = path.to_path_buf();
    move |source| FrameStoreError::Io { path, source }
}

/// Metadata file location relative to the data directory.
pub const METADATA_FILE: &str = "images/input/metadata.json";

/// JSON array of [`FrameRecord`]s, stored newest first.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records, newest first.
    ///
    /// # Errors
    /// * `FrameStoreError::NoMetadataFile` - the file has never been written
    /// * `FrameStoreError::UnsafeImagePath` - a record points outside the data directory
    pub fn load(&self) -> Result<Vec<FrameRecord>, FrameStoreError> {
        if !self.path.exists() {
            return Err(FrameStoreError::NoMetadataFile {
                path: self.path.clone(),
            });
        }

        let json = fs::read_to_string(&self.path).map_err(io_err(&self.path))?;
        let records: Vec<FrameRecord> =
            serde_json::from_str(&json).map_err(|source| FrameStoreError::Json {
                path: self.path.clone(),
                source,
            })?;

        for record in &records {
            record.check_image_path()?;
        }
        Ok(records)
    }

    /// Like [`MetadataStore::load`] but treats a missing file as empty.
    pub fn load_or_empty(&self) -> Result<Vec<FrameRecord>, FrameStoreError> {
        match self.load() {
            Err(FrameStoreError::NoMetadataFile { .. }) => Ok(Vec::new()),
            other => other,
        }
    }

    pub fn save(&self, records: &[FrameRecord]) -> Result<(), FrameStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let json = serde_json::to_string_pretty(records).map_err(|source| FrameStoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(io_err(&self.path))
    }
}

/// Cached frames under a data directory.
#[derive(Debug, Clone)]
pub struct FrameStore {
    data_dir: PathBuf,
    index: IndexConfig,
}

impl FrameStore {
    pub fn new(data_dir: PathBuf, index: IndexConfig) -> Self {
        Self { data_dir, index }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn metadata(&self) -> MetadataStore {
        MetadataStore::new(self.data_dir.join(METADATA_FILE))
    }

    pub fn local_path(&self, record: &FrameRecord) -> PathBuf {
        record.local_path(&self.data_dir)
    }

    /// Records within `range` whose exposure matches `exposure`, oldest first.
    pub fn list_metadata(
        &self,
        range: &TimeRange,
        exposure: Option<&Regex>,
    ) -> Result<Vec<FrameRecord>, FrameStoreError> {
        let records = self.metadata().load()?;
        let selected = filter_records(&records, range, exposure);
        info!(
            "{} of {} cached records match the time range and exposure filter",
            selected.len(),
            records.len()
        );
        Ok(selected)
    }

    /// Fetch index pages until reaching the newest cached record or the end
    /// of the index, then prepend the new records to the metadata file.
    ///
    /// Returns the number of new records.
    pub fn update_metadata<S: PageSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Result<usize, FrameStoreError> {
        let store = self.metadata();
        let old = store.load_or_empty()?;
        let newest_cached = old.first().map(|r| r.timestamp);

        let mut updates = Vec::new();
        'pages: for page in 1.. {
            let Some(records) = fetch_page(source, &self.index, page)? else {
                debug!("page {page} has no listing; end of index");
                break;
            };
            debug!("page {page}: {} records", records.len());

            for record in records {
                if Some(record.timestamp) == newest_cached {
                    break 'pages;
                }
                updates.push(record);
            }
        }

        let added = updates.len();
        info!("downloaded new metadata for {added} frames");

        updates.extend(old);
        store.save(&updates)?;
        Ok(added)
    }

    /// Make sure the record's image exists locally, downloading it when
    /// allowed.
    ///
    /// # Errors
    /// * `FrameStoreError::MissingImage` - absent and `download_missing` is false
    pub fn ensure_local<S: PageSource + ?Sized>(
        &self,
        record: &FrameRecord,
        download_missing: bool,
        source: &mut S,
    ) -> Result<PathBuf, FrameStoreError> {
        let path = self.local_path(record);
        if path.exists() {
            return Ok(path);
        }
        if !download_missing {
            return Err(FrameStoreError::MissingImage { path });
        }

        info!("downloading {} to {}", record.url, path.display());
        let bytes = source.fetch_bytes(&record.url)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        // A partial download must never sit at the final path
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, bytes).map_err(io_err(&temp_path))?;
        fs::rename(&temp_path, &path).map_err(io_err(&path))?;

        Ok(path)
    }

    /// Check every record, downloading missing images when allowed.
    pub fn check_images<S: PageSource + ?Sized>(
        &self,
        records: &[FrameRecord],
        download_missing: bool,
        source: &mut S,
    ) -> Result<Vec<PathBuf>, FrameStoreError> {
        records
            .iter()
            .map(|r| self.ensure_local(r, download_missing, source))
            .collect()
    }
}
