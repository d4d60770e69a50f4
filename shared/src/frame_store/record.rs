//! Metadata records for cached frames.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::FrameStoreError;

/// Layout of a cached input image, relative to the data directory.
pub const INPUT_IMAGE_FORMAT: &str = "images/input/%Y-%m-%d_%H%M%S_UTC.jpg";

/// Layout of a stacked output image, relative to the output directory.
pub const OUTPUT_IMAGE_FORMAT: &str = "%Y-%m-%d_%H%M%S_UTC.png";

/// One frame listed by the remote index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Full-size image URL.
    pub url: String,

    /// Capture time, Unix epoch seconds (UTC).
    pub timestamp: i64,

    /// Cached image location relative to the data directory.
    pub image_path: PathBuf,

    /// Exposure description as published by the index.
    pub exposure: String,
}

impl FrameRecord {
    /// Build a record, deriving `image_path` from the timestamp.
    pub fn new(url: String, timestamp: i64, exposure: String) -> Result<Self, FrameStoreError> {
        let image_path = PathBuf::from(format_timestamp(timestamp, INPUT_IMAGE_FORMAT)?);
        Ok(Self {
            url,
            timestamp,
            image_path,
            exposure,
        })
    }

    /// Stable identifier: the cached image's file stem.
    pub fn id(&self) -> String {
        self.image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.timestamp.to_string())
    }

    pub fn datetime(&self) -> Result<DateTime<Utc>, FrameStoreError> {
        utc_datetime(self.timestamp)
    }

    /// Fails unless `image_path` is a non-empty relative path that cannot
    /// leave the data directory.
    pub fn check_image_path(&self) -> Result<(), FrameStoreError> {
        let mut components = self.image_path.components().peekable();
        let contained = components.peek().is_some()
            && components.all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if contained {
            Ok(())
        } else {
            Err(FrameStoreError::UnsafeImagePath {
                path: self.image_path.clone(),
            })
        }
    }

    /// Absolute location of the cached image under `data_dir`.
    pub fn local_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.image_path)
    }
}

pub fn utc_datetime(timestamp: i64) -> Result<DateTime<Utc>, FrameStoreError> {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .ok_or(FrameStoreError::InvalidTimestamp(timestamp))
}

/// Format an epoch timestamp with a chrono `strftime` pattern in UTC.
pub fn format_timestamp(timestamp: i64, format: &str) -> Result<String, FrameStoreError> {
    Ok(utc_datetime(timestamp)?.format(format).to_string())
}

/// Inclusive time window; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.from.map_or(true, |from| timestamp >= from.timestamp())
            && self.to.map_or(true, |to| timestamp <= to.timestamp())
    }
}

/// Records inside `range` whose exposure matches `exposure`, oldest first.
///
/// The exposure pattern is searched anywhere in the exposure string.
pub fn filter_records(
    records: &[FrameRecord],
    range: &TimeRange,
    exposure: Option<&Regex>,
) -> Vec<FrameRecord> {
    let mut selected: Vec<FrameRecord> = records
        .iter()
        .filter(|r| range.contains(r.timestamp))
        .filter(|r| exposure.map_or(true, |re| re.is_match(&r.exposure)))
        .cloned()
        .collect();
    selected.sort_by_key(|r| r.timestamp);
    selected
}
