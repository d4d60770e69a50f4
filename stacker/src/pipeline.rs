//! End-to-end stacking run.
//!
//! Stages, in order:
//!
//! 1. optional metadata refresh from the remote index
//! 2. selection of records by time range and exposure
//! 3. making sure each selected image is cached locally
//! 4. loading, and rejecting frames brighter than the configured limit
//! 5. star extraction, in parallel, order preserved
//! 6. sequence registration against the first usable frame
//! 7. grouping of registered frames by time gap
//! 8. compositing each group onto its own canvas, in parallel
//!
//! Failures that concern a single frame (unreadable image, extraction or
//! registration failure) are logged and the frame is dropped. Missing images
//! with downloads disabled, metadata problems and output write errors end
//! the run.

use std::ops::Range;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{info, warn};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use regex::Regex;

use shared::composite::{apply_crop, bounding_rect, group_by_interval, Canvas};
use shared::frame_store::{
    format_timestamp, FrameRecord, FrameStore, PageSource, TimeRange, OUTPUT_IMAGE_FORMAT,
};
use shared::image_proc::{extract_stars, load_gray_image, mean_brightness, Star};
use shared::stack_config::StackConfig;
use stack_math::{RigidTransform, SequenceRegistrar};

/// Which frames to stack and how to obtain them.
#[derive(Debug, Clone, Default)]
pub struct StackRequest {
    pub range: TimeRange,
    pub exposure: Option<Regex>,
    pub update_metadata: bool,
    pub download_missing: bool,
}

/// A frame's pixels together with its metadata.
#[derive(Debug, Clone)]
pub struct Frame {
    pub record: FrameRecord,
    pub pixels: Array2<u8>,
}

/// Frame counts per stage and the images written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackReport {
    pub selected: usize,
    pub loaded: usize,
    pub too_bright: usize,
    pub extracted: usize,
    pub registered: usize,
    pub groups: usize,
    pub outputs: Vec<PathBuf>,
}

struct PlacedFrame<'a> {
    frame: &'a Frame,
    transform: RigidTransform,
}

pub struct Stacker {
    config: StackConfig,
    store: FrameStore,
}

impl Stacker {
    pub fn new(config: StackConfig) -> Self {
        let store = FrameStore::new(config.store.data_dir.clone(), config.store.index.clone());
        Self { config, store }
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Run every stage, fetching through `source` where needed.
    pub fn run<S: PageSource + ?Sized>(
        &self,
        request: &StackRequest,
        source: &mut S,
    ) -> Result<StackReport> {
        let selected = self.select(request, source)?;
        let frames = self.load(&selected, request.download_missing, source)?;

        let mut report = self.stack(frames)?;
        report.selected = selected.len();
        Ok(report)
    }

    /// Populate the local cache for the requested frames without stacking.
    pub fn fetch<S: PageSource + ?Sized>(
        &self,
        request: &StackRequest,
        source: &mut S,
    ) -> Result<Vec<PathBuf>> {
        let selected = self.select(request, source)?;
        self.store
            .check_images(&selected, true, source)
            .context("failed to download frames")
    }

    /// Refresh metadata if requested, then list the matching records oldest first.
    pub fn select<S: PageSource + ?Sized>(
        &self,
        request: &StackRequest,
        source: &mut S,
    ) -> Result<Vec<FrameRecord>> {
        if request.update_metadata {
            let added = self
                .store
                .update_metadata(source)
                .context("failed to update frame metadata")?;
            info!("metadata update added {added} records");
        }

        self.store
            .list_metadata(&request.range, request.exposure.as_ref())
            .context("failed to list frame metadata")
    }

    /// Make sure every record is cached and load its pixels.
    ///
    /// Unreadable images are skipped with a warning; an image that is not
    /// cached while downloads are disabled is an error.
    pub fn load<S: PageSource + ?Sized>(
        &self,
        records: &[FrameRecord],
        download_missing: bool,
        source: &mut S,
    ) -> Result<Vec<Frame>> {
        let mut frames = Vec::with_capacity(records.len());

        for record in records {
            let path = self
                .store
                .ensure_local(record, download_missing, source)
                .with_context(|| format!("frame {} is unavailable", record.id()))?;

            match load_gray_image(&path) {
                Ok(pixels) => frames.push(Frame {
                    record: record.clone(),
                    pixels,
                }),
                Err(e) => warn!("skipping frame {}: {e}", record.id()),
            }
        }

        info!("loaded {} of {} frames", frames.len(), records.len());
        Ok(frames)
    }

    /// Register and composite already loaded frames, oldest first.
    pub fn stack(&self, frames: Vec<Frame>) -> Result<StackReport> {
        let mut report = StackReport {
            selected: frames.len(),
            loaded: frames.len(),
            ..Default::default()
        };

        let frames = self.admit_by_brightness(frames);
        report.too_bright = report.loaded - frames.len();

        let extracted = self.extract_all(&frames);
        report.extracted = extracted.len();

        let registered = self.register(&extracted);
        report.registered = registered.len();

        let timestamps: Vec<i64> = registered.iter().map(|r| r.frame.record.timestamp).collect();
        let groups = group_by_interval(&timestamps, self.config.stacking.max_frame_interval_secs);
        report.groups = groups.len();
        info!(
            "{} registered frames fall into {} groups",
            registered.len(),
            groups.len()
        );

        let outputs: Vec<Option<PathBuf>> = groups
            .into_par_iter()
            .map(|range| self.composite_group(&registered, range))
            .collect::<Result<_>>()?;
        report.outputs = outputs.into_iter().flatten().collect();

        Ok(report)
    }

    fn admit_by_brightness(&self, frames: Vec<Frame>) -> Vec<Frame> {
        let Some(limit) = self.config.stacking.max_brightness else {
            return frames;
        };

        frames
            .into_iter()
            .filter(|frame| {
                let brightness = mean_brightness(&frame.pixels.view());
                let admitted = brightness <= limit;
                if !admitted {
                    warn!(
                        "skipping frame {}: mean brightness {brightness:.1} exceeds {limit:.1}",
                        frame.record.id()
                    );
                }
                admitted
            })
            .collect()
    }

    fn extract_all<'a>(&self, frames: &'a [Frame]) -> Vec<(&'a Frame, Vec<Star>)> {
        let config = &self.config.extraction;

        let results: Vec<_> = frames
            .par_iter()
            .map(|frame| (frame, extract_stars(&frame.pixels.view(), config)))
            .collect();

        results
            .into_iter()
            .filter_map(|(frame, result)| match result {
                Ok(stars) => {
                    info!("frame {}: {} stars", frame.record.id(), stars.len());
                    Some((frame, stars))
                }
                Err(e) => {
                    warn!("skipping frame {}: {e}", frame.record.id());
                    None
                }
            })
            .collect()
    }

    fn register<'a>(&self, extracted: &[(&'a Frame, Vec<Star>)]) -> Vec<PlacedFrame<'a>> {
        let rng = match self.config.registration.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let registrar = SequenceRegistrar::new(self.config.registration.clone());

        registrar
            .outcomes(extracted.iter().map(|(_, stars)| stars.as_slice()), rng)
            .filter_map(|outcome| {
                let frame = extracted[outcome.index].0;
                match outcome.result {
                    Ok(registered) => Some(PlacedFrame {
                        frame,
                        transform: registered.transform,
                    }),
                    Err(e) => {
                        warn!("skipping frame {}: {e}", frame.record.id());
                        None
                    }
                }
            })
            .collect()
    }

    /// Composite one group and write it, named by the group's last frame.
    ///
    /// Returns `None` when the crop leaves nothing of the group.
    fn composite_group(
        &self,
        registered: &[PlacedFrame<'_>],
        range: Range<usize>,
    ) -> Result<Option<PathBuf>> {
        let group = &registered[range];
        let Some(last) = group.last() else {
            return Ok(None);
        };

        let rect = bounding_rect(group.iter().map(|r| (r.frame.pixels.view(), &r.transform)))?;
        let Some(rect) = apply_crop(&rect, self.config.stacking.crop.as_ref()) else {
            return Ok(None);
        };

        let mut canvas = Canvas::new(rect);
        for r in group {
            canvas.add_image(&r.frame.pixels.view(), &r.transform);
        }

        let name = format_timestamp(last.frame.record.timestamp, OUTPUT_IMAGE_FORMAT)?;
        let path = self.config.store.output_dir.join(name);
        info!(
            "writing {} frames over {} to {}",
            canvas.frames_added(),
            canvas.rect(),
            path.display()
        );
        canvas
            .flush(&path)
            .with_context(|| format!("failed to write stacked image {}", path.display()))?;

        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_helpers::flat_frame;

    fn frame(timestamp: i64, value: u8) -> Frame {
        Frame {
            record: FrameRecord::new(String::new(), timestamp, String::new()).unwrap(),
            pixels: flat_frame(8, 8, value),
        }
    }

    #[test]
    fn test_brightness_admission() {
        let frames = vec![frame(0, 10), frame(1, 60), frame(2, 50)];

        let mut config = StackConfig::default();
        let unlimited = Stacker::new(config.clone()).admit_by_brightness(frames.clone());
        assert_eq!(unlimited.len(), 3);

        config.stacking.max_brightness = Some(50.0);
        let admitted = Stacker::new(config).admit_by_brightness(frames);
        let times: Vec<_> = admitted.iter().map(|f| f.record.timestamp).collect();
        assert_eq!(times, vec![0, 2]);
    }

    #[test]
    fn test_blank_frames_produce_no_output() {
        let stacker = Stacker::new(StackConfig::default());

        let report = stacker.stack(vec![frame(0, 0), frame(1, 0)]).unwrap();

        assert_eq!(report.loaded, 2);
        assert_eq!(report.extracted, 0);
        assert_eq!(report.groups, 0);
        assert!(report.outputs.is_empty());
    }
}
