//! Splitting a time-ordered frame sequence into output groups.

use std::ops::Range;

use log::warn;

use super::rect::BoundingRect;

/// Default maximum gap between consecutive frames of one group: 4 hours.
pub const DEFAULT_MAX_FRAME_INTERVAL_SECS: i64 = 4 * 60 * 60;

/// Split ascending `timestamps` (epoch seconds) into index ranges.
///
/// A new group starts wherever a timestamp exceeds its predecessor by more
/// than `max_interval`. Ranges are contiguous, non-empty and cover the whole
/// input in order.
pub fn group_by_interval(timestamps: &[i64], max_interval: i64) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    if timestamps.is_empty() {
        return groups;
    }

    let mut start = 0;
    for (i, pair) in timestamps.windows(2).enumerate() {
        if pair[1] - pair[0] > max_interval {
            groups.push(start..i + 1);
            start = i + 1;
        }
    }
    groups.push(start..timestamps.len());
    groups
}

/// Restrict a group's rectangle to a user crop given in reference coordinates.
///
/// Returns `None` (after logging) when the crop does not overlap the group.
pub fn apply_crop(rect: &BoundingRect, crop: Option<&BoundingRect>) -> Option<BoundingRect> {
    let Some(crop) = crop else {
        return Some(*rect);
    };

    let cropped = rect.intersect(crop);
    if cropped.is_none() {
        warn!("crop {} does not overlap group area {}; skipping", crop, rect);
    }
    cropped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(group_by_interval(&[], 10).is_empty());
    }

    #[test]
    fn test_single_group() {
        assert_eq!(group_by_interval(&[0, 5, 10, 15], 5), vec![0..4]);
    }

    #[test]
    fn test_split_on_gap() {
        let times = [0, 100, 200, 20_000, 20_050, 60_000];
        assert_eq!(
            group_by_interval(&times, DEFAULT_MAX_FRAME_INTERVAL_SECS),
            vec![0..3, 3..5, 5..6]
        );
    }

    #[test]
    fn test_gap_equal_to_interval_stays_together() {
        assert_eq!(group_by_interval(&[0, 10, 20], 10), vec![0..3]);
        assert_eq!(group_by_interval(&[0, 11], 10), vec![0..1, 1..2]);
    }

    #[test]
    fn test_apply_crop() {
        let rect = BoundingRect::new(-10.0, -10.0, 100.0, 80.0);

        assert_eq!(apply_crop(&rect, None), Some(rect));

        let crop = BoundingRect::new(0.0, 0.0, 50.0, 50.0);
        assert_eq!(apply_crop(&rect, Some(&crop)), Some(crop));

        let outside = BoundingRect::new(500.0, 500.0, 10.0, 10.0);
        assert_eq!(apply_crop(&rect, Some(&outside)), None);
    }
}
