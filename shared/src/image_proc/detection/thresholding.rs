//! Image segmentation for star extraction on 8-bit frames.
//!
//! # Key Algorithms
//!
//! ## Histogram threshold
//! Picks the lowest grey level such that only a small fraction of the frame
//! is brighter than it. Star fields are mostly dark sky, so this adapts to
//! the sky background without assuming a bimodal histogram.
//!
//! ## Dilation
//! Square-window binary dilation merges fragments of the same star (saturated
//! cores, diffraction spikes) into one region.
//!
//! ## Connected Components
//! Two-pass connected component labeling with union-find optimization.
//! Uses 8-connectivity so diagonally touching pixels belong to one object.

use ndarray::{Array2, ArrayView2};

/// Lowest level `thr` such that fewer than `fraction` of all pixels are
/// strictly brighter than `thr`.
///
/// # Arguments
/// * `image` - 8-bit grayscale frame
/// * `fraction` - Target foreground fraction in (0, 1]
///
/// # Returns
/// * `Some(level)` - Threshold level in 0..=255
/// * `None` - No level qualifies (the frame is too bright)
pub fn histogram_threshold(image: &ArrayView2<u8>, fraction: f64) -> Option<u8> {
    let mut histogram = [0usize; 256];
    for &pixel in image.iter() {
        histogram[pixel as usize] += 1;
    }

    let limit = image.len() as f64 * fraction;

    // Pixels brighter than the current level, updated from the top down
    let mut brighter: usize = image.len();
    for (level, &count) in histogram.iter().enumerate() {
        brighter -= count;
        if (brighter as f64) < limit {
            return Some(level as u8);
        }
    }
    None
}

/// Apply binary threshold to create a segmentation mask.
///
/// # Returns
/// Boolean mask, `true` for pixels strictly greater than `threshold`
pub fn apply_threshold(image: &ArrayView2<u8>, threshold: u8) -> Array2<bool> {
    image.mapv(|pixel| pixel > threshold)
}

/// Binary dilation with a `size` x `size` square structuring element.
///
/// The element is anchored at its centre (for even sizes, the centre rounds
/// down). Implemented as two separable 1-D passes.
pub fn dilate(mask: &ArrayView2<bool>, size: usize) -> Array2<bool> {
    if size <= 1 {
        return mask.to_owned();
    }

    let (height, width) = mask.dim();
    let before = size / 2;
    let after = size - 1 - before;

    // Horizontal pass
    let mut horizontal = Array2::from_elem((height, width), false);
    for row in 0..height {
        for col in 0..width {
            let lo = col.saturating_sub(after);
            let hi = (col + before).min(width - 1);
            horizontal[[row, col]] = (lo..=hi).any(|c| mask[[row, c]]);
        }
    }

    // Vertical pass
    let mut dilated = Array2::from_elem((height, width), false);
    for row in 0..height {
        let lo = row.saturating_sub(after);
        let hi = (row + before).min(height - 1);
        for col in 0..width {
            dilated[[row, col]] = (lo..=hi).any(|r| horizontal[[r, col]]);
        }
    }

    dilated
}

/// Find the root label in a disjoint-set (union-find) data structure
fn find_root(labels: &mut [usize], label: usize) -> usize {
    let mut current = label;

    while current != labels[current] {
        // Path compression - make the parent point to the grandparent
        labels[current] = labels[labels[current]];
        current = labels[current];
    }

    current
}

/// Union two labels, keeping the smaller root as the parent.
fn union_labels(labels: &mut [usize], label1: usize, label2: usize) {
    let root1 = find_root(labels, label1);
    let root2 = find_root(labels, label2);

    if root1 < root2 {
        labels[root2] = root1;
    } else if root2 < root1 {
        labels[root1] = root2;
    }
}

/// Connected component labeling using a two-pass algorithm with union-find.
///
/// # Connectivity
/// Uses 8-connectivity: the up-left, up, up-right and left neighbours are
/// examined during the first pass.
///
/// # Returns
/// Labeled image where:
/// - Background pixels = 0
/// - Each connected object gets unique label starting from 1
/// - Labels are consecutive integers in raster-scan order of first appearance
pub fn connected_components(mask: &ArrayView2<bool>) -> Array2<usize> {
    let (height, width) = mask.dim();
    let mut labels = Array2::zeros((height, width));
    let mut label_count = 0;

    // Label 0 is background
    let mut parent_table = vec![0];

    for i in 0..height {
        for j in 0..width {
            if !mask[[i, j]] {
                continue;
            }

            let mut neighbors = [0usize; 4];
            if i > 0 {
                if j > 0 {
                    neighbors[0] = labels[[i - 1, j - 1]];
                }
                neighbors[1] = labels[[i - 1, j]];
                if j + 1 < width {
                    neighbors[2] = labels[[i - 1, j + 1]];
                }
            }
            if j > 0 {
                neighbors[3] = labels[[i, j - 1]];
            }

            match neighbors.iter().copied().filter(|&l| l > 0).min() {
                None => {
                    label_count += 1;
                    labels[[i, j]] = label_count;
                    parent_table.push(label_count);
                }
                Some(min_label) => {
                    labels[[i, j]] = min_label;
                    for &neighbor in neighbors.iter().filter(|&&l| l > 0 && l != min_label) {
                        union_labels(&mut parent_table, min_label, neighbor);
                    }
                }
            }
        }
    }

    // Flatten the parent table
    for i in 1..parent_table.len() {
        find_root(&mut parent_table, i);
    }

    // Map roots to consecutive labels
    let mut relabel_map = vec![0; parent_table.len()];
    let mut next_label = 1;
    for i in 1..parent_table.len() {
        let root = parent_table[i];
        if relabel_map[root] == 0 {
            relabel_map[root] = next_label;
            next_label += 1;
        }
        relabel_map[i] = relabel_map[root];
    }

    labels.mapv_inplace(|l| relabel_map[l]);
    labels
}

/// Pixel count of each labeled component; index `i` holds label `i + 1`.
pub fn component_sizes(labels: &ArrayView2<usize>) -> Vec<usize> {
    let max_label = labels.iter().copied().max().unwrap_or(0);
    let mut sizes = vec![0; max_label];
    for &label in labels.iter().filter(|&&l| l > 0) {
        sizes[label - 1] += 1;
    }
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_histogram_threshold_dark_frame() {
        let mut image = Array2::<u8>::zeros((10, 10));
        image[[2, 2]] = 200;
        image[[7, 7]] = 100;

        // 2 of 100 pixels bright; fraction 0.025 allows fewer than 2.5
        assert_eq!(histogram_threshold(&image.view(), 0.025), Some(0));
        // fraction 0.015 allows fewer than 1.5: only one may remain above
        assert_eq!(histogram_threshold(&image.view(), 0.015), Some(100));
    }

    #[test]
    fn test_histogram_threshold_too_bright() {
        // No level leaves fewer than 0 pixels brighter
        let image = Array2::<u8>::from_elem((4, 4), 255);
        assert_eq!(histogram_threshold(&image.view(), 0.0), None);
        // Every pixel at 255 still allows the top level
        assert_eq!(histogram_threshold(&image.view(), 0.5), Some(255));
    }

    #[test]
    fn test_apply_threshold_is_strict() {
        let image = array![[1u8, 5, 6], [0, 9, 5]];
        let mask = apply_threshold(&image.view(), 5);
        assert_eq!(mask, array![[false, false, true], [false, true, false]]);
    }

    #[test]
    fn test_dilate_square() {
        let mut mask = Array2::from_elem((7, 7), false);
        mask[[3, 3]] = true;

        let dilated = dilate(&mask.view(), 3);

        assert_eq!(dilated.iter().filter(|&&v| v).count(), 9);
        assert!(dilated[[2, 2]] && dilated[[4, 4]]);
        assert!(!dilated[[1, 3]]);
    }

    #[test]
    fn test_dilate_clips_at_edges() {
        let mut mask = Array2::from_elem((5, 5), false);
        mask[[0, 0]] = true;
        let dilated = dilate(&mask.view(), 5);
        assert_eq!(dilated.iter().filter(|&&v| v).count(), 9);
    }

    #[test]
    fn test_connected_components_eight_connectivity() {
        let mask = array![
            [true, false, false, true],
            [false, true, false, true],
            [false, false, false, false],
            [true, true, false, false],
        ];

        let labels = connected_components(&mask.view());

        // Diagonal pair forms one object
        assert_eq!(labels[[0, 0]], labels[[1, 1]]);
        assert_eq!(labels[[0, 3]], labels[[1, 3]]);
        assert_ne!(labels[[0, 0]], labels[[0, 3]]);
        assert_eq!(labels.iter().copied().max(), Some(3));
        assert_eq!(component_sizes(&labels.view()), vec![2, 2, 2]);
    }

    #[test]
    fn test_connected_components_u_shape_merges() {
        // Two arms only joined at the bottom: requires label equivalence
        let mask = array![
            [true, false, true],
            [true, false, true],
            [true, true, true],
        ];
        let labels = connected_components(&mask.view());
        assert!(labels.iter().all(|&l| l <= 1));
        assert_eq!(component_sizes(&labels.view()), vec![7]);
    }
}
