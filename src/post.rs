//! # Post processing
//!
//! Turns the frozen planes of both views into final disparity maps:
//!
//! - a left/right consistency check labels every pixel as valid, mismatched or occluded,
//! - invalid pixels adopt the plane of the nearest valid pixel on their row, preferring the one
//!   giving the smaller disparity, since occluded regions belong to the background,
//! - a weighted median filter, weighted by colour similarity in the reference image, removes the
//!   blocky look of the plane representation without blurring across colour edges.
//!
//! The final maps are clamped to the searched disparity range.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::debug;
use serde::Serialize;

use crate::cost::CostModel;
use crate::disparity::{DisparityMap, StereoDisparity};
use crate::params::{MedianScope, Params};
use crate::plane::DisparityPlane;
use crate::store::{extract_disparity, PlaneStore};
use crate::views::View;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Disparity given to invalid pixels on rows without a single valid pixel.
pub const FALLBACK_DISPARITY: f32 = 0.0;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    Valid,
    /// The other view disagrees about the disparity.
    Mismatch,
    /// The matching pixel lies outside the other view.
    Occluded
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Per-pixel consistency labels of one view.
#[derive(Debug, Clone, PartialEq)]
pub struct OcclusionMap {
    width: usize,
    height: usize,
    labels: Vec<Label>
}

#[derive(Debug, Clone, Copy)]
pub struct PostProcessor {
    pub consistency_threshold: f32,
    pub median_scope: MedianScope
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl OcclusionMap {
    pub fn from_vec(width: usize, height: usize, labels: Vec<Label>) -> Self {
        debug_assert_eq!(labels.len(), width * height, "label count must match dimensions");
        Self { width, height, labels }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Label {
        self.labels[y * self.width + x]
    }

    pub fn is_valid(&self, x: usize, y: usize) -> bool {
        self.get(x, y) == Label::Valid
    }

    pub fn count(&self, label: Label) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }
}

impl PostProcessor {
    pub fn from_params(params: &Params) -> Self {
        Self {
            consistency_threshold: params.consistency_threshold,
            median_scope: params.median_scope
        }
    }

    /// Produce the final maps and labels of both views from the optimised planes.
    pub fn run(&self, model: &CostModel, store: &PlaneStore) -> StereoDisparity {
        let raw_left = store.view(View::Left).extract();
        let raw_right = store.view(View::Right).extract();

        let left_labels =
            consistency_check(&raw_left, &raw_right, View::Left, self.consistency_threshold);
        let right_labels =
            consistency_check(&raw_right, &raw_left, View::Right, self.consistency_threshold);

        for (view, labels) in [(View::Left, &left_labels), (View::Right, &right_labels)] {
            debug!(
                "{:?} view: {} valid, {} mismatched, {} occluded",
                view,
                labels.count(Label::Valid),
                labels.count(Label::Mismatch),
                labels.count(Label::Occluded)
            );
        }

        let finish = |view: View, labels: &OcclusionMap| {
            let filled_planes = fill_occlusions(&store.view(view).planes(), labels);
            let filled = extract_disparity(model.width(), model.height(), &filled_planes);
            let mut smoothed = weighted_median(model, view, &filled, labels, self.median_scope);
            clamp_disparity(&mut smoothed, model.max_disparity());
            smoothed
        };

        StereoDisparity {
            left: finish(View::Left, &left_labels),
            right: finish(View::Right, &right_labels),
            left_labels,
            right_labels
        }
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Label each pixel of `reference` by comparing it with the disparity found at its match in
/// `other`.
///
/// Matches that fall outside the other view are `Occluded`, matches that disagree by more than
/// `threshold` are `Mismatch`.
pub fn consistency_check(
    reference: &DisparityMap,
    other: &DisparityMap,
    view: View,
    threshold: f32
) -> OcclusionMap {
    let (width, height) = (reference.width(), reference.height());
    let mut labels = Vec::with_capacity(width * height);

    for y in 0..height {
        for x in 0..width {
            let d = reference.get(x, y);
            let qx = (x as f32 + view.sign() * d).round();

            let label = if !(qx >= 0.0 && qx < width as f32) {
                Label::Occluded
            }
            else if (d - other.get(qx as usize, y)).abs() > threshold {
                Label::Mismatch
            }
            else {
                Label::Valid
            };

            labels.push(label);
        }
    }

    OcclusionMap::from_vec(width, height, labels)
}

/// Replace the plane of every invalid pixel by the plane of the nearest valid pixel on its row.
///
/// The nearest valid pixel on each side is found and the plane giving the smaller disparity at
/// the invalid pixel wins. Rows with no valid pixel get the constant
/// [`FALLBACK_DISPARITY`] plane.
pub fn fill_occlusions(planes: &[DisparityPlane], labels: &OcclusionMap) -> Vec<DisparityPlane> {
    let width = labels.width();
    let mut filled = planes.to_vec();

    for y in 0..labels.height() {
        let row = y * width;

        for x in 0..width {
            if labels.is_valid(x, y) {
                continue;
            }

            let (fx, fy) = (x as f32, y as f32);
            let left = (0..x).rev().find(|&i| labels.is_valid(i, y));
            let right = (x + 1..width).find(|&i| labels.is_valid(i, y));

            filled[row + x] = match (left, right) {
                (Some(l), Some(r)) => {
                    let pl = planes[row + l];
                    let pr = planes[row + r];
                    if pl.evaluate(fx, fy) <= pr.evaluate(fx, fy) {
                        pl
                    }
                    else {
                        pr
                    }
                }
                (Some(l), None) => planes[row + l],
                (None, Some(r)) => planes[row + r],
                (None, None) => DisparityPlane::constant(FALLBACK_DISPARITY)
            };
        }
    }

    filled
}

/// Weighted median of the valid disparities in the window around each pixel.
///
/// Weights are the adaptive support weights of the reference view. Pixels whose window holds no
/// valid pixel keep their value.
pub fn weighted_median(
    model: &CostModel,
    view: View,
    map: &DisparityMap,
    labels: &OcclusionMap,
    scope: MedianScope
) -> DisparityMap {
    let reference = model.view(view);
    let (width, height) = (map.width(), map.height());
    let r = model.winsize();

    let side = r.saturating_mul(2).saturating_add(1);
    let mut out = map.clone();
    let mut samples: Vec<(f32, f32)> = Vec::with_capacity(side.min(width) * side.min(height));

    for y in 0..height {
        for x in 0..width {
            if scope == MedianScope::Invalid && labels.is_valid(x, y) {
                continue;
            }

            let centre = reference.color(x, y);
            samples.clear();

            for qy in y.saturating_sub(r)..=y.saturating_add(r).min(height - 1) {
                for qx in x.saturating_sub(r)..=x.saturating_add(r).min(width - 1) {
                    if labels.is_valid(qx, qy) {
                        let w = model.support_weight(&centre, &reference.color(qx, qy));
                        samples.push((map.get(qx, qy), w));
                    }
                }
            }

            if let Some(d) = median_of(&mut samples) {
                out.put(x, y, d);
            }
        }
    }

    out.update_range();
    out
}

/// Clamp every value of `map` into `[0, max_disparity]`.
///
/// A plane that is valid at its own pixel can still dip slightly outside the searched range at
/// neighbouring pixels it was propagated or filled into.
pub fn clamp_disparity(map: &mut DisparityMap, max_disparity: f32) {
    for y in 0..map.height() {
        for x in 0..map.width() {
            let d = map.get(x, y);
            map.put(x, y, d.max(0.0).min(max_disparity));
        }
    }

    map.update_range();
}

/// Value at which the cumulative weight of the sorted samples reaches half the total.
fn median_of(samples: &mut [(f32, f32)]) -> Option<f32> {
    let total: f32 = samples.iter().map(|s| s.1).sum();
    if samples.is_empty() || !(total > 0.0) {
        return None;
    }

    samples.sort_by(|a, b| a.0.total_cmp(&b.0));

    let half = total / 2.0;
    let mut acc = 0.0;
    for &(d, w) in samples.iter() {
        acc += w;
        if acc >= half {
            return Some(d);
        }
    }

    samples.last().map(|s| s.0)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
