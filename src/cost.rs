//! # Matching cost
//!
//! Adaptive support weight cost of a disparity plane over a square window. For every window pixel
//! `q` around the centre `p` the plane gives a (generally sub-pixel) disparity, the matching point
//! in the other view is sampled, and truncated colour and gradient differences are blended. Each
//! contribution is weighted by `exp(-|I_p - I_q| / gamma)` so that pixels which look like the
//! centre, and therefore probably lie on the same surface, dominate the sum.
//!
//! The cost is total: any plane, however wild, evaluates to a finite value in
//! `[0, max_cost()]`.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::params::Params;
use crate::plane::DisparityPlane;
use crate::views::{color_distance, StereoViews, View, ViewImage};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

pub struct CostModel {
    views: StereoViews,
    alpha: f32,
    gamma: f32,
    tau_c: f32,
    tau_g: f32,
    winsize: usize,
    max_disparity: f32
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl CostModel {
    pub fn new(views: StereoViews, params: &Params) -> Self {
        Self {
            views,
            alpha: params.alpha,
            gamma: params.gamma,
            tau_c: params.tau_c,
            tau_g: params.tau_g,
            winsize: params.winsize,
            max_disparity: params.max_disparity as f32
        }
    }

    pub fn view(&self, view: View) -> &ViewImage {
        self.views.view(view)
    }

    pub fn width(&self) -> usize {
        self.views.width()
    }

    pub fn height(&self) -> usize {
        self.views.height()
    }

    pub fn winsize(&self) -> usize {
        self.winsize
    }

    pub fn max_disparity(&self) -> f32 {
        self.max_disparity
    }

    /// Cost assigned to a window pixel that cannot be matched at all.
    pub fn max_cost(&self) -> f32 {
        (1.0 - self.alpha) * self.tau_c + self.alpha * self.tau_g
    }

    /// Adaptive support weight between two colours of the reference view.
    #[inline]
    pub fn support_weight(&self, p: &[f32; 3], q: &[f32; 3]) -> f32 {
        (-color_distance(p, q) / self.gamma).exp()
    }

    /// Truncated, blended colour and gradient difference.
    #[inline]
    pub fn dissimilarity(
        &self,
        c1: &[f32; 3],
        c2: &[f32; 3],
        g1: &[f32; 2],
        g2: &[f32; 2]
    ) -> f32 {
        let cost_c = color_distance(c1, c2).min(self.tau_c);
        let cost_g = ((g1[0] - g2[0]).abs() + (g1[1] - g2[1]).abs()).min(self.tau_g);

        (1.0 - self.alpha) * cost_c + self.alpha * cost_g
    }

    /// Aggregated cost of `plane` for pixel `(x, y)` of `view`.
    ///
    /// Window pixels outside the reference image are skipped. Window pixels whose disparity is
    /// outside `[0, max_disparity]`, or whose match falls outside the other view, take
    /// [`max_cost`](Self::max_cost). The result is normalised by the total support weight.
    pub fn plane_cost(&self, view: View, x: usize, y: usize, plane: &DisparityPlane) -> f32 {
        let reference = self.views.view(view);
        let other = self.views.view(view.other());
        let sign = view.sign();
        let max_cost = self.max_cost();

        let x_lo = x.saturating_sub(self.winsize);
        let x_hi = x.saturating_add(self.winsize).min(reference.width() - 1);
        let y_lo = y.saturating_sub(self.winsize);
        let y_hi = y.saturating_add(self.winsize).min(reference.height() - 1);

        let centre = reference.color(x, y);

        let mut total = 0.0f32;
        let mut weight_sum = 0.0f32;

        for qy in y_lo..=y_hi {
            for qx in x_lo..=x_hi {
                let colour = reference.color(qx, qy);
                let weight = self.support_weight(&centre, &colour);

                let d = plane.evaluate(qx as f32, qy as f32);

                let cost = if !(d >= 0.0 && d <= self.max_disparity) {
                    max_cost
                }
                else {
                    match other.sample_row(qx as f32 + sign * d, qy) {
                        Some((match_colour, match_grad)) => self.dissimilarity(
                            &colour,
                            &match_colour,
                            &reference.gradient(qx, qy),
                            &match_grad
                        ),
                        None => max_cost
                    }
                };

                total += weight * cost;
                weight_sum += weight;
            }
        }

        // The centre pixel always carries weight 1, so the sum is never zero
        total / weight_sum
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
