//! # PatchMatch parameters
//!
//! The configuration block accepted by [`PatchMatch`](crate::patchmatch::PatchMatch). The seven
//! algorithm fields are required, everything else has a default. Parameters are validated
//! eagerly, before any image is touched, and every failure names the offending field.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::Deserialize;
use std::path::Path;

use crate::error::*;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Params {
    /// Blend between the colour term (`1 - alpha`) and the gradient term (`alpha`).
    pub alpha: f32,

    /// Falloff of the adaptive support weight with colour distance.
    pub gamma: f32,

    /// Truncation of the colour difference term.
    pub tau_c: f32,

    /// Truncation of the gradient difference term.
    pub tau_g: f32,

    /// Half size of the square support window.
    pub winsize: usize,

    /// Largest disparity a plane may produce.
    pub max_disparity: usize,

    /// Number of full sweeps over both views.
    pub niters: usize,

    /// Fixed seed for the random source. When absent the OS entropy source is used.
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub schedule: Schedule,

    /// Bound on the slant coefficients of randomly initialised planes.
    #[serde(default = "default_max_init_slant")]
    pub max_init_slant: f32,

    /// Refinement stops once the disparity perturbation range drops below this.
    #[serde(default = "default_min_refine_step")]
    pub min_refine_step: f32,

    /// Starting range for normal perturbations during refinement.
    #[serde(default = "default_max_refine_normal")]
    pub max_refine_normal: f32,

    /// Largest left/right disagreement (px) still considered consistent.
    #[serde(default = "default_consistency_threshold")]
    pub consistency_threshold: f32,

    #[serde(default)]
    pub median_scope: MedianScope
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Order in which the optimiser visits pixels.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    /// Serpentine scan, one pixel at a time, view propagation straight after each pixel.
    Sequential,

    /// Spatial propagation one anti-diagonal at a time with the pixels of a diagonal in
    /// parallel, then refinement of all pixels in parallel, then view propagation. Both views
    /// run concurrently in the first two phases.
    Wavefront
}

/// Which pixels the weighted median filter is applied to.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MedianScope {
    All,
    Invalid
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for Schedule {
    fn default() -> Self {
        Schedule::Sequential
    }
}

impl Default for MedianScope {
    fn default() -> Self {
        MedianScope::All
    }
}

impl Params {
    /// Build a parameter block from the required fields, using defaults for the rest.
    pub fn new(
        alpha: f32,
        gamma: f32,
        tau_c: f32,
        tau_g: f32,
        winsize: usize,
        max_disparity: usize,
        niters: usize
    ) -> Self {
        Self {
            alpha,
            gamma,
            tau_c,
            tau_g,
            winsize,
            max_disparity,
            niters,
            seed: None,
            schedule: Schedule::default(),
            max_init_slant: default_max_init_slant(),
            min_refine_step: default_min_refine_step(),
            max_refine_normal: default_max_refine_normal(),
            consistency_threshold: default_consistency_threshold(),
            median_scope: MedianScope::default()
        }
    }

    /// Parse and validate a JSON parameter block.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: Params = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Read, parse and validate a JSON parameter file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Check every field, reporting the first one that is out of range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return invalid("alpha", format!("must lie in [0, 1], got {}", self.alpha));
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return invalid("gamma", format!("must be positive, got {}", self.gamma));
        }
        if !(self.tau_c.is_finite() && self.tau_c >= 0.0) {
            return invalid("tau_c", format!("must be non-negative, got {}", self.tau_c));
        }
        if !(self.tau_g.is_finite() && self.tau_g >= 0.0) {
            return invalid("tau_g", format!("must be non-negative, got {}", self.tau_g));
        }
        if self.winsize == 0 {
            return invalid("winsize", "must be a positive integer".into());
        }
        if self.max_disparity == 0 {
            return invalid("max_disparity", "must be a positive integer".into());
        }
        if self.niters == 0 {
            return invalid("niters", "must be a positive integer".into());
        }
        if !(self.max_init_slant.is_finite() && self.max_init_slant >= 0.0) {
            return invalid(
                "max_init_slant",
                format!("must be non-negative, got {}", self.max_init_slant)
            );
        }
        if !(self.min_refine_step.is_finite() && self.min_refine_step > 0.0) {
            return invalid(
                "min_refine_step",
                format!("must be positive, got {}", self.min_refine_step)
            );
        }
        if !(self.max_refine_normal.is_finite() && self.max_refine_normal >= 0.0) {
            return invalid(
                "max_refine_normal",
                format!("must be non-negative, got {}", self.max_refine_normal)
            );
        }
        if !(self.consistency_threshold.is_finite() && self.consistency_threshold >= 0.0) {
            return invalid(
                "consistency_threshold",
                format!("must be non-negative, got {}", self.consistency_threshold)
            );
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn invalid(field: &'static str, reason: String) -> Result<()> {
    Err(Error::InvalidParam { field, reason })
}

fn default_max_init_slant() -> f32 {
    0.5
}

fn default_min_refine_step() -> f32 {
    0.1
}

fn default_max_refine_normal() -> f32 {
    1.0
}

fn default_consistency_threshold() -> f32 {
    1.0
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
