//! # PatchMatch Stereo
//!
//! This crate provides dense disparity estimation for rectified stereo pairs using PatchMatch
//! stereo: slanted disparity planes per pixel, optimised by randomised spatial and view
//! propagation with plane refinement, followed by consistency checking, occlusion filling and
//! weighted median filtering.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod cost;
mod disparity;
mod error;
pub mod optimizer;
pub mod params;
pub mod patchmatch;
pub mod plane;
pub mod post;
pub mod store;
pub mod views;
mod wavefront;

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use crate::error::{Error, Result};

pub mod prelude {
    pub use crate::disparity::{
        DisparityAlgorithm, DisparityMap, GrayFloatImage, StereoDisparity, StereoFrame
    };
    pub use crate::error::{Error, Result};
    pub use crate::params::{MedianScope, Params, Schedule};
    pub use crate::patchmatch::PatchMatch;
    pub use crate::post::{Label, OcclusionMap};
    pub use crate::views::View;
}
