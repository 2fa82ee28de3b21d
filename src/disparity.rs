//! # General disparity objects
//!
//! This module provides the stereo input frame, the floating point disparity map and the generic
//! disparity algorithm trait.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage};
use crate::error::*;
use crate::post::OcclusionMap;

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Single channel floating point image backing a [`DisparityMap`].
pub type GrayFloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A rectified stereo pair of 8-bit RGB images.
pub struct StereoFrame {
    pub left: RgbImage,
    pub right: RgbImage
}

/// A generic floating point disparity map.
#[derive(Clone, Debug)]
pub struct DisparityMap {
    data: GrayFloatImage,
    pub max_disp: Option<f32>,
    pub min_disp: Option<f32>
}

/// Result of running a two-view algorithm: one map and one labelling per input view.
#[derive(Clone, Debug)]
pub struct StereoDisparity {
    pub left: DisparityMap,
    pub right: DisparityMap,
    pub left_labels: OcclusionMap,
    pub right_labels: OcclusionMap
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait DisparityAlgorithm {
    /// Compute the disparity maps of the given stereo frame.
    fn compute(&mut self, frame: &StereoFrame) -> Result<StereoDisparity>;
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl StereoFrame {
    pub fn new(left: RgbImage, right: RgbImage) -> Self {
        Self { left, right }
    }

    /// Build a frame from any pair of decoded images, converting them to 8-bit RGB.
    pub fn from_dynamic(left: &DynamicImage, right: &DynamicImage) -> Self {
        Self {
            left: left.to_rgb(),
            right: right.to_rgb()
        }
    }

    /// Build a frame from two interleaved 8-bit RGB buffers handed over by a host.
    pub fn from_raw(width: u32, height: u32, left: Vec<u8>, right: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;

        // `from_raw` accepts oversized buffers, so the length is checked exactly first
        let to_image = |buf: Vec<u8>| {
            let actual = buf.len();
            if actual != expected {
                return Err(Error::BufferLength { expected, actual });
            }
            RgbImage::from_raw(width, height, buf)
                .ok_or(Error::BufferLength { expected, actual })
        };

        Ok(Self {
            left: to_image(left)?,
            right: to_image(right)?
        })
    }

    pub fn width(&self) -> u32 {
        self.left.width()
    }

    pub fn height(&self) -> u32 {
        self.left.height()
    }
}

impl DisparityMap {
    pub fn new(width: usize, height: usize) -> Self {
        DisparityMap {
            data: GrayFloatImage::new(width as u32, height as u32),
            min_disp: None,
            max_disp: None
        }
    }

    /// Build a map from row-major values, recording the observed disparity range.
    pub fn from_vec(width: usize, height: usize, values: Vec<f32>) -> Self {
        let mut map = Self::new(width, height);

        for (idx, val) in values.into_iter().enumerate() {
            map.put(idx % width, idx / width, val);
        }

        map.update_range();
        map
    }

    pub fn width(&self) -> usize {
        self.data.width() as usize
    }

    pub fn height(&self) -> usize {
        self.data.height() as usize
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data.get_pixel(x as u32, y as u32)[0]
    }

    pub fn put(&mut self, x: usize, y: usize, val: f32) {
        self.data.put_pixel(x as u32, y as u32, Luma([val]))
    }

    /// Row-major disparity values.
    pub fn as_raw(&self) -> &[f32] {
        self.data.as_raw()
    }

    /// Recompute `min_disp` and `max_disp` from the finite values in the map.
    pub fn update_range(&mut self) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;

        for &val in self.data.as_raw().iter().filter(|v| v.is_finite()) {
            min = min.min(val);
            max = max.max(val);
        }

        if min <= max {
            self.min_disp = Some(min);
            self.max_disp = Some(max);
        }
        else {
            self.min_disp = None;
            self.max_disp = None;
        }
    }

    /// Converts the image into a dynamic Luma8 image.
    pub fn to_luma(&self) -> GrayImage {

        let mut new = image::GrayImage::new(
            self.data.width(),
            self.data.height()
        );

        for y in 0..new.height() {
            for x in 0..new.width() {
                let val = self.get(x as usize, y as usize).max(0.0).min(255.0);

                *new.get_pixel_mut(x, y) = image::Luma([val as u8]);
            }
        }

        new
    }

    /// Converts the image to a normalised GrayImage.
    ///
    /// Normalises by the maximum observed disparity in the map. If the maximum disparity is not
    /// set (or is not positive) then the function is equivalent to `.to_luma()`.
    pub fn to_luma_normalised(&self) -> GrayImage {

        let mut new = image::GrayImage::new(
            self.data.width(),
            self.data.height()
        );

        let mult = match self.max_disp {
            Some(d) if d > 0.0 => 255.0 / d,
            _ => 1.0
        };

        for y in 0..new.height() {
            for x in 0..new.width() {
                let val = (self.get(x as usize, y as usize) * mult).max(0.0).min(255.0);

                *new.get_pixel_mut(x, y) = image::Luma([val as u8]);
            }
        }

        new
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
