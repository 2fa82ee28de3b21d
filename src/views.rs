//! # Stereo views
//!
//! Converts the two input images into the per-pixel colour and gradient fields the matcher works
//! on. Both fields are computed once and never modified afterwards.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::RgbImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::disparity::StereoFrame;
use crate::error::*;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Sum of the absolute positive weights of the 3x3 Sobel kernel, used to bring responses back to
/// intensity units per pixel.
const SOBEL_NORM: f32 = 8.0;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// One of the two cameras of the rectified pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Left,
    Right
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Colour and gradient fields of a single view.
#[derive(Debug, Clone)]
pub struct ViewImage {
    width: usize,
    height: usize,
    color: Vec<[f32; 3]>,
    gradient: Vec<[f32; 2]>
}

/// The pair of views of one stereo frame.
#[derive(Debug, Clone)]
pub struct StereoViews {
    left: ViewImage,
    right: ViewImage
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl View {
    pub const BOTH: [View; 2] = [View::Left, View::Right];

    pub fn other(self) -> View {
        match self {
            View::Left => View::Right,
            View::Right => View::Left
        }
    }

    /// Direction in which a positive disparity moves a pixel into the other view.
    ///
    /// Left pixel `x` corresponds to right pixel `x - d`, right pixel `x` to left pixel `x + d`.
    pub fn sign(self) -> f32 {
        match self {
            View::Left => -1.0,
            View::Right => 1.0
        }
    }
}

impl ViewImage {
    /// Build the colour and gradient fields of an RGB image.
    ///
    /// Gradients are 3x3 Sobel responses of the luminance image with edge pixels replicated.
    pub fn from_rgb(img: &RgbImage) -> Self {
        let width = img.width() as usize;
        let height = img.height() as usize;

        let color = img
            .pixels()
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();

        let gray = image::imageops::grayscale(img);
        let gx = horizontal_sobel(&gray);
        let gy = vertical_sobel(&gray);

        let gradient = gx
            .pixels()
            .zip(gy.pixels())
            .map(|(x, y)| [x[0] as f32 / SOBEL_NORM, y[0] as f32 / SOBEL_NORM])
            .collect();

        Self {
            width,
            height,
            color,
            gradient
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn color(&self, x: usize, y: usize) -> [f32; 3] {
        self.color[y * self.width + x]
    }

    pub fn gradient(&self, x: usize, y: usize) -> [f32; 2] {
        self.gradient[y * self.width + x]
    }

    /// Sample colour and gradient at a sub-pixel position along row `y`.
    ///
    /// Rows are rectified so only the horizontal coordinate is interpolated. Returns `None` when
    /// `x` falls outside `[0, width - 1]` or is not finite.
    pub fn sample_row(&self, x: f32, y: usize) -> Option<([f32; 3], [f32; 2])> {
        let last = (self.width - 1) as f32;
        if !(x >= 0.0 && x <= last) {
            return None;
        }

        let x0 = x.floor() as usize;
        let frac = x - x0 as f32;
        let x1 = (x0 + 1).min(self.width - 1);

        let c0 = self.color(x0, y);
        let c1 = self.color(x1, y);
        let g0 = self.gradient(x0, y);
        let g1 = self.gradient(x1, y);

        let lerp = |a: f32, b: f32| a + frac * (b - a);

        Some((
            [lerp(c0[0], c1[0]), lerp(c0[1], c1[1]), lerp(c0[2], c1[2])],
            [lerp(g0[0], g1[0]), lerp(g0[1], g1[1])]
        ))
    }
}

impl StereoViews {
    /// Adapt a stereo frame, rejecting pairs whose dimensions differ before anything is
    /// allocated.
    pub fn new(frame: &StereoFrame) -> Result<Self> {
        let left = frame.left.dimensions();
        let right = frame.right.dimensions();

        if left != right {
            return Err(Error::ShapeMismatch { left, right });
        }
        if left.0 == 0 || left.1 == 0 {
            return Err(Error::EmptyImage);
        }

        Ok(Self {
            left: ViewImage::from_rgb(&frame.left),
            right: ViewImage::from_rgb(&frame.right)
        })
    }

    pub fn view(&self, view: View) -> &ViewImage {
        match view {
            View::Left => &self.left,
            View::Right => &self.right
        }
    }

    pub fn width(&self) -> usize {
        self.left.width
    }

    pub fn height(&self) -> usize {
        self.left.height
    }
}

/// L1 distance between two colours.
pub fn color_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (a[0] - b[0]).abs() + (a[1] - b[1]).abs() + (a[2] - b[2]).abs()
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn ramp(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            let v = (x * 10) as u8;
            Rgb([v, v, v])
        })
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let frame = StereoFrame::new(ramp(8, 4), ramp(7, 4));
        match StereoViews::new(&frame) {
            Err(Error::ShapeMismatch { left, right }) => {
                assert_eq!(left, (8, 4));
                assert_eq!(right, (7, 4));
            }
            other => panic!("expected shape mismatch, got {:?}", other.map(|_| ()))
        }
    }

    #[test]
    fn rejects_empty_images() {
        let frame = StereoFrame::new(RgbImage::new(0, 3), RgbImage::new(0, 3));
        assert!(matches!(StereoViews::new(&frame), Err(Error::EmptyImage)));
    }

    #[test]
    fn ramp_gradient_is_constant_and_border_safe() {
        let view = ViewImage::from_rgb(&ramp(8, 4));

        // Interior pixels see the full slope of 10 per pixel
        assert!((view.gradient(3, 2)[0] - 10.0).abs() < 1e-4);
        assert!(view.gradient(3, 2)[1].abs() < 1e-4);

        // Replicated borders halve the response instead of spiking
        let edge = view.gradient(0, 0)[0];
        assert!(edge > 0.0 && edge <= 10.0, "edge gradient {}", edge);
    }

    #[test]
    fn samples_rows_linearly() {
        let view = ViewImage::from_rgb(&ramp(8, 4));

        let (c, _) = view.sample_row(2.25, 1).unwrap();
        assert!((c[0] - 22.5).abs() < 1e-4);

        let (c, _) = view.sample_row(7.0, 1).unwrap();
        assert!((c[0] - 70.0).abs() < 1e-4);

        assert!(view.sample_row(-0.01, 1).is_none());
        assert!(view.sample_row(7.01, 1).is_none());
        assert!(view.sample_row(f32::NAN, 1).is_none());
    }
}
