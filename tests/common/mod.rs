//! Synthetic stereo pairs shared by the integration tests.

#![allow(dead_code)]

use cv_patchmatch::prelude::*;
use image::{Rgb, RgbImage};

/// Smooth, non-repeating colour texture defined over the whole plane.
pub fn texture(x: f32, y: f32) -> Rgb<u8> {
    let channel = |fx: f32, fy: f32, phase: f32| {
        let v = 128.0 + 50.0 * (fx * x + fy * y + phase).sin() + 30.0 * (0.5 * fy * x - fx * y).cos();
        v.max(0.0).min(255.0) as u8
    };

    Rgb([
        channel(0.45, 0.20, 0.0),
        channel(0.31, -0.37, 1.0),
        channel(0.17, 0.53, 2.0)
    ])
}

/// Stereo pair where left pixel `x` is seen at right pixel `x - shift`.
pub fn shifted_pair(width: u32, height: u32, shift: u32) -> StereoFrame {
    let left = RgbImage::from_fn(width, height, |x, y| texture(x as f32, y as f32));
    let right = RgbImage::from_fn(width, height, |x, y| texture((x + shift) as f32, y as f32));
    StereoFrame::new(left, right)
}

pub fn uniform_pair(width: u32, height: u32) -> StereoFrame {
    let img = RgbImage::from_pixel(width, height, Rgb([120, 80, 200]));
    StereoFrame::new(img.clone(), img)
}

pub fn params(winsize: usize, max_disparity: usize, niters: usize) -> Params {
    Params::new(0.9, 20.0, 10.0, 2.0, winsize, max_disparity, niters)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
