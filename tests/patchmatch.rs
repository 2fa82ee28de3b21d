//! End to end behaviour of the PatchMatch pipeline on synthetic pairs.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

mod common;

use common::{init_logging, params, shifted_pair, uniform_pair};
use cv_patchmatch::cost::CostModel;
use cv_patchmatch::optimizer::{Optimizer, Phase};
use cv_patchmatch::prelude::*;
use cv_patchmatch::views::StereoViews;
use image::RgbImage;
use rand::rngs::StdRng;
use rand::SeedableRng;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

const WIDTH: u32 = 48;
const HEIGHT: u32 = 24;
const SHIFT: u32 = 4;

// -----------------------------------------------------------------------------------------------
// HELPERS
// -----------------------------------------------------------------------------------------------

fn optimizer_for(frame: &StereoFrame, params: &Params, seed: u64) -> (Optimizer, StdRng) {
    let mut rng = StdRng::seed_from_u64(seed);
    let views = StereoViews::new(frame).unwrap();
    let optimizer = Optimizer::new(CostModel::new(views, params), params, &mut rng);
    (optimizer, rng)
}

/// Fraction of interior left pixels whose disparity is within one pixel of `SHIFT`.
fn fraction_near_shift(map: &DisparityMap, margin: usize) -> f32 {
    let mut good = 0;
    let mut total = 0;

    for y in margin..map.height() - margin {
        for x in (margin + SHIFT as usize * 2)..map.width() - margin {
            total += 1;
            if (map.get(x, y) - SHIFT as f32).abs() < 1.0 {
                good += 1;
            }
        }
    }

    good as f32 / total as f32
}

fn assert_costs_never_increase(schedule: Schedule) {
    init_logging();
    let frame = shifted_pair(WIDTH, HEIGHT, SHIFT);
    let params = params(3, 8, 4).with_schedule(schedule);
    let (mut optimizer, mut rng) = optimizer_for(&frame, &params, 11);

    assert_eq!(optimizer.phase(), Phase::Initialized);

    let initial: Vec<Vec<f32>> = View::BOTH
        .iter()
        .map(|&v| optimizer.store().view(v).costs())
        .collect();
    let mut previous = initial.clone();

    while let Some(stats) = optimizer.step(&mut rng) {
        for (i, &view) in View::BOTH.iter().enumerate() {
            let costs = optimizer.store().view(view).costs();
            for (idx, &cost) in costs.iter().enumerate() {
                assert!(cost <= previous[i][idx], "{:?} pixel {} regressed", view, idx);
                assert!(cost <= initial[i][idx]);
                assert!(cost.is_finite() && cost >= 0.0);
            }
            previous[i] = costs;
        }

        assert!(stats.mean_cost_left <= optimizer.history()[0].mean_cost_left + 1e-6);
    }

    assert_eq!(optimizer.phase(), Phase::Converged);
    assert_eq!(optimizer.history().len(), 4);
    assert!(optimizer.step(&mut rng).is_none());
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[test]
fn costs_never_increase() {
    assert_costs_never_increase(Schedule::Sequential);
}

#[test]
fn costs_never_increase_with_wavefront_schedule() {
    assert_costs_never_increase(Schedule::Wavefront);
}

#[test]
fn planes_round_trip_through_extraction() {
    let frame = shifted_pair(WIDTH, HEIGHT, SHIFT);
    let params = params(3, 8, 2);
    let (mut optimizer, mut rng) = optimizer_for(&frame, &params, 5);
    optimizer.run(&mut rng);

    for &view in View::BOTH.iter() {
        let state = optimizer.store().view(view);
        let map = state.extract();

        for y in 0..state.height() {
            for x in 0..state.width() {
                let (plane, _) = state.get(x, y);
                assert!((plane.evaluate(x as f32, y as f32) - map.get(x, y)).abs() < 1e-4);
            }
        }
    }
}

#[test]
fn recovers_known_shift() {
    init_logging();
    let frame = shifted_pair(WIDTH, HEIGHT, SHIFT);
    let params = params(3, 8, 5).with_seed(7);

    // Raw optimiser output
    let mut rng = StdRng::seed_from_u64(7);
    let optimizer = PatchMatch::new(params.clone())
        .unwrap()
        .optimize(&frame, &mut rng)
        .unwrap();
    let raw = optimizer.store().view(View::Left).extract();
    let raw_fraction = fraction_near_shift(&raw, 3);
    assert!(raw_fraction > 0.8, "only {} of raw pixels near the true shift", raw_fraction);

    // Full pipeline
    let result = PatchMatch::new(params).unwrap().compute(&frame).unwrap();
    let fraction = fraction_near_shift(&result.left, 3);
    assert!(fraction > 0.8, "only {} of final pixels near the true shift", fraction);

    assert_eq!(result.left.width(), WIDTH as usize);
    assert_eq!(result.right.height(), HEIGHT as usize);
    assert!(result.left.as_raw().iter().all(|d| d.is_finite()));
    assert!(result.right.as_raw().iter().all(|d| d.is_finite()));
}

#[test]
fn occlusions_sit_on_the_outer_borders() {
    let frame = shifted_pair(WIDTH, HEIGHT, SHIFT);
    let result = PatchMatch::new(params(3, 8, 4).with_seed(3))
        .unwrap()
        .compute(&frame)
        .unwrap();

    let half = WIDTH as usize / 2;
    for y in 0..HEIGHT as usize {
        for x in half..WIDTH as usize {
            assert_ne!(result.left_labels.get(x, y), Label::Occluded, "left ({}, {})", x, y);
        }
        for x in 0..half {
            assert_ne!(result.right_labels.get(x, y), Label::Occluded, "right ({}, {})", x, y);
        }
    }

    // Most pixels agree between the views
    let valid = result.left_labels.count(Label::Valid);
    assert!(valid * 2 > (WIDTH * HEIGHT) as usize);
}

#[test]
fn wavefront_schedule_recovers_shift_deterministically() {
    let frame = shifted_pair(WIDTH, HEIGHT, SHIFT);
    let params = params(3, 8, 6)
        .with_seed(19)
        .with_schedule(Schedule::Wavefront);

    let first = PatchMatch::new(params.clone()).unwrap().compute(&frame).unwrap();
    let second = PatchMatch::new(params).unwrap().compute(&frame).unwrap();

    assert_eq!(first.left.as_raw(), second.left.as_raw());
    assert_eq!(first.right.as_raw(), second.right.as_raw());

    let fraction = fraction_near_shift(&first.left, 3);
    assert!(fraction > 0.8, "only {} of pixels near the true shift", fraction);
}

#[test]
fn uniform_pair_stays_near_zero() {
    let frame = uniform_pair(4, 4);
    let params = params(1, 16, 4).with_seed(1);

    let first = PatchMatch::new(params.clone()).unwrap().compute(&frame).unwrap();
    let second = PatchMatch::new(params).unwrap().compute(&frame).unwrap();

    // Seeded runs are reproducible
    assert_eq!(first.left.as_raw(), second.left.as_raw());
    assert_eq!(first.right.as_raw(), second.right.as_raw());

    for map in [&first.left, &first.right] {
        for &d in map.as_raw() {
            assert!(d.is_finite() && d.abs() <= 1.0, "disparity {} on a uniform pair", d);
        }
    }
}

#[test]
fn windows_larger_than_the_frame_are_accepted() {
    let frame = uniform_pair(4, 4);

    for &winsize in [1_000_000, usize::MAX].iter() {
        let params = params(winsize, 2, 1).with_seed(4);
        assert!(params.validate().is_ok());

        let result = PatchMatch::new(params).unwrap().compute(&frame).unwrap();
        assert_eq!(result.left.width(), 4);
        assert!(result.left.as_raw().iter().all(|d| d.is_finite()));
        assert!(result.right.as_raw().iter().all(|d| d.is_finite()));
    }
}

#[test]
fn mismatched_shapes_are_rejected() {
    let frame = StereoFrame::new(RgbImage::new(10, 8), RgbImage::new(10, 9));
    let mut pm = PatchMatch::new(params(2, 4, 1).with_seed(0)).unwrap();

    match pm.compute(&frame) {
        Err(Error::ShapeMismatch { left, right }) => {
            assert_eq!(left, (10, 8));
            assert_eq!(right, (10, 9));
        }
        other => panic!("expected shape mismatch, got {:?}", other.map(|_| ()))
    }
}

#[test]
fn invalid_params_are_rejected_up_front() {
    let good = params(2, 4, 1).with_seed(9);
    assert_eq!(PatchMatch::new(good.clone()).unwrap().params(), &good);

    let mut bad = params(2, 4, 1);
    bad.gamma = -1.0;

    match PatchMatch::new(bad) {
        Err(Error::InvalidParam { field, .. }) => assert_eq!(field, "gamma"),
        other => panic!("expected invalid gamma, got {:?}", other.map(|_| ()))
    }
}

#[test]
fn raw_buffers_are_checked() {
    let good = vec![0u8; 4 * 3 * 3];
    assert!(StereoFrame::from_raw(4, 3, good.clone(), good.clone()).is_ok());

    match StereoFrame::from_raw(4, 3, good, vec![0u8; 35]) {
        Err(Error::BufferLength { expected, actual }) => {
            assert_eq!(expected, 36);
            assert_eq!(actual, 35);
        }
        other => panic!("expected buffer length error, got {:?}", other.map(|_| ()))
    }
}
