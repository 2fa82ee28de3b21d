use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cv_patchmatch::prelude::*;
use image::{Rgb, RgbImage};

fn texture(x: u32, y: u32) -> Rgb<u8> {
    let (fx, fy) = (x as f32, y as f32);
    Rgb([
        (128.0 + 60.0 * (0.45 * fx + 0.2 * fy).sin()) as u8,
        (128.0 + 60.0 * (0.31 * fx - 0.37 * fy + 1.0).sin()) as u8,
        (128.0 + 60.0 * (0.17 * fx + 0.53 * fy + 2.0).sin()) as u8
    ])
}

fn patchmatch_bench(c: &mut Criterion) {

    // Build a synthetic pair with a disparity of 6 pixels
    let frame = StereoFrame::new(
        RgbImage::from_fn(128, 96, |x, y| texture(x, y)),
        RgbImage::from_fn(128, 96, |x, y| texture(x + 6, y))
    );

    for schedule in [Schedule::Sequential, Schedule::Wavefront] {
        let params = Params::new(0.9, 10.0, 10.0, 2.0, 5, 16, 3)
            .with_seed(0)
            .with_schedule(schedule);

        // Build disparity alg
        let mut disp = PatchMatch::new(params).unwrap();

        // Benchmark compute function
        c.bench_function(
            &format!("patchmatch synthetic 128x96 {:?}", schedule),
            |b| b.iter(|| disp.compute(black_box(&frame)))
        );
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = patchmatch_bench
}
criterion_main!(benches);
