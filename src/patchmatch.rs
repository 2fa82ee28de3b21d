//! # PatchMatch stereo
//!
//! This module provides an implementation of PatchMatch stereo from
//! ("PatchMatch Stereo - Stereo Matching with Slanted Support Windows")[http://www.bmva.org/bmvc/2011/proceedings/paper14/paper14.pdf]
//!
//! The pipeline adapts the frame, randomly initialises a disparity plane per pixel and view,
//! optimises the planes for a fixed number of iterations and finally runs the left/right
//! consistency check, occlusion filling and weighted median filtering.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cost::CostModel;
use crate::disparity::{DisparityAlgorithm, StereoDisparity, StereoFrame};
use crate::error::*;
use crate::optimizer::Optimizer;
use crate::params::Params;
use crate::post::PostProcessor;
use crate::views::StereoViews;

#[cfg(feature = "statistics")]
use crate::optimizer::IterationStats;
#[cfg(feature = "statistics")]
use plotters::prelude::*;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

pub struct PatchMatch {
    params: Params,
    post: PostProcessor
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl PatchMatch {
    /// Create a new instance of the algorithm, rejecting invalid parameters up front.
    pub fn new(params: Params) -> Result<Self> {
        params.validate()?;

        Ok(Self {
            post: PostProcessor::from_params(&params),
            params
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Adapt the frame, initialise both views and run every iteration.
    ///
    /// The returned optimiser holds the frozen planes and can be inspected before post
    /// processing.
    pub fn optimize<R: Rng + ?Sized>(&self, frame: &StereoFrame, rng: &mut R) -> Result<Optimizer> {
        let views = StereoViews::new(frame)?;

        info!(
            "Running PatchMatch on {}x{} frame: {:?}",
            views.width(),
            views.height(),
            self.params
        );

        let model = CostModel::new(views, &self.params);
        let mut optimizer = Optimizer::new(model, &self.params, rng);
        optimizer.run(rng);

        #[cfg(feature = "statistics")]
        {
            if let Err(e) = plot_cost_history(optimizer.history()) {
                log::warn!("Could not plot cost history: {}", e);
            }
        }

        Ok(optimizer)
    }

    /// Compute both disparity maps drawing all randomness from `rng`.
    pub fn compute_with_rng<R: Rng + ?Sized>(
        &self,
        frame: &StereoFrame,
        rng: &mut R
    ) -> Result<StereoDisparity> {
        let optimizer = self.optimize(frame, rng)?;
        let (model, store) = optimizer.into_parts();

        let result = self.post.run(&model, &store);

        info!(
            "PatchMatch complete, left disparity {:?}..{:?}, right disparity {:?}..{:?}",
            result.left.min_disp,
            result.left.max_disp,
            result.right.min_disp,
            result.right.max_disp
        );

        Ok(result)
    }
}

impl DisparityAlgorithm for PatchMatch {
    /// Compute the disparity maps for the given frame.
    ///
    /// Uses the configured seed if there is one, otherwise the OS entropy source.
    fn compute(&mut self, frame: &StereoFrame) -> Result<StereoDisparity> {
        let mut rng = match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng()
        };

        self.compute_with_rng(frame, &mut rng)
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

#[cfg(feature = "statistics")]
fn plot_cost_history(
    history: &[IterationStats]
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("plots/patchmatch")?;

    let cost_plot = BitMapBackend::new(
        "plots/patchmatch/cost.png",
        (800, 600)
    ).into_drawing_area();
    cost_plot.fill(&WHITE)?;

    let max_cost = history
        .iter()
        .map(|s| s.mean_cost_left.max(s.mean_cost_right))
        .fold(1e-3f32, f32::max);

    let mut chart = ChartBuilder::on(&cost_plot)
        .caption("Mean plane cost", ("sans-serif", 20).into_font())
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(30)
        .build_ranged(0..history.len().max(1), 0f32..max_cost)?;

    chart.configure_mesh().draw()?;

    chart
        .draw_series(LineSeries::new(
            history.iter().map(|s| (s.iteration, s.mean_cost_left)),
            &RED
        ))?
        .label("Left view")
        .legend(|(x, y)|
            PathElement::new(vec![(x, y), (x + 20, y)], &RED
        ));
    chart
        .draw_series(LineSeries::new(
            history.iter().map(|s| (s.iteration, s.mean_cost_right)),
            &BLUE
        ))?
        .label("Right view")
        .legend(|(x, y)|
            PathElement::new(vec![(x, y), (x + 20, y)], &BLUE
        ));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    Ok(())
}
