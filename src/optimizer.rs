//! # PatchMatch optimiser
//!
//! Randomised plane search over both views. After a random initialisation every iteration sweeps
//! each view in serpentine order, and at every pixel:
//!
//! 1. offers the planes of the already visited neighbours (spatial propagation),
//! 2. runs a shrinking random search around the current best plane (refinement),
//! 3. offers the pixel's plane to the matching pixel of the other view (view propagation).
//!
//! Even iterations scan left-to-right, top-to-bottom and take candidates from the left and upper
//! neighbours. Odd iterations scan the other way and take them from the right and lower
//! neighbours. The optimiser stops after a fixed number of iterations.
//!
//! The wavefront schedule runs the same three steps as whole-view phases instead, see
//! [`Schedule::Wavefront`].

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::{debug, info};
use rand::Rng;

use crate::cost::CostModel;
use crate::params::{Params, Schedule};
use crate::plane::{normalize, DisparityPlane};
use crate::store::{PlaneSlot, PlaneStore, ViewState};
use crate::views::View;
use crate::wavefront;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Search parameters derived from [`Params`].
#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    pub niters: usize,
    pub schedule: Schedule,
    pub max_disparity: f32,
    pub max_init_slant: f32,
    pub max_refine_disparity: f32,
    pub max_refine_normal: f32,
    pub min_refine_step: f32
}

/// Number of accepted updates per phase.
///
/// The sequential schedule counts accepted candidates, the wavefront schedule counts committed
/// pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateCounts {
    pub spatial: usize,
    pub refine: usize,
    pub view: usize
}

/// Summary of one completed iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationStats {
    pub iteration: usize,
    pub mean_cost_left: f32,
    pub mean_cost_right: f32,
    pub updates: UpdateCounts
}

pub struct Optimizer {
    model: CostModel,
    store: PlaneStore,
    search: SearchSettings,
    phase: Phase,
    iteration: usize,
    history: Vec<IterationStats>
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Left-to-right, top-to-bottom.
    Forward,
    /// Right-to-left, bottom-to-top.
    Backward
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initialized,
    Propagating {
        iteration: usize,
        direction: Direction
    },
    Refining {
        iteration: usize
    },
    ViewPropagating {
        iteration: usize
    },
    Converged
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl SearchSettings {
    pub fn from_params(params: &Params) -> Self {
        Self {
            niters: params.niters,
            schedule: params.schedule,
            max_disparity: params.max_disparity as f32,
            max_init_slant: params.max_init_slant,
            max_refine_disparity: params.max_disparity as f32 / 2.0,
            max_refine_normal: params.max_refine_normal,
            min_refine_step: params.min_refine_step
        }
    }
}

impl std::ops::AddAssign for UpdateCounts {
    fn add_assign(&mut self, other: Self) {
        self.spatial += other.spatial;
        self.refine += other.refine;
        self.view += other.view;
    }
}

impl Direction {
    pub fn for_iteration(iteration: usize) -> Self {
        if iteration % 2 == 0 {
            Direction::Forward
        }
        else {
            Direction::Backward
        }
    }

    /// Offsets of the neighbours already visited when a pixel is reached.
    pub fn predecessors(self) -> [(isize, isize); 2] {
        match self {
            Direction::Forward => [(-1, 0), (0, -1)],
            Direction::Backward => [(1, 0), (0, 1)]
        }
    }
}

impl Optimizer {
    /// Randomly initialise both views.
    ///
    /// Every pixel gets a plane through a uniformly random disparity in `[0, max_disparity]`
    /// with slant coefficients uniform in `[-max_init_slant, max_init_slant]`.
    pub fn new<R: Rng + ?Sized>(model: CostModel, params: &Params, rng: &mut R) -> Self {
        let search = SearchSettings::from_params(params);
        let (width, height) = (model.width(), model.height());

        let mut init = |view: View| {
            ViewState::from_fn(view, width, height, |x, y| {
                let d = rng.random_range(0.0..=search.max_disparity);
                let a = symmetric(rng, search.max_init_slant);
                let b = symmetric(rng, search.max_init_slant);
                let plane = DisparityPlane::from_slant(x as f32, y as f32, d, a, b);
                PlaneSlot::new(plane, model.plane_cost(view, x, y, &plane))
            })
        };
        let left = init(View::Left);
        let right = init(View::Right);
        let store = PlaneStore::new(left, right);

        info!(
            "Initialised {}x{} planes, mean cost left {:.4} right {:.4}",
            width,
            height,
            store.view(View::Left).mean_cost(),
            store.view(View::Right).mean_cost()
        );

        Self {
            model,
            store,
            search,
            phase: Phase::Initialized,
            iteration: 0,
            history: Vec::with_capacity(params.niters)
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn store(&self) -> &PlaneStore {
        &self.store
    }

    pub fn history(&self) -> &[IterationStats] {
        &self.history
    }

    pub fn into_parts(self) -> (CostModel, PlaneStore) {
        (self.model, self.store)
    }

    /// Run the remaining iterations.
    pub fn run<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        while self.step(rng).is_some() {}
    }

    /// Run a single full iteration over both views.
    ///
    /// Returns `None` once the configured number of iterations has been reached.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<IterationStats> {
        if self.iteration >= self.search.niters {
            self.phase = Phase::Converged;
            return None;
        }

        let iteration = self.iteration;
        let updates = match self.search.schedule {
            Schedule::Sequential => self.sequential_iteration(iteration, rng),
            Schedule::Wavefront => self.wavefront_iteration(iteration, rng)
        };

        let stats = IterationStats {
            iteration,
            mean_cost_left: self.store.view(View::Left).mean_cost(),
            mean_cost_right: self.store.view(View::Right).mean_cost(),
            updates
        };
        debug!(
            "Iteration {}/{} ({:?}): mean cost left {:.4} right {:.4}, accepted {:?}",
            iteration + 1,
            self.search.niters,
            Direction::for_iteration(iteration),
            stats.mean_cost_left,
            stats.mean_cost_right,
            updates
        );

        self.history.push(stats);
        self.iteration += 1;
        if self.iteration >= self.search.niters {
            self.phase = Phase::Converged;
        }

        Some(stats)
    }

    fn sequential_iteration<R: Rng + ?Sized>(
        &mut self,
        iteration: usize,
        rng: &mut R
    ) -> UpdateCounts {
        let direction = Direction::for_iteration(iteration);
        let (width, height) = (self.model.width(), self.model.height());
        let mut counts = UpdateCounts::default();

        for &view in View::BOTH.iter() {
            for (x, y) in scan_order(width, height, direction) {
                self.phase = Phase::Propagating { iteration, direction };
                let state = self.store.view_mut(view);
                let mut slot = state.slot(x, y);
                counts.spatial += propagate_spatial(&self.model, state, &mut slot, x, y, direction);

                self.phase = Phase::Refining { iteration };
                counts.refine += refine_plane(&self.model, view, &mut slot, x, y, &self.search, rng);
                state.commit(&self.model, x, y, slot);

                self.phase = Phase::ViewPropagating { iteration };
                if propagate_view(&self.model, &mut self.store, view, x, y) {
                    counts.view += 1;
                }
            }
        }

        counts
    }

    fn wavefront_iteration<R: Rng + ?Sized>(
        &mut self,
        iteration: usize,
        rng: &mut R
    ) -> UpdateCounts {
        let direction = Direction::for_iteration(iteration);

        let mut counts = UpdateCounts::default();

        self.phase = Phase::Propagating { iteration, direction };
        counts.spatial +=
            wavefront::propagate_spatial_views(&self.model, &mut self.store, direction);

        self.phase = Phase::Refining { iteration };
        counts.refine += wavefront::refine_views(&self.model, &mut self.store, &self.search, rng);

        self.phase = Phase::ViewPropagating { iteration };
        counts.view += wavefront::propagate_views(&self.model, &mut self.store, direction);

        counts
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Pixels of a `width` x `height` image in serpentine scan order.
pub fn scan_order(
    width: usize,
    height: usize,
    direction: Direction
) -> impl Iterator<Item = (usize, usize)> {
    let count = width * height;
    (0..count).map(move |i| {
        let idx = match direction {
            Direction::Forward => i,
            Direction::Backward => count - 1 - i
        };
        (idx % width, idx / width)
    })
}

/// Uniform sample from `[-range, range]`, or zero for an empty range.
pub(crate) fn symmetric<R: Rng + ?Sized>(rng: &mut R, range: f32) -> f32 {
    if range > 0.0 {
        rng.random_range(-range..=range)
    }
    else {
        0.0
    }
}

/// Offer the planes of the already visited neighbours of `(x, y)` to `slot`.
///
/// Neighbour planes are read from `state`; the pixel's own slot is passed separately so callers
/// can work on a detached copy.
pub(crate) fn propagate_spatial(
    model: &CostModel,
    state: &ViewState,
    slot: &mut PlaneSlot,
    x: usize,
    y: usize,
    direction: Direction
) -> usize {
    let mut accepted = 0;

    for &(dx, dy) in direction.predecessors().iter() {
        let nx = x as isize + dx;
        let ny = y as isize + dy;
        if nx < 0 || ny < 0 || nx >= state.width() as isize || ny >= state.height() as isize {
            continue;
        }

        let (candidate, _) = state.get(nx as usize, ny as usize);
        if candidate == slot.plane() {
            continue;
        }

        if slot.try_set(model, state.view(), x, y, candidate) {
            accepted += 1;
        }
    }

    accepted
}

/// Shrinking random search around the plane held by `slot`.
///
/// Each round perturbs the disparity at `(x, y)` by up to `dz` and the normal by up to `dn` per
/// component, offers the result, then halves both ranges. The search ends once `dz` drops below
/// the minimum refinement step.
pub(crate) fn refine_plane<R: Rng + ?Sized>(
    model: &CostModel,
    view: View,
    slot: &mut PlaneSlot,
    x: usize,
    y: usize,
    search: &SearchSettings,
    rng: &mut R
) -> usize {
    let (fx, fy) = (x as f32, y as f32);
    let mut dz = search.max_refine_disparity;
    let mut dn = search.max_refine_normal;
    let mut accepted = 0;

    while dz >= search.min_refine_step {
        let plane = slot.plane();
        let z = plane.evaluate(fx, fy) + symmetric(rng, dz);
        let n = plane.normal();
        let perturbed = [
            n[0] + symmetric(rng, dn),
            n[1] + symmetric(rng, dn),
            n[2] + symmetric(rng, dn)
        ];

        let candidate = normalize(perturbed)
            .and_then(|n| DisparityPlane::from_point_normal(fx, fy, z, n));

        if let Some(candidate) = candidate {
            if slot.try_set(model, view, x, y, candidate) {
                accepted += 1;
            }
        }

        dz /= 2.0;
        dn /= 2.0;
    }

    accepted
}

/// Offer the plane of `(x, y)` in `view` to its matching pixel in the other view.
pub(crate) fn propagate_view(
    model: &CostModel,
    store: &mut PlaneStore,
    view: View,
    x: usize,
    y: usize
) -> bool {
    let (plane, _) = store.get(view, x, y);
    let d = plane.evaluate(x as f32, y as f32);
    let qx = (x as f32 + view.sign() * d).round();

    if !(qx >= 0.0 && qx < model.width() as f32) {
        return false;
    }

    match plane.to_other_view(view.sign()) {
        Some(candidate) => store.try_set(model, view.other(), qx as usize, y, candidate),
        None => false
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
