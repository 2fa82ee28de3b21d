//! # Wavefront schedule
//!
//! Parallel version of an optimiser iteration, run as three separate phases.
//!
//! Spatial propagation: in a serpentine scan the predecessors of `(x, y)` lie on the
//! anti-diagonal `x + y - 1` (forward) or `x + y + 1` (backward), so all pixels of one
//! anti-diagonal are independent of each other. Diagonals are processed in scan order; the pixels
//! of a diagonal are processed in parallel against a read-only snapshot of the view and their
//! improved slots are committed afterwards.
//!
//! Refinement only reads and writes the pixel's own slot, so every pixel is refined in parallel.
//! Each pixel draws from its own generator seeded from a per-view seed and the pixel index, which
//! keeps the result independent of how rayon schedules the work.
//!
//! The two views have no data dependency during either phase and are processed concurrently.
//! View propagation writes into the other view, so it runs sequentially once both are done.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::cost::CostModel;
use crate::optimizer::{
    propagate_spatial, propagate_view, refine_plane, scan_order, Direction, SearchSettings
};
use crate::store::{PlaneSlot, PlaneStore, ViewState};
use crate::views::View;

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Spatial propagation of both views, run concurrently.
pub(crate) fn propagate_spatial_views(
    model: &CostModel,
    store: &mut PlaneStore,
    direction: Direction
) -> usize {
    let (left, right) = store.split_mut();

    let (accepted, right_accepted) = rayon::join(
        || sweep_view(model, left, direction),
        || sweep_view(model, right, direction)
    );

    accepted + right_accepted
}

/// Refinement of every pixel of both views, run concurrently.
pub(crate) fn refine_views<R: Rng + ?Sized>(
    model: &CostModel,
    store: &mut PlaneStore,
    search: &SearchSettings,
    rng: &mut R
) -> usize {
    let left_seed: u64 = rng.random();
    let right_seed: u64 = rng.random();
    let (left, right) = store.split_mut();

    let (accepted, right_accepted) = rayon::join(
        || refine_view(model, left, search, left_seed),
        || refine_view(model, right, search, right_seed)
    );

    accepted + right_accepted
}

/// View propagation of every pixel of both views, in scan order.
pub(crate) fn propagate_views(
    model: &CostModel,
    store: &mut PlaneStore,
    direction: Direction
) -> usize {
    let mut accepted = 0;

    for &view in View::BOTH.iter() {
        for (x, y) in scan_order(model.width(), model.height(), direction) {
            if propagate_view(model, store, view, x, y) {
                accepted += 1;
            }
        }
    }

    accepted
}

/// Propagate planes through a single view diagonal by diagonal.
fn sweep_view(model: &CostModel, state: &mut ViewState, direction: Direction) -> usize {
    let (width, height) = (state.width(), state.height());
    let num_diagonals = width + height - 1;
    let mut accepted = 0;

    for i in 0..num_diagonals {
        let k = match direction {
            Direction::Forward => i,
            Direction::Backward => num_diagonals - 1 - i
        };

        let snapshot: &ViewState = &*state;
        let y_lo = k.saturating_sub(width - 1);
        let y_hi = k.min(height - 1);

        let updates: Vec<(usize, usize, PlaneSlot)> = (y_lo..=y_hi)
            .into_par_iter()
            .filter_map(|y| {
                let x = k - y;
                let mut slot = snapshot.slot(x, y);
                match propagate_spatial(model, snapshot, &mut slot, x, y, direction) {
                    0 => None,
                    _ => Some((x, y, slot))
                }
            })
            .collect();

        for (x, y, slot) in updates {
            if state.commit(model, x, y, slot) {
                accepted += 1;
            }
        }
    }

    accepted
}

/// Refine every pixel of a single view in parallel.
fn refine_view(
    model: &CostModel,
    state: &mut ViewState,
    search: &SearchSettings,
    seed: u64
) -> usize {
    let width = state.width();
    let snapshot: &ViewState = &*state;

    let updates: Vec<(usize, usize, PlaneSlot)> = (0..width * state.height())
        .into_par_iter()
        .filter_map(|idx| {
            let (x, y) = (idx % width, idx / width);
            let mut rng = StdRng::seed_from_u64(pixel_seed(seed, idx));
            let mut slot = snapshot.slot(x, y);
            match refine_plane(model, snapshot.view(), &mut slot, x, y, search, &mut rng) {
                0 => None,
                _ => Some((x, y, slot))
            }
        })
        .collect();

    let mut accepted = 0;
    for (x, y, slot) in updates {
        if state.commit(model, x, y, slot) {
            accepted += 1;
        }
    }

    accepted
}

fn pixel_seed(seed: u64, idx: usize) -> u64 {
    seed ^ (idx as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_seeds_differ() {
        let seeds: std::collections::HashSet<u64> = (0..1000).map(|i| pixel_seed(7, i)).collect();
        assert_eq!(seeds.len(), 1000);
    }
}
