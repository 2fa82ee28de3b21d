//! # Plane store
//!
//! Per-view, per-pixel storage of the best disparity plane found so far together with its cost.
//!
//! Every write goes through [`PlaneSlot::try_set`], which costs the candidate and only accepts it
//! if the cost is strictly lower than the stored one. Stored costs therefore never increase,
//! whichever phase proposed the candidate. Equal-cost candidates are rejected.
//!
//! Callers that improve a detached copy of a slot write it back with [`ViewState::commit`],
//! which offers the copy's plane through the same `try_set`.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::cost::CostModel;
use crate::disparity::DisparityMap;
use crate::plane::DisparityPlane;
use crate::views::View;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Best plane of a single pixel and its aggregated cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSlot {
    plane: DisparityPlane,
    cost: f32
}

/// All plane slots of one view.
#[derive(Debug, Clone)]
pub struct ViewState {
    view: View,
    width: usize,
    height: usize,
    slots: Vec<PlaneSlot>
}

/// The two view states. They never share storage.
#[derive(Debug, Clone)]
pub struct PlaneStore {
    left: ViewState,
    right: ViewState
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl PlaneSlot {
    pub fn new(plane: DisparityPlane, cost: f32) -> Self {
        Self { plane, cost }
    }

    pub fn plane(&self) -> DisparityPlane {
        self.plane
    }

    pub fn cost(&self) -> f32 {
        self.cost
    }

    /// Cost `candidate` at `(x, y)` of `view` and keep it if it strictly improves on the slot.
    ///
    /// Returns whether the candidate was accepted.
    pub fn try_set(
        &mut self,
        model: &CostModel,
        view: View,
        x: usize,
        y: usize,
        candidate: DisparityPlane
    ) -> bool {
        let cost = model.plane_cost(view, x, y, &candidate);
        if cost < self.cost {
            self.plane = candidate;
            self.cost = cost;
            true
        }
        else {
            false
        }
    }
}

impl ViewState {
    /// Build a view state by computing the initial slot of every pixel in row-major order.
    pub fn from_fn<F>(view: View, width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> PlaneSlot
    {
        let mut slots = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                slots.push(f(x, y));
            }
        }

        Self {
            view,
            width,
            height,
            slots
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn slot(&self, x: usize, y: usize) -> PlaneSlot {
        self.slots[y * self.width + x]
    }

    pub fn get(&self, x: usize, y: usize) -> (DisparityPlane, f32) {
        let slot = self.slot(x, y);
        (slot.plane, slot.cost)
    }

    pub fn try_set(
        &mut self,
        model: &CostModel,
        x: usize,
        y: usize,
        candidate: DisparityPlane
    ) -> bool {
        let view = self.view;
        self.slots[y * self.width + x].try_set(model, view, x, y, candidate)
    }

    /// Write back a slot that was improved on a detached copy.
    ///
    /// Copies that do not claim an improvement are skipped. The others are offered through
    /// [`PlaneSlot::try_set`], so the stored cost is always one the model computed for this
    /// pixel.
    pub fn commit(&mut self, model: &CostModel, x: usize, y: usize, slot: PlaneSlot) -> bool {
        if !(slot.cost < self.slot(x, y).cost) {
            return false;
        }
        self.try_set(model, x, y, slot.plane)
    }

    /// Row-major planes of the view.
    pub fn planes(&self) -> Vec<DisparityPlane> {
        self.slots.iter().map(|s| s.plane).collect()
    }

    /// Row-major costs of the view.
    pub fn costs(&self) -> Vec<f32> {
        self.slots.iter().map(|s| s.cost).collect()
    }

    pub fn mean_cost(&self) -> f32 {
        if self.slots.is_empty() {
            return 0.0;
        }
        self.slots.iter().map(|s| s.cost as f64).sum::<f64>() as f32 / self.slots.len() as f32
    }

    /// Evaluate every pixel's plane at the pixel itself.
    pub fn extract(&self) -> DisparityMap {
        extract_disparity(self.width, self.height, &self.planes())
    }
}

impl PlaneStore {
    pub fn new(left: ViewState, right: ViewState) -> Self {
        Self { left, right }
    }

    pub fn view(&self, view: View) -> &ViewState {
        match view {
            View::Left => &self.left,
            View::Right => &self.right
        }
    }

    pub fn view_mut(&mut self, view: View) -> &mut ViewState {
        match view {
            View::Left => &mut self.left,
            View::Right => &mut self.right
        }
    }

    /// Mutable access to both views at once, left first.
    pub fn split_mut(&mut self) -> (&mut ViewState, &mut ViewState) {
        (&mut self.left, &mut self.right)
    }

    pub fn get(&self, view: View, x: usize, y: usize) -> (DisparityPlane, f32) {
        self.view(view).get(x, y)
    }

    /// Offer `candidate` to pixel `(x, y)` of `view`. See [`PlaneSlot::try_set`].
    pub fn try_set(
        &mut self,
        model: &CostModel,
        view: View,
        x: usize,
        y: usize,
        candidate: DisparityPlane
    ) -> bool {
        self.view_mut(view).try_set(model, x, y, candidate)
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Disparity map obtained by evaluating each row-major plane at its own pixel.
pub fn extract_disparity(width: usize, height: usize, planes: &[DisparityPlane]) -> DisparityMap {
    let values = planes
        .iter()
        .enumerate()
        .map(|(idx, plane)| plane.evaluate((idx % width) as f32, (idx / width) as f32))
        .collect();

    DisparityMap::from_vec(width, height, values)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disparity::StereoFrame;
    use crate::params::Params;
    use crate::views::StereoViews;
    use image::{Rgb, RgbImage};

    fn model() -> CostModel {
        let left = RgbImage::from_fn(16, 6, |x, y| Rgb([(x * 13 + y * 7) as u8, (x * 5) as u8, 40]));
        let right = RgbImage::from_fn(16, 6, |x, y| {
            Rgb([((x + 2) * 13 + y * 7) as u8, ((x + 2) * 5) as u8, 40])
        });
        let views = StereoViews::new(&StereoFrame::new(left, right)).unwrap();
        CostModel::new(views, &Params::new(0.5, 10.0, 20.0, 5.0, 2, 6, 1))
    }

    fn store(model: &CostModel, d: f32) -> PlaneStore {
        let build = |view| {
            ViewState::from_fn(view, model.width(), model.height(), |x, y| {
                let plane = DisparityPlane::constant(d);
                PlaneSlot::new(plane, model.plane_cost(view, x, y, &plane))
            })
        };
        PlaneStore::new(build(View::Left), build(View::Right))
    }

    #[test]
    fn try_set_only_accepts_strict_improvements() {
        let model = model();
        let mut store = store(&model, 5.0);
        let (_, before) = store.get(View::Left, 8, 3);

        // Re-offering the stored plane has equal cost and is rejected
        assert!(!store.try_set(&model, View::Left, 8, 3, DisparityPlane::constant(5.0)));
        assert_eq!(store.get(View::Left, 8, 3).1, before);

        // The true shift is better
        assert!(store.try_set(&model, View::Left, 8, 3, DisparityPlane::constant(2.0)));
        let (plane, after) = store.get(View::Left, 8, 3);
        assert_eq!(plane, DisparityPlane::constant(2.0));
        assert!(after < before);

        // Going back to the worse plane is rejected and leaves the slot untouched
        assert!(!store.try_set(&model, View::Left, 8, 3, DisparityPlane::constant(5.0)));
        assert_eq!(store.get(View::Left, 8, 3), (plane, after));
    }

    #[test]
    fn commit_recosts_detached_slots() {
        let model = model();
        let mut store = store(&model, 5.0);
        let state = store.view_mut(View::Left);
        let (_, before) = state.get(8, 3);

        // A copy claiming a bogus cost for a worse plane is recosted and rejected
        let forged = PlaneSlot::new(DisparityPlane::constant(9.0), -1.0);
        assert!(!state.commit(&model, 8, 3, forged));
        assert_eq!(state.get(8, 3), (DisparityPlane::constant(5.0), before));

        // A genuinely improved copy is accepted with the model's own cost
        let mut slot = state.slot(8, 3);
        assert!(slot.try_set(&model, View::Left, 8, 3, DisparityPlane::constant(2.0)));
        assert!(state.commit(&model, 8, 3, slot));
        assert_eq!(state.get(8, 3), (slot.plane(), slot.cost()));

        // An unchanged copy does not write
        assert!(!state.commit(&model, 8, 3, slot));
    }

    #[test]
    fn views_do_not_alias() {
        let model = model();
        let mut store = store(&model, 5.0);
        let right_before = store.view(View::Right).costs();

        for x in 2..16 {
            store.try_set(&model, View::Left, x, 3, DisparityPlane::constant(2.0));
        }

        assert_eq!(store.view(View::Right).costs(), right_before);
    }

    #[test]
    fn extraction_evaluates_planes_at_own_pixel() {
        let planes = vec![
            DisparityPlane::new(0.5, 0.0, 1.0),
            DisparityPlane::new(0.5, 0.0, 1.0),
            DisparityPlane::new(0.0, 1.0, 2.0),
            DisparityPlane::new(0.0, 1.0, 2.0),
        ];
        let map = extract_disparity(2, 2, &planes);

        assert_eq!(map.get(0, 0), 1.0);
        assert_eq!(map.get(1, 0), 1.5);
        assert_eq!(map.get(0, 1), 3.0);
        assert_eq!(map.get(1, 1), 3.0);
        assert_eq!(map.min_disp, Some(1.0));
        assert_eq!(map.max_disp, Some(3.0));
    }
}
