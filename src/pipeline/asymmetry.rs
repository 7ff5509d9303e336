//! Mouth-corner symmetry score.
//!
//! This is a coarse horizontal proxy: only the x coordinates of the two
//! mouth corners take part. Vertical offsets and every other landmark are
//! ignored.

use std::{cell::Cell, rc::Rc};

use super::{
    session::ResultConsumer,
    topology::{MOUTH_LEFT_CORNER, MOUTH_RIGHT_CORNER},
};
use crate::types::{AsymmetryScore, FaceMeshResult};

/// Pixel width the normalized x coordinates are mapped onto.
pub const REFERENCE_WIDTH: f64 = 640.0;

/// Latest score, shared with whatever displays it.
#[derive(Clone, Debug, Default)]
pub struct ScoreReadout(Rc<Cell<Option<AsymmetryScore>>>);

impl ScoreReadout {
    pub fn get(&self) -> Option<AsymmetryScore> {
        self.0.get()
    }

    fn set(&self, score: Option<AsymmetryScore>) {
        self.0.set(score);
    }
}

pub struct AsymmetryCalculator {
    readout: ScoreReadout,
}

impl AsymmetryCalculator {
    pub fn new(readout: ScoreReadout) -> Self {
        Self { readout }
    }

    /// `None` without a face, and when the corners average to zero or less.
    pub fn compute(result: &FaceMeshResult) -> Option<AsymmetryScore> {
        let face = result.face()?;
        let left = face.get(MOUTH_LEFT_CORNER)?;
        let right = face.get(MOUTH_RIGHT_CORNER)?;

        let left_x = left.x as f64 * REFERENCE_WIDTH;
        let right_x = right.x as f64 * REFERENCE_WIDTH;
        let offset = (left_x - right_x).abs();
        let average = (left_x + right_x) / 2.0;
        if average <= 0.0 {
            return None;
        }

        AsymmetryScore::from_percentage(offset / average * 100.0)
    }
}

impl ResultConsumer for AsymmetryCalculator {
    fn receive(&mut self, result: &FaceMeshResult) {
        self.readout.set(Self::compute(result));
    }

    fn clear(&mut self) {
        self.readout.set(None);
    }
}
