mod common;
mod onnx;

use crate::{
    pipeline::topology::ConnectorTables,
    types::{FaceMeshOptions, Frame, Landmark},
};

pub use self::onnx::OrtBackend;

/// A live landmark detector. One instance belongs to one session.
pub trait FaceMeshEngine: Send + 'static {
    /// Landmarks for every face found in `frame`, normalized to the frame size.
    fn infer(&mut self, frame: &Frame) -> anyhow::Result<Vec<Vec<Landmark>>>;

    /// Number of landmarks per face this engine produces.
    fn landmark_count(&self) -> usize;
}

/// Factory for engines plus the static data that belongs to their topology.
///
/// `create` runs on the scheduler's worker thread, so it may block on model
/// downloads or session setup.
pub trait FaceMeshBackend: Clone + Send + 'static {
    type Engine: FaceMeshEngine;

    fn label(&self) -> &'static str;

    fn connectors(&self) -> ConnectorTables;

    fn create(&self, options: &FaceMeshOptions) -> anyhow::Result<Self::Engine>;
}
