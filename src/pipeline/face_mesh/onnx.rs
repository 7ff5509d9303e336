use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    FaceMeshBackend, FaceMeshEngine,
    common::{self, INPUT_SIZE, RegionOfInterest},
};
use crate::{
    model_download::{default_face_mesh_model_path, ensure_face_mesh_model_ready},
    pipeline::topology::ConnectorTables,
    types::{FaceMeshOptions, Frame, Landmark},
};

/// Face mesh backed by an ONNX export of the MediaPipe face landmark model.
#[derive(Clone, Debug)]
pub struct OrtBackend {
    model_path: PathBuf,
    model_url: Option<String>,
    tesselation_path: Option<PathBuf>,
}

impl OrtBackend {
    pub fn new(
        model_path: PathBuf,
        model_url: Option<String>,
        tesselation_path: Option<PathBuf>,
    ) -> Self {
        Self {
            model_path,
            model_url,
            tesselation_path,
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl Default for OrtBackend {
    fn default() -> Self {
        Self::new(default_face_mesh_model_path(), None, None)
    }
}

impl FaceMeshBackend for OrtBackend {
    type Engine = OrtEngine;

    fn label(&self) -> &'static str {
        "ort"
    }

    fn connectors(&self) -> ConnectorTables {
        let Some(path) = self.tesselation_path.as_deref() else {
            return ConnectorTables::default();
        };
        match ConnectorTables::load_tesselation(path) {
            Ok(tables) => tables,
            Err(err) => {
                log::warn!("falling back to a triangulated mesh overlay: {err:#}");
                ConnectorTables::default()
            }
        }
    }

    fn create(&self, options: &FaceMeshOptions) -> Result<OrtEngine> {
        ensure_face_mesh_model_ready(&self.model_path, self.model_url.as_deref(), |_evt| {})?;

        let engine = OrtEngine::new(&self.model_path, options.clone())?;
        log::info!(
            "face mesh ORT backend ready using {} ({} landmarks)",
            self.model_path.display(),
            engine.landmark_count
        );
        Ok(engine)
    }
}

pub struct OrtEngine {
    session: Session,
    options: FaceMeshOptions,
    landmark_count: usize,
    tracked: Option<RegionOfInterest>,
}

impl OrtEngine {
    fn new(model_path: &Path, options: FaceMeshOptions) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        let mut engine = Self {
            session,
            options,
            landmark_count: 0,
            tracked: None,
        };

        // The topology is only observable from a real output tensor.
        let warm_up = Array4::<f32>::zeros((1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3));
        let (flat, _) = engine.run(warm_up).context("face mesh warm-up run failed")?;
        engine.landmark_count = common::decode_landmarks(&flat)?.len();

        Ok(engine)
    }

    /// Returns the flattened landmark tensor and the face presence score.
    /// Models without a presence output always report a face.
    fn run(&mut self, input: Array4<f32>) -> Result<(Vec<f32>, f32)> {
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        let mut landmarks: Option<Vec<f32>> = None;
        let mut presence: Option<f32> = None;
        for idx in 0..outputs.len() {
            let Ok(values) = outputs[idx].try_extract_array::<f32>() else {
                continue;
            };
            if values.len() == 1 {
                if presence.is_none() {
                    presence = values.iter().next().copied().map(common::sigmoid);
                }
            } else if values.len() % 3 == 0
                && landmarks.as_ref().is_none_or(|best| values.len() > best.len())
            {
                landmarks = Some(values.iter().copied().collect());
            }
        }

        let landmarks = landmarks.ok_or_else(|| anyhow!("model returned no landmark tensor"))?;
        Ok((landmarks, presence.unwrap_or(1.0)))
    }
}

impl FaceMeshEngine for OrtEngine {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Vec<Landmark>>> {
        let (roi, threshold) = match self.tracked {
            Some(roi) => (roi, self.options.min_tracking_confidence),
            None => (
                RegionOfInterest::centered(frame.width, frame.height),
                self.options.min_detection_confidence,
            ),
        };

        let input = common::prepare_crop(frame, &roi)?;
        let (flat, presence) = self.run(input)?;
        if presence < threshold {
            self.tracked = None;
            return Ok(Vec::new());
        }

        let raw = common::decode_landmarks(&flat)?;
        let landmarks = common::project_landmarks(&raw, &roi, frame.width, frame.height);
        self.tracked = RegionOfInterest::around_landmarks(&landmarks, frame.width, frame.height);

        Ok(vec![landmarks])
    }

    fn landmark_count(&self) -> usize {
        self.landmark_count
    }
}
