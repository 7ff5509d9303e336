use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde::Deserialize;

use crate::{
    model_download::{FACE_MESH_MODEL_URL, default_face_mesh_model_path},
    pipeline::OrtBackend,
    types::FaceMeshOptions,
};

pub const CONFIG_PATH_ENV: &str = "FACE_SYMMETRY_CONFIG";

const DEFAULT_CAMERA_INDEX: u32 = 0;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FaceSymmetryConfigFile {
    camera: Option<CameraConfigFile>,
    face_mesh: Option<FaceMeshConfigFile>,
    model: Option<ModelConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    index: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FaceMeshConfigFile {
    refine_landmarks: Option<bool>,
    min_detection_confidence: Option<f32>,
    min_tracking_confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    url: Option<String>,
    tesselation_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceSymmetryConfig {
    pub camera: CameraSettings,
    pub face_mesh: FaceMeshOptions,
    pub model: ModelSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSettings {
    pub index: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub path: PathBuf,
    pub url: Option<String>,
    pub tesselation_path: Option<PathBuf>,
}

impl Default for FaceSymmetryConfig {
    fn default() -> Self {
        Self::from_file(FaceSymmetryConfigFile::default())
    }
}

impl FaceSymmetryConfig {
    /// Reads the file named by `FACE_SYMMETRY_CONFIG` if set, then applies
    /// environment overrides and validates the result.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_PATH_ENV).ok();
        let mut cfg = match config_path.as_deref() {
            Some(path) => Self::from_path(Path::new(path))?,
            None => Self::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::from_file(read_config_file(path)?))
    }

    fn from_file(file: FaceSymmetryConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let face_mesh = file.face_mesh.unwrap_or_default();
        let model = file.model.unwrap_or_default();

        Self {
            camera: CameraSettings {
                index: camera.index.unwrap_or(DEFAULT_CAMERA_INDEX),
                width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            },
            face_mesh: FaceMeshOptions {
                max_faces: 1,
                refine_landmarks: face_mesh.refine_landmarks.unwrap_or(true),
                min_detection_confidence: face_mesh
                    .min_detection_confidence
                    .unwrap_or(DEFAULT_CONFIDENCE),
                min_tracking_confidence: face_mesh
                    .min_tracking_confidence
                    .unwrap_or(DEFAULT_CONFIDENCE),
            },
            model: ModelSettings {
                path: model.path.unwrap_or_else(default_face_mesh_model_path),
                url: Some(
                    model
                        .url
                        .filter(|url| !url.trim().is_empty())
                        .unwrap_or_else(|| FACE_MESH_MODEL_URL.to_string()),
                ),
                tesselation_path: model.tesselation_path,
            },
        }
    }

    /// Applies `FACE_SYMMETRY_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(index) = value("FACE_SYMMETRY_CAMERA_INDEX") {
            self.camera.index = index
                .trim()
                .parse()
                .map_err(|_| anyhow!("FACE_SYMMETRY_CAMERA_INDEX must be a camera number"))?;
        }
        if let Some(path) = value("FACE_SYMMETRY_MODEL_PATH") {
            self.model.path = PathBuf::from(path);
        }
        if let Some(url) = value("FACE_SYMMETRY_MODEL_URL") {
            self.model.url = Some(url);
        }
        if let Some(refine) = value("FACE_SYMMETRY_REFINE_LANDMARKS") {
            self.face_mesh.refine_landmarks = parse_bool(&refine).ok_or_else(|| {
                anyhow!("FACE_SYMMETRY_REFINE_LANDMARKS must be true or false")
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera frame size must be non-zero, got {}x{}",
                self.camera.width,
                self.camera.height
            ));
        }
        for (name, value) in [
            ("min_detection_confidence", self.face_mesh.min_detection_confidence),
            ("min_tracking_confidence", self.face_mesh.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{name} must be within [0, 1], got {value}"));
            }
        }
        if self.face_mesh.max_faces != 1 {
            return Err(anyhow!("only a single face is supported"));
        }
        Ok(())
    }

    pub fn backend(&self) -> OrtBackend {
        OrtBackend::new(
            self.model.path.clone(),
            self.model.url.clone(),
            self.model.tesselation_path.clone(),
        )
    }
}

fn read_config_file(path: &Path) -> Result<FaceSymmetryConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_fixed_session_options() {
        let cfg = FaceSymmetryConfig::default();
        assert_eq!(cfg.face_mesh, FaceMeshOptions::default());
        assert_eq!(cfg.camera.index, 0);
        assert_eq!((cfg.camera.width, cfg.camera.height), (640, 480));
        assert_eq!(cfg.model.path, default_face_mesh_model_path());
        assert_eq!(cfg.model.url.as_deref(), Some(FACE_MESH_MODEL_URL));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn file_values_fill_in_over_defaults() {
        let file = write_config(
            r#"{
                "camera": { "index": 2, "width": 1280 },
                "face_mesh": { "refine_landmarks": false },
                "model": { "url": "https://models.example/face.onnx" }
            }"#,
        );

        let cfg = FaceSymmetryConfig::from_path(file.path()).unwrap();

        assert_eq!(cfg.camera.index, 2);
        assert_eq!((cfg.camera.width, cfg.camera.height), (1280, 480));
        assert!(!cfg.face_mesh.refine_landmarks);
        assert_eq!(cfg.face_mesh.min_detection_confidence, 0.5);
        assert_eq!(
            cfg.model.url.as_deref(),
            Some("https://models.example/face.onnx")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config(r#"{ "camera": { "fps": 60 } }"#);
        let err = FaceSymmetryConfig::from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid config file"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FaceSymmetryConfig::from_path(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn env_overrides_win() {
        let mut cfg = FaceSymmetryConfig::default();
        cfg.apply_overrides(env(&[
            ("FACE_SYMMETRY_CAMERA_INDEX", "3"),
            ("FACE_SYMMETRY_MODEL_PATH", "/tmp/mesh.onnx"),
            ("FACE_SYMMETRY_MODEL_URL", "https://models.example/mesh.onnx"),
            ("FACE_SYMMETRY_REFINE_LANDMARKS", "off"),
        ]))
        .unwrap();

        assert_eq!(cfg.camera.index, 3);
        assert_eq!(cfg.model.path, PathBuf::from("/tmp/mesh.onnx"));
        assert_eq!(
            cfg.model.url.as_deref(),
            Some("https://models.example/mesh.onnx")
        );
        assert!(!cfg.face_mesh.refine_landmarks);
        assert_eq!(cfg.face_mesh.expected_landmark_count(), 468);
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let mut cfg = FaceSymmetryConfig::default();
        cfg.apply_overrides(env(&[("FACE_SYMMETRY_MODEL_URL", "  ")]))
            .unwrap();
        assert_eq!(cfg.model.url.as_deref(), Some(FACE_MESH_MODEL_URL));
    }

    #[test]
    fn bad_overrides_are_errors() {
        let mut cfg = FaceSymmetryConfig::default();
        assert!(
            cfg.apply_overrides(env(&[("FACE_SYMMETRY_CAMERA_INDEX", "front")]))
                .is_err()
        );
        assert!(
            cfg.apply_overrides(env(&[("FACE_SYMMETRY_REFINE_LANDMARKS", "maybe")]))
                .is_err()
        );
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut cfg = FaceSymmetryConfig::default();
        cfg.face_mesh.min_tracking_confidence = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = FaceSymmetryConfig::default();
        cfg.camera.height = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = FaceSymmetryConfig::default();
        cfg.face_mesh.min_detection_confidence = f32::NAN;
        assert!(cfg.validate().is_err());
    }
}
