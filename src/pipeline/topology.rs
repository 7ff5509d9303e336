//! Landmark topology of the MediaPipe face mesh.
//!
//! The indices below are tied to the 468-point canonical mesh (478 with the
//! refined iris points appended). A model with a different topology will
//! silently break them, which is why the scheduler compares the engine's
//! landmark count against these constants before a session goes live.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};

pub const BASE_LANDMARK_COUNT: usize = 468;
pub const REFINED_LANDMARK_COUNT: usize = 478;

pub const MOUTH_LEFT_CORNER: usize = 61;
pub const MOUTH_RIGHT_CORNER: usize = 291;

pub const LIPS: &[(usize, usize)] = &[
    (61, 146),
    (146, 91),
    (91, 181),
    (181, 84),
    (84, 17),
    (17, 314),
    (314, 405),
    (405, 321),
    (321, 375),
    (375, 291),
    (61, 185),
    (185, 40),
    (40, 39),
    (39, 37),
    (37, 0),
    (0, 267),
    (267, 269),
    (269, 270),
    (270, 409),
    (409, 291),
    (78, 95),
    (95, 88),
    (88, 178),
    (178, 87),
    (87, 14),
    (14, 317),
    (317, 402),
    (402, 318),
    (318, 324),
    (324, 308),
    (78, 191),
    (191, 80),
    (80, 81),
    (81, 82),
    (82, 13),
    (13, 312),
    (312, 311),
    (311, 310),
    (310, 415),
    (415, 308),
];

pub const LEFT_EYE: &[(usize, usize)] = &[
    (263, 249),
    (249, 390),
    (390, 373),
    (373, 374),
    (374, 380),
    (380, 381),
    (381, 382),
    (382, 362),
    (263, 466),
    (466, 388),
    (388, 387),
    (387, 386),
    (386, 385),
    (385, 384),
    (384, 398),
    (398, 362),
];

pub const RIGHT_EYE: &[(usize, usize)] = &[
    (33, 7),
    (7, 163),
    (163, 144),
    (144, 145),
    (145, 153),
    (153, 154),
    (154, 155),
    (155, 133),
    (33, 246),
    (246, 161),
    (161, 160),
    (160, 159),
    (159, 158),
    (158, 157),
    (157, 173),
    (173, 133),
];

/// How the full mesh layer is connected.
#[derive(Clone, Debug, PartialEq)]
pub enum MeshLayer {
    /// Fixed index pairs, such as the canonical tessellation loaded from disk.
    Pairs(Vec<(usize, usize)>),
    /// Delaunay triangulation over every landmark of the face being drawn.
    Triangulated,
}

/// Index-pair tables the overlay connects, supplied by the landmark backend.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectorTables {
    pub mesh: MeshLayer,
    pub left_eye: Vec<(usize, usize)>,
    pub right_eye: Vec<(usize, usize)>,
    pub lips: Vec<(usize, usize)>,
}

impl Default for ConnectorTables {
    fn default() -> Self {
        Self::with_mesh(MeshLayer::Triangulated)
    }
}

impl ConnectorTables {
    pub fn with_mesh(mesh: MeshLayer) -> Self {
        Self {
            mesh,
            left_eye: LEFT_EYE.to_vec(),
            right_eye: RIGHT_EYE.to_vec(),
            lips: LIPS.to_vec(),
        }
    }

    /// Loads the tessellation from a JSON array of `[a, b]` index pairs.
    pub fn load_tesselation(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read tesselation table {}", path.display()))?;
        let pairs: Vec<(usize, usize)> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid tesselation table {}", path.display()))?;
        if pairs.is_empty() {
            return Err(anyhow!("tesselation table {} is empty", path.display()));
        }
        if let Some(&(a, b)) = pairs
            .iter()
            .find(|(a, b)| *a >= REFINED_LANDMARK_COUNT || *b >= REFINED_LANDMARK_COUNT)
        {
            return Err(anyhow!(
                "tesselation table {} references landmark ({a}, {b}) outside the mesh",
                path.display()
            ));
        }
        Ok(Self::with_mesh(MeshLayer::Pairs(pairs)))
    }
}
