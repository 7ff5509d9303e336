pub mod config;
pub mod error;
pub mod model_download;
pub mod pipeline;
pub mod types;

pub use config::FaceSymmetryConfig;
pub use error::{MalformedResult, SessionError};
pub use types::{AsymmetryScore, FaceMeshOptions, FaceMeshResult, Frame, Landmark, SessionState};
