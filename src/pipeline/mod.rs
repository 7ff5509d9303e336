pub mod asymmetry;
#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod face_mesh;
pub mod frame_source;
pub mod overlay;
pub mod scheduler;
pub mod session;
pub mod topology;
pub mod triangulation;

pub use asymmetry::{AsymmetryCalculator, ScoreReadout};
#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraFrameSource, CameraStream};
pub use face_mesh::{FaceMeshBackend, FaceMeshEngine, OrtBackend};
pub use frame_source::{ChannelFrameSource, FrameSource};
pub use overlay::{OverlayRenderer, OverlayStyle, RgbaSurface};
pub use scheduler::{InferenceScheduler, SchedulerEvent, SchedulerPhase};
pub use session::{ResultConsumer, SessionController};
pub use topology::{ConnectorTables, MeshLayer};
