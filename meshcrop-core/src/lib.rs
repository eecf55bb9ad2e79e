//! meshcrop core library - crop a model's mesh to a box and export it as GLB
//!
//! The pipeline: load a glTF/GLB scene, size a crop region to its first mesh,
//! keep the triangles lying entirely inside the region's world-space bounds,
//! and serialize the rebuilt mesh back to a binary container.

pub mod bounds;
pub mod crop;
pub mod error;
pub mod export;
pub mod geometry;
pub mod glb;
pub mod loader;
pub mod projection;
pub mod region;
pub mod scene;
pub mod session;
pub mod transform;

// Re-export commonly used types
pub use bounds::Aabb;
pub use crop::{crop_geometry, CropStats, CroppedGeometry, NormalSource};
pub use error::{CropError, CropperError, ExportError, ModelLoadError};
pub use export::{Artifact, ArtifactFormat, ExportOptions, ExportOutput, Exporter, GlbExporter};
pub use geometry::{MeshGeometry, Triangle};
pub use loader::{GltfLoader, ModelLoader, ModelSource};
pub use projection::Camera;
pub use region::{CropBox, CropRegionController, TransformMode};
pub use scene::{
    Material, MeshInstance, MeshNode, NodeKind, SceneNode, SceneRoot, SceneSummary,
};
pub use session::{CropReport, CropSession, SessionState};
pub use transform::{LocalFrame, RotationState, Transform};
