//! Crop session: owns the loaded scene and crop region for one editing session
use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use tracing::{error, info, warn};

use crate::bounds::Aabb;
use crate::crop::{crop_geometry, CropStats};
use crate::error::{CropperError, ModelLoadError};
use crate::export::{self, Artifact, ExportOptions, Exporter};
use crate::loader::{ModelLoader, ModelSource};
use crate::region::{CropRegionController, TransformMode};
use crate::scene::{MeshNode, SceneRoot};
use crate::transform::LocalFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Loading,
    Ready,
    Cropping,
    Exported,
    Failed,
}

impl SessionState {
    /// A load or crop is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionState::Loading | SessionState::Cropping)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Cropping => "cropping",
            SessionState::Exported => "exported",
            SessionState::Failed => "failed",
        }
    }
}

/// The mesh being cropped, detached from the scene it came from
#[derive(Debug, Clone)]
struct TargetMesh {
    mesh: MeshNode,
    to_world: Matrix4<f32>,
}

/// Outcome of a successful Crop & Save
#[derive(Debug, Clone, PartialEq)]
pub struct CropReport {
    pub artifact: Artifact,
    pub stats: CropStats,
    pub bounds: Aabb,
}

#[derive(Debug, Default)]
pub struct CropSession {
    state: SessionState,
    scene: Option<SceneRoot>,
    target: Option<TargetMesh>,
    region: CropRegionController,
    last_error: Option<String>,
}

impl CropSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the crop action may be triggered
    pub fn is_ready(&self) -> bool {
        self.target.is_some()
            && matches!(
                self.state,
                SessionState::Ready | SessionState::Exported | SessionState::Failed
            )
    }

    pub fn scene(&self) -> Option<&SceneRoot> {
        self.scene.as_ref()
    }

    pub fn mesh(&self) -> Option<&MeshNode> {
        self.target.as_ref().map(|target| &target.mesh)
    }

    pub fn mesh_to_world(&self) -> Option<&Matrix4<f32>> {
        self.target.as_ref().map(|target| &target.to_world)
    }

    pub fn region(&self) -> &CropRegionController {
        &self.region
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Load a model and size the crop region to its first mesh
    pub fn open(
        &mut self,
        loader: &impl ModelLoader,
        source: &ModelSource,
    ) -> Result<(), CropperError> {
        if self.state.is_busy() {
            return Err(CropperError::Busy);
        }
        self.teardown();
        self.state = SessionState::Loading;

        let scene = match loader.load(source) {
            Ok(scene) => scene,
            Err(err) => return Err(self.fail(err.into())),
        };
        let Some(instance) = scene.first_mesh() else {
            return Err(self.fail(ModelLoadError::NoMesh.into()));
        };
        if scene.mesh_count() > 1 {
            warn!(
                meshes = scene.mesh_count(),
                "model has several meshes; only the first is cropped"
            );
        }

        let mesh_bounds = instance.world_bounds();
        self.target = Some(TargetMesh {
            mesh: instance.mesh.clone(),
            to_world: instance.to_world,
        });
        self.scene = Some(scene);
        self.region.initialize(&mesh_bounds);
        self.state = SessionState::Ready;
        info!(
            triangles = self.mesh().map_or(0, |mesh| mesh.geometry.triangle_count()),
            "session ready"
        );
        Ok(())
    }

    pub fn set_mode(&mut self, mode: TransformMode) {
        self.region.set_mode(mode);
    }

    pub fn drag(&mut self, delta: Vector3<f32>) -> bool {
        !self.state.is_busy() && self.region.drag(delta)
    }

    pub fn set_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        self.region.set_rotation(rotation);
    }

    /// Put the crop box back around the whole mesh
    pub fn reset_region(&mut self) {
        if let Some(target) = &self.target {
            let bounds = target.mesh.geometry.local_bounds().transform(&target.to_world);
            self.region.initialize(&bounds);
        }
    }

    /// Replace the crop box with one enclosing `bounds`, keeping the handle mode.
    /// Returns false when no mesh is loaded or an operation is in flight.
    pub fn fit_region(&mut self, bounds: &Aabb) -> bool {
        if self.target.is_none() || self.state.is_busy() {
            return false;
        }
        self.region.initialize(bounds);
        true
    }

    /// Crop & Save: classify, rebuild, export, package
    pub fn crop_and_save(&mut self, exporter: &impl Exporter) -> Result<CropReport, CropperError> {
        if self.state.is_busy() {
            return Err(CropperError::Busy);
        }
        if !self.is_ready() {
            return Err(CropperError::NotReady);
        }
        self.state = SessionState::Cropping;

        match self.run_crop(exporter) {
            Ok(report) => {
                self.state = SessionState::Exported;
                self.last_error = None;
                info!(
                    file = %report.artifact.file_name,
                    retained = report.stats.retained,
                    discarded = report.stats.discarded(),
                    "crop exported"
                );
                Ok(report)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn run_crop(&self, exporter: &impl Exporter) -> Result<CropReport, CropperError> {
        let bounds = self.region.ensure_attached()?;
        let target = self.target.as_ref().ok_or(CropperError::NotReady)?;

        let frame = LocalFrame::new(target.to_world)?;
        let cropped = crop_geometry(&target.mesh.geometry, &frame, &bounds)?;

        let root = export::wrap_mesh(MeshNode {
            name: target.mesh.name.clone(),
            geometry: cropped.geometry,
            material: target.mesh.material.clone(),
        });
        let output = exporter.export(&root, &ExportOptions { binary: true })?;
        let artifact = export::package(output)?;

        Ok(CropReport {
            artifact,
            stats: cropped.stats,
            bounds,
        })
    }

    fn fail(&mut self, err: CropperError) -> CropperError {
        error!(%err, "operation failed");
        self.last_error = Some(err.user_message());
        self.state = SessionState::Failed;
        err
    }

    fn teardown(&mut self) {
        self.scene = None;
        self.target = None;
        self.region.detach();
        self.last_error = None;
    }

    /// Close the editor and drop everything it held
    pub fn close(&mut self) {
        self.teardown();
        self.state = SessionState::Idle;
        info!("session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CropError, ExportError};
    use crate::export::{ExportOutput, GlbExporter};
    use crate::geometry::MeshGeometry;
    use crate::region::CropBox;
    use crate::scene::{Material, SceneNode};
    use nalgebra::Point3;

    struct StaticLoader(SceneRoot);

    impl ModelLoader for StaticLoader {
        fn load(&self, _: &ModelSource) -> Result<SceneRoot, ModelLoadError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenLoader;

    impl ModelLoader for BrokenLoader {
        fn load(&self, source: &ModelSource) -> Result<SceneRoot, ModelLoadError> {
            Err(ModelLoadError::Http {
                url: source.to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    struct BrokenExporter;

    impl Exporter for BrokenExporter {
        fn export(
            &self,
            _: &SceneNode,
            _: &ExportOptions,
        ) -> Result<ExportOutput, ExportError> {
            Err(ExportError::Collaborator("out of memory".to_string()))
        }
    }

    fn cube_scene() -> SceneRoot {
        SceneRoot::new(vec![SceneNode::mesh(MeshNode {
            name: Some("cube".to_string()),
            geometry: MeshGeometry::cube(2.0),
            material: Material::default(),
        })])
    }

    fn source() -> ModelSource {
        ModelSource::Url("https://example.com/cube.glb".to_string())
    }

    fn ready_session() -> CropSession {
        let mut session = CropSession::new();
        session.open(&StaticLoader(cube_scene()), &source()).unwrap();
        session
    }

    #[test]
    fn test_open_initializes_region() {
        let session = ready_session();
        assert_eq!(session.state(), SessionState::Ready);
        let bounds = session.region().current_world_bounds().unwrap();
        assert_eq!(bounds.min, Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(bounds.max, Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_whole_box_exports_everything() {
        let mut session = ready_session();
        let report = session.crop_and_save(&GlbExporter).unwrap();
        assert_eq!(session.state(), SessionState::Exported);
        assert_eq!(report.stats.retained, 12);
        assert_eq!(report.artifact.file_name, "cropped-model.glb");
        assert!(session.is_ready());
    }

    #[test]
    fn test_empty_selection_fails_then_retry_succeeds() {
        let mut session = ready_session();
        session.drag(Vector3::new(100.0, 0.0, 0.0));

        let err = session.crop_and_save(&GlbExporter).unwrap_err();
        assert!(matches!(err, CropperError::Crop(CropError::EmptySelection)));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.last_error().unwrap().contains("try resizing"));
        assert!(session.is_ready());

        session.drag(Vector3::new(-100.0, 0.0, 0.0));
        assert!(session.crop_and_save(&GlbExporter).is_ok());
        assert_eq!(session.state(), SessionState::Exported);
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_load_failure() {
        let mut session = CropSession::new();
        let err = session.open(&BrokenLoader, &source()).unwrap_err();
        assert!(matches!(err, CropperError::Load(ModelLoadError::Http { .. })));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(!session.is_ready());
        assert!(matches!(
            session.crop_and_save(&GlbExporter),
            Err(CropperError::NotReady)
        ));
    }

    #[test]
    fn test_scene_without_mesh_fails_load() {
        let mut session = CropSession::new();
        let err = session
            .open(&StaticLoader(SceneRoot::default()), &source())
            .unwrap_err();
        assert!(matches!(err, CropperError::Load(ModelLoadError::NoMesh)));
    }

    #[test]
    fn test_export_failure_keeps_session_usable() {
        let mut session = ready_session();
        let err = session.crop_and_save(&BrokenExporter).unwrap_err();
        assert!(matches!(err, CropperError::Export(_)));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.crop_and_save(&GlbExporter).is_ok());
    }

    #[test]
    fn test_busy_rejects_second_crop() {
        let mut session = ready_session();
        session.state = SessionState::Cropping;
        assert!(matches!(
            session.crop_and_save(&GlbExporter),
            Err(CropperError::Busy)
        ));
        assert!(!session.drag(Vector3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_detached_handle_blocks_crop() {
        let mut session = ready_session();
        session
            .region
            .replace_box(CropBox::new(Point3::origin(), Vector3::new(4.0, 4.0, 4.0)));
        assert!(matches!(
            session.crop_and_save(&GlbExporter),
            Err(CropperError::HandleDetached)
        ));

        session.set_mode(TransformMode::Scale);
        assert!(session.crop_and_save(&GlbExporter).is_ok());
    }

    #[test]
    fn test_reset_region_restores_mesh_bounds() {
        let mut session = ready_session();
        session.set_mode(TransformMode::Scale);
        session.drag(Vector3::new(-1.0, -1.0, -1.0));
        session.reset_region();
        assert_eq!(session.region().mode(), TransformMode::Scale);
        assert_eq!(
            session.region().current_world_bounds().unwrap().size(),
            Vector3::new(2.0, 2.0, 2.0)
        );
    }

    #[test]
    fn test_fit_region_to_explicit_bounds() {
        let mut session = ready_session();
        let bounds = Aabb::new(Point3::new(-2.0, 0.5, -2.0), Point3::new(2.0, 2.0, 2.0));
        assert!(session.fit_region(&bounds));
        assert_eq!(session.region().current_world_bounds(), Some(bounds));

        let report = session.crop_and_save(&GlbExporter).unwrap();
        assert_eq!(report.stats.retained, 2);
        assert!(!CropSession::new().fit_region(&bounds));
    }

    #[test]
    fn test_close_returns_to_idle() {
        let mut session = ready_session();
        session.close();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.mesh().is_none());
        assert!(session.region().crop_box().is_none());
    }
}
