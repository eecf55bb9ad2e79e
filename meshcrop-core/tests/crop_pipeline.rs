//! End-to-end crop pipeline tests: GLB bytes in, cropped artifact out.

use meshcrop_core::{
    crop_geometry, export, Aabb, CropError, CropSession, CropperError, ExportError, ExportOptions,
    ExportOutput, Exporter, GlbExporter, GltfLoader, LocalFrame, Material, MeshGeometry,
    MeshNode, ModelLoader, ModelSource, SceneNode, SessionState, Transform, TransformMode,
};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use proptest::prelude::*;
use serde_json::json;

fn cube_source(offset: Vector3<f32>) -> ModelSource {
    let root = export::wrap_mesh(MeshNode {
        name: Some("cube".to_string()),
        geometry: MeshGeometry::cube(2.0),
        material: Material::default(),
    })
    .with_transform(Transform::translation_matrix(offset.x, offset.y, offset.z));
    let ExportOutput::Binary(data) = GlbExporter.export(&root, &ExportOptions::default()).unwrap()
    else {
        panic!("expected binary output");
    };
    ModelSource::Bytes {
        data,
        base_dir: None,
    }
}

/// Exporter whose binary path is broken and falls back to JSON
struct JsonFallbackExporter;

impl Exporter for JsonFallbackExporter {
    fn export(
        &self,
        root: &SceneNode,
        _: &ExportOptions,
    ) -> Result<ExportOutput, ExportError> {
        GlbExporter.export(root, &ExportOptions { binary: false })
    }
}

#[test]
fn test_top_face_crop() {
    let mut session = CropSession::new();
    session.open(&GltfLoader, &cube_source(Vector3::zeros())).unwrap();

    // Box spans y in [0, 2]; only the top face lies fully inside
    assert!(session.drag(Vector3::new(0.0, 1.0, 0.0)));
    let report = session.crop_and_save(&GlbExporter).unwrap();

    assert_eq!(report.artifact.file_name, "cropped-model.glb");
    assert!(report.artifact.warning.is_none());
    assert_eq!(report.stats.retained, 2);
    assert_eq!(report.stats.outside, 2);
    assert_eq!(report.stats.straddling, 8);

    let reloaded = GltfLoader
        .load(&ModelSource::Bytes {
            data: report.artifact.bytes,
            base_dir: None,
        })
        .unwrap();
    let geometry = &reloaded.first_mesh().unwrap().mesh.geometry;
    assert_eq!(geometry.positions.len(), 18);
    assert_eq!(geometry.uvs.as_ref().unwrap().len(), 12);
    assert!(geometry.positions.chunks(3).all(|p| p[1] == 1.0));
}

#[test]
fn test_crop_result_stays_in_local_space() {
    let mut session = CropSession::new();
    session
        .open(&GltfLoader, &cube_source(Vector3::new(0.0, 5.0, 0.0)))
        .unwrap();
    let bounds = session.region().current_world_bounds().unwrap();
    assert_eq!(bounds.min, Point3::new(-1.0, 4.0, -1.0));

    session.drag(Vector3::new(0.0, 1.0, 0.0));
    let report = session.crop_and_save(&GlbExporter).unwrap();
    assert_eq!(report.stats.retained, 2);

    let reloaded = GltfLoader
        .load(&ModelSource::Bytes {
            data: report.artifact.bytes,
            base_dir: None,
        })
        .unwrap();
    let geometry = &reloaded.first_mesh().unwrap().mesh.geometry;
    assert!(geometry.positions.chunks(3).all(|p| p[1] == 1.0));
}

#[test]
fn test_shrunk_box_reports_empty_selection() {
    let mut session = CropSession::new();
    session.open(&GltfLoader, &cube_source(Vector3::zeros())).unwrap();

    session.set_mode(TransformMode::Scale);
    session.drag(Vector3::new(-1.5, -1.5, -1.5));
    let err = session.crop_and_save(&GlbExporter).unwrap_err();

    assert!(matches!(err, CropperError::Crop(CropError::EmptySelection)));
    assert_eq!(session.state(), SessionState::Failed);
    assert!(session.last_error().unwrap().contains("try resizing the box"));
}

#[test]
fn test_json_fallback_is_offered_with_warning() {
    let mut session = CropSession::new();
    session.open(&GltfLoader, &cube_source(Vector3::zeros())).unwrap();

    let report = session.crop_and_save(&JsonFallbackExporter).unwrap();
    assert_eq!(session.state(), SessionState::Exported);
    assert_eq!(report.artifact.file_name, "cropped-model.gltf");
    assert!(report.artifact.is_degraded());

    let document: serde_json::Value = serde_json::from_slice(&report.artifact.bytes).unwrap();
    assert_eq!(document["asset"]["version"], json!("2.0"));
}

fn arb_point() -> impl Strategy<Value = Point3<f32>> {
    prop::array::uniform3(-10.0..10.0f32).prop_map(|[x, y, z]| Point3::new(x, y, z))
}

fn arb_frame() -> impl Strategy<Value = LocalFrame> {
    (
        prop::array::uniform3(-50.0..50.0f32),
        prop::array::uniform3(-3.1..3.1f32),
        prop::array::uniform3(0.5..4.0f32),
    )
        .prop_map(|(t, r, s)| {
            let matrix = Transform::trs_matrix(
                &Vector3::from(t),
                &UnitQuaternion::from_euler_angles(r[0], r[1], r[2]),
                &Vector3::from(s),
            );
            LocalFrame::new(matrix).unwrap()
        })
}

proptest! {
    #[test]
    fn proptest_local_world_round_trip(frame in arb_frame(), point in arb_point()) {
        let back = frame.to_local(&frame.to_world(&point));
        prop_assert!((back - point).norm() < 1e-2);
    }

    #[test]
    fn proptest_cropped_attributes_stay_aligned(
        frame in arb_frame(),
        corner_a in arb_point(),
        corner_b in arb_point(),
    ) {
        let source = MeshGeometry::cube(2.0);
        let bounds = Aabb::from_points(&[corner_a, corner_b]).transform(frame.to_world_matrix());

        match crop_geometry(&source, &frame, &bounds) {
            Ok(cropped) => {
                let geometry = cropped.geometry;
                prop_assert_eq!(geometry.positions.len() % 9, 0);
                let vertices = geometry.vertex_count();
                prop_assert_eq!(geometry.normals.as_ref().map(Vec::len), Some(vertices * 3));
                prop_assert_eq!(geometry.uvs.as_ref().map(Vec::len), Some(vertices * 2));
                prop_assert_eq!(cropped.stats.retained + cropped.stats.discarded(), 12);
                prop_assert_eq!(cropped.stats.retained, geometry.triangle_count());
            }
            Err(err) => prop_assert!(matches!(err, CropError::EmptySelection), "{err}"),
        }
    }
}
