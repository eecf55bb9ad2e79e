//! meshcrop for the browser: the crop session behind a wasm-bindgen API.
//!
//! The page hands over GLB bytes, drives the crop box, and receives the
//! cropped artifact as bytes to offer for download.

use meshcrop_core::{
    CropSession, CropperError, GlbExporter, GltfLoader, ModelSource, TransformMode,
};
use nalgebra::Vector3;
use wasm_bindgen::prelude::*;

fn to_js(err: CropperError) -> JsValue {
    JsValue::from_str(&err.user_message())
}

/// A cropped model ready for download
#[wasm_bindgen]
pub struct WebArtifact {
    file_name: String,
    bytes: Vec<u8>,
    warning: Option<String>,
}

#[wasm_bindgen]
impl WebArtifact {
    #[wasm_bindgen(getter)]
    pub fn file_name(&self) -> String {
        self.file_name.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Present when the binary export degraded to JSON
    #[wasm_bindgen(getter)]
    pub fn warning(&self) -> Option<String> {
        self.warning.clone()
    }
}

#[wasm_bindgen]
#[derive(Default)]
pub struct WebCropper {
    session: CropSession,
}

#[wasm_bindgen]
impl WebCropper {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WebCropper {
        Self::default()
    }

    /// Load a .glb (or self-contained .gltf) and size the crop box to its first mesh
    pub fn load_glb(&mut self, bytes: &[u8]) -> Result<(), JsValue> {
        self.open(bytes).map_err(to_js)
    }

    /// "translate" or "scale"
    pub fn set_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        let mode: TransformMode = mode.parse().map_err(|e: String| JsValue::from_str(&e))?;
        self.session.set_mode(mode);
        Ok(())
    }

    pub fn mode(&self) -> String {
        self.session.region().mode().label().to_string()
    }

    /// Drag the handle in world units; false when nothing moved
    pub fn drag(&mut self, dx: f32, dy: f32, dz: f32) -> bool {
        self.session.drag(Vector3::new(dx, dy, dz))
    }

    /// World bounds of the crop box as [min x, y, z, max x, y, z], empty when there is no box
    pub fn bounds(&self) -> Vec<f32> {
        self.session
            .region()
            .current_world_bounds()
            .map(|b| vec![b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z])
            .unwrap_or_default()
    }

    pub fn state(&self) -> String {
        self.session.state().label().to_string()
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub fn reset(&mut self) {
        self.session.reset_region();
    }

    pub fn crop_and_save(&mut self) -> Result<WebArtifact, JsValue> {
        let artifact = self.crop().map_err(to_js)?;
        if let Some(warning) = &artifact.warning {
            web_sys::console::warn_1(&JsValue::from_str(warning));
        }
        Ok(artifact)
    }

    pub fn close(&mut self) {
        self.session.close();
    }
}

impl WebCropper {
    fn open(&mut self, bytes: &[u8]) -> Result<(), CropperError> {
        let source = ModelSource::Bytes {
            data: bytes.to_vec(),
            base_dir: None,
        };
        self.session.open(&GltfLoader, &source)
    }

    fn crop(&mut self) -> Result<WebArtifact, CropperError> {
        let report = self.session.crop_and_save(&GlbExporter)?;
        tracing::info!(
            file = %report.artifact.file_name,
            retained = report.stats.retained,
            "crop ready for download"
        );
        Ok(WebArtifact {
            file_name: report.artifact.file_name,
            bytes: report.artifact.bytes,
            warning: report.artifact.warning,
        })
    }
}

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
    tracing::info!("meshcrop web initialized");
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcrop_core::{
        export, CropError, ExportOptions, ExportOutput, Exporter, Material, MeshGeometry, MeshNode,
    };

    fn cube_glb() -> Vec<u8> {
        let root = export::wrap_mesh(MeshNode {
            name: Some("cube".to_string()),
            geometry: MeshGeometry::cube(2.0),
            material: Material::default(),
        });
        match GlbExporter.export(&root, &ExportOptions::default()).unwrap() {
            ExportOutput::Binary(bytes) => bytes,
            ExportOutput::Json(_) => panic!("expected binary output"),
        }
    }

    #[test]
    fn test_load_and_crop_top_face() {
        let mut cropper = WebCropper::new();
        cropper.open(&cube_glb()).unwrap();
        assert_eq!(cropper.state(), "ready");
        assert_eq!(cropper.bounds(), vec![-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]);

        assert!(cropper.drag(0.0, 1.0, 0.0));
        let artifact = cropper.crop().unwrap();
        assert_eq!(artifact.file_name(), "cropped-model.glb");
        assert_eq!(&artifact.bytes()[..4], b"glTF");
        assert!(artifact.warning().is_none());
        assert_eq!(cropper.state(), "exported");
    }

    #[test]
    fn test_empty_selection() {
        let mut cropper = WebCropper::new();
        cropper.open(&cube_glb()).unwrap();
        cropper.drag(10.0, 0.0, 0.0);
        let err = cropper.crop().err().unwrap();
        assert!(matches!(err, CropperError::Crop(CropError::EmptySelection)));
        assert_eq!(cropper.state(), "failed");

        cropper.reset();
        assert!(cropper.crop().is_ok());
    }

    #[test]
    fn test_no_model_loaded() {
        let mut cropper = WebCropper::new();
        assert!(cropper.bounds().is_empty());
        assert!(!cropper.is_ready());
        assert!(!cropper.drag(1.0, 0.0, 0.0));
        assert!(matches!(cropper.crop(), Err(CropperError::NotReady)));
    }

    #[test]
    fn test_close_drops_model() {
        let mut cropper = WebCropper::new();
        cropper.open(&cube_glb()).unwrap();
        cropper.close();
        assert_eq!(cropper.state(), "idle");
        assert!(cropper.bounds().is_empty());
    }
}
