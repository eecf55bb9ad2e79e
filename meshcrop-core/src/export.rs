//! Serialization of a cropped subgraph to glTF and packaging for download
use base64::{engine::general_purpose::STANDARD, Engine};
use nalgebra::Matrix4;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{ExportError, ExportResult};
use crate::glb::{self, GlbContainer};
use crate::scene::{Material, MeshNode, NodeKind, SceneNode};

/// Base name of every exported artifact
pub const ARTIFACT_BASE_NAME: &str = "cropped-model";

/// glTF component types
const FLOAT: u32 = 5126;
/// glTF buffer view targets
const ARRAY_BUFFER: u32 = 34962;

const GENERATOR: &str = concat!("meshcrop ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub binary: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { binary: true }
    }
}

/// What an exporter produced
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutput {
    Binary(Vec<u8>),
    Json(Value),
}

/// Model-export collaborator
pub trait Exporter {
    fn export(&self, root: &SceneNode, options: &ExportOptions) -> ExportResult<ExportOutput>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Glb,
    Gltf,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Glb => "glb",
            ArtifactFormat::Gltf => "gltf",
        }
    }
}

/// A downloadable export result
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub format: ArtifactFormat,
    /// Set when the binary export degraded to JSON
    pub warning: Option<String>,
}

impl Artifact {
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

/// Turn exporter output into a named artifact.
///
/// Binary output is read back as a GLB container first so a malformed buffer
/// is never offered. JSON output is still offered, flagged with a warning.
pub fn package(output: ExportOutput) -> ExportResult<Artifact> {
    match output {
        ExportOutput::Binary(bytes) => {
            GlbContainer::parse(&bytes)?;
            info!(bytes = bytes.len(), "binary export ready");
            Ok(Artifact {
                file_name: artifact_name(ArtifactFormat::Glb),
                bytes,
                format: ArtifactFormat::Glb,
                warning: None,
            })
        }
        ExportOutput::Json(document) => {
            let message = "Binary export failed; saved a JSON glTF instead. \
                           The file may be malformed."
                .to_string();
            warn!("{message}");
            Ok(Artifact {
                file_name: artifact_name(ArtifactFormat::Gltf),
                bytes: serde_json::to_vec_pretty(&document)?,
                format: ArtifactFormat::Gltf,
                warning: Some(message),
            })
        }
    }
}

pub fn artifact_name(format: ArtifactFormat) -> String {
    format!("{ARTIFACT_BASE_NAME}.{}", format.extension())
}

/// Wrap a mesh in the minimal exportable subgraph: one group, one mesh
pub fn wrap_mesh(mesh: MeshNode) -> SceneNode {
    SceneNode::group(vec![SceneNode::mesh(mesh)]).named(ARTIFACT_BASE_NAME)
}

/// Exporter writing glTF 2.0, as a GLB container or as JSON with an embedded buffer
#[derive(Debug, Clone, Copy, Default)]
pub struct GlbExporter;

impl Exporter for GlbExporter {
    fn export(&self, root: &SceneNode, options: &ExportOptions) -> ExportResult<ExportOutput> {
        let mut builder = DocumentBuilder::default();
        let root_index = builder.add_node(root)?;
        let (mut document, bin) = builder.finish(root_index);

        if options.binary {
            let json = serde_json::to_vec(&document)?;
            let bin = (!bin.is_empty()).then_some(bin.as_slice());
            Ok(ExportOutput::Binary(glb::write_glb(&json, bin)?))
        } else {
            if let Some(buffer) = document["buffers"].get_mut(0) {
                buffer["uri"] = Value::String(format!(
                    "data:application/octet-stream;base64,{}",
                    STANDARD.encode(&bin)
                ));
            }
            Ok(ExportOutput::Json(document))
        }
    }
}

/// Accumulates glTF JSON arrays and the binary buffer
#[derive(Default)]
struct DocumentBuilder {
    bin: Vec<u8>,
    nodes: Vec<Value>,
    meshes: Vec<Value>,
    materials: Vec<Value>,
    accessors: Vec<Value>,
    buffer_views: Vec<Value>,
}

impl DocumentBuilder {
    fn add_node(&mut self, node: &SceneNode) -> ExportResult<usize> {
        let children = node
            .children
            .iter()
            .map(|child| self.add_node(child))
            .collect::<ExportResult<Vec<_>>>()?;

        let mut value = json!({});
        if let Some(name) = &node.name {
            value["name"] = json!(name);
        }
        if node.local_transform != Matrix4::identity() {
            value["matrix"] = json!(node.local_transform.as_slice());
        }
        match &node.kind {
            NodeKind::Mesh(mesh) => {
                value["mesh"] = json!(self.add_mesh(mesh)?);
            }
            NodeKind::Group | NodeKind::Light | NodeKind::Camera | NodeKind::Empty => {}
        }
        if !children.is_empty() {
            value["children"] = json!(children);
        }

        self.nodes.push(value);
        Ok(self.nodes.len() - 1)
    }

    fn add_mesh(&mut self, mesh: &MeshNode) -> ExportResult<usize> {
        let geometry = &mesh.geometry;
        geometry
            .validate()
            .map_err(|e| ExportError::Collaborator(e.to_string()))?;
        if geometry.is_empty() {
            return Err(ExportError::Collaborator(
                "refusing to export a mesh without triangles".to_string(),
            ));
        }

        let vertex_count = geometry.vertex_count();
        let bounds = geometry.local_bounds();
        let mut attributes = json!({
            "POSITION": self.add_accessor(&geometry.positions, vertex_count, "VEC3", Some((
                bounds.min.coords.as_slice(),
                bounds.max.coords.as_slice(),
            ))),
        });
        if let Some(normals) = &geometry.normals {
            attributes["NORMAL"] = json!(self.add_accessor(normals, vertex_count, "VEC3", None));
        }
        if let Some(uvs) = &geometry.uvs {
            attributes["TEXCOORD_0"] = json!(self.add_accessor(uvs, vertex_count, "VEC2", None));
        }

        let material = self.add_material(&mesh.material);
        let mut value = json!({
            "primitives": [{
                "attributes": attributes,
                "material": material,
                "mode": 4
            }]
        });
        if let Some(name) = &mesh.name {
            value["name"] = json!(name);
        }
        self.meshes.push(value);
        Ok(self.meshes.len() - 1)
    }

    fn add_accessor(
        &mut self,
        data: &[f32],
        count: usize,
        kind: &str,
        min_max: Option<(&[f32], &[f32])>,
    ) -> usize {
        let byte_offset = self.bin.len();
        for value in data {
            self.bin.extend_from_slice(&value.to_le_bytes());
        }
        // f32 data keeps every view 4-byte aligned
        let byte_length = self.bin.len() - byte_offset;
        self.buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": byte_offset,
            "byteLength": byte_length,
            "target": ARRAY_BUFFER
        }));

        let mut accessor = json!({
            "bufferView": self.buffer_views.len() - 1,
            "byteOffset": 0,
            "componentType": FLOAT,
            "count": count,
            "type": kind
        });
        if let Some((min, max)) = min_max {
            accessor["min"] = json!(min);
            accessor["max"] = json!(max);
        }
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    fn add_material(&mut self, material: &Material) -> usize {
        let mut value = json!({
            "pbrMetallicRoughness": {
                "baseColorFactor": material.base_color,
                "metallicFactor": material.metallic,
                "roughnessFactor": material.roughness
            },
            "emissiveFactor": material.emissive,
            "doubleSided": material.double_sided
        });
        if let Some(name) = &material.name {
            value["name"] = json!(name);
        }
        self.materials.push(value);
        self.materials.len() - 1
    }

    fn finish(self, root: usize) -> (Value, Vec<u8>) {
        let mut document = json!({
            "asset": {
                "version": "2.0",
                "generator": GENERATOR
            },
            "scene": 0,
            "scenes": [{ "nodes": [root] }],
            "nodes": self.nodes,
            "meshes": self.meshes,
            "materials": self.materials,
            "accessors": self.accessors,
            "bufferViews": self.buffer_views,
        });
        if !self.bin.is_empty() {
            document["buffers"] = json!([{ "byteLength": self.bin.len() }]);
        }
        (document, self.bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MeshGeometry;

    struct JsonOnlyExporter;

    impl Exporter for JsonOnlyExporter {
        fn export(&self, _: &SceneNode, _: &ExportOptions) -> ExportResult<ExportOutput> {
            Ok(ExportOutput::Json(json!({ "asset": { "version": "2.0" } })))
        }
    }

    struct FailingExporter;

    impl Exporter for FailingExporter {
        fn export(&self, _: &SceneNode, _: &ExportOptions) -> ExportResult<ExportOutput> {
            Err(ExportError::Collaborator("disk full".to_string()))
        }
    }

    fn cube_root() -> SceneNode {
        wrap_mesh(MeshNode {
            name: Some("cube".to_string()),
            geometry: MeshGeometry::cube(2.0),
            material: Material {
                name: Some("stone".to_string()),
                ..Material::default()
            },
        })
    }

    fn package_cube(exporter: &impl Exporter) -> ExportResult<Artifact> {
        package(exporter.export(&cube_root(), &ExportOptions::default())?)
    }

    #[test]
    fn test_binary_export_is_valid_glb() {
        let output = GlbExporter
            .export(&cube_root(), &ExportOptions::default())
            .unwrap();
        let ExportOutput::Binary(bytes) = output else {
            panic!("expected binary output");
        };
        let container = GlbContainer::parse(&bytes).unwrap();
        let document = container.json_value().unwrap();

        assert_eq!(document["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(document["scenes"][0]["nodes"][0], 1);
        assert_eq!(document["nodes"][1]["children"][0], 0);
        assert_eq!(document["accessors"][0]["count"], 36);
        assert_eq!(document["accessors"][0]["max"][1], 1.0);
        assert_eq!(document["accessors"][2]["type"], "VEC2");
        assert_eq!(document["materials"][0]["name"], "stone");
        // 36 vertices * (3 + 3 + 2) floats * 4 bytes
        assert_eq!(container.bin.unwrap().len(), 36 * 8 * 4);
    }

    #[test]
    fn test_json_export_embeds_buffer() {
        let output = GlbExporter
            .export(&cube_root(), &ExportOptions { binary: false })
            .unwrap();
        let ExportOutput::Json(document) = output else {
            panic!("expected json output");
        };
        let uri = document["buffers"][0]["uri"].as_str().unwrap();
        assert!(uri.starts_with("data:application/octet-stream;base64,"));
    }

    #[test]
    fn test_binary_output_packages_as_glb() {
        let artifact = package_cube(&GlbExporter).unwrap();
        assert_eq!(artifact.file_name, "cropped-model.glb");
        assert_eq!(artifact.format, ArtifactFormat::Glb);
        assert!(!artifact.is_degraded());
    }

    #[test]
    fn test_json_output_is_flagged() {
        let artifact = package_cube(&JsonOnlyExporter).unwrap();
        assert_eq!(artifact.file_name, "cropped-model.gltf");
        assert_eq!(artifact.format, ArtifactFormat::Gltf);
        assert!(artifact.warning.as_deref().unwrap().contains("may be malformed"));
    }

    #[test]
    fn test_malformed_binary_is_not_offered() {
        let result = package(ExportOutput::Binary(vec![1, 2, 3]));
        assert!(matches!(result, Err(ExportError::Container(_))));
    }

    #[test]
    fn test_exporter_failure_propagates() {
        let result = package_cube(&FailingExporter);
        assert!(matches!(result, Err(ExportError::Collaborator(_))));
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let root = wrap_mesh(MeshNode {
            name: None,
            geometry: MeshGeometry::default(),
            material: Material::default(),
        });
        assert!(GlbExporter.export(&root, &ExportOptions::default()).is_err());
    }
}
