//! glTF/GLB model loading into a tagged scene graph
use std::fmt;
use std::path::{Path, PathBuf};

use gltf::{buffer, mesh};
use tracing::{debug, info, warn};

use crate::error::{LoadResult, ModelLoadError};
use crate::geometry::MeshGeometry;
use crate::scene::{Material, MeshNode, NodeKind, SceneNode, SceneRoot};
use crate::transform::Transform;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["gltf", "glb"];

/// Where a model comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Path(PathBuf),
    Url(String),
    /// Already fetched bytes; `base_dir` resolves external buffers of a .gltf
    Bytes {
        data: Vec<u8>,
        base_dir: Option<PathBuf>,
    },
}

impl ModelSource {
    /// Anything with a scheme is a URL, everything else a path
    pub fn parse(input: &str) -> Self {
        if input.contains("://") {
            Self::Url(input.to_string())
        } else {
            Self::Path(PathBuf::from(input))
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Path(path) => write!(f, "{}", path.display()),
            ModelSource::Url(url) => f.write_str(url),
            ModelSource::Bytes { data, .. } => write!(f, "<{} bytes>", data.len()),
        }
    }
}

/// Model-loading collaborator
pub trait ModelLoader {
    fn load(&self, source: &ModelSource) -> LoadResult<SceneRoot>;
}

/// Loader backed by the `gltf` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct GltfLoader;

impl ModelLoader for GltfLoader {
    fn load(&self, source: &ModelSource) -> LoadResult<SceneRoot> {
        info!(%source, "loading model");
        let scene = match source {
            ModelSource::Path(path) => load_path(path),
            ModelSource::Url(url) => load_url(url),
            ModelSource::Bytes { data, base_dir } => load_slice(data, base_dir.as_deref()),
        }?;
        info!(meshes = scene.mesh_count(), "model loaded");
        Ok(scene)
    }
}

pub fn can_load(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn load_path(path: &Path) -> LoadResult<SceneRoot> {
    if !can_load(path) {
        return Err(ModelLoadError::UnsupportedSource(format!(
            "{} is not a .gltf or .glb file",
            path.display()
        )));
    }
    let data = std::fs::read(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("./"));
    load_slice(&data, Some(base_dir))
}

fn load_url(url: &str) -> LoadResult<SceneRoot> {
    if let Some(path) = url.strip_prefix("file://") {
        return load_path(Path::new(path));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return fetch(url).and_then(|data| load_slice(&data, None));
    }
    Err(ModelLoadError::UnsupportedSource(url.to_string()))
}

#[cfg(feature = "http")]
fn fetch(url: &str) -> LoadResult<Vec<u8>> {
    let http_error = |e: reqwest::Error| ModelLoadError::Http {
        url: url.to_string(),
        message: e.to_string(),
    };
    let response = reqwest::blocking::get(url)
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(http_error)?;
    let bytes = response.bytes().map_err(http_error)?;
    debug!(url, bytes = bytes.len(), "fetched model");
    Ok(bytes.to_vec())
}

#[cfg(not(feature = "http"))]
fn fetch(url: &str) -> LoadResult<Vec<u8>> {
    Err(ModelLoadError::UnsupportedSource(format!(
        "{url} (built without http support)"
    )))
}

/// Parse a .gltf or .glb held in memory
pub fn load_slice(data: &[u8], base_dir: Option<&Path>) -> LoadResult<SceneRoot> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(data)?;
    let buffers = gltf::import_buffers(&document, base_dir, blob)?;

    let default_scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| ModelLoadError::Parse("no scenes found".to_string()))?;

    let nodes = default_scene
        .nodes()
        .map(|node| convert_node(&node, &buffers))
        .collect::<LoadResult<Vec<_>>>()?;
    let scene = SceneRoot::new(nodes);

    if scene.first_mesh().is_none() {
        return Err(ModelLoadError::NoMesh);
    }
    Ok(scene)
}

fn convert_node(node: &gltf::Node<'_>, buffers: &[buffer::Data]) -> LoadResult<SceneNode> {
    let mut children = match node.mesh() {
        Some(mesh) => convert_mesh(&mesh, buffers)?,
        None => Vec::new(),
    };
    let has_mesh = node.mesh().is_some();
    for child in node.children() {
        children.push(convert_node(&child, buffers)?);
    }

    let kind = if has_mesh || !children.is_empty() {
        NodeKind::Group
    } else if node.camera().is_some() {
        NodeKind::Camera
    } else if node.light().is_some() {
        NodeKind::Light
    } else {
        NodeKind::Empty
    };

    Ok(SceneNode {
        name: node.name().map(str::to_string),
        local_transform: Transform::from_columns(&node.transform().matrix()),
        kind,
        children,
    })
}

/// One mesh node per triangle primitive
fn convert_mesh(mesh: &mesh::Mesh<'_>, buffers: &[buffer::Data]) -> LoadResult<Vec<SceneNode>> {
    let mut nodes = Vec::new();
    for primitive in mesh.primitives() {
        if primitive.mode() != mesh::Mode::Triangles {
            warn!(
                mesh = mesh.index(),
                mode = ?primitive.mode(),
                "skipping non-triangle primitive"
            );
            continue;
        }

        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
        let Some(positions) = reader.read_positions() else {
            warn!(mesh = mesh.index(), "skipping primitive without positions");
            continue;
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
        let uvs: Option<Vec<[f32; 2]>> = reader
            .read_tex_coords(0)
            .map(|tex_coords| tex_coords.into_f32().collect());
        let indices: Option<Vec<u32>> = reader
            .read_indices()
            .map(|indices| indices.into_u32().collect());

        let geometry = MeshGeometry::from_indexed(
            &positions,
            normals.as_deref(),
            uvs.as_deref(),
            indices.as_deref(),
        )?;
        debug!(
            mesh = mesh.index(),
            triangles = geometry.triangle_count(),
            "read primitive"
        );

        nodes.push(SceneNode::mesh(MeshNode {
            name: mesh.name().map(str::to_string),
            geometry,
            material: convert_material(&primitive.material()),
        }));
    }
    Ok(nodes)
}

fn convert_material(material: &gltf::Material<'_>) -> Material {
    let pbr = material.pbr_metallic_roughness();
    Material {
        name: material.name().map(str::to_string),
        base_color: pbr.base_color_factor(),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        emissive: material.emissive_factor(),
        double_sided: material.double_sided(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{wrap_mesh, ExportOptions, ExportOutput, Exporter, GlbExporter};
    use nalgebra::Point3;

    fn cube_glb(material: Material) -> Vec<u8> {
        let root = wrap_mesh(MeshNode {
            name: Some("cube".to_string()),
            geometry: MeshGeometry::cube(2.0),
            material,
        })
        .with_transform(Transform::translation_matrix(0.0, 5.0, 0.0));
        match GlbExporter.export(&root, &ExportOptions::default()).unwrap() {
            ExportOutput::Binary(bytes) => bytes,
            ExportOutput::Json(_) => panic!("expected binary output"),
        }
    }

    #[test]
    fn test_load_glb_bytes() {
        let material = Material {
            name: Some("red".to_string()),
            base_color: [1.0, 0.0, 0.0, 1.0],
            ..Material::default()
        };
        let source = ModelSource::Bytes {
            data: cube_glb(material.clone()),
            base_dir: None,
        };
        let scene = GltfLoader.load(&source).unwrap();

        let instance = scene.first_mesh().unwrap();
        assert_eq!(instance.mesh.geometry, MeshGeometry::cube(2.0));
        assert_eq!(instance.mesh.material, material);
        assert_eq!(
            instance.to_world.transform_point(&Point3::origin()),
            Point3::new(0.0, 5.0, 0.0)
        );
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(
            ModelSource::parse("https://example.com/a.glb"),
            ModelSource::Url("https://example.com/a.glb".to_string())
        );
        assert_eq!(
            ModelSource::parse("models/a.glb"),
            ModelSource::Path(PathBuf::from("models/a.glb"))
        );
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let result = GltfLoader.load(&ModelSource::Path(PathBuf::from("model.stl")));
        assert!(matches!(result, Err(ModelLoadError::UnsupportedSource(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = GltfLoader.load(&ModelSource::Path(PathBuf::from(
            "/nonexistent/meshcrop/model.glb",
        )));
        assert!(matches!(result, Err(ModelLoadError::Io { .. })));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let source = ModelSource::Bytes {
            data: b"not a model".to_vec(),
            base_dir: None,
        };
        assert!(matches!(
            GltfLoader.load(&source),
            Err(ModelLoadError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_scheme() {
        let result = GltfLoader.load(&ModelSource::Url("ftp://host/a.glb".to_string()));
        assert!(matches!(result, Err(ModelLoadError::UnsupportedSource(_))));
    }
}
