//! Scene graph with explicitly tagged node kinds
use nalgebra::Matrix4;
use serde::Serialize;

use crate::bounds::Aabb;
use crate::geometry::MeshGeometry;

/// Surface parameters carried over from the source model
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
    pub double_sided: bool,
}

impl Default for Material {
    /// glTF's default material
    fn default() -> Self {
        Self {
            name: None,
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 1.0,
            roughness: 1.0,
            emissive: [0.0, 0.0, 0.0],
            double_sided: false,
        }
    }
}

/// A single triangle list and its material
#[derive(Debug, Clone, PartialEq)]
pub struct MeshNode {
    pub name: Option<String>,
    pub geometry: MeshGeometry,
    pub material: Material,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(MeshNode),
    Light,
    Camera,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: Option<String>,
    pub local_transform: Matrix4<f32>,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            name: None,
            local_transform: Matrix4::identity(),
            kind,
            children: Vec::new(),
        }
    }

    pub fn group(children: Vec<SceneNode>) -> Self {
        Self {
            children,
            ..Self::new(NodeKind::Group)
        }
    }

    pub fn mesh(mesh: MeshNode) -> Self {
        Self::new(NodeKind::Mesh(mesh))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_transform(mut self, local_transform: Matrix4<f32>) -> Self {
        self.local_transform = local_transform;
        self
    }

    /// Depth-first visit of every mesh with its accumulated world matrix.
    /// Stops early when the visitor returns `false`.
    fn visit_meshes<'a>(
        &'a self,
        parent: &Matrix4<f32>,
        visitor: &mut impl FnMut(&'a MeshNode, Matrix4<f32>) -> bool,
    ) -> bool {
        let world = parent * self.local_transform;
        match &self.kind {
            NodeKind::Mesh(mesh) => {
                if !visitor(mesh, world) {
                    return false;
                }
            }
            NodeKind::Group | NodeKind::Light | NodeKind::Camera | NodeKind::Empty => {}
        }
        self.children
            .iter()
            .all(|child| child.visit_meshes(&world, visitor))
    }
}

/// A mesh located in the scene
#[derive(Debug, Clone, Copy)]
pub struct MeshInstance<'a> {
    pub mesh: &'a MeshNode,
    pub to_world: Matrix4<f32>,
}

impl MeshInstance<'_> {
    pub fn world_bounds(&self) -> Aabb {
        self.mesh.geometry.local_bounds().transform(&self.to_world)
    }
}

/// Counts and extent of a loaded model, as reported by `inspect`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneSummary {
    pub meshes: usize,
    pub triangles: usize,
    pub vertices: usize,
    /// `None` when the scene has no geometry
    pub bounds: Option<[[f32; 3]; 2]>,
}

/// Root of a loaded model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneRoot {
    pub nodes: Vec<SceneNode>,
}

impl SceneRoot {
    pub fn new(nodes: Vec<SceneNode>) -> Self {
        Self { nodes }
    }

    pub fn for_each_mesh<'a>(&'a self, mut f: impl FnMut(MeshInstance<'a>)) {
        let identity = Matrix4::identity();
        for node in &self.nodes {
            node.visit_meshes(&identity, &mut |mesh, to_world| {
                f(MeshInstance { mesh, to_world });
                true
            });
        }
    }

    /// First mesh with position data, in depth-first order
    pub fn first_mesh(&self) -> Option<MeshInstance<'_>> {
        let identity = Matrix4::identity();
        let mut found = None;
        for node in &self.nodes {
            let finished = !node.visit_meshes(&identity, &mut |mesh, to_world| {
                if mesh.geometry.is_empty() {
                    return true;
                }
                found = Some(MeshInstance { mesh, to_world });
                false
            });
            if finished {
                break;
            }
        }
        found
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.for_each_mesh(|_| count += 1);
        count
    }

    pub fn world_bounds(&self) -> Aabb {
        let mut bounds = Aabb::empty();
        self.for_each_mesh(|instance| bounds = bounds.union(instance.world_bounds()));
        bounds
    }

    pub fn summary(&self) -> SceneSummary {
        let mut summary = SceneSummary {
            meshes: 0,
            triangles: 0,
            vertices: 0,
            bounds: None,
        };
        self.for_each_mesh(|instance| {
            summary.meshes += 1;
            summary.triangles += instance.mesh.geometry.triangle_count();
            summary.vertices += instance.mesh.geometry.vertex_count();
        });
        let bounds = self.world_bounds();
        if !bounds.is_empty() {
            summary.bounds = Some([bounds.min.coords.into(), bounds.max.coords.into()]);
        }
        summary
    }
}
