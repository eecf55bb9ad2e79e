//! Non-indexed triangle geometry with flat attribute buffers
use nalgebra::{Point3, Vector3};

use crate::bounds::Aabb;
use crate::error::{CropError, CropResult, ModelLoadError, LoadResult};

/// Floats per position or normal
pub const VEC3_STRIDE: usize = 3;
/// Floats per texture coordinate
pub const UV_STRIDE: usize = 2;
/// Position floats per triangle
pub const TRIANGLE_STRIDE: usize = 3 * VEC3_STRIDE;

/// A triangle face defined by three local-space points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub vertices: [Point3<f32>; 3],
}

impl Triangle {
    pub fn new(v0: Point3<f32>, v1: Point3<f32>, v2: Point3<f32>) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// Face normal from the winding order, zero for degenerate faces
    pub fn calculate_normal(&self) -> Vector3<f32> {
        let [v0, v1, v2] = self.vertices;

        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        edge1
            .cross(&edge2)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::zeros)
    }
}

/// Non-indexed triangle list: every 3 consecutive vertices form one triangle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGeometry {
    pub positions: Vec<f32>,
    pub normals: Option<Vec<f32>>,
    pub uvs: Option<Vec<f32>>,
}

impl MeshGeometry {
    pub fn new(positions: Vec<f32>) -> Self {
        Self {
            positions,
            normals: None,
            uvs: None,
        }
    }

    pub fn with_normals(mut self, normals: Vec<f32>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<f32>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    /// Expand indexed attribute arrays into non-indexed form.
    ///
    /// Without indices the arrays are taken as already non-indexed.
    pub fn from_indexed(
        positions: &[[f32; 3]],
        normals: Option<&[[f32; 3]]>,
        uvs: Option<&[[f32; 2]]>,
        indices: Option<&[u32]>,
    ) -> LoadResult<Self> {
        let vertex_count = positions.len();
        if let Some(normals) = normals {
            if normals.len() != vertex_count {
                return Err(ModelLoadError::InvalidGeometry(format!(
                    "{} normals for {} positions",
                    normals.len(),
                    vertex_count
                )));
            }
        }
        if let Some(uvs) = uvs {
            if uvs.len() != vertex_count {
                return Err(ModelLoadError::InvalidGeometry(format!(
                    "{} texture coordinates for {} positions",
                    uvs.len(),
                    vertex_count
                )));
            }
        }

        let order: Vec<usize> = match indices {
            Some(indices) => {
                if indices.len() % 3 != 0 {
                    return Err(ModelLoadError::InvalidGeometry(format!(
                        "index count {} is not a multiple of 3",
                        indices.len()
                    )));
                }
                indices
                    .iter()
                    .map(|&index| {
                        let index = index as usize;
                        if index < vertex_count {
                            Ok(index)
                        } else {
                            Err(ModelLoadError::InvalidGeometry(format!(
                                "index {index} out of range for {vertex_count} vertices"
                            )))
                        }
                    })
                    .collect::<LoadResult<_>>()?
            }
            None => {
                if vertex_count % 3 != 0 {
                    return Err(ModelLoadError::InvalidGeometry(format!(
                        "vertex count {vertex_count} is not a multiple of 3"
                    )));
                }
                (0..vertex_count).collect()
            }
        };

        let positions = order.iter().flat_map(|&i| positions[i]).collect();
        let normals = normals.map(|normals| order.iter().flat_map(|&i| normals[i]).collect());
        let uvs = uvs.map(|uvs| order.iter().flat_map(|&i| uvs[i]).collect());

        Ok(Self {
            positions,
            normals,
            uvs,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / VEC3_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / TRIANGLE_STRIDE
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, vertex: usize) -> Point3<f32> {
        let base = vertex * VEC3_STRIDE;
        Point3::new(
            self.positions[base],
            self.positions[base + 1],
            self.positions[base + 2],
        )
    }

    pub fn triangle(&self, index: usize) -> Triangle {
        let first = index * 3;
        Triangle::new(
            self.position(first),
            self.position(first + 1),
            self.position(first + 2),
        )
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.triangle_count()).map(|index| self.triangle(index))
    }

    pub fn local_bounds(&self) -> Aabb {
        (0..self.vertex_count()).fold(Aabb::empty(), |aabb, vertex| {
            aabb.expand(&self.position(vertex))
        })
    }

    /// Per-vertex normals taken from each triangle's face normal
    pub fn compute_vertex_normals(&self) -> Vec<f32> {
        let mut normals = Vec::with_capacity(self.positions.len());
        for triangle in self.triangles() {
            let normal = triangle.calculate_normal();
            for _ in 0..3 {
                normals.extend_from_slice(normal.as_slice());
            }
        }
        normals
    }

    /// Check that the buffers describe whole triangles with matching attributes
    pub fn validate(&self) -> CropResult<()> {
        if self.positions.len() % TRIANGLE_STRIDE != 0 {
            return Err(CropError::geometry(format!(
                "position length {} is not a multiple of {TRIANGLE_STRIDE}",
                self.positions.len()
            )));
        }
        let vertex_count = self.vertex_count();
        if let Some(normals) = &self.normals {
            if normals.len() != vertex_count * VEC3_STRIDE {
                return Err(CropError::geometry(format!(
                    "normal attribute has {} vertices, position has {vertex_count}",
                    normals.len() / VEC3_STRIDE
                )));
            }
        }
        if let Some(uvs) = &self.uvs {
            if uvs.len() != vertex_count * UV_STRIDE {
                return Err(CropError::geometry(format!(
                    "uv attribute has {} vertices, position has {vertex_count}",
                    uvs.len() / UV_STRIDE
                )));
            }
        }
        Ok(())
    }

    /// Build the 12-triangle cube centered at the origin, with normals and UVs
    pub fn cube(size: f32) -> Self {
        let half = size / 2.0;
        // (normal, four corners counter-clockwise seen from outside)
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            // Front
            (
                [0.0, 0.0, 1.0],
                [
                    [-half, -half, half],
                    [half, -half, half],
                    [half, half, half],
                    [-half, half, half],
                ],
            ),
            // Back
            (
                [0.0, 0.0, -1.0],
                [
                    [half, -half, -half],
                    [-half, -half, -half],
                    [-half, half, -half],
                    [half, half, -half],
                ],
            ),
            // Top
            (
                [0.0, 1.0, 0.0],
                [
                    [-half, half, half],
                    [half, half, half],
                    [half, half, -half],
                    [-half, half, -half],
                ],
            ),
            // Bottom
            (
                [0.0, -1.0, 0.0],
                [
                    [-half, -half, -half],
                    [half, -half, -half],
                    [half, -half, half],
                    [-half, -half, half],
                ],
            ),
            // Right
            (
                [1.0, 0.0, 0.0],
                [
                    [half, -half, half],
                    [half, -half, -half],
                    [half, half, -half],
                    [half, half, half],
                ],
            ),
            // Left
            (
                [-1.0, 0.0, 0.0],
                [
                    [-half, -half, -half],
                    [-half, -half, half],
                    [-half, half, half],
                    [-half, half, -half],
                ],
            ),
        ];
        let quad_uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        let mut positions = Vec::with_capacity(36 * VEC3_STRIDE);
        let mut normals = Vec::with_capacity(36 * VEC3_STRIDE);
        let mut uvs = Vec::with_capacity(36 * UV_STRIDE);
        for (normal, corners) in &faces {
            for corner in [0, 1, 2, 0, 2, 3] {
                positions.extend_from_slice(&corners[corner]);
                normals.extend_from_slice(normal);
                uvs.extend_from_slice(&quad_uvs[corner]);
            }
        }

        Self::new(positions).with_normals(normals).with_uvs(uvs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_counts() {
        let cube = MeshGeometry::cube(2.0);
        assert_eq!(cube.triangle_count(), 12);
        assert_eq!(cube.vertex_count(), 36);
        assert!(cube.validate().is_ok());
    }

    #[test]
    fn test_cube_winding_matches_normals() {
        let cube = MeshGeometry::cube(2.0);
        let normals = cube.normals.as_ref().unwrap();
        for (index, triangle) in cube.triangles().enumerate() {
            let stored = Vector3::from_column_slice(&normals[index * 9..index * 9 + 3]);
            assert!((triangle.calculate_normal() - stored).norm() < 1e-6);
        }
    }

    #[test]
    fn test_from_indexed_expands_quad() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let indices = [0, 1, 2, 0, 2, 3];
        let geometry =
            MeshGeometry::from_indexed(&positions, None, Some(&uvs), Some(&indices)).unwrap();
        assert_eq!(geometry.triangle_count(), 2);
        assert_eq!(geometry.uvs.as_ref().unwrap().len(), 12);
        assert_eq!(geometry.position(3), Point3::new(0.0, 0.0, 0.0));
        assert_eq!(geometry.position(5), Point3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_from_indexed_rejects_out_of_range() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]];
        let result = MeshGeometry::from_indexed(&positions, None, None, Some(&[0, 1, 3]));
        assert!(matches!(result, Err(ModelLoadError::InvalidGeometry(_))));
    }

    #[test]
    fn test_validate_catches_uv_mismatch() {
        let geometry = MeshGeometry::new(vec![0.0; 9]).with_uvs(vec![0.0; 4]);
        assert!(matches!(
            geometry.validate(),
            Err(CropError::GeometryBuild { .. })
        ));
    }

    #[test]
    fn test_degenerate_normal_is_zero() {
        let point = Point3::new(1.0, 1.0, 1.0);
        let triangle = Triangle::new(point, point, point);
        assert_eq!(triangle.calculate_normal(), Vector3::zeros());
    }
}
