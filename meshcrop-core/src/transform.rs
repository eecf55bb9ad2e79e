//! Transformation matrices, rotation state, and local/world frames
use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};

use crate::error::{CropError, CropResult};

/// Rotation state around three axes (in radians)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RotationState {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Rotate by delta amounts (in radians)
    pub fn rotate(&mut self, dx: f32, dy: f32, dz: f32) {
        self.x += dx;
        self.y += dy;
        self.z += dz;
    }
}

impl Default for RotationState {
    fn default() -> Self {
        Self::zero()
    }
}

/// Transform builder for 3D transformations
pub struct Transform;

impl Transform {
    /// Create a rotation matrix from a rotation state
    pub fn rotation_matrix(rotation: &RotationState) -> Matrix4<f32> {
        let rx = Matrix4::new_rotation(Vector3::new(rotation.x, 0.0, 0.0));
        let ry = Matrix4::new_rotation(Vector3::new(0.0, rotation.y, 0.0));
        let rz = Matrix4::new_rotation(Vector3::new(0.0, 0.0, rotation.z));

        // Apply rotations in order: Z, Y, X
        rz * ry * rx
    }

    pub fn translation_matrix(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    pub fn scale_matrix(sx: f32, sy: f32, sz: f32) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
    }

    /// Compose translation * rotation * scale, the glTF node order
    pub fn trs_matrix(
        translation: &Vector3<f32>,
        rotation: &UnitQuaternion<f32>,
        scale: &Vector3<f32>,
    ) -> Matrix4<f32> {
        Matrix4::new_translation(translation)
            * rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(scale)
    }

    /// Column-major 4x4 array, as stored in glTF
    pub fn from_columns(columns: &[[f32; 4]; 4]) -> Matrix4<f32> {
        Matrix4::from_fn(|row, col| columns[col][row])
    }
}

/// A mesh's local-to-world matrix paired with its inverse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    to_world: Matrix4<f32>,
    to_local: Matrix4<f32>,
}

impl LocalFrame {
    /// Fails when the matrix is singular, since points could not return to local space
    pub fn new(to_world: Matrix4<f32>) -> CropResult<Self> {
        let to_local = to_world.try_inverse().ok_or_else(|| {
            CropError::geometry("mesh local-to-world matrix is not invertible")
        })?;
        Ok(Self { to_world, to_local })
    }

    pub fn identity() -> Self {
        Self {
            to_world: Matrix4::identity(),
            to_local: Matrix4::identity(),
        }
    }

    pub fn to_world_matrix(&self) -> &Matrix4<f32> {
        &self.to_world
    }

    pub fn to_world(&self, point: &Point3<f32>) -> Point3<f32> {
        self.to_world.transform_point(point)
    }

    pub fn to_local(&self, point: &Point3<f32>) -> Point3<f32> {
        self.to_local.transform_point(point)
    }
}
