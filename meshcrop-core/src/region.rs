//! Crop region: a manipulable oriented box and the handle that drives it
use nalgebra::{Point3, UnitQuaternion, Vector3};
use tracing::debug;

use crate::bounds::Aabb;
use crate::error::CropperError;

/// Oriented box with position, rotation, and non-uniform size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropBox {
    pub center: Point3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub size: Vector3<f32>,
}

impl CropBox {
    pub fn new(center: Point3<f32>, size: Vector3<f32>) -> Self {
        Self {
            center,
            rotation: UnitQuaternion::identity(),
            size,
        }
    }

    /// Box exactly enclosing an axis-aligned bounding box
    pub fn enclosing(bounds: &Aabb) -> Self {
        Self::new(bounds.center(), bounds.size())
    }

    pub fn corners(&self) -> [Point3<f32>; 8] {
        let half = self.size / 2.0;
        std::array::from_fn(|i| {
            let local = Vector3::new(
                if i & 1 == 0 { -half.x } else { half.x },
                if i & 2 == 0 { -half.y } else { half.y },
                if i & 4 == 0 { -half.z } else { half.z },
            );
            self.center + self.rotation * local
        })
    }

    /// World-space AABB of the current corners.
    ///
    /// A negative size on any axis yields an empty box.
    pub fn world_bounds(&self) -> Aabb {
        if (0..3).any(|axis| self.size[axis] < 0.0) {
            return Aabb::from_center_size(self.center, self.size);
        }
        Aabb::from_points(&self.corners())
    }
}

/// What a drag on the transform handle changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformMode {
    #[default]
    Translate,
    Scale,
}

impl TransformMode {
    pub fn label(&self) -> &'static str {
        match self {
            TransformMode::Translate => "translate",
            TransformMode::Scale => "scale",
        }
    }
}

impl std::str::FromStr for TransformMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "translate" | "move" => Ok(TransformMode::Translate),
            "scale" => Ok(TransformMode::Scale),
            other => Err(format!("unknown transform mode: {other}")),
        }
    }
}

/// Interactive handle; attached to a box by its generation number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformHandle {
    target: Option<u64>,
    pub mode: TransformMode,
}

impl TransformHandle {
    pub fn attach(&mut self, generation: u64) {
        self.target = Some(generation);
    }

    pub fn detach(&mut self) {
        self.target = None;
    }

    pub fn target(&self) -> Option<u64> {
        self.target
    }
}

/// Keeps the crop box and its transform handle in sync
#[derive(Debug, Clone, Default)]
pub struct CropRegionController {
    crop_box: Option<CropBox>,
    generation: u64,
    handle: TransformHandle,
}

impl CropRegionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a box sized to the mesh's world bounds and attach the handle to it
    pub fn initialize(&mut self, mesh_bounds: &Aabb) {
        self.replace_box(CropBox::enclosing(mesh_bounds));
        self.handle.attach(self.generation);
        debug!(
            center = ?self.crop_box.map(|b| b.center),
            "crop region initialized"
        );
    }

    /// Swap in a new box instance. The handle stays on the old one until re-attached.
    pub fn replace_box(&mut self, crop_box: CropBox) {
        self.generation += 1;
        self.crop_box = Some(crop_box);
    }

    pub fn crop_box(&self) -> Option<&CropBox> {
        self.crop_box.as_ref()
    }

    pub fn mode(&self) -> TransformMode {
        self.handle.mode
    }

    pub fn handle(&self) -> &TransformHandle {
        &self.handle
    }

    pub fn is_attached(&self) -> bool {
        self.crop_box.is_some() && self.handle.target() == Some(self.generation)
    }

    /// Switch the handle mode, re-attaching to the current box if it went stale
    pub fn set_mode(&mut self, mode: TransformMode) {
        self.handle.mode = mode;
        if self.crop_box.is_some() && !self.is_attached() {
            debug!(generation = self.generation, "re-attaching transform handle");
            self.handle.attach(self.generation);
        }
    }

    /// Apply a drag in world units. Returns false when no box is attached.
    pub fn drag(&mut self, delta: Vector3<f32>) -> bool {
        if !self.is_attached() {
            return false;
        }
        let mode = self.handle.mode;
        let Some(crop_box) = self.crop_box.as_mut() else {
            return false;
        };
        match mode {
            TransformMode::Translate => crop_box.center += delta,
            TransformMode::Scale => crop_box.size += delta,
        }
        true
    }

    pub fn set_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        if let Some(crop_box) = self.crop_box.as_mut() {
            crop_box.rotation = rotation;
        }
    }

    /// Fresh world-space bounds of the current box, never cached
    pub fn current_world_bounds(&self) -> Option<Aabb> {
        self.crop_box.as_ref().map(CropBox::world_bounds)
    }

    /// Invariant checked before every classification pass
    pub fn ensure_attached(&self) -> Result<Aabb, CropperError> {
        if !self.is_attached() {
            return Err(CropperError::HandleDetached);
        }
        self.current_world_bounds()
            .ok_or(CropperError::HandleDetached)
    }

    pub fn detach(&mut self) {
        self.handle.detach();
        self.crop_box = None;
    }
}
