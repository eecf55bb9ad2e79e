//! Axis-aligned bounding boxes
use nalgebra::{Matrix4, Point3, Vector3};

/// Axis-aligned bounding box with inclusive bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// The empty box: union identity, contains nothing
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f32>>) -> Self {
        points
            .into_iter()
            .fold(Self::empty(), |aabb, point| aabb.expand(point))
    }

    pub fn from_center_size(center: Point3<f32>, size: Vector3<f32>) -> Self {
        let half = size / 2.0;
        Self::new(center - half, center + half)
    }

    pub fn expand(self, point: &Point3<f32>) -> Self {
        Self::new(self.min.inf(point), self.max.sup(point))
    }

    pub fn union(self, other: Self) -> Self {
        Self::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// True when any axis has max < min (or a NaN bound)
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| !(self.min[axis] <= self.max[axis]))
    }

    pub fn contains_point(&self, point: &Point3<f32>) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    pub fn contains_triangle(&self, vertices: &[Point3<f32>; 3]) -> bool {
        vertices.iter().all(|vertex| self.contains_point(vertex))
    }

    /// Eight corners, ordered by the bits of the index (x, y, z)
    pub fn corners(&self) -> [Point3<f32>; 8] {
        std::array::from_fn(|i| {
            Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        })
    }

    /// Bounding box of this box's corners after a transform
    pub fn transform(&self, matrix: &Matrix4<f32>) -> Self {
        if self.is_empty() {
            return *self;
        }
        let corners = self.corners().map(|corner| matrix.transform_point(&corner));
        Self::from_points(&corners)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}
