//! Triangle classification against a world-space box and geometry rebuild.
//!
//! A triangle is kept only when all three of its world-space vertices lie
//! inside the box. Triangles straddling the boundary are dropped whole; they
//! are never clipped or subdivided.

use nalgebra::Point3;
use serde::Serialize;
use tracing::{debug, warn};

use crate::bounds::Aabb;
use crate::error::{CropError, CropResult};
use crate::geometry::{MeshGeometry, TRIANGLE_STRIDE, UV_STRIDE, VEC3_STRIDE};
use crate::transform::LocalFrame;

/// Where the normals of a cropped geometry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalSource {
    /// Copied from the source mesh
    Copied,
    /// Derived from the retained faces
    Recomputed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropStats {
    pub retained: usize,
    /// Triangles with no vertex inside the box
    pub outside: usize,
    /// Triangles with one or two vertices inside the box
    pub straddling: usize,
    pub normals: NormalSource,
}

impl CropStats {
    pub fn discarded(&self) -> usize {
        self.outside + self.straddling
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CroppedGeometry {
    pub geometry: MeshGeometry,
    pub stats: CropStats,
}

/// Keep the triangles of `source` that lie entirely inside `bounds`.
///
/// `source` is in the mesh's local space, `frame` maps it to world space, and
/// the result is expressed in the same local space as the source.
pub fn crop_geometry(
    source: &MeshGeometry,
    frame: &LocalFrame,
    bounds: &Aabb,
) -> CropResult<CroppedGeometry> {
    if source.positions.len() % TRIANGLE_STRIDE != 0 {
        return Err(CropError::geometry(format!(
            "source position length {} is not a multiple of {TRIANGLE_STRIDE}",
            source.positions.len()
        )));
    }
    let source_normals = source
        .normals
        .as_deref()
        .filter(|normals| normals.len() == source.positions.len());
    if source.normals.is_some() && source_normals.is_none() {
        warn!("source normals do not match positions; they will be recomputed");
    }
    let source_uvs = source.uvs.as_deref();
    if let Some(uvs) = source_uvs {
        if uvs.len() != source.vertex_count() * UV_STRIDE {
            return Err(CropError::geometry(format!(
                "source uv length {} does not match {} vertices",
                uvs.len(),
                source.vertex_count()
            )));
        }
    }

    let mut positions = Vec::new();
    let mut normals = source_normals.map(|_| Vec::new());
    let mut uvs = source_uvs.map(|_| Vec::new());
    let mut outside = 0;
    let mut straddling = 0;

    for index in 0..source.triangle_count() {
        let local = source.triangle(index).vertices;
        let world = local.map(|vertex| frame.to_world(&vertex));

        let inside = world
            .iter()
            .filter(|vertex| bounds.contains_point(vertex))
            .count();
        match inside {
            3 => {}
            0 => {
                outside += 1;
                continue;
            }
            _ => {
                straddling += 1;
                continue;
            }
        }

        let first_vertex = index * 3;
        for (offset, vertex) in world.iter().enumerate() {
            let back: Point3<f32> = frame.to_local(vertex);
            positions.extend_from_slice(back.coords.as_slice());

            let source_vertex = first_vertex + offset;
            if let (Some(out), Some(src)) = (normals.as_mut(), source_normals) {
                let start = source_vertex * VEC3_STRIDE;
                out.extend_from_slice(&src[start..start + VEC3_STRIDE]);
            }
            if let (Some(out), Some(src)) = (uvs.as_mut(), source_uvs) {
                let start = source_vertex * UV_STRIDE;
                out.extend_from_slice(&src[start..start + UV_STRIDE]);
            }
        }
    }

    let retained = positions.len() / TRIANGLE_STRIDE;
    debug!(retained, outside, straddling, "classified triangles");

    if positions.is_empty() {
        return Err(CropError::EmptySelection);
    }
    if positions.len() % TRIANGLE_STRIDE != 0 {
        return Err(CropError::geometry(format!(
            "rebuilt position length {} is not a multiple of {TRIANGLE_STRIDE}",
            positions.len()
        )));
    }
    if let Some(uvs) = &uvs {
        let expected = positions.len() / VEC3_STRIDE * UV_STRIDE;
        if uvs.len() != expected {
            return Err(CropError::geometry(format!(
                "rebuilt uv length {} != {expected}",
                uvs.len()
            )));
        }
    }

    let mut geometry = MeshGeometry {
        positions,
        normals: None,
        uvs,
    };
    let normal_source = match normals {
        Some(normals) if normals.len() == geometry.positions.len() => {
            geometry.normals = Some(normals);
            NormalSource::Copied
        }
        _ => {
            geometry.normals = Some(geometry.compute_vertex_normals());
            NormalSource::Recomputed
        }
    };

    geometry.validate()?;

    Ok(CroppedGeometry {
        geometry,
        stats: CropStats {
            retained,
            outside,
            straddling,
            normals: normal_source,
        },
    })
}
