//! Error types for loading, cropping, and exporting models.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce a scene from a model source.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    /// Reading the model from disk failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Fetching a remote model failed.
    #[error("failed to fetch {url}: {message}")]
    Http { url: String, message: String },

    /// The source is not something the loader knows how to read.
    #[error("unsupported model source: {0}")]
    UnsupportedSource(String),

    /// The glTF document or one of its buffers could not be decoded.
    #[error("failed to parse model: {0}")]
    Parse(String),

    /// The scene holds no mesh with position data.
    #[error("model contains no mesh with position data")]
    NoMesh,

    /// A primitive's attribute data is inconsistent.
    #[error("invalid mesh data: {0}")]
    InvalidGeometry(String),
}

impl From<gltf::Error> for ModelLoadError {
    fn from(err: gltf::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Failure of the classify-and-rebuild pass.
#[derive(Debug, Error)]
pub enum CropError {
    /// The crop box currently encloses zero whole triangles.
    #[error("no triangles inside the crop box")]
    EmptySelection,

    /// An attribute-consistency invariant was violated while rebuilding.
    #[error("geometry build failed: {reason}")]
    GeometryBuild { reason: String },
}

impl CropError {
    pub fn geometry(reason: impl Into<String>) -> Self {
        Self::GeometryBuild {
            reason: reason.into(),
        }
    }
}

/// Failure while serializing the cropped subgraph.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The glTF JSON could not be produced.
    #[error("failed to serialize glTF document: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A binary container is malformed or could not be assembled.
    #[error("invalid GLB container: {0}")]
    Container(String),

    /// The export collaborator reported a failure of its own.
    #[error("export failed: {0}")]
    Collaborator(String),
}

/// Every failure the crop session can surface to the user.
#[derive(Debug, Error)]
pub enum CropperError {
    #[error(transparent)]
    Load(#[from] ModelLoadError),

    #[error(transparent)]
    Crop(#[from] CropError),

    #[error(transparent)]
    Export(#[from] ExportError),

    /// A load or crop is already in flight.
    #[error("another operation is still running")]
    Busy,

    /// No model has been loaded into the session.
    #[error("no model is loaded")]
    NotReady,

    /// The transform handle no longer targets the current crop box.
    #[error("transform handle is not attached to the current crop box")]
    HandleDetached,
}

impl CropperError {
    /// Text for the single notification shown at the UI action boundary.
    pub fn user_message(&self) -> String {
        match self {
            Self::Load(err) => format!("Could not load the model: {err}"),
            Self::Crop(CropError::EmptySelection) => {
                "No triangles inside the crop box; try resizing the box.".to_string()
            }
            Self::Crop(CropError::GeometryBuild { reason }) => {
                format!("Internal error while rebuilding geometry ({reason}). Please report this.")
            }
            Self::Export(err) => format!("Export failed: {err}"),
            Self::Busy => "Please wait for the current operation to finish.".to_string(),
            Self::NotReady => "Open a model before cropping.".to_string(),
            Self::HandleDetached => {
                "The crop box lost its handle; reset the box and try again.".to_string()
            }
        }
    }
}

pub type LoadResult<T> = Result<T, ModelLoadError>;
pub type CropResult<T> = Result<T, CropError>;
pub type ExportResult<T> = Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_selection_message_is_actionable() {
        let err = CropperError::from(CropError::EmptySelection);
        assert!(err.user_message().contains("try resizing the box"));
    }

    #[test]
    fn test_geometry_error_keeps_reason() {
        let err = CropperError::from(CropError::geometry("uv length 5 != 4"));
        assert!(err.user_message().contains("uv length 5 != 4"));
    }
}
