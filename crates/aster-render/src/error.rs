//! Render error types.

use aster_gpu::GpuError;
use std::path::PathBuf;
use thiserror::Error;

/// Rendering and asset errors.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Asset file not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// I/O failure while reading an asset.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SPIR-V module is malformed.
    #[error("Invalid SPIR-V: {0}")]
    InvalidSpirv(String),

    /// OBJ data could not be parsed.
    #[error("Malformed OBJ: {0}")]
    MalformedObj(String),

    /// Mesh has no vertices to upload.
    #[error("Mesh has no vertices to upload")]
    EmptyMesh,

    /// Mesh vertex buffer was already uploaded.
    #[error("Mesh already has a vertex buffer")]
    AlreadyUploaded,

    /// Underlying GPU error.
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

pub type Result<T> = std::result::Result<T, RenderError>;
