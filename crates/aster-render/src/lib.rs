//! Mesh, shader, and transform layer for the Aster engine.
//!
//! Covers vertex and mesh types with host-visible upload, Wavefront OBJ
//! loading, SPIR-V modules read from disk, and the per-frame transform
//! math behind the push constant block.

pub mod error;
pub mod mesh;
pub mod obj;
pub mod shader;
pub mod transform;

pub use error::{RenderError, Result};
pub use mesh::{Mesh, Vertex};
pub use shader::load_spirv;
pub use transform::MeshPushConstants;
