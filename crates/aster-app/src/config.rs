//! Engine configuration.

use std::path::PathBuf;

/// Engine configuration.
///
/// The window and swapchain are created once at the configured size and
/// never resized.
#[derive(Clone)]
pub struct EngineConfig {
    pub title: String,
    /// Fixed window width in pixels.
    pub width: u32,
    /// Fixed window height in pixels.
    pub height: u32,
    /// Directory containing the compiled SPIR-V shaders.
    pub shader_dir: PathBuf,
    /// Optional Wavefront OBJ mesh to render with the mesh pipeline.
    pub mesh_path: Option<PathBuf>,
    /// Ask for the Khronos validation layer. On by default in debug builds.
    pub validation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Aster Engine".to_string(),
            width: 1700,
            height: 900,
            shader_dir: PathBuf::from("shaders"),
            mesh_path: Some(PathBuf::from("assets/monkey_smooth.obj")),
            validation: cfg!(debug_assertions),
        }
    }
}

impl EngineConfig {
    /// Config with `title` and the demo defaults for everything else.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Override the fixed window size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the shader directory.
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = dir.into();
        self
    }

    /// Set the mesh path.
    pub fn with_mesh(mut self, path: impl Into<PathBuf>) -> Self {
        self.mesh_path = Some(path.into());
        self
    }

    /// Skip mesh loading; the mesh pipeline falls back to the builtin
    /// triangle.
    pub fn without_mesh(mut self) -> Self {
        self.mesh_path = None;
        self
    }

    /// Force validation on or off regardless of build profile.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_extent_is_1700_by_900() {
        let config = EngineConfig::default();
        assert_eq!(config.width, 1700);
        assert_eq!(config.height, 900);
    }

    #[test]
    fn default_paths_point_at_the_demo_assets() {
        let config = EngineConfig::default();
        assert_eq!(config.shader_dir, PathBuf::from("shaders"));
        assert_eq!(
            config.mesh_path,
            Some(PathBuf::from("assets/monkey_smooth.obj"))
        );
    }

    #[test]
    fn builder_methods_chain() {
        let config = EngineConfig::new("Demo")
            .with_size(640, 480)
            .with_shader_dir("build/shaders")
            .with_mesh("suzanne.obj")
            .with_validation(false);

        assert_eq!(config.title, "Demo");
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert_eq!(config.shader_dir, PathBuf::from("build/shaders"));
        assert_eq!(config.mesh_path, Some(PathBuf::from("suzanne.obj")));
        assert!(!config.validation);
    }

    #[test]
    fn without_mesh_clears_the_path() {
        let config = EngineConfig::default().without_mesh();
        assert_eq!(config.mesh_path, None);
    }
}
