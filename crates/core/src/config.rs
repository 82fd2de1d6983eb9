//! Engine configuration with environment overrides.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Enables or disables the Vulkan validation layer (`0`, `1`, `true`, `false`).
pub const ENV_VALIDATION: &str = "BENTO_VALIDATION";
/// Directory containing compiled SPIR-V shaders.
pub const ENV_SHADER_DIR: &str = "BENTO_SHADER_DIR";
/// Path to the texture sampled by every mesh.
pub const ENV_TEXTURE: &str = "BENTO_TEXTURE";

/// Settings for an engine session.
///
/// Defaults describe an 800x600 window with depth testing, no face culling,
/// opaque blending and a generated checkerboard texture.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Window title
    pub title: String,
    /// Initial window width in pixels
    pub width: u32,
    /// Initial window height in pixels
    pub height: u32,
    /// Require `VK_LAYER_KHRONOS_validation` and route its messages to tracing
    pub enable_validation: bool,
    /// Directory holding `shader.vert.spv` and `shader.frag.spv`
    pub shader_dir: PathBuf,
    /// Texture image; `None` uses a generated checkerboard
    pub texture_path: Option<PathBuf>,
    /// Clear color for the color attachment (linear RGBA)
    pub clear_color: [f32; 4],
    /// Depth test with "closer wins" comparison
    pub depth_test: bool,
    /// Straight-alpha blending on the color attachment
    pub blending: bool,
    /// Cull back faces instead of drawing both sides
    pub cull_back_faces: bool,
    /// Mesh spin rate in degrees per second
    pub rotation_degrees_per_sec: f32,
    /// Upper bound on live meshes; sizes the shared descriptor pool
    pub max_meshes: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: String::from("bento"),
            width: 800,
            height: 600,
            enable_validation: cfg!(debug_assertions),
            shader_dir: PathBuf::from("shaders/spirv"),
            texture_path: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            depth_test: true,
            blending: false,
            cull_back_faces: false,
            rotation_degrees_per_sec: 90.0,
            max_meshes: 64,
        }
    }
}

impl EngineConfig {
    /// Default configuration with overrides read from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an override has an unparsable value.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Separated from [`EngineConfig::from_env`] so overrides can be tested
    /// without mutating the process environment.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_VALIDATION) {
            self.enable_validation = parse_bool(ENV_VALIDATION, &value)?;
        }
        if let Some(dir) = lookup(ENV_SHADER_DIR) {
            self.shader_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup(ENV_TEXTURE) {
            self.texture_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }
        Ok(self)
    }

    /// Set the window title and size.
    pub fn with_window(mut self, title: &str, width: u32, height: u32) -> Self {
        self.title = title.to_owned();
        self.width = width;
        self.height = height;
        self
    }

    /// Check the configuration for values the engine cannot start with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.max_meshes == 0 {
            return Err(Error::Config("max_meshes must be at least 1".into()));
        }
        if !self.rotation_degrees_per_sec.is_finite() {
            return Err(Error::Config(format!(
                "rotation rate must be finite, got {}",
                self.rotation_degrees_per_sec
            )));
        }
        Ok(())
    }

    /// Vertex shader path inside [`EngineConfig::shader_dir`].
    pub fn vertex_shader_path(&self) -> PathBuf {
        self.shader_dir.join("shader.vert.spv")
    }

    /// Fragment shader path inside [`EngineConfig::shader_dir`].
    pub fn fragment_shader_path(&self) -> PathBuf {
        self.shader_dir.join("shader.frag.spv")
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{key}: expected a boolean, got '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!((config.width, config.height), (800, 600));
        assert!(config.depth_test);
        assert!(!config.blending);
    }

    #[test]
    fn test_overrides_apply() {
        let config = EngineConfig::default()
            .with_overrides(lookup_from(&[
                (ENV_VALIDATION, "false"),
                (ENV_SHADER_DIR, "/tmp/spv"),
                (ENV_TEXTURE, "textures/crate.png"),
            ]))
            .unwrap();

        assert!(!config.enable_validation);
        assert_eq!(config.shader_dir, PathBuf::from("/tmp/spv"));
        assert_eq!(
            config.texture_path,
            Some(PathBuf::from("textures/crate.png"))
        );
        assert_eq!(
            config.vertex_shader_path(),
            PathBuf::from("/tmp/spv/shader.vert.spv")
        );
    }

    #[test]
    fn test_empty_texture_override_clears_path() {
        let config = EngineConfig {
            texture_path: Some(PathBuf::from("a.png")),
            ..EngineConfig::default()
        }
        .with_overrides(lookup_from(&[(ENV_TEXTURE, "")]))
        .unwrap();
        assert_eq!(config.texture_path, None);
    }

    #[test]
    fn test_malformed_bool_is_config_error() {
        let result = EngineConfig::default().with_overrides(lookup_from(&[(ENV_VALIDATION, "maybe")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        let config = EngineConfig::default().with_window("t", 0, 600);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_meshes_and_nan_rate() {
        let config = EngineConfig {
            max_meshes: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            rotation_degrees_per_sec: f32::NAN,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
