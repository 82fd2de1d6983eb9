//! Texture decoding.
//!
//! Every texture ends up as tightly packed RGBA8 rows, ready to be copied
//! into an `R8G8B8A8_SRGB` image.

use std::path::Path;

use tracing::info;

use crate::error::{AssetError, AssetResult};

/// Decoded RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, row-major, top row first
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Decodes a PNG or JPEG file.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::FileNotFound`] for a missing path or
    /// [`AssetError::Image`] if decoding fails.
    pub fn load(path: &Path) -> AssetResult<Self> {
        if !path.exists() {
            return Err(AssetError::FileNotFound(path.to_path_buf()));
        }

        let rgba = image::open(path)?.into_rgba8();
        let (width, height) = rgba.dimensions();

        info!("Loaded texture {:?} ({}x{})", path, width, height);

        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    /// Loads `path` when given, otherwise generates the default checkerboard.
    pub fn load_or_default(path: Option<&Path>) -> AssetResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::checkerboard(256, 32)),
        }
    }

    /// Two-tone checkerboard with square cells of `cell` pixels.
    pub fn checkerboard(size: u32, cell: u32) -> Self {
        const LIGHT: [u8; 4] = [230, 230, 230, 255];
        const DARK: [u8; 4] = [60, 60, 60, 255];

        let cell = cell.max(1);
        let pixels = (0..size)
            .flat_map(|y| (0..size).map(move |x| (x / cell + y / cell) % 2 == 0))
            .flat_map(|light| if light { LIGHT } else { DARK })
            .collect();

        Self {
            width: size,
            height: size,
            pixels,
        }
    }

    /// Size in bytes of the pixel data.
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkerboard_dimensions() {
        let tex = TextureData::checkerboard(64, 8);
        assert_eq!((tex.width, tex.height), (64, 64));
        assert_eq!(tex.byte_len(), 64 * 64 * 4);
    }

    #[test]
    fn test_checkerboard_alternates() {
        let tex = TextureData::checkerboard(4, 2);
        let pixel = |x: usize, y: usize| &tex.pixels[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];

        assert_eq!(pixel(0, 0), pixel(1, 1));
        assert_ne!(pixel(0, 0), pixel(2, 0));
        assert_ne!(pixel(0, 0), pixel(0, 2));
        assert_eq!(pixel(0, 0), pixel(2, 2));
        assert!(tex.pixels.chunks(4).all(|p| p[3] == 255));
    }

    #[test]
    fn test_default_without_path_is_checkerboard() {
        let tex = TextureData::load_or_default(None).unwrap();
        assert_eq!(tex, TextureData::checkerboard(256, 32));
    }

    #[test]
    fn test_missing_texture_is_not_found() {
        let result = TextureData::load(Path::new("no/such/texture.png"));
        assert!(matches!(result, Err(AssetError::FileNotFound(_))));
    }
}
