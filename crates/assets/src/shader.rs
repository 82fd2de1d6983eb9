//! SPIR-V file loading.

use std::path::Path;

use bento_rhi::shader::SPIRV_MAGIC;
use tracing::debug;

use crate::error::{AssetError, AssetResult};

/// Reads a compiled shader, checking it looks like SPIR-V.
///
/// The bytes are returned unchanged; module creation happens in the GPU layer.
///
/// # Errors
///
/// - [`AssetError::FileNotFound`] if `path` does not exist
/// - [`AssetError::Io`] if it cannot be read
/// - [`AssetError::InvalidSpirv`] if the length is not a multiple of four or
///   the magic number is missing
pub fn load_spirv(path: &Path) -> AssetResult<Vec<u8>> {
    if !path.exists() {
        return Err(AssetError::FileNotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path)?;
    check_spirv(&bytes).map_err(|reason| AssetError::InvalidSpirv {
        path: path.to_path_buf(),
        reason,
    })?;

    debug!("Loaded {} bytes of SPIR-V from {:?}", bytes.len(), path);
    Ok(bytes)
}

fn check_spirv(bytes: &[u8]) -> Result<(), String> {
    if bytes.len() < 4 || bytes.len() % 4 != 0 {
        return Err(format!("length {} is not a positive multiple of 4", bytes.len()));
    }

    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != SPIRV_MAGIC {
        return Err(format!("magic number {:#010x}", magic));
    }

    Ok(())
}
