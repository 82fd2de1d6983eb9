//! Asset loading errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    /// IO error while reading an asset file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// A configured asset path does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Shader file is not a SPIR-V binary.
    #[error("Invalid SPIR-V in '{path}': {reason}")]
    InvalidSpirv {
        /// Path of the rejected file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },
}

pub type AssetResult<T> = Result<T, AssetError>;
