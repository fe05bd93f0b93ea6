use std::path::PathBuf;

use thiserror::Error;

use crate::handles::AssetUid;

/// Everything that can go wrong between a source asset and a GPU-resident resource.
///
/// None of these cross the public entrypoints of the pipeline as hard failures:
/// they are logged where they are recovered from.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("source asset not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("unsupported asset format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("corrupt metadata sidecar {path}: {reason}")]
    MetadataCorrupt { path: PathBuf, reason: String },

    #[error("failed to read artifact {path}: {reason}")]
    ArtifactRead { path: PathBuf, reason: String },

    #[error("invalid pipeline config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("resource {0} was evicted and cannot be reloaded")]
    Evicted(AssetUid),

    #[error("graphics device error: {0}")]
    Device(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AssetError {
    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AssetError::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AssetError::ArtifactRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = AssetError> = std::result::Result<T, E>;
