use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::{AssetError, Result};

pub const DEFAULT_ASSETS_ROOT: &str = "Assets";
pub const LIBRARY_DIR_NAME: &str = "Library";

/// Where the pipeline reads sources from and writes artifacts to.
///
/// ```ron
/// (
///     assets_root: "Assets",
///     library_dir: Some("Assets/Library"),
///     preload_on_scan: false,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub assets_root: PathBuf,
    /// Defaults to `<assets_root>/Library`.
    pub library_dir: Option<PathBuf>,
    /// Load every ready asset into the cache while scanning.
    pub preload_on_scan: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            assets_root: PathBuf::from(DEFAULT_ASSETS_ROOT),
            library_dir: None,
            preload_on_scan: false,
        }
    }
}

impl PipelineConfig {
    pub fn with_assets_root(assets_root: impl Into<PathBuf>) -> Self {
        Self {
            assets_root: assets_root.into(),
            ..Self::default()
        }
    }

    pub fn from_ron_str(path: &Path, text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| AssetError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn from_ron_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_ron_str(path, &text)?;
        log::debug!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    pub fn library_dir(&self) -> PathBuf {
        self.library_dir
            .clone()
            .unwrap_or_else(|| self.assets_root.join(LIBRARY_DIR_NAME))
    }
}
