//! The Library: converted binaries addressed by asset identity.
//!
//! ```text
//! <library>/Meshes/<uid>.meshes          sub-mesh index (primary mesh artifact)
//! <library>/Meshes/<uid>_mesh_<i>.mesh   one sub-mesh each
//! <library>/Textures/<uid>.tex
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::{
    codec,
    data::{MeshData, TextureData},
    error::{AssetError, Result},
    handles::{AssetUid, ResourceKind},
};

pub const MESHES_DIR: &str = "Meshes";
pub const TEXTURES_DIR: &str = "Textures";
pub const MESH_INDEX_EXTENSION: &str = "meshes";
pub const SUBMESH_EXTENSION: &str = "mesh";
pub const TEXTURE_EXTENSION: &str = "tex";

pub fn modified_time(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

/// `<uid>_mesh_<index>.mesh`, always in the same directory as the `<uid>.meshes` index.
pub fn submesh_file_name(uid: AssetUid, index: usize) -> String {
    format!("{}_mesh_{}.{}", uid, index, SUBMESH_EXTENSION)
}

/// Writes `<path>.tmp`, then renames it over `path`. A crash mid-write leaves
/// the old file (or none) in place, never a truncated one.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    fs::write(&staging, bytes)?;
    fs::rename(&staging, path)
}

/// Staleness rule: reimport when there is no artifact, or the source is strictly newer.
/// Equal timestamps keep the artifact.
pub fn is_stale(source: SystemTime, artifact: Option<SystemTime>) -> bool {
    match artifact {
        None => true,
        Some(artifact) => source > artifact,
    }
}

#[derive(Debug, Clone)]
pub struct LibraryStore {
    root: PathBuf,
}

impl LibraryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meshes_dir(&self) -> PathBuf {
        self.root.join(MESHES_DIR)
    }

    pub fn textures_dir(&self) -> PathBuf {
        self.root.join(TEXTURES_DIR)
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.meshes_dir())?;
        fs::create_dir_all(self.textures_dir())?;
        Ok(())
    }

    /// Path of the primary artifact for an identity. Deterministic, never touches disk.
    pub fn artifact_path(&self, uid: AssetUid, kind: ResourceKind) -> PathBuf {
        match kind {
            ResourceKind::Mesh => self
                .meshes_dir()
                .join(format!("{}.{}", uid, MESH_INDEX_EXTENSION)),
            ResourceKind::Texture => self
                .textures_dir()
                .join(format!("{}.{}", uid, TEXTURE_EXTENSION)),
        }
    }

    pub fn submesh_path(&self, uid: AssetUid, index: usize) -> PathBuf {
        self.meshes_dir().join(submesh_file_name(uid, index))
    }

    /// Timestamp comparison only; no content is read.
    pub fn needs_reimport(&self, source: &Path, artifact: &Path) -> bool {
        let artifact_time = match modified_time(artifact) {
            Ok(time) => time,
            Err(_) => return true,
        };

        match modified_time(source) {
            Ok(source_time) => is_stale(source_time, Some(artifact_time)),
            Err(e) => {
                log::debug!(
                    "Cannot stat source {} ({}), keeping {}",
                    source.display(),
                    e,
                    artifact.display()
                );
                false
            }
        }
    }

    /// Which kind of primary artifact exists for `uid`, if any.
    pub fn stored_kind(&self, uid: AssetUid) -> Option<ResourceKind> {
        [ResourceKind::Mesh, ResourceKind::Texture]
            .into_iter()
            .find(|kind| self.artifact_path(uid, *kind).is_file())
    }

    /// Writes every sub-mesh, then the index. Leftover sub-meshes from an older
    /// import of the same identity are removed first. Meshes that fail
    /// [`MeshData::validate`] are rejected before any file is touched.
    pub fn store_mesh(&self, uid: AssetUid, submeshes: &[MeshData]) -> Result<PathBuf> {
        let index_path = self.artifact_path(uid, ResourceKind::Mesh);
        if u32::try_from(submeshes.len()).is_err() {
            return Err(AssetError::decode(&index_path, "too many sub-meshes"));
        }
        for (index, submesh) in submeshes.iter().enumerate() {
            submesh
                .validate()
                .map_err(|reason| AssetError::decode(&index_path, format!("sub-mesh {}: {}", index, reason)))?;
        }

        self.ensure_dirs()?;
        self.remove_submeshes(uid)?;

        for (index, submesh) in submeshes.iter().enumerate() {
            write_atomic(&self.submesh_path(uid, index), &codec::encode_mesh(submesh))?;
        }

        write_atomic(&index_path, &codec::encode_mesh_index(submeshes))?;
        Ok(index_path)
    }

    pub fn store_texture(&self, uid: AssetUid, texture: &TextureData) -> Result<PathBuf> {
        self.ensure_dirs()?;

        let path = self.artifact_path(uid, ResourceKind::Texture);
        write_atomic(&path, &codec::encode_texture(texture))?;
        Ok(path)
    }

    /// Deletes the primary artifact and any sub-mesh files. Returns how many files went.
    pub fn remove_artifacts(&self, uid: AssetUid, kind: ResourceKind) -> Result<usize> {
        let mut removed = 0;

        if kind == ResourceKind::Mesh {
            removed += self.remove_submeshes(uid)?;
        }

        match fs::remove_file(self.artifact_path(uid, kind)) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(removed)
    }

    /// Every primary artifact currently in the Library.
    pub fn artifacts(&self) -> Result<Vec<(AssetUid, ResourceKind)>> {
        let mut found = Vec::new();

        for (dir, extension, kind) in [
            (self.meshes_dir(), MESH_INDEX_EXTENSION, ResourceKind::Mesh),
            (self.textures_dir(), TEXTURE_EXTENSION, ResourceKind::Texture),
        ] {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                    continue;
                }
                let uid = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| stem.parse::<AssetUid>().ok());
                if let Some(uid) = uid {
                    found.push((uid, kind));
                }
            }
        }

        found.sort();
        Ok(found)
    }

    fn remove_submeshes(&self, uid: AssetUid) -> Result<usize> {
        let prefix = format!("{}_mesh_", uid);
        let suffix = format!(".{}", SUBMESH_EXTENSION);

        let entries = match fs::read_dir(self.meshes_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(&prefix) && name.ends_with(&suffix) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}
