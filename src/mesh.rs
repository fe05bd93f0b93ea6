use std::path::{Path, PathBuf};

use crate::{
    codec,
    device::{GraphicsDevice, MeshBuffers},
    error::{AssetError, Result},
    handles::AssetUid,
    library::submesh_file_name,
};

/// GPU side of one sub-mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMeshInstance {
    pub buffers: MeshBuffers,
    pub vertex_count: u32,
    pub index_count: u32,
}

/// A mesh asset: every sub-mesh of one source file, VRAM-resident once loaded.
///
/// CPU copies of the vertex data are dropped right after upload.
#[derive(Debug)]
pub struct MeshResource {
    pub uid: AssetUid,
    pub source_path: Option<PathBuf>,
    pub library_path: PathBuf, // sub-mesh index
    pub submeshes: Vec<SubMeshInstance>,
    loaded: bool,
}

impl MeshResource {
    pub fn new(uid: AssetUid, source_path: Option<PathBuf>, library_path: PathBuf) -> Self {
        Self {
            uid,
            source_path,
            library_path,
            submeshes: Vec::new(),
            loaded: false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn vertex_count(&self) -> u32 {
        self.submeshes.iter().map(|s| s.vertex_count).sum()
    }

    pub fn index_count(&self) -> u32 {
        self.submeshes.iter().map(|s| s.index_count).sum()
    }

    /// Reads the sub-mesh index and every sub-mesh artifact, then uploads them.
    /// Nothing stays on the GPU if any step fails.
    pub fn load_in_memory(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        if self.loaded {
            return Ok(());
        }

        let headers = codec::read_mesh_index(&self.library_path)?;
        let mut uploaded = Vec::with_capacity(headers.len());

        for (index, header) in headers.iter().enumerate() {
            match self.upload_submesh(device, index, header) {
                Ok(instance) => uploaded.push(instance),
                Err(e) => {
                    for instance in uploaded {
                        device.delete_mesh(instance.buffers);
                    }
                    return Err(e);
                }
            }
        }

        log::info!(
            "Loaded mesh {} to VRAM: {} sub-meshes, {} indices",
            self.uid,
            uploaded.len(),
            uploaded.iter().map(|s| s.index_count).sum::<u32>()
        );

        self.submeshes = uploaded;
        self.loaded = true;
        Ok(())
    }

    fn upload_submesh(
        &self,
        device: &dyn GraphicsDevice,
        index: usize,
        header: &codec::SubMeshHeader,
    ) -> Result<SubMeshInstance> {
        let path = submesh_path_for(&self.library_path, self.uid, index);
        let data = codec::read_mesh(&path)?;

        if codec::SubMeshHeader::from(&data) != *header {
            return Err(AssetError::artifact(
                &path,
                format!("sub-mesh does not match its index entry {:?}", header),
            ));
        }

        let buffers = device.upload_mesh(&data.interleaved(), &data.indices)?;

        Ok(SubMeshInstance {
            buffers,
            vertex_count: header.vertex_count,
            index_count: header.index_count,
        })
    }

    /// Releases the GPU buffers. No-op when nothing is loaded.
    pub fn free_memory(&mut self, device: &dyn GraphicsDevice) {
        if !self.loaded {
            return;
        }

        for submesh in self.submeshes.drain(..) {
            device.delete_mesh(submesh.buffers);
        }

        self.loaded = false;
    }

    /// Draws every sub-mesh, loading first if needed. Nothing is drawn if the load fails.
    pub fn bind_and_draw(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        self.load_in_memory(device)?;

        for submesh in &self.submeshes {
            device.draw_mesh(submesh.buffers, submesh.index_count);
        }

        Ok(())
    }
}

fn submesh_path_for(index_path: &Path, uid: AssetUid, index: usize) -> PathBuf {
    index_path.with_file_name(submesh_file_name(uid, index))
}
