use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::{
    device::GraphicsDevice,
    error::{AssetError, Result},
    handles::{AssetUid, ResourceKind},
    mesh::MeshResource,
    textures::TextureResource,
};

/// Shared, non-owning view of a cached resource. Many scene objects may alias one.
pub type ResourceHandle = Rc<RefCell<Resource>>;

#[derive(Debug)]
pub enum ResourceBody {
    Mesh(MeshResource),
    Texture(TextureResource),
}

/// One imported asset at runtime, Unloaded or Loaded.
///
/// The reference count is advisory: it tells the editor who uses what, it never
/// frees anything by itself.
#[derive(Debug)]
pub struct Resource {
    body: ResourceBody,
    references: u32,
    detached: bool,
}

impl Resource {
    /// Builds an empty, unloaded resource of the given kind.
    pub fn new(
        kind: ResourceKind,
        uid: AssetUid,
        source_path: Option<PathBuf>,
        library_path: PathBuf,
    ) -> Self {
        let body = match kind {
            ResourceKind::Mesh => {
                ResourceBody::Mesh(MeshResource::new(uid, source_path, library_path))
            }
            ResourceKind::Texture => {
                ResourceBody::Texture(TextureResource::new(uid, source_path, library_path))
            }
        };

        Self {
            body,
            references: 0,
            detached: false,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match &self.body {
            ResourceBody::Mesh(_) => ResourceKind::Mesh,
            ResourceBody::Texture(_) => ResourceKind::Texture,
        }
    }

    pub fn uid(&self) -> AssetUid {
        match &self.body {
            ResourceBody::Mesh(mesh) => mesh.uid,
            ResourceBody::Texture(texture) => texture.uid,
        }
    }

    pub fn source_path(&self) -> Option<&Path> {
        match &self.body {
            ResourceBody::Mesh(mesh) => mesh.source_path.as_deref(),
            ResourceBody::Texture(texture) => texture.source_path.as_deref(),
        }
    }

    pub fn library_path(&self) -> &Path {
        match &self.body {
            ResourceBody::Mesh(mesh) => &mesh.library_path,
            ResourceBody::Texture(texture) => &texture.library_path,
        }
    }

    pub fn body(&self) -> &ResourceBody {
        &self.body
    }

    pub fn as_mesh(&self) -> Option<&MeshResource> {
        if let ResourceBody::Mesh(mesh) = &self.body {
            Some(mesh)
        } else {
            None
        }
    }

    pub fn as_texture(&self) -> Option<&TextureResource> {
        if let ResourceBody::Texture(texture) = &self.body {
            Some(texture)
        } else {
            None
        }
    }

    pub fn is_loaded(&self) -> bool {
        match &self.body {
            ResourceBody::Mesh(mesh) => mesh.is_loaded(),
            ResourceBody::Texture(texture) => texture.is_loaded(),
        }
    }

    pub fn reference_count(&self) -> u32 {
        self.references
    }

    /// True once the cache has evicted this resource; it will not load again.
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Unloaded -> Loaded. Returns whether the resource is loaded afterwards;
    /// failures are logged and leave an empty placeholder.
    pub fn load_in_memory(&mut self, device: &dyn GraphicsDevice) -> bool {
        if let Err(e) = self.try_load(device) {
            log::warn!("Failed to load {} resource {}: {}", self.kind(), self.uid(), e);
            return false;
        }
        true
    }

    /// Loaded -> Unloaded. GPU handles are released and cleared.
    pub fn free_memory(&mut self, device: &dyn GraphicsDevice) {
        match &mut self.body {
            ResourceBody::Mesh(mesh) => mesh.free_memory(device),
            ResourceBody::Texture(texture) => texture.free_memory(device),
        }
    }

    /// Meshes draw, textures bind to `unit`. Loads on demand. Returns false when
    /// the resource could not be made resident.
    pub fn bind(&mut self, device: &dyn GraphicsDevice, unit: u32) -> bool {
        if self.detached {
            log::warn!("Ignoring bind of evicted {} resource {}", self.kind(), self.uid());
            return false;
        }

        let result = match &mut self.body {
            ResourceBody::Mesh(mesh) => mesh.bind_and_draw(device),
            ResourceBody::Texture(texture) => texture.bind(device, unit),
        };

        if let Err(e) = result {
            log::warn!("Failed to bind {} resource {}: {}", self.kind(), self.uid(), e);
            return false;
        }
        true
    }

    fn try_load(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        if self.detached {
            return Err(AssetError::Evicted(self.uid()));
        }

        match &mut self.body {
            ResourceBody::Mesh(mesh) => mesh.load_in_memory(device),
            ResourceBody::Texture(texture) => texture.load_in_memory(device),
        }
    }

    pub(crate) fn add_reference(&mut self) {
        self.references = self.references.saturating_add(1);
    }

    pub(crate) fn remove_reference(&mut self) {
        self.references = self.references.saturating_sub(1);
    }

    pub(crate) fn detach(&mut self, device: &dyn GraphicsDevice) {
        self.free_memory(device);
        self.detached = true;
    }
}
