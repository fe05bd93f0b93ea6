use std::{cell::Cell, num::NonZeroU32};

use crate::{data::TextureData, error::Result};

/// GPU objects backing one uploaded sub-mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBuffers {
    pub vao: NonZeroU32,
    pub vbo: NonZeroU32,
    pub ebo: NonZeroU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureId(pub NonZeroU32);

/// The only way resources touch the GPU.
///
/// Every call must happen on the thread that owns the graphics context.
pub trait GraphicsDevice {
    /// Uploads interleaved `pos(3) normal(3) uv(2)` vertices and a u32 index list.
    fn upload_mesh(&self, vertices: &[f32], indices: &[u32]) -> Result<MeshBuffers>;

    fn draw_mesh(&self, buffers: MeshBuffers, index_count: u32);

    fn delete_mesh(&self, buffers: MeshBuffers);

    /// Uploads a 2D texture, generating mipmaps, with repeat wrap and trilinear filtering.
    fn upload_texture(&self, texture: &TextureData) -> Result<TextureId>;

    fn bind_texture(&self, texture: TextureId, unit: u32);

    fn delete_texture(&self, texture: TextureId);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub meshes_uploaded: usize,
    pub meshes_deleted: usize,
    pub draws: usize,
    pub textures_uploaded: usize,
    pub textures_deleted: usize,
    pub texture_binds: usize,
    pub bytes_uploaded: usize,
}

impl DeviceStats {
    pub fn total_calls(&self) -> usize {
        self.meshes_uploaded
            + self.meshes_deleted
            + self.draws
            + self.textures_uploaded
            + self.textures_deleted
            + self.texture_binds
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes_uploaded - self.meshes_deleted
    }

    pub fn live_textures(&self) -> usize {
        self.textures_uploaded - self.textures_deleted
    }
}

/// A device without a GPU: hands out fresh ids and counts what it was asked to do.
/// Used by offline tooling and tests.
#[derive(Debug)]
pub struct HeadlessDevice {
    next_id: Cell<u32>,
    stats: Cell<DeviceStats>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            stats: Cell::new(DeviceStats::default()),
        }
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats.get()
    }

    fn next(&self) -> NonZeroU32 {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1).max(1));
        NonZeroU32::new(id).unwrap_or(NonZeroU32::MIN)
    }

    fn record(&self, update: impl FnOnce(&mut DeviceStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn upload_mesh(&self, vertices: &[f32], indices: &[u32]) -> Result<MeshBuffers> {
        self.record(|s| {
            s.meshes_uploaded += 1;
            s.bytes_uploaded += std::mem::size_of_val(vertices) + std::mem::size_of_val(indices);
        });

        Ok(MeshBuffers {
            vao: self.next(),
            vbo: self.next(),
            ebo: self.next(),
        })
    }

    fn draw_mesh(&self, _buffers: MeshBuffers, _index_count: u32) {
        self.record(|s| s.draws += 1);
    }

    fn delete_mesh(&self, _buffers: MeshBuffers) {
        self.record(|s| s.meshes_deleted += 1);
    }

    fn upload_texture(&self, texture: &TextureData) -> Result<TextureId> {
        self.record(|s| {
            s.textures_uploaded += 1;
            s.bytes_uploaded += texture.pixels.len();
        });

        Ok(TextureId(self.next()))
    }

    fn bind_texture(&self, _texture: TextureId, _unit: u32) {
        self.record(|s| s.texture_binds += 1);
    }

    fn delete_texture(&self, _texture: TextureId) {
        self.record(|s| s.textures_deleted += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PixelFormat;

    #[test]
    fn headless_device_counts_calls_and_hands_out_distinct_ids() {
        let device = HeadlessDevice::new();

        let a = device.upload_mesh(&[0.0; 8], &[0]).unwrap();
        let b = device.upload_mesh(&[0.0; 8], &[0]).unwrap();
        assert_ne!(a.vao, b.vao);

        let texture = TextureData {
            width: 1,
            height: 1,
            format: PixelFormat::Rgba8,
            pixels: vec![1, 2, 3, 4],
        };
        let t = device.upload_texture(&texture).unwrap();
        device.bind_texture(t, 0);
        device.draw_mesh(a, 1);
        device.delete_mesh(a);

        let stats = device.stats();
        assert_eq!(stats.meshes_uploaded, 2);
        assert_eq!(stats.live_meshes(), 1);
        assert_eq!(stats.live_textures(), 1);
        assert_eq!(stats.bytes_uploaded, 2 * (32 + 4) + 4);
        assert_eq!(stats.total_calls(), 6);
    }
}
