use std::path::PathBuf;

use crate::{
    codec,
    device::{GraphicsDevice, TextureId},
    error::Result,
    handles::AssetUid,
};

#[derive(Debug)]
pub struct TextureResource {
    pub uid: AssetUid,
    pub source_path: Option<PathBuf>,
    pub library_path: PathBuf,
    pub texture: Option<TextureId>, // None while unloaded
    pub width: u32,
    pub height: u32,
}

impl TextureResource {
    pub fn new(uid: AssetUid, source_path: Option<PathBuf>, library_path: PathBuf) -> Self {
        Self {
            uid,
            source_path,
            library_path,
            texture: None,
            width: 0,
            height: 0,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.texture.is_some()
    }

    pub fn load_in_memory(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }

        let data = codec::read_texture(&self.library_path)?;
        let texture = device.upload_texture(&data)?;

        log::info!(
            "Loaded texture {} to VRAM ({}x{}, {} channels)",
            self.uid,
            data.width,
            data.height,
            data.format.channels()
        );

        self.texture = Some(texture);
        self.width = data.width;
        self.height = data.height;
        Ok(())
    }

    pub fn free_memory(&mut self, device: &dyn GraphicsDevice) {
        if let Some(texture) = self.texture.take() {
            device.delete_texture(texture);
        }
    }

    /// Binds to texture `unit`, loading first if needed.
    pub fn bind(&mut self, device: &dyn GraphicsDevice, unit: u32) -> Result<()> {
        self.load_in_memory(device)?;

        if let Some(texture) = self.texture {
            device.bind_texture(texture, unit);
        }

        Ok(())
    }
}
