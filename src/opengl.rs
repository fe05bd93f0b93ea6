use std::sync::Arc;

use glow::*;

use crate::{
    data::{PixelFormat, TextureData, FLOATS_PER_VERTEX},
    device::{GraphicsDevice, MeshBuffers, TextureId},
    error::{AssetError, Result},
};

#[derive(Debug, Clone)]
pub struct Layout {
    pub index: u32,
    pub size: i32,
    pub gl_type: u32,
    pub normalized: bool,
    pub offset: usize,
}

impl Layout {
    pub const fn new(index: u32, size: i32, gl_type: u32, normalized: bool, offset: usize) -> Self {
        Self {
            index,
            size,
            gl_type,
            normalized,
            offset,
        }
    }
}

const F32: usize = std::mem::size_of::<f32>();

/// Library vertex layout: position, normal, uv.
pub const VERTEX_LAYOUTS: [Layout; 3] = [
    Layout::new(0, 3, glow::FLOAT, false, 0),
    Layout::new(1, 3, glow::FLOAT, false, 3 * F32),
    Layout::new(2, 2, glow::FLOAT, false, 6 * F32),
];

pub const VERTEX_STRIDE: i32 = (FLOATS_PER_VERTEX * F32) as i32;

/// OpenGL implementation of the device, on top of a current glow context.
pub struct GlowDevice {
    gl: Arc<glow::Context>,
}

impl GlowDevice {
    pub fn new(gl: Arc<glow::Context>) -> Self {
        Self { gl }
    }

    pub fn context(&self) -> &glow::Context {
        &self.gl
    }
}

fn device_error(what: &str, e: String) -> AssetError {
    AssetError::Device(format!("{}: {}", what, e))
}

impl GraphicsDevice for GlowDevice {
    fn upload_mesh(&self, vertices: &[f32], indices: &[u32]) -> Result<MeshBuffers> {
        let context = &self.gl;

        unsafe {
            let vao = context
                .create_vertex_array()
                .map_err(|e| device_error("Failed to create VAO", e))?;
            context.bind_vertex_array(Some(vao));

            let vbo = context
                .create_buffer()
                .map_err(|e| device_error("Failed to create VBO", e))?;
            context.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            context.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(vertices),
                glow::STATIC_DRAW,
            );

            let ebo = context
                .create_buffer()
                .map_err(|e| device_error("Failed to create EBO", e))?;
            context.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            context.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(indices),
                glow::STATIC_DRAW,
            );

            for layout in &VERTEX_LAYOUTS {
                context.vertex_attrib_pointer_f32(
                    layout.index,
                    layout.size,
                    layout.gl_type,
                    layout.normalized,
                    VERTEX_STRIDE,
                    layout.offset as i32,
                );
                context.enable_vertex_attrib_array(layout.index);
            }

            context.bind_vertex_array(None);

            log::debug!(
                "Uploaded mesh to VRAM: VAO {}, {} vertices, {} indices",
                vao.0,
                vertices.len() / FLOATS_PER_VERTEX,
                indices.len()
            );

            Ok(MeshBuffers {
                vao: vao.0,
                vbo: vbo.0,
                ebo: ebo.0,
            })
        }
    }

    fn draw_mesh(&self, buffers: MeshBuffers, index_count: u32) {
        unsafe {
            self.gl.bind_vertex_array(Some(NativeVertexArray(buffers.vao)));
            self.gl
                .draw_elements(glow::TRIANGLES, index_count as i32, glow::UNSIGNED_INT, 0);
            self.gl.bind_vertex_array(None);
        }
    }

    fn delete_mesh(&self, buffers: MeshBuffers) {
        unsafe {
            self.gl.delete_vertex_array(NativeVertexArray(buffers.vao));
            self.gl.delete_buffer(NativeBuffer(buffers.vbo));
            self.gl.delete_buffer(NativeBuffer(buffers.ebo));
        }
    }

    fn upload_texture(&self, data: &TextureData) -> Result<TextureId> {
        let context = &self.gl;

        let (internal_format, format) = match data.format {
            PixelFormat::R8 => (glow::R8, glow::RED),
            PixelFormat::Rgb8 => (glow::RGB8, glow::RGB),
            PixelFormat::Rgba8 => (glow::RGBA8, glow::RGBA),
        };

        unsafe {
            let texture = context
                .create_texture()
                .map_err(|e| device_error("Failed to create texture", e))?;
            context.bind_texture(glow::TEXTURE_2D, Some(texture));

            // Rows of 1- and 3-channel images are not 4-byte aligned.
            context.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);

            context.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format as i32,
                data.width as i32,
                data.height as i32,
                0,
                format,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(&data.pixels)),
            );

            context.generate_mipmap(glow::TEXTURE_2D);

            context.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            context.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR_MIPMAP_LINEAR as i32,
            );
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::LINEAR as i32,
            );

            context.bind_texture(glow::TEXTURE_2D, None);

            log::debug!(
                "Uploaded texture to VRAM: id {} ({}x{})",
                texture.0,
                data.width,
                data.height
            );

            Ok(TextureId(texture.0))
        }
    }

    fn bind_texture(&self, texture: TextureId, unit: u32) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl
                .bind_texture(glow::TEXTURE_2D, Some(NativeTexture(texture.0)));
        }
    }

    fn delete_texture(&self, texture: TextureId) {
        unsafe {
            self.gl.delete_texture(NativeTexture(texture.0));
        }
    }
}
