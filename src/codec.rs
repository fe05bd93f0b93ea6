//! Library artifact binary layouts. All values little-endian, no padding.
//!
//! Sub-mesh (`.mesh`):
//! `u32 vertex_count, u32 index_count, vertex_count * (f32x3 pos, f32x3 normal, f32x2 uv), index_count * u32`
//!
//! Sub-mesh index (`.meshes`):
//! `u32 submesh_count, submesh_count * (u32 vertex_count, u32 index_count)`
//!
//! Texture (`.tex`):
//! `i32 width, i32 height, i32 channels, width * height * channels * u8`

use std::{fs, path::Path};

use crate::{
    data::{MeshData, PixelFormat, TextureData, FLOATS_PER_VERTEX},
    error::{AssetError, Result},
};

const MESH_HEADER_LEN: usize = 8;
const VERTEX_LEN: usize = FLOATS_PER_VERTEX * 4;
const TEXTURE_HEADER_LEN: usize = 12;

/// Element counts of one sub-mesh, as recorded in the sub-mesh index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMeshHeader {
    pub vertex_count: u32,
    pub index_count: u32,
}

/// Counts past `u32::MAX` saturate instead of wrapping; `MeshData::validate`
/// rejects such meshes before anything is written.
impl From<&MeshData> for SubMeshHeader {
    fn from(mesh: &MeshData) -> Self {
        SubMeshHeader {
            vertex_count: saturating_u32(mesh.vertex_count()),
            index_count: saturating_u32(mesh.index_count()),
        }
    }
}

fn saturating_u32(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.offset.checked_add(N)?;
        let chunk = self.bytes.get(self.offset..end)?;
        self.offset = end;
        chunk.try_into().ok()
    }

    fn u32(&mut self) -> Option<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Option<i32> {
        self.take::<4>().map(i32::from_le_bytes)
    }

    fn f32(&mut self) -> Option<f32> {
        self.take::<4>().map(f32::from_le_bytes)
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.offset..]
    }
}

/// Exact byte length of a body described by `count * unit` on top of `header`.
fn body_len(header: usize, parts: &[(usize, usize)]) -> Option<usize> {
    parts.iter().try_fold(header, |total, (count, unit)| {
        total.checked_add(count.checked_mul(*unit)?)
    })
}

pub fn encode_mesh(mesh: &MeshData) -> Vec<u8> {
    let header = SubMeshHeader::from(mesh);
    let mut bytes =
        Vec::with_capacity(MESH_HEADER_LEN + mesh.vertex_count() * VERTEX_LEN + mesh.index_count() * 4);

    bytes.extend_from_slice(&header.vertex_count.to_le_bytes());
    bytes.extend_from_slice(&header.index_count.to_le_bytes());
    for value in mesh.interleaved() {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    for index in &mesh.indices {
        bytes.extend_from_slice(&index.to_le_bytes());
    }

    bytes
}

pub fn decode_mesh(path: &Path, bytes: &[u8]) -> Result<MeshData> {
    let mut reader = ByteReader::new(bytes);
    let (Some(vertex_count), Some(index_count)) = (reader.u32(), reader.u32()) else {
        return Err(AssetError::artifact(path, "truncated mesh header"));
    };
    let (vertex_count, index_count) = (vertex_count as usize, index_count as usize);

    let expected = body_len(MESH_HEADER_LEN, &[(vertex_count, VERTEX_LEN), (index_count, 4)])
        .ok_or_else(|| AssetError::artifact(path, "mesh header counts overflow"))?;
    if bytes.len() != expected {
        return Err(AssetError::artifact(
            path,
            format!(
                "mesh header declares {} vertices / {} indices ({} bytes) but file has {} bytes",
                vertex_count,
                index_count,
                expected,
                bytes.len()
            ),
        ));
    }

    let mut vertices = Vec::with_capacity(vertex_count * FLOATS_PER_VERTEX);
    for _ in 0..vertex_count * FLOATS_PER_VERTEX {
        vertices.push(reader.f32().ok_or_else(|| AssetError::artifact(path, "truncated vertices"))?);
    }

    let mut indices = Vec::with_capacity(index_count);
    for _ in 0..index_count {
        let index = reader.u32().ok_or_else(|| AssetError::artifact(path, "truncated indices"))?;
        if index as usize >= vertex_count {
            return Err(AssetError::artifact(
                path,
                format!("index {} out of range for {} vertices", index, vertex_count),
            ));
        }
        indices.push(index);
    }

    Ok(MeshData::from_interleaved(&vertices, indices))
}

pub fn encode_mesh_index(submeshes: &[MeshData]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + submeshes.len() * 8);

    bytes.extend_from_slice(&saturating_u32(submeshes.len()).to_le_bytes());
    for header in submeshes.iter().map(SubMeshHeader::from) {
        bytes.extend_from_slice(&header.vertex_count.to_le_bytes());
        bytes.extend_from_slice(&header.index_count.to_le_bytes());
    }

    bytes
}

pub fn decode_mesh_index(path: &Path, bytes: &[u8]) -> Result<Vec<SubMeshHeader>> {
    let mut reader = ByteReader::new(bytes);
    let count = reader
        .u32()
        .ok_or_else(|| AssetError::artifact(path, "truncated sub-mesh index"))? as usize;

    let expected = body_len(4, &[(count, 8)])
        .ok_or_else(|| AssetError::artifact(path, "sub-mesh count overflows"))?;
    if bytes.len() != expected {
        return Err(AssetError::artifact(
            path,
            format!("index declares {} sub-meshes but file has {} bytes", count, bytes.len()),
        ));
    }

    let mut headers = Vec::with_capacity(count);
    for _ in 0..count {
        match (reader.u32(), reader.u32()) {
            (Some(vertex_count), Some(index_count)) => headers.push(SubMeshHeader {
                vertex_count,
                index_count,
            }),
            _ => return Err(AssetError::artifact(path, "truncated sub-mesh entry")),
        }
    }

    Ok(headers)
}

pub fn encode_texture(texture: &TextureData) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(TEXTURE_HEADER_LEN + texture.pixels.len());

    bytes.extend_from_slice(&(texture.width as i32).to_le_bytes());
    bytes.extend_from_slice(&(texture.height as i32).to_le_bytes());
    bytes.extend_from_slice(&(texture.format.channels() as i32).to_le_bytes());
    bytes.extend_from_slice(&texture.pixels);

    bytes
}

pub fn decode_texture(path: &Path, bytes: &[u8]) -> Result<TextureData> {
    let mut reader = ByteReader::new(bytes);
    let (Some(width), Some(height), Some(channels)) = (reader.i32(), reader.i32(), reader.i32())
    else {
        return Err(AssetError::artifact(path, "truncated texture header"));
    };

    if width < 0 || height < 0 {
        return Err(AssetError::artifact(
            path,
            format!("negative texture size {}x{}", width, height),
        ));
    }
    let format = PixelFormat::from_channels(channels)
        .ok_or_else(|| AssetError::artifact(path, format!("unsupported channel count {}", channels)))?;

    let (width, height) = (width as u32, height as u32);
    let pixels = reader.rest();
    let expected = TextureData::expected_len(width, height, format);
    if pixels.len() != expected {
        return Err(AssetError::artifact(
            path,
            format!(
                "texture header declares {}x{}x{} ({} bytes) but body has {} bytes",
                width,
                height,
                format.channels(),
                expected,
                pixels.len()
            ),
        ));
    }

    Ok(TextureData {
        width,
        height,
        format,
        pixels: pixels.to_vec(),
    })
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| AssetError::artifact(path, e))
}

pub fn read_mesh(path: &Path) -> Result<MeshData> {
    decode_mesh(path, &read_artifact(path)?)
}

pub fn read_mesh_index(path: &Path) -> Result<Vec<SubMeshHeader>> {
    decode_mesh_index(path, &read_artifact(path)?)
}

pub fn read_texture(path: &Path) -> Result<TextureData> {
    decode_texture(path, &read_artifact(path)?)
}
