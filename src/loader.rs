//! Importers: externally authored files in, Library artifacts out.
//!
//! Decoding happens fully in memory before anything is written, so a source the
//! codecs reject leaves no artifact behind and staleness retries it next run.
//! Importers never look at the resource cache.

use std::path::{Path, PathBuf};

use gltf::{mesh::Mode, Gltf};

use crate::{
    data::{MeshData, PixelFormat, TextureData},
    error::{AssetError, Result},
    handles::{AssetUid, ResourceKind},
    library::LibraryStore,
};

/// Decodes `source` and writes its artifact(s) for `uid` into `library`.
/// Returns the primary artifact path.
pub fn import(source: &Path, uid: AssetUid, library: &LibraryStore) -> Result<PathBuf> {
    if !source.is_file() {
        return Err(AssetError::SourceNotFound(source.to_path_buf()));
    }

    let kind = ResourceKind::from_path(source)
        .ok_or_else(|| AssetError::UnsupportedFormat(source.to_path_buf()))?;

    log::info!("Importing {} {} as {}", kind, source.display(), uid);

    let artifact = match kind {
        ResourceKind::Mesh => {
            let submeshes = load_mesh(source)?;
            let path = library.store_mesh(uid, &submeshes)?;
            log::info!(
                "Generated Library mesh {} ({} sub-meshes)",
                path.display(),
                submeshes.len()
            );
            path
        }
        ResourceKind::Texture => {
            let texture = load_texture(source)?;
            let path = library.store_texture(uid, &texture)?;
            log::info!(
                "Generated Library texture {} ({}x{}, {} channels)",
                path.display(),
                texture.width,
                texture.height,
                texture.format.channels()
            );
            path
        }
    };

    Ok(artifact)
}

/// Every sub-mesh in the source, triangulated, attributes zero-filled.
pub fn load_mesh(path: &Path) -> Result<Vec<MeshData>> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let submeshes = match ext.as_deref() {
        Some("gltf") | Some("glb") => load_gltf(path)?,
        Some("obj") => load_obj(path)?,
        _ => return Err(AssetError::UnsupportedFormat(path.to_path_buf())),
    };

    if submeshes.is_empty() {
        return Err(AssetError::decode(path, "no triangle meshes found"));
    }

    Ok(submeshes)
}

pub fn load_gltf(path: &Path) -> Result<Vec<MeshData>> {
    let gltf = Gltf::open(path).map_err(|e| AssetError::decode(path, format!("GLTF open error: {}", e)))?;

    // Resolves GLB chunks, data URIs and external .bin files alike.
    let buffers = gltf::import_buffers(&gltf.document, path.parent(), gltf.blob.clone())
        .map_err(|e| AssetError::decode(path, format!("GLTF buffer error: {}", e)))?;

    let mut submeshes = Vec::new();

    for mesh in gltf.meshes() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));

            let positions: Vec<[f32; 3]> = match reader.read_positions() {
                Some(iter) => iter.collect(),
                None => return Err(AssetError::decode(path, "GLTF primitive is missing positions")),
            };

            let normals = reader
                .read_normals()
                .map(|iter| iter.collect())
                .unwrap_or_default();

            let uvs = reader
                .read_tex_coords(0)
                .map(|iter| iter.into_f32().collect())
                .unwrap_or_default();

            let vertex_count = positions.len() as u32;
            let raw_indices: Vec<u32> = match reader.read_indices() {
                Some(iter) => iter.into_u32().collect(),
                None => (0..vertex_count).collect(),
            };

            let indices = match triangulate(primitive.mode(), &raw_indices) {
                Some(indices) => indices,
                None => {
                    log::warn!(
                        "Skipping {:?} primitive {} of mesh {:?} in {}",
                        primitive.mode(),
                        primitive.index(),
                        mesh.name().unwrap_or("<unnamed>"),
                        path.display()
                    );
                    continue;
                }
            };

            if let Some(bad) = indices.iter().find(|&&index| index >= vertex_count) {
                return Err(AssetError::decode(
                    path,
                    format!("index {} out of range for {} vertices", bad, vertex_count),
                ));
            }

            submeshes.push(
                MeshData {
                    positions,
                    normals,
                    uvs,
                    indices,
                }
                .zero_fill(),
            );
        }
    }

    Ok(submeshes)
}

/// Triangle list for a primitive mode, `None` for point and line modes.
fn triangulate(mode: Mode, indices: &[u32]) -> Option<Vec<u32>> {
    match mode {
        Mode::Triangles => {
            let whole = indices.len() - indices.len() % 3;
            Some(indices[..whole].to_vec())
        }
        Mode::TriangleStrip => Some(
            indices
                .windows(3)
                .enumerate()
                .flat_map(|(i, w)| {
                    // Every other strip triangle flips winding.
                    if i % 2 == 0 {
                        [w[0], w[1], w[2]]
                    } else {
                        [w[1], w[0], w[2]]
                    }
                })
                .collect(),
        ),
        Mode::TriangleFan => {
            let Some((&hub, rim)) = indices.split_first() else {
                return Some(Vec::new());
            };
            Some(rim.windows(2).flat_map(|w| [hub, w[0], w[1]]).collect())
        }
        Mode::Points | Mode::Lines | Mode::LineLoop | Mode::LineStrip => None,
    }
}

pub fn load_obj(path: &Path) -> Result<Vec<MeshData>> {
    let options = tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ..Default::default()
    };

    let (models, _materials) =
        tobj::load_obj(path, &options).map_err(|e| AssetError::decode(path, format!("OBJ error: {}", e)))?;

    let mut submeshes = Vec::new();

    for model in models {
        let mesh = model.mesh;
        if mesh.indices.is_empty() {
            log::warn!("Skipping OBJ object {:?} without faces in {}", model.name, path.display());
            continue;
        }

        let positions: Vec<[f32; 3]> = mesh
            .positions
            .chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect();

        let normals = mesh
            .normals
            .chunks_exact(3)
            .map(|n| [n[0], n[1], n[2]])
            .collect();

        // OBJ puts the UV origin bottom-left; the Library stores top-left like glTF.
        let uvs = mesh
            .texcoords
            .chunks_exact(2)
            .map(|t| [t[0], 1.0 - t[1]])
            .collect();

        submeshes.push(
            MeshData {
                positions,
                normals,
                uvs,
                indices: mesh.indices,
            }
            .zero_fill(),
        );
    }

    Ok(submeshes)
}

/// Decodes to raw interleaved bytes at the image's native channel count.
/// Two-channel (luma + alpha) and high bit-depth images are widened / narrowed to 8-bit.
pub fn load_texture(path: &Path) -> Result<TextureData> {
    let img = image::open(path).map_err(|e| AssetError::decode(path, e))?;
    let (width, height) = (img.width(), img.height());

    let (format, pixels) = match img.color().channel_count() {
        1 => (PixelFormat::R8, img.to_luma8().into_raw()),
        3 => (PixelFormat::Rgb8, img.to_rgb8().into_raw()),
        _ => (PixelFormat::Rgba8, img.to_rgba8().into_raw()),
    };

    Ok(TextureData {
        width,
        height,
        format,
        pixels,
    })
}
