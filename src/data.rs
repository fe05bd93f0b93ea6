/// Floats per interleaved vertex: position (3) + normal (3) + uv (2).
pub const FLOATS_PER_VERTEX: usize = 8;

/// One sub-mesh decoded on the CPU, ready to be written to the Library or uploaded.
///
/// `normals` and `uvs` always have one entry per position; sources without them
/// are zero-filled by the importer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>, // Required
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Fills missing normals / uvs with zeros so every attribute matches the position count.
    pub fn zero_fill(mut self) -> Self {
        let count = self.positions.len();
        if self.normals.len() != count {
            self.normals = vec![[0.0; 3]; count];
        }
        if self.uvs.len() != count {
            self.uvs = vec![[0.0; 2]; count];
        }
        self
    }

    /// Checks what the Library layout relies on: one normal and one uv per
    /// position, indices in range, counts that fit the `u32` header fields.
    pub fn validate(&self) -> Result<(), String> {
        let count = self.vertex_count();
        if self.normals.len() != count || self.uvs.len() != count {
            return Err(format!(
                "{} positions but {} normals and {} uvs",
                count,
                self.normals.len(),
                self.uvs.len()
            ));
        }
        if u32::try_from(count).is_err() || u32::try_from(self.index_count()).is_err() {
            return Err(format!(
                "{} vertices / {} indices exceed the artifact header",
                count,
                self.index_count()
            ));
        }
        if let Some(index) = self.indices.iter().find(|&&index| index as usize >= count) {
            return Err(format!("index {} out of range for {} vertices", index, count));
        }
        Ok(())
    }

    /// Missing normals / uvs read as zero.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.vertex_count() * FLOATS_PER_VERTEX);

        for (i, position) in self.positions.iter().enumerate() {
            interleaved.extend_from_slice(position);
            interleaved.extend_from_slice(&self.normals.get(i).copied().unwrap_or([0.0; 3]));
            interleaved.extend_from_slice(&self.uvs.get(i).copied().unwrap_or([0.0; 2]));
        }

        interleaved
    }

    pub fn from_interleaved(vertices: &[f32], indices: Vec<u32>) -> Self {
        let mut mesh = MeshData {
            indices,
            ..Default::default()
        };

        for vertex in vertices.chunks_exact(FLOATS_PER_VERTEX) {
            mesh.positions.push([vertex[0], vertex[1], vertex[2]]);
            mesh.normals.push([vertex[3], vertex[4], vertex[5]]);
            mesh.uvs.push([vertex[6], vertex[7]]);
        }

        mesh
    }
}

/// Native pixel layouts the Library stores; the channel count is the wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    R8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn from_channels(channels: i32) -> Option<Self> {
        match channels {
            1 => Some(PixelFormat::R8),
            3 => Some(PixelFormat::Rgb8),
            4 => Some(PixelFormat::Rgba8),
            _ => None,
        }
    }

    pub fn channels(self) -> usize {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>, // width * height * channels, row-major, no padding
}

impl TextureData {
    pub fn expected_len(width: u32, height: u32, format: PixelFormat) -> usize {
        width as usize * height as usize * format.channels()
    }
}
