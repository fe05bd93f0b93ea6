use std::{fmt, path::Path, str::FromStr};

/// Stable identity of one source asset, persisted in its `.meta` sidecar.
///
/// Zero is never minted and is rejected when parsed back from a sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetUid(pub u64);

impl AssetUid {
    /// Mints a fresh identity from the thread-local CSPRNG (OS-seeded).
    pub fn generate() -> Self {
        loop {
            let value: u64 = rand::random();
            if value != 0 {
                return AssetUid(value);
            }
        }
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for AssetUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AssetUid {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(AssetUid)
    }
}

/// The closed set of resource kinds the pipeline knows how to import and load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Mesh,
    Texture,
}

impl ResourceKind {
    pub const MESH_EXTENSIONS: &'static [&'static str] = &["gltf", "glb", "obj"];
    pub const TEXTURE_EXTENSIONS: &'static [&'static str] =
        &["png", "jpg", "jpeg", "bmp", "tga", "gif", "webp"];

    /// Picks the kind from a source file's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();

        if Self::MESH_EXTENSIONS.contains(&ext.as_str()) {
            Some(ResourceKind::Mesh)
        } else if Self::TEXTURE_EXTENSIONS.contains(&ext.as_str()) {
            Some(ResourceKind::Texture)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Mesh => "mesh",
            ResourceKind::Texture => "texture",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_uids_are_valid_and_distinct() {
        let a = AssetUid::generate();
        let b = AssetUid::generate();
        assert!(a.is_valid());
        assert!(b.is_valid());
        assert_ne!(a, b);
    }

    #[test]
    fn uid_parses_its_own_display() {
        let uid = AssetUid(18_446_744_073_709_551_615);
        assert_eq!(uid.to_string().parse::<AssetUid>().unwrap(), uid);
        assert!(" 42 ".parse::<AssetUid>().is_ok());
        assert!("-1".parse::<AssetUid>().is_err());
    }

    #[test]
    fn kind_follows_extension() {
        assert_eq!(ResourceKind::from_path(Path::new("a/b.GLB")), Some(ResourceKind::Mesh));
        assert_eq!(ResourceKind::from_path(Path::new("house.obj")), Some(ResourceKind::Mesh));
        assert_eq!(ResourceKind::from_path(Path::new("wall.Png")), Some(ResourceKind::Texture));
        assert_eq!(ResourceKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(ResourceKind::from_path(Path::new("Makefile")), None);
    }
}
