//! Sidecar metadata: one `.meta` text file next to every source asset.
//!
//! ```text
//! UID: 1234567890123
//! Time: 1718000000
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use crate::{
    error::{AssetError, Result},
    handles::AssetUid,
    library::{modified_time, write_atomic},
};

pub const META_EXTENSION: &str = "meta";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataRecord {
    pub uid: AssetUid,
    /// Source modification time at last import, seconds since the epoch.
    pub time: i64,
}

impl MetadataRecord {
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut uid = None;
        let mut time = None;

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };

            match key.trim() {
                "UID" => {
                    let parsed = value
                        .parse::<AssetUid>()
                        .map_err(|e| format!("bad UID {:?}: {}", value.trim(), e))?;
                    uid = Some(parsed);
                }
                "Time" => {
                    let parsed = value
                        .trim()
                        .parse::<i64>()
                        .map_err(|e| format!("bad Time {:?}: {}", value.trim(), e))?;
                    time = Some(parsed);
                }
                _ => {}
            }
        }

        let uid = uid.ok_or_else(|| "missing UID line".to_string())?;
        if !uid.is_valid() {
            return Err("UID 0 is reserved".to_string());
        }

        // A write cut short after the UID line still carries a usable identity.
        Ok(MetadataRecord {
            uid,
            time: time.unwrap_or(0),
        })
    }

    pub fn to_text(&self) -> String {
        format!("UID: {}\nTime: {}\n", self.uid, self.time)
    }
}

/// `Assets/house.obj` -> `Assets/house.obj.meta`
pub fn sidecar_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_owned();
    name.push(".");
    name.push(META_EXTENSION);
    PathBuf::from(name)
}

pub fn is_sidecar(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(META_EXTENSION))
}

/// Source modification time in whole seconds since the epoch, `0` when unknown.
pub fn source_time(source: &Path) -> i64 {
    modified_time(source)
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0)
}

/// Reads and writes identity sidecars. Never touches the source asset itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataStore;

impl MetadataStore {
    pub fn new() -> Self {
        MetadataStore
    }

    /// Returns the identity bound to `source`, minting and persisting one if the
    /// sidecar is absent or unreadable.
    pub fn get_or_create_identity(&self, source: &Path) -> AssetUid {
        match self.read(source) {
            Ok(Some(record)) => return record.uid,
            Ok(None) => {}
            Err(e) => log::warn!("{}; minting a new identity", e),
        }

        let record = MetadataRecord {
            uid: AssetUid::generate(),
            time: source_time(source),
        };

        if let Err(e) = self.write(source, &record) {
            log::error!(
                "Failed to write sidecar for {}: {} (identity {} will not persist)",
                source.display(),
                e,
                record.uid
            );
        } else {
            log::debug!("Minted identity {} for {}", record.uid, source.display());
        }

        record.uid
    }

    /// `Ok(None)` when there is no sidecar, `MetadataCorrupt` when it does not parse.
    pub fn read(&self, source: &Path) -> Result<Option<MetadataRecord>> {
        let path = sidecar_path(source);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let text = String::from_utf8(bytes).map_err(|e| AssetError::MetadataCorrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        MetadataRecord::parse(&text)
            .map(Some)
            .map_err(|reason| AssetError::MetadataCorrupt { path, reason })
    }

    /// Replaces the sidecar wholesale.
    pub fn write(&self, source: &Path, record: &MetadataRecord) -> Result<()> {
        write_atomic(&sidecar_path(source), record.to_text().as_bytes())?;
        Ok(())
    }

    /// Rewrites the sidecar after a successful import, keeping the identity.
    pub fn refresh(&self, source: &Path, uid: AssetUid) -> Result<MetadataRecord> {
        let record = MetadataRecord {
            uid,
            time: source_time(source),
        };
        self.write(source, &record)?;
        Ok(record)
    }
}
