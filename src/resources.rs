use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    rc::Rc,
};

use walkdir::WalkDir;

use crate::{
    config::PipelineConfig,
    device::GraphicsDevice,
    error::Result,
    handles::{AssetUid, ResourceKind},
    library::LibraryStore,
    loader,
    meta::{is_sidecar, MetadataRecord, MetadataStore},
    resource::{Resource, ResourceHandle},
    scan::{is_library_dir, ImportBatch, ImportOutcome, ImportReport},
};

#[derive(Debug, Clone)]
struct SourceEntry {
    path: PathBuf,
    kind: ResourceKind,
}

/// Snapshot of one cached resource, for editor display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub uid: AssetUid,
    pub kind: ResourceKind,
    pub source_path: Option<PathBuf>,
    pub loaded: bool,
    pub references: u32,
}

/// The resource cache: at most one [`Resource`] per identity.
///
/// Constructed once by the application and passed to whoever needs lookups.
/// Everything runs on the thread that owns the graphics context.
pub struct ResourceManager {
    config: PipelineConfig,
    library: LibraryStore,
    metadata: MetadataStore,
    device: Rc<dyn GraphicsDevice>,
    resources: HashMap<AssetUid, ResourceHandle>,
    sources: HashMap<AssetUid, SourceEntry>,
}

impl ResourceManager {
    pub fn new(config: PipelineConfig, device: Rc<dyn GraphicsDevice>) -> Self {
        let library = LibraryStore::new(config.library_dir());
        log::info!(
            "Resource manager over {} (Library at {})",
            config.assets_root.display(),
            library.root().display()
        );

        Self {
            config,
            library,
            metadata: MetadataStore::new(),
            device,
            resources: HashMap::new(),
            sources: HashMap::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn library(&self) -> &LibraryStore {
        &self.library
    }

    /// The device resources load onto. Consumers pass it to `Resource::bind`.
    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn contains(&self, uid: AssetUid) -> bool {
        self.resources.contains_key(&uid)
    }

    /// Identity of `source`, minting a sidecar on first sight. Supported sources
    /// are also registered so the identity can be loaded later.
    pub fn get_or_create_identity(&mut self, source: &Path) -> AssetUid {
        let uid = self.metadata.get_or_create_identity(source);
        self.register_source(uid, source);
        uid
    }

    /// Binds `uid` to its source file. Returns false for unsupported extensions.
    pub fn register_source(&mut self, uid: AssetUid, source: &Path) -> bool {
        let Some(kind) = ResourceKind::from_path(source) else {
            log::debug!("Not registering {}: unsupported extension", source.display());
            return false;
        };

        self.sources.insert(
            uid,
            SourceEntry {
                path: source.to_path_buf(),
                kind,
            },
        );
        true
    }

    pub fn source_of(&self, uid: AssetUid) -> Option<&Path> {
        self.sources.get(&uid).map(|entry| entry.path.as_path())
    }

    /// Shared resource for `uid`, counted as one more reference.
    ///
    /// A hit performs no I/O. A miss reimports a stale source, then loads the
    /// artifact. An artifact that exists but cannot be read is reimported once
    /// from its source. When loading still fails the resource is cached,
    /// unloaded, as a placeholder. `None` only when nothing is known about `uid`.
    pub fn get_or_load(&mut self, uid: AssetUid) -> Option<ResourceHandle> {
        if let Some(handle) = self.resources.get(&uid) {
            log::debug!("Cache hit for {}", uid);
            handle.borrow_mut().add_reference();
            return Some(Rc::clone(handle));
        }

        log::debug!("Cache miss for {}", uid);

        let (kind, source, attempted) = match self.sources.get(&uid).cloned() {
            Some(entry) => {
                let attempted = match self.ensure_artifact(uid, &entry.path, entry.kind) {
                    Ok(imported) => imported,
                    Err(e) => {
                        log::warn!("Import of {} failed: {}", entry.path.display(), e);
                        true
                    }
                };
                (entry.kind, Some(entry.path), attempted)
            }
            None => match self.library.stored_kind(uid) {
                Some(kind) => {
                    log::debug!("No source known for {}, using its Library {}", uid, kind);
                    (kind, None, false)
                }
                None => {
                    log::warn!("Unknown identity {}: no source and no artifact", uid);
                    return None;
                }
            },
        };

        let mut resource = Resource::new(
            kind,
            uid,
            source.clone(),
            self.library.artifact_path(uid, kind),
        );
        if !resource.load_in_memory(self.device.as_ref()) && !attempted {
            if let Some(source) = source.as_deref().filter(|source| source.is_file()) {
                log::info!("Artifact of {} is unreadable, reimporting {}", uid, source.display());
                match self.reimport(uid, source) {
                    Ok(()) => {
                        resource.load_in_memory(self.device.as_ref());
                    }
                    Err(e) => log::warn!("Reimport of {} failed: {}", source.display(), e),
                }
            }
        }
        resource.add_reference();

        let handle = Rc::new(RefCell::new(resource));
        self.resources.insert(uid, Rc::clone(&handle));
        Some(handle)
    }

    /// Same as [`get_or_load`](Self::get_or_load), keyed by source path.
    pub fn get_or_load_path(&mut self, source: &Path) -> Option<ResourceHandle> {
        if ResourceKind::from_path(source).is_none() {
            log::warn!("Cannot load {}: unsupported format", source.display());
            return None;
        }

        let uid = self.get_or_create_identity(source);
        self.get_or_load(uid)
    }

    /// Registers an empty, unloaded resource. It loads on first bind.
    ///
    /// An identity already cached as the same kind is returned as is, with one
    /// more reference. `None` when it is cached as another kind; its count is
    /// left alone.
    pub fn create_resource(
        &mut self,
        kind: ResourceKind,
        uid: AssetUid,
        source: Option<&Path>,
    ) -> Option<ResourceHandle> {
        if let Some(handle) = self.resources.get(&uid) {
            let mut resource = handle.borrow_mut();
            if resource.kind() != kind {
                log::warn!(
                    "Identity {} is already a {}, not creating a {}",
                    uid,
                    resource.kind(),
                    kind
                );
                return None;
            }
            resource.add_reference();
            return Some(Rc::clone(handle));
        }

        if let Some(source) = source {
            self.register_source(uid, source);
        }

        let mut resource = Resource::new(
            kind,
            uid,
            source.map(Path::to_path_buf),
            self.library.artifact_path(uid, kind),
        );
        resource.add_reference();

        let handle = Rc::new(RefCell::new(resource));
        self.resources.insert(uid, Rc::clone(&handle));
        Some(handle)
    }

    /// Drops one advisory reference. Never frees anything.
    pub fn release(&mut self, uid: AssetUid) {
        if let Some(handle) = self.resources.get(&uid) {
            handle.borrow_mut().remove_reference();
        }
    }

    /// Frees `uid` on the GPU and forgets it. Handles still held elsewhere are
    /// detached and will not reload.
    pub fn evict(&mut self, uid: AssetUid) -> bool {
        let Some(handle) = self.resources.remove(&uid) else {
            return false;
        };

        let evicted = match handle.try_borrow_mut() {
            Ok(mut resource) => {
                resource.detach(self.device.as_ref());
                log::debug!("Evicted {} {}", resource.kind(), uid);
                true
            }
            Err(_) => {
                log::warn!("Resource {} is in use, not evicting", uid);
                self.resources.insert(uid, Rc::clone(&handle));
                false
            }
        };
        evicted
    }

    /// Evicts every resource with no advisory references that no consumer
    /// handle aliases anymore. Returns how many went.
    pub fn evict_unused(&mut self) -> usize {
        let unused: Vec<AssetUid> = self
            .resources
            .iter()
            .filter(|(_, handle)| {
                Rc::strong_count(handle) == 1
                    && handle
                        .try_borrow()
                        .is_ok_and(|resource| resource.reference_count() == 0)
            })
            .map(|(uid, _)| *uid)
            .collect();

        let evicted = unused.into_iter().filter(|uid| self.evict(*uid)).count();
        if evicted > 0 {
            log::info!("Evicted {} unused resources", evicted);
        }
        evicted
    }

    pub fn entries(&self) -> Vec<ResourceEntry> {
        let mut entries: Vec<ResourceEntry> = self
            .resources
            .iter()
            .filter_map(|(uid, handle)| {
                let resource = handle.try_borrow().ok()?;
                let entry = ResourceEntry {
                    uid: *uid,
                    kind: resource.kind(),
                    source_path: resource.source_path().map(Path::to_path_buf),
                    loaded: resource.is_loaded(),
                    references: resource.reference_count(),
                };
                Some(entry)
            })
            .collect();

        entries.sort_by_key(|entry| entry.uid);
        entries
    }

    /// Frees every resource and empties the cache.
    pub fn clear(&mut self) {
        if self.resources.is_empty() {
            return;
        }

        let count = self.resources.len();
        for (uid, handle) in self.resources.drain() {
            match handle.try_borrow_mut() {
                Ok(mut resource) => resource.detach(self.device.as_ref()),
                Err(_) => log::error!("Resource {} still borrowed at teardown, GPU copy leaked", uid),
            }
        }

        log::info!("Released {} resources", count);
    }

    /// Brings the artifact of one source file up to date.
    ///
    /// A cached resource whose source was reimported is unloaded, so its next
    /// bind picks up the new artifact.
    pub fn import_file(&mut self, source: &Path) -> ImportOutcome {
        if !source.is_file() {
            log::warn!("Source asset not found: {}", source.display());
            return ImportOutcome::Missing;
        }

        let Some(kind) = ResourceKind::from_path(source) else {
            log::debug!("Skipping {}: unsupported format", source.display());
            return ImportOutcome::Unsupported;
        };

        let uid = self.get_or_create_identity(source);

        let outcome = match self.ensure_artifact(uid, source, kind) {
            Ok(true) => {
                if let Some(handle) = self.resources.get(&uid) {
                    if let Ok(mut resource) = handle.try_borrow_mut() {
                        resource.free_memory(self.device.as_ref());
                    }
                }
                ImportOutcome::Imported
            }
            Ok(false) => ImportOutcome::UpToDate,
            Err(e) => {
                log::warn!("Import of {} failed: {}", source.display(), e);
                ImportOutcome::Failed(e.to_string())
            }
        };

        if self.config.preload_on_scan && outcome.is_ready() {
            self.preload(uid, kind, source);
        }

        outcome
    }

    /// Imports every asset under `root` in one go.
    pub fn import_all_assets(&mut self, root: &Path) -> ImportReport {
        match self.import_batch(root) {
            Ok(batch) => batch.run(self, |_| {}),
            Err(e) => {
                log::warn!("Cannot scan {}: {}", root.display(), e);
                ImportReport::default()
            }
        }
    }

    /// A batch over `root` that skips this manager's Library.
    pub fn import_batch(&self, root: &Path) -> Result<ImportBatch> {
        ImportBatch::discover(root, self.library.root())
    }

    /// Deletes Library artifacts whose identity no sidecar under `root` claims.
    /// Cached identities are kept. Returns how many identities were purged.
    pub fn purge_orphans(&mut self, root: &Path) -> Result<usize> {
        let library_root = self.library.root().to_path_buf();
        let mut owned = HashSet::new();

        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| !is_library_dir(entry, &library_root))
            .filter_map(|entry| entry.ok())
        {
            if !entry.file_type().is_file() || !is_sidecar(entry.path()) {
                continue;
            }
            let record = std::fs::read_to_string(entry.path())
                .ok()
                .and_then(|text| MetadataRecord::parse(&text).ok());
            if let Some(record) = record {
                owned.insert(record.uid);
            }
        }

        let mut purged = 0;
        for (uid, kind) in self.library.artifacts()? {
            if owned.contains(&uid) || self.resources.contains_key(&uid) {
                continue;
            }
            let files = self.library.remove_artifacts(uid, kind)?;
            log::info!("Purged orphaned {} {} ({} files)", kind, uid, files);
            purged += 1;
        }

        Ok(purged)
    }

    /// Reimports when the artifact is missing or older than the source, then
    /// rewrites the sidecar. Returns whether an import ran.
    fn ensure_artifact(&self, uid: AssetUid, source: &Path, kind: ResourceKind) -> Result<bool> {
        let artifact = self.library.artifact_path(uid, kind);
        if !self.library.needs_reimport(source, &artifact) {
            return Ok(false);
        }

        self.reimport(uid, source)?;
        Ok(true)
    }

    /// Unconditional import, then a sidecar refresh.
    fn reimport(&self, uid: AssetUid, source: &Path) -> Result<()> {
        loader::import(source, uid, &self.library)?;

        if let Err(e) = self.metadata.refresh(source, uid) {
            log::warn!("Failed to refresh sidecar of {}: {}", source.display(), e);
        }
        Ok(())
    }

    fn preload(&mut self, uid: AssetUid, kind: ResourceKind, source: &Path) {
        let device = Rc::clone(&self.device);
        let library_path = self.library.artifact_path(uid, kind);

        let handle = self.resources.entry(uid).or_insert_with(|| {
            Rc::new(RefCell::new(Resource::new(
                kind,
                uid,
                Some(source.to_path_buf()),
                library_path,
            )))
        });

        if let Ok(mut resource) = handle.try_borrow_mut() {
            resource.load_in_memory(device.as_ref());
        }
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.clear();
    }
}
