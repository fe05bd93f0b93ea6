//! Directory scan as a resumable, cancellable batch.
//!
//! One asset is processed per [`ImportBatch::step`], so a caller can interleave
//! the scan with frames or drive it to the end with [`ImportBatch::run`]. GPU
//! uploads (preload) still happen on the calling thread.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use walkdir::{DirEntry, WalkDir};

use crate::{
    config::LIBRARY_DIR_NAME,
    error::{AssetError, Result},
    meta::is_sidecar,
    resources::ResourceManager,
};

/// Shared flag that stops a batch before its next asset.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The artifact is at least as new as its source.
    UpToDate,
    Imported,
    Failed(String),
    /// Not a mesh or texture extension.
    Unsupported,
    Missing,
}

impl ImportOutcome {
    /// True when a usable artifact exists afterwards.
    pub fn is_ready(&self) -> bool {
        matches!(self, ImportOutcome::UpToDate | ImportOutcome::Imported)
    }
}

impl fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportOutcome::UpToDate => write!(f, "up to date"),
            ImportOutcome::Imported => write!(f, "imported"),
            ImportOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            ImportOutcome::Unsupported => write!(f, "unsupported"),
            ImportOutcome::Missing => write!(f, "missing"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportProgress {
    pub index: usize,
    pub total: usize,
    pub path: PathBuf,
    pub outcome: ImportOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub total: usize,
    pub up_to_date: usize,
    pub imported: usize,
    pub failed: usize,
    pub unsupported: usize,
    pub missing: usize,
    pub cancelled: bool,
    pub failures: Vec<(PathBuf, String)>,
}

impl ImportReport {
    pub fn processed(&self) -> usize {
        self.up_to_date + self.imported + self.failed + self.unsupported + self.missing
    }

    fn record(&mut self, path: &Path, outcome: &ImportOutcome) {
        match outcome {
            ImportOutcome::UpToDate => self.up_to_date += 1,
            ImportOutcome::Imported => self.imported += 1,
            ImportOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push((path.to_path_buf(), reason.clone()));
            }
            ImportOutcome::Unsupported => self.unsupported += 1,
            ImportOutcome::Missing => self.missing += 1,
        }
    }
}

/// The configured Library, or any nested directory named like one. Walks over
/// the asset tree never descend into either.
pub(crate) fn is_library_dir(entry: &DirEntry, library_root: &Path) -> bool {
    entry.path() == library_root
        || (entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == LIBRARY_DIR_NAME)
}

#[derive(Debug)]
pub struct ImportBatch {
    files: Vec<PathBuf>,
    next: usize,
    cancel: CancelToken,
    report: ImportReport,
}

impl ImportBatch {
    /// Walks `root` once. The Library subtree and `.meta` sidecars are skipped;
    /// the file list is sorted so repeated scans visit assets in the same order.
    pub fn discover(root: &Path, library_root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(AssetError::SourceNotFound(root.to_path_buf()));
        }

        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| !is_library_dir(entry, library_root));

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry during scan: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_file() && !is_sidecar(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        log::info!("Discovered {} files under {}", files.len(), root.display());
        Ok(Self::from_files(files))
    }

    pub fn from_files(files: Vec<PathBuf>) -> Self {
        let report = ImportReport {
            total: files.len(),
            ..ImportReport::default()
        };

        Self {
            files,
            next: 0,
            cancel: CancelToken::new(),
            report,
        }
    }

    /// A handle that cancels this batch from elsewhere (another thread, a UI callback).
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn total(&self) -> usize {
        self.files.len()
    }

    pub fn remaining(&self) -> usize {
        self.files.len() - self.next
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0 || self.report.cancelled
    }

    pub fn report(&self) -> &ImportReport {
        &self.report
    }

    /// Imports the next asset. `None` once the batch is exhausted or cancelled.
    pub fn step(&mut self, manager: &mut ResourceManager) -> Option<ImportProgress> {
        if self.remaining() == 0 {
            return None;
        }

        if self.cancel.is_cancelled() {
            if !self.report.cancelled {
                log::info!(
                    "Import cancelled with {} of {} assets left",
                    self.remaining(),
                    self.total()
                );
            }
            self.report.cancelled = true;
            return None;
        }

        let index = self.next;
        let path = self.files[index].clone();
        self.next += 1;

        let outcome = manager.import_file(&path);
        self.report.record(&path, &outcome);

        Some(ImportProgress {
            index,
            total: self.files.len(),
            path,
            outcome,
        })
    }

    /// Runs to completion (or cancellation), reporting after every asset.
    pub fn run(
        mut self,
        manager: &mut ResourceManager,
        mut on_progress: impl FnMut(&ImportProgress),
    ) -> ImportReport {
        while let Some(progress) = self.step(manager) {
            on_progress(&progress);
        }
        self.finish()
    }

    pub fn finish(self) -> ImportReport {
        let report = self.report;
        log::info!(
            "Import finished: {} imported, {} up to date, {} failed, {} unsupported, {} missing{}",
            report.imported,
            report.up_to_date,
            report.failed,
            report.unsupported,
            report.missing,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovery_skips_library_and_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Library/Meshes")).unwrap();
        fs::create_dir_all(root.join("props")).unwrap();
        fs::write(root.join("Library/Meshes/1.meshes"), b"x").unwrap();
        fs::write(root.join("b.png"), b"x").unwrap();
        fs::write(root.join("b.png.meta"), b"UID: 1\n").unwrap();
        fs::write(root.join("props/a.obj"), b"x").unwrap();

        let batch = ImportBatch::discover(root, &root.join("Library")).unwrap();

        assert_eq!(
            batch.files(),
            &[root.join("b.png"), root.join("props/a.obj")]
        );
        assert_eq!(batch.total(), 2);
        assert!(!batch.is_finished());
    }

    #[test]
    fn discovery_of_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            ImportBatch::discover(&missing, &missing.join("Library")),
            Err(AssetError::SourceNotFound(_))
        ));
    }

    #[test]
    fn cancel_token_is_shared() {
        let batch = ImportBatch::from_files(vec![PathBuf::from("a.png")]);
        let token = batch.cancel_token();
        token.cancel();
        assert!(batch.cancel_token().is_cancelled());
    }

    #[test]
    fn report_counts_outcomes() {
        let mut report = ImportReport::default();
        report.record(Path::new("a"), &ImportOutcome::Imported);
        report.record(Path::new("b"), &ImportOutcome::Failed("bad".into()));
        report.record(Path::new("c"), &ImportOutcome::UpToDate);

        assert_eq!(report.processed(), 3);
        assert_eq!(report.failures, vec![(PathBuf::from("b"), "bad".to_string())]);
        assert!(ImportOutcome::UpToDate.is_ready());
        assert!(!ImportOutcome::Missing.is_ready());
    }
}
