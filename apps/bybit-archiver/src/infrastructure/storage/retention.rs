//! Retention Enforcer
//!
//! Size-bounded eviction over the storage root. The ledger of (path, size,
//! mtime) is rebuilt by scanning on every pass, never persisted. When total
//! usage exceeds the quota, files are deleted oldest-first by modification
//! time until usage fits. The newest file is never deleted, so a single
//! file that alone exceeds the quota survives the pass. Deletion is
//! permanent; there is no archival.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One scanned output file.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Size in bytes.
    pub len: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

/// Outcome of one retention pass, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionReport {
    /// Total bytes found by the scan.
    pub total_bytes_before: u64,
    /// Files deleted during the pass.
    pub deleted_files: usize,
    /// Bytes reclaimed by successful deletions.
    pub freed_bytes: u64,
    /// Bytes remaining after the pass.
    pub total_bytes_after: u64,
}

/// Deletes the oldest output files once total usage exceeds the quota.
#[derive(Debug, Clone)]
pub struct RetentionEnforcer {
    root: PathBuf,
    quota_bytes: u64,
}

impl RetentionEnforcer {
    /// Create an enforcer over `root` with the given byte ceiling.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, quota_bytes: u64) -> Self {
        Self {
            root: root.into(),
            quota_bytes,
        }
    }

    /// The configured quota in bytes.
    #[must_use]
    pub const fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    /// Run one eviction pass.
    ///
    /// Scan errors on individual entries and deletion errors are logged and
    /// skipped; the pass always completes. A missing storage root counts as
    /// empty (nothing has been flushed yet).
    pub fn enforce(&self) -> RetentionReport {
        let mut files = Vec::new();
        collect_files(&self.root, &mut files);

        let total_bytes_before: u64 = files.iter().map(|f| f.len).sum();
        let mut report = RetentionReport {
            total_bytes_before,
            deleted_files: 0,
            freed_bytes: 0,
            total_bytes_after: total_bytes_before,
        };

        if total_bytes_before <= self.quota_bytes {
            return report;
        }

        tracing::info!(
            total_bytes = total_bytes_before,
            quota_bytes = self.quota_bytes,
            "storage over quota, evicting oldest files"
        );

        files.sort_by_key(|f| f.modified);

        // Oldest first, sparing the newest file: partial-file deletion is
        // undefined, so a single over-quota file is left in place.
        let candidates = files.len().saturating_sub(1);
        for file in &files[..candidates] {
            if report.total_bytes_after <= self.quota_bytes {
                break;
            }
            match std::fs::remove_file(&file.path) {
                Ok(()) => {
                    report.deleted_files += 1;
                    report.freed_bytes += file.len;
                    report.total_bytes_after -= file.len;
                    tracing::info!(
                        path = %file.path.display(),
                        freed_bytes = file.len,
                        remaining_bytes = report.total_bytes_after,
                        "evicted file"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        path = %file.path.display(),
                        error = %e,
                        "failed to delete file, skipping"
                    );
                }
            }
        }

        report
    }
}

/// Recursively collect regular files under `dir`. Unreadable entries are
/// logged and skipped.
fn collect_files(dir: &Path, out: &mut Vec<StoredFile>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "failed to scan directory");
            return;
        }
    };

    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        match entry.metadata() {
            Ok(meta) if meta.is_dir() => collect_files(&path, out),
            Ok(meta) if meta.is_file() => {
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                out.push(StoredFile {
                    path,
                    len: meta.len(),
                    modified,
                });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to stat entry");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
