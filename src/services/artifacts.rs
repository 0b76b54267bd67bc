//! Files produced for shipments: carrier labels, customs paperwork and manifests.
//!
//! Paths stored in the database are relative to the uploads root. Every write is
//! mirrored under the backup root when one is configured; a failed mirror is
//! reported back to the caller but never fails the write itself.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::Serialize;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::errors::ServiceError;

pub const LABELS_DIR: &str = "labels";
pub const MANIFESTS_DIR: &str = "manifests";
pub const CUSTOMS_DIR: &str = "customs";

#[derive(Debug, Clone, PartialEq)]
pub struct StoredArtifact {
    /// Relative to the uploads root
    pub path: String,
    pub backup_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed_files: usize,
    pub removed_dirs: usize,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    backup_root: Option<PathBuf>,
    retention: Duration,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, backup_root: Option<PathBuf>, retention_days: u32) -> Self {
        Self {
            root: root.into(),
            backup_root,
            retention: Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            config.uploads_root.clone(),
            config.backup_root.clone(),
            config.retention_days,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a stored relative path, refusing anything that escapes the root.
    pub fn absolute(&self, relative: &str) -> Result<PathBuf, ServiceError> {
        let rel = Path::new(relative);
        let safe = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe || relative.trim().is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "invalid artifact path: {}",
                relative
            )));
        }
        Ok(self.root.join(rel))
    }

    /// Decodes a base64 label stream and stores it as `labels/{parcel}_{ts}.{ext}`.
    pub async fn save_label(
        &self,
        parcel_id: &str,
        stream: &str,
    ) -> Result<StoredArtifact, ServiceError> {
        let compact: String = stream.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "BRT returned an empty label stream".into(),
            ));
        }
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| ServiceError::InvalidOperation(format!("label stream is not base64: {}", e)))?;

        let extension = if bytes.starts_with(b"%PDF") { "pdf" } else { "zpl" };
        let stem = if parcel_id.trim().is_empty() { "label" } else { parcel_id };
        self.write(LABELS_DIR, stem, extension, &bytes).await
    }

    /// Stores a generated PDF as `{dir}/{stem}_{ts}.pdf`.
    pub async fn write_document(
        &self,
        dir: &str,
        stem: &str,
        bytes: &[u8],
    ) -> Result<StoredArtifact, ServiceError> {
        self.write(dir, stem, "pdf", bytes).await
    }

    async fn write(
        &self,
        dir: &str,
        stem: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<StoredArtifact, ServiceError> {
        let file_name = format!(
            "{}_{}.{}",
            sanitize_stem(stem),
            Utc::now().format("%Y%m%d%H%M%S%6f"),
            extension
        );
        let relative = format!("{}/{}", dir.trim_matches('/'), file_name);
        let target = self.absolute(&relative)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, bytes).await?;
        debug!(path = %relative, size = bytes.len(), "artifact written");

        let backup_error = match &self.backup_root {
            Some(backup_root) => mirror(backup_root, &relative, bytes)
                .await
                .err()
                .map(|e| {
                    warn!(path = %relative, error = %e, "artifact backup failed");
                    format!("Backup copy of {} failed: {}", relative, e)
                }),
            None => None,
        };

        Ok(StoredArtifact {
            path: relative,
            backup_error,
        })
    }

    /// Removes a file and its backup. Missing files are not an error.
    pub async fn delete(&self, relative: &str) -> bool {
        let Ok(target) = self.absolute(relative) else {
            return false;
        };
        let removed = remove_if_exists(&target).await;
        if let Some(backup_root) = &self.backup_root {
            remove_if_exists(&backup_root.join(relative)).await;
        }
        removed
    }

    pub async fn exists(&self, relative: &str) -> bool {
        match self.absolute(relative) {
            Ok(path) => fs::metadata(path).await.is_ok(),
            Err(_) => false,
        }
    }

    /// Retention sweep with the configured window.
    pub async fn cleanup_expired(&self) -> CleanupReport {
        let cutoff = SystemTime::now()
            .checked_sub(self.retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        self.cleanup_older_than(cutoff).await
    }

    /// Deletes files last modified before `cutoff` and prunes empty directories
    /// below the uploads and backup roots.
    pub async fn cleanup_older_than(&self, cutoff: SystemTime) -> CleanupReport {
        let mut roots = vec![self.root.clone()];
        if let Some(backup) = &self.backup_root {
            roots.push(backup.clone());
        }

        let result = tokio::task::spawn_blocking(move || {
            let mut report = CleanupReport::default();
            for root in roots {
                if root.is_dir() {
                    sweep_dir(&root, cutoff, &mut report, true);
                }
            }
            report
        })
        .await;

        match result {
            Ok(report) => {
                if report.removed_files > 0 || report.removed_dirs > 0 {
                    info!(
                        files = report.removed_files,
                        dirs = report.removed_dirs,
                        "expired artifacts removed"
                    );
                }
                report
            }
            Err(e) => {
                warn!(error = %e, "artifact retention sweep aborted");
                CleanupReport::default()
            }
        }
    }
}

async fn mirror(backup_root: &Path, relative: &str, bytes: &[u8]) -> io::Result<()> {
    let target = backup_root.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(target, bytes).await
}

async fn remove_if_exists(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not remove artifact");
            false
        }
    }
}

/// Returns true when the directory is empty after the sweep.
fn sweep_dir(dir: &Path, cutoff: SystemTime, report: &mut CleanupReport, is_root: bool) -> bool {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "cannot read artifact directory");
            return false;
        }
    };

    let mut remaining = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else {
            remaining += 1;
            continue;
        };
        if meta.is_dir() {
            if sweep_dir(&path, cutoff, report, false) {
                if std::fs::remove_dir(&path).is_ok() {
                    report.removed_dirs += 1;
                    continue;
                }
            }
            remaining += 1;
        } else {
            let expired = meta.modified().map(|m| m < cutoff).unwrap_or(false);
            if expired && std::fs::remove_file(&path).is_ok() {
                report.removed_files += 1;
            } else {
                remaining += 1;
            }
        }
    }

    !is_root && remaining == 0
}

fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.chars().take(64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ArtifactStore {
        ArtifactStore::new(
            dir.path().join("uploads"),
            Some(dir.path().join("backup")),
            120,
        )
    }

    #[tokio::test]
    async fn label_is_written_with_backup() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let stream = STANDARD.encode(b"%PDF-1.4 fake label");

        let saved = store.save_label("0598765432", &stream).await.unwrap();
        assert!(saved.path.starts_with("labels/0598765432_"));
        assert!(saved.path.ends_with(".pdf"));
        assert!(saved.backup_error.is_none());
        assert!(store.exists(&saved.path).await);
        assert!(dir.path().join("backup").join(&saved.path).exists());

        assert!(store.delete(&saved.path).await);
        assert!(!store.exists(&saved.path).await);
        assert!(!dir.path().join("backup").join(&saved.path).exists());
    }

    #[tokio::test]
    async fn invalid_streams_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.save_label("1", "   ").await.is_err());
        assert!(store.save_label("1", "***").await.is_err());
    }

    #[test]
    fn paths_cannot_escape_the_root() {
        let store = ArtifactStore::new("/srv/brt", None, 120);
        assert!(store.absolute("../etc/passwd").is_err());
        assert!(store.absolute("/etc/passwd").is_err());
        assert_eq!(
            store.absolute("labels/a.pdf").unwrap(),
            PathBuf::from("/srv/brt/labels/a.pdf")
        );
    }

    #[tokio::test]
    async fn sweep_removes_old_files_and_empty_dirs() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let saved = store
            .write_document("customs/7", "invoice", b"%PDF-1.5")
            .await
            .unwrap();

        // nothing is older than the epoch
        let report = store.cleanup_older_than(SystemTime::UNIX_EPOCH).await;
        assert_eq!(report, CleanupReport::default());

        let future = SystemTime::now() + Duration::from_secs(60);
        let report = store.cleanup_older_than(future).await;
        assert_eq!(report.removed_files, 2);
        assert!(!store.exists(&saved.path).await);
        assert!(!dir.path().join("uploads/customs").exists());
        assert!(dir.path().join("uploads").exists());
    }
}
