//! Filesystem collaborator.
//!
//! The sync executor and backup rotation only ever ask for these four
//! operations; everything else (destination paths, sequencing, fallbacks)
//! is decided by the caller.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

use crate::core::{CodeSwapError, Result};

/// Filesystem primitives the update engine is built on.
#[async_trait]
pub trait FileOps: Send + Sync {
    /// Create `path` and all missing parents.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Copy a single file, overwriting `dest` if present. The destination
    /// parent directory must already exist.
    async fn copy_file(&self, src: &Path, dest: &Path) -> Result<()>;

    /// Recursively copy the directory `src` into `dest`, creating `dest`.
    async fn copy_dir(&self, src: &Path, dest: &Path) -> Result<()>;

    /// Recursively delete `path`. Deleting a path that does not exist is
    /// not an error.
    async fn remove_dir(&self, path: &Path) -> Result<()>;
}

/// [`FileOps`] over the local filesystem via `tokio::fs`.
#[derive(Debug, Default, Clone)]
pub struct LocalFileOps;

fn copy_error(path: &Path, err: impl std::fmt::Display) -> CodeSwapError {
    CodeSwapError::CopyError {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl FileOps for LocalFileOps {
    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn copy_file(&self, src: &Path, dest: &Path) -> Result<()> {
        fs::copy(src, dest).await.map_err(|err| copy_error(src, err))?;
        Ok(())
    }

    async fn copy_dir(&self, src: &Path, dest: &Path) -> Result<()> {
        debug!(src = %src.display(), dest = %dest.display(), "copying directory");
        for entry in WalkDir::new(src).follow_links(false) {
            let entry = entry.map_err(|err| copy_error(src, err))?;
            let relative = entry
                .path()
                .strip_prefix(src)
                .map_err(|err| copy_error(entry.path(), err))?;
            let target = dest.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).await?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::copy(entry.path(), &target)
                    .await
                    .map_err(|err| copy_error(entry.path(), err))?;
            }
        }
        Ok(())
    }

    async fn remove_dir(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copy_dir_preserves_nested_structure() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested")).await.unwrap();
        fs::write(src.join("top.txt"), b"top").await.unwrap();
        fs::write(src.join("nested/inner.txt"), b"inner").await.unwrap();

        let dest = tmp.path().join("dest");
        LocalFileOps.copy_dir(&src, &dest).await.unwrap();

        assert_eq!(fs::read(dest.join("top.txt")).await.unwrap(), b"top");
        assert_eq!(fs::read(dest.join("nested/inner.txt")).await.unwrap(), b"inner");
    }

    #[tokio::test]
    async fn copy_file_missing_source_is_a_copy_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = LocalFileOps
            .copy_file(&tmp.path().join("missing"), &tmp.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, CodeSwapError::CopyError { .. }));
    }

    #[tokio::test]
    async fn remove_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("gone");
        LocalFileOps.remove_dir(&dir).await.unwrap();

        fs::create_dir_all(dir.join("sub")).await.unwrap();
        LocalFileOps.remove_dir(&dir).await.unwrap();
        assert!(!dir.exists());
    }
}
