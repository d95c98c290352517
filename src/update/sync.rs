//! Executes the sync plan for one release: copy what is already local,
//! download the rest, then lay down the platform bootstrap.
//!
//! This component only sequences and constructs destination paths; the
//! actual copying and downloading happen in the host collaborators. The
//! one piece of policy it owns is the fallback: a failure anywhere in the
//! copy phase reroutes the whole copy set to downloads instead of failing
//! the update, because a missing source file just means the content must
//! be re-fetched.

use std::collections::BTreeSet;
use std::path::Path;

use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::constants::{BOOTSTRAP_DIRS, BOOTSTRAP_FILES, MANIFEST_FILE};
use crate::core::Result;
use crate::host::{FileOps, Transport};
use crate::manifest::SyncPlan;
use crate::update::{StorageLayout, UpdateInfo, UpdateOptions};
use crate::utils::url_join;

pub(crate) struct FileSync<'a> {
    fs: &'a dyn FileOps,
    transport: &'a dyn Transport,
    layout: &'a StorageLayout,
}

impl<'a> FileSync<'a> {
    pub(crate) fn new(
        fs: &'a dyn FileOps,
        transport: &'a dyn Transport,
        layout: &'a StorageLayout,
    ) -> Self {
        Self {
            fs,
            transport,
            layout,
        }
    }

    /// Bring `release_dir(update.release)` to the state described by the
    /// server manifest, then re-copy the platform bootstrap on top.
    pub(crate) async fn apply(
        &self,
        plan: &SyncPlan,
        source_release: Option<&str>,
        update: &UpdateInfo,
        options: &UpdateOptions,
    ) -> Result<()> {
        let dest = self.layout.release_dir(&update.release);
        self.fs.create_dir_all(&dest).await?;

        let mut refetch = false;
        if !plan.files_to_copy.is_empty() {
            match source_release {
                Some(source) => {
                    if let Err(err) = self.copy_from_release(&plan.files_to_copy, source, &dest).await
                    {
                        warn!(error = %err, "copy from previous release failed, re-fetching those files");
                        refetch = true;
                    }
                }
                None => {
                    debug!("no previous release on local storage, fetching full file set");
                    refetch = true;
                }
            }
        }
        if refetch {
            self.download_files(&plan.files_to_copy, update, options, &dest).await?;
        }
        self.download_files(&plan.files_to_download, update, options, &dest).await?;

        self.copy_bootstrap(&dest).await
    }

    async fn copy_from_release(
        &self,
        files: &BTreeSet<String>,
        source_release: &str,
        dest: &Path,
    ) -> Result<()> {
        let source_root = self.layout.release_dir(source_release);
        for file in files {
            let target = dest.join(file);
            if let Some(parent) = target.parent() {
                self.fs.create_dir_all(parent).await?;
            }
            self.fs.copy_file(&source_root.join(file), &target).await?;
        }
        Ok(())
    }

    async fn download_files(
        &self,
        files: &BTreeSet<String>,
        update: &UpdateInfo,
        options: &UpdateOptions,
        dest: &Path,
    ) -> Result<()> {
        // Parent directories first so the parallel downloads never race on
        // directory creation.
        for file in files {
            if let Some(parent) = dest.join(file).parent() {
                self.fs.create_dir_all(parent).await?;
            }
        }
        try_join_all(files.iter().map(|file| {
            let url = url_join(&update.content_url, file);
            let target = dest.join(file);
            async move {
                debug!(%url, "fetching bundle file");
                self.transport.download(&url, &options.headers, &target).await
            }
        }))
        .await?;
        Ok(())
    }

    /// Platform-owned files are never diffed against the manifest; they are
    /// re-copied from the read-only application bundle into every release.
    async fn copy_bootstrap(&self, dest: &Path) -> Result<()> {
        let www = self.layout.bundle_www();
        for file in BOOTSTRAP_FILES {
            self.fs.copy_file(&www.join(file), &dest.join(file)).await?;
        }
        for dir in BOOTSTRAP_DIRS {
            self.fs.copy_dir(&www.join(dir), &dest.join(dir)).await?;
        }
        Ok(())
    }
}

/// URL the server manifest for `update` is fetched from.
pub(crate) fn manifest_url(update: &UpdateInfo) -> String {
    url_join(&update.content_url, MANIFEST_FILE)
}
