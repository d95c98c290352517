//! The persisted update-state record.
//!
//! [`CcsConfig`] is the single source of truth for what is currently
//! installed: the active version/release, its entry point and manifest, the
//! retained backup history, and (between a completed download and a
//! completed install) the [`PendingInstallation`] marker that makes
//! installation resumable across process restarts.
//!
//! The record is loaded once at initialization, mutated only at the state
//! machine's commit points, and re-serialized to the durable store after
//! every mutation. The persisted shape carries an explicit
//! [`schema_version`](CcsConfig::schema_version) so future field additions
//! do not need ad-hoc migration logic; records that fail to parse are
//! discarded in favor of a default config rather than surfacing a parse
//! error (see [`store::ConfigStore`]).

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::CONFIG_SCHEMA_VERSION;
use crate::manifest::Manifest;
use crate::update::{StorageLayout, UpdateInfo, UpdateOptions};

/// One retained prior bundle, kept on local storage for rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Release identifier of the retained bundle. `None` marks the factory
    /// (application-bundled) content supplanted by the very first install;
    /// it has no folder of its own under the data directory.
    pub release: Option<String>,
    /// When this bundle was supplanted.
    pub timestamp: DateTime<Utc>,
}

/// Marker that a download completed but promotion has not yet occurred.
///
/// Its presence in the persisted config is the sole signal that an install
/// can be completed after an app restart. It is recorded only after the
/// file sync reported success, and cleared on install or download failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInstallation {
    /// Snapshot of the downloaded update, including its fetched manifest.
    pub update_info: UpdateInfo,
    /// The request options the download was started with.
    pub options: UpdateOptions,
}

/// The process-wide update-state record, persisted as one JSON blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CcsConfig {
    /// Version of the persisted shape itself.
    pub schema_version: u32,
    /// Version identifier of the currently installed bundle.
    pub version: Option<String>,
    /// Release identifier of the currently installed bundle; also names its
    /// folder under the data directory.
    pub release: Option<String>,
    /// Entry point the host should load instead of the bundled one.
    pub entry_point: Option<String>,
    /// Manifest of the last successfully installed bundle, never of an
    /// in-flight download.
    pub manifest: Option<Manifest>,
    /// Retained prior bundles, pruned to the configured backup count at
    /// each install.
    #[serde(default)]
    pub backups: Vec<BackupEntry>,
    /// Present only between a successful download and a successful install.
    #[serde(default)]
    pub pending_installation: Option<PendingInstallation>,
}

impl Default for CcsConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            version: None,
            release: None,
            entry_point: None,
            manifest: None,
            backups: Vec::new(),
            pending_installation: None,
        }
    }
}

impl CcsConfig {
    /// Apply the atomic promotion step: the downloaded update becomes the
    /// active bundle and the supplanted bundle is recorded as a backup.
    ///
    /// This only rewrites the in-memory record; the caller persists it and
    /// rotates/deletes backups afterwards. `now` is injected so rotation
    /// order is testable.
    pub(crate) fn promote(
        &mut self,
        update: &UpdateInfo,
        options: &UpdateOptions,
        layout: &StorageLayout,
        now: DateTime<Utc>,
    ) {
        self.backups.push(BackupEntry {
            release: self.release.take(),
            timestamp: now,
        });
        self.version = Some(update.version.clone());
        self.release = Some(update.release.clone());
        self.entry_point = Some(layout.entry_point(&update.release, &options.entry_file));
        self.manifest = update.manifest.clone();
        self.pending_installation = None;
    }
}
