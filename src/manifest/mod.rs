//! Bundle manifests and the file-sync plan computed from them.
//!
//! A [`Manifest`] describes one release: a mapping from relative file path
//! to an opaque content fingerprint. Manifests are fetched from the content
//! server as JSON (`chcp.manifest`) and persisted as part of the update
//! state record. Two manifests are comparable only by path + fingerprint
//! equality; the fingerprints themselves are never interpreted.
//!
//! [`diff`] turns a local/server manifest pair into a [`SyncPlan`]: which
//! files are already present under the previous release's storage and can
//! be copied, and which must be downloaded. The diff is pure and
//! deterministic, and deliberately ignores paths present only in the local
//! manifest: obsolete files are not deleted by this engine.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Mapping of relative file path to content fingerprint for one release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    files: BTreeMap<String, String>,
}

impl Manifest {
    /// Fingerprint recorded for `path`, if the manifest contains it.
    pub fn fingerprint(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Iterate over `(path, fingerprint)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, f)| (p.as_str(), f.as_str()))
    }

    /// Number of files described by the manifest.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the manifest describes no files at all.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<(String, String)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Manifest {
    fn from(entries: [(&str, &str); N]) -> Self {
        entries.iter().map(|(p, f)| (p.to_string(), f.to_string())).collect()
    }
}

/// The file-sync plan produced by [`diff`].
///
/// Every path of the server manifest lands in exactly one of the two sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Files whose fingerprint matches the local manifest; their content is
    /// already on local storage under the previous release and can be
    /// relocated instead of re-fetched.
    pub files_to_copy: BTreeSet<String>,
    /// Files that are new or changed and must be fetched from the content
    /// server.
    pub files_to_download: BTreeSet<String>,
}

impl SyncPlan {
    /// Total number of files the plan touches.
    pub fn len(&self) -> usize {
        self.files_to_copy.len() + self.files_to_download.len()
    }

    /// Whether the plan has no work at all.
    pub fn is_empty(&self) -> bool {
        self.files_to_copy.is_empty() && self.files_to_download.is_empty()
    }
}

/// Compute the sync plan for moving from `local` to `server`.
///
/// A path goes to `files_to_copy` only when the local manifest records the
/// identical fingerprint for it; everything else in the server manifest goes
/// to `files_to_download`. An absent or empty local manifest (first install)
/// downloads everything. Paths present only locally are ignored.
pub fn diff(local: Option<&Manifest>, server: &Manifest) -> SyncPlan {
    let mut plan = SyncPlan::default();
    for (path, fingerprint) in server.iter() {
        let unchanged = local
            .and_then(|m| m.fingerprint(path))
            .is_some_and(|local_fp| local_fp == fingerprint);
        if unchanged {
            plan.files_to_copy.insert(path.to_string());
        } else {
            plan.files_to_download.insert(path.to_string());
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_server_path_lands_in_exactly_one_set() {
        let local = Manifest::from([("index.html", "aaa"), ("app.js", "bbb"), ("gone.js", "ccc")]);
        let server = Manifest::from([("index.html", "aaa"), ("app.js", "b2b"), ("new.css", "ddd")]);

        let plan = diff(Some(&local), &server);

        for (path, _) in server.iter() {
            let copied = plan.files_to_copy.contains(path);
            let downloaded = plan.files_to_download.contains(path);
            assert!(copied ^ downloaded, "{path} must be in exactly one set");
        }
        // removed files never appear in either set
        assert!(!plan.files_to_copy.contains("gone.js"));
        assert!(!plan.files_to_download.contains("gone.js"));
    }

    #[test]
    fn identical_manifests_download_nothing() {
        let manifest = Manifest::from([("index.html", "aaa"), ("app.js", "bbb")]);
        let plan = diff(Some(&manifest), &manifest);

        assert!(plan.files_to_download.is_empty());
        assert_eq!(plan.files_to_copy.len(), 2);
    }

    #[test]
    fn missing_local_manifest_downloads_everything() {
        let server = Manifest::from([("index.html", "aaa"), ("app.js", "bbb")]);
        let plan = diff(None, &server);

        assert!(plan.files_to_copy.is_empty());
        assert_eq!(plan.files_to_download.len(), 2);
    }

    #[test]
    fn empty_local_manifest_downloads_everything() {
        let server = Manifest::from([("index.html", "aaa")]);
        let plan = diff(Some(&Manifest::default()), &server);

        assert!(plan.files_to_copy.is_empty());
        assert_eq!(plan.files_to_download.len(), 1);
    }

    #[test]
    fn changed_fingerprint_forces_download() {
        let local = Manifest::from([("app.js", "old")]);
        let server = Manifest::from([("app.js", "new")]);
        let plan = diff(Some(&local), &server);

        assert!(plan.files_to_copy.is_empty());
        assert!(plan.files_to_download.contains("app.js"));
    }

    #[test]
    fn manifest_serializes_as_plain_object() {
        let manifest = Manifest::from([("css/app.css", "f1"), ("index.html", "f2")]);
        let json = serde_json::to_string(&manifest).unwrap();
        assert_eq!(json, r#"{"css/app.css":"f1","index.html":"f2"}"#);

        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
    }
}
