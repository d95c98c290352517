//! Backup-rotation policy: bound and prune the retained bundle history.

use tracing::debug;

use crate::config::BackupEntry;
use crate::core::Result;
use crate::host::FileOps;
use crate::update::StorageLayout;

/// Result of splitting the backup list at the retain count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rotation {
    /// Most recent `retain_count` backups, newest first.
    pub retained: Vec<BackupEntry>,
    /// Everything past the retain count; on-disk content to be deleted.
    pub obsolete: Vec<BackupEntry>,
}

/// Sort backups newest-first (stable, ties keep their original order) and
/// split at `retain_count`. Pure; deleting the obsolete entries' on-disk
/// content is a separate step.
pub(crate) fn rotate(mut backups: Vec<BackupEntry>, retain_count: usize) -> Rotation {
    backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let obsolete = if backups.len() > retain_count {
        backups.split_off(retain_count)
    } else {
        Vec::new()
    };
    Rotation {
        retained: backups,
        obsolete,
    }
}

/// Delete the release folders of obsolete backups. Entries for the factory
/// content (`release: None`) have no folder and are skipped.
pub(crate) async fn delete_backups(
    fs: &dyn FileOps,
    layout: &StorageLayout,
    obsolete: &[BackupEntry],
) -> Result<()> {
    for entry in obsolete {
        let Some(release) = entry.release.as_deref() else {
            continue;
        };
        debug!(release, "deleting obsolete backup");
        fs.remove_dir(&layout.release_dir(release)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(release: &str, timestamp: i64) -> BackupEntry {
        BackupEntry {
            release: Some(release.to_string()),
            timestamp: Utc.timestamp_opt(timestamp, 0).unwrap(),
        }
    }

    #[test]
    fn keeps_newest_and_marks_rest_obsolete() {
        let rotation = rotate(vec![entry("a", 5), entry("b", 1), entry("c", 3)], 2);

        let retained: Vec<_> =
            rotation.retained.iter().map(|e| e.release.as_deref().unwrap()).collect();
        let obsolete: Vec<_> =
            rotation.obsolete.iter().map(|e| e.release.as_deref().unwrap()).collect();
        assert_eq!(retained, ["a", "c"]);
        assert_eq!(obsolete, ["b"]);
    }

    #[test]
    fn retain_count_larger_than_list_keeps_everything() {
        let rotation = rotate(vec![entry("a", 5), entry("b", 1)], 4);
        assert_eq!(rotation.retained.len(), 2);
        assert!(rotation.obsolete.is_empty());
    }

    #[test]
    fn equal_timestamps_keep_original_order() {
        let rotation = rotate(vec![entry("first", 7), entry("second", 7), entry("third", 7)], 2);

        let retained: Vec<_> =
            rotation.retained.iter().map(|e| e.release.as_deref().unwrap()).collect();
        assert_eq!(retained, ["first", "second"]);
        assert_eq!(rotation.obsolete[0].release.as_deref(), Some("third"));
    }

    #[tokio::test]
    async fn factory_entry_is_skipped_on_deletion() {
        use crate::host::LocalFileOps;
        use std::path::PathBuf;

        let tmp = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(tmp.path().to_path_buf(), PathBuf::from("/bundle"));
        tokio::fs::create_dir_all(layout.release_dir("old")).await.unwrap();

        let obsolete = vec![
            BackupEntry { release: None, timestamp: Utc::now() },
            entry("old", 1),
        ];
        delete_backups(&LocalFileOps, &layout, &obsolete).await.unwrap();
        assert!(!layout.release_dir("old").exists());
    }
}
