//! Tracks which files have changed during phase 4, so the review coordinator
//! can snapshot their current content when a review fires.

use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use waypoints_common::FileChange;

pub struct FileTracker {
    working_dir: PathBuf,
    changes: Mutex<HashMap<PathBuf, FileChange>>,
}

impl FileTracker {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            changes: Mutex::new(HashMap::new()),
        }
    }

    /// Overwrites any existing entry for `path` — last write wins.
    pub async fn record_change(&self, path: PathBuf, tool_name: impl Into<String>) {
        let mut changes = self.changes.lock().await;
        changes.insert(
            path.clone(),
            FileChange {
                file_path: path,
                tool_name: tool_name.into(),
                timestamp: Utc::now(),
            },
        );
    }

    /// Current on-disk content of every tracked file. A file that can no
    /// longer be read (deleted, permissions) is skipped via `on_skip`
    /// rather than failing the whole call.
    pub async fn pending_changes(&self, mut on_skip: impl FnMut(&Path)) -> HashMap<PathBuf, String> {
        let changes = self.changes.lock().await;
        let mut result = HashMap::new();
        for path in changes.keys() {
            let full_path = self.working_dir.join(path);
            match std::fs::read_to_string(&full_path) {
                Ok(content) => {
                    result.insert(path.clone(), content);
                }
                Err(_) => on_skip(path),
            }
        }
        result
    }

    pub async fn clear_pending(&self) {
        self.changes.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_change_dedups_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FileTracker::new(dir.path());
        tracker.record_change(PathBuf::from("a.rs"), "Write").await;
        tracker.record_change(PathBuf::from("a.rs"), "Edit").await;
        assert_eq!(tracker.changes.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn pending_changes_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}").unwrap();
        let tracker = FileTracker::new(dir.path());
        tracker.record_change(PathBuf::from("a.rs"), "Write").await;
        tracker.record_change(PathBuf::from("missing.rs"), "Write").await;

        let mut skipped = Vec::new();
        let pending = tracker.pending_changes(|p| skipped.push(p.to_path_buf())).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(skipped, vec![PathBuf::from("missing.rs")]);
    }

    #[tokio::test]
    async fn clear_pending_empties_map() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FileTracker::new(dir.path());
        tracker.record_change(PathBuf::from("a.rs"), "Write").await;
        tracker.clear_pending().await;
        assert_eq!(tracker.changes.lock().await.len(), 0);
    }
}
