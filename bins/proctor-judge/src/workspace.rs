//! Run-scoped working directories
//!
//! A `Workspace` owns a directory under the configured work root and
//! removes it on drop, on every exit path including panics and
//! cancelled futures. Failing runs can instead hand the directory over
//! to the retention area with `retain_into`.

use crate::error::{JudgeError, JudgeResult};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under `root` whose name starts with `prefix`
    pub fn create(root: &Path, prefix: &str) -> JudgeResult<Self> {
        fs::create_dir_all(root).map_err(|e| {
            JudgeError::System(format!(
                "Failed to create work root {}: {}",
                root.display(),
                e
            ))
        })?;

        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(root)
            .map_err(|e| {
                JudgeError::System(format!(
                    "Failed to create workspace in {}: {}",
                    root.display(),
                    e
                ))
            })?;

        debug!(path = %dir.path().display(), "Workspace created");
        Ok(Self { dir })
    }

    /// Per-submission directory named `exercise-<id>_<timestamp>-<uniq>`
    pub fn for_submission(root: &Path, exercise_id: i64) -> JudgeResult<Self> {
        let prefix = format!(
            "exercise-{}_{}-",
            exercise_id,
            chrono::Utc::now().timestamp()
        );
        Self::create(root, &prefix)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Copy a file into the workspace under `name`
    pub fn copy_in(&self, from: &Path, name: &str) -> JudgeResult<PathBuf> {
        let target = self.join(name);
        fs::copy(from, &target).map_err(|e| {
            JudgeError::System(format!(
                "Failed to copy {} into workspace: {}",
                from.display(),
                e
            ))
        })?;
        Ok(target)
    }

    /// Remove files with any of the given extensions from the top level
    pub fn remove_artifacts(&self, extensions: &[String]) {
        if extensions.is_empty() {
            return;
        }
        let Ok(entries) = fs::read_dir(self.path()) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| {
                    extensions
                        .iter()
                        .any(|x| x.trim_start_matches('.').eq_ignore_ascii_case(e))
                })
                .unwrap_or(false);

            if matches {
                if let Err(e) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove build artifact");
                }
            }
        }
    }

    /// Keep the directory for post-mortem inspection, moving it into
    /// `retention_dir` when possible. Returns where it ended up.
    pub fn retain_into(self, retention_dir: &Path) -> PathBuf {
        let kept = self.dir.keep();

        let Some(name) = kept.file_name() else {
            return kept;
        };
        if let Err(e) = fs::create_dir_all(retention_dir) {
            warn!(error = %e, "Retention directory unavailable, leaving artifact in place");
            return kept;
        }

        let target = retention_dir.join(name);
        match fs::rename(&kept, &target) {
            Ok(()) => target,
            Err(e) => {
                warn!(error = %e, "Failed to move artifact into retention directory");
                kept
            }
        }
    }
}
