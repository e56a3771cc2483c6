//! Frontend submission archives: safe extraction and entry point discovery.

use crate::error::{JudgeError, JudgeResult};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

/// Upper bound on the total uncompressed size of one submission
pub const MAX_UNCOMPRESSED_BYTES: u64 = 50 * 1024 * 1024;

fn invalid(message: String) -> JudgeError {
    JudgeError::Configuration(message)
}

/// Extract `archive` into `dest`, rejecting entries that would land outside
/// it and archives that inflate beyond `max_total` bytes
pub fn extract(archive: &Path, dest: &Path, max_total: u64) -> JudgeResult<usize> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file)
        .map_err(|e| invalid(format!("Submission is not a valid zip archive: {}", e)))?;

    let mut total: u64 = 0;
    let mut written = 0;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| invalid(format!("Corrupt archive entry #{}: {}", i, e)))?;

        total += entry.size();
        if total > max_total {
            return Err(invalid(format!(
                "Archive exceeds {} bytes when decompressed",
                max_total
            )));
        }

        let relative = entry
            .enclosed_name()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| invalid(format!("Invalid file path in archive: {}", entry.name())))?;
        let outpath = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&outpath)?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }

    debug!(files = written, bytes = total, "Archive extracted");
    Ok(written)
}

fn is_markup(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        .unwrap_or(false)
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}

/// Sort key that orders by `/`-joined relative path regardless of platform
fn sort_key(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// First of the least-nested candidates, in the order given
fn shallowest<'a>(candidates: impl Iterator<Item = &'a PathBuf>) -> Option<&'a PathBuf> {
    candidates.min_by_key(|p| p.components().count())
}

/// Locate the page to load
///
/// The shallowest file named `conventional` wins; otherwise the shallowest
/// `.html`/`.htm` file. Ties go to lexicographic order of relative path.
pub fn find_entry_point(root: &Path, conventional: &str) -> JudgeResult<Option<PathBuf>> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort_by_key(|p| sort_key(p));

    let conventional_match = shallowest(
        files
            .iter()
            .filter(|p| p.file_name().map(|n| n == conventional).unwrap_or(false)),
    );
    let chosen = conventional_match.or_else(|| shallowest(files.iter().filter(|p| is_markup(p))));
    Ok(chosen.map(|p| root.join(p)))
}
