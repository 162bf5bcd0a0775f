//! Expands command-line paths into the files to upload

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions picked up from directories by default
pub const DEFAULT_EXTENSIONS: &[&str] = &["log", "txt"];

/// One entry of the upload list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovered {
    File(PathBuf),
    /// Path that could not be used; reported as an aborted upload
    Missing { path: PathBuf, reason: String },
}

impl Discovered {
    pub fn path(&self) -> &Path {
        match self {
            Discovered::File(path) | Discovered::Missing { path, .. } => path,
        }
    }
}

/// Expand `paths` into upload candidates, preserving argument order.
///
/// Files named explicitly are always kept. Directories contribute their
/// files whose extension matches `extensions` (case-insensitive), sorted by
/// name, descending into subdirectories only when `recursive` is set.
pub fn discover(paths: &[PathBuf], extensions: &[String], recursive: bool) -> Vec<Discovered> {
    let extensions: Vec<String> = extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    let mut found = Vec::new();
    for path in paths {
        if path.is_file() {
            found.push(Discovered::File(path.clone()));
        } else if path.is_dir() {
            let before = found.len();
            scan_dir(path, &extensions, recursive, &mut found);
            debug!(
                dir = %path.display(),
                files = found.len() - before,
                "Scanned directory"
            );
        } else {
            let reason = match std::fs::metadata(path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => "file not found".to_string(),
                Err(e) => e.to_string(),
                Ok(_) => "not a regular file".to_string(),
            };
            found.push(Discovered::Missing {
                path: path.clone(),
                reason,
            });
        }
    }
    found
}

fn scan_dir(dir: &Path, extensions: &[String], recursive: bool, found: &mut Vec<Discovered>) {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .sort_by_file_name();

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() && has_extension(entry.path(), extensions) => {
                found.push(Discovered::File(entry.into_path()));
            }
            Ok(_) => {}
            Err(e) => warn!(dir = %dir.display(), error = %e, "Skipping unreadable entry"),
        }
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}
