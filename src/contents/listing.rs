//! Immediate-children directory listing with per-file fingerprints.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::digest::digest_file;
use super::paths::PathResolver;
use super::types::{DirEntry, Entry, FileEntry};
use crate::error::{AppError, AppResult};

/// List the immediate children of `real_dir`, sorted by name.
///
/// Best-effort snapshot: entries removed or changed mid-enumeration are skipped
/// rather than failing the whole listing. Symlinks are followed only when their
/// target stays inside the root.
pub fn list_dir(resolver: &PathResolver, real_dir: &Path) -> AppResult<Vec<Entry>> {
    let rd = fs::read_dir(real_dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::not_found("not_found", "directory not exists"),
        _ => AppError::from(e),
    })?;

    let mut out = Vec::new();
    for dent in rd.flatten() {
        let child = dent.path();
        let name = dent.file_name().to_string_lossy().into_owned();
        let Ok(mut ft) = dent.file_type() else { continue; };

        if ft.is_symlink() {
            if resolver.ensure_confined(&child).is_err() {
                debug!(target: "contents", path = %child.display(), "skipping symlink leaving root");
                continue;
            }
            match fs::metadata(&child) {
                Ok(m) => ft = m.file_type(),
                Err(_) => continue, // dangling
            }
        }

        let path = resolver.unresolve(&child)?;
        if ft.is_dir() {
            out.push(Entry::Dir(DirEntry { name, path, size: 0 }));
        } else if ft.is_file() {
            let Ok(meta) = fs::metadata(&child) else { continue; };
            let sha = match digest_file(&child) {
                Ok(sha) => sha,
                Err(e) => {
                    debug!(target: "contents", path = %child.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            out.push(Entry::File(FileEntry { name, path, size: meta.len(), content: None, sha }));
        }
    }
    out.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(out)
}
