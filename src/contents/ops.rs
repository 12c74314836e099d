//! Core contents operations: get, create-or-update and delete over the confined tree.
//! Writes and deletes are compare-and-swap on the content fingerprint.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use super::digest::{digest_bytes, digest_file, Fingerprint};
use super::listing::list_dir;
use super::locks::PathLocks;
use super::paths::PathResolver;
use super::types::{FileEntry, FsEntry, WriteOutcome, WriteStatus};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    File,
    Dir,
    /// Sockets, fifos and devices: occupied, but not something we read or write.
    Special,
    Absent,
}

/// Single classification call per operation.
fn classify(real: &Path) -> AppResult<Kind> {
    match fs::metadata(real) {
        Ok(m) if m.is_file() => Ok(Kind::File),
        Ok(m) if m.is_dir() => Ok(Kind::Dir),
        Ok(_) => Ok(Kind::Special),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Kind::Absent),
        // a path component is a regular file
        Err(e) if e.kind() == ErrorKind::NotADirectory => Ok(Kind::Absent),
        Err(e) => Err(e.into()),
    }
}

/// Where a write to `real` actually lands: an existing target (a confined symlink
/// included) resolves to its canonical file, an absent one to its canonical parent.
fn write_target(real: &Path) -> PathBuf {
    if let Ok(canonical) = real.canonicalize() {
        return canonical;
    }
    match (real.parent().and_then(|p| p.canonicalize().ok()), real.file_name()) {
        (Some(parent), Some(name)) => parent.join(name),
        _ => real.to_path_buf(),
    }
}

fn base_name(virtual_path: &str) -> String {
    virtual_path.rsplit('/').next().unwrap_or("").to_string()
}

fn sha_mismatch() -> AppError {
    AppError::conflict("sha_mismatch", "file sha not match")
}

/// The CRUD surface over one confined root.
#[derive(Debug)]
pub struct FileStore {
    resolver: PathResolver,
    locks: PathLocks,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> AppResult<Self> {
        Ok(Self { resolver: PathResolver::new(root)?, locks: PathLocks::new() })
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    fn locate(&self, virtual_path: &str) -> AppResult<(PathBuf, String)> {
        let real = self.resolver.resolve(virtual_path)?;
        let vpath = self.resolver.unresolve(&real)?;
        Ok((real, vpath))
    }

    /// Read a file (with content and fingerprint) or list a directory.
    pub fn get(&self, virtual_path: &str) -> AppResult<FsEntry> {
        let (real, vpath) = self.locate(virtual_path)?;
        match classify(&real)? {
            Kind::File => {
                let bytes = fs::read(&real)?;
                let entry = FileEntry {
                    name: base_name(&vpath),
                    path: vpath.clone(),
                    size: bytes.len() as u64,
                    sha: digest_bytes(&bytes),
                    content: Some(String::from_utf8_lossy(&bytes).into_owned()),
                };
                debug!(target: "contents", path = %vpath, size = entry.size, sha = %entry.sha, "get file");
                Ok(FsEntry::File(entry))
            }
            Kind::Dir => {
                let entries = list_dir(&self.resolver, &real)?;
                debug!(target: "contents", path = %vpath, entries = entries.len(), "get dir");
                Ok(FsEntry::Directory(entries))
            }
            Kind::Special | Kind::Absent => Err(AppError::not_found("not_found", "file not exists")),
        }
    }

    /// Create `virtual_path` unconditionally, or overwrite it when `expected`
    /// matches the current fingerprint.
    pub fn put(&self, virtual_path: &str, content: &str, expected: Option<&str>) -> AppResult<WriteOutcome> {
        let (real, vpath) = self.locate(virtual_path)?;
        if vpath.is_empty() {
            return Err(AppError::invalid_path("is_directory", "cannot write to the root directory"));
        }
        let bytes = content.as_bytes();
        // aliases share the lock and the bytes of the file they point at
        let target = write_target(&real);

        let status = self.locks.with_path(&target, || -> AppResult<WriteStatus> {
            match classify(&target)? {
                Kind::Dir => Err(AppError::invalid_path("is_directory", format!("{} is a directory", vpath))),
                Kind::Special => Err(AppError::invalid_path("not_a_file", format!("{} is not a regular file", vpath))),
                Kind::File => {
                    let current = digest_file(&target)?;
                    if !current.matches(expected) {
                        info!(target: "contents", path = %vpath, current = %current, "update rejected: sha mismatch");
                        return Err(sha_mismatch());
                    }
                    write_atomic(&target, bytes)?;
                    Ok(WriteStatus::Updated)
                }
                Kind::Absent => {
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent).map_err(|e| match e.kind() {
                            ErrorKind::AlreadyExists | ErrorKind::NotADirectory => AppError::invalid_path(
                                "not_a_directory",
                                format!("a parent of {} is not a directory", vpath),
                            ),
                            _ => AppError::from(e),
                        })?;
                    }
                    write_atomic(&target, bytes)?;
                    Ok(WriteStatus::Created)
                }
            }
        })?;

        let entry = FileEntry {
            name: base_name(&vpath),
            path: vpath.clone(),
            size: bytes.len() as u64,
            content: None,
            sha: digest_bytes(bytes),
        };
        crate::tprintln!("CONTENTS put ok path={} status={:?} size={} sha={}", vpath, status, entry.size, entry.sha);
        debug!(target: "contents", path = %vpath, ?status, sha = %entry.sha, "put");
        Ok(WriteOutcome { status, entry })
    }

    /// Remove `virtual_path` when `expected` matches its current fingerprint.
    pub fn delete(&self, virtual_path: &str, expected: Option<&str>) -> AppResult<Fingerprint> {
        let (real, vpath) = self.locate(virtual_path)?;
        let removed = self.locks.with_path(&write_target(&real), || -> AppResult<Fingerprint> {
            if classify(&real)? != Kind::File {
                return Err(AppError::not_found("not_found", "file not exists"));
            }
            let current = digest_file(&real)?;
            if !current.matches(expected) {
                info!(target: "contents", path = %vpath, current = %current, "delete rejected: sha mismatch");
                return Err(sha_mismatch());
            }
            fs::remove_file(&real)?;
            Ok(current)
        })?;
        crate::tprintln!("CONTENTS delete ok path={} sha={}", vpath, removed);
        debug!(target: "contents", path = %vpath, sha = %removed, "delete");
        Ok(removed)
    }
}

/// Write to a temporary sibling and rename it over `target`, so readers see either
/// the old or the new content. An existing file's permissions carry over.
fn write_atomic(target: &Path, bytes: &[u8]) -> AppResult<()> {
    let dir = target.parent().ok_or_else(|| AppError::invalid_path("invalid_path", "target has no parent"))?;
    let name = target.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let tmp = dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));

    let result = (|| -> std::io::Result<()> {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        if let Ok(existing) = fs::metadata(target) {
            fs::set_permissions(&tmp, existing.permissions())?;
        }
        fs::rename(&tmp, target)
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(AppError::internal("write_failed", format!("writing {}: {}", target.display(), e)));
    }
    Ok(())
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod ops_tests;
