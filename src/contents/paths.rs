use path_absolutize::Absolutize;
use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Maps client-facing virtual paths to real locations beneath a fixed root, and back.
///
/// Resolution is lexical first: separators are normalized, `.` and empty segments
/// dropped and `..` collapsed against the preceding segment. A `..` with nothing
/// left to collapse is an escape and is rejected before the filesystem is touched.
/// The deepest existing ancestor of the result is then canonicalized so a symlink
/// inside the tree cannot lead outside of it.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver confined to `root`. The root is absolutized and, when it
    /// exists, canonicalized (e.g. macOS `/tmp` -> `/private/tmp`).
    pub fn new(root: impl AsRef<Path>) -> AppResult<Self> {
        let abs = root
            .as_ref()
            .absolutize()
            .map_err(|e| AppError::internal("invalid_root", format!("cannot absolutize root {}: {}", root.as_ref().display(), e)))?
            .to_path_buf();
        let root = abs.canonicalize().unwrap_or(abs);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a virtual path to a real path under the root.
    pub fn resolve(&self, virtual_path: &str) -> AppResult<PathBuf> {
        let segments = normalize_segments(virtual_path)?;
        let mut real = self.root.clone();
        for seg in &segments {
            real.push(seg);
        }
        self.ensure_confined(&real)?;
        Ok(real)
    }

    /// Map a real path under the root back to its normalized virtual form.
    /// The root itself maps to the empty string.
    pub fn unresolve(&self, real: &Path) -> AppResult<String> {
        let rel = real.strip_prefix(&self.root).map_err(|_| {
            AppError::invalid_path("invalid_path", format!("{} is not under {}", real.display(), self.root.display()))
        })?;
        let mut parts = Vec::new();
        for comp in rel.components() {
            match comp {
                Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
                _ => return Err(AppError::invalid_path("invalid_path", format!("unexpected component in {}", real.display()))),
            }
        }
        Ok(parts.join("/"))
    }

    /// Verify the deepest existing ancestor of `real` canonicalizes inside the root.
    pub(crate) fn ensure_confined(&self, real: &Path) -> AppResult<()> {
        let mut probe = Some(real);
        while let Some(p) = probe {
            if !p.starts_with(&self.root) {
                break;
            }
            if let Ok(canonical) = p.canonicalize() {
                if canonical.starts_with(&self.root) {
                    return Ok(());
                }
                return Err(AppError::invalid_path(
                    "path_escapes_root",
                    format!("{} resolves outside of {}", real.display(), self.root.display()),
                ));
            }
            probe = p.parent();
        }
        Ok(())
    }
}

/// Split a virtual path into plain file-name segments with relative segments collapsed.
pub fn normalize_segments(virtual_path: &str) -> AppResult<Vec<String>> {
    if virtual_path.contains('\u{0000}') {
        return Err(AppError::invalid_path("invalid_path", "path cannot contain NUL characters"));
    }
    let mut out: Vec<String> = Vec::new();
    for seg in virtual_path.split(|c| c == '/' || c == '\\') {
        match seg {
            "" | "." => continue,
            ".." => {
                if out.pop().is_none() {
                    return Err(AppError::invalid_path("path_escapes_root", format!("{} escapes the root", virtual_path)));
                }
            }
            s => {
                // Drive prefixes and similar must not survive as a segment
                let mut comps = Path::new(s).components();
                match (comps.next(), comps.next()) {
                    (Some(Component::Normal(_)), None) => out.push(s.to_string()),
                    _ => return Err(AppError::invalid_path("invalid_path", format!("invalid segment '{}'", s))),
                }
            }
        }
    }
    Ok(out)
}

/// Normalized virtual form of a client path ("" for the root).
pub fn normalize_virtual(virtual_path: &str) -> AppResult<String> {
    Ok(normalize_segments(virtual_path)?.join("/"))
}
