//! Content fingerprints used as optimistic-concurrency tokens.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use crate::error::{AppError, AppResult};

/// Read size for streaming a file through the hasher.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Lowercase hex SHA-256 of a file's full byte content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a client-supplied expected fingerprint.
    /// A missing expectation never matches.
    pub fn matches(&self, expected: Option<&str>) -> bool {
        match expected {
            Some(e) => e.trim().eq_ignore_ascii_case(&self.0),
            None => false,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn digest_bytes(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint(format!("{:x}", hasher.finalize()))
}

/// Feed a reader through the hasher `chunk_size` bytes at a time.
pub fn digest_reader<R: Read>(mut reader: R, chunk_size: usize) -> io::Result<Fingerprint> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(Fingerprint(format!("{:x}", hasher.finalize())))
}

/// Fingerprint of the regular file at `path`.
pub fn digest_file(path: &Path) -> AppResult<Fingerprint> {
    let meta = fs::metadata(path)?;
    if !meta.is_file() {
        return Err(AppError::not_found("not_found", format!("{} is not a file", path.display())));
    }
    let f = File::open(path)?;
    Ok(digest_reader(f, CHUNK_SIZE)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn known_vector() {
        assert_eq!(
            digest_bytes(b"abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest_bytes(b"").as_str().len(), 64);
    }

    #[test]
    fn chunk_size_does_not_change_digest() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let whole = digest_bytes(&data);
        for chunk in [1usize, 7, 4096, CHUNK_SIZE, 1 << 20] {
            assert_eq!(digest_reader(&data[..], chunk).unwrap(), whole, "chunk {chunk}");
        }
    }

    #[test]
    fn distinct_content_distinct_fingerprint() {
        assert_ne!(digest_bytes(b"hi"), digest_bytes(b"bye"));
        assert_eq!(digest_bytes(b"hi"), digest_bytes(b"hi"));
    }

    #[test]
    fn file_digest_matches_bytes_and_rejects_dirs() {
        let tmp = tempdir().unwrap();
        let p = tmp.path().join("a.txt");
        std::fs::write(&p, "hi").unwrap();
        assert_eq!(digest_file(&p).unwrap(), digest_bytes(b"hi"));
        assert!(digest_file(tmp.path()).unwrap_err().is_not_found());
        assert!(digest_file(&tmp.path().join("missing")).unwrap_err().is_not_found());
    }

    #[test]
    fn missing_expectation_fails_closed() {
        let f = digest_bytes(b"hi");
        assert!(!f.matches(None));
        assert!(!f.matches(Some("")));
        assert!(f.matches(Some(f.as_str())));
        assert!(f.matches(Some(&f.as_str().to_uppercase())));
    }
}
