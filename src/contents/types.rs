//! Wire-facing data contracts for the contents API.
//! Keep this module purely about types/serde and light helpers.

use serde::{Deserialize, Serialize};

use super::digest::Fingerprint;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
    /// Decoded text; only populated on a single-file read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub sha: Fingerprint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
}

/// One child of a directory listing, tagged `"file"` or `"dir"` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entry {
    File(FileEntry),
    Dir(DirEntry),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::File(f) => &f.name,
            Entry::Dir(d) => &d.name,
        }
    }
}

/// Result of a read: classified once, then carried as a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEntry {
    File(FileEntry),
    Directory(Vec<Entry>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStatus {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub status: WriteStatus,
    pub entry: FileEntry,
}

/// PUT body: new content plus the fingerprint the client last saw.
#[derive(Debug, Clone, Deserialize)]
pub struct PutRequest {
    pub content: String,
    #[serde(default)]
    pub sha: Option<String>,
}

/// DELETE body; an absent body deserializes to the default (no fingerprint).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub sha: Option<String>,
}
