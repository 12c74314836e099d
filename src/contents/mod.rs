//! Virtual filesystem contents API: path confinement, content fingerprints, listings
//! and the fingerprint-guarded CRUD surface.

pub mod paths;
pub mod digest;
pub mod listing;
pub mod locks;
pub mod types;
pub mod ops;

pub use paths::{PathResolver, normalize_segments, normalize_virtual};
pub use digest::{Fingerprint, digest_bytes, digest_file, digest_reader, CHUNK_SIZE};
pub use listing::list_dir;
pub use locks::PathLocks;
pub use types::{FileEntry, DirEntry, Entry, FsEntry, WriteStatus, WriteOutcome, PutRequest, DeleteRequest};
pub use ops::FileStore;
