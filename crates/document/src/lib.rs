//! Persistence and history for tile snapshots.

mod archive;
mod blob_store;
mod history;

pub use archive::{ArchiveError, ArchivedBlob, ArchivedTile, SurfaceArchive};
pub use blob_store::{BlobLoader, BlobStore, BlobStoreError, DirectoryBlobStore, MemoryBlobStore};
pub use history::SnapshotHistory;
