//! Tiled, sparse, copy-on-write pixel surface storage.
//!
//! A surface is either dense (one implicit region covering the whole surface)
//! or tiled, in which case backing memory is allocated tile by tile the first
//! time a draw touches it. [`TileInventoryMediator`] owns the set of allocated
//! regions and drives a [`TileDelegate`]; [`CowSurface`] defers buffer
//! duplication until the first write through a shared handle; [`LayerStorage`]
//! ties both to a [`SparseMappingTable`].

mod blob;
mod config;
mod delegate;
mod host;
mod layer;
mod mapping;
mod mediator;
mod surface;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use blob::{Blob, BlobError, BlobId};
pub use config::{DEFAULT_HISTORY_LIMIT, DEFAULT_TILE_SIZE, StorageConfig, StorageConfigError};
pub use delegate::{CommandSequence, TileDelegate, TileSnapshot};
pub use host::{HostBuffer, HostCommandSequence, HostSection, HostSurfaceAllocator, HostTileStorage};
pub use layer::{DrawPreparation, LayerStorage};
pub use mapping::SparseMappingTable;
pub use mediator::{LoadAction, MediatorState, TileInventoryMediator};
pub use surface::{CowSurface, RenderPassAttachments, SurfaceAllocator, SurfaceContent};
