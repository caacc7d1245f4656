use std::collections::HashSet;

use model::{SurfaceDescriptor, TileRegion};

use crate::delegate::sorted_regions;
use crate::{Blob, BlobId, HostCommandSequence, HostTileStorage, TileDelegate, TileSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateCall {
    Allocate(Vec<TileRegion>),
    Free(Vec<TileRegion>),
    Load(TileRegion),
    Store(TileRegion, BlobId),
    Snapshot(Vec<TileRegion>),
}

/// Host tile storage that records every call it receives, regions sorted
/// row-major.
#[derive(Debug)]
pub struct RecordingDelegate {
    storage: HostTileStorage,
    calls: Vec<DelegateCall>,
    empty_regions: HashSet<TileRegion>,
}

impl RecordingDelegate {
    pub fn new(descriptor: &SurfaceDescriptor) -> Self {
        Self {
            storage: HostTileStorage::new(descriptor),
            calls: Vec::new(),
            empty_regions: HashSet::new(),
        }
    }

    pub fn calls(&self) -> &[DelegateCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<DelegateCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn storage(&self) -> &HostTileStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut HostTileStorage {
        &mut self.storage
    }

    /// Makes `load` report no committed content for `region`.
    pub fn report_empty(&mut self, region: TileRegion) {
        self.empty_regions.insert(region);
    }
}

impl TileDelegate for RecordingDelegate {
    type Commands = HostCommandSequence;

    fn allocate(&mut self, regions: &HashSet<TileRegion>, commands: &mut Self::Commands) {
        self.calls.push(DelegateCall::Allocate(sorted_regions(regions)));
        self.storage.allocate(regions, commands);
    }

    fn free(&mut self, regions: &HashSet<TileRegion>, commands: &mut Self::Commands) {
        self.calls.push(DelegateCall::Free(sorted_regions(regions)));
        self.storage.free(regions, commands);
    }

    fn load(&mut self, region: TileRegion) -> Option<Blob> {
        self.calls.push(DelegateCall::Load(region));
        if self.empty_regions.contains(&region) {
            return None;
        }
        self.storage.load(region)
    }

    fn store(&mut self, region: TileRegion, blob: &Blob) {
        self.calls.push(DelegateCall::Store(region, blob.id().clone()));
        self.storage.store(region, blob);
    }

    fn snapshot(&mut self, tiles: &TileSnapshot) {
        self.calls.push(DelegateCall::Snapshot(sorted_regions(tiles.keys())));
    }
}

/// Blob sized for `region`, every byte set to `value`.
pub fn filled_blob(descriptor: &SurfaceDescriptor, region: TileRegion, value: u8) -> Blob {
    Blob::new(vec![value; descriptor.region_byte_len(region)])
}
