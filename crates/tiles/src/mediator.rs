use std::collections::HashSet;

use model::{PixelRect, SurfaceDescriptor, TileRegion};
use tracing::{debug, trace};

use crate::delegate::sorted_regions;
use crate::{TileDelegate, TileSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadAction {
    Clear,
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediatorState {
    Uninitialized,
    Initialized,
    Rendering,
    Snapshotting,
    Restoring,
}

/// Owns the authoritative set of allocated regions of one surface and drives
/// allocate/free/load/store through a [`TileDelegate`].
///
/// The delegate is borrowed per call; the mediator never owns it.
#[derive(Debug)]
pub struct TileInventoryMediator {
    descriptor: SurfaceDescriptor,
    allocated_regions: HashSet<TileRegion>,
    last_snapshot: Option<TileSnapshot>,
    state: MediatorState,
}

impl TileInventoryMediator {
    pub fn new(descriptor: SurfaceDescriptor) -> Self {
        if let Some(tile_size) = descriptor.tile_size {
            assert!(
                tile_size.width > 0 && tile_size.height > 0,
                "tile size must be positive"
            );
        }
        Self {
            descriptor,
            allocated_regions: HashSet::new(),
            last_snapshot: None,
            state: MediatorState::Uninitialized,
        }
    }

    pub fn descriptor(&self) -> &SurfaceDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> MediatorState {
        self.state
    }

    pub fn allocated_regions(&self) -> &HashSet<TileRegion> {
        &self.allocated_regions
    }

    pub fn cached_snapshot(&self) -> Option<&TileSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Hydrates a dense surface from existing content. Tiled surfaces page in
    /// on first touch instead.
    pub fn initialize<D: TileDelegate>(&mut self, load_action: LoadAction, delegate: &mut D) {
        self.state = MediatorState::Initialized;
        if load_action != LoadAction::Load || self.descriptor.is_tiled() {
            return;
        }

        let region = self.descriptor.bounds();
        if let Some(blob) = delegate.load(region) {
            let snapshot = TileSnapshot::from([(region, blob)]);
            delegate.snapshot(&snapshot);
            self.last_snapshot = Some(snapshot);
            debug!(?region, "dense surface hydrated from existing content");
        }
    }

    /// Drops the memoized snapshot; the surface content is about to change.
    pub fn invalidate_snapshot(&mut self) {
        self.last_snapshot = None;
    }

    /// Prepares `rect` for drawing and returns the regions newly allocated for
    /// it. Never frees.
    pub fn as_render_target<D: TileDelegate>(
        &mut self,
        rect: PixelRect,
        delegate: &mut D,
        commands: &mut D::Commands,
    ) -> HashSet<TileRegion> {
        self.invalidate_snapshot();
        self.state = MediatorState::Rendering;

        let Some(tile_size) = self.descriptor.tile_size else {
            return HashSet::new();
        };

        let new_regions = TileRegion::cover(rect, self.descriptor.size, tile_size)
            .difference(&self.allocated_regions)
            .copied()
            .collect::<HashSet<_>>();
        if new_regions.is_empty() {
            trace!(?rect, "render target already backed");
            return new_regions;
        }

        debug!(count = new_regions.len(), ?rect, "allocating tiles for render target");
        delegate.allocate(&new_regions, commands);
        self.allocated_regions.extend(new_regions.iter().copied());
        new_regions
    }

    /// Captures current content, reusing the last capture when nothing has
    /// rendered since.
    pub fn take_snapshot<D: TileDelegate>(&mut self, delegate: &mut D) -> TileSnapshot {
        self.state = MediatorState::Snapshotting;
        if let Some(snapshot) = &self.last_snapshot {
            trace!(tiles = snapshot.len(), "reusing memoized snapshot");
            return snapshot.clone();
        }

        let regions = if self.descriptor.is_tiled() {
            sorted_regions(&self.allocated_regions)
        } else {
            vec![self.descriptor.bounds()]
        };
        let mut snapshot = TileSnapshot::with_capacity(regions.len());
        for region in regions {
            match delegate.load(region) {
                Some(blob) => {
                    snapshot.insert(region, blob);
                }
                None => trace!(?region, "region has no committed content"),
            }
        }

        debug!(tiles = snapshot.len(), "captured surface snapshot");
        delegate.snapshot(&snapshot);
        self.last_snapshot = Some(snapshot.clone());
        snapshot
    }

    /// Makes the surface hold exactly `tiles`: frees regions not in it,
    /// allocates the missing ones, then stores every blob.
    pub fn restore<D: TileDelegate>(
        &mut self,
        tiles: TileSnapshot,
        delegate: &mut D,
        commands: &mut D::Commands,
    ) {
        self.state = MediatorState::Restoring;
        let bounds = self.descriptor.bounds();
        for region in tiles.keys() {
            assert!(
                bounds.contains_region(*region),
                "restored region {region:?} lies outside surface {bounds:?}"
            );
        }

        if self.descriptor.is_tiled() {
            let target = tiles.keys().copied().collect::<HashSet<_>>();
            let freed = self
                .allocated_regions
                .difference(&target)
                .copied()
                .collect::<HashSet<_>>();
            let added = target
                .difference(&self.allocated_regions)
                .copied()
                .collect::<HashSet<_>>();
            debug!(
                freed = freed.len(),
                added = added.len(),
                kept = target.len() - added.len(),
                "restoring tiled surface"
            );

            if !freed.is_empty() {
                delegate.free(&freed, commands);
            }
            if !added.is_empty() {
                delegate.allocate(&added, commands);
            }
            self.allocated_regions = target;
        }

        for region in sorted_regions(tiles.keys()) {
            delegate.store(region, &tiles[&region]);
        }
        self.last_snapshot = Some(tiles);
    }
}
