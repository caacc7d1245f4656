use std::collections::HashSet;

use model::{PixelPoint, SurfaceDescriptor, TileGridRegion, TileRegion};
use tracing::{debug, trace};

use crate::{
    CommandSequence, CowSurface, LoadAction, RenderPassAttachments, SparseMappingTable,
    SurfaceAllocator, TileDelegate, TileInventoryMediator, TileSnapshot,
};

/// What `prepare_draw` had to do before the surface could be drawn into.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DrawPreparation {
    pub newly_allocated: HashSet<TileRegion>,
    /// The surface buffers were shared and got duplicated.
    pub duplicated: bool,
}

/// One drawable layer: surface handle, tile inventory and, for tiled
/// surfaces, the mapping table that decides which tiles still need backing.
#[derive(Debug)]
pub struct LayerStorage<B> {
    mediator: TileInventoryMediator,
    mapping: Option<SparseMappingTable>,
    surface: CowSurface<B>,
}

impl<B> LayerStorage<B> {
    pub fn new<A>(descriptor: SurfaceDescriptor, allocator: &mut A) -> Self
    where
        A: SurfaceAllocator<Buffer = B>,
    {
        Self::from_surface(CowSurface::new(descriptor, allocator))
    }

    /// Wraps an existing surface, e.g. a copy of another layer's surface.
    pub fn from_surface(surface: CowSurface<B>) -> Self {
        let descriptor = *surface.descriptor();
        Self {
            mediator: TileInventoryMediator::new(descriptor),
            mapping: descriptor
                .tile_size
                .map(|tile_size| SparseMappingTable::new(descriptor.size, tile_size)),
            surface,
        }
    }

    pub fn descriptor(&self) -> &SurfaceDescriptor {
        self.surface.descriptor()
    }

    pub fn mediator(&self) -> &TileInventoryMediator {
        &self.mediator
    }

    pub fn mapping(&self) -> Option<&SparseMappingTable> {
        self.mapping.as_ref()
    }

    pub fn surface(&self) -> &CowSurface<B> {
        &self.surface
    }

    pub fn initialize<D: TileDelegate>(&mut self, load_action: LoadAction, delegate: &mut D) {
        self.mediator.initialize(load_action, delegate);
        self.surface.set_load_action(load_action);
    }

    /// Makes the surface ready for a draw touching `points`: backs the
    /// unmapped tiles under them and detaches the surface from any alias.
    pub fn prepare_draw<C, D, A, I>(
        &mut self,
        points: I,
        delegate: &mut D,
        allocator: &mut A,
        commands: &mut C,
    ) -> DrawPreparation
    where
        C: CommandSequence,
        D: TileDelegate<Commands = C>,
        A: SurfaceAllocator<Buffer = B, Commands = C>,
        I: IntoIterator<Item = PixelPoint>,
    {
        let newly_allocated = match &mut self.mapping {
            Some(mapping) => match mapping.unbacked_covering_region(points) {
                Some(region) => {
                    let allocated =
                        self.mediator
                            .as_render_target(region.rect(), delegate, commands);
                    mapping.update_mapping_for_pixels(region);
                    allocated
                }
                None => {
                    trace!("draw touches only mapped tiles");
                    self.mediator.invalidate_snapshot();
                    HashSet::new()
                }
            },
            None => {
                let bounds = self.surface.descriptor().bounds();
                self.mediator.as_render_target(bounds.into(), delegate, commands)
            }
        };
        let duplicated = self.surface.make_writable(allocator, commands);
        DrawPreparation {
            newly_allocated,
            duplicated,
        }
    }

    pub fn begin_render_pass(&mut self) -> RenderPassAttachments<'_, B> {
        self.surface.begin_render_pass()
    }

    pub fn snapshot<D: TileDelegate>(&mut self, delegate: &mut D) -> TileSnapshot {
        self.mediator.take_snapshot(delegate)
    }

    /// Replaces the layer content with `tiles`. The mapping table is rebuilt
    /// so exactly the restored tiles count as mapped.
    pub fn restore<D: TileDelegate>(
        &mut self,
        tiles: TileSnapshot,
        delegate: &mut D,
        commands: &mut D::Commands,
    ) {
        let load_action = if tiles.is_empty() {
            LoadAction::Clear
        } else {
            LoadAction::Load
        };
        if let Some(mapping) = &mut self.mapping {
            let tile_size = mapping.tile_size();
            let mut rebuilt = SparseMappingTable::new(mapping.size(), tile_size);
            for region in tiles.keys() {
                rebuilt.update_mapping(TileGridRegion::new(
                    region.x / tile_size.width,
                    region.y / tile_size.height,
                    1,
                    1,
                ));
            }
            *mapping = rebuilt;
        }
        debug!(tiles = tiles.len(), ?load_action, "restoring layer");
        self.mediator.restore(tiles, delegate, commands);
        self.surface.set_load_action(load_action);
    }
}
