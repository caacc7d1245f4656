use std::collections::{HashMap, HashSet};

use model::TileRegion;

use crate::Blob;

/// Captured content of a surface: one blob per region.
pub type TileSnapshot = HashMap<TileRegion, Blob>;

/// An ordered sequence of fenced sections.
///
/// Each section starts only after the previous section signalled its fence and
/// signals the fence again when done, so effects happen in encode order no
/// matter which component encoded them.
pub trait CommandSequence {
    type Encoder;

    fn encode_section<R>(
        &mut self,
        label: &'static str,
        encode: impl FnOnce(&mut Self::Encoder) -> R,
    ) -> R;

    /// Blocks until every encoded section has finished executing.
    fn commit(self)
    where
        Self: Sized;
}

/// Backing-memory and content operations a tile mediator drives.
///
/// Calls are synchronous; failures are fatal inside the implementation.
pub trait TileDelegate {
    type Commands: CommandSequence;

    /// Makes every region readable and writable before the next section runs.
    fn allocate(&mut self, regions: &HashSet<TileRegion>, commands: &mut Self::Commands);

    /// Releases backing memory. Reading a freed region is undefined.
    fn free(&mut self, regions: &HashSet<TileRegion>, commands: &mut Self::Commands);

    /// Reads back the region, or `None` when it holds no committed content.
    fn load(&mut self, region: TileRegion) -> Option<Blob>;

    /// Writes `blob` into the region. The payload length must match the region.
    fn store(&mut self, region: TileRegion, blob: &Blob);

    /// Notification that `tiles` was captured; must not alter it.
    fn snapshot(&mut self, tiles: &TileSnapshot) {
        let _ = tiles;
    }
}

/// Regions in row-major order, so delegate call order is stable.
pub(crate) fn sorted_regions<'a>(regions: impl IntoIterator<Item = &'a TileRegion>) -> Vec<TileRegion> {
    let mut regions = regions.into_iter().copied().collect::<Vec<_>>();
    regions.sort_by_key(|region| (region.y, region.x, region.size.height, region.size.width));
    regions
}
