use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{PixelRect, SurfaceSize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileSize {
    pub width: u32,
    pub height: u32,
}

impl TileSize {
    pub const fn new(width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0, "tile size must be positive");
        Self { width, height }
    }

    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Axis-aligned pixel rectangle produced by tiling. Either a full tile or a
/// tile clipped at the right/bottom edge of its surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRegion {
    pub x: u32,
    pub y: u32,
    pub size: TileSize,
}

impl TileRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            size: TileSize { width, height },
        }
    }

    /// The single implicit region of a dense surface.
    pub const fn whole(size: SurfaceSize) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub const fn width(self) -> u32 {
        self.size.width
    }

    pub const fn height(self) -> u32 {
        self.size.height
    }

    /// Exclusive right edge.
    pub const fn max_x(self) -> u32 {
        self.x + self.size.width
    }

    /// Exclusive bottom edge.
    pub const fn max_y(self) -> u32 {
        self.y + self.size.height
    }

    pub const fn area(self) -> u64 {
        self.size.area()
    }

    pub fn is_empty(self) -> bool {
        self.size.width == 0 || self.size.height == 0
    }

    pub fn contains_region(self, other: TileRegion) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }

    pub fn intersects(self, other: TileRegion) -> bool {
        self.x < other.max_x()
            && other.x < self.max_x()
            && self.y < other.max_y()
            && other.y < self.max_y()
    }

    pub fn byte_len(self, bytes_per_pixel: usize) -> usize {
        (self.size.width as usize)
            .checked_mul(self.size.height as usize)
            .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
            .expect("tile region byte length overflow")
    }

    /// Splits this region into sub-regions of at most `tile_size`, stepping from
    /// the region origin. The last column and row are clipped to the remaining
    /// extent.
    pub fn tiles(self, tile_size: TileSize) -> HashSet<TileRegion> {
        assert!(
            tile_size.width > 0 && tile_size.height > 0,
            "tile size must be positive"
        );
        let mut tiles = HashSet::new();
        for tile_y in (self.y..self.max_y()).step_by(tile_size.height as usize) {
            for tile_x in (self.x..self.max_x()).step_by(tile_size.width as usize) {
                tiles.insert(TileRegion::new(
                    tile_x,
                    tile_y,
                    tile_size.width.min(self.max_x() - tile_x),
                    tile_size.height.min(self.max_y() - tile_y),
                ));
            }
        }
        tiles
    }

    /// Returns the tile-aligned regions of a `bounds`-sized surface whose union
    /// contains `rect`.
    pub fn cover(rect: PixelRect, bounds: SurfaceSize, tile_size: TileSize) -> HashSet<TileRegion> {
        assert!(
            rect.x >= 0.0 && rect.y >= 0.0 && rect.width >= 0.0 && rect.height >= 0.0,
            "cover rect must be non-negative, got {rect:?}"
        );
        assert!(
            rect.x <= bounds.width as f32 && rect.y <= bounds.height as f32,
            "cover rect {rect:?} starts outside surface {}x{}",
            bounds.width,
            bounds.height
        );
        assert!(
            tile_size.width > 0 && tile_size.height > 0,
            "tile size must be positive"
        );

        let tile_width = tile_size.width as f32;
        let tile_height = tile_size.height as f32;
        let min_x = (rect.x / tile_width).floor() as u32 * tile_size.width;
        let min_y = (rect.y / tile_height).floor() as u32 * tile_size.height;
        let max_x = ((rect.max_x() / tile_width).ceil() as u32)
            .saturating_mul(tile_size.width)
            .min(bounds.width);
        let max_y = ((rect.max_y() / tile_height).ceil() as u32)
            .saturating_mul(tile_size.height)
            .min(bounds.height);
        if max_x <= min_x || max_y <= min_y {
            return HashSet::new();
        }

        TileRegion::new(min_x, min_y, max_x - min_x, max_y - min_y).tiles(tile_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_area(tiles: &HashSet<TileRegion>) -> u64 {
        tiles.iter().map(|tile| tile.area()).sum()
    }

    fn assert_disjoint(tiles: &HashSet<TileRegion>) {
        let tiles = tiles.iter().copied().collect::<Vec<_>>();
        for (index, a) in tiles.iter().enumerate() {
            for b in &tiles[index + 1..] {
                assert!(!a.intersects(*b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn tiles_clips_last_row_and_column() {
        let tile_size = TileSize::new(5, 5);
        let tiles = TileRegion::new(0, 0, 12, 12).tiles(tile_size);
        let expected = HashSet::from([
            TileRegion::new(0, 0, 5, 5),
            TileRegion::new(5, 0, 5, 5),
            TileRegion::new(10, 0, 2, 5),
            TileRegion::new(0, 5, 5, 5),
            TileRegion::new(5, 5, 5, 5),
            TileRegion::new(10, 5, 2, 5),
            TileRegion::new(0, 10, 5, 2),
            TileRegion::new(5, 10, 5, 2),
            TileRegion::new(10, 10, 2, 2),
        ]);
        assert_eq!(tiles, expected);
    }

    #[test]
    fn tiles_steps_each_axis_by_its_own_extent() {
        let tiles = TileRegion::new(0, 0, 8, 6).tiles(TileSize::new(4, 3));
        assert_eq!(
            tiles,
            HashSet::from([
                TileRegion::new(0, 0, 4, 3),
                TileRegion::new(4, 0, 4, 3),
                TileRegion::new(0, 3, 4, 3),
                TileRegion::new(4, 3, 4, 3),
            ])
        );
    }

    #[test]
    fn tiles_of_offset_region_start_at_its_origin() {
        let tiles = TileRegion::new(7, 3, 4, 4).tiles(TileSize::new(3, 3));
        assert!(tiles.contains(&TileRegion::new(7, 3, 3, 3)));
        assert!(tiles.contains(&TileRegion::new(10, 6, 1, 1)));
        assert_eq!(total_area(&tiles), 16);
        assert_disjoint(&tiles);
    }

    #[test]
    fn cover_single_tile() {
        let tile_size = TileSize::new(5, 5);
        let tiles = TileRegion::cover(
            PixelRect::new(1.0, 2.0, 3.0, 3.0),
            SurfaceSize::new(8, 8),
            tile_size,
        );
        assert_eq!(tiles, HashSet::from([TileRegion::new(0, 0, 5, 5)]));
    }

    #[test]
    fn cover_clips_to_surface_bounds() {
        let tiles = TileRegion::cover(
            PixelRect::new(0.0, 0.0, 6.0, 6.0),
            SurfaceSize::new(8, 8),
            TileSize::new(5, 5),
        );
        assert_eq!(
            tiles,
            HashSet::from([
                TileRegion::new(0, 0, 5, 5),
                TileRegion::new(5, 0, 3, 5),
                TileRegion::new(0, 5, 5, 3),
                TileRegion::new(5, 5, 3, 3),
            ])
        );
    }

    #[test]
    fn cover_accounts_for_rect_offset() {
        // 3..7 crosses the boundary at 5 even though the width alone fits one tile.
        let tiles = TileRegion::cover(
            PixelRect::new(3.0, 0.0, 4.0, 1.0),
            SurfaceSize::new(20, 20),
            TileSize::new(5, 5),
        );
        assert_eq!(
            tiles,
            HashSet::from([TileRegion::new(0, 0, 5, 5), TileRegion::new(5, 0, 5, 5)])
        );
    }

    #[test]
    fn cover_area_matches_aligned_bounding_area() {
        let bounds = SurfaceSize::new(97, 61);
        for tile_size in [TileSize::new(8, 8), TileSize::new(16, 5), TileSize::new(40, 40)] {
            for rect in [
                PixelRect::new(0.0, 0.0, 97.0, 61.0),
                PixelRect::new(13.5, 7.25, 30.0, 12.0),
                PixelRect::new(90.0, 60.0, 7.0, 1.0),
                PixelRect::new(31.0, 0.0, 1.0, 1.0),
            ] {
                let tiles = TileRegion::cover(rect, bounds, tile_size);
                let min_x = (rect.x as u32 / tile_size.width) * tile_size.width;
                let min_y = (rect.y as u32 / tile_size.height) * tile_size.height;
                let max_x = ((rect.max_x() / tile_size.width as f32).ceil() as u32
                    * tile_size.width)
                    .min(bounds.width);
                let max_y = ((rect.max_y() / tile_size.height as f32).ceil() as u32
                    * tile_size.height)
                    .min(bounds.height);
                let aligned = TileRegion::new(min_x, min_y, max_x - min_x, max_y - min_y);

                assert_eq!(total_area(&tiles), aligned.area(), "{rect:?} {tile_size:?}");
                assert_disjoint(&tiles);
                for tile in &tiles {
                    assert!(aligned.contains_region(*tile));
                    assert!(tile.width() <= tile_size.width);
                    assert!(tile.height() <= tile_size.height);
                }
            }
        }
    }

    #[test]
    fn cover_of_empty_rect_on_boundary_is_empty() {
        let tiles = TileRegion::cover(
            PixelRect::new(5.0, 5.0, 0.0, 0.0),
            SurfaceSize::new(10, 10),
            TileSize::new(5, 5),
        );
        assert!(tiles.is_empty());
    }

    #[test]
    #[should_panic(expected = "starts outside surface")]
    fn cover_panics_when_rect_starts_outside_surface() {
        let _ = TileRegion::cover(
            PixelRect::new(11.0, 0.0, 1.0, 1.0),
            SurfaceSize::new(10, 10),
            TileSize::new(5, 5),
        );
    }

    #[test]
    fn byte_len_uses_clipped_size() {
        assert_eq!(TileRegion::new(10, 10, 2, 3).byte_len(4), 24);
    }
}
