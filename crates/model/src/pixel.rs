use serde::{Deserialize, Serialize};

use crate::{TileRegion, TileSize};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

impl PixelPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Arbitrary (possibly sub-pixel) rectangle in surface pixel space.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn max_x(self) -> f32 {
        self.x + self.width
    }

    pub fn max_y(self) -> f32 {
        self.y + self.height
    }
}

impl From<TileRegion> for PixelRect {
    fn from(region: TileRegion) -> Self {
        Self::new(
            region.x as f32,
            region.y as f32,
            region.width() as f32,
            region.height() as f32,
        )
    }
}

/// Whole-pixel rectangle; `width`/`height` count pixels, so a single pixel has
/// extent 1x1.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Tight inclusive bounds of two corner pixels.
    pub fn from_corners(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        assert!(
            min_x <= max_x && min_y <= max_y,
            "pixel region corners are inverted"
        );
        Self::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }

    pub fn rect(self) -> PixelRect {
        PixelRect::new(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }

    /// Converts to tile indices, growing outward so every pixel of `self` lies
    /// in a returned tile.
    pub fn to_tile_grid_outward(self, tile_size: TileSize) -> TileGridRegion {
        assert!(
            self.width > 0 && self.height > 0,
            "cannot convert an empty pixel region to tiles"
        );
        let first_x = self.x / tile_size.width;
        let first_y = self.y / tile_size.height;
        let last_x = (self.x + self.width - 1) / tile_size.width;
        let last_y = (self.y + self.height - 1) / tile_size.height;
        TileGridRegion::new(first_x, first_y, last_x - first_x + 1, last_y - first_y + 1)
    }
}

/// Rectangle measured in tile indices rather than pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileGridRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileGridRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn cells(self) -> impl Iterator<Item = (u32, u32)> {
        (self.y..self.y + self.height)
            .flat_map(move |tile_y| (self.x..self.x + self.width).map(move |tile_x| (tile_x, tile_y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_corners_is_inclusive() {
        assert_eq!(
            PixelRegion::from_corners(10, 5, 40, 50),
            PixelRegion::new(10, 5, 31, 46)
        );
        assert_eq!(
            PixelRegion::from_corners(3, 3, 3, 3),
            PixelRegion::new(3, 3, 1, 1)
        );
    }

    #[test]
    fn outward_conversion_includes_partially_touched_tiles() {
        let tile_size = TileSize::new(10, 5);
        assert_eq!(
            PixelRegion::new(0, 0, 2, 2).to_tile_grid_outward(tile_size),
            TileGridRegion::new(0, 0, 1, 1)
        );
        assert_eq!(
            PixelRegion::new(10, 5, 1, 1).to_tile_grid_outward(tile_size),
            TileGridRegion::new(1, 1, 1, 1)
        );
        assert_eq!(
            PixelRegion::from_corners(10, 5, 40, 50).to_tile_grid_outward(tile_size),
            TileGridRegion::new(1, 1, 4, 10)
        );
    }

    #[test]
    fn grid_cells_iterate_row_major() {
        let cells = TileGridRegion::new(1, 2, 2, 2).cells().collect::<Vec<_>>();
        assert_eq!(cells, vec![(1, 2), (2, 2), (1, 3), (2, 3)]);
    }
}
