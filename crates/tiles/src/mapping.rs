use bitvec::prelude::{BitVec, Lsb0};
use model::{PixelPoint, PixelRegion, SurfaceSize, TileGridRegion, TileSize};

/// Mapped/unmapped state of every tile cell of one sparse surface.
///
/// Cells only ever go from unmapped to mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseMappingTable {
    size: SurfaceSize,
    tile_size: TileSize,
    tiles_per_row: u32,
    tiles_per_column: u32,
    mapped: BitVec<usize, Lsb0>,
    mapped_count: usize,
}

impl SparseMappingTable {
    pub fn new(size: SurfaceSize, tile_size: TileSize) -> Self {
        assert!(
            tile_size.width > 0 && tile_size.height > 0,
            "tile size must be positive"
        );
        let tiles_per_row = size.width.div_ceil(tile_size.width);
        let tiles_per_column = size.height.div_ceil(tile_size.height);
        let tile_count = (tiles_per_row as usize)
            .checked_mul(tiles_per_column as usize)
            .expect("sparse mapping tile count overflow");
        Self {
            size,
            tile_size,
            tiles_per_row,
            tiles_per_column,
            mapped: BitVec::repeat(false, tile_count),
            mapped_count: 0,
        }
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn tile_size(&self) -> TileSize {
        self.tile_size
    }

    pub fn tiles_per_row(&self) -> u32 {
        self.tiles_per_row
    }

    pub fn tiles_per_column(&self) -> u32 {
        self.tiles_per_column
    }

    pub fn mapped_count(&self) -> usize {
        self.mapped_count
    }

    pub fn is_fully_mapped(&self) -> bool {
        self.mapped_count == self.mapped.len()
    }

    pub fn is_mapped(&self, tile_x: u32, tile_y: u32) -> bool {
        self.mapped[self.cell_index(tile_x, tile_y)]
    }

    /// Tile cell that owns `point`. A coordinate lying exactly on a tile's upper
    /// boundary belongs to that tile rather than the next one.
    pub fn cell_of(&self, point: PixelPoint) -> (u32, u32) {
        self.assert_inside(point);
        let cell = |coordinate: f32, extent: u32, cells: u32| {
            let index = ((coordinate / extent as f32).ceil() as u32).max(1) - 1;
            index.min(cells.saturating_sub(1))
        };
        (
            cell(point.x, self.tile_size.width, self.tiles_per_row),
            cell(point.y, self.tile_size.height, self.tiles_per_column),
        )
    }

    /// Tile cell holding the pixel under `point`, i.e. the tile a renderer
    /// writes when it rasterizes there.
    pub fn pixel_cell_of(&self, point: PixelPoint) -> (u32, u32) {
        let (x, y) = self.pixel_of(point);
        (x / self.tile_size.width, y / self.tile_size.height)
    }

    /// Tight pixel bounds over the points whose cell is still unmapped, or
    /// `None` when every point lands on mapped cells.
    pub fn unmapped_covering_region<I>(&self, points: I) -> Option<PixelRegion>
    where
        I: IntoIterator<Item = PixelPoint>,
    {
        self.covering_region(points, |point| {
            let (tile_x, tile_y) = self.cell_of(point);
            !self.is_mapped(tile_x, tile_y)
        })
    }

    /// Like `unmapped_covering_region`, but a point also counts when the tile
    /// holding its pixel is unmapped. Points on a tile's upper boundary touch
    /// the next tile's first pixel row or column, which must be backed too.
    pub fn unbacked_covering_region<I>(&self, points: I) -> Option<PixelRegion>
    where
        I: IntoIterator<Item = PixelPoint>,
    {
        self.covering_region(points, |point| {
            let (tile_x, tile_y) = self.cell_of(point);
            let (pixel_x, pixel_y) = self.pixel_cell_of(point);
            !self.is_mapped(tile_x, tile_y) || !self.is_mapped(pixel_x, pixel_y)
        })
    }

    fn covering_region<I, F>(&self, points: I, mut needs_backing: F) -> Option<PixelRegion>
    where
        I: IntoIterator<Item = PixelPoint>,
        F: FnMut(PixelPoint) -> bool,
    {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for point in points {
            if !needs_backing(point) {
                continue;
            }
            let (x, y) = self.pixel_of(point);
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((min_x, min_y, max_x, max_y)) => {
                    (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                }
            });
        }
        bounds.map(|(min_x, min_y, max_x, max_y)| {
            PixelRegion::from_corners(min_x, min_y, max_x, max_y)
        })
    }

    // The far edge itself maps onto the last pixel.
    fn pixel_of(&self, point: PixelPoint) -> (u32, u32) {
        self.assert_inside(point);
        (
            (point.x as u32).min(self.size.width.saturating_sub(1)),
            (point.y as u32).min(self.size.height.saturating_sub(1)),
        )
    }

    fn assert_inside(&self, point: PixelPoint) {
        assert!(
            point.x >= 0.0
                && point.y >= 0.0
                && point.x <= self.size.width as f32
                && point.y <= self.size.height as f32,
            "point {point:?} lies outside the surface"
        );
    }

    /// `unmapped_covering_region` expressed in tile indices, grown outward.
    pub fn unmapped_tile_region<I>(&self, points: I) -> Option<TileGridRegion>
    where
        I: IntoIterator<Item = PixelPoint>,
    {
        self.unmapped_covering_region(points)
            .map(|region| region.to_tile_grid_outward(self.tile_size))
    }

    /// Marks every cell of `region` as mapped. Cells past the grid edge are
    /// ignored.
    pub fn update_mapping(&mut self, region: TileGridRegion) {
        let max_x = region.x.saturating_add(region.width).min(self.tiles_per_row);
        let max_y = region
            .y
            .saturating_add(region.height)
            .min(self.tiles_per_column);
        let clipped = TileGridRegion::new(
            region.x,
            region.y,
            max_x.saturating_sub(region.x),
            max_y.saturating_sub(region.y),
        );
        for (tile_x, tile_y) in clipped.cells() {
            let index = self.cell_index(tile_x, tile_y);
            if !self.mapped[index] {
                self.mapped.set(index, true);
                self.mapped_count += 1;
            }
        }
    }

    /// Marks every cell that `region` touches.
    pub fn update_mapping_for_pixels(&mut self, region: PixelRegion) {
        self.update_mapping(region.to_tile_grid_outward(self.tile_size));
    }

    pub fn iter_mapped(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let tiles_per_row = self.tiles_per_row as usize;
        self.mapped.iter_ones().map(move |index| {
            (
                (index % tiles_per_row) as u32,
                (index / tiles_per_row) as u32,
            )
        })
    }

    fn cell_index(&self, tile_x: u32, tile_y: u32) -> usize {
        assert!(
            tile_x < self.tiles_per_row && tile_y < self.tiles_per_column,
            "tile cell ({tile_x}, {tile_y}) is outside the {}x{} grid",
            self.tiles_per_row,
            self.tiles_per_column
        );
        tile_y as usize * self.tiles_per_row as usize + tile_x as usize
    }
}
