use serde::{Deserialize, Serialize};

use crate::{TileRegion, TileSize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    R32Float,
    R8Uint,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8Unorm
            | PixelFormat::Rgba8UnormSrgb
            | PixelFormat::Bgra8Unorm
            | PixelFormat::Bgra8UnormSrgb
            | PixelFormat::R32Float => 4,
            PixelFormat::R8Uint => 1,
        }
    }
}

/// Everything needed to allocate and address one surface. A missing
/// `tile_size` selects dense mode: the whole surface is one implicit region.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceDescriptor {
    pub size: SurfaceSize,
    pub pixel_format: PixelFormat,
    pub raster_sample_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_size: Option<TileSize>,
}

impl SurfaceDescriptor {
    pub fn dense(size: SurfaceSize, pixel_format: PixelFormat, raster_sample_count: u32) -> Self {
        Self {
            size,
            pixel_format,
            raster_sample_count,
            tile_size: None,
        }
    }

    pub fn tiled(
        size: SurfaceSize,
        pixel_format: PixelFormat,
        raster_sample_count: u32,
        tile_size: TileSize,
    ) -> Self {
        Self {
            size,
            pixel_format,
            raster_sample_count,
            tile_size: Some(tile_size),
        }
    }

    pub fn is_tiled(&self) -> bool {
        self.tile_size.is_some()
    }

    pub fn is_multisampled(&self) -> bool {
        self.raster_sample_count > 1
    }

    pub fn bounds(&self) -> TileRegion {
        TileRegion::whole(self.size)
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.pixel_format.bytes_per_pixel()
    }

    pub fn region_byte_len(&self, region: TileRegion) -> usize {
        region.byte_len(self.bytes_per_pixel())
    }

    /// Number of tile columns and rows, rounding partial tiles up.
    pub fn grid_dimensions(&self) -> Option<(u32, u32)> {
        self.tile_size.map(|tile_size| {
            (
                self.size.width.div_ceil(tile_size.width),
                self.size.height.div_ceil(tile_size.height),
            )
        })
    }
}
