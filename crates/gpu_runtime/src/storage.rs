use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use model::{PixelFormat, SurfaceDescriptor, TileRegion};
use tiles::{Blob, CommandSequence, TileDelegate};
use tracing::{debug, trace};

use crate::format::{extent, texture_format};
use crate::{GpuCommandSequence, GpuContext};

// Tiles are only written and read back through copies; every format allows
// these usages.
const TILE_TEXTURE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::COPY_SRC
    .union(wgpu::TextureUsages::COPY_DST)
    .union(wgpu::TextureUsages::TEXTURE_BINDING);

/// Tile delegate keeping one texture per allocated region.
#[derive(Debug)]
pub struct GpuTileStorage {
    context: Arc<GpuContext>,
    pixel_format: PixelFormat,
    textures: HashMap<TileRegion, wgpu::Texture>,
}

impl GpuTileStorage {
    /// Dense surfaces get their single region backed immediately.
    pub fn new(context: Arc<GpuContext>, descriptor: &SurfaceDescriptor) -> Self {
        let mut storage = Self {
            context,
            pixel_format: descriptor.pixel_format,
            textures: HashMap::new(),
        };
        if !descriptor.is_tiled() {
            let bounds = descriptor.bounds();
            let texture = storage.create_texture(bounds);
            storage.textures.insert(bounds, texture);
        }
        storage
    }

    pub fn texture(&self, region: TileRegion) -> Option<&wgpu::Texture> {
        self.textures.get(&region)
    }

    pub fn allocated_count(&self) -> usize {
        self.textures.len()
    }

    fn create_texture(&self, region: TileRegion) -> wgpu::Texture {
        self.context
            .device()
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("tiles.region"),
                size: extent(region.width(), region.height()),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: texture_format(self.pixel_format),
                usage: TILE_TEXTURE_USAGE,
                view_formats: &[],
            })
    }

    fn unpadded_row_bytes(&self, region: TileRegion) -> usize {
        (region.width() as usize)
            .checked_mul(self.pixel_format.bytes_per_pixel())
            .expect("tile row byte length overflow")
    }

    fn read_back(&self, region: TileRegion, texture: &wgpu::Texture) -> Vec<u8> {
        let device = self.context.device();
        let row_bytes = self.unpadded_row_bytes(region);
        let padded_row_bytes =
            row_bytes.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tiles.readback"),
            size: (padded_row_bytes as u64) * u64::from(region.height()),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tiles.readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes as u32),
                    rows_per_image: Some(region.height()),
                },
            },
            extent(region.width(), region.height()),
        );
        self.context.queue().submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.context.wait_idle();
        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(error)) => panic!("tile readback of {region:?} failed to map: {error}"),
            Err(_) => panic!("tile readback of {region:?} never completed"),
        }

        let mapped = slice.get_mapped_range();
        let mut bytes = Vec::with_capacity(row_bytes * region.height() as usize);
        for row in mapped.chunks_exact(padded_row_bytes) {
            bytes.extend_from_slice(&row[..row_bytes]);
        }
        drop(mapped);
        buffer.unmap();
        bytes
    }
}

impl TileDelegate for GpuTileStorage {
    type Commands = GpuCommandSequence;

    fn allocate(&mut self, regions: &HashSet<TileRegion>, commands: &mut Self::Commands) {
        // Fresh textures are zero-initialised by wgpu; the section only orders
        // the allocation against later work.
        commands.encode_section("tiles.allocate", |_| {
            for region in regions {
                let texture = self.create_texture(*region);
                if self.textures.insert(*region, texture).is_some() {
                    panic!("region {region:?} allocated twice");
                }
            }
        });
        debug!(count = regions.len(), "gpu tiles allocated");
    }

    fn free(&mut self, regions: &HashSet<TileRegion>, commands: &mut Self::Commands) {
        commands.encode_section("tiles.free", |_| {
            for region in regions {
                match self.textures.remove(region) {
                    Some(texture) => texture.destroy(),
                    None => panic!("free of unallocated region {region:?}"),
                }
            }
        });
        debug!(count = regions.len(), "gpu tiles freed");
    }

    fn load(&mut self, region: TileRegion) -> Option<Blob> {
        let texture = self.textures.get(&region)?;
        let bytes = self.read_back(region, texture);
        trace!(?region, bytes = bytes.len(), "gpu tile read back");
        Some(Blob::new(bytes))
    }

    fn store(&mut self, region: TileRegion, blob: &Blob) {
        let bytes = blob.expect_bytes();
        let expected = region.byte_len(self.pixel_format.bytes_per_pixel());
        assert_eq!(
            bytes.len(),
            expected,
            "blob {} length does not match region {region:?}",
            blob.id()
        );
        let texture = self
            .textures
            .get(&region)
            .unwrap_or_else(|| panic!("store into unallocated region {region:?}"));
        self.context.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.unpadded_row_bytes(region) as u32),
                rows_per_image: Some(region.height()),
            },
            extent(region.width(), region.height()),
        );
    }
}
