//! CPU-resident backend: tile memory, surface buffers and command sequencing
//! all live in host memory. Used for headless runs and tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use model::{PixelFormat, SurfaceDescriptor, TileRegion};
use tracing::trace;

use crate::delegate::sorted_regions;
use crate::{Blob, CommandSequence, SurfaceAllocator, TileDelegate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSection {
    pub label: &'static str,
    /// Fence value this section waited for before starting.
    pub waits_for: u64,
    /// Fence value signalled on completion.
    pub signals: u64,
}

/// Executes sections immediately, in order, tracking the fence value each one
/// waited for and signalled.
#[derive(Debug, Default)]
pub struct HostCommandSequence {
    fence: u64,
    sections: Vec<HostSection>,
}

impl HostCommandSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fence_value(&self) -> u64 {
        self.fence
    }

    pub fn sections(&self) -> &[HostSection] {
        &self.sections
    }
}

impl CommandSequence for HostCommandSequence {
    type Encoder = HostSection;

    fn encode_section<R>(
        &mut self,
        label: &'static str,
        encode: impl FnOnce(&mut Self::Encoder) -> R,
    ) -> R {
        let signals = self
            .fence
            .checked_add(1)
            .expect("host command fence overflow");
        let mut section = HostSection {
            label,
            waits_for: self.fence,
            signals,
        };
        let result = encode(&mut section);
        self.fence = section.signals;
        self.sections.push(section);
        result
    }

    fn commit(self) {
        trace!(sections = self.sections.len(), "host command sequence committed");
    }
}

/// Tile delegate backed by one zero-initialised byte buffer per region.
///
/// Dense surfaces never allocate through the mediator, so their single
/// region is backed up front.
#[derive(Debug)]
pub struct HostTileStorage {
    pixel_format: PixelFormat,
    tiles: HashMap<TileRegion, Vec<u8>>,
}

impl HostTileStorage {
    pub fn new(descriptor: &SurfaceDescriptor) -> Self {
        let mut tiles = HashMap::new();
        if !descriptor.is_tiled() {
            let bounds = descriptor.bounds();
            tiles.insert(bounds, vec![0; descriptor.region_byte_len(bounds)]);
        }
        Self {
            pixel_format: descriptor.pixel_format,
            tiles,
        }
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn is_allocated(&self, region: TileRegion) -> bool {
        self.tiles.contains_key(&region)
    }

    pub fn allocated_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile_bytes(&self, region: TileRegion) -> Option<&[u8]> {
        self.tiles.get(&region).map(Vec::as_slice)
    }

    /// Writes one pixel of an allocated region; stands in for a draw call.
    pub fn write_pixel(&mut self, region: TileRegion, x: u32, y: u32, pixel: &[u8]) {
        let bytes_per_pixel = self.pixel_format.bytes_per_pixel();
        assert_eq!(pixel.len(), bytes_per_pixel, "pixel byte length mismatch");
        assert!(
            x >= region.x && y >= region.y && x < region.max_x() && y < region.max_y(),
            "pixel ({x}, {y}) lies outside {region:?}"
        );
        let tile = self
            .tiles
            .get_mut(&region)
            .unwrap_or_else(|| panic!("write to unallocated region {region:?}"));
        let offset = ((y - region.y) as usize * region.width() as usize + (x - region.x) as usize)
            * bytes_per_pixel;
        tile[offset..offset + bytes_per_pixel].copy_from_slice(pixel);
    }
}

impl TileDelegate for HostTileStorage {
    type Commands = HostCommandSequence;

    fn allocate(&mut self, regions: &HashSet<TileRegion>, commands: &mut Self::Commands) {
        let bytes_per_pixel = self.pixel_format.bytes_per_pixel();
        commands.encode_section("tiles.allocate", |_| {
            for region in sorted_regions(regions) {
                let previous = self
                    .tiles
                    .insert(region, vec![0; region.byte_len(bytes_per_pixel)]);
                assert!(previous.is_none(), "region {region:?} allocated twice");
            }
        });
    }

    fn free(&mut self, regions: &HashSet<TileRegion>, commands: &mut Self::Commands) {
        commands.encode_section("tiles.free", |_| {
            for region in regions {
                if self.tiles.remove(region).is_none() {
                    panic!("free of unallocated region {region:?}");
                }
            }
        });
    }

    fn load(&mut self, region: TileRegion) -> Option<Blob> {
        self.tiles
            .get(&region)
            .map(|bytes| Blob::new(bytes.clone()))
    }

    fn store(&mut self, region: TileRegion, blob: &Blob) {
        let expected = region.byte_len(self.pixel_format.bytes_per_pixel());
        let bytes = blob.expect_bytes();
        assert_eq!(
            bytes.len(),
            expected,
            "blob {} length does not match region {region:?}",
            blob.id()
        );
        let tile = self
            .tiles
            .get_mut(&region)
            .unwrap_or_else(|| panic!("store into unallocated region {region:?}"));
        tile.copy_from_slice(&bytes);
    }
}

/// Host pixel buffer with interior mutability, so aliasing handles can read
/// while one of them writes.
#[derive(Debug)]
pub struct HostBuffer {
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
    sample_count: u32,
    bytes: Mutex<Vec<u8>>,
}

impl HostBuffer {
    pub fn new(descriptor: &SurfaceDescriptor, sample_count: u32) -> Self {
        let bytes_per_pixel = descriptor.bytes_per_pixel();
        let len = descriptor
            .bounds()
            .byte_len(bytes_per_pixel)
            .checked_mul(sample_count as usize)
            .expect("host buffer size overflow");
        Self {
            width: descriptor.size.width,
            height: descriptor.size.height,
            bytes_per_pixel,
            sample_count,
            bytes: Mutex::new(vec![0; len]),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn read(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Vec<u8> {
        let offset = self.offset(x, y);
        self.lock()[offset..offset + self.bytes_per_pixel].to_vec()
    }

    pub fn write_pixel(&self, x: u32, y: u32, pixel: &[u8]) {
        assert_eq!(pixel.len(), self.bytes_per_pixel, "pixel byte length mismatch");
        let offset = self.offset(x, y);
        self.lock()[offset..offset + self.bytes_per_pixel].copy_from_slice(pixel);
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} buffer",
            self.width,
            self.height
        );
        (y as usize * self.width as usize + x as usize) * self.bytes_per_pixel
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
pub struct HostSurfaceAllocator {
    created: usize,
    copies: usize,
}

impl HostSurfaceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `create_buffers` calls.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Number of buffer-to-buffer copies.
    pub fn copies(&self) -> usize {
        self.copies
    }
}

impl SurfaceAllocator for HostSurfaceAllocator {
    type Buffer = HostBuffer;
    type Commands = HostCommandSequence;

    fn create_buffers(&mut self, descriptor: &SurfaceDescriptor) -> (HostBuffer, Option<HostBuffer>) {
        self.created += 1;
        let msaa = descriptor
            .is_multisampled()
            .then(|| HostBuffer::new(descriptor, descriptor.raster_sample_count));
        (HostBuffer::new(descriptor, 1), msaa)
    }

    fn copy_buffer(
        &mut self,
        source: &HostBuffer,
        destination: &HostBuffer,
        commands: &mut HostCommandSequence,
    ) {
        commands.encode_section("surface.copy", |_| {
            let bytes = source.read();
            let mut target = destination.lock();
            assert_eq!(target.len(), bytes.len(), "surface copy size mismatch");
            target.copy_from_slice(&bytes);
        });
        self.copies += 1;
    }
}
