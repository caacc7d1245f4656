//! wgpu backend for tile storage: tile textures, surface textures and
//! fenced command submission.

mod commands;
mod context;
mod format;
mod storage;
mod surface;

pub use commands::GpuCommandSequence;
pub use context::{GpuContext, GpuContextError};
pub use format::texture_format;
pub use storage::GpuTileStorage;
pub use surface::{GpuSurfaceAllocator, GpuSurfaceTexture, color_attachment};
