mod descriptor;
mod pixel;
mod region;

pub use descriptor::{PixelFormat, SurfaceDescriptor, SurfaceSize};
pub use pixel::{PixelPoint, PixelRect, PixelRegion, TileGridRegion};
pub use region::{TileRegion, TileSize};
