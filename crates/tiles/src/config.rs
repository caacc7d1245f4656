use model::{PixelFormat, SurfaceDescriptor, SurfaceSize, TileSize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TILE_SIZE: TileSize = TileSize::new(256, 256);
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

#[derive(Debug, Error)]
pub enum StorageConfigError {
    #[error("failed to parse storage config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("tile size {width}x{height} must be positive")]
    EmptyTileSize { width: u32, height: u32 },
    #[error("history limit must be at least 1")]
    ZeroHistoryLimit,
}

/// Storage-wide defaults applied when creating surfaces and their history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `None` creates dense surfaces.
    pub tile_size: Option<TileSize>,
    pub history_limit: usize,
    /// Blobs up to this many bytes are embedded in archives instead of being
    /// written to the blob store. 0 disables inlining.
    pub inline_blob_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tile_size: Some(DEFAULT_TILE_SIZE),
            history_limit: DEFAULT_HISTORY_LIMIT,
            inline_blob_limit: 0,
        }
    }
}

impl StorageConfig {
    pub fn from_json_str(json: &str) -> Result<Self, StorageConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StorageConfigError> {
        if let Some(TileSize { width, height }) = self.tile_size {
            if width == 0 || height == 0 {
                return Err(StorageConfigError::EmptyTileSize { width, height });
            }
        }
        if self.history_limit == 0 {
            return Err(StorageConfigError::ZeroHistoryLimit);
        }
        Ok(())
    }

    pub fn descriptor(
        &self,
        size: SurfaceSize,
        pixel_format: PixelFormat,
        raster_sample_count: u32,
    ) -> SurfaceDescriptor {
        match self.tile_size {
            Some(tile_size) => {
                SurfaceDescriptor::tiled(size, pixel_format, raster_sample_count, tile_size)
            }
            None => SurfaceDescriptor::dense(size, pixel_format, raster_sample_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = StorageConfig::from_json_str(r#"{"history_limit": 8}"#)
            .expect("parse partial config");
        assert_eq!(config.tile_size, Some(DEFAULT_TILE_SIZE));
        assert_eq!(config.history_limit, 8);
        assert_eq!(config.inline_blob_limit, 0);
    }

    #[test]
    fn null_tile_size_selects_dense_surfaces() {
        let config =
            StorageConfig::from_json_str(r#"{"tile_size": null}"#).expect("parse dense config");
        let descriptor = config.descriptor(SurfaceSize::new(64, 32), PixelFormat::Rgba8Unorm, 1);
        assert!(!descriptor.is_tiled());
        assert_eq!(descriptor.size, SurfaceSize::new(64, 32));
    }

    #[test]
    fn tiled_descriptor_uses_configured_tile_size() {
        let config = StorageConfig::from_json_str(r#"{"tile_size": {"width": 32, "height": 16}}"#)
            .expect("parse tiled config");
        let descriptor = config.descriptor(SurfaceSize::new(64, 32), PixelFormat::R32Float, 4);
        assert_eq!(descriptor.tile_size, Some(TileSize::new(32, 16)));
        assert_eq!(descriptor.raster_sample_count, 4);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            StorageConfig::from_json_str(r#"{"tile_size": {"width": 0, "height": 16}}"#),
            Err(StorageConfigError::EmptyTileSize { width: 0, height: 16 })
        ));
        assert!(matches!(
            StorageConfig::from_json_str(r#"{"history_limit": 0}"#),
            Err(StorageConfigError::ZeroHistoryLimit)
        ));
        assert!(matches!(
            StorageConfig::from_json_str("not json"),
            Err(StorageConfigError::Parse(_))
        ));
    }
}
