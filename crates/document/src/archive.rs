use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use model::{SurfaceDescriptor, TileRegion};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiles::{Blob, BlobError, BlobId, TileSnapshot};
use tracing::debug;

use crate::{BlobLoader, BlobStore, BlobStoreError};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("surface archive json is invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] BlobStoreError),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error("surface archive i/o failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("archived region {region:?} lies outside surface {bounds:?}")]
    RegionOutOfBounds {
        region: TileRegion,
        bounds: TileRegion,
    },
    #[error("archived region {region:?} appears more than once")]
    DuplicateRegion { region: TileRegion },
    #[error("blob {id} holds {actual} bytes but region needs {expected}")]
    PayloadLength {
        id: BlobId,
        expected: usize,
        actual: usize,
    },
    #[error("archived tile size {width}x{height} must be non-zero")]
    EmptyTileSize { width: u32, height: u32 },
    #[error("archive describes {found:?}, expected {expected:?}")]
    DescriptorMismatch {
        expected: SurfaceDescriptor,
        found: SurfaceDescriptor,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedBlob {
    pub id: BlobId,
    /// Payload embedded in the archive as base64; when absent the payload
    /// lives in a blob store under `id`.
    #[serde(default, with = "inline_payload", skip_serializing_if = "Option::is_none")]
    pub inline: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedTile {
    pub region: TileRegion,
    pub blob: ArchivedBlob,
}

/// Persisted form of one surface snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceArchive {
    pub descriptor: SurfaceDescriptor,
    pub tiles: Vec<ArchivedTile>,
}

impl SurfaceArchive {
    /// Writes every payload larger than `inline_limit` bytes to `store` and
    /// records the rest inline. Tiles are kept in row-major order.
    pub fn capture(
        descriptor: SurfaceDescriptor,
        snapshot: &TileSnapshot,
        store: &dyn BlobStore,
        inline_limit: usize,
    ) -> Result<Self, ArchiveError> {
        let mut regions = snapshot.keys().copied().collect::<Vec<_>>();
        regions.sort_by_key(|region| (region.y, region.x));

        let mut tiles = Vec::with_capacity(regions.len());
        for region in regions {
            let blob = &snapshot[&region];
            let bytes = blob.bytes()?;
            check_payload_length(&descriptor, region, blob.id(), bytes.len())?;
            let inline = if bytes.len() <= inline_limit {
                Some(bytes.to_vec())
            } else {
                store.store(blob.id(), &bytes)?;
                None
            };
            tiles.push(ArchivedTile {
                region,
                blob: ArchivedBlob {
                    id: blob.id().clone(),
                    inline,
                },
            });
        }

        let archive = Self { descriptor, tiles };
        archive.validate()?;
        debug!(tiles = archive.tiles.len(), "captured surface archive");
        Ok(archive)
    }

    pub fn validate(&self) -> Result<(), ArchiveError> {
        if let Some(tile_size) = self.descriptor.tile_size {
            if tile_size.width == 0 || tile_size.height == 0 {
                return Err(ArchiveError::EmptyTileSize {
                    width: tile_size.width,
                    height: tile_size.height,
                });
            }
        }
        let bounds = self.descriptor.bounds();
        let mut seen = HashSet::with_capacity(self.tiles.len());
        for tile in &self.tiles {
            if !bounds.contains_region(tile.region) {
                return Err(ArchiveError::RegionOutOfBounds {
                    region: tile.region,
                    bounds,
                });
            }
            if !seen.insert(tile.region) {
                return Err(ArchiveError::DuplicateRegion {
                    region: tile.region,
                });
            }
            if let Some(inline) = &tile.blob.inline {
                check_payload_length(&self.descriptor, tile.region, &tile.blob.id, inline.len())?;
            }
        }
        Ok(())
    }

    /// Fails when the archive was written for a different surface.
    pub fn expect_descriptor(&self, expected: &SurfaceDescriptor) -> Result<(), ArchiveError> {
        if self.descriptor != *expected {
            return Err(ArchiveError::DescriptorMismatch {
                expected: *expected,
                found: self.descriptor,
            });
        }
        Ok(())
    }

    /// Rebuilds the snapshot. Stored payloads are read from `loader` only when
    /// a blob's bytes are first requested.
    pub fn into_snapshot(self, loader: Arc<dyn BlobLoader + Send + Sync>) -> TileSnapshot {
        let descriptor = self.descriptor;
        self.tiles
            .into_iter()
            .map(|tile| {
                let region = tile.region;
                let blob = match tile.blob.inline {
                    Some(bytes) => Blob::with_id(tile.blob.id, bytes),
                    None => {
                        let id = tile.blob.id;
                        let loader = Arc::clone(&loader);
                        let expected = descriptor.region_byte_len(region);
                        Blob::deferred(id.clone(), move || {
                            let bytes = loader.load(&id).map_err(|error| {
                                BlobError::Unavailable {
                                    id: id.clone(),
                                    message: error.to_string(),
                                }
                            })?;
                            if bytes.len() != expected {
                                return Err(BlobError::Unavailable {
                                    id,
                                    message: format!(
                                        "payload holds {} bytes, region needs {expected}",
                                        bytes.len()
                                    ),
                                });
                            }
                            Ok(bytes)
                        })
                    }
                };
                (region, blob)
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, ArchiveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ArchiveError> {
        let archive: Self = serde_json::from_str(json)?;
        archive.validate()?;
        Ok(archive)
    }

    pub fn save(&self, path: &Path) -> Result<(), ArchiveError> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), tiles = self.tiles.len(), "saved surface archive");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let json = fs::read_to_string(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let archive = Self::from_json(&json)?;
        debug!(path = %path.display(), tiles = archive.tiles.len(), "loaded surface archive");
        Ok(archive)
    }
}

mod inline_payload {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        payload: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match payload {
            Some(bytes) => serializer.serialize_some(&BASE64.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| BASE64.decode(encoded).map_err(D::Error::custom))
            .transpose()
    }
}

fn check_payload_length(
    descriptor: &SurfaceDescriptor,
    region: TileRegion,
    id: &BlobId,
    actual: usize,
) -> Result<(), ArchiveError> {
    let expected = descriptor.region_byte_len(region);
    if actual != expected {
        return Err(ArchiveError::PayloadLength {
            id: id.clone(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use model::{PixelFormat, PixelRect, SurfaceSize, TileSize};
    use tiles::test_helpers::{RecordingDelegate, filled_blob};
    use tiles::{HostCommandSequence, TileInventoryMediator};

    use super::*;
    use crate::{DirectoryBlobStore, MemoryBlobStore};

    fn descriptor() -> SurfaceDescriptor {
        SurfaceDescriptor::tiled(
            SurfaceSize::new(8, 8),
            PixelFormat::R8Uint,
            1,
            TileSize::new(4, 4),
        )
    }

    fn two_tile_snapshot() -> TileSnapshot {
        let descriptor = descriptor();
        let first = TileRegion::new(0, 0, 4, 4);
        let second = TileRegion::new(4, 4, 4, 4);
        TileSnapshot::from([
            (first, filled_blob(&descriptor, first, 1)),
            (second, filled_blob(&descriptor, second, 2)),
        ])
    }

    #[test]
    fn archive_round_trips_through_a_directory_store() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = Arc::new(DirectoryBlobStore::create(dir.path()).expect("create store"));
        let snapshot = two_tile_snapshot();

        let archive = SurfaceArchive::capture(descriptor(), &snapshot, store.as_ref(), 0)
            .expect("capture archive");
        let path = dir.path().join("surface.json");
        archive.save(&path).expect("save archive");

        let loaded = SurfaceArchive::load(&path).expect("load archive");
        assert_eq!(loaded, archive);
        loaded
            .expect_descriptor(&descriptor())
            .expect("descriptor matches");

        let restored = loaded.into_snapshot(store);
        assert_eq!(restored, snapshot);
        for (region, blob) in &restored {
            assert!(!blob.is_resolved());
            assert_eq!(
                blob.bytes().expect("load deferred payload"),
                snapshot[region].bytes().expect("original payload")
            );
        }
    }

    #[test]
    fn archive_json_names_blobs_by_id() {
        let store = MemoryBlobStore::new();
        let snapshot = two_tile_snapshot();
        let archive =
            SurfaceArchive::capture(descriptor(), &snapshot, &store, 0).expect("capture archive");
        let json: serde_json::Value =
            serde_json::from_str(&archive.to_json().expect("encode archive")).expect("parse json");

        let tiles = json["tiles"].as_array().expect("tiles array");
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0]["region"]["x"], 0);
        assert_eq!(tiles[1]["region"]["x"], 4);
        assert!(tiles[0]["blob"].get("inline").is_none());
        assert!(json["descriptor"].get("tile_size").is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn small_payloads_are_inlined_instead_of_stored() {
        let store = MemoryBlobStore::new();
        let archive = SurfaceArchive::capture(descriptor(), &two_tile_snapshot(), &store, 16)
            .expect("capture archive");
        assert!(store.is_empty());
        assert!(archive.tiles.iter().all(|tile| tile.blob.inline.is_some()));

        let restored = archive.into_snapshot(Arc::new(MemoryBlobStore::new()));
        assert!(restored.values().all(Blob::is_resolved));
    }

    #[test]
    fn inline_payloads_are_written_as_base64() {
        let archive = SurfaceArchive::capture(
            descriptor(),
            &two_tile_snapshot(),
            &MemoryBlobStore::new(),
            16,
        )
        .expect("capture archive");
        let json = archive.to_json().expect("encode archive");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse json");
        assert_eq!(
            value["tiles"][0]["blob"]["inline"],
            "AQEBAQEBAQEBAQEBAQEBAQ=="
        );
        assert_eq!(SurfaceArchive::from_json(&json).expect("decode archive"), archive);
    }

    #[test]
    fn malformed_inline_payload_is_a_json_error() {
        let json = r#"{
            "descriptor": {
                "size": {"width": 8, "height": 8},
                "pixel_format": "r8_uint",
                "raster_sample_count": 1,
                "tile_size": {"width": 4, "height": 4}
            },
            "tiles": [
                {"region": {"x": 0, "y": 0, "size": {"width": 4, "height": 4}},
                 "blob": {"id": "a", "inline": "not base64!"}}
            ]
        }"#;
        assert!(matches!(
            SurfaceArchive::from_json(json),
            Err(ArchiveError::Json(_))
        ));
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        let json = r#"{
            "descriptor": {
                "size": {"width": 8, "height": 8},
                "pixel_format": "r8_uint",
                "raster_sample_count": 1,
                "tile_size": {"width": 0, "height": 0}
            },
            "tiles": []
        }"#;
        assert!(matches!(
            SurfaceArchive::from_json(json),
            Err(ArchiveError::EmptyTileSize {
                width: 0,
                height: 0
            })
        ));
    }

    #[test]
    fn missing_payload_surfaces_when_bytes_are_requested() {
        let store = MemoryBlobStore::new();
        let archive = SurfaceArchive::capture(descriptor(), &two_tile_snapshot(), &store, 0)
            .expect("capture archive");
        let restored = archive.into_snapshot(Arc::new(MemoryBlobStore::new()));
        let blob = restored
            .values()
            .next()
            .expect("restored snapshot has tiles");
        assert!(matches!(
            blob.bytes(),
            Err(BlobError::Unavailable { .. })
        ));
    }

    #[test]
    fn regions_outside_the_descriptor_are_rejected() {
        let json = r#"{
            "descriptor": {
                "size": {"width": 8, "height": 8},
                "pixel_format": "r8_uint",
                "raster_sample_count": 1,
                "tile_size": {"width": 4, "height": 4}
            },
            "tiles": [
                {"region": {"x": 8, "y": 0, "size": {"width": 4, "height": 4}}, "blob": {"id": "a"}}
            ]
        }"#;
        assert!(matches!(
            SurfaceArchive::from_json(json),
            Err(ArchiveError::RegionOutOfBounds { .. })
        ));
    }

    #[test]
    fn capture_rejects_payloads_of_the_wrong_length() {
        let region = TileRegion::new(0, 0, 4, 4);
        let snapshot = TileSnapshot::from([(region, Blob::new(vec![0; 3]))]);
        assert!(matches!(
            SurfaceArchive::capture(descriptor(), &snapshot, &MemoryBlobStore::new(), 0),
            Err(ArchiveError::PayloadLength {
                expected: 16,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn descriptor_mismatch_is_reported() {
        let archive = SurfaceArchive::capture(
            descriptor(),
            &TileSnapshot::new(),
            &MemoryBlobStore::new(),
            0,
        )
        .expect("capture empty archive");
        let other = SurfaceDescriptor::dense(SurfaceSize::new(8, 8), PixelFormat::R8Uint, 1);
        assert!(matches!(
            archive.expect_descriptor(&other),
            Err(ArchiveError::DescriptorMismatch { .. })
        ));
    }

    #[test]
    fn loaded_archive_restores_into_a_mediator() {
        let descriptor = descriptor();
        let store = Arc::new(MemoryBlobStore::new());
        let mut mediator = TileInventoryMediator::new(descriptor);
        let mut delegate = RecordingDelegate::new(&descriptor);
        let mut commands = HostCommandSequence::new();
        mediator.as_render_target(
            PixelRect::new(0.0, 0.0, 8.0, 8.0),
            &mut delegate,
            &mut commands,
        );
        delegate
            .storage_mut()
            .write_pixel(TileRegion::new(4, 0, 4, 4), 5, 1, &[42]);
        let snapshot = mediator.take_snapshot(&mut delegate);

        let json = SurfaceArchive::capture(descriptor, &snapshot, store.as_ref(), 0)
            .and_then(|archive| archive.to_json())
            .expect("encode archive");

        let mut fresh = TileInventoryMediator::new(descriptor);
        let mut fresh_delegate = RecordingDelegate::new(&descriptor);
        let restored = SurfaceArchive::from_json(&json)
            .expect("decode archive")
            .into_snapshot(store);
        fresh.restore(restored, &mut fresh_delegate, &mut commands);

        assert_eq!(fresh.allocated_regions().len(), 4);
        let bytes = fresh_delegate
            .storage()
            .tile_bytes(TileRegion::new(4, 0, 4, 4))
            .expect("restored tile is allocated");
        assert_eq!(bytes[4 + 1], 42);
    }
}
