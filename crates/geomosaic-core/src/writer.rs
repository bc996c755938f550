//! Tile and metadata sinks.
//!
//! Paths handed to a writer are relative; the file extension of a tile path
//! selects its encoding.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{MosaicError, Result};
use crate::raster::{encode_raster, EncodeSettings, Raster};

/// Destination for generated tiles. Called concurrently from the tile
/// workers.
pub trait TileWriter: Send + Sync {
    fn write_tile(&self, path: &Path, tile: &Raster) -> Result<()>;

    fn write_metadata(&self, path: &Path, contents: &str) -> Result<()>;
}

fn extension(path: &Path) -> Result<&str> {
    path.extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| MosaicError::Codec(format!("tile path {} has no extension", path.display())))
}

/// Writes encoded tiles below a root directory, creating directories as
/// needed.
#[derive(Debug, Clone)]
pub struct DiskTileWriter {
    root: PathBuf,
    settings: EncodeSettings,
}

impl DiskTileWriter {
    pub fn new(root: impl Into<PathBuf>, settings: EncodeSettings) -> Self {
        Self {
            root: root.into(),
            settings,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn prepare(&self, path: &Path) -> Result<PathBuf> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(full)
    }
}

impl TileWriter for DiskTileWriter {
    fn write_tile(&self, path: &Path, tile: &Raster) -> Result<()> {
        let bytes = encode_raster(tile, extension(path)?, &self.settings)?;
        fs::write(self.prepare(path)?, bytes)?;
        Ok(())
    }

    fn write_metadata(&self, path: &Path, contents: &str) -> Result<()> {
        fs::write(self.prepare(path)?, contents)?;
        Ok(())
    }
}

/// Keeps every tile and metadata file in memory.
#[derive(Debug, Default)]
pub struct MemoryTileWriter {
    tiles: Mutex<BTreeMap<PathBuf, Raster>>,
    metadata: Mutex<BTreeMap<PathBuf, String>>,
}

impl MemoryTileWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted tile paths.
    pub fn tile_paths(&self) -> Vec<PathBuf> {
        self.tiles
            .lock()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn tile(&self, path: impl AsRef<Path>) -> Option<Raster> {
        self.tiles.lock().ok()?.get(path.as_ref()).cloned()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// Sorted metadata paths.
    pub fn metadata_paths(&self) -> Vec<PathBuf> {
        self.metadata
            .lock()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn metadata(&self, path: impl AsRef<Path>) -> Option<String> {
        self.metadata.lock().ok()?.get(path.as_ref()).cloned()
    }
}

fn poisoned() -> MosaicError {
    MosaicError::Io(std::io::Error::other("tile store lock poisoned"))
}

impl TileWriter for MemoryTileWriter {
    fn write_tile(&self, path: &Path, tile: &Raster) -> Result<()> {
        extension(path)?;
        self.tiles
            .lock()
            .map_err(|_| poisoned())?
            .insert(path.to_path_buf(), tile.clone());
        Ok(())
    }

    fn write_metadata(&self, path: &Path, contents: &str) -> Result<()> {
        self.metadata
            .lock()
            .map_err(|_| poisoned())?
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }
}
