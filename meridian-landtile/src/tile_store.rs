//! # Tile store
//!
//! Mediates access to the routing container (a SQLite file with one row
//! per tile) and caps decoded blobs with an LRU cache.

use crate::land_tile::{LandTile, LandTileError};
use crate::tile_key::TileKey;
use lru::LruCache;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const DEFAULT_ZOOM: u8 = 14;

const TILE_QUERY: &str = "SELECT data FROM land_tiles WHERE z = ?1 AND x = ?2 AND y = ?3 LIMIT 1";

#[derive(Debug, Error)]
pub enum TileStoreError {
    #[error("Failed to open the routing container: {0}")]
    Open(#[source] rusqlite::Error),
    #[error("Failed to read a tile from the container: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("Tile blob failed structural validation: {0}")]
    Decode(#[from] LandTileError),
}

/// Access to one routing container.
///
/// A store is not safe for concurrent use; callers serialize. Handles
/// returned by [`TileStore::load`] stay valid after their cache slot is
/// evicted; the cache only drops its own reference.
pub struct TileStore {
    conn: Connection,
    cache: Option<LruCache<TileKey, Arc<LandTile>>>,
    zoom: u8,
}

impl TileStore {
    /// Opens a container read-only.
    ///
    /// A `cache_capacity` of zero disables caching; every load then reads
    /// the container afresh.
    ///
    /// # Errors
    ///
    /// Fails with [`TileStoreError::Open`] when the container cannot be
    /// opened.
    pub fn open<P: AsRef<Path>>(path: P, cache_capacity: usize) -> Result<Self, TileStoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(TileStoreError::Open)?;
        // Read tuning: reader-friendly journaling, normal durability,
        // scratch space in memory. Best-effort; a read-only connection
        // cannot switch an already-set journal mode.
        let _ = conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;",
        );
        Ok(Self {
            conn,
            cache: NonZeroUsize::new(cache_capacity).map(LruCache::new),
            zoom: DEFAULT_ZOOM,
        })
    }

    /// The working zoom used by higher layers.
    #[inline]
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    #[inline]
    pub fn set_zoom(&mut self, zoom: u8) {
        self.zoom = zoom;
    }

    /// Loads the tile for a key, or `None` when the container has no such
    /// tile (which is not an error).
    ///
    /// A cache hit promotes the entry to most-recently-used; a miss reads
    /// from the container and inserts, evicting the least-recent entry at
    /// capacity.
    ///
    /// # Errors
    ///
    /// Fails on container read errors and on blobs that do not pass
    /// structural validation.
    pub fn load(&mut self, key: TileKey) -> Result<Option<Arc<LandTile>>, TileStoreError> {
        if let Some(cache) = &mut self.cache
            && let Some(tile) = cache.get(&key)
        {
            return Ok(Some(Arc::clone(tile)));
        }

        let Some(tile) = self.read_tile(key)? else {
            return Ok(None);
        };
        let tile = Arc::new(tile);
        if let Some(cache) = &mut self.cache {
            cache.put(key, Arc::clone(&tile));
        }
        Ok(Some(tile))
    }

    fn read_tile(&self, key: TileKey) -> Result<Option<LandTile>, TileStoreError> {
        let mut stmt = self.conn.prepare_cached(TILE_QUERY)?;
        let blob: Option<Vec<u8>> = stmt
            .query_row(rusqlite::params![key.z, key.x, key.y], |row| row.get(0))
            .optional()?;
        match blob {
            Some(bytes) => {
                debug!(?key, bytes = bytes.len(), "tile read from container");
                Ok(Some(LandTile::try_from(bytes)?))
            }
            None => Ok(None),
        }
    }
}
