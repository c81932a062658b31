//! Error types for `MBTiles` sources.

use std::path::PathBuf;

use tilemap_tile_utils::TileCoord;

/// Errors that can occur while reading `MBTiles` files.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum MbtilesError {
    /// Failed to open a connection to the file.
    #[error("Unable to open {1}: {0}")]
    AcquireConnError(#[source] mbtiles::MbtError, PathBuf),

    /// Wrapper for underlying mbtiles library errors.
    #[error(transparent)]
    MbtilesLibraryError(#[from] mbtiles::MbtError),

    /// Reading a tile failed.
    #[error("Unable to read tile {1} of source {2}: {0}")]
    GetTileError(#[source] mbtiles::MbtError, TileCoord, String),

    /// Stored vector tile could not be decompressed.
    #[error("Unable to decompress tile {1} of source {2}: {0}")]
    DecompressError(#[source] std::io::Error, TileCoord, String),

    /// Unable to parse metadata in file.
    #[error(r"Unable to parse metadata in file {1}: {0}")]
    InvalidMetadata(String, PathBuf),
}
