use std::io;

use tilemap_core::tiles::TileError;

use crate::config::ConfigFileError;

/// A convenience [`Result`] for the tilemap crate.
pub type TilemapResult<T> = Result<T, TilemapError>;

#[derive(thiserror::Error, Debug)]
pub enum TilemapError {
    #[error("The --config and the .mbtiles file arguments cannot be used together: {0:?}")]
    ConfigAndFilesError(Vec<String>),

    #[error("Unable to bind to {1}: {0}")]
    BindingError(#[source] io::Error, String),

    #[error("Base path must be a valid URL path, and must begin with a '/' symbol, but is '{0}'")]
    BasePathError(String),

    #[error("JPEG quality must be between 1 and 100, but is {0}")]
    InvalidJpegQuality(u8),

    #[error(transparent)]
    ConfigFileError(#[from] ConfigFileError),

    #[error(transparent)]
    TileError(#[from] TileError),

    #[error(transparent)]
    IoError(#[from] io::Error),
}
