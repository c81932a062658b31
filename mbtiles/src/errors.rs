use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum MbtError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    JsonSerdeError(#[from] serde_json::Error),

    #[error("MBTile filepath contains unsupported characters: {}", .0.display())]
    UnsupportedCharsInFilepath(PathBuf),

    #[error("Invalid zoom value {0}={1}, expecting an integer between 0 and 30")]
    InvalidZoomValue(&'static str, String),

    #[error("Invalid tile index zoom_level={0}, tile_column={1}, tile_row={2}")]
    InvalidTileIndex(u8, u32, u32),

    #[error("No tiles found")]
    NoTilesFound,
}

pub type MbtResult<T> = Result<T, MbtError>;
