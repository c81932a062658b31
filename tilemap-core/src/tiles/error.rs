use tilemap_tile_utils::Format;

use crate::config::SourceType;

/// Errors that can occur while building sources or serving tiles.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum TileError {
    /// A source has no `id`. Holds the position of the source in the configuration.
    #[error("Source #{0} has no id")]
    MissingId(usize),

    /// A source has no `location`.
    #[error("Source {0} has no location")]
    MissingLocation(String),

    /// Two sources share one id.
    #[error("Source id {0} is used more than once")]
    DuplicateSourceId(String),

    /// The source type was disabled at compile time.
    #[error("Source {} has type {} which is not supported by this build", .0, .1.as_str())]
    UnsupportedSourceType(String, SourceType),

    /// `min_zoom` is above `max_zoom`, or either is above the maximum zoom level.
    #[error("Source {0} has an invalid zoom range {1}..{2}")]
    InvalidZoomRange(String, u8, u8),

    /// Errors of [`mbtiles`](crate::tiles::mbtiles) sources.
    #[cfg(feature = "mbtiles")]
    #[error(transparent)]
    MbtilesError(#[from] super::mbtiles::MbtilesError),

    /// Errors of [`postgis`](crate::tiles::postgis) sources.
    #[cfg(feature = "postgis")]
    #[error(transparent)]
    PostgisError(#[from] super::postgis::PostgisError),

    /// Errors of [`file`](crate::tiles::file) sources.
    #[cfg(feature = "file")]
    #[error(transparent)]
    FileError(#[from] super::file::FileError),

    /// Stored image could not be decoded.
    #[error("Unable to decode {1} image: {0}")]
    ImageDecodeError(#[source] image::ImageError, Format),

    /// Image could not be encoded in the requested format.
    #[error("Unable to encode {1} image: {0}")]
    ImageEncodeError(#[source] image::ImageError, Format),

    /// No conversion exists between the two formats.
    #[error("Cannot convert {0} tiles to {1}")]
    UnsupportedTranscode(Format, Format),

    /// Writing an XML document failed.
    #[error("Unable to write XML document: {0}")]
    XmlError(String),
}

/// A convenience [`Result`] for tile operations.
pub type TileResult<T> = Result<T, TileError>;
