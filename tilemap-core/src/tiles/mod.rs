//! Tile sources and their registry.
//!
//! Every backend implements [`Source`]. [`TileSources`] builds all configured sources
//! once at startup and answers lookups afterwards:
//!   - [x] [`mbtiles`]
//!   - [x] [`postgis`]
//!   - [x] [`file`]

pub(crate) mod source;
pub use source::{BoxedSource, DEFAULT_SRS, DEFAULT_ZOOM_RANGE, Source, SourceInfo, Tile};

mod error;
pub use error::{TileError, TileResult};

mod registry;
pub use registry::TileSources;

/// Image transcoding and map composition.
pub mod imaging;

#[cfg(feature = "mbtiles")]
/// Implementation of `MBTiles`' [`Source`].
pub mod mbtiles;

#[cfg(feature = "postgis")]
/// Implementation of a `PostGIS` vector tile [`Source`].
pub mod postgis;

#[cfg(feature = "file")]
/// Implementation of a templated local file [`Source`].
pub mod file;
