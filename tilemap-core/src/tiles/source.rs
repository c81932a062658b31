use std::fmt::Debug;

use async_trait::async_trait;
use serde::Serialize;
use tilejson::Bounds;
use tilemap_tile_utils::{Encoding, Format, RowConvention, TileCoord, TileInfo, decode};

use crate::config::SourceType;
use crate::tiles::TileResult;

/// Default Web Mercator spatial reference.
pub const DEFAULT_SRS: &str = "EPSG:3857";

/// Zoom range used when neither configuration nor backend provide one.
pub const DEFAULT_ZOOM_RANGE: (u8, u8) = (0, 20);

/// Finalized description of a source, merged from configuration, backend and defaults.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    /// Unique source id.
    pub id: String,
    /// Backend kind.
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// Location the source was built from.
    #[serde(skip)]
    pub location: String,
    /// Stored tile format.
    pub format: Format,
    /// Human readable title.
    pub title: String,
    /// Longer description.
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Attribution text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
    /// Row numbering used by [`Source::get_tile`].
    #[serde(rename = "tmsConvention", serialize_with = "serialize_tms")]
    pub row_convention: RowConvention,
    /// Lowest zoom level served.
    pub min_zoom: u8,
    /// Highest zoom level served.
    pub max_zoom: u8,
    /// Spatial reference system code.
    pub srs: String,
    /// Tile width in pixels.
    pub tile_width: u32,
    /// Tile height in pixels.
    pub tile_height: u32,
    /// Geographic bounds in degrees, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

fn serialize_tms<S: serde::Serializer>(v: &RowConvention, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_bool(v.is_tms())
}

/// A tile as stored by its source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    /// Raw tile bytes, already decompressed for vector tiles.
    pub data: Vec<u8>,
    /// Format of `data`.
    pub format: Format,
}

impl Tile {
    /// Creates a new tile.
    #[must_use]
    pub fn new(data: Vec<u8>, format: Format) -> Self {
        Self { data, format }
    }
}

/// Core trait of every tile backend.
///
/// Sources are built once by [`TileSources::resolve`](crate::tiles::TileSources::resolve)
/// and shared read-only afterwards, so every method takes `&self`.
#[async_trait]
pub trait Source: Send + Sync + Debug {
    /// Finalized source description.
    fn get_info(&self) -> &SourceInfo;

    /// Unique source identifier.
    fn get_id(&self) -> &str {
        &self.get_info().id
    }

    /// Creates a boxed clone for trait object storage.
    fn clone_source(&self) -> BoxedSource;

    /// Whether `zoom` lies within the served zoom range.
    fn is_valid_zoom(&self, zoom: u8) -> bool {
        let info = self.get_info();
        info.min_zoom <= zoom && zoom <= info.max_zoom
    }

    /// Fetches one tile. The row of `xyz` uses the source's own
    /// [`row_convention`](SourceInfo::row_convention).
    ///
    /// Returns `Ok(None)` when there is no data at that coordinate.
    async fn get_tile(&self, xyz: TileCoord) -> TileResult<Option<Tile>>;
}

/// Boxed tile source trait object for storage in collections.
pub type BoxedSource = Box<dyn Source>;

impl Clone for BoxedSource {
    fn clone(&self) -> Self {
        self.clone_source()
    }
}

/// Decompresses vector tile bytes, leaving anything else untouched.
pub(crate) fn decode_vector_tile(data: Vec<u8>, format: Format) -> std::io::Result<Vec<u8>> {
    if format != Format::Mvt {
        return Ok(data);
    }
    match TileInfo::detect(&data) {
        Some(TileInfo { encoding, .. }) if encoding != Encoding::Uncompressed => {
            decode(&data, encoding)
        }
        _ => Ok(data),
    }
}
