//! Configuration model of tile sources, as read from the configuration file.
//!
//! A [`SourceConfig`] holds only what the operator wrote. Each source merges it with
//! what its backend reports and with format defaults exactly once, producing a
//! [`SourceInfo`](crate::tiles::SourceInfo).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tilejson::Bounds;
use tilemap_tile_utils::Format;

/// Default JPEG quality used when transcoding tiles.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Values of unknown keys, kept so they can be reported.
pub type UnrecognizedValues = HashMap<String, serde_json::Value>;

/// Kind of backend a source reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// A single `MBTiles` file.
    Mbtiles,
    /// A table in a `PostgreSQL` database with the `PostGIS` extension.
    Postgis,
    /// Tiles stored as individual files following a path template.
    File,
}

impl SourceType {
    /// Name used in configuration files and listings.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mbtiles => "mbtiles",
            Self::Postgis => "postgis",
            Self::File => "file",
        }
    }
}

/// One configured tile source.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique key of the source, used as the layer name.
    #[serde(default)]
    pub id: String,
    /// Backend kind.
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// File path, path template, or connection string depending on `type`.
    #[serde(default)]
    pub location: String,
    /// Stored tile format.
    pub format: Option<Format>,
    /// Human readable title.
    pub title: Option<String>,
    /// Longer description.
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Attribution text.
    pub attribution: Option<String>,
    /// `true` when row 0 is the southern row.
    pub tms: Option<bool>,
    /// Lowest zoom level served.
    pub min_zoom: Option<u8>,
    /// Highest zoom level served.
    pub max_zoom: Option<u8>,
    /// Spatial reference system code, e.g. `EPSG:3857`.
    pub srs: Option<String>,
    /// Tile width in pixels.
    pub tile_width: Option<u32>,
    /// Tile height in pixels.
    pub tile_height: Option<u32>,
    /// Geographic bounds as `[west, south, east, north]` in degrees.
    pub bounds: Option<Bounds>,
    /// Reserved for a tile cache. Parsed but not used.
    pub cache: Option<CacheConfig>,
    /// Options of `postgis` sources.
    pub postgis: Option<PostgisConfig>,
    /// Keys that did not match any known option.
    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

impl SourceConfig {
    /// A configuration with only the required fields set.
    #[must_use]
    pub fn new(id: impl Into<String>, source_type: SourceType, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_type,
            location: location.into(),
            format: None,
            title: None,
            abstract_text: None,
            attribution: None,
            tms: None,
            min_zoom: None,
            max_zoom: None,
            srs: None,
            tile_width: None,
            tile_height: None,
            bounds: None,
            cache: None,
            postgis: None,
            unrecognized: UnrecognizedValues::default(),
        }
    }
}

/// Options for `PostGIS` sources.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgisConfig {
    /// Table name, optionally schema qualified as `schema.table`.
    pub table: Option<String>,
    /// Geometry column.
    pub geometry: Option<String>,
    /// Comma separated list of extra columns to encode as feature properties.
    pub fields: Option<String>,
    /// SRID of the geometry column when it is not 3857.
    pub srid: Option<i32>,
    /// Compute the geographic bounds of the table during startup.
    pub calc_bounds: Option<bool>,
}

/// Reserved cache settings.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache kind.
    #[serde(rename = "type")]
    pub cache_type: Option<String>,
    /// Cache database file.
    pub dbfile: Option<String>,
}

/// Process wide properties advertised by the capabilities documents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceProperties {
    /// Service title.
    pub title: String,
    /// Service description.
    pub abstract_text: String,
    /// Keywords, each emitted as its own element.
    pub keywords: Vec<String>,
    /// JPEG quality used when transcoding, 1..=100.
    pub jpeg_quality: u8,
}

impl Default for ServiceProperties {
    fn default() -> Self {
        Self {
            title: String::new(),
            abstract_text: String::new(),
            keywords: Vec::new(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ServiceProperties {
    /// Splits a comma separated keyword list, dropping blanks.
    #[must_use]
    pub fn parse_keywords(keywords: &str) -> Vec<String> {
        keywords
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}
