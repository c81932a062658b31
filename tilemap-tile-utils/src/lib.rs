#![doc = include_str!("../README.md")]

use std::f64::consts::PI;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod decoders;
pub use decoders::*;
mod grid;
pub use grid::*;
mod rectangle;
pub use rectangle::TileRect;

/// Highest zoom level any source may advertise.
pub const MAX_ZOOM: u8 = 30;

pub const EARTH_RADIUS: f64 = 6_378_137.0;
pub const EARTH_CIRCUMFERENCE: f64 = 2.0 * PI * EARTH_RADIUS;
/// Half of the Web Mercator world width, in meters.
pub const MERCATOR_HALF_EXTENT: f64 = EARTH_CIRCUMFERENCE / 2.0;
/// Tile size of the reference Web Mercator quad grid.
pub const REFERENCE_TILE_SIZE: u32 = 256;

/// A tile address. The meaning of `y` depends on the [`RowConvention`] of whoever hands it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Builds a coordinate from untrusted integers, returning `None` when it is outside the grid.
    #[must_use]
    pub fn new_checked(z: i64, x: i64, y: i64) -> Option<Self> {
        if is_valid_tile(x, y, z) {
            Some(Self {
                z: u8::try_from(z).ok()?,
                x: u32::try_from(x).ok()?,
                y: u32::try_from(y).ok()?,
            })
        } else {
            None
        }
    }

    /// Same tile with the row counted from the opposite edge.
    #[must_use]
    pub fn flip_y(self) -> Self {
        Self {
            y: invert_y_value(self.z, self.y),
            ..self
        }
    }
}

impl Display for TileCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Number of tiles along one side of the grid at `zoom`.
#[must_use]
pub fn tile_count(zoom: u8) -> u32 {
    debug_assert!(zoom <= MAX_ZOOM);
    1_u32 << zoom
}

/// Converts a row between the two numbering conventions. Applying it twice yields the same row.
#[must_use]
pub fn invert_y_value(zoom: u8, y: u32) -> u32 {
    tile_count(zoom) - 1 - y
}

#[must_use]
pub fn is_valid_tile(x: i64, y: i64, zoom: i64) -> bool {
    if !(0..=i64::from(MAX_ZOOM)).contains(&zoom) {
        return false;
    }
    let count = 1_i64 << zoom;
    (0..count).contains(&x) && (0..count).contains(&y)
}

/// Which edge of the grid row 0 sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowConvention {
    /// Row 0 is the southern row.
    #[default]
    Tms,
    /// Row 0 is the northern row.
    Xyz,
}

impl RowConvention {
    #[must_use]
    pub fn from_tms(tms: bool) -> Self {
        if tms { Self::Tms } else { Self::Xyz }
    }

    #[must_use]
    pub fn is_tms(self) -> bool {
        self == Self::Tms
    }

    /// Re-expresses `xyz.y` (given in `self`) in the `target` convention.
    #[must_use]
    pub fn convert_to(self, target: Self, xyz: TileCoord) -> TileCoord {
        if self == target { xyz } else { xyz.flip_y() }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognized tile format '{0}'")]
pub struct UnknownFormat(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Format {
    Png,
    Jpeg,
    Webp,
    Gif,
    Mvt,
    Json,
}

impl Format {
    /// Parses a configuration or metadata name such as `png`, `jpg` or `pbf`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value.trim().to_ascii_lowercase().as_str() {
            "pbf" | "mvt" => Self::Mvt,
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "gif" => Self::Gif,
            "webp" => Self::Webp,
            "json" | "geojson" => Self::Json,
            _ => None?,
        })
    }

    /// Parses a media type, ignoring any parameters after `;`.
    #[must_use]
    pub fn from_media_type(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or_default().trim();
        Some(match essence.to_ascii_lowercase().as_str() {
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/webp" => Self::Webp,
            "image/gif" => Self::Gif,
            "application/x-protobuf"
            | "application/vnd.mapbox-vector-tile"
            | "application/vnd.mapbox-vector-tile+protobuf" => Self::Mvt,
            "application/json" => Self::Json,
            _ => None?,
        })
    }

    /// Accepts either a short name or a media type.
    #[must_use]
    pub fn parse_any(value: &str) -> Option<Self> {
        Self::parse(value).or_else(|| Self::from_media_type(value))
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Json => "application/json",
            Self::Mvt => "application/x-protobuf",
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Json => "json",
            Self::Mvt => "pbf",
        }
    }

    #[must_use]
    pub fn is_raster(self) -> bool {
        match self {
            Self::Png | Self::Jpeg | Self::Webp | Self::Gif => true,
            Self::Mvt | Self::Json => false,
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_any(s).ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

impl TryFrom<String> for Format {
    type Error = UnknownFormat;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Format> for String {
    fn from(value: Format) -> Self {
        value.to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Uncompressed,
    Gzip,
    Zlib,
    Zstd,
}

impl Encoding {
    #[must_use]
    pub fn content_encoding(self) -> Option<&'static str> {
        match self {
            Self::Gzip => Some("gzip"),
            Self::Zlib => Some("deflate"),
            Self::Zstd => Some("zstd"),
            Self::Uncompressed => None,
        }
    }

    #[must_use]
    pub fn is_encoded(self) -> bool {
        self != Self::Uncompressed
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileInfo {
    pub format: Format,
    pub encoding: Encoding,
}

impl TileInfo {
    #[must_use]
    pub fn new(format: Format, encoding: Encoding) -> Self {
        Self { format, encoding }
    }

    /// Guesses the tile format and compression from its leading bytes.
    /// Compressed payloads are assumed to hold vector tiles.
    #[must_use]
    pub fn detect(data: &[u8]) -> Option<Self> {
        let (format, encoding) = match data {
            v if v.starts_with(b"\x1f\x8b") => (Format::Mvt, Encoding::Gzip),
            v if v.starts_with(b"\x78\x9c")
                || v.starts_with(b"\x78\x01")
                || v.starts_with(b"\x78\xda") =>
            {
                (Format::Mvt, Encoding::Zlib)
            }
            v if v.starts_with(b"\x28\xb5\x2f\xfd") => (Format::Mvt, Encoding::Zstd),
            v if v.starts_with(b"\x89\x50\x4E\x47\x0D\x0A\x1A\x0A") => {
                (Format::Png, Encoding::Uncompressed)
            }
            v if v.starts_with(b"GIF87a") || v.starts_with(b"GIF89a") => {
                (Format::Gif, Encoding::Uncompressed)
            }
            v if v.starts_with(b"\xFF\xD8\xFF") => (Format::Jpeg, Encoding::Uncompressed),
            v if v.len() >= 12 && v.starts_with(b"RIFF") && &v[8..12] == b"WEBP" => {
                (Format::Webp, Encoding::Uncompressed)
            }
            v if v.starts_with(b"{") => (Format::Json, Encoding::Uncompressed),
            _ => None?,
        };
        Some(Self::new(format, encoding))
    }
}
