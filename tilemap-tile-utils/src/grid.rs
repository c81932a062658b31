//! Web Mercator grid math: tile extents, resolutions, and mapping a map request onto tiles.

use std::f64::consts::PI;

use crate::{
    EARTH_CIRCUMFERENCE, EARTH_RADIUS, MAX_ZOOM, MERCATOR_HALF_EXTENT, REFERENCE_TILE_SIZE,
    TileCoord, TileRect, tile_count,
};

/// OGC standardized rendering pixel size, in meters.
pub const STANDARD_PIXEL_SIZE: f64 = 0.000_28;

/// Latitude where the Web Mercator square world ends.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// An axis-aligned extent in Web Mercator meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bbox {
    #[must_use]
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The full Web Mercator square.
    #[must_use]
    pub fn world() -> Self {
        Self::new(
            -MERCATOR_HALF_EXTENT,
            -MERCATOR_HALF_EXTENT,
            MERCATOR_HALF_EXTENT,
            MERCATOR_HALF_EXTENT,
        )
    }

    /// Parses `minx,miny,maxx,maxy`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split(',').map(|v| v.trim().parse::<f64>());
        let bbox = Self::new(
            parts.next()?.ok()?,
            parts.next()?.ok()?,
            parts.next()?.ok()?,
            parts.next()?.ok()?,
        );
        if parts.next().is_some() {
            return None;
        }
        Some(bbox)
    }

    /// True when all values are finite and the box has a positive area.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x < self.max_x
            && self.min_y < self.max_y
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let res = Self::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        res.is_valid().then_some(res)
    }

    /// Converts a WGS84 `[west, south, east, north]` extent into Web Mercator.
    #[must_use]
    pub fn from_wgs84(west: f64, south: f64, east: f64, north: f64) -> Self {
        let (min_x, min_y) = wgs84_to_webmercator(west, south);
        let (max_x, max_y) = wgs84_to_webmercator(east, north);
        Self::new(min_x, min_y, max_x, max_y)
    }

    /// Returns `[west, south, east, north]` in degrees.
    #[must_use]
    pub fn to_wgs84(&self) -> [f64; 4] {
        let (west, south) = webmercator_to_wgs84(self.min_x, self.min_y);
        let (east, north) = webmercator_to_wgs84(self.max_x, self.max_y);
        [west, south, east, north]
    }
}

#[must_use]
pub fn wgs84_to_webmercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = lon.to_radians() * EARTH_RADIUS;
    let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
    (x, y)
}

#[must_use]
pub fn webmercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}

/// Width of one tile in meters at `zoom`.
#[must_use]
pub fn tile_span(zoom: u8) -> f64 {
    EARTH_CIRCUMFERENCE / f64::from(tile_count(zoom))
}

/// Mercator extent of a tile whose row is counted from the north.
#[must_use]
pub fn tile_bbox(xyz: TileCoord) -> Bbox {
    let span = tile_span(xyz.z);
    let min_x = -MERCATOR_HALF_EXTENT + f64::from(xyz.x) * span;
    let max_y = MERCATOR_HALF_EXTENT - f64::from(xyz.y) * span;
    Bbox::new(min_x, max_y - span, min_x + span, max_y)
}

/// Meters per pixel at `zoom` for tiles of `tile_size` pixels.
#[must_use]
pub fn resolution(zoom: u8, tile_size: u32) -> f64 {
    tile_span(zoom) / f64::from(tile_size)
}

/// OGC scale denominator of a zoom level, as advertised in a `TileMatrix`.
#[must_use]
pub fn scale_denominator(zoom: u8, tile_size: u32) -> f64 {
    resolution(zoom, tile_size) / STANDARD_PIXEL_SIZE
}

/// Picks the zoom whose reference 256px grid best matches the horizontal ground
/// resolution of a `width`-pixel rendering of `bbox`.
///
/// The fractional level `log2(circumference / (256 * res))` is rounded to the
/// nearest integer with halves going to the coarser zoom, then clamped to
/// `[min_zoom, max_zoom]`.
#[must_use]
pub fn select_zoom(bbox: &Bbox, width: u32, min_zoom: u8, max_zoom: u8) -> u8 {
    let max_zoom = max_zoom.min(MAX_ZOOM);
    let min_zoom = min_zoom.min(max_zoom);
    let res = bbox.width() / f64::from(width.max(1));
    let level = (EARTH_CIRCUMFERENCE / (f64::from(REFERENCE_TILE_SIZE) * res)).log2();
    if !level.is_finite() {
        return if level > 0.0 { max_zoom } else { min_zoom };
    }
    let rounded = (level - 0.5).ceil();
    if rounded <= f64::from(min_zoom) {
        min_zoom
    } else if rounded >= f64::from(max_zoom) {
        max_zoom
    } else {
        // bounded by max_zoom above
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let zoom = rounded as u8;
        zoom
    }
}

/// Tiles at `zoom` touched by `bbox`, rows counted from the north.
/// Returns `None` when the box lies outside the Web Mercator square.
#[must_use]
pub fn covering_tiles(bbox: &Bbox, zoom: u8) -> Option<TileRect> {
    let area = bbox.intersection(&Bbox::world())?;
    let span = tile_span(zoom);
    let last = f64::from(tile_count(zoom) - 1);
    let index = |v: f64| -> u32 {
        // clamped to the grid
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let idx = v.clamp(0.0, last) as u32;
        idx
    };
    let min_x = index(((area.min_x + MERCATOR_HALF_EXTENT) / span).floor());
    let max_x = index(((area.max_x + MERCATOR_HALF_EXTENT) / span).ceil() - 1.0);
    let min_y = index(((MERCATOR_HALF_EXTENT - area.max_y) / span).floor());
    let max_y = index(((MERCATOR_HALF_EXTENT - area.min_y) / span).ceil() - 1.0);
    Some(TileRect::new(
        zoom,
        min_x,
        min_y,
        max_x.max(min_x),
        max_y.max(min_y),
    ))
}
