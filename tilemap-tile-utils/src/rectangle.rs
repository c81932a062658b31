//! Rectangles of tiles at a single zoom level.
//!
//! A map request covers a rectangular block of tiles. `TileRect` keeps that block
//! together with its zoom so it can be clamped, tested and iterated row by row.

use std::fmt::{Display, Formatter};

use crate::{TileCoord, tile_count};

/// A rectangular region in tile coordinate space.
///
/// The rectangle is inclusive of both min and max coordinates. Rows are counted
/// from the northern edge.
///
/// # Examples
///
/// ```
/// # use tilemap_tile_utils::TileRect;
/// let rect = TileRect::new(10, 0, 0, 255, 255);
/// assert_eq!(rect.size(), 256 * 256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    /// The zoom level of the tiles
    pub zoom: u8,
    /// The minimum X coordinate (inclusive)
    pub min_x: u32,
    /// The minimum Y coordinate (inclusive)
    pub min_y: u32,
    /// The maximum X coordinate (inclusive)
    pub max_x: u32,
    /// The maximum Y coordinate (inclusive)
    pub max_y: u32,
}

impl Display for TileRect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: ({},{}) - ({},{})",
            self.zoom, self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl TileRect {
    /// Creates a new `TileRect` with the specified coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `min_x > max_x` or `min_y > max_y`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tilemap_tile_utils::TileRect;
    /// let rect = TileRect::new(0, 0, 0, 1, 1);
    /// assert_eq!(rect.size(), 4);
    /// ```
    #[must_use]
    pub fn new(zoom: u8, min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        assert!(min_x <= max_x);
        assert!(min_y <= max_y);
        Self {
            zoom,
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The whole grid at `zoom`.
    #[must_use]
    pub fn world(zoom: u8) -> Self {
        let last = tile_count(zoom) - 1;
        Self::new(zoom, 0, 0, last, last)
    }

    /// Checks if two rectangles overlap.
    ///
    /// Two rectangles overlap if
    /// - they share the same zoom level and
    /// - their coordinate ranges intersect in both X and Y dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tilemap_tile_utils::TileRect;
    /// let rect1 = TileRect::new(0, 0, 0, 1, 1);
    /// let rect2 = TileRect::new(0, 1, 1, 2, 2);
    /// assert!(rect1.is_overlapping(&rect2));
    ///
    /// let rect3 = TileRect::new(0, 2, 2, 3, 3);
    /// assert!(!rect1.is_overlapping(&rect3));
    /// ```
    #[must_use]
    pub fn is_overlapping(&self, other: &Self) -> bool {
        self.zoom == other.zoom
            && self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// The common part of two rectangles, if any.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.is_overlapping(other) {
            return None;
        }
        Some(Self::new(
            self.zoom,
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        ))
    }

    #[must_use]
    pub fn contains(&self, xyz: TileCoord) -> bool {
        xyz.z == self.zoom
            && (self.min_x..=self.max_x).contains(&xyz.x)
            && (self.min_y..=self.max_y).contains(&xyz.y)
    }

    /// Total number of tiles contained in this rectangle.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tilemap_tile_utils::TileRect;
    /// // x = 0..=2 => 3 tiles
    /// // y = 0..=3 => 4 tiles
    /// let rect = TileRect::new(0, 0, 0, 2, 3);
    /// assert_eq!(rect.size(), 3 * 4);
    /// ```
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::from(self.max_x - self.min_x + 1) * u64::from(self.max_y - self.min_y + 1)
    }

    /// Iterates the tiles row by row, north to south, west to east.
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + use<> {
        let Self {
            zoom,
            min_x,
            min_y,
            max_x,
            max_y,
        } = *self;
        (min_y..=max_y).flat_map(move |y| (min_x..=max_x).map(move |x| TileCoord { z: zoom, x, y }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_clamps_to_both() {
        let a = TileRect::new(3, 0, 0, 4, 4);
        let b = TileRect::new(3, 2, 3, 7, 7);
        assert_eq!(a.intersection(&b), Some(TileRect::new(3, 2, 3, 4, 4)));
        assert_eq!(
            a.intersection(&TileRect::new(3, 5, 5, 6, 6)),
            None,
            "disjoint rectangles"
        );
        assert_eq!(a.intersection(&TileRect::new(4, 0, 0, 1, 1)), None, "other zoom");
    }

    #[test]
    fn tiles_in_row_order() {
        let rect = TileRect::new(1, 0, 0, 1, 1);
        let tiles: Vec<_> = rect.tiles().map(|t| (t.x, t.y)).collect();
        assert_eq!(tiles, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
        assert_eq!(rect.tiles().count() as u64, rect.size());
    }

    #[test]
    fn world_covers_grid() {
        let world = TileRect::world(2);
        assert_eq!(world.size(), 16);
        assert!(world.contains(TileCoord { z: 2, x: 3, y: 3 }));
        assert!(!world.contains(TileCoord { z: 1, x: 0, y: 0 }));
    }

    #[test]
    #[should_panic(expected = "min_x <= max_x")]
    fn inverted_rect_panics() {
        let _ = TileRect::new(1, 1, 0, 0, 0);
    }
}
