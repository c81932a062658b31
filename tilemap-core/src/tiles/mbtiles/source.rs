//! `MBTiles` tile source implementation.

use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mbtiles::sqlx::SqliteConnection;
use mbtiles::sqlx::error::DatabaseError;
use mbtiles::{MbtError, Mbtiles, Metadata, compute_min_max_zoom};
use tilemap_tile_utils::{Format, REFERENCE_TILE_SIZE, RowConvention, TileCoord, TileInfo};
use tokio::time::{Duration, sleep};
use tracing::{info, trace, warn};

use crate::config::{SourceConfig, SourceType};
use crate::tiles::imaging::tile_dimensions;
use crate::tiles::mbtiles::MbtilesError;
use crate::tiles::source::decode_vector_tile;
use crate::tiles::{
    BoxedSource, DEFAULT_SRS, DEFAULT_ZOOM_RANGE, Source, SourceInfo, Tile, TileResult,
};

/// Tile source that reads from an `MBTiles` file.
///
/// The file stores rows counted from the south. Every tile read opens its own
/// read-only connection.
#[derive(Clone)]
pub struct MbtSource {
    mbtiles: Mbtiles,
    info: SourceInfo,
}

#[expect(clippy::missing_fields_in_debug)]
impl Debug for MbtSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MbtSource")
            .field("id", &self.info.id)
            .field("path", &self.mbtiles.filepath())
            .finish()
    }
}

impl MbtSource {
    /// Opens the file at `cfg.location` and merges its metadata into the configuration.
    pub async fn new(cfg: &SourceConfig) -> Result<Self, MbtilesError> {
        let path = PathBuf::from(&cfg.location);
        let mbt = Mbtiles::new(&path)?;
        let mut conn = mbt
            .open_readonly()
            .await
            .map_err(|e| MbtilesError::AcquireConnError(e, path.clone()))?;

        let meta = read_metadata(&mbt, &mut conn, &path).await?;
        let any_tile = mbt.get_any_tile(&mut conn).await?;

        let tj = &meta.tilejson;
        let format = cfg
            .format
            .or(meta.format)
            .or_else(|| any_tile.as_deref().and_then(TileInfo::detect).map(|v| v.format))
            .unwrap_or(Format::Png);

        let min_zoom = cfg.min_zoom.or(tj.minzoom);
        let max_zoom = cfg.max_zoom.or(tj.maxzoom);
        let (min_zoom, max_zoom) = match (min_zoom, max_zoom) {
            (Some(min), Some(max)) => (min, max),
            (min, max) => {
                let (tmin, tmax) = compute_min_max_zoom(&mut conn)
                    .await?
                    .unwrap_or(DEFAULT_ZOOM_RANGE);
                (min.unwrap_or(tmin), max.unwrap_or(tmax))
            }
        };

        let dimensions = if format.is_raster() {
            any_tile.as_deref().and_then(tile_dimensions)
        } else {
            None
        };
        let tile_width = cfg
            .tile_width
            .or(dimensions.map(|v| v.0))
            .unwrap_or(REFERENCE_TILE_SIZE);
        let tile_height = cfg
            .tile_height
            .or(dimensions.map(|v| v.1))
            .unwrap_or(tile_width);

        let info = SourceInfo {
            id: cfg.id.clone(),
            source_type: SourceType::Mbtiles,
            location: cfg.location.clone(),
            format,
            title: cfg
                .title
                .clone()
                .or_else(|| tj.name.clone())
                .unwrap_or_else(|| cfg.id.clone()),
            abstract_text: cfg
                .abstract_text
                .clone()
                .or_else(|| tj.description.clone())
                .unwrap_or_default(),
            attribution: cfg.attribution.clone().or_else(|| tj.attribution.clone()),
            row_convention: RowConvention::from_tms(cfg.tms.unwrap_or(true)),
            min_zoom,
            max_zoom,
            srs: cfg.srs.clone().unwrap_or_else(|| DEFAULT_SRS.to_string()),
            tile_width,
            tile_height,
            bounds: cfg.bounds.or(tj.bounds),
        };

        info!(
            "Source {} reads {} as {} tiles, zoom {}..{}, {:?} rows",
            info.id,
            mbt.filepath(),
            info.format,
            info.min_zoom,
            info.max_zoom,
            info.row_convention
        );

        Ok(Self { mbtiles: mbt, info })
    }
}

/// Reads the metadata table, retrying with exponential backoff while the file is locked.
async fn read_metadata(
    mbt: &Mbtiles,
    conn: &mut SqliteConnection,
    path: &Path,
) -> Result<Metadata, MbtilesError> {
    let max_retries = 8;
    let mut attempt = 0;
    loop {
        match mbt.get_metadata(conn).await {
            Ok(meta) => return Ok(meta),
            // SQLITE_BUSY (code: 5)
            Err(MbtError::SqlxError(ref se))
                if se
                    .as_database_error()
                    .and_then(DatabaseError::code)
                    .is_some_and(|code| code == "5") =>
            {
                if attempt >= max_retries {
                    return Err(MbtilesError::InvalidMetadata(
                        format!("SQLite still busy after {max_retries} retries"),
                        path.to_path_buf(),
                    ));
                }
                let delay = Duration::from_millis(50 * (1 << attempt));
                let delay_sec = delay.as_secs_f64();
                warn!(
                    "Database file {} is locked (SQLITE_BUSY). Retrying in {delay_sec:.2}s...",
                    path.display()
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(MbtilesError::InvalidMetadata(
                    err.to_string(),
                    path.to_path_buf(),
                ));
            }
        }
    }
}

#[async_trait]
impl Source for MbtSource {
    fn get_info(&self) -> &SourceInfo {
        &self.info
    }

    fn clone_source(&self) -> BoxedSource {
        Box::new(self.clone())
    }

    async fn get_tile(&self, xyz: TileCoord) -> TileResult<Option<Tile>> {
        if !self.is_valid_zoom(xyz.z)
            || TileCoord::new_checked(xyz.z.into(), xyz.x.into(), xyz.y.into()).is_none()
        {
            return Ok(None);
        }
        let tms = self.info.row_convention.convert_to(RowConvention::Tms, xyz);

        let mut conn = self
            .mbtiles
            .open_readonly()
            .await
            .map_err(|e| MbtilesError::AcquireConnError(e, PathBuf::from(&self.info.location)))?;
        let data = self
            .mbtiles
            .get_tile(&mut conn, tms.z, tms.x, tms.y)
            .await
            .map_err(|e| MbtilesError::GetTileError(e, xyz, self.info.id.clone()))?;

        let Some(data) = data.filter(|v| !v.is_empty()) else {
            trace!("Couldn't find tile data in {xyz} of {}", self.info.id);
            return Ok(None);
        };
        let data = decode_vector_tile(data, self.info.format)
            .map_err(|e| MbtilesError::DecompressError(e, xyz, self.info.id.clone()))?;
        Ok(Some(Tile::new(data, self.info.format)))
    }
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, Rgba, RgbaImage};
    use mbtiles::{create_flat_tables, create_metadata_table};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tilemap_tile_utils::encode_gzip;

    use super::*;
    use crate::tiles::imaging::encode_image;

    async fn fixture(name: &str) -> (TempDir, Mbtiles, SqliteConnection) {
        let dir = tempfile::tempdir().unwrap();
        let mbt = Mbtiles::new(dir.path().join(name)).unwrap();
        let mut conn = mbt.open_or_new().await.unwrap();
        create_metadata_table(&mut conn).await.unwrap();
        create_flat_tables(&mut conn).await.unwrap();
        (dir, mbt, conn)
    }

    fn png(size: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(size, size, Rgba([9, 9, 9, 255])));
        encode_image(&img, Format::Png, 90).unwrap()
    }

    fn config(mbt: &Mbtiles) -> SourceConfig {
        SourceConfig::new("src", SourceType::Mbtiles, mbt.filepath())
    }

    #[actix_rt::test]
    async fn values_discovered_from_file() {
        let (_dir, mbt, mut conn) = fixture("discover.mbtiles").await;
        mbt.set_metadata_value(&mut conn, "name", "Discovered").await.unwrap();
        mbt.set_metadata_value(&mut conn, "attribution", "someone").await.unwrap();
        mbt.set_metadata_value(&mut conn, "bounds", "-10,-10,10,10").await.unwrap();
        mbt.insert_tile(&mut conn, 3, 1, 1, &png(512)).await.unwrap();
        mbt.insert_tile(&mut conn, 5, 1, 1, &png(512)).await.unwrap();
        drop(conn);

        let src = MbtSource::new(&config(&mbt)).await.unwrap();
        let info = src.get_info();
        assert_eq!(info.title, "Discovered");
        assert_eq!(info.attribution.as_deref(), Some("someone"));
        assert_eq!(info.format, Format::Png);
        assert_eq!((info.min_zoom, info.max_zoom), (3, 5));
        assert_eq!((info.tile_width, info.tile_height), (512, 512));
        assert_eq!(info.row_convention, RowConvention::Tms);
        assert_eq!(info.srs, DEFAULT_SRS);
        assert!(info.bounds.is_some());
    }

    #[actix_rt::test]
    async fn configuration_wins_over_metadata() {
        let (_dir, mbt, mut conn) = fixture("config.mbtiles").await;
        mbt.set_metadata_value(&mut conn, "name", "From file").await.unwrap();
        mbt.set_metadata_value(&mut conn, "format", "png").await.unwrap();
        mbt.set_metadata_value(&mut conn, "minzoom", "1").await.unwrap();
        mbt.set_metadata_value(&mut conn, "maxzoom", "9").await.unwrap();
        drop(conn);

        let mut cfg = config(&mbt);
        cfg.title = Some("Configured".to_string());
        cfg.format = Some(Format::Jpeg);
        cfg.max_zoom = Some(4);
        cfg.tms = Some(false);
        let src = MbtSource::new(&cfg).await.unwrap();
        let info = src.get_info();
        assert_eq!(info.title, "Configured");
        assert_eq!(info.format, Format::Jpeg);
        assert_eq!((info.min_zoom, info.max_zoom), (1, 4));
        assert_eq!(info.row_convention, RowConvention::Xyz);
    }

    #[actix_rt::test]
    async fn empty_file_uses_defaults() {
        let (_dir, mbt, conn) = fixture("empty.mbtiles").await;
        drop(conn);
        let src = MbtSource::new(&config(&mbt)).await.unwrap();
        let info = src.get_info();
        assert_eq!(info.title, "src");
        assert_eq!(info.format, Format::Png);
        assert_eq!((info.min_zoom, info.max_zoom), DEFAULT_ZOOM_RANGE);
        assert_eq!((info.tile_width, info.tile_height), (256, 256));
    }

    #[actix_rt::test]
    async fn missing_file_fails() {
        let cfg = SourceConfig::new("src", SourceType::Mbtiles, "/nonexistent/missing.mbtiles");
        assert!(MbtSource::new(&cfg).await.is_err());
    }

    #[actix_rt::test]
    async fn rows_follow_configured_convention() {
        let (_dir, mbt, mut conn) = fixture("rows.mbtiles").await;
        // TMS row 0 at zoom 1 is the southern row
        mbt.insert_tile(&mut conn, 1, 0, 0, &png(4)).await.unwrap();
        drop(conn);

        let tms = MbtSource::new(&config(&mbt)).await.unwrap();
        assert!(tms.get_tile(TileCoord { z: 1, x: 0, y: 0 }).await.unwrap().is_some());
        assert!(tms.get_tile(TileCoord { z: 1, x: 0, y: 1 }).await.unwrap().is_none());

        let mut cfg = config(&mbt);
        cfg.tms = Some(false);
        let xyz = MbtSource::new(&cfg).await.unwrap();
        assert!(xyz.get_tile(TileCoord { z: 1, x: 0, y: 1 }).await.unwrap().is_some());
        assert!(xyz.get_tile(TileCoord { z: 1, x: 0, y: 0 }).await.unwrap().is_none());
    }

    #[actix_rt::test]
    async fn tiles_outside_range_are_absent() {
        let (_dir, mbt, mut conn) = fixture("range.mbtiles").await;
        mbt.insert_tile(&mut conn, 2, 0, 0, &png(4)).await.unwrap();
        drop(conn);
        let mut cfg = config(&mbt);
        cfg.min_zoom = Some(2);
        cfg.max_zoom = Some(2);
        let src = MbtSource::new(&cfg).await.unwrap();
        assert!(src.get_tile(TileCoord { z: 1, x: 0, y: 0 }).await.unwrap().is_none());
        assert!(src.get_tile(TileCoord { z: 2, x: 4, y: 0 }).await.unwrap().is_none());
        assert!(src.get_tile(TileCoord { z: 2, x: 0, y: 0 }).await.unwrap().is_some());
    }

    #[actix_rt::test]
    async fn gzipped_vector_tiles_are_decoded() {
        let (_dir, mbt, mut conn) = fixture("vector.mbtiles").await;
        let raw = vec![0x1a, 0x03, 0x0a, 0x01, 0x61];
        mbt.set_metadata_value(&mut conn, "format", "pbf").await.unwrap();
        mbt.insert_tile(&mut conn, 0, 0, 0, &encode_gzip(&raw).unwrap())
            .await
            .unwrap();
        drop(conn);
        let src = MbtSource::new(&config(&mbt)).await.unwrap();
        assert_eq!(src.get_info().format, Format::Mvt);
        let tile = src.get_tile(TileCoord { z: 0, x: 0, y: 0 }).await.unwrap().unwrap();
        assert_eq!(tile, Tile::new(raw, Format::Mvt));
    }
}
