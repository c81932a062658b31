use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tilemap_tile_utils::{Format, REFERENCE_TILE_SIZE, RowConvention, TileCoord, tile_count};
use tracing::{info, trace};

use crate::config::{SourceConfig, SourceType};
use crate::tiles::imaging::tile_dimensions;
use crate::tiles::source::decode_vector_tile;
use crate::tiles::{
    BoxedSource, DEFAULT_SRS, DEFAULT_ZOOM_RANGE, Source, SourceInfo, Tile, TileResult,
};

/// Number of tiles inspected when probing the tile size.
const MAX_PROBES: u32 = 16;

/// Errors of templated file sources.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum FileError {
    /// The template has no `{z}`, `{x}` or row placeholder.
    #[error("Path template {1} of source {0} must contain {{z}}, {{x}} and {{y}} or {{-y}}")]
    InvalidTemplate(String, String),

    /// No format was configured and the template has no known extension.
    #[error("Unable to determine the tile format of source {0}, set format explicitly")]
    UnknownFormat(String),

    /// Reading a tile file failed.
    #[error("Unable to read tile file {}: {}", .1.display(), .0)]
    IoError(#[source] std::io::Error, PathBuf),
}

/// A tile path with `{z}`, `{x}`, `{y}` or `{-y}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathTemplate(String);

impl PathTemplate {
    /// Validates that all placeholders are present.
    pub fn new(id: &str, template: &str) -> Result<Self, FileError> {
        let has_row = template.contains("{y}") || template.contains("{-y}");
        if !template.contains("{z}") || !template.contains("{x}") || !has_row {
            return Err(FileError::InvalidTemplate(id.to_string(), template.to_string()));
        }
        Ok(Self(template.to_string()))
    }

    /// Path of one tile. `xyz.y` is the row in the template's own numbering, `{-y}`
    /// receives the opposite one.
    #[must_use]
    pub fn resolve(&self, xyz: TileCoord) -> PathBuf {
        let flipped = xyz.flip_y();
        PathBuf::from(
            self.0
                .replace("{z}", &xyz.z.to_string())
                .replace("{x}", &xyz.x.to_string())
                .replace("{-y}", &flipped.y.to_string())
                .replace("{y}", &xyz.y.to_string()),
        )
    }

    /// Format derived from the file extension.
    #[must_use]
    pub fn format(&self) -> Option<Format> {
        Path::new(&self.0)
            .extension()
            .and_then(|v| v.to_str())
            .and_then(Format::parse)
    }
}

/// Tile source reading individual files.
#[derive(Clone, Debug)]
pub struct FileSource {
    template: PathTemplate,
    info: SourceInfo,
}

impl FileSource {
    /// Creates a source from a path template in `cfg.location`.
    pub async fn new(cfg: &SourceConfig) -> Result<Self, FileError> {
        let template = PathTemplate::new(&cfg.id, &cfg.location)?;
        let format = cfg
            .format
            .or_else(|| template.format())
            .ok_or_else(|| FileError::UnknownFormat(cfg.id.clone()))?;
        let (min_zoom, max_zoom) = DEFAULT_ZOOM_RANGE;
        let min_zoom = cfg.min_zoom.unwrap_or(min_zoom);
        let row_convention = RowConvention::from_tms(cfg.tms.unwrap_or(false));

        let needs_probe = cfg.tile_width.is_none() || cfg.tile_height.is_none();
        let dimensions = if format.is_raster() && needs_probe {
            probe_dimensions(&template, min_zoom).await
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
            source_type: SourceType::File,
            location: cfg.location.clone(),
            format,
            title: cfg.title.clone().unwrap_or_else(|| cfg.id.clone()),
            abstract_text: cfg.abstract_text.clone().unwrap_or_default(),
            attribution: cfg.attribution.clone(),
            row_convention,
            min_zoom,
            max_zoom: cfg.max_zoom.unwrap_or(max_zoom),
            srs: cfg.srs.clone().unwrap_or_else(|| DEFAULT_SRS.to_string()),
            tile_width,
            tile_height,
            bounds: cfg.bounds,
        };

        info!(
            "Source {} reads {} as {} tiles, zoom {}..{}, {:?} rows",
            info.id, info.location, info.format, info.min_zoom, info.max_zoom, info.row_convention
        );

        Ok(Self { template, info })
    }
}

/// Looks for any existing tile at `zoom` and reads its size.
async fn probe_dimensions(template: &PathTemplate, zoom: u8) -> Option<(u32, u32)> {
    let count = tile_count(zoom).min(MAX_PROBES);
    for x in 0..count {
        for y in 0..count {
            let path = template.resolve(TileCoord { z: zoom, x, y });
            if let Ok(data) = tokio::fs::read(&path).await
                && let Some(dims) = tile_dimensions(&data)
            {
                return Some(dims);
            }
        }
    }
    None
}

#[async_trait]
impl Source for FileSource {
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
        let path = self.template.resolve(xyz);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!("No tile file {} for {xyz} of {}", path.display(), self.info.id);
                return Ok(None);
            }
            Err(e) => return Err(FileError::IoError(e, path).into()),
        };
        let data = decode_vector_tile(data, self.info.format)
            .map_err(|e| FileError::IoError(e, path))?;
        Ok(Some(Tile::new(data, self.info.format)))
    }
}
