use std::fmt::{Debug, Formatter};

use async_trait::async_trait;
use deadpool_postgres::tokio_postgres::{Client, Config, NoTls};
use tilejson::Bounds;
use tilemap_tile_utils::{Format, REFERENCE_TILE_SIZE, RowConvention, TileCoord};
use tracing::{debug, info, trace, warn};

use crate::config::{SourceConfig, SourceType};
use crate::tiles::postgis::{PostgisError, PostgisResult, TableQuery};
use crate::tiles::{
    BoxedSource, DEFAULT_SRS, DEFAULT_ZOOM_RANGE, Source, SourceInfo, Tile, TileResult,
};

/// Vector tile source generating tiles on demand from a `PostGIS` table.
///
/// Each tile request opens a fresh connection, so the source holds no database state.
#[derive(Clone)]
pub struct PostgisSource {
    config: Config,
    query: TableQuery,
    info: SourceInfo,
}

#[expect(clippy::missing_fields_in_debug)]
impl Debug for PostgisSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgisSource")
            .field("id", &self.info.id)
            .field("query", &self.query.tile)
            .finish()
    }
}

impl PostgisSource {
    /// Parses the connection string and prepares the table queries.
    ///
    /// With `postgis.calc_bounds` enabled, the table extent is queried once.
    pub async fn new(cfg: &SourceConfig) -> PostgisResult<Self> {
        if let Some(format) = cfg.format
            && format != Format::Mvt
        {
            return Err(PostgisError::UnsupportedFormat(cfg.id.clone(), format));
        }
        let pg = cfg.postgis.clone().unwrap_or_default();
        let query = TableQuery::new(&cfg.id, &pg)?;
        let config: Config = cfg
            .location
            .parse()
            .map_err(|e| PostgisError::BadConnectionString(e, cfg.id.clone()))?;

        let mut bounds = cfg.bounds;
        if bounds.is_none() && pg.calc_bounds.unwrap_or(false) {
            debug!("Computing table bounds for {}", cfg.id);
            bounds = calc_bounds(&config, &query).await?;
        }

        let (min_zoom, max_zoom) = DEFAULT_ZOOM_RANGE;
        let info = SourceInfo {
            id: cfg.id.clone(),
            source_type: SourceType::Postgis,
            location: cfg.location.clone(),
            format: Format::Mvt,
            title: cfg.title.clone().unwrap_or_else(|| cfg.id.clone()),
            abstract_text: cfg.abstract_text.clone().unwrap_or_default(),
            attribution: cfg.attribution.clone(),
            row_convention: RowConvention::from_tms(cfg.tms.unwrap_or(true)),
            min_zoom: cfg.min_zoom.unwrap_or(min_zoom),
            max_zoom: cfg.max_zoom.unwrap_or(max_zoom),
            srs: cfg.srs.clone().unwrap_or_else(|| DEFAULT_SRS.to_string()),
            tile_width: cfg.tile_width.unwrap_or(REFERENCE_TILE_SIZE),
            tile_height: cfg.tile_height.unwrap_or(REFERENCE_TILE_SIZE),
            bounds,
        };

        info!(
            "Source {} reads table {} as {} tiles, zoom {}..{}, {:?} rows",
            info.id,
            pg.table.as_deref().unwrap_or_default(),
            info.format,
            info.min_zoom,
            info.max_zoom,
            info.row_convention
        );

        Ok(Self {
            config,
            query,
            info,
        })
    }

    /// The generated table queries.
    #[must_use]
    pub fn query(&self) -> &TableQuery {
        &self.query
    }
}

async fn connect(config: &Config) -> PostgisResult<Client> {
    let (client, connection) = config
        .connect(NoTls)
        .await
        .map_err(|e| PostgisError::PostgresError(e, "connecting to the database"))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            warn!("Postgres connection error: {e}");
        }
    });
    Ok(client)
}

async fn calc_bounds(config: &Config, query: &TableQuery) -> PostgisResult<Option<Bounds>> {
    let client = connect(config).await?;
    let row = client
        .query_one(&query.bounds, &[])
        .await
        .map_err(|e| PostgisError::PostgresError(e, "querying table bounds"))?;
    let value = |idx: usize| {
        row.try_get::<_, Option<f64>>(idx)
            .map_err(|e| PostgisError::PostgresError(e, "reading table bounds"))
    };
    Ok(match (value(0)?, value(1)?, value(2)?, value(3)?) {
        (Some(left), Some(bottom), Some(right), Some(top)) => {
            Some(Bounds::new(left, bottom, right, top))
        }
        _ => None,
    })
}

#[async_trait]
impl Source for PostgisSource {
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
        let tile = self.info.row_convention.convert_to(RowConvention::Xyz, xyz);
        let (Ok(x), Ok(y)) = (i32::try_from(tile.x), i32::try_from(tile.y)) else {
            return Ok(None);
        };

        let client = connect(&self.config).await?;
        let row = client
            .query_opt(
                &self.query.tile,
                &[&i32::from(tile.z), &x, &y, &self.info.id],
            )
            .await
            .map_err(|e| PostgisError::GetTileError(e, self.info.id.clone(), xyz))?;
        let data = match row {
            Some(row) => row
                .try_get::<_, Option<Vec<u8>>>(0)
                .map_err(|e| PostgisError::GetTileError(e, self.info.id.clone(), xyz))?,
            None => None,
        };

        match data.filter(|v| !v.is_empty()) {
            Some(data) => Ok(Some(Tile::new(data, self.info.format))),
            None => {
                trace!("No features in {xyz} of {}", self.info.id);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PostgisConfig;
    use crate::tiles::TileError;

    fn unreachable_config() -> SourceConfig {
        let mut cfg = SourceConfig::new(
            "roads",
            SourceType::Postgis,
            "host=127.0.0.1 port=1 user=postgres dbname=postgres connect_timeout=2",
        );
        cfg.postgis = Some(PostgisConfig {
            table: Some("roads".to_string()),
            geometry: Some("geom".to_string()),
            ..Default::default()
        });
        cfg.min_zoom = Some(2);
        cfg.max_zoom = Some(4);
        cfg
    }

    #[actix_rt::test]
    async fn defaults() {
        let src = PostgisSource::new(&unreachable_config()).await.unwrap();
        let info = src.get_info();
        assert_eq!(info.format, Format::Mvt);
        assert_eq!(info.title, "roads");
        assert_eq!(info.row_convention, RowConvention::Tms);
        assert_eq!((info.min_zoom, info.max_zoom), (2, 4));
        assert_eq!((info.tile_width, info.tile_height), (256, 256));
    }

    #[actix_rt::test]
    async fn out_of_range_never_connects() {
        let src = PostgisSource::new(&unreachable_config()).await.unwrap();
        for xyz in [
            TileCoord { z: 1, x: 0, y: 0 },
            TileCoord { z: 5, x: 0, y: 0 },
            TileCoord { z: 2, x: 4, y: 0 },
            TileCoord { z: 2, x: 0, y: 4 },
        ] {
            assert_eq!(src.get_tile(xyz).await.unwrap(), None, "{xyz}");
        }
    }

    #[actix_rt::test]
    async fn backend_failure_is_an_error() {
        let src = PostgisSource::new(&unreachable_config()).await.unwrap();
        let err = src.get_tile(TileCoord { z: 2, x: 1, y: 1 }).await.unwrap_err();
        assert!(matches!(err, TileError::PostgisError(_)), "{err:?}");
    }

    #[actix_rt::test]
    async fn format_is_always_vector() {
        let mut cfg = unreachable_config();
        cfg.format = Some(Format::Mvt);
        let src = PostgisSource::new(&cfg).await.unwrap();
        assert_eq!(src.get_info().format, Format::Mvt);

        cfg.format = Some(Format::Png);
        let err = PostgisSource::new(&cfg).await.unwrap_err();
        assert!(
            matches!(err, PostgisError::UnsupportedFormat(ref id, Format::Png) if id == "roads"),
            "{err:?}"
        );
    }

    #[actix_rt::test]
    async fn table_is_required() {
        let mut cfg = unreachable_config();
        cfg.postgis = None;
        let err = PostgisSource::new(&cfg).await.unwrap_err();
        assert!(matches!(err, PostgisError::MissingTable(id) if id == "roads"));
    }

    #[actix_rt::test]
    async fn bad_connection_string() {
        let mut cfg = unreachable_config();
        cfg.location = "host=localhost port=notaport".to_string();
        let err = PostgisSource::new(&cfg).await.unwrap_err();
        assert!(matches!(err, PostgisError::BadConnectionString(..)));
    }
}
