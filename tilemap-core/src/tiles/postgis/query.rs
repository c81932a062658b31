//! SQL generation for table based vector tiles.

use postgres_protocol::escape::escape_identifier;

use crate::config::PostgisConfig;
use crate::tiles::postgis::{PostgisError, PostgisResult};

const WEB_MERCATOR_SRID: i32 = 3857;

/// Queries of one `PostGIS` table, built once during source initialization.
///
/// `tile` takes `$1` zoom, `$2` column and `$3` row (counted from the north) as
/// integers, plus `$4` as the layer name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableQuery {
    /// Tile query returning one `bytea` row.
    pub tile: String,
    /// Query returning `xmin, ymin, xmax, ymax` of the table in degrees.
    pub bounds: String,
}

impl TableQuery {
    /// Builds the queries for source `id`.
    pub fn new(id: &str, cfg: &PostgisConfig) -> PostgisResult<Self> {
        let table = cfg
            .table
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PostgisError::MissingTable(id.to_string()))?;
        let geometry = cfg
            .geometry
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PostgisError::MissingGeometry(id.to_string()))?;

        let table = escape_table(id, table)?;
        let geometry = escape_identifier(geometry);
        let srid = cfg.srid.unwrap_or(WEB_MERCATOR_SRID);

        let fields = cfg
            .fields
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| format!(", {}", escape_identifier(v)))
            .collect::<String>();

        let envelope = "ST_TileEnvelope($1::integer, $2::integer, $3::integer)";
        let (geom_3857, search) = if srid == WEB_MERCATOR_SRID {
            (geometry.clone(), envelope.to_string())
        } else {
            (
                format!("ST_Transform({geometry}, {WEB_MERCATOR_SRID})"),
                format!("ST_Transform({envelope}, {srid})"),
            )
        };

        let tile = format!(
            r"
WITH mvtgeom AS (
  SELECT
    ST_AsMVTGeom({geom_3857}, {envelope}) AS geom
    {fields}
  FROM
    {table}
  WHERE
    ST_Intersects({geometry}, {search})
)
SELECT ST_AsMVT(mvtgeom.*, $4::text) FROM mvtgeom;
"
        )
        .trim()
        .to_string();

        let bounds = format!(
            r"
WITH extent AS (
  SELECT ST_Transform(ST_SetSRID(ST_Extent({geometry})::geometry, {srid}), 4326) AS e FROM {table}
)
SELECT ST_XMin(e), ST_YMin(e), ST_XMax(e), ST_YMax(e) FROM extent;
"
        )
        .trim()
        .to_string();

        Ok(Self { tile, bounds })
    }
}

fn escape_table(id: &str, table: &str) -> PostgisResult<String> {
    let parts: Vec<&str> = table.split('.').map(str::trim).collect();
    if parts.len() > 2 || parts.iter().any(|v| v.is_empty()) {
        return Err(PostgisError::InvalidTableName(id.to_string(), table.to_string()));
    }
    Ok(parts
        .into_iter()
        .map(escape_identifier)
        .collect::<Vec<_>>()
        .join("."))
}
