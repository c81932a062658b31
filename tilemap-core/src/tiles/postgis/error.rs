use deadpool_postgres::tokio_postgres::Error as TokioPgError;
use tilemap_tile_utils::{Format, TileCoord};

/// A convenience [`Result`] for `PostGIS` sources.
pub type PostgisResult<T> = Result<T, PostgisError>;

/// Errors that can occur while generating vector tiles with `PostGIS`.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum PostgisError {
    /// The source has no `postgis.table` setting.
    #[error("PostGIS source {0} has no table configured")]
    MissingTable(String),

    /// The source has no `postgis.geometry` setting.
    #[error("PostGIS source {0} has no geometry column configured")]
    MissingGeometry(String),

    /// The configured table name is empty or has too many parts.
    #[error("PostGIS source {0} has an invalid table name {1:?}")]
    InvalidTableName(String, String),

    /// `PostGIS` sources always produce vector tiles.
    #[error("PostGIS source {0} produces vector tiles, {1} cannot be configured as its format")]
    UnsupportedFormat(String, Format),

    /// The location is not a valid connection string.
    #[error("Unable to parse connection string of source {1}: {0}")]
    BadConnectionString(#[source] TokioPgError, String),

    /// Generic database error with a description of the failed step.
    #[error("Postgres error while {1}: {0}")]
    PostgresError(#[source] TokioPgError, &'static str),

    /// Tile query failed.
    #[error(r"Unable to get tile {2:#} from {1}: {0}")]
    GetTileError(#[source] TokioPgError, String, TileCoord),
}
