use sqlx::{Executor as _, Row as _, SqliteExecutor, query};
use tilemap_tile_utils::MAX_ZOOM;
use tracing::debug;

use crate::MbtError::InvalidZoomValue;
use crate::errors::MbtResult;

pub async fn create_metadata_table<T>(conn: &mut T) -> MbtResult<()>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    debug!("Creating metadata table if it doesn't already exist");
    conn.execute(
        "CREATE TABLE IF NOT EXISTS metadata (
             name text NOT NULL PRIMARY KEY,
             value text);",
    )
    .await?;

    Ok(())
}

/// Creates the `tiles` table with a unique index on the tile address.
pub async fn create_flat_tables<T>(conn: &mut T) -> MbtResult<()>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    debug!("Creating if needed flat table: tiles(z,x,y,data)");
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tiles (
             zoom_level integer NOT NULL,
             tile_column integer NOT NULL,
             tile_row integer NOT NULL,
             tile_data blob);
         CREATE UNIQUE INDEX IF NOT EXISTS tile_index
             ON tiles (zoom_level, tile_column, tile_row);",
    )
    .await?;

    Ok(())
}

fn validate_zoom(zoom: Option<i64>, zoom_name: &'static str) -> MbtResult<Option<u8>> {
    if let Some(zoom) = zoom {
        let z = u8::try_from(zoom).ok().filter(|v| *v <= MAX_ZOOM);
        if z.is_none() {
            Err(InvalidZoomValue(zoom_name, zoom.to_string()))
        } else {
            Ok(z)
        }
    } else {
        Ok(None)
    }
}

/// Compute min and max zoom levels from the `tiles` table
pub async fn compute_min_max_zoom<T>(conn: &mut T) -> MbtResult<Option<(u8, u8)>>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let info = query(
        "
SELECT min(zoom_level) AS min_zoom,
       max(zoom_level) AS max_zoom
FROM tiles;",
    )
    .fetch_one(conn)
    .await?;

    let min_zoom = validate_zoom(info.try_get("min_zoom")?, "zoom_level")?;
    let max_zoom = validate_zoom(info.try_get("max_zoom")?, "zoom_level")?;

    match (min_zoom, max_zoom) {
        (Some(min_zoom), Some(max_zoom)) => Ok(Some((min_zoom, max_zoom))),
        _ => Ok(None),
    }
}
