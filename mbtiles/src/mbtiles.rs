use std::ffi::OsStr;
use std::fmt::{Display, Formatter};
use std::path::Path;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection as _, Row as _, SqliteConnection, SqliteExecutor, query};
use tilemap_tile_utils::is_valid_tile;
use tracing::debug;

use crate::errors::{MbtError, MbtResult};

/// A handle to an `MBTiles` file. Connections are opened on demand and owned by the caller.
#[derive(Clone, Debug)]
pub struct Mbtiles {
    filepath: String,
    filename: String,
}

impl Display for Mbtiles {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filepath)
    }
}

impl Mbtiles {
    pub fn new<P: AsRef<Path>>(filepath: P) -> MbtResult<Self> {
        let path = filepath.as_ref();
        Ok(Self {
            filepath: path
                .to_str()
                .ok_or_else(|| MbtError::UnsupportedCharsInFilepath(path.to_path_buf()))?
                .to_string(),
            filename: path
                .file_stem()
                .unwrap_or_else(|| OsStr::new("unknown"))
                .to_string_lossy()
                .to_string(),
        })
    }

    pub async fn open(&self) -> MbtResult<SqliteConnection> {
        debug!("Opening w/ defaults {self}");
        let opt = SqliteConnectOptions::new().filename(self.filepath());
        Ok(SqliteConnection::connect_with(&opt).await?)
    }

    pub async fn open_or_new(&self) -> MbtResult<SqliteConnection> {
        debug!("Opening or creating {self}");
        let opt = SqliteConnectOptions::new()
            .filename(self.filepath())
            .create_if_missing(true);
        Ok(SqliteConnection::connect_with(&opt).await?)
    }

    pub async fn open_readonly(&self) -> MbtResult<SqliteConnection> {
        let opt = SqliteConnectOptions::new()
            .filename(self.filepath())
            .read_only(true);
        Ok(SqliteConnection::connect_with(&opt).await?)
    }

    #[must_use]
    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Reads one tile. `y` is the stored TMS row, counted from the south.
    pub async fn get_tile<T>(
        &self,
        conn: &mut T,
        z: u8,
        x: u32,
        y: u32,
    ) -> MbtResult<Option<Vec<u8>>>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        let row = query(
            "SELECT tile_data FROM tiles WHERE zoom_level = ? AND tile_column = ? AND tile_row = ?",
        )
        .bind(i64::from(z))
        .bind(i64::from(x))
        .bind(i64::from(y))
        .fetch_optional(conn)
        .await?;
        Ok(match row {
            Some(row) => row.try_get::<Option<Vec<u8>>, _>(0)?,
            None => None,
        })
    }

    /// Reads any non-empty tile, used to probe the tile format and size.
    pub async fn get_any_tile<T>(&self, conn: &mut T) -> MbtResult<Option<Vec<u8>>>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        let row = query("SELECT tile_data FROM tiles WHERE tile_data IS NOT NULL LIMIT 1")
            .fetch_optional(conn)
            .await?;
        Ok(match row {
            Some(row) => row.try_get::<Option<Vec<u8>>, _>(0)?,
            None => None,
        })
    }

    /// Stores one tile at the TMS row `y`. A second tile at the same index is rejected.
    pub async fn insert_tile<T>(
        &self,
        conn: &mut T,
        z: u8,
        x: u32,
        y: u32,
        data: &[u8],
    ) -> MbtResult<()>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        if !is_valid_tile(x.into(), y.into(), z.into()) {
            return Err(MbtError::InvalidTileIndex(z, x, y));
        }
        query("INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?, ?, ?, ?)")
            .bind(i64::from(z))
            .bind(i64::from(x))
            .bind(i64::from(y))
            .bind(data)
            .execute(conn)
            .await?;
        Ok(())
    }
}
