use std::fmt::Display;
use std::str::FromStr;

use futures::TryStreamExt as _;
use serde::Serialize;
use serde_json::{Value as JSONValue, Value};
use sqlx::{Row as _, SqliteExecutor, query};
use tilejson::{Bounds, Center, TileJSON, tilejson};
use tilemap_tile_utils::Format;
use tracing::{info, warn};

use crate::MbtError::InvalidZoomValue;
use crate::Mbtiles;
use crate::errors::MbtResult;

/// Everything the `metadata` table says about a file.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metadata {
    pub id: String,
    pub format: Option<Format>,
    pub layer_type: Option<String>,
    pub tilejson: TileJSON,
    pub json: Option<JSONValue>,
}

impl Mbtiles {
    fn to_val<V, E: Display>(&self, val: Result<V, E>, title: &str) -> Option<V> {
        match val {
            Ok(v) => Some(v),
            Err(err) => {
                let name = &self.filename();
                warn!("Unable to parse metadata {title} value in {name}: {err}");
                None
            }
        }
    }

    /// Get a single metadata value from the metadata table
    pub async fn get_metadata_value<T>(&self, conn: &mut T, key: &str) -> MbtResult<Option<String>>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        let row = query("SELECT value FROM metadata WHERE name = ?")
            .bind(key)
            .fetch_optional(conn)
            .await?;
        Ok(match row {
            Some(row) => row.try_get::<Option<String>, _>(0)?,
            None => None,
        })
    }

    pub async fn get_metadata_zoom_value<T>(
        &self,
        conn: &mut T,
        zoom_name: &'static str,
    ) -> MbtResult<Option<u8>>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        self.get_metadata_value(conn, zoom_name)
            .await?
            .map(|v| v.parse().map_err(|_| InvalidZoomValue(zoom_name, v)))
            .transpose()
    }

    pub async fn set_metadata_value<T, S>(&self, conn: &mut T, key: &str, value: S) -> MbtResult<()>
    where
        S: ToString,
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        let value = value.to_string();
        query("INSERT OR REPLACE INTO metadata(name, value) VALUES(?, ?)")
            .bind(key)
            .bind(value)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn delete_metadata_value<T>(&self, conn: &mut T, key: &str) -> MbtResult<()>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        query("DELETE FROM metadata WHERE name = ?")
            .bind(key)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Reads all metadata rows. Values that fail to parse are logged and skipped.
    pub async fn get_metadata<T>(&self, conn: &mut T) -> MbtResult<Metadata>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        let mut rows =
            query("SELECT name, value FROM metadata WHERE value IS NOT ''").fetch(&mut *conn);

        let mut tj = tilejson! { tiles: vec![] };
        let mut format: Option<Format> = None;
        let mut layer_type: Option<String> = None;
        let mut json: Option<JSONValue> = None;

        while let Some(row) = rows.try_next().await? {
            let name: Option<String> = row.try_get(0)?;
            let value: Option<String> = row.try_get(1)?;
            let (Some(name), Some(value)) = (name, value) else {
                continue;
            };
            match name.as_ref() {
                "name" => tj.name = Some(value),
                "version" => tj.version = Some(value),
                "bounds" => tj.bounds = self.to_val(Bounds::from_str(value.as_str()), &name),
                "center" => tj.center = self.to_val(Center::from_str(value.as_str()), &name),
                "minzoom" => tj.minzoom = self.to_val(value.parse(), &name),
                "maxzoom" => tj.maxzoom = self.to_val(value.parse(), &name),
                "description" => tj.description = Some(value),
                "attribution" => tj.attribution = Some(value),
                "legend" => tj.legend = Some(value),
                "template" => tj.template = Some(value),
                "type" => layer_type = Some(value),
                "format" => format = self.to_val(Format::from_str(&value), &name),
                "json" => json = self.to_val(serde_json::from_str(&value), &name),
                "scheme" => {
                    if value != "tms" {
                        let file = &self.filename();
                        warn!(
                            "File {file} has an unexpected metadata value {name}='{value}'. Only 'tms' is supported. Ignoring."
                        );
                    }
                }
                _ => {
                    let file = &self.filename();
                    info!("{file} has an unrecognized metadata value {name}={value}");
                    tj.other.insert(name, Value::String(value));
                }
            }
        }

        if let Some(JSONValue::Object(obj)) = &mut json {
            if let Some(value) = obj.remove("vector_layers") {
                tj.vector_layers = self.to_val(serde_json::from_value(value), "vector_layers");
            }
            if obj.is_empty() {
                json = None;
            }
        }

        Ok(Metadata {
            id: self.filename().to_string(),
            format,
            layer_type,
            tilejson: tj,
            json,
        })
    }
}
