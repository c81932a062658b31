#![cfg(feature = "test-pg")]

//! Requires a `PostGIS` database reachable through `DATABASE_URL`, e.g.
//! `host=localhost user=postgres password=postgres dbname=db`.

use deadpool_postgres::tokio_postgres::{Config, NoTls};
use tilemap_core::config::{PostgisConfig, SourceConfig, SourceType};
use tilemap_core::tiles::Source as _;
use tilemap_core::tiles::postgis::PostgisSource;
use tilemap_tile_utils::{Format, RowConvention, TileCoord};

fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for PostGIS tests")
}

async fn seed(table: &str) {
    let config: Config = database_url().parse().unwrap();
    let (client, connection) = config.connect(NoTls).await.unwrap();
    tokio::spawn(connection);
    client
        .batch_execute(&format!(
            "
            CREATE EXTENSION IF NOT EXISTS postgis;
            DROP TABLE IF EXISTS {table};
            CREATE TABLE {table} (gid serial PRIMARY KEY, name text, geom geometry(Point, 4326));
            INSERT INTO {table} (name, geom) VALUES
                ('null island', ST_SetSRID(ST_MakePoint(0.5, 0.5), 4326)),
                ('far north', ST_SetSRID(ST_MakePoint(10.0, 60.0), 4326));
            "
        ))
        .await
        .unwrap();
}

fn source_config(table: &str) -> SourceConfig {
    let mut cfg = SourceConfig::new("points", SourceType::Postgis, database_url());
    cfg.postgis = Some(PostgisConfig {
        table: Some(table.to_string()),
        geometry: Some("geom".to_string()),
        fields: Some("name".to_string()),
        srid: Some(4326),
        calc_bounds: Some(true),
    });
    cfg.tms = Some(false);
    cfg.max_zoom = Some(10);
    cfg
}

#[actix_rt::test]
async fn table_tiles_and_bounds() {
    seed("tilemap_test_points").await;
    let src = PostgisSource::new(&source_config("tilemap_test_points"))
        .await
        .unwrap();

    let info = src.get_info();
    assert_eq!(info.format, Format::Mvt);
    assert_eq!(info.row_convention, RowConvention::Xyz);
    let bounds = info.bounds.unwrap();
    assert!((bounds.left - 0.5).abs() < 1e-6);
    assert!((bounds.top - 60.0).abs() < 1e-6);

    let tile = src.get_tile(TileCoord { z: 0, x: 0, y: 0 }).await.unwrap();
    assert!(!tile.unwrap().data.is_empty());

    // south-west quadrant of zoom 1 holds no points
    let tile = src.get_tile(TileCoord { z: 1, x: 0, y: 1 }).await.unwrap();
    assert_eq!(tile, None);
}
