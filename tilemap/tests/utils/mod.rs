#![allow(clippy::missing_panics_doc)]
#![allow(dead_code)]

use std::ffi::OsString;
use std::path::Path;

use actix_web::dev::ServiceResponse;
use actix_web::test::read_body;
use image::{DynamicImage, Rgba, RgbaImage};
use mbtiles::{Mbtiles, create_flat_tables, create_metadata_table};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tempfile::TempDir;
use tilemap::config::{Config, FauxEnv, parse_config};
use tilemap_core::tiles::imaging::{decode_image, encode_image};
use tilemap_tile_utils::{Format, encode_gzip, tile_count};

pub const BLUE: Rgba<u8> = Rgba([0, 0, 0xFF, 0xFF]);
pub const RED: Rgba<u8> = Rgba([0xFF, 0, 0, 0xFF]);

pub const CONFIG: &str = "
service:
  title: Test Tiles
  abstract: Tiles used by the integration tests
  keywords: wms,service,tile
sources:
  - id: blue
    type: mbtiles
    location: ${TILE_DIR}/blue.mbtiles
  - id: red
    type: mbtiles
    location: ${TILE_DIR}/red.mbtiles
  - id: roads
    type: mbtiles
    location: ${TILE_DIR}/roads.mbtiles
";

/// `MBTiles` files created for one test, removed when dropped.
///
/// - `blue`: png, every tile of zoom 0..=2 solid blue
/// - `red`: png, only the north-west tile of zoom 1 exists, solid red
/// - `roads`: gzipped vector tiles, zoom 0 only
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();

        let blue = solid_tile(256, BLUE, Format::Png);
        let mut tiles = Vec::new();
        for z in 0..=2 {
            for x in 0..tile_count(z) {
                for y in 0..tile_count(z) {
                    tiles.push((z, x, y, blue.clone()));
                }
            }
        }
        write_mbtiles(dir.path(), "blue", "png", &tiles).await;

        // TMS row 1 at zoom 1 is the northern row
        let red = solid_tile(256, RED, Format::Png);
        write_mbtiles(dir.path(), "red", "png", &[(1, 0, 1, red)]).await;

        let mvt = encode_gzip(&[0x1a, 0x02, 0x78, 0x02]).unwrap();
        write_mbtiles(dir.path(), "roads", "pbf", &[(0, 0, 0, mvt)]).await;

        Self { dir }
    }

    /// Finalized configuration with `${TILE_DIR}` pointing at the fixture files.
    pub fn config(&self) -> Config {
        self.config_from(CONFIG)
    }

    pub fn config_from(&self, yaml: &str) -> Config {
        mock_cfg(yaml, self.dir.path())
    }
}

#[must_use]
pub fn mock_cfg(yaml: &str, tile_dir: &Path) -> Config {
    let env = FauxEnv(
        vec![("TILE_DIR", OsString::from(tile_dir.as_os_str()))]
            .into_iter()
            .collect(),
    );
    let mut cfg = parse_config(yaml, &env, Path::new("test.yaml")).unwrap();
    let res = cfg.finalize().unwrap();
    assert!(res.is_empty(), "unrecognized config: {res:?}");
    cfg
}

pub async fn write_mbtiles(dir: &Path, name: &str, format: &str, tiles: &[(u8, u32, u32, Vec<u8>)]) {
    let mbt = Mbtiles::new(dir.join(format!("{name}.mbtiles"))).unwrap();
    let mut conn = mbt.open_or_new().await.unwrap();
    create_metadata_table(&mut conn).await.unwrap();
    create_flat_tables(&mut conn).await.unwrap();
    mbt.set_metadata_value(&mut conn, "name", name).await.unwrap();
    mbt.set_metadata_value(&mut conn, "format", format).await.unwrap();
    for (z, x, y, data) in tiles {
        mbt.insert_tile(&mut conn, *z, *x, *y, data).await.unwrap();
    }
}

#[must_use]
pub fn solid_tile(size: u32, color: Rgba<u8>, format: Format) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(size, size, color));
    encode_image(&img, format, 90).unwrap()
}

/// Decodes an image and checks that every pixel is close to `color`.
pub fn assert_solid(data: &[u8], format: Format, color: Rgba<u8>) {
    let img = decode_image(data, format).unwrap().to_rgba8();
    for (x, y, px) in img.enumerate_pixels() {
        let close = px.0.iter().zip(color.0).all(|(a, b)| a.abs_diff(b) < 16);
        assert!(close, "pixel {x},{y} is {px:?}, expected {color:?}");
    }
}

pub async fn assert_response(response: ServiceResponse) -> ServiceResponse {
    if !response.status().is_success() {
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = read_body(response).await;
        let body = String::from_utf8_lossy(&bytes);
        panic!("response status: {status}\nresponse headers: {headers:?}\nresponse body: {body}");
    }
    response
}

/// A parsed XML element, enough to assert on document structure.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn all(&self, name: &str) -> Vec<&Node> {
        self.children.iter().filter(|c| c.name == name).collect()
    }

    /// Follows a `/` separated path of child names.
    pub fn path(&self, path: &str) -> Option<&Node> {
        path.split('/').try_fold(self, |node, name| node.child(name))
    }
}

fn node_from(e: &BytesStart<'_>) -> Node {
    Node {
        name: String::from_utf8_lossy(e.name().as_ref()).to_string(),
        attrs: e
            .attributes()
            .map(|a| {
                let a = a.unwrap();
                (
                    String::from_utf8_lossy(a.key.as_ref()).to_string(),
                    a.unescape_value().unwrap().to_string(),
                )
            })
            .collect(),
        ..Default::default()
    }
}

/// Parses a document into a tree of qualified element names.
pub fn parse_xml(xml: &[u8]) -> Node {
    let xml = std::str::from_utf8(xml).unwrap();
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Node::default()];
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) => stack.push(node_from(&e)),
            Event::Empty(e) => stack.last_mut().unwrap().children.push(node_from(&e)),
            Event::Text(t) => {
                let text = t.unescape().unwrap();
                stack.last_mut().unwrap().text.push_str(text.trim());
            }
            Event::End(_) => {
                let node = stack.pop().unwrap();
                stack.last_mut().unwrap().children.push(node);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    stack.pop().unwrap().children.pop().unwrap()
}
