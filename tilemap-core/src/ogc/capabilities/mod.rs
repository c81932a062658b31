mod wms;
mod wmts;

use tilemap_tile_utils::{Bbox, MAX_LATITUDE};
pub use wms::wms_capabilities;
pub use wmts::wmts_capabilities;

use crate::ogc::is_advertised_format;
use crate::ogc::xml::XmlBuilder;
use crate::tiles::{BoxedSource, SourceInfo, TileResult, TileSources};

/// Sources the OGC services advertise, in registry order.
fn advertised(sources: &TileSources) -> impl Iterator<Item = &BoxedSource> {
    sources
        .sources()
        .filter(|src| is_advertised_format(src.get_info().format))
}

/// `[west, south, east, north]` of a source, the whole Web Mercator world if unknown.
fn wgs84_bounds(info: &SourceInfo) -> [f64; 4] {
    match info.bounds {
        Some(b) => [b.left, b.bottom, b.right, b.top],
        None => [-180.0, -MAX_LATITUDE, 180.0, MAX_LATITUDE],
    }
}

fn mercator_bounds(info: &SourceInfo) -> Bbox {
    let [west, south, east, north] = wgs84_bounds(info);
    Bbox::from_wgs84(west, south, east, north)
}

/// Identifier of the tile matrix set for tiles of the given pixel size.
fn matrix_set_id(width: u32, height: u32) -> String {
    match (width, height) {
        (256, 256) => "WebMercatorQuad".to_string(),
        (w, h) if w == h => format!("WebMercatorQuad_{w}"),
        (w, h) => format!("WebMercatorQuad_{w}x{h}"),
    }
}

fn write_keywords(
    xml: &mut XmlBuilder,
    list: &str,
    item: &str,
    keywords: &[String],
) -> TileResult<()> {
    if keywords.is_empty() {
        return Ok(());
    }
    xml.element(list, &[], |x| {
        for keyword in keywords {
            x.text_element(item, &[], keyword)?;
        }
        Ok(())
    })
}
