use std::collections::BTreeMap;

use tilemap_tile_utils::{
    MERCATOR_HALF_EXTENT, TileRect, covering_tiles, scale_denominator, tile_count,
};

use super::{advertised, matrix_set_id, mercator_bounds, wgs84_bounds, write_keywords};
use crate::ogc::xml::XmlBuilder;
use crate::ogc::{WMTS_VERSION, output_formats};
use crate::tiles::{SourceInfo, TileResult, TileSources};

const WMTS_NAMESPACE: &str = "http://www.opengis.net/wmts/1.0";
const OWS_NAMESPACE: &str = "http://www.opengis.net/ows/1.1";
const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
const GML_NAMESPACE: &str = "http://www.opengis.net/gml";
const WEB_MERCATOR_CRS: &str = "urn:ogc:def:crs:EPSG::3857";
const GOOGLE_MAPS_WKSS: &str = "urn:ogc:def:wkss:OGC:1.0:GoogleMapsCompatible";

/// Renders the WMTS 1.0.0 capabilities document for all raster sources.
///
/// `base_url` is the externally visible server root, e.g. `http://host:3000`.
pub fn wmts_capabilities(sources: &TileSources, base_url: &str) -> TileResult<String> {
    let base = base_url.trim_end_matches('/');
    let service = sources.service();
    let operation_url = format!("{base}/wmts?");
    let metadata_url = format!("{base}/wmts/{WMTS_VERSION}/WMTSCapabilities.xml");

    // tile size -> highest zoom advertised for it
    let mut matrix_sets = BTreeMap::<(u32, u32), u8>::new();
    for src in advertised(sources) {
        let info = src.get_info();
        let max = matrix_sets
            .entry((info.tile_width, info.tile_height))
            .or_default();
        *max = (*max).max(info.max_zoom);
    }

    let mut xml = XmlBuilder::new()?;
    xml.element(
        "Capabilities",
        &[
            ("xmlns", WMTS_NAMESPACE),
            ("xmlns:ows", OWS_NAMESPACE),
            ("xmlns:xlink", XLINK_NAMESPACE),
            ("xmlns:gml", GML_NAMESPACE),
            ("version", WMTS_VERSION),
        ],
        |x| {
            x.element("ows:ServiceIdentification", &[], |x| {
                x.text_element("ows:Title", &[], &service.title)?;
                x.text_element("ows:Abstract", &[], &service.abstract_text)?;
                write_keywords(x, "ows:Keywords", "ows:Keyword", &service.keywords)?;
                x.text_element("ows:ServiceType", &[], "OGC WMTS")?;
                x.text_element("ows:ServiceTypeVersion", &[], WMTS_VERSION)
            })?;

            x.element("ows:OperationsMetadata", &[], |x| {
                for name in ["GetCapabilities", "GetTile"] {
                    write_operation(x, name, &operation_url)?;
                }
                Ok(())
            })?;

            x.element("Contents", &[], |x| {
                for src in advertised(sources) {
                    write_layer(x, src.get_info(), base)?;
                }
                for (&(width, height), &max_zoom) in &matrix_sets {
                    write_matrix_set(x, width, height, max_zoom)?;
                }
                Ok(())
            })?;

            x.empty(
                "ServiceMetadataURL",
                &[("xlink:href", metadata_url.as_str())],
            )
        },
    )?;
    xml.finish()
}

fn write_operation(xml: &mut XmlBuilder, name: &str, url: &str) -> TileResult<()> {
    xml.element("ows:Operation", &[("name", name)], |x| {
        x.element("ows:DCP", &[], |x| {
            x.element("ows:HTTP", &[], |x| {
                x.element("ows:Get", &[("xlink:href", url)], |x| {
                    x.element("ows:Constraint", &[("name", "GetEncoding")], |x| {
                        x.element("ows:AllowedValues", &[], |x| {
                            x.text_element("ows:Value", &[], "KVP")
                        })
                    })
                })
            })
        })
    })
}

fn write_layer(xml: &mut XmlBuilder, info: &SourceInfo, base: &str) -> TileResult<()> {
    let [west, south, east, north] = wgs84_bounds(info);
    let extent = mercator_bounds(info);
    let set_id = matrix_set_id(info.tile_width, info.tile_height);
    let formats = output_formats(info.format);

    xml.element("Layer", &[], |x| {
        x.text_element("ows:Title", &[], &info.title)?;
        x.text_element("ows:Abstract", &[], &info.abstract_text)?;
        x.element("ows:WGS84BoundingBox", &[], |x| {
            x.text_element("ows:LowerCorner", &[], &format!("{west} {south}"))?;
            x.text_element("ows:UpperCorner", &[], &format!("{east} {north}"))
        })?;
        x.text_element("ows:Identifier", &[], &info.id)?;
        x.element("Style", &[("isDefault", "true")], |x| {
            x.text_element("ows:Identifier", &[], "default")
        })?;
        for format in &formats {
            x.text_element("Format", &[], format.content_type())?;
        }
        x.element("TileMatrixSetLink", &[], |x| {
            x.text_element("TileMatrixSet", &[], &set_id)?;
            x.element("TileMatrixSetLimits", &[], |x| {
                for zoom in info.min_zoom..=info.max_zoom {
                    let rect =
                        covering_tiles(&extent, zoom).unwrap_or_else(|| TileRect::world(zoom));
                    x.element("TileMatrixLimits", &[], |x| {
                        x.text_element("TileMatrix", &[], &zoom.to_string())?;
                        x.text_element("MinTileRow", &[], &rect.min_y.to_string())?;
                        x.text_element("MaxTileRow", &[], &rect.max_y.to_string())?;
                        x.text_element("MinTileCol", &[], &rect.min_x.to_string())?;
                        x.text_element("MaxTileCol", &[], &rect.max_x.to_string())
                    })?;
                }
                Ok(())
            })
        })?;
        for format in &formats {
            let template = format!(
                "{base}/wmts/tile/{WMTS_VERSION}/{}/{{Style}}/{{TileMatrixSet}}/{{TileMatrix}}/{{TileRow}}/{{TileCol}}.{}",
                info.id,
                format.extension()
            );
            x.empty(
                "ResourceURL",
                &[
                    ("format", format.content_type()),
                    ("resourceType", "tile"),
                    ("template", template.as_str()),
                ],
            )?;
        }
        Ok(())
    })
}

fn write_matrix_set(xml: &mut XmlBuilder, width: u32, height: u32, max_zoom: u8) -> TileResult<()> {
    let top_left = format!("{} {}", -MERCATOR_HALF_EXTENT, MERCATOR_HALF_EXTENT);
    xml.element("TileMatrixSet", &[], |x| {
        x.text_element("ows:Identifier", &[], &matrix_set_id(width, height))?;
        x.text_element("ows:SupportedCRS", &[], WEB_MERCATOR_CRS)?;
        if (width, height) == (256, 256) {
            x.text_element("WellKnownScaleSet", &[], GOOGLE_MAPS_WKSS)?;
        }
        for zoom in 0..=max_zoom {
            let count = tile_count(zoom).to_string();
            x.element("TileMatrix", &[], |x| {
                x.text_element("ows:Identifier", &[], &zoom.to_string())?;
                x.text_element(
                    "ScaleDenominator",
                    &[],
                    &scale_denominator(zoom, width).to_string(),
                )?;
                x.text_element("TopLeftCorner", &[], &top_left)?;
                x.text_element("TileWidth", &[], &width.to_string())?;
                x.text_element("TileHeight", &[], &height.to_string())?;
                x.text_element("MatrixWidth", &[], &count)?;
                x.text_element("MatrixHeight", &[], &count)
            })?;
        }
        Ok(())
    })
}
