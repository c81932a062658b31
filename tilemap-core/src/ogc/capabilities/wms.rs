use super::{advertised, mercator_bounds, wgs84_bounds, write_keywords};
use crate::ogc::xml::XmlBuilder;
use crate::ogc::{OUTPUT_FORMATS, WMS_VERSION};
use crate::tiles::{SourceInfo, TileResult, TileSources};

const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
const CAPABILITIES_FORMAT: &str = "application/vnd.ogc.wms_xml";
const EXCEPTION_FORMAT: &str = "application/vnd.ogc.se_xml";

/// Renders the WMS 1.1.1 capabilities document, one `Layer` per raster source.
pub fn wms_capabilities(sources: &TileSources, base_url: &str) -> TileResult<String> {
    let base = base_url.trim_end_matches('/');
    let service = sources.service();
    let url = format!("{base}/wms?");

    let mut xml = XmlBuilder::new()?;
    xml.element(
        "WMT_MS_Capabilities",
        &[("version", WMS_VERSION), ("xmlns:xlink", XLINK_NAMESPACE)],
        |x| {
            x.element("Service", &[], |x| {
                x.text_element("Name", &[], "OGC:WMS")?;
                x.text_element("Title", &[], &service.title)?;
                x.text_element("Abstract", &[], &service.abstract_text)?;
                write_keywords(x, "KeywordList", "Keyword", &service.keywords)?;
                online_resource(x, &url)
            })?;

            x.element("Capability", &[], |x| {
                x.element("Request", &[], |x| {
                    x.element("GetCapabilities", &[], |x| {
                        x.text_element("Format", &[], CAPABILITIES_FORMAT)?;
                        dcp_type(x, &url)
                    })?;
                    x.element("GetMap", &[], |x| {
                        for format in OUTPUT_FORMATS {
                            x.text_element("Format", &[], format.content_type())?;
                        }
                        dcp_type(x, &url)
                    })
                })?;
                x.element("Exception", &[], |x| {
                    x.text_element("Format", &[], EXCEPTION_FORMAT)
                })?;
                for src in advertised(sources) {
                    write_layer(x, src.get_info())?;
                }
                Ok(())
            })
        },
    )?;
    xml.finish()
}

fn online_resource(xml: &mut XmlBuilder, url: &str) -> TileResult<()> {
    xml.empty(
        "OnlineResource",
        &[("xlink:type", "simple"), ("xlink:href", url)],
    )
}

fn dcp_type(xml: &mut XmlBuilder, url: &str) -> TileResult<()> {
    xml.element("DCPType", &[], |x| {
        x.element("HTTP", &[], |x| {
            x.element("Get", &[], |x| online_resource(x, url))
        })
    })
}

fn write_layer(xml: &mut XmlBuilder, info: &SourceInfo) -> TileResult<()> {
    let [west, south, east, north] = wgs84_bounds(info).map(|v| v.to_string());
    let extent = mercator_bounds(info);
    let [min_x, min_y, max_x, max_y] =
        [extent.min_x, extent.min_y, extent.max_x, extent.max_y].map(|v| v.to_string());

    xml.element("Layer", &[("queryable", "0")], |x| {
        x.text_element("Name", &[], &info.id)?;
        x.text_element("Title", &[], &info.title)?;
        x.text_element("Abstract", &[], &info.abstract_text)?;
        x.text_element("SRS", &[], &info.srs)?;
        x.empty(
            "LatLonBoundingBox",
            &[
                ("minx", west.as_str()),
                ("miny", south.as_str()),
                ("maxx", east.as_str()),
                ("maxy", north.as_str()),
            ],
        )?;
        x.empty(
            "BoundingBox",
            &[
                ("SRS", info.srs.as_str()),
                ("minx", min_x.as_str()),
                ("miny", min_y.as_str()),
                ("maxx", max_x.as_str()),
                ("maxy", max_y.as_str()),
            ],
        )
    })
}
