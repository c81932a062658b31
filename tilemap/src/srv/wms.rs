use actix_web::web::{self, Data};
use actix_web::{HttpRequest, HttpResponse, route};
use futures::{StreamExt as _, TryStreamExt as _, stream};
use image::Rgba;
use itertools::Itertools as _;
use tilemap_core::ogc::{
    ExceptionCode, OUTPUT_FORMATS, OgcException, is_advertised_format, wms_capabilities,
};
use tilemap_core::tiles::imaging::{MapCanvas, decode_image};
use tilemap_core::tiles::{BoxedSource, Tile, TileError, TileResult, TileSources};
use tilemap_tile_utils::{
    Bbox, Format, REFERENCE_TILE_SIZE, RowConvention, TileCoord, covering_tiles, select_zoom,
    tile_bbox,
};
use tracing::{debug, error};

use crate::config::SrvConfig;
use crate::srv::params::OgcParams;
use crate::srv::policy::{ExceptionPolicy as _, WmsPolicy, xml_response};
use crate::srv::server::base_url;

type WmsResult<T> = Result<T, OgcException>;

/// Spatial reference systems GetMap accepts, all of them Web Mercator.
const SUPPORTED_SRS: [&str; 3] = ["EPSG:3857", "EPSG:900913", "EPSG:102100"];

/// Largest accepted `WIDTH` and `HEIGHT`.
const MAX_MAP_SIZE: u32 = 4096;

/// Most tiles one layer may contribute to a map: a maximum size map one zoom
/// level finer than its natural zoom.
const MAX_LAYER_TILES: u64 = 4 * (MAX_MAP_SIZE / REFERENCE_TILE_SIZE + 2).pow(2) as u64;

/// Tile reads in flight per layer.
const FETCH_CONCURRENCY: usize = 8;

const DEFAULT_BGCOLOR: [u8; 3] = [0xFF, 0xFF, 0xFF];

#[route("/wms", method = "GET", method = "HEAD")]
pub async fn get_wms(
    req: HttpRequest,
    sources: Data<TileSources>,
    srv_config: Data<SrvConfig>,
) -> HttpResponse {
    let params = match OgcParams::from_query(req.query_string()) {
        Ok(params) => params,
        Err(e) => return WmsPolicy::Request.respond(&e),
    };
    if let Err(e) = check_service(&params) {
        return WmsPolicy::Service.respond(&e);
    }

    let res = match params.require("request") {
        Ok(r) if r.eq_ignore_ascii_case("GetCapabilities") => {
            wms_capabilities(&sources, &base_url(&req, &srv_config))
                .map(xml_response)
                .map_err(|e| internal_error(&e))
        }
        Ok(r) if r.eq_ignore_ascii_case("GetMap") => get_map(&params, &sources).await,
        Ok(r) => Err(OgcException::new(
            ExceptionCode::OperationNotSupported,
            format!("Request '{r}' is not supported, use GetCapabilities or GetMap"),
        )),
        Err(e) => Err(e),
    };
    res.unwrap_or_else(|e| WmsPolicy::Request.respond(&e))
}

fn check_service(params: &OgcParams) -> WmsResult<()> {
    match params.get("service") {
        Some(s) if s.eq_ignore_ascii_case("WMS") => Ok(()),
        Some(s) => Err(OgcException::new(
            ExceptionCode::InvalidParameterValue,
            format!("SERVICE parameter must be WMS, but is '{s}'"),
        )),
        None => Err(OgcException::new(
            ExceptionCode::MissingParameterValue,
            "SERVICE parameter is not defined",
        )),
    }
}

/// A validated GetMap request.
#[derive(Debug)]
struct MapRequest<'a> {
    layers: Vec<&'a BoxedSource>,
    bbox: Bbox,
    width: u32,
    height: u32,
    format: Format,
    background: Rgba<u8>,
}

impl<'a> MapRequest<'a> {
    fn parse(params: &OgcParams, sources: &'a TileSources) -> WmsResult<Self> {
        let layers = params
            .require("layers")?
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|id| find_layer(sources, id))
            .collect::<WmsResult<Vec<_>>>()?;
        if layers.is_empty() {
            return Err(OgcException::new(
                ExceptionCode::MissingParameterValue,
                "LAYERS parameter has no layer names",
            ));
        }

        let srs = params
            .get("srs")
            .or_else(|| params.get("crs"))
            .ok_or_else(|| {
                OgcException::new(ExceptionCode::MissingParameter, "SRS parameter is not defined")
            })?;
        if !SUPPORTED_SRS.iter().any(|s| s.eq_ignore_ascii_case(srs)) {
            return Err(invalid(format!(
                "SRS '{srs}' is not supported, use one of {}",
                SUPPORTED_SRS.iter().join(", ")
            )));
        }

        let bbox_value = params.require("bbox")?;
        let bbox = Bbox::parse(bbox_value)
            .filter(Bbox::is_valid)
            .ok_or_else(|| {
                invalid(format!(
                    "BBOX must be minx,miny,maxx,maxy with min below max, but is '{bbox_value}'"
                ))
            })?;

        let width = map_size(params, "width")?;
        let height = map_size(params, "height")?;

        let format_value = params.require("format")?;
        let format = Format::parse_any(format_value)
            .filter(|f| OUTPUT_FORMATS.contains(f))
            .ok_or_else(|| {
                invalid(format!(
                    "FORMAT '{format_value}' is not supported, use one of {}",
                    OUTPUT_FORMATS.iter().map(|f| f.content_type()).join(", ")
                ))
            })?;

        let transparent = params
            .get("transparent")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let [r, g, b] = match params.get("bgcolor") {
            Some(v) => parse_bgcolor(v)?,
            None => DEFAULT_BGCOLOR,
        };
        let alpha = if transparent && format != Format::Jpeg {
            0
        } else {
            0xFF
        };

        Ok(Self {
            layers,
            bbox,
            width,
            height,
            format,
            background: Rgba([r, g, b, alpha]),
        })
    }
}

fn find_layer<'a>(sources: &'a TileSources, id: &str) -> WmsResult<&'a BoxedSource> {
    let src = sources.find(id).ok_or_else(|| {
        OgcException::new(
            ExceptionCode::NotFound,
            format!("Specified layer '{id}' was not found"),
        )
    })?;
    if !is_advertised_format(src.get_info().format) {
        return Err(invalid(format!(
            "Layer '{id}' holds {} tiles and cannot be rendered",
            src.get_info().format.content_type()
        )));
    }
    Ok(src)
}

fn map_size(params: &OgcParams, key: &str) -> WmsResult<u32> {
    let value = params.require_int(key)?;
    u32::try_from(value)
        .ok()
        .filter(|v| (1..=MAX_MAP_SIZE).contains(v))
        .ok_or_else(|| {
            invalid(format!(
                "{} must be between 1 and {MAX_MAP_SIZE}, but is {value}",
                key.to_ascii_uppercase()
            ))
        })
}

/// Parses `0xRRGGBB`.
fn parse_bgcolor(value: &str) -> WmsResult<[u8; 3]> {
    let err = || invalid(format!("BGCOLOR must be 0xRRGGBB, but is '{value}'"));
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .filter(|h| h.len() == 6 && h.chars().all(|c| c.is_ascii_hexdigit()))
        .ok_or_else(err)?;
    let rgb = u32::from_str_radix(hex, 16).map_err(|_| err())?;
    let [_, r, g, b] = rgb.to_be_bytes();
    Ok([r, g, b])
}

async fn get_map(params: &OgcParams, sources: &TileSources) -> WmsResult<HttpResponse> {
    let req = MapRequest::parse(params, sources)?;
    let quality = sources.service().jpeg_quality;
    let mut canvas = MapCanvas::new(req.width, req.height, req.bbox, req.background);

    for src in req.layers {
        let tiles = fetch_tiles(src, &req.bbox, req.width).await?;
        canvas = web::block(move || -> TileResult<MapCanvas> {
            for (bbox, tile) in &tiles {
                let img = decode_image(&tile.data, tile.format)?;
                canvas.draw_tile(bbox, &img);
            }
            Ok(canvas)
        })
        .await
        .map_err(|e| internal_error(&e))?
        .map_err(|e| internal_error(&e))?;
    }

    let format = req.format;
    let data = web::block(move || canvas.encode(format, quality))
        .await
        .map_err(|e| internal_error(&e))?
        .map_err(|e| internal_error(&e))?;

    Ok(HttpResponse::Ok()
        .content_type(format.content_type())
        .body(data))
}

/// Fetches every existing tile of `src` intersecting `bbox`, with the extent each covers.
async fn fetch_tiles(src: &BoxedSource, bbox: &Bbox, width: u32) -> WmsResult<Vec<(Bbox, Tile)>> {
    let info = src.get_info();
    let zoom = select_zoom(bbox, width, info.min_zoom, info.max_zoom);
    let Some(rect) = covering_tiles(bbox, zoom) else {
        return Ok(Vec::new());
    };
    if rect.size() > MAX_LAYER_TILES {
        return Err(invalid(format!(
            "Layer '{}' needs {} tiles at zoom {zoom} for this BBOX, at most {MAX_LAYER_TILES} are allowed",
            info.id,
            rect.size()
        )));
    }
    debug!("Rendering {} tiles of {} at zoom {zoom}", rect.size(), info.id);

    let tiles: Vec<_> = stream::iter(rect.tiles())
        .map(|xyz: TileCoord| async move {
            let native = RowConvention::Xyz.convert_to(info.row_convention, xyz);
            let tile = src.get_tile(native).await?;
            Ok::<_, TileError>(tile.map(|t| (tile_bbox(xyz), t)))
        })
        .buffer_unordered(FETCH_CONCURRENCY)
        .try_collect()
        .await
        .map_err(|e| {
            error!("Unable to fetch tiles from {}: {e}", info.id);
            OgcException::new(
                ExceptionCode::NoApplicableCode,
                format!("Unable to fetch tiles from layer '{}'", info.id),
            )
        })?;
    Ok(tiles.into_iter().flatten().collect())
}

fn invalid(message: String) -> OgcException {
    OgcException::new(ExceptionCode::InvalidParameterValue, message)
}

fn internal_error(e: &dyn std::error::Error) -> OgcException {
    error!("{e}");
    OgcException::new(
        ExceptionCode::NoApplicableCode,
        "The server was unable to process the request",
    )
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn params(query: &str) -> OgcParams {
        OgcParams::from_query(query).unwrap()
    }

    #[rstest]
    #[case("0xFF0000", [0xFF, 0, 0])]
    #[case("0X00ff7F", [0, 0xFF, 0x7F])]
    fn bgcolor(#[case] value: &str, #[case] expected: [u8; 3]) {
        assert_eq!(parse_bgcolor(value).unwrap(), expected);
    }

    #[rstest]
    #[case("FF0000")]
    #[case("0xFF00")]
    #[case("0xGG0000")]
    fn bad_bgcolor(#[case] value: &str) {
        let e = parse_bgcolor(value).unwrap_err();
        assert_eq!(e.code, ExceptionCode::InvalidParameterValue);
    }

    #[rstest]
    #[case("width=256", Some(256))]
    #[case("width=4096", Some(4096))]
    #[case("width=0", None)]
    #[case("width=4097", None)]
    #[case("width=-5", None)]
    fn map_sizes(#[case] query: &str, #[case] expected: Option<u32>) {
        assert_eq!(map_size(&params(query), "width").ok(), expected);
    }

    #[test]
    fn layer_tile_limit_fits_the_largest_map() {
        let natural = (u64::from(MAX_MAP_SIZE / REFERENCE_TILE_SIZE) + 2).pow(2);
        assert!(MAX_LAYER_TILES >= natural);
        assert!(MAX_LAYER_TILES < 2_000);
    }

    #[test]
    fn service_check() {
        assert!(check_service(&params("service=wms")).is_ok());
        let e = check_service(&params("service=QWERTY")).unwrap_err();
        assert_eq!(e.code, ExceptionCode::InvalidParameterValue);
        let e = check_service(&params("request=GetMap")).unwrap_err();
        assert_eq!(e.code, ExceptionCode::MissingParameterValue);
    }
}
