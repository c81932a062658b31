use actix_web::web::{self, Data, Path};
use actix_web::{HttpRequest, HttpResponse, route};
use serde::Deserialize;
use tilemap_core::ogc::{ExceptionCode, OgcException, WMTS_VERSION, wmts_capabilities};
use tilemap_core::tiles::imaging::transcode;
use tilemap_core::tiles::{TileError, TileSources};
use tilemap_tile_utils::{Format, RowConvention, TileCoord};
use tracing::{error, trace};

use crate::config::SrvConfig;
use crate::srv::params::{OgcParams, parse_int};
use crate::srv::policy::{ExceptionPolicy as _, WmtsPolicy, xml_response};
use crate::srv::server::base_url;

type WmtsResult<T> = Result<T, OgcException>;

#[derive(Deserialize)]
struct CapabilitiesPath {
    version: String,
}

#[derive(Deserialize)]
struct TilePath {
    version: String,
    layer: String,
    #[allow(dead_code)]
    style: String,
    #[allow(dead_code)]
    tilematrixset: String,
    tilematrix: String,
    tilerow: String,
    tilecol: String,
    format: String,
}

/// Key-value-pair binding: `/wmts?SERVICE=WMTS&REQUEST=...`
#[route("/wmts", method = "GET", method = "HEAD")]
pub async fn get_wmts(
    req: HttpRequest,
    sources: Data<TileSources>,
    srv_config: Data<SrvConfig>,
) -> HttpResponse {
    let base = base_url(&req, &srv_config);
    match handle_kvp(req.query_string(), &sources, &base).await {
        Ok(response) => response,
        Err(e) => WmtsPolicy.respond(&e),
    }
}

#[route("/wmts/{version}/WMTSCapabilities.xml", method = "GET", method = "HEAD")]
#[allow(clippy::unused_async)]
pub async fn get_wmts_capabilities(
    req: HttpRequest,
    path: Path<CapabilitiesPath>,
    sources: Data<TileSources>,
    srv_config: Data<SrvConfig>,
) -> HttpResponse {
    let res = check_version(&path.version)
        .and_then(|()| capabilities(&sources, &base_url(&req, &srv_config)));
    res.unwrap_or_else(|e| WmtsPolicy.respond(&e))
}

#[route(
    "/wmts/tile/{version}/{layer}/{style}/{tilematrixset}/{tilematrix}/{tilerow}/{tilecol}.{format}",
    method = "GET",
    method = "HEAD"
)]
pub async fn get_wmts_tile(path: Path<TilePath>, sources: Data<TileSources>) -> HttpResponse {
    match rest_tile(&path, &sources).await {
        Ok(response) => response,
        Err(e) => WmtsPolicy.respond(&e),
    }
}

async fn rest_tile(path: &TilePath, sources: &TileSources) -> WmtsResult<HttpResponse> {
    check_version(&path.version)?;
    let format = parse_format(&path.format)?;
    let zoom = parse_int("TileMatrix", tile_matrix(&path.tilematrix))?;
    let row = parse_int("TileRow", &path.tilerow)?;
    let col = parse_int("TileCol", &path.tilecol)?;
    serve_tile(sources, &path.layer, zoom, row, col, format).await
}

async fn handle_kvp(query: &str, sources: &TileSources, base: &str) -> WmtsResult<HttpResponse> {
    let params = OgcParams::from_query(query)?;

    match params.get("service") {
        Some(s) if s.eq_ignore_ascii_case("WMTS") || s.eq_ignore_ascii_case("WMS") => {}
        Some(s) => {
            return Err(OgcException::new(
                ExceptionCode::MissingParameterValue,
                format!("SERVICE parameter must be WMTS, but is '{s}'"),
            ));
        }
        None => {
            return Err(OgcException::new(
                ExceptionCode::MissingParameterValue,
                "SERVICE parameter is not defined",
            ));
        }
    }
    if let Some(version) = params.get("version") {
        check_version(version)?;
    }

    let request = params.require("request")?;
    if request.eq_ignore_ascii_case("GetCapabilities") {
        capabilities(sources, base)
    } else if request.eq_ignore_ascii_case("GetTile") {
        kvp_tile(&params, sources).await
    } else {
        Err(OgcException::new(
            ExceptionCode::OperationNotSupported,
            format!("Request '{request}' is not supported, use GetCapabilities or GetTile"),
        ))
    }
}

async fn kvp_tile(params: &OgcParams, sources: &TileSources) -> WmtsResult<HttpResponse> {
    let zoom = parse_int("TileMatrix", tile_matrix(params.require("tilematrix")?))?;
    let layer = params.require("layer")?;
    if !sources.contains(layer) {
        return Err(layer_not_found(layer));
    }
    let format = parse_format(params.require("format")?)?;
    let row = params.require_int("tilerow")?;
    let col = params.require_int("tilecol")?;
    serve_tile(sources, layer, zoom, row, col, format).await
}

/// Fetches a tile addressed with row 0 at the north edge and delivers it as `format`.
async fn serve_tile(
    sources: &TileSources,
    layer: &str,
    zoom: i64,
    row: i64,
    col: i64,
    format: Format,
) -> WmtsResult<HttpResponse> {
    let src = sources.find(layer).ok_or_else(|| layer_not_found(layer))?;
    let info = src.get_info();

    let xyz = TileCoord::new_checked(zoom, col, row).ok_or_else(|| {
        OgcException::new(
            ExceptionCode::NotFound,
            "The requested tile is outside the bounding box of the tile map.",
        )
    })?;
    if !src.is_valid_zoom(xyz.z) {
        return Err(OgcException::new(
            ExceptionCode::NotFound,
            format!(
                "TileMatrix {} is outside the zoom range {}..{} of layer '{layer}'",
                xyz.z, info.min_zoom, info.max_zoom
            ),
        ));
    }

    let native = RowConvention::Xyz.convert_to(info.row_convention, xyz);
    let tile = match src.get_tile(native).await {
        Ok(Some(tile)) => tile,
        Ok(None) => {
            trace!("No tile {native} in {layer}");
            return Err(tile_not_found());
        }
        Err(e) => {
            error!("Unable to fetch tile {native} from {layer}: {e}");
            return Err(OgcException::new(
                ExceptionCode::NoApplicableCode,
                format!("Unable to fetch the requested tile from layer '{layer}'"),
            ));
        }
    };

    let quality = sources.service().jpeg_quality;
    let stored = tile.format;
    let data = if stored == format {
        tile.data
    } else if stored.is_raster() && format.is_raster() {
        web::block(move || transcode(tile.data, stored, format, quality))
            .await
            .map_err(|e| internal_error(&e))?
            .map_err(|e| match e {
                TileError::UnsupportedTranscode(..) => format_not_found(stored, format),
                e => internal_error(&e),
            })?
    } else {
        return Err(format_not_found(stored, format));
    };

    Ok(HttpResponse::Ok()
        .content_type(format.content_type())
        .body(data))
}

fn capabilities(sources: &TileSources, base: &str) -> WmtsResult<HttpResponse> {
    wmts_capabilities(sources, base)
        .map(xml_response)
        .map_err(|e| internal_error(&e))
}

fn check_version(version: &str) -> WmtsResult<()> {
    if version == WMTS_VERSION {
        Ok(())
    } else {
        Err(OgcException::new(
            ExceptionCode::InvalidParameterValue,
            format!("VERSION must be {WMTS_VERSION}, but is '{version}'"),
        ))
    }
}

/// Accepts both `5` and prefixed identifiers such as `EPSG:3857:5`.
fn tile_matrix(value: &str) -> &str {
    value.rsplit(':').next().unwrap_or(value)
}

fn parse_format(value: &str) -> WmtsResult<Format> {
    Format::parse_any(value).ok_or_else(|| {
        OgcException::new(
            ExceptionCode::InvalidParameterValue,
            format!("FORMAT '{value}' is not a known tile format"),
        )
    })
}

fn layer_not_found(layer: &str) -> OgcException {
    OgcException::new(
        ExceptionCode::NotFound,
        format!("Specified layer '{layer}' was not found"),
    )
}

fn tile_not_found() -> OgcException {
    OgcException::new(ExceptionCode::NotFound, "Specified tile was not found")
}

fn format_not_found(stored: Format, requested: Format) -> OgcException {
    OgcException::new(
        ExceptionCode::NotFound,
        format!(
            "Tiles stored as {} cannot be delivered as {}",
            stored.content_type(),
            requested.content_type()
        ),
    )
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
    use super::*;

    #[test]
    fn tile_matrix_identifiers() {
        assert_eq!(tile_matrix("5"), "5");
        assert_eq!(tile_matrix("EPSG:3857:12"), "12");
        assert_eq!(tile_matrix("WebMercatorQuad:0"), "0");
    }

    #[test]
    fn formats_by_extension_or_media_type() {
        assert_eq!(parse_format("png").unwrap(), Format::Png);
        assert_eq!(parse_format("image/jpeg").unwrap(), Format::Jpeg);
        let e = parse_format("image/tiff").unwrap_err();
        assert_eq!(e.code, ExceptionCode::InvalidParameterValue);
    }

    #[test]
    fn version_is_fixed() {
        assert!(check_version("1.0.0").is_ok());
        let e = check_version("2.0.0").unwrap_err();
        assert_eq!(e.code, ExceptionCode::InvalidParameterValue);
    }
}
