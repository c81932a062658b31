use actix_web::web::Data;
use actix_web::{HttpResponse, Responder, middleware, route};
use tilemap_core::tiles::{SourceInfo, TileSources};

/// All registered sources in configuration order, vector sources included.
#[route(
    "/api/sources",
    method = "GET",
    method = "HEAD",
    wrap = "middleware::Compress::default()"
)]
#[allow(clippy::unused_async)]
pub async fn get_sources(sources: Data<TileSources>) -> impl Responder {
    let listing: Vec<&SourceInfo> = sources.sources().map(|s| s.get_info()).collect();
    HttpResponse::Ok().json(listing)
}
