use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use actix_web::http::header::CACHE_CONTROL;
use actix_web::middleware::{NormalizePath, TrailingSlash};
use actix_web::web::Data;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, Responder, route, web};
use futures::TryFutureExt as _;
use tilemap_core::tiles::TileSources;
use tracing_actix_web::TracingLogger;

use crate::config::{KEEP_ALIVE_DEFAULT, LISTEN_ADDRESSES_DEFAULT, SrvConfig};
use crate::srv::{admin, wms, wmts};
use crate::{TilemapError, TilemapResult};

/// Return 200 OK if healthy. Used for readiness and liveness probes.
#[route("/health", method = "GET", method = "HEAD")]
#[allow(clippy::unused_async)]
async fn get_health() -> impl Responder {
    HttpResponse::Ok()
        .insert_header((CACHE_CONTROL, "no-cache"))
        .message_body("OK")
}

pub fn router(cfg: &mut web::ServiceConfig) {
    cfg.service(get_health)
        .service(admin::get_sources)
        .service(wmts::get_wmts)
        .service(wmts::get_wmts_capabilities)
        .service(wmts::get_wmts_tile)
        .service(wms::get_wms);
}

/// Scheme, host and configured base path of the URLs advertised to clients.
pub fn base_url(req: &HttpRequest, srv_config: &SrvConfig) -> String {
    let info = req.connection_info();
    format!(
        "{}://{}{}",
        info.scheme(),
        info.host(),
        srv_config.base_path.as_deref().unwrap_or_default()
    )
}

type Server = Pin<Box<dyn Future<Output = TilemapResult<()>>>>;

/// Create a future for an Actix web server together with the listening address.
pub fn new_server(config: SrvConfig, sources: TileSources) -> TilemapResult<(Server, String)> {
    let keep_alive = Duration::from_secs(config.keep_alive.unwrap_or(KEEP_ALIVE_DEFAULT));
    let worker_processes = config.worker_processes.unwrap_or_else(num_cpus::get);
    let listen_addresses = config
        .listen_addresses
        .clone()
        .unwrap_or_else(|| LISTEN_ADDRESSES_DEFAULT.to_string());

    let factory = move || {
        App::new()
            .app_data(Data::new(sources.clone()))
            .app_data(Data::new(config.clone()))
            .wrap(TracingLogger::default())
            .wrap(NormalizePath::new(TrailingSlash::MergeOnly))
            .configure(router)
    };

    let server = HttpServer::new(factory)
        .bind(listen_addresses.clone())
        .map_err(|e| TilemapError::BindingError(e, listen_addresses.clone()))?
        .keep_alive(keep_alive)
        .shutdown_timeout(0)
        .workers(worker_processes)
        .run()
        .err_into();

    Ok((Box::pin(server), listen_addresses))
}
